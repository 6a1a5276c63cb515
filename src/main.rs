use std::{env, error::Error, io::IsTerminal, process, sync::Arc};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader, Stdin},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use spotifice::{
    config::{Config, SessionMode},
    controller::{Command, Controller, View},
    credentials::Prompt,
    loopback::{Adapter, Catalog, LocalMediaRender, LocalMediaServer},
    session::{Authentication, EstablishError, SessionEstablisher},
    signal,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Environment variable the password is read from. There is no command line
/// option for it.
const PASSWORD_ENV: &str = "SPOTIFICE_PASSWORD";

/// Exit status after a repeated shutdown signal.
const EXIT_SIGNAL: i32 = 130;

const HELP: &str = "commands: play, pause, stop, next, prev, repeat on|off, \
                    playlists, playlist <n>, status, track, quit";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Connection configuration file
    ///
    /// TOML file with the `MediaServer.Proxy` and `MediaRender.Proxy`
    /// service references.
    #[arg(value_name = "CONFIG", value_hint = ValueHint::FilePath)]
    config: String,

    /// Username for credential-based sessions
    ///
    /// Asked for interactively when not set. The password is read from
    /// the SPOTIFICE_PASSWORD environment variable, or asked for.
    #[arg(short, long, env = "SPOTIFICE_USERNAME", value_hint = ValueHint::Username)]
    username: Option<String>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// What the user typed at the command prompt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Input {
    Command(Command),
    Playlists,
    Playlist(usize),
    Status,
    Track,
    Quit,
}

impl Input {
    /// Parses one line of input. Returns `None` for anything unrecognized.
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let input = match (words.next()?, words.next()) {
            ("play", None) => Self::Command(Command::Play),
            ("pause", None) => Self::Command(Command::Pause),
            ("stop", None) => Self::Command(Command::Stop),
            ("next", None) => Self::Command(Command::Next),
            ("prev" | "previous", None) => Self::Command(Command::Previous),
            ("repeat", Some("on")) => Self::Command(Command::SetRepeat(true)),
            ("repeat", Some("off")) => Self::Command(Command::SetRepeat(false)),
            ("playlists", None) => Self::Playlists,
            ("playlist", Some(number)) => Self::Playlist(number.parse().ok()?),
            ("status", None) => Self::Status,
            ("track", None) => Self::Track,
            ("quit" | "exit", None) => Self::Quit,
            _ => return None,
        };

        words.next().is_none().then_some(input)
    }
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("spotifice", level);
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Hosts a media server and renderer under the configured identities.
fn host(adapter: &Adapter, config: &Config, catalog: Catalog) {
    let server = config.media_server.proxy.identity();
    let render = config.media_render.proxy.identity();

    adapter.add(server, Arc::new(LocalMediaServer::new(catalog)));
    adapter.add(
        render,
        Arc::new(LocalMediaRender::new(render, adapter.communicator())),
    );
    info!("hosting {server} and {render} in-process");
}

fn print_view(view: &View) {
    let repeat = if view.repeat { "on" } else { "off" };
    println!("[{}] {} (repeat {repeat})", view.label(), view.track);
    if view.message != view.label() {
        println!("{}", view.message);
    }
}

fn print_playlists(controller: &Controller) {
    if controller.playlists().is_empty() {
        println!("no playlists");
    }

    for (number, playlist) in controller.playlists().iter().enumerate() {
        println!("{:>3}. {}", number + 1, playlist.name);
    }
}

/// Reads commands from `stdin` until quit, end of input or cancellation.
async fn command_loop(
    mut controller: Controller,
    stdin: Arc<Mutex<BufReader<Stdin>>>,
    cancel: CancellationToken,
) -> io::Result<()> {
    let view = controller.start().await;
    print_view(&view);
    print_playlists(&controller);
    if controller.message() != view.message {
        println!("{}", controller.message());
    }
    println!("{HELP}");

    let mut line = String::new();
    loop {
        line.clear();
        let read = tokio::select! {
            () = cancel.cancelled() => break,
            read = async { stdin.lock().await.read_line(&mut line).await } => read?,
        };
        if read == 0 {
            debug!("end of input");
            break;
        }

        match Input::parse(&line) {
            Some(Input::Command(command)) => {
                println!("{}", controller.dispatch(command).await);
                if matches!(command, Command::Next | Command::Previous) {
                    println!("{}", controller.current_track().await);
                }
            }
            Some(Input::Playlists) => {
                let before = controller.message().to_owned();
                controller.load_playlists().await;
                print_playlists(&controller);
                if controller.message() != before {
                    println!("{}", controller.message());
                }
            }
            Some(Input::Playlist(number)) => {
                let selected = match number.checked_sub(1) {
                    Some(index) => controller.select_playlist(index).await,
                    None => None,
                };
                match selected {
                    Some(message) => println!("{message}"),
                    None => println!("no playlist {number}"),
                }
            }
            Some(Input::Status) => print_view(&controller.view().await),
            Some(Input::Track) => println!("{}", controller.current_track().await),
            Some(Input::Quit) => break,
            None if line.trim().is_empty() => {}
            None => println!("{HELP}"),
        }
    }

    Ok(())
}

/// Main application flow.
///
/// Establishes the session, then runs the command loop. A shutdown signal at
/// any point ends the flow successfully.
///
/// # Errors
///
/// Returns an error when the configuration cannot be loaded or the session
/// cannot be established.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::from_file(&args.config)?;
    debug!("{config:#?}");

    let cancel = CancellationToken::new();
    let mut signals = signal::Handler::new()?;
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let signal = signals.recv().await;
            info!("received {signal}, shutting down gracefully");
            cancel.cancel();

            // The default handlers are gone, so a second signal has to end
            // the process itself.
            let signal = signals.recv().await;
            warn!("received {signal} again, exiting now");
            process::exit(EXIT_SIGNAL);
        }
    });

    let adapter = Adapter::new();
    if let Some(catalog) = config.loopback.clone() {
        host(&adapter, &config, catalog);
    }

    let stdin = Arc::new(Mutex::new(BufReader::new(io::stdin())));
    let authentication = match config.session.mode {
        SessionMode::Unauthenticated => Authentication::Unauthenticated,
        SessionMode::Credentials => Authentication::CredentialBased(Box::new(
            Prompt::new(Arc::clone(&stdin), io::stdout())
                .with_username(args.username.clone())
                .with_password(env::var(PASSWORD_ENV).ok())
                .with_hidden_password(std::io::stdin().is_terminal()),
        )),
    };

    let establisher = SessionEstablisher::new(
        config.media_server.proxy.clone(),
        config.media_render.proxy.clone(),
        authentication,
    )
    .with_resolver(config.resolver().with_cancellation(cancel.clone()))
    .with_log_target("spotifice::session");

    let communicator = adapter.communicator();
    let session = tokio::select! {
        () = cancel.cancelled() => return Ok(()),
        result = establisher.establish(&communicator) => match result {
            Ok(session) => session,
            Err(EstablishError::Cancelled) => return Ok(()),
            Err(e) => return Err(e.into()),
        },
    };

    let controller = Controller::new(session).with_log_target("spotifice::controller");
    command_loop(controller, stdin, cancel).await?;

    info!("quitting");
    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and starts the main application flow.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }

    // A pending stdin read would keep the runtime from shutting down.
    process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Input::parse("play\n"), Some(Input::Command(Command::Play)));
        assert_eq!(Input::parse("  prev "), Some(Input::Command(Command::Previous)));
        assert_eq!(
            Input::parse("repeat off"),
            Some(Input::Command(Command::SetRepeat(false)))
        );
        assert_eq!(Input::parse("playlist 2"), Some(Input::Playlist(2)));
        assert_eq!(Input::parse("quit"), Some(Input::Quit));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(Input::parse(""), None);
        assert_eq!(Input::parse("repeat"), None);
        assert_eq!(Input::parse("repeat maybe"), None);
        assert_eq!(Input::parse("playlist two"), None);
        assert_eq!(Input::parse("play now"), None);
        assert_eq!(Input::parse("dance"), None);
    }
}
