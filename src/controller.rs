//! Playback commands on a bound session.
//!
//! The controller is where remote failures stop. Every operation catches the
//! failure of its remote calls, logs it, and turns it into the status
//! message the user sees, so a failing renderer or server never ends the
//! program once the session is established.
//!
//! # Example
//!
//! ```rust
//! use spotifice::controller::{Command, Controller};
//!
//! let mut controller = Controller::new(session);
//! let view = controller.load_initial_state().await;
//! println!("{} | {}", view.label(), view.track);
//!
//! println!("{}", controller.dispatch(Command::Play).await);
//! ```

use std::fmt;

use crate::{
    error::Result,
    session::BoundSession,
    status::{translate_state, PlaybackState},
    track::{Playlist, Track, NO_TRACK},
};

/// A playback command on the renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SetRepeat(bool),
}

impl Command {
    /// Name of the action as it appears in failure messages.
    #[must_use]
    pub fn action(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::SetRepeat(_) => "repeat",
        }
    }

    fn success(self) -> &'static str {
        match self {
            Self::Play => "Playing",
            Self::Pause => "Paused",
            Self::Stop => "Stopped",
            Self::Next => "Next track",
            Self::Previous => "Previous track",
            Self::SetRepeat(true) => "Repeat On",
            Self::SetRepeat(false) => "Repeat Off",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// What the presentation layer shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    /// Highlighted playback state.
    pub state: PlaybackState,
    pub repeat: bool,
    pub track: String,

    /// Status bar message.
    pub message: String,
}

impl View {
    /// Display label of the playback state.
    #[must_use]
    pub fn label(&self) -> &'static str {
        translate_state(self.state)
    }
}

/// Playback facade over a [`BoundSession`].
#[derive(Debug)]
pub struct Controller {
    session: BoundSession,
    playlists: Vec<Playlist>,
    state: PlaybackState,
    repeat: bool,
    message: String,
    log_target: String,
}

impl Controller {
    #[must_use]
    pub fn new(session: BoundSession) -> Self {
        Self {
            session,
            playlists: Vec::new(),
            state: PlaybackState::Unknown,
            repeat: false,
            message: translate_state(PlaybackState::Unknown).to_owned(),
            log_target: module_path!().to_owned(),
        }
    }

    /// Sets the log target this controller reports under.
    #[must_use]
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    #[must_use]
    pub fn session(&self) -> &BoundSession {
        &self.session
    }

    /// The last status message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Playlists as of the last [`load_playlists`](Self::load_playlists).
    #[must_use]
    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    /// Queries the renderer for its state and current track.
    ///
    /// If the status query fails, the state is unknown and displays as
    /// "Ready", and the message says what went wrong.
    pub async fn load_initial_state(&mut self) -> View {
        match self.refresh_status().await {
            Ok(()) => self.message = translate_state(self.state).to_owned(),
            Err(e) => {
                error!(target: self.log_target.as_str(), "error loading initial state: {e}");
                self.message = format!("Error loading initial state: {e}");
            }
        }

        self.snapshot().await
    }

    /// Startup sequence: the initial state, then the playlists, then the
    /// first playlist loaded into the renderer.
    ///
    /// Returns the view from before the playlist is loaded. The outcome of
    /// loading it is left in [`message`](Self::message).
    pub async fn start(&mut self) -> View {
        let view = self.load_initial_state().await;
        self.load_playlists().await;
        self.select_playlist(0).await;
        view
    }

    /// Current view, querying the renderer for its state and current track.
    ///
    /// A failed status query leaves the state unknown and the status message
    /// untouched.
    pub async fn view(&mut self) -> View {
        if let Err(e) = self.refresh_status().await {
            error!(target: self.log_target.as_str(), "error getting status: {e}");
        }

        self.snapshot().await
    }

    /// Takes state and repeat mode from the renderer, or forgets the state if
    /// the renderer cannot say.
    async fn refresh_status(&mut self) -> Result<()> {
        match self.session.render().get_status().await {
            Ok(status) => {
                self.state = status.state;
                self.repeat = status.repeat;
                Ok(())
            }
            Err(e) => {
                self.state = PlaybackState::Unknown;
                Err(e)
            }
        }
    }

    async fn snapshot(&self) -> View {
        View {
            state: self.state,
            repeat: self.repeat,
            track: self.current_track().await,
            message: self.message.clone(),
        }
    }

    /// Title of the current track, or "No track loaded" if there is none or
    /// it cannot be queried.
    pub async fn current_track(&self) -> String {
        match self.session.render().get_current_track().await {
            Ok(track) => Track::display(track.as_ref()).to_owned(),
            Err(e) => {
                error!(target: self.log_target.as_str(), "error getting current track: {e}");
                NO_TRACK.to_owned()
            }
        }
    }

    /// Fetches the playlists from the server.
    ///
    /// On failure the list is left empty and the message says why.
    pub async fn load_playlists(&mut self) -> &[Playlist] {
        match self.session.server().get_all_playlists().await {
            Ok(playlists) => {
                debug!(target: self.log_target.as_str(), "loaded {} playlists", playlists.len());
                self.playlists = playlists;
            }
            Err(e) => {
                error!(target: self.log_target.as_str(), "error loading playlists: {e}");
                self.playlists.clear();
                self.message = format!("Error loading playlists: {e}");
            }
        }

        &self.playlists
    }

    /// Stops playback and loads the playlist at `index` of
    /// [`playlists`](Self::playlists).
    ///
    /// Returns `None` without doing anything if there is no such playlist,
    /// and the status message otherwise.
    pub async fn select_playlist(&mut self, index: usize) -> Option<&str> {
        let playlist = self.playlists.get(index)?.clone();

        let render = self.session.render();
        let result = match render.stop().await {
            Ok(()) => render.load_playlist(&playlist.id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(target: self.log_target.as_str(), "loaded playlist {}", playlist.id);
                self.message = format!("Loaded playlist: {}", playlist.name);
            }
            Err(e) => {
                error!(target: self.log_target.as_str(), "error loading playlist {}: {e}", playlist.id);
                self.message = format!("Error loading playlist: {e}");
            }
        }

        Some(&self.message)
    }

    /// Sends `command` to the renderer and returns the resulting status
    /// message.
    pub async fn dispatch(&mut self, command: Command) -> &str {
        let render = self.session.render();
        let result = match command {
            Command::Play => render.play().await,
            Command::Pause => render.pause().await,
            Command::Stop => render.stop().await,
            Command::Next => render.next().await,
            Command::Previous => render.previous().await,
            Command::SetRepeat(repeat) => render.set_repeat(repeat).await,
        };

        self.report(command, result)
    }

    /// Turns the outcome of `command` into the status message.
    fn report(&mut self, command: Command, result: Result<()>) -> &str {
        self.message = match result {
            Ok(()) => {
                debug!(target: self.log_target.as_str(), "{command} succeeded");
                command.success().to_owned()
            }
            Err(e) => {
                error!(target: self.log_target.as_str(), "error in {command}(): {e}");
                format!("Error in {command}(): {e}")
            }
        };

        &self.message
    }
}
