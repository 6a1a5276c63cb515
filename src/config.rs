//! Connection configuration.
//!
//! The configuration is a small TOML file naming the two services to connect
//! to, and optionally how to authenticate and how patiently to probe them:
//!
//! ```toml
//! MediaServer.Proxy = "mediaserver1 -t:tcp -h localhost -p 10000"
//! MediaRender.Proxy = "mediarender1 -t:tcp -h localhost -p 10001"
//!
//! [Session]
//! Mode = "credentials"
//!
//! [Probe]
//! Attempts = 5
//! IntervalMs = 500
//! ```
//!
//! A `[Loopback]` section hosts a media server and renderer in-process under
//! the identities of the two references, serving the playlists and accounts
//! it lists.

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};

use crate::{
    error::{Error, Result},
    loopback::Catalog,
    proxy::Resolver,
    remote::ServiceReference,
};

/// Configuration files larger than this are rejected unread.
pub const MAX_FILE_SIZE: u64 = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(rename = "MediaServer")]
    pub media_server: Service,

    #[serde(rename = "MediaRender")]
    pub media_render: Service,

    #[serde(default, rename = "Session")]
    pub session: Session,

    #[serde(default, rename = "Probe")]
    pub probe: Probe,

    #[serde(default, rename = "Loopback")]
    pub loopback: Option<Catalog>,
}

/// A service the client connects to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Service {
    #[serde(rename = "Proxy")]
    pub proxy: ServiceReference,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Bind the renderer without a session token.
    #[default]
    Unauthenticated,

    /// Ask for credentials and bind with the token the server issues.
    Credentials,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Session {
    #[serde(default, rename = "Mode")]
    pub mode: SessionMode,
}

/// Reachability probing before each proxy is cast.
#[serde_as]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct Probe {
    #[serde(rename = "Attempts")]
    pub attempts: u32,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "IntervalMs")]
    pub interval: Duration,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            attempts: Resolver::DEFAULT_ATTEMPTS,
            interval: Resolver::DEFAULT_INTERVAL,
        }
    }
}

impl Config {
    /// Loads the configuration from `path`.
    ///
    /// # Errors
    ///
    /// * `NotFound` and other I/O errors if the file cannot be read
    /// * `InvalidArgument` if it is too large, not valid TOML, or has a
    ///   missing or invalid property
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: the file should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > MAX_FILE_SIZE {
            return Err(Error::invalid_argument(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        contents.parse().map_err(|e: Error| {
            Error::invalid_argument(format!("{} is invalid: {}", path.display(), e.error))
        })
    }

    /// Returns a resolver probing as configured.
    #[must_use]
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.probe.attempts, self.probe.interval)
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        if config.probe.attempts == 0 {
            return Err(Error::invalid_argument(
                "Probe.Attempts must be at least 1",
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const MINIMAL: &str = r#"
        MediaServer.Proxy = "mediaserver1 -t:tcp -h localhost -p 10000"
        MediaRender.Proxy = "mediarender1 -t:tcp -h localhost -p 10001"
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = MINIMAL.parse().unwrap();
        assert_eq!(config.media_server.proxy.identity(), "mediaserver1");
        assert_eq!(config.media_render.proxy.identity(), "mediarender1");
        assert_eq!(config.session.mode, SessionMode::Unauthenticated);
        assert_eq!(config.probe, Probe::default());
        assert!(config.loopback.is_none());

        let resolver = config.resolver();
        assert_eq!(resolver.attempts(), 5);
        assert_eq!(resolver.interval(), Duration::from_millis(500));
    }

    #[test]
    fn full_config() {
        let config: Config = format!(
            r#"{MINIMAL}
            [Session]
            Mode = "credentials"

            [Probe]
            Attempts = 3
            IntervalMs = 250

            [Loopback]
            Accounts = {{ alice = "hunter2" }}

            [[Loopback.Playlist]]
            Id = "road"
            Name = "Road trip"
            Tracks = ["Highway Star"]
            "#
        )
        .parse()
        .unwrap();

        assert_eq!(config.session.mode, SessionMode::Credentials);
        assert_eq!(config.probe.attempts, 3);
        assert_eq!(config.probe.interval, Duration::from_millis(250));

        let debug = format!("{config:#?}");
        assert!(!debug.contains("hunter2"), "{debug}");

        let catalog = config.loopback.unwrap();
        assert_eq!(catalog.playlists[0].name, "Road trip");
        assert_eq!(catalog.accounts["alice"], "hunter2");
    }

    #[test]
    fn missing_property_is_named() {
        let err = r#"MediaServer.Proxy = "mediaserver1""#
            .parse::<Config>()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("MediaRender"), "{err}");
    }

    #[test]
    fn empty_reference_is_invalid() {
        let err = r#"
            MediaServer.Proxy = "mediaserver1"
            MediaRender.Proxy = "  "
        "#
        .parse::<Config>()
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn unknown_session_mode_is_invalid() {
        let err = format!("{MINIMAL}\n[Session]\nMode = \"magic\"\n")
            .parse::<Config>()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn zero_attempts_are_invalid() {
        let err = format!("{MINIMAL}\n[Probe]\nAttempts = 0\n")
            .parse::<Config>()
            .unwrap_err();
        assert!(err.to_string().contains("Probe.Attempts"), "{err}");
    }
}
