//! Playback state as reported by the renderer, and its display labels.
//!
//! The client never guesses playback state locally: it is only ever taken
//! from the return value of a remote call. When the renderer reports a state
//! this client does not know, or the status query itself fails, the state is
//! [`PlaybackState::Unknown`] and displays as "Ready".
//!
//! # Example
//!
//! ```rust
//! use spotifice::status::{translate_state, PlaybackState};
//!
//! assert_eq!(translate_state(PlaybackState::Paused), "Paused");
//! assert_eq!(translate_state(PlaybackState::Unknown), "Ready");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label displayed when no known playback state is available.
pub const READY: &str = "Ready";

/// Playback state of a media renderer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,

    /// Unrecognized state, or no state available at all.
    #[default]
    Unknown,
}

impl From<String> for PlaybackState {
    fn from(state: String) -> Self {
        match state.to_ascii_uppercase().as_str() {
            "PLAYING" => Self::Playing,
            "PAUSED" => Self::Paused,
            "STOPPED" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(translate_state(*self))
    }
}

/// Maps a playback state to its display label.
///
/// Total: every state has a label, with [`READY`] for anything that is not
/// playing, paused or stopped.
#[must_use]
pub fn translate_state(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Playing => "Playing",
        PlaybackState::Paused => "Paused",
        PlaybackState::Stopped => "Stopped",
        PlaybackState::Unknown => READY,
    }
}

/// Renderer status as returned by `get_status`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub state: PlaybackState,

    #[serde(default)]
    pub repeat: bool,
}
