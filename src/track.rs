use std::fmt;

use serde::{Deserialize, Serialize};

/// Text shown when the renderer has no current track.
pub const NO_TRACK: &str = "No track loaded";

/// Track currently loaded on the renderer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub title: String,
}

impl Track {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Display text for an optional track: its title, or [`NO_TRACK`] when
    /// there is no track or it has an empty title.
    #[must_use]
    pub fn display(track: Option<&Track>) -> &str {
        match track {
            Some(track) if !track.title.trim().is_empty() => &track.title,
            _ => NO_TRACK,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::display(Some(self)))
    }
}

/// Playlist as listed by the media server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}
