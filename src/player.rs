use crate::{
    error::{Error, Result},
    status::{PlaybackState, Status},
    track::Track,
};

/// Playback state machine of a renderer: a queue of tracks, a position in
/// it, and whether it is playing.
#[derive(Clone, Debug, Default)]
pub struct Player {
    queue: Vec<Track>,
    position: usize,
    state: PlaybackState,
    repeat: bool,
}

impl Player {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the queue and rewinds to its first track, stopped.
    pub fn set_queue(&mut self, queue: Vec<Track>) {
        debug!("queue set to {} tracks", queue.len());
        self.queue = queue;
        self.position = 0;
        self.state = PlaybackState::Stopped;
    }

    #[must_use]
    pub fn track(&self) -> Option<&Track> {
        self.queue.get(self.position)
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status {
            state: self.state,
            repeat: self.repeat,
        }
    }

    pub fn play(&mut self) -> Result<()> {
        if self.track().is_none() {
            return Err(Error::failed_precondition("no track loaded"));
        }

        self.state = PlaybackState::Playing;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.state = PlaybackState::Paused;
                Ok(())
            }
            state => Err(Error::failed_precondition(format!(
                "cannot pause while {}",
                state.to_string().to_lowercase()
            ))),
        }
    }

    pub fn stop(&mut self) {
        if self.track().is_some() {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Skips to the next track.
    ///
    /// Past the end of the queue this wraps around when repeating, and stops
    /// on the last track otherwise.
    pub fn next(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(Error::failed_precondition("no track loaded"));
        }

        if self.position + 1 < self.queue.len() {
            self.position += 1;
        } else if self.repeat {
            self.position = 0;
        } else {
            self.state = PlaybackState::Stopped;
        }

        Ok(())
    }

    /// Skips to the previous track, wrapping around to the last track when
    /// repeating.
    pub fn previous(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(Error::failed_precondition("no track loaded"));
        }

        if self.position > 0 {
            self.position -= 1;
        } else if self.repeat {
            self.position = self.queue.len() - 1;
        }

        Ok(())
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        debug!("setting repeat to {repeat}");
        self.repeat = repeat;
    }
}
