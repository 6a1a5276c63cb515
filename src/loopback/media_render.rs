use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{params, LoopbackCommunicator, Servant, OBJECT_TYPE_ID};
use crate::{
    error::{Error, Result},
    player::Player,
    remote::{Capability, Communicator, MediaRender, RawHandle, ServiceReference},
    track::Track,
};

const TYPE_IDS: &[&str] = &[MediaRender::TYPE_ID, OBJECT_TYPE_ID];

/// In-process media renderer.
///
/// Binding resolves the media server through the communicator and asks it
/// to vouch for the session token. Every playback command requires a bound
/// server.
pub struct LocalMediaRender {
    identity: String,
    communicator: LoopbackCommunicator,
    server: Mutex<Option<RawHandle>>,
    player: Mutex<Player>,
}

#[derive(Deserialize)]
struct BindParams {
    media_server: ServiceReference,
    #[serde(default)]
    token: Value,
}

#[derive(Deserialize)]
struct LoadPlaylistParams {
    playlist_id: String,
}

#[derive(Deserialize)]
struct RepeatParams {
    repeat: bool,
}

impl LocalMediaRender {
    #[must_use]
    pub fn new(identity: impl Into<String>, communicator: LoopbackCommunicator) -> Self {
        Self {
            identity: identity.into(),
            communicator,
            server: Mutex::new(None),
            player: Mutex::new(Player::new()),
        }
    }

    fn player(&self) -> MutexGuard<'_, Player> {
        self.player.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn server(&self) -> Result<RawHandle> {
        self.server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::failed_precondition("not bound to a media server"))
    }

    async fn bind(&self, params: BindParams) -> Result<()> {
        let server = self.communicator.resolve(&params.media_server)?;
        let valid = server
            .invoke(
                "check_token",
                json!({ "media_render": self.identity, "token": params.token }),
            )
            .await?;
        if valid != Value::Bool(true) {
            return Err(Error::unauthenticated("invalid session token"));
        }

        info!("{} bound to {}", self.identity, params.media_server.identity());
        *self.server.lock().unwrap_or_else(PoisonError::into_inner) = Some(server);
        Ok(())
    }

    async fn load_playlist(&self, playlist_id: &str) -> Result<()> {
        let tracks = self
            .server()?
            .invoke("get_playlist_tracks", json!({ "playlist_id": playlist_id }))
            .await?;
        let tracks: Vec<Track> = serde_json::from_value(tracks)?;
        self.player().set_queue(tracks);
        Ok(())
    }
}

#[async_trait]
impl Servant for LocalMediaRender {
    fn type_ids(&self) -> &[&str] {
        TYPE_IDS
    }

    async fn dispatch(&self, operation: &str, value: Value) -> Result<Value> {
        if operation == "bind_media_server" {
            self.bind(params(operation, value)?).await?;
            return Ok(Value::Null);
        }

        self.server()?;
        match operation {
            "get_status" => Ok(serde_json::to_value(self.player().status())?),
            "get_current_track" => Ok(serde_json::to_value(self.player().track())?),
            "load_playlist" => {
                let LoadPlaylistParams { playlist_id } = params(operation, value)?;
                self.load_playlist(&playlist_id).await?;
                Ok(Value::Null)
            }
            "play" => self.player().play().map(|()| Value::Null),
            "pause" => self.player().pause().map(|()| Value::Null),
            "stop" => {
                self.player().stop();
                Ok(Value::Null)
            }
            "next" => self.player().next().map(|()| Value::Null),
            "previous" => self.player().previous().map(|()| Value::Null),
            "set_repeat" => {
                let RepeatParams { repeat } = params(operation, value)?;
                self.player().set_repeat(repeat);
                Ok(Value::Null)
            }
            _ => Err(Error::unimplemented(format!("media renderer: {operation}"))),
        }
    }
}
