use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use veil::Redact;

use super::{params, Servant, OBJECT_TYPE_ID};
use crate::{
    error::{Error, Result},
    remote::{Capability, MediaServer, ServiceReference},
    track::{Playlist, Track},
};

/// Playlists and accounts served by a [`LocalMediaServer`].
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Redact)]
pub struct Catalog {
    /// Playlists in display order.
    #[serde(default, rename = "Playlist")]
    pub playlists: Vec<CatalogPlaylist>,

    /// Username to password. Empty means the server accepts anyone.
    #[serde(default, rename = "Accounts")]
    #[redact]
    pub accounts: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CatalogPlaylist {
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(default, rename = "Tracks")]
    pub tracks: Vec<String>,
}

const TYPE_IDS: &[&str] = &[MediaServer::TYPE_ID, OBJECT_TYPE_ID];

/// In-process media server.
///
/// Besides the client-facing operations it answers two operations used by
/// renderers: `get_playlist_tracks` and `check_token`.
pub struct LocalMediaServer {
    catalog: Catalog,
    sessions: Mutex<HashMap<String, String>>,
    serial: AtomicU64,
}

#[derive(Deserialize)]
struct AuthenticateParams {
    media_render: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct PlaylistParams {
    playlist_id: String,
}

#[derive(Deserialize)]
struct CheckTokenParams {
    media_render: String,
    token: Option<String>,
}

impl LocalMediaServer {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            sessions: Mutex::new(HashMap::new()),
            serial: AtomicU64::new(1),
        }
    }

    fn requires_authentication(&self) -> bool {
        !self.catalog.accounts.is_empty()
    }

    fn authenticate(&self, params: AuthenticateParams) -> Result<Value> {
        match self.catalog.accounts.get(&params.username) {
            Some(password) if *password == params.password => {}
            _ => {
                warn!("rejected credentials for {}", params.username);
                return Err(Error::unauthenticated("invalid username or password"));
            }
        }

        let token = format!(
            "ssm-{:08x}",
            self.serial.fetch_add(1, Ordering::Relaxed)
        );
        let render: ServiceReference = params.media_render.parse()?;
        info!("{} authenticated {render}", params.username);
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), render.identity().to_owned());

        Ok(json!(token))
    }

    /// Whether `token` was issued to the renderer with the given identity.
    fn check_token(&self, params: CheckTokenParams) -> bool {
        if !self.requires_authentication() {
            return true;
        }

        params.token.is_some_and(|token| {
            self.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&token)
                .is_some_and(|identity| *identity == params.media_render)
        })
    }

    fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        self.catalog
            .playlists
            .iter()
            .find(|playlist| playlist.id == playlist_id)
            .map(|playlist| playlist.tracks.iter().map(Track::new).collect())
            .ok_or_else(|| Error::not_found(format!("playlist {playlist_id} not found")))
    }
}

#[async_trait]
impl Servant for LocalMediaServer {
    fn type_ids(&self) -> &[&str] {
        TYPE_IDS
    }

    async fn dispatch(&self, operation: &str, value: Value) -> Result<Value> {
        match operation {
            "authenticate" => self.authenticate(params(operation, value)?),
            "get_all_playlists" => {
                let playlists: Vec<Playlist> = self
                    .catalog
                    .playlists
                    .iter()
                    .map(|playlist| Playlist {
                        id: playlist.id.clone(),
                        name: playlist.name.clone(),
                    })
                    .collect();
                Ok(serde_json::to_value(playlists)?)
            }
            "get_playlist_tracks" => {
                let PlaylistParams { playlist_id } = params(operation, value)?;
                Ok(serde_json::to_value(self.playlist_tracks(&playlist_id)?)?)
            }
            "check_token" => Ok(json!(self.check_token(params(operation, value)?))),
            _ => Err(Error::unimplemented(format!("media server: {operation}"))),
        }
    }
}
