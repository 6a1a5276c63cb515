//! Remote-object substrate and typed proxies.
//!
//! The client never talks to a transport directly. It relies on a substrate
//! that can:
//! * turn a [`ServiceReference`] into a raw object handle ([`Communicator`])
//! * probe that handle for reachability ([`ObjectHandle::ping`])
//! * ask whether it implements a type ([`ObjectHandle::is_a`])
//! * invoke named operations on it ([`ObjectHandle::invoke`])
//!
//! Typed access is layered on top through [`Proxy`], parameterized by a
//! [`Capability`] marker. A `Proxy<MediaServer>` can only be obtained through
//! [`Proxy::checked_cast`], so holding one means the remote object confirmed
//! it supports the media server operations.
//!
//! Operation parameters and results travel as [`serde_json::Value`]. Proxies
//! passed as arguments are encoded as their reference strings.
//!
//! # Example
//!
//! ```rust
//! use spotifice::remote::{Communicator, MediaRender, Proxy};
//!
//! async fn bind(communicator: &dyn Communicator) -> spotifice::error::Result<()> {
//!     let handle = communicator.resolve(&"mediarender1".parse()?)?;
//!     if let Some(render) = Proxy::<MediaRender>::checked_cast(handle).await? {
//!         render.play().await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::{fmt, marker::PhantomData, str::FromStr, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{Error, Result},
    status::Status,
    token::SessionToken,
    track::{Playlist, Track},
};

/// Address and identity of a remote object.
///
/// Opaque to the client apart from its identity, which is the first
/// whitespace-separated token: `mediaserver1 -t:tcp -h localhost -p 10000`
/// has identity `mediaserver1`. The remainder is endpoint information for the
/// substrate to interpret.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceReference(String);

impl ServiceReference {
    /// Returns the object identity part of the reference.
    #[must_use]
    pub fn identity(&self) -> &str {
        // Non-empty by construction.
        self.0.split_whitespace().next().unwrap_or_default()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ServiceReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let reference = s.trim();
        if reference.is_empty() {
            return Err(Error::invalid_argument("service reference is empty"));
        }

        Ok(Self(reference.to_owned()))
    }
}

impl TryFrom<String> for ServiceReference {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ServiceReference> for String {
    fn from(reference: ServiceReference) -> Self {
        reference.0
    }
}

impl fmt::Display for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unverified handle to a remote object.
///
/// Every call may fail with a connection error; a handle says nothing about
/// whether the object is reachable or what it implements.
#[async_trait]
pub trait ObjectHandle: fmt::Debug + Send + Sync {
    /// The reference this handle was resolved from.
    fn reference(&self) -> &ServiceReference;

    /// Zero-argument reachability probe.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::connection_refused`] when the endpoint does not
    /// accept connections, or any other error the substrate reports.
    async fn ping(&self) -> Result<()>;

    /// Returns whether the remote object implements `type_id`.
    async fn is_a(&self, type_id: &str) -> Result<bool>;

    /// Invokes `operation` with `params` and returns its result.
    async fn invoke(&self, operation: &str, params: Value) -> Result<Value>;
}

/// A resolved but unverified remote object.
pub type RawHandle = Arc<dyn ObjectHandle>;

/// Reference lookup of the remote-object substrate.
pub trait Communicator: Send + Sync {
    /// Translates `reference` into a raw handle.
    ///
    /// This is a local operation: it does not contact the remote object.
    ///
    /// # Errors
    ///
    /// Fails when the reference cannot be interpreted by the substrate.
    fn resolve(&self, reference: &ServiceReference) -> Result<RawHandle>;
}

/// Operation set a remote object can be narrowed to.
pub trait Capability: Send + Sync + 'static {
    /// Type identifier checked with [`ObjectHandle::is_a`].
    const TYPE_ID: &'static str;

    /// Human-readable name for logs and errors.
    const NAME: &'static str;
}

/// Capability of the media server: catalog and authentication.
#[derive(Debug)]
pub enum MediaServer {}

impl Capability for MediaServer {
    const TYPE_ID: &'static str = "::Spotifice::MediaServer";
    const NAME: &'static str = "media server";
}

/// Capability of the media renderer: playback.
#[derive(Debug)]
pub enum MediaRender {}

impl Capability for MediaRender {
    const TYPE_ID: &'static str = "::Spotifice::MediaRender";
    const NAME: &'static str = "media renderer";
}

/// Handle to a remote object verified to support capability `C`.
pub struct Proxy<C: Capability> {
    handle: RawHandle,
    capability: PhantomData<fn() -> C>,
}

impl<C: Capability> Proxy<C> {
    /// Narrows `handle` to capability `C`.
    ///
    /// Returns `Ok(None)` when the remote object does not implement `C`.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the remote type check.
    pub async fn checked_cast(handle: RawHandle) -> Result<Option<Self>> {
        if handle.is_a(C::TYPE_ID).await? {
            Ok(Some(Self {
                handle,
                capability: PhantomData,
            }))
        } else {
            Ok(None)
        }
    }

    #[must_use]
    pub fn reference(&self) -> &ServiceReference {
        self.handle.reference()
    }

    async fn call<T>(&self, operation: &str, params: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        trace!("{} {}: {operation}", C::NAME, self.reference().identity());
        let result = self.handle.invoke(operation, params).await?;
        serde_json::from_value(result).map_err(Into::into)
    }
}

impl Proxy<MediaServer> {
    /// Authenticates `render` against this server and returns the session
    /// token to bind with.
    pub async fn authenticate(
        &self,
        render: &Proxy<MediaRender>,
        username: &str,
        password: &str,
    ) -> Result<SessionToken> {
        self.call(
            "authenticate",
            json!({
                "media_render": render.reference(),
                "username": username,
                "password": password,
            }),
        )
        .await
    }

    pub async fn get_all_playlists(&self) -> Result<Vec<Playlist>> {
        self.call("get_all_playlists", Value::Null).await
    }
}

impl Proxy<MediaRender> {
    /// Binds this renderer to `server`.
    ///
    /// Without a token the `token` parameter is omitted entirely, which is
    /// what unauthenticated servers expect.
    pub async fn bind_media_server(
        &self,
        server: &Proxy<MediaServer>,
        token: Option<&SessionToken>,
    ) -> Result<()> {
        let mut params = json!({ "media_server": server.reference() });
        if let (Some(token), Value::Object(map)) = (token, &mut params) {
            map.insert("token".to_owned(), token.to_value());
        }

        self.call("bind_media_server", params).await
    }

    pub async fn get_status(&self) -> Result<Status> {
        self.call("get_status", Value::Null).await
    }

    /// Returns the current track, or `None` when nothing is loaded.
    pub async fn get_current_track(&self) -> Result<Option<Track>> {
        self.call("get_current_track", Value::Null).await
    }

    pub async fn play(&self) -> Result<()> {
        self.call("play", Value::Null).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call("pause", Value::Null).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.call("stop", Value::Null).await
    }

    pub async fn next(&self) -> Result<()> {
        self.call("next", Value::Null).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.call("previous", Value::Null).await
    }

    pub async fn load_playlist(&self, playlist_id: &str) -> Result<()> {
        self.call("load_playlist", json!({ "playlist_id": playlist_id }))
            .await
    }

    pub async fn set_repeat(&self, repeat: bool) -> Result<()> {
        self.call("set_repeat", json!({ "repeat": repeat })).await
    }
}

impl<C: Capability> Clone for Proxy<C> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            capability: PhantomData,
        }
    }
}

impl<C: Capability> fmt::Debug for Proxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("capability", &C::NAME)
            .field("reference", self.reference())
            .finish()
    }
}

pub type MediaServerPrx = Proxy<MediaServer>;
pub type MediaRenderPrx = Proxy<MediaRender>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_identity_is_first_token() {
        let reference: ServiceReference = "  mediaserver1 -t:tcp -h localhost -p 10000 "
            .parse()
            .unwrap();
        assert_eq!(reference.identity(), "mediaserver1");
        assert_eq!(
            reference.as_str(),
            "mediaserver1 -t:tcp -h localhost -p 10000"
        );
    }

    #[test]
    fn empty_reference_is_rejected() {
        assert!("   ".parse::<ServiceReference>().is_err());
        assert!(serde_json::from_value::<ServiceReference>(json!("")).is_err());
    }

    #[test]
    fn reference_serializes_as_plain_string() {
        let reference: ServiceReference = "mediarender1".parse().unwrap();
        assert_eq!(serde_json::to_value(&reference).unwrap(), json!("mediarender1"));
    }
}
