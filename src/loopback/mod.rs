//! In-process remote-object substrate.
//!
//! Objects are [`Servant`]s registered with an [`Adapter`] under an
//! identity. A [`LoopbackCommunicator`] resolves a [`ServiceReference`] by
//! its identity and ignores any endpoint information. Calls are dispatched
//! directly to the servant; arguments and results still go through
//! [`serde_json::Value`] like on any other substrate.
//!
//! A reference whose identity has no servant behaves like an endpoint that
//! is not listening: every call fails with a refused connection. Servants
//! may be added after a reference was resolved, which makes the handle
//! reachable from then on.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use spotifice::loopback::{Adapter, Catalog, LocalMediaServer};
//!
//! let adapter = Adapter::new();
//! adapter.add("mediaserver1", Arc::new(LocalMediaServer::new(Catalog::default())));
//! let communicator = adapter.communicator();
//! ```

mod media_render;
mod media_server;

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    remote::{Communicator, ObjectHandle, RawHandle, ServiceReference},
};

pub use media_render::LocalMediaRender;
pub use media_server::{Catalog, LocalMediaServer};

/// Type identifier every object implements.
pub const OBJECT_TYPE_ID: &str = "::Ice::Object";

/// Implementation of a remote object.
#[async_trait]
pub trait Servant: Send + Sync {
    /// Type identifiers this servant implements, most derived first.
    fn type_ids(&self) -> &[&str];

    /// Handles `operation` with `params`.
    ///
    /// # Errors
    ///
    /// Servants should fail unknown operations with
    /// [`Error::unimplemented`].
    async fn dispatch(&self, operation: &str, params: Value) -> Result<Value>;
}

type Servants = Arc<RwLock<HashMap<String, Arc<dyn Servant>>>>;

/// Registry of servants by identity.
#[derive(Clone, Default)]
pub struct Adapter {
    servants: Servants,
}

impl Adapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `servant` under `identity`, replacing any previous one.
    pub fn add(&self, identity: impl Into<String>, servant: Arc<dyn Servant>) {
        let identity = identity.into();
        debug!("adding servant {identity}");
        self.servants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity, servant);
    }

    /// Unregisters the servant under `identity`, if any.
    pub fn remove(&self, identity: &str) -> Option<Arc<dyn Servant>> {
        self.servants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
    }

    #[must_use]
    pub fn communicator(&self) -> LoopbackCommunicator {
        LoopbackCommunicator {
            servants: Arc::clone(&self.servants),
        }
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let servants = self.servants.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Adapter")
            .field("identities", &servants.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// [`Communicator`] over the servants of an [`Adapter`].
#[derive(Clone)]
pub struct LoopbackCommunicator {
    servants: Servants,
}

impl Communicator for LoopbackCommunicator {
    fn resolve(&self, reference: &ServiceReference) -> Result<RawHandle> {
        Ok(Arc::new(Handle {
            reference: reference.clone(),
            servants: Arc::clone(&self.servants),
        }))
    }
}

impl fmt::Debug for LoopbackCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackCommunicator").finish_non_exhaustive()
    }
}

struct Handle {
    reference: ServiceReference,
    servants: Servants,
}

impl Handle {
    fn servant(&self) -> Result<Arc<dyn Servant>> {
        self.servants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(self.reference.identity())
            .cloned()
            .ok_or_else(|| Error::connection_refused(self.reference.identity()))
    }
}

#[async_trait]
impl ObjectHandle for Handle {
    fn reference(&self) -> &ServiceReference {
        &self.reference
    }

    async fn ping(&self) -> Result<()> {
        self.servant().map(|_| ())
    }

    async fn is_a(&self, type_id: &str) -> Result<bool> {
        let servant = self.servant()?;
        Ok(type_id == OBJECT_TYPE_ID || servant.type_ids().iter().any(|id| *id == type_id))
    }

    async fn invoke(&self, operation: &str, params: Value) -> Result<Value> {
        let servant = self.servant()?;
        servant.dispatch(operation, params).await
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

/// Deserializes operation parameters, reporting failures as invalid
/// arguments of `operation`.
pub(crate) fn params<T>(operation: &str, params: Value) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(params)
        .map_err(|e| Error::invalid_argument(format!("{operation}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Echo;

    #[async_trait]
    impl Servant for Echo {
        fn type_ids(&self) -> &[&str] {
            &["::Test::Echo"]
        }

        async fn dispatch(&self, operation: &str, params: Value) -> Result<Value> {
            match operation {
                "echo" => Ok(params),
                _ => Err(Error::unimplemented(operation.to_owned())),
            }
        }
    }

    #[tokio::test]
    async fn unregistered_identity_refuses_connections() {
        let adapter = Adapter::new();
        let handle = adapter
            .communicator()
            .resolve(&"echo1 -t:tcp -p 4061".parse().unwrap())
            .unwrap();

        let err = handle.ping().await.unwrap_err();
        assert!(err.is_connection_refused());
        assert!(handle.is_a("::Test::Echo").await.unwrap_err().is_connection_refused());

        adapter.add("echo1", Arc::new(Echo));
        handle.ping().await.unwrap();
        assert!(handle.is_a("::Test::Echo").await.unwrap());
        assert!(handle.is_a(OBJECT_TYPE_ID).await.unwrap());
        assert!(!handle.is_a("::Test::Other").await.unwrap());

        adapter.remove("echo1");
        assert!(handle.ping().await.unwrap_err().is_connection_refused());
    }

    #[tokio::test]
    async fn invoke_dispatches_to_servant() {
        let adapter = Adapter::new();
        adapter.add("echo1", Arc::new(Echo));
        let handle = adapter
            .communicator()
            .resolve(&"echo1".parse().unwrap())
            .unwrap();

        let value = serde_json::json!({ "hello": "world" });
        assert_eq!(handle.invoke("echo", value.clone()).await.unwrap(), value);

        let err = handle.invoke("shout", Value::Null).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unimplemented);
    }
}
