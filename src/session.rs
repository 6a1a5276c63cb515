//! Session establishment with the media server and renderer.
//!
//! A session is established once at startup:
//! 1. resolve the media server and the media renderer proxies
//! 2. with credential-based authentication only: acquire credentials and
//!    `authenticate` the renderer against the server, yielding a token
//! 3. bind the renderer to the server, passing the token if there is one
//!
//! Both variants share the resolution, binding and failure handling; they
//! differ only in [`Authentication`]. Without a bound session nothing else is
//! meaningful, so callers should treat any [`EstablishError`] as fatal.
//!
//! # Example
//!
//! ```rust
//! use spotifice::session::{Authentication, SessionEstablisher};
//!
//! let establisher = SessionEstablisher::new(server, render, Authentication::Unauthenticated);
//! match establisher.establish(&communicator).await {
//!     Ok(session) => run(session).await,
//!     Err(e) => {
//!         error!("{e}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

use std::fmt;

use thiserror::Error;

use crate::{
    credentials::CredentialSource,
    error::Error,
    proxy::Resolver,
    remote::{Communicator, MediaRender, MediaRenderPrx, MediaServer, MediaServerPrx, ServiceReference},
};

/// Failures while establishing a session. All of them are fatal.
#[derive(Error, Debug)]
pub enum EstablishError {
    /// The object behind the reference does not support the capability.
    #[error("invalid proxy for {capability} {reference}")]
    InvalidProxy {
        capability: &'static str,
        reference: ServiceReference,
    },

    /// The endpoint kept refusing connections, up to and including the cast.
    #[error("{capability} {reference} unreachable: {source}")]
    ProxyUnreachable {
        capability: &'static str,
        reference: ServiceReference,
        source: Error,
    },

    #[error("authentication canceled by user")]
    AuthCanceled,

    #[error("empty username or password")]
    EmptyCredentials,

    /// Any other remote failure: lookup, probe, authenticate or bind.
    #[error("remote call failed: {0}")]
    RemoteCall(#[from] Error),

    /// Establishment was aborted by a shutdown request.
    #[error("session establishment cancelled")]
    Cancelled,
}

/// How the renderer is authorized when binding.
pub enum Authentication {
    /// Bind without credentials.
    Unauthenticated,

    /// Authenticate with credentials from the source, then bind with the
    /// resulting session token.
    CredentialBased(Box<dyn CredentialSource>),
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("Unauthenticated"),
            Self::CredentialBased(_) => f.write_str("CredentialBased"),
        }
    }
}

/// A renderer bound to a media server.
#[derive(Clone, Debug)]
pub struct BoundSession {
    server: MediaServerPrx,
    render: MediaRenderPrx,
}

impl BoundSession {
    #[must_use]
    pub fn server(&self) -> &MediaServerPrx {
        &self.server
    }

    #[must_use]
    pub fn render(&self) -> &MediaRenderPrx {
        &self.render
    }
}

/// Establishes sessions for a pair of service references.
#[derive(Debug)]
pub struct SessionEstablisher {
    server: ServiceReference,
    render: ServiceReference,
    authentication: Authentication,
    resolver: Resolver,
    log_target: String,
}

impl SessionEstablisher {
    #[must_use]
    pub fn new(
        server: ServiceReference,
        render: ServiceReference,
        authentication: Authentication,
    ) -> Self {
        Self {
            server,
            render,
            authentication,
            resolver: Resolver::default(),
            log_target: module_path!().to_owned(),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sets the log target this establisher reports under.
    #[must_use]
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    /// Resolves both proxies, authenticates if configured to, and binds the
    /// renderer to the server.
    ///
    /// The bind call is only made once both proxies are verified, and with
    /// credential-based authentication, with exactly the token `authenticate`
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first failure; see [`EstablishError`].
    pub async fn establish(
        &self,
        communicator: &dyn Communicator,
    ) -> Result<BoundSession, EstablishError> {
        let target = self.log_target.as_str();

        let server = self
            .resolver
            .resolve::<MediaServer>(communicator, &self.server)
            .await?;
        debug!(target: target, "media server: {}", server.reference());

        let render = self
            .resolver
            .resolve::<MediaRender>(communicator, &self.render)
            .await?;
        debug!(target: target, "media renderer: {}", render.reference());

        let token = match &self.authentication {
            Authentication::Unauthenticated => None,
            Authentication::CredentialBased(source) => {
                let credentials = source.acquire().await?;
                info!(target: target, "authenticating as {}", credentials.username());

                let token = server
                    .authenticate(&render, credentials.username(), credentials.password())
                    .await?;
                trace!(target: target, "session token: {token:?}");
                Some(token)
            }
        };

        render.bind_media_server(&server, token.as_ref()).await?;
        info!(
            target: target,
            "bound {} to {}",
            render.reference().identity(),
            server.reference().identity()
        );

        Ok(BoundSession { server, render })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        credentials::{Credentials, Prompt},
        error::{ErrorKind, Result},
        loopback::{Adapter, Catalog, LocalMediaRender, LocalMediaServer, Servant},
        remote::Capability,
    };

    /// Records every operation it receives, answering `authenticate` with a
    /// fixed token.
    #[derive(Debug, Default)]
    struct Recorder {
        type_id: &'static str,
        calls: Mutex<Vec<(String, Value)>>,
        fail_authenticate: bool,
    }

    impl Recorder {
        fn new(type_id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                type_id,
                ..Self::default()
            })
        }

        fn calls(&self, operation: &str) -> Vec<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(op, _)| op == operation)
                .map(|(_, params)| params.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Servant for Recorder {
        fn type_ids(&self) -> &[&str] {
            std::slice::from_ref(&self.type_id)
        }

        async fn dispatch(&self, operation: &str, params: Value) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_owned(), params));
            match operation {
                "authenticate" if self.fail_authenticate => {
                    Err(Error::unauthenticated("bad password"))
                }
                "authenticate" => Ok(json!({ "ssm": "0xC0FFEE", "serial": 7 })),
                _ => Ok(Value::Null),
            }
        }
    }

    struct Fixed(Option<Credentials>, Option<EstablishError>);

    #[async_trait]
    impl CredentialSource for Fixed {
        async fn acquire(&self) -> Result<Credentials, EstablishError> {
            match (&self.0, &self.1) {
                (Some(credentials), _) => Ok(credentials.clone()),
                (None, Some(EstablishError::AuthCanceled)) => Err(EstablishError::AuthCanceled),
                _ => Err(EstablishError::EmptyCredentials),
            }
        }
    }

    fn fixed(username: &str, password: &str) -> Box<dyn CredentialSource> {
        Box::new(Fixed(Some(Credentials::new(username, password).unwrap()), None))
    }

    struct Fixture {
        adapter: Adapter,
        server: Arc<Recorder>,
        render: Arc<Recorder>,
    }

    fn fixture() -> Fixture {
        let adapter = Adapter::new();
        let server = Recorder::new(MediaServer::TYPE_ID);
        let render = Recorder::new(MediaRender::TYPE_ID);
        adapter.add("mediaserver1", Arc::clone(&server) as Arc<dyn Servant>);
        adapter.add("mediarender1", Arc::clone(&render) as Arc<dyn Servant>);
        Fixture {
            adapter,
            server,
            render,
        }
    }

    fn establisher(authentication: Authentication) -> SessionEstablisher {
        SessionEstablisher::new(
            "mediaserver1 -t:tcp -p 10000".parse().unwrap(),
            "mediarender1 -t:tcp -p 10001".parse().unwrap(),
            authentication,
        )
    }

    #[tokio::test]
    async fn unauthenticated_binds_without_token() {
        let f = fixture();
        let session = establisher(Authentication::Unauthenticated)
            .establish(&f.adapter.communicator())
            .await
            .unwrap();

        assert_eq!(session.server().reference().identity(), "mediaserver1");
        assert_eq!(session.render().reference().identity(), "mediarender1");
        assert!(f.server.calls("authenticate").is_empty());

        let binds = f.render.calls("bind_media_server");
        assert_eq!(binds.len(), 1);
        assert_eq!(
            binds[0],
            json!({ "media_server": "mediaserver1 -t:tcp -p 10000" })
        );
    }

    #[tokio::test]
    async fn credential_based_binds_with_returned_token() {
        let f = fixture();
        establisher(Authentication::CredentialBased(fixed("alice", "hunter2")))
            .establish(&f.adapter.communicator())
            .await
            .unwrap();

        let auths = f.server.calls("authenticate");
        assert_eq!(auths.len(), 1);
        assert_eq!(
            auths[0],
            json!({
                "media_render": "mediarender1 -t:tcp -p 10001",
                "username": "alice",
                "password": "hunter2",
            })
        );

        let binds = f.render.calls("bind_media_server");
        assert_eq!(binds.len(), 1);
        assert_eq!(binds[0]["token"], json!({ "ssm": "0xC0FFEE", "serial": 7 }));
    }

    #[tokio::test]
    async fn empty_credentials_never_authenticate() {
        let f = fixture();
        let err = establisher(Authentication::CredentialBased(Box::new(Fixed(None, None))))
            .establish(&f.adapter.communicator())
            .await
            .unwrap_err();

        assert!(matches!(err, EstablishError::EmptyCredentials));
        assert!(f.server.calls("authenticate").is_empty());
        assert!(f.render.calls("bind_media_server").is_empty());
    }

    #[tokio::test]
    async fn empty_typed_password_never_authenticates() {
        let f = fixture();
        let input = Arc::new(tokio::sync::Mutex::new(Cursor::new(b"alice\n\n".to_vec())));
        let prompt = Prompt::new(input, Vec::new());
        let err = establisher(Authentication::CredentialBased(Box::new(prompt)))
            .establish(&f.adapter.communicator())
            .await
            .unwrap_err();

        assert!(matches!(err, EstablishError::EmptyCredentials));
        assert!(f.server.calls("authenticate").is_empty());
        assert!(f.render.calls("bind_media_server").is_empty());
    }

    #[tokio::test]
    async fn canceled_prompt_never_binds() {
        let f = fixture();
        let source = Fixed(None, Some(EstablishError::AuthCanceled));
        let err = establisher(Authentication::CredentialBased(Box::new(source)))
            .establish(&f.adapter.communicator())
            .await
            .unwrap_err();

        assert!(matches!(err, EstablishError::AuthCanceled));
        assert!(f.render.calls("bind_media_server").is_empty());
    }

    #[tokio::test]
    async fn rejected_authentication_propagates_unchanged() {
        let adapter = Adapter::new();
        let server = Arc::new(Recorder {
            type_id: MediaServer::TYPE_ID,
            fail_authenticate: true,
            ..Recorder::default()
        });
        let render = Recorder::new(MediaRender::TYPE_ID);
        adapter.add("mediaserver1", Arc::clone(&server) as Arc<dyn Servant>);
        adapter.add("mediarender1", Arc::clone(&render) as Arc<dyn Servant>);

        let err = establisher(Authentication::CredentialBased(fixed("alice", "wrong")))
            .establish(&adapter.communicator())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EstablishError::RemoteCall(ref e) if e.kind == ErrorKind::Unauthenticated
        ));
        assert!(render.calls("bind_media_server").is_empty());
    }

    #[tokio::test]
    async fn swapped_references_are_invalid_proxies() {
        let f = fixture();
        let err = SessionEstablisher::new(
            "mediarender1".parse().unwrap(),
            "mediaserver1".parse().unwrap(),
            Authentication::Unauthenticated,
        )
        .establish(&f.adapter.communicator())
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            EstablishError::InvalidProxy { capability, .. } if capability == MediaServer::NAME
        ));
        assert!(f.render.calls("bind_media_server").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_renderer_is_unreachable() {
        let adapter = Adapter::new();
        adapter.add(
            "mediaserver1",
            Recorder::new(MediaServer::TYPE_ID) as Arc<dyn Servant>,
        );

        let err = establisher(Authentication::Unauthenticated)
            .with_resolver(Resolver::new(3, Duration::from_millis(100)))
            .establish(&adapter.communicator())
            .await
            .unwrap_err();

        assert!(matches!(err, EstablishError::ProxyUnreachable { .. }), "{err}");
    }

    #[tokio::test]
    async fn local_services_require_issued_token() {
        let adapter = Adapter::new();
        let catalog: Catalog = toml::from_str(r#"Accounts = { alice = "hunter2" }"#).unwrap();
        adapter.add("mediaserver1", Arc::new(LocalMediaServer::new(catalog)));
        adapter.add(
            "mediarender1",
            Arc::new(LocalMediaRender::new("mediarender1", adapter.communicator())),
        );

        let err = establisher(Authentication::Unauthenticated)
            .establish(&adapter.communicator())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EstablishError::RemoteCall(ref e) if e.kind == ErrorKind::Unauthenticated
        ));

        let session = establisher(Authentication::CredentialBased(fixed("alice", "hunter2")))
            .establish(&adapter.communicator())
            .await
            .unwrap();
        session.render().stop().await.unwrap();
    }
}
