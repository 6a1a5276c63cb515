//! Resolution of service references into verified proxies.
//!
//! Resolving a reference:
//! 1. looks the reference up through the [`Communicator`]
//! 2. probes the object with `ping`, retrying while the endpoint refuses
//!    connections
//! 3. check-casts the handle to the requested [`Capability`]
//!
//! The probe exists to ride out endpoints that are still starting up. It
//! does not have to succeed: once the attempts are used up the cast is made
//! anyway, and whatever error the cast runs into is what the caller sees.
//! Any failure other than a refused connection ends the probe immediately.
//!
//! # Example
//!
//! ```rust
//! use spotifice::{proxy::Resolver, remote::MediaServer};
//!
//! let resolver = Resolver::default();
//! let server = resolver
//!     .resolve::<MediaServer>(&communicator, &reference)
//!     .await?;
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    remote::{Capability, Communicator, Proxy, ServiceReference},
    session::EstablishError,
};

/// Resolves service references into proxies, probing for reachability.
#[derive(Clone, Debug)]
pub struct Resolver {
    attempts: u32,
    interval: Duration,
    cancel: CancellationToken,
}

impl Resolver {
    /// Default number of reachability probes.
    pub const DEFAULT_ATTEMPTS: u32 = 5;

    /// Default pause after a refused probe.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    /// Creates a resolver that probes `attempts` times, pausing `interval`
    /// after every refused probe.
    #[must_use]
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts resolution when `cancel` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Resolves `reference` into a proxy supporting capability `C`.
    ///
    /// # Errors
    ///
    /// * [`EstablishError::InvalidProxy`] if the object does not support `C`
    /// * [`EstablishError::ProxyUnreachable`] if the cast is refused too
    /// * [`EstablishError::Cancelled`] if cancelled while probing or casting
    /// * [`EstablishError::RemoteCall`] for lookup failures, non-refusal
    ///   probe failures and cast failures
    pub async fn resolve<C: Capability>(
        &self,
        communicator: &dyn Communicator,
        reference: &ServiceReference,
    ) -> Result<Proxy<C>, EstablishError> {
        let handle = communicator.resolve(reference)?;

        for attempt in 1..=self.attempts {
            let probe = tokio::select! {
                () = self.cancel.cancelled() => return Err(EstablishError::Cancelled),
                probe = handle.ping() => probe,
            };

            match probe {
                Ok(()) => {
                    trace!("{} {reference} reachable after {attempt} probe(s)", C::NAME);
                    break;
                }
                Err(e) if e.is_connection_refused() => {
                    trace!(
                        "{} {reference} refused probe {attempt}/{}",
                        C::NAME,
                        self.attempts
                    );
                    tokio::select! {
                        () = self.cancel.cancelled() => return Err(EstablishError::Cancelled),
                        () = tokio::time::sleep(self.interval) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let cast = tokio::select! {
            () = self.cancel.cancelled() => return Err(EstablishError::Cancelled),
            cast = Proxy::<C>::checked_cast(handle) => cast,
        };

        let cast = match cast {
            Err(e) if e.is_connection_refused() => {
                return Err(EstablishError::ProxyUnreachable {
                    capability: C::NAME,
                    reference: reference.clone(),
                    source: e,
                })
            }
            result => result?,
        };

        cast.ok_or_else(|| EstablishError::InvalidProxy {
            capability: C::NAME,
            reference: reference.clone(),
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}
