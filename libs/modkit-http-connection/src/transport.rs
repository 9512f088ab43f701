//! Collaborator contracts consumed by the connection.
//!
//! The connection does no socket or TLS work itself. It borrows a
//! [`Transport`] from a [`ConnectionPool`] for the length of one hop and asks
//! the [`Verifier`] about the peer when a TLS handshake goes wrong.

use crate::config::CERTIFICATE_EXPIRY_WARNING;
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::site::Site;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;

/// An open, exclusively held channel to one site.
///
/// Implementations report TLS failures as [`HttpError::Tls`] and transient
/// network failures as [`HttpError::Transport`] or [`HttpError::Timeout`];
/// only the latter two are retried.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, request: &Request) -> Result<Response, HttpError>;
}

/// Source of transports, keyed by [`Site`].
///
/// Must be safe under concurrent use: many hops from many tasks check
/// transports out and back in at the same time. Use [`PooledConnection`]
/// rather than calling these methods directly.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Hand out a transport bound to `site`, dialing a new one if needed.
    ///
    /// `verifier` is present only for TLS sites.
    async fn checkout(
        &self,
        site: &Site,
        verifier: Option<&Arc<dyn Verifier>>,
    ) -> Result<Box<dyn Transport>, HttpError>;

    /// Take back a transport previously returned by [`checkout`](Self::checkout).
    ///
    /// `poisoned` is set when a send on the transport failed during the lease.
    /// Such a transport may be half-written or desynchronized; close it rather
    /// than handing it out again.
    fn checkin(&self, site: &Site, transport: Box<dyn Transport>, poisoned: bool);
}

/// Peer certificate as reported by a [`Verifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Primary name (subject common name)
    pub name: String,
    /// Subject alternative names, in certificate order
    pub subject_alt_names: Vec<String>,
    /// End of the validity period, when known
    pub not_after: Option<SystemTime>,
}

impl Certificate {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject_alt_names: Vec::new(),
            not_after: None,
        }
    }

    #[must_use]
    pub fn with_alt_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_alt_names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_not_after(mut self, not_after: SystemTime) -> Self {
        self.not_after = Some(not_after);
        self
    }

    /// Primary name followed by every alternative name, duplicates removed.
    #[must_use]
    pub fn valid_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(1 + self.subject_alt_names.len());
        for name in std::iter::once(&self.name).chain(&self.subject_alt_names) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Pluggable TLS verification strategy.
///
/// The pool wires it into the TLS handshake; the connection only reads what
/// it observed.
pub trait Verifier: Send + Sync {
    /// Certificates presented by the peer during the last handshake, leaf last
    fn peer_certificates(&self) -> Vec<Certificate>;

    /// Human-readable verification failures collected during the last handshake
    fn verification_errors(&self) -> Vec<String>;

    /// Called after every response with the current peer certificates.
    fn warn_if_near_expiration(&self, certificates: &[Certificate]) {
        crate::tls::warn_if_near_expiration(
            certificates,
            SystemTime::now(),
            CERTIFICATE_EXPIRY_WARNING,
        );
    }
}

/// A transport checked out of a pool for the duration of one hop.
///
/// Dropping the lease returns the transport to the pool, so it is released on
/// every exit path including errors and cancellation.
pub struct PooledConnection<'p> {
    pool: &'p dyn ConnectionPool,
    site: Site,
    transport: Box<dyn Transport>,
    poisoned: bool,
}

/// Stand-in left behind once the leased transport went back to the pool.
struct Released;

#[async_trait]
impl Transport for Released {
    async fn send(&mut self, _request: &Request) -> Result<Response, HttpError> {
        Err(HttpError::Transport("transport already returned to pool".into()))
    }
}

impl<'p> PooledConnection<'p> {
    /// Check a transport for `site` out of `pool`.
    ///
    /// # Errors
    ///
    /// Propagates whatever the pool fails with (including TLS handshake errors).
    pub async fn acquire(
        pool: &'p dyn ConnectionPool,
        site: &Site,
        verifier: Option<&Arc<dyn Verifier>>,
    ) -> Result<Self, HttpError> {
        let transport = pool.checkout(site, verifier).await?;
        tracing::trace!(site = %site, "Checked out transport");
        Ok(Self {
            pool,
            site: site.clone(),
            transport,
            poisoned: false,
        })
    }

    #[must_use]
    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Exclusive access to the leased transport
    pub fn transport(&mut self) -> &mut dyn Transport {
        &mut *self.transport
    }

    /// Tell the pool on release that this transport must not be reused.
    pub fn mark_poisoned(&mut self) {
        self.poisoned = true;
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let transport = std::mem::replace(&mut self.transport, Box::new(Released));
        tracing::trace!(
            site = %self.site,
            poisoned = self.poisoned,
            "Returning transport to pool"
        );
        self.pool.checkin(&self.site, transport, self.poisoned);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::site::Scheme;
    use http::StatusCode;
    use std::sync::Mutex;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&mut self, _request: &Request) -> Result<Response, HttpError> {
            Ok(Response::new(StatusCode::OK))
        }
    }

    #[derive(Default)]
    struct CountingPool {
        checkouts: Mutex<usize>,
        checkins: Mutex<Vec<(Site, bool)>>,
    }

    #[async_trait]
    impl ConnectionPool for CountingPool {
        async fn checkout(
            &self,
            _site: &Site,
            _verifier: Option<&Arc<dyn Verifier>>,
        ) -> Result<Box<dyn Transport>, HttpError> {
            *self.checkouts.lock().unwrap() += 1;
            Ok(Box::new(EchoTransport))
        }

        fn checkin(&self, site: &Site, _transport: Box<dyn Transport>, poisoned: bool) {
            self.checkins.lock().unwrap().push((site.clone(), poisoned));
        }
    }

    #[tokio::test]
    async fn test_lease_returns_transport_on_drop() {
        let pool = CountingPool::default();
        let site = Site::new(Scheme::Https, "puppet", 8140);

        {
            let mut lease = PooledConnection::acquire(&pool, &site, None).await.unwrap();
            let response = lease
                .transport()
                .send(&Request::new(http::Method::GET, "/"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(pool.checkins.lock().unwrap().is_empty());
        }

        assert_eq!(*pool.checkouts.lock().unwrap(), 1);
        assert_eq!(*pool.checkins.lock().unwrap(), vec![(site, false)]);
    }

    #[tokio::test]
    async fn test_poisoned_lease_is_reported_on_checkin() {
        let pool = CountingPool::default();
        let site = Site::new(Scheme::Https, "puppet", 8140);

        let mut lease = PooledConnection::acquire(&pool, &site, None).await.unwrap();
        assert!(!lease.is_poisoned());
        lease.mark_poisoned();
        drop(lease);

        assert_eq!(*pool.checkins.lock().unwrap(), vec![(site, true)]);
    }

    #[tokio::test]
    async fn test_lease_returns_transport_on_error_path() {
        async fn failing_hop(pool: &CountingPool, site: &Site) -> Result<(), HttpError> {
            let _lease = PooledConnection::acquire(pool, site, None).await?;
            Err(HttpError::Timeout(std::time::Duration::from_secs(1)))
        }

        let pool = CountingPool::default();
        let site = Site::new(Scheme::Http, "a.example", 80);

        assert!(failing_hop(&pool, &site).await.is_err());
        assert_eq!(pool.checkins.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_valid_names_dedupes_and_keeps_order() {
        let cert = Certificate::new("puppet")
            .with_alt_names(["puppet", "puppet.example", "DNS:alt", "puppet.example"]);
        assert_eq!(
            cert.valid_names(),
            vec!["puppet", "puppet.example", "DNS:alt"]
        );
    }
}
