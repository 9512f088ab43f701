use crate::config::{BasicAuth, ConnectionOptions, DEFAULT_RETRY_BACKOFF};
use crate::connection::Connection;
use crate::error::HttpError;
use crate::site::{Scheme, Site};
use crate::transport::{ConnectionPool, Verifier};
use std::sync::Arc;
use std::time::Duration;

/// Builder for a [`Connection`].
///
/// Option maps passed to [`options_value`](Self::options_value) are validated
/// when [`build`](Self::build) runs, so a bad key fails construction before
/// the pool is ever touched.
pub struct ConnectionBuilder {
    host: String,
    port: u16,
    pool: Arc<dyn ConnectionPool>,
    options: ConnectionOptions,
    retry_backoff: Duration,
    /// Error captured during building (deferred to `build()`)
    error: Option<HttpError>,
}

impl ConnectionBuilder {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            host: host.into(),
            port,
            pool,
            options: ConnectionOptions::default(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            error: None,
        }
    }

    /// Replace all options at once
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace all options with ones loaded from a JSON object.
    ///
    /// A verifier set earlier with [`verifier`](Self::verifier) is kept.
    #[must_use]
    pub fn options_value(mut self, value: serde_json::Value) -> Self {
        if self.error.is_some() {
            return self;
        }

        match ConnectionOptions::from_value(value) {
            Ok(mut options) => {
                options.verify = self.options.verify.take();
                self.options = options;
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    #[must_use]
    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.options.use_ssl = use_ssl;
        self
    }

    /// Verification strategy for TLS sites
    #[must_use]
    pub fn verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.options.verify = Some(verifier);
        self
    }

    #[must_use]
    pub fn redirect_limit(mut self, limit: usize) -> Self {
        self.options.redirect_limit = limit;
        self
    }

    #[must_use]
    pub fn retry_limit(mut self, limit: usize) -> Self {
        self.options.retry_limit = limit;
        self
    }

    #[must_use]
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.basic_auth = Some(BasicAuth::new(user, password));
        self
    }

    /// Retry every method, not only GET and HEAD
    #[must_use]
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.options.idempotent = idempotent;
        self
    }

    /// Keep `Authorization` and `Cookie` on redirects to other hosts
    #[must_use]
    pub fn trust_redirects(mut self, trust: bool) -> Self {
        self.options.trust_redirects = trust;
        self
    }

    /// Pause between retry attempts (default: 3 seconds)
    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Build the connection.
    ///
    /// # Errors
    ///
    /// - Errors captured from [`options_value`](Self::options_value)
    /// - [`HttpError::InvalidOption`] if the host is empty
    pub fn build(self) -> Result<Connection, HttpError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let host = self.host.trim();
        if host.is_empty() {
            return Err(HttpError::InvalidOption {
                name: "host".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        let scheme = if self.options.use_ssl {
            Scheme::Https
        } else {
            Scheme::Http
        };
        let site = Site::new(scheme, host, self.port);

        tracing::debug!(
            site = %site,
            redirect_limit = self.options.redirect_limit,
            retry_limit = self.options.retry_limit,
            verifier = self.options.verify.is_some(),
            "Built HTTP connection"
        );

        Ok(Connection::new(
            site,
            self.options,
            self.pool,
            self.retry_backoff,
        ))
    }
}
