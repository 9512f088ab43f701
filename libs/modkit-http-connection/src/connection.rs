use crate::builder::ConnectionBuilder;
use crate::config::{BasicAuth, ConnectionOptions};
use crate::dispatch::{Dispatch, RedirectCoordinator};
use crate::error::HttpError;
use crate::request::{Request, RequestBuilder};
use crate::response::Response;
use crate::site::Site;
use crate::transport::{ConnectionPool, Verifier};
use bytes::Bytes;
use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HTTP(S) connection to one site.
///
/// Each call follows redirects (stripping credentials on cross-host hops
/// unless `trust_redirects` is set) and retries idempotent requests on 5xx
/// responses and transient transport failures.
///
/// `Connection` is cheap to clone and safe to share across tasks.
///
/// # Example
///
/// ```ignore
/// use modkit_http_connection::Connection;
///
/// let connection = Connection::builder("puppet", 8140, pool)
///     .verifier(verifier)
///     .build()?;
///
/// let resp = connection.get("/status/v1/simple").send().await?;
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    site: Site,
    options: ConnectionOptions,
    pool: Arc<dyn ConnectionPool>,
    retry_backoff: Duration,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("site", &self.inner.site)
            .field("options", &self.inner.options)
            .field("retry_backoff", &self.inner.retry_backoff)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn new(
        site: Site,
        options: ConnectionOptions,
        pool: Arc<dyn ConnectionPool>,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                site,
                options,
                pool,
                retry_backoff,
            }),
        }
    }

    /// Start building a connection to `host:port` backed by `pool`.
    #[must_use]
    pub fn builder(
        host: impl Into<String>,
        port: u16,
        pool: Arc<dyn ConnectionPool>,
    ) -> ConnectionBuilder {
        ConnectionBuilder::new(host, port, pool)
    }

    /// GET `path`; always retried on transient failures.
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path, true)
    }

    /// HEAD `path`; always retried on transient failures.
    pub fn head(&self, path: &str) -> RequestBuilder {
        self.request(Method::HEAD, path, true)
    }

    /// DELETE `path`; retried only when the connection is `idempotent`.
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path, self.inner.options.idempotent)
    }

    /// POST `body` to `path`; retried only when the connection is `idempotent`.
    pub fn post(&self, path: &str, body: impl Into<Bytes>) -> RequestBuilder {
        self.request(Method::POST, path, self.inner.options.idempotent)
            .body_bytes(body.into())
    }

    /// PUT `body` to `path`; retried only when the connection is `idempotent`.
    pub fn put(&self, path: &str, body: impl Into<Bytes>) -> RequestBuilder {
        self.request(Method::PUT, path, self.inner.options.idempotent)
            .body_bytes(body.into())
    }

    fn request(&self, method: Method, path: &str, idempotent: bool) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, path.to_owned(), idempotent)
    }

    #[must_use]
    pub fn site(&self) -> &Site {
        &self.inner.site
    }

    /// Host name of the configured site
    #[must_use]
    pub fn address(&self) -> &str {
        self.inner.site.host()
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.site.port()
    }

    #[must_use]
    pub fn use_ssl(&self) -> bool {
        self.inner.site.use_ssl()
    }

    #[must_use]
    pub fn verifier(&self) -> Option<&Arc<dyn Verifier>> {
        self.inner.options.verify.as_ref()
    }

    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }

    pub(crate) async fn dispatch(
        &self,
        request: Request,
        idempotent: bool,
        basic_auth: Option<&BasicAuth>,
    ) -> Result<Response, HttpError> {
        let inner = &*self.inner;
        let dispatch = Dispatch {
            idempotent,
            basic_auth: basic_auth.or(inner.options.basic_auth.as_ref()),
        };

        tracing::trace!(
            method = %request.method(),
            path = request.path(),
            site = %inner.site,
            idempotent,
            "Dispatching request"
        );

        RedirectCoordinator::new(
            inner.pool.as_ref(),
            &inner.site,
            &inner.options,
            inner.retry_backoff,
        )
        .follow(request, &dispatch)
        .await
    }
}
