use crate::config::BasicAuth;
use crate::connection::Connection;
use crate::error::HttpError;
use crate::headers::Headers;
use crate::response::Response;
use bytes::Bytes;
use http::Method;
use http::uri::PathAndQuery;
use serde::Serialize;

/// One request as handed to a [`Transport`](crate::Transport).
///
/// `path` is origin-form (`/path?query`); the site it goes to is decided by
/// the connection and by any redirects followed on the way.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Headers,
    body: Option<Bytes>,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Option<Bytes>) {
        self.body = body;
    }
}

/// Request builder with fluent API
///
/// Created by [`Connection::get`], [`Connection::post`], etc. Header parsing
/// errors are captured and reported by [`send()`](RequestBuilder::send).
///
/// # Example
///
/// ```ignore
/// let resp = connection
///     .post("/puppet/v3/report/agent01", report_bytes)
///     .header("content-type", "application/json")
///     .idempotent(true)
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    connection: Connection,
    method: Method,
    path: String,
    headers: Headers,
    body: Option<Bytes>,
    idempotent: bool,
    basic_auth: Option<BasicAuth>,
    /// Error captured during building (deferred to `send()`)
    error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(
        connection: Connection,
        method: Method,
        path: String,
        idempotent: bool,
    ) -> Self {
        Self {
            connection,
            method,
            path,
            headers: Headers::new(),
            body: None,
            idempotent,
            basic_auth: None,
            error: None,
        }
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        if let Err(e) = self.headers.try_append(name, value) {
            self.error = Some(e);
        }
        self
    }

    /// Add multiple headers to the request
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        for (name, value) in headers {
            if self.error.is_some() {
                break;
            }
            if let Err(e) = self.headers.try_append(&name, &value) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Allow (or forbid) retries for this request regardless of its method.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Credentials for this request only; replaces the connection's `basic_auth`.
    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth::new(user, password));
        self
    }

    /// Set request body as raw bytes
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Set request body as a string
    pub fn body_string(mut self, body: String) -> Self {
        self.body = Some(Bytes::from(body));
        self
    }

    /// Serialize `body` as JSON; sets `content-type` unless one was given.
    ///
    /// # Errors
    ///
    /// Returns a deferred header error, or `HttpError::Json` if serialization fails.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let json_bytes = serde_json::to_vec(body)?;
        self.body = Some(Bytes::from(json_bytes));
        if !self.headers.contains("content-type") {
            self.headers.append(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
        }
        Ok(self)
    }

    /// Send the request, following redirects and retrying where allowed.
    ///
    /// # Errors
    ///
    /// - Header or path errors captured while building
    /// - Any pool, transport, redirect, retry or TLS failure
    pub async fn send(self) -> Result<Response, HttpError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        validate_path(&self.path)?;

        let mut request = Request::new(self.method, self.path);
        request.headers = self.headers;
        request.body = self.body;

        self.connection
            .dispatch(request, self.idempotent, self.basic_auth.as_ref())
            .await
    }
}

fn validate_path(path: &str) -> Result<(), HttpError> {
    if !path.starts_with('/') {
        return Err(HttpError::InvalidPath {
            path: path.to_owned(),
            reason: "must start with '/'".to_owned(),
        });
    }
    path.parse::<PathAndQuery>()
        .map_err(|e| HttpError::InvalidPath {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
    Ok(())
}
