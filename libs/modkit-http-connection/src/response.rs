use crate::config::{is_redirect_status, is_retryable_status};
use crate::error::HttpError;
use crate::headers::Headers;
use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

/// A fully received HTTP response.
///
/// Only the status code and the `Location` header drive connection
/// behavior; everything else is handed back to the caller untouched.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Raw `Location` header value, if present
    #[must_use]
    pub fn location(&self) -> Option<&HeaderValue> {
        self.headers.get(http::header::LOCATION.as_str())
    }

    /// 301, 302 or 307
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        is_redirect_status(self.status)
    }

    /// 500, 502, 503 or 504
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        is_retryable_status(self.status)
    }

    /// Body decoded as UTF-8, with invalid sequences replaced
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Json`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
