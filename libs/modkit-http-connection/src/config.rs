use crate::error::HttpError;
use crate::transport::Verifier;
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default number of redirects followed before giving up
pub const DEFAULT_REDIRECT_LIMIT: usize = 10;

/// Default number of retries after the first attempt of an idempotent request
pub const DEFAULT_RETRY_LIMIT: usize = 2;

/// Fixed pause between retry attempts
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Peer certificates expiring within this window trigger a warning
pub const CERTIFICATE_EXPIRY_WARNING: Duration = Duration::from_secs(60 * 24 * 60 * 60);

/// Option keys accepted by [`ConnectionOptions::from_value`]
pub const RECOGNIZED_OPTIONS: &[&str] = &[
    "use_ssl",
    "verify",
    "redirect_limit",
    "retry_limit",
    "basic_auth",
    "idempotent",
    "trust_redirects",
];

/// Status codes that are followed as redirects
#[must_use]
pub fn is_redirect_status(status: http::StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 307)
}

/// Status codes that mark a transient server failure
#[must_use]
pub fn is_retryable_status(status: http::StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

/// Credentials injected as an `Authorization: Basic` header
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuth {
    pub user: String,
    pub password: SecretString,
}

impl BasicAuth {
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Per-connection options.
///
/// Every field has an explicit default; maps with keys outside
/// [`RECOGNIZED_OPTIONS`] are rejected by [`ConnectionOptions::from_value`].
///
/// # Example
///
/// ```rust,ignore
/// use modkit_http_connection::ConnectionOptions;
///
/// let options = ConnectionOptions::from_value(serde_json::json!({
///     "redirect_limit": 3,
///     "basic_auth": { "user": "agent", "password": "s3cret" },
/// }))?;
/// ```
#[derive(Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Connect over TLS (default: true)
    pub use_ssl: bool,

    /// Verification strategy handed to the pool for TLS sites (default: none)
    #[serde(skip)]
    pub verify: Option<Arc<dyn Verifier>>,

    /// Redirects followed before failing with `RedirectionLimitExceeded` (default: 10)
    pub redirect_limit: usize,

    /// Retries after the first attempt for idempotent requests (default: 2)
    pub retry_limit: usize,

    /// Credentials applied to the first hop of every request (default: none)
    pub basic_auth: Option<BasicAuth>,

    /// Retry requests of every method (default: false; GET and HEAD always retry)
    pub idempotent: bool,

    /// Keep `Authorization` and `Cookie` on redirects to another host (default: false)
    pub trust_redirects: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            use_ssl: true,
            verify: None,
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            retry_limit: DEFAULT_RETRY_LIMIT,
            basic_auth: None,
            idempotent: false,
            trust_redirects: false,
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("use_ssl", &self.use_ssl)
            .field("verify", &self.verify.as_ref().map(|_| "<verifier>"))
            .field("redirect_limit", &self.redirect_limit)
            .field("retry_limit", &self.retry_limit)
            .field("basic_auth", &self.basic_auth)
            .field("idempotent", &self.idempotent)
            .field("trust_redirects", &self.trust_redirects)
            .finish()
    }
}

impl ConnectionOptions {
    /// Load options from a JSON object.
    ///
    /// Missing keys keep their defaults. `verify` may only be `null` here;
    /// attach a verifier with [`ConnectionBuilder::verifier`](crate::ConnectionBuilder::verifier).
    ///
    /// # Errors
    ///
    /// - [`HttpError::UnrecognizedOption`] listing every key outside [`RECOGNIZED_OPTIONS`]
    /// - [`HttpError::InvalidOption`] if the value is not an object or a field has the wrong type
    pub fn from_value(value: serde_json::Value) -> Result<Self, HttpError> {
        let serde_json::Value::Object(map) = value else {
            return Err(HttpError::InvalidOption {
                name: "options".to_owned(),
                reason: "expected a JSON object".to_owned(),
            });
        };

        let unknown: Vec<String> = map
            .keys()
            .filter(|key| !RECOGNIZED_OPTIONS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(HttpError::UnrecognizedOption { keys: unknown });
        }

        if map.get("verify").is_some_and(|v| !v.is_null()) {
            return Err(HttpError::InvalidOption {
                name: "verify".to_owned(),
                reason: "a verifier cannot be loaded from data; use ConnectionBuilder::verifier"
                    .to_owned(),
            });
        }

        serde_json::from_value(serde_json::Value::Object(map)).map_err(|e| {
            HttpError::InvalidOption {
                name: "options".to_owned(),
                reason: e.to_string(),
            }
        })
    }
}
