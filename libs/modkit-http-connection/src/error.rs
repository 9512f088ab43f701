use std::time::Duration;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// HTTP connection error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// One or more option keys are outside the recognized set
    #[error("Unrecognized option(s): {}", .keys.join(", "))]
    UnrecognizedOption {
        /// Every unknown key, in the order they were found
        keys: Vec<String>,
    },

    /// A recognized option carries an unusable value
    #[error("Invalid value for option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    /// Request target is not a valid origin-form path
    #[error("Invalid request path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Single request attempt timed out
    #[error("Request attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (connection reset, DNS failure, malformed response, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// TLS error reported by the transport, not yet classified
    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),

    /// Peer certificate chain failed verification
    ///
    /// `message` is the transport's message followed by the verifier's
    /// collected verification errors.
    #[error("{message}")]
    CertificateVerifyFailed {
        message: String,
        #[source]
        source: BoxError,
    },

    /// Server certificate does not cover the host that was dialed
    #[error(
        "Server hostname '{host}' did not match server certificate; {}",
        describe_expected(.expected)
    )]
    HostnameMismatch {
        host: String,
        /// Names the leaf certificate is valid for (primary name first)
        expected: Vec<String>,
    },

    /// Redirect response without a `Location` header
    #[error("Redirect response {status} from {addr} has no Location header")]
    MissingRedirectLocation {
        status: http::StatusCode,
        addr: String,
    },

    /// `Location` header could not be turned into a redirect target
    #[error("Invalid redirect location '{location}': {reason}")]
    InvalidRedirectLocation { location: String, reason: String },

    /// Too many redirects without a terminal response
    #[error("Too many HTTP redirections for {addr} (limit {limit})")]
    RedirectionLimitExceeded { addr: String, limit: usize },

    /// Every attempt failed at the transport level
    #[error("Too many HTTP retries for {addr} ({attempts} attempts)")]
    RetryLimitExceeded {
        addr: String,
        attempts: usize,
        #[source]
        source: Box<HttpError>,
    },

    /// JSON parsing error
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl HttpError {
    /// Whether this error is a transient transport failure worth another attempt.
    ///
    /// TLS and certificate failures are never transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, HttpError::Transport(_) | HttpError::Timeout(_))
    }
}

fn describe_expected(names: &[String]) -> String {
    match names {
        [single] => format!("expected {single}"),
        _ => format!("expected one of {}", names.join(", ")),
    }
}
