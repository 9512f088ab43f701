#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Site-bound HTTP(S) connection for `ModKit`
//!
//! A [`Connection`] talks to one logical endpoint (a [`Site`]) and adds three
//! behaviors on top of a pluggable transport:
//! - Bounded redirect following (301, 302, 307) that drops `Authorization`
//!   and `Cookie` when a redirect points at another host
//! - Fixed-backoff retries of idempotent requests on 500/502/503/504 and
//!   transient transport failures
//! - TLS failure diagnostics built from what the [`Verifier`] observed
//!
//! Sockets, TLS handshakes and connection reuse live behind the
//! [`ConnectionPool`] and [`Transport`] traits.
//!
//! # Example
//!
//! ```ignore
//! use modkit_http_connection::Connection;
//! use std::sync::Arc;
//!
//! let connection = Connection::builder("puppet", 8140, Arc::new(pool))
//!     .verifier(Arc::new(verifier))
//!     .basic_auth("agent", "s3cret")
//!     .build()?;
//!
//! let status: serde_json::Value = connection
//!     .get("/status/v1/simple")
//!     .send()
//!     .await?
//!     .json()?;
//! ```

mod builder;
mod config;
mod connection;
mod dispatch;
mod error;
mod headers;
mod request;
mod response;
mod site;
mod tls;
mod transport;

pub use builder::ConnectionBuilder;
pub use config::{
    BasicAuth, CERTIFICATE_EXPIRY_WARNING, ConnectionOptions, DEFAULT_REDIRECT_LIMIT,
    DEFAULT_RETRY_BACKOFF, DEFAULT_RETRY_LIMIT, RECOGNIZED_OPTIONS, is_redirect_status,
    is_retryable_status,
};
pub use connection::Connection;
pub use error::HttpError;
pub use headers::Headers;
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use site::{Scheme, Site};
pub use tls::{classify_tls_failure, warn_if_near_expiration};
pub use transport::{Certificate, ConnectionPool, PooledConnection, Transport, Verifier};
