//! TLS failure diagnostics.
//!
//! Transports surface handshake failures as [`HttpError::Tls`] carrying the
//! TLS library's own message. That text rarely says what to fix, so every hop
//! runs the error through a small table of message predicates and rewrites
//! the two shapes operators hit most: an untrusted chain and a certificate
//! issued for another name.
//!
//! Matching free text is tied to the wording of the TLS library in use. A
//! transport that can report structured failure codes should map them onto
//! the same messages before returning.

use crate::error::HttpError;
use crate::transport::{Certificate, Verifier};
use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

#[allow(clippy::expect_used)] // good regex, it doesn't panic
static HOSTNAME_MISMATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)hostname (\S+ )?(was |does )?not match|NotValidForName")
        .expect("static regex should not panic")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsFailure {
    VerifyFailed,
    HostnameMismatch,
}

struct Rule {
    failure: TlsFailure,
    matches: fn(&str) -> bool,
}

/// Evaluated in order; the first match wins.
const RULES: &[Rule] = &[
    Rule {
        failure: TlsFailure::VerifyFailed,
        matches: |message| message.contains("certificate verify failed"),
    },
    Rule {
        failure: TlsFailure::HostnameMismatch,
        matches: |message| HOSTNAME_MISMATCH.is_match(message),
    },
];

fn classify(message: &str) -> Option<TlsFailure> {
    RULES
        .iter()
        .find(|rule| (rule.matches)(message))
        .map(|rule| rule.failure)
}

/// Rewrite a TLS failure observed while talking to `host` into an actionable error.
///
/// Non-TLS errors and unrecognized TLS messages are returned unchanged.
#[must_use]
pub fn classify_tls_failure(
    err: HttpError,
    host: &str,
    verifier: Option<&dyn Verifier>,
) -> HttpError {
    let HttpError::Tls(source) = err else {
        return err;
    };
    let message = source.to_string();

    match classify(&message) {
        Some(TlsFailure::VerifyFailed) => {
            let errors = verifier
                .map(|v| v.verification_errors())
                .unwrap_or_default();
            tracing::debug!(
                host,
                error_count = errors.len(),
                "Classified TLS failure as certificate verification failure"
            );
            HttpError::CertificateVerifyFailed {
                message: format!("{message}: [{}]", errors.join("; ")),
                source,
            }
        }
        Some(TlsFailure::HostnameMismatch) => {
            let leaf = verifier.and_then(|v| v.peer_certificates().pop());
            match leaf {
                Some(cert) => {
                    tracing::debug!(
                        host,
                        certificate = %cert.name,
                        "Classified TLS failure as hostname mismatch"
                    );
                    HttpError::HostnameMismatch {
                        host: host.to_owned(),
                        expected: cert.valid_names(),
                    }
                }
                // Nothing to name as expected; keep the library's message.
                None => HttpError::Tls(source),
            }
        }
        None => HttpError::Tls(source),
    }
}

/// Log a warning for each certificate that expires within `window` of `now`.
pub fn warn_if_near_expiration(certificates: &[Certificate], now: SystemTime, window: Duration) {
    for cert in certificates {
        let Some(not_after) = cert.not_after else {
            continue;
        };
        match not_after.duration_since(now) {
            Ok(remaining) if remaining <= window => {
                tracing::warn!(
                    certificate = %cert.name,
                    expires_in_secs = remaining.as_secs(),
                    "Certificate will expire soon"
                );
            }
            Ok(_) => {}
            Err(_) => {
                tracing::warn!(certificate = %cert.name, "Certificate has expired");
            }
        }
    }
}
