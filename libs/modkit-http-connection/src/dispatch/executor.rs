use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::transport::{Transport, Verifier};
use std::sync::atomic::{AtomicBool, Ordering};

/// Sends one request over a leased transport.
///
/// Every response, whatever its status, is followed by the verifier's
/// near-expiry check on the peer certificates. The check only logs.
pub struct RequestExecutor<'a> {
    verifier: Option<&'a dyn Verifier>,
    failed: AtomicBool,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(verifier: Option<&'a dyn Verifier>) -> Self {
        Self {
            verifier,
            failed: AtomicBool::new(false),
        }
    }

    /// Whether any send through this executor failed
    #[must_use]
    pub fn transport_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    pub async fn execute(
        &self,
        transport: &mut dyn Transport,
        request: &Request,
    ) -> Result<Response, HttpError> {
        let response = transport
            .send(request)
            .await
            .inspect_err(|_| self.failed.store(true, Ordering::Relaxed))?;

        if let Some(verifier) = self.verifier {
            verifier.warn_if_near_expiration(&verifier.peer_certificates());
        }

        Ok(response)
    }
}
