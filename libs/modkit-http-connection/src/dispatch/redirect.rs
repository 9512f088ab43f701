//! Redirect loop with a cross-host credential guard.
//!
//! Redirects are followed hop by hop because pooled transports and TLS trust
//! are bound to a [`Site`]; a hop to another origin needs its own transport.
//! A redirect is server (or network) controlled, so by default the headers
//! that carry credentials do not follow it to a different host:
//! - `Authorization`
//! - `Cookie`
//!
//! `trust_redirects` lifts that guard for operators who accept the risk.

use super::executor::RequestExecutor;
use super::retry::RetryCoordinator;
use crate::config::{BasicAuth, ConnectionOptions};
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::site::Site;
use crate::tls::classify_tls_failure;
use crate::transport::{ConnectionPool, PooledConnection, Verifier};
use base64::{Engine as _, engine::general_purpose};
use http::header::{self, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// Headers dropped on redirects to another host
fn is_credential_header(name: &HeaderName) -> bool {
    *name == header::AUTHORIZATION || *name == header::COOKIE
}

/// Per-call choices made by the facade
pub struct Dispatch<'a> {
    pub idempotent: bool,
    pub basic_auth: Option<&'a BasicAuth>,
}

/// Drives one logical request through up to `redirect_limit` redirects.
pub struct RedirectCoordinator<'a> {
    pool: &'a dyn ConnectionPool,
    site: &'a Site,
    options: &'a ConnectionOptions,
    retry_backoff: Duration,
}

impl<'a> RedirectCoordinator<'a> {
    pub fn new(
        pool: &'a dyn ConnectionPool,
        site: &'a Site,
        options: &'a ConnectionOptions,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            pool,
            site,
            options,
            retry_backoff,
        }
    }

    pub async fn follow(
        &self,
        mut original: Request,
        dispatch: &Dispatch<'_>,
    ) -> Result<Response, HttpError> {
        // Decorations go on the original once; later hops copy its headers.
        if let Some(auth) = dispatch.basic_auth {
            apply_basic_auth(&mut original, auth)?;
        }

        let mut current_site = self.site.clone();
        let mut current_request = original.clone();
        let mut hops = 0usize;

        while hops <= self.options.redirect_limit {
            let response = self
                .run_hop(&current_site, &current_request, dispatch.idempotent)
                .await?;

            if !response.is_redirect() {
                return Ok(response);
            }

            let location = redirect_location(&response, &current_site)?;
            let (next_site, next_path) =
                current_site.resolve(current_request.path(), location)?;
            let next_request = self.rewrite(&original, &next_path, &next_site);

            tracing::debug!(
                status = response.status().as_u16(),
                from = %current_site,
                to = %next_site,
                path = next_request.path(),
                hop = hops + 1,
                "Following redirect"
            );

            current_site = next_site;
            current_request = next_request;
            hops += 1;
        }

        tracing::debug!(
            site = %self.site,
            limit = self.options.redirect_limit,
            "Redirect limit reached"
        );
        Err(HttpError::RedirectionLimitExceeded {
            addr: self.site.addr(),
            limit: self.options.redirect_limit,
        })
    }

    /// One hop: lease a transport for `site`, dispatch, release, classify TLS failures.
    async fn run_hop(
        &self,
        site: &Site,
        request: &Request,
        idempotent: bool,
    ) -> Result<Response, HttpError> {
        let verifier: Option<&Arc<dyn Verifier>> = if site.use_ssl() {
            self.options.verify.as_ref()
        } else {
            None
        };
        let verifier_ref: Option<&dyn Verifier> = verifier.map(|v| &**v);

        let mut lease = match PooledConnection::acquire(self.pool, site, verifier).await {
            Ok(lease) => lease,
            Err(err) => return Err(classify_tls_failure(err, site.host(), verifier_ref)),
        };
        let executor = RequestExecutor::new(verifier_ref);

        let outcome = if idempotent {
            RetryCoordinator::new(
                &executor,
                site,
                self.options.retry_limit,
                self.retry_backoff,
            )
            .execute_with_retries(lease.transport(), request)
            .await
        } else {
            executor.execute(lease.transport(), request).await
        };
        if executor.transport_failed() {
            lease.mark_poisoned();
        }
        drop(lease);

        outcome.map_err(|err| classify_tls_failure(err, site.host(), verifier_ref))
    }

    /// Build the next hop's request for `path` on `target` from the original one.
    fn rewrite(&self, original: &Request, path: &str, target: &Site) -> Request {
        let mut next = Request::new(original.method().clone(), path);
        next.set_body(original.body().cloned());

        let guarded =
            !self.options.trust_redirects && !target.host().eq_ignore_ascii_case(self.site.host());

        for (name, value) in original.headers().iter() {
            if guarded && is_credential_header(name) {
                tracing::debug!(
                    header = %name,
                    target = %target,
                    "Stripped credential header on cross-host redirect"
                );
                continue;
            }
            next.headers_mut().append(name.clone(), value.clone());
        }

        next
    }
}

fn redirect_location<'r>(response: &'r Response, site: &Site) -> Result<&'r str, HttpError> {
    let Some(raw) = response.location() else {
        return Err(HttpError::MissingRedirectLocation {
            status: response.status(),
            addr: site.addr(),
        });
    };

    raw.to_str().map_err(|e| HttpError::InvalidRedirectLocation {
        location: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
        reason: e.to_string(),
    })
}

/// Set `Authorization: Basic ...`, replacing any value already present.
fn apply_basic_auth(request: &mut Request, auth: &BasicAuth) -> Result<(), HttpError> {
    // Wrap intermediates in `Zeroizing` so the plaintext is scrubbed on drop.
    let credentials = Zeroizing::new(format!(
        "{}:{}",
        auth.user,
        auth.password.expose_secret()
    ));
    let encoded = Zeroizing::new(general_purpose::STANDARD.encode(credentials.as_bytes()));
    let header_value = Zeroizing::new(format!("Basic {}", &*encoded));

    let mut value = HeaderValue::from_str(&header_value)?;
    value.set_sensitive(true);
    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}
