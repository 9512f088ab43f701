#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use async_trait::async_trait;
use http::StatusCode;
use modkit_http_connection::{
    Certificate, Connection, ConnectionBuilder, ConnectionPool, Headers, HttpError, Request,
    Response, Site, Transport, Verifier,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted server does with the next request (or checkout).
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16),
    Redirect(u16, &'static str),
    /// Redirect status with no `Location` header
    BareRedirect(u16),
    Reset,
    /// TLS failure reported while sending
    Tls(&'static str),
    /// TLS failure reported by the pool while dialing
    HandshakeFailure(&'static str),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    sent: Vec<(Site, Request)>,
    checkouts: Vec<(Site, bool)>,
    checkins: Vec<(Site, bool)>,
}

/// Pool whose transports answer from one shared, ordered script.
#[derive(Clone, Default)]
pub struct ScriptedPool {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPool {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        let pool = Self::default();
        pool.script.lock().unwrap().replies = replies.into_iter().collect();
        pool
    }

    /// Every request sent, with the site it was sent to
    pub fn sent(&self) -> Vec<(Site, Request)> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.script.lock().unwrap().sent.len()
    }

    /// Every checkout, with whether a verifier was supplied
    pub fn checkouts(&self) -> Vec<(Site, bool)> {
        self.script.lock().unwrap().checkouts.clone()
    }

    pub fn checkins(&self) -> Vec<Site> {
        let script = self.script.lock().unwrap();
        script.checkins.iter().map(|(site, _)| site.clone()).collect()
    }

    /// Poisoned flag of every checkin, in order
    pub fn poisoned_checkins(&self) -> Vec<bool> {
        let script = self.script.lock().unwrap();
        script.checkins.iter().map(|(_, poisoned)| *poisoned).collect()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().replies.len()
    }
}

#[async_trait]
impl ConnectionPool for ScriptedPool {
    async fn checkout(
        &self,
        site: &Site,
        verifier: Option<&Arc<dyn Verifier>>,
    ) -> Result<Box<dyn Transport>, HttpError> {
        let mut script = self.script.lock().unwrap();
        script.checkouts.push((site.clone(), verifier.is_some()));

        if let Some(Reply::HandshakeFailure(message)) = script.replies.front().cloned() {
            script.replies.pop_front();
            return Err(HttpError::Tls(message.into()));
        }

        Ok(Box::new(ScriptedTransport {
            site: site.clone(),
            script: Arc::clone(&self.script),
        }))
    }

    fn checkin(&self, site: &Site, _transport: Box<dyn Transport>, poisoned: bool) {
        self.script
            .lock()
            .unwrap()
            .checkins
            .push((site.clone(), poisoned));
    }
}

struct ScriptedTransport {
    site: Site,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, request: &Request) -> Result<Response, HttpError> {
        let mut script = self.script.lock().unwrap();
        script.sent.push((self.site.clone(), request.clone()));

        let reply = script
            .replies
            .pop_front()
            .unwrap_or_else(|| panic!("no reply scripted for {} {}", request.method(), request.path()));

        match reply {
            Reply::Status(code) => Ok(Response::new(status(code)).with_body("ok")),
            Reply::Redirect(code, location) => {
                let mut headers = Headers::new();
                headers.try_append("location", location).unwrap();
                Ok(Response::new(status(code)).with_headers(headers))
            }
            Reply::BareRedirect(code) => Ok(Response::new(status(code))),
            Reply::Reset => Err(HttpError::Transport("connection reset by peer".into())),
            Reply::Tls(message) | Reply::HandshakeFailure(message) => {
                Err(HttpError::Tls(message.into()))
            }
        }
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap()
}

/// Verifier reporting a fixed chain and error list, counting expiry checks.
#[derive(Default)]
pub struct FakeVerifier {
    pub chain: Vec<Certificate>,
    pub errors: Vec<String>,
    expiry_checks: Mutex<usize>,
}

impl FakeVerifier {
    pub fn with_chain(chain: Vec<Certificate>) -> Self {
        Self {
            chain,
            ..Self::default()
        }
    }

    pub fn with_errors(errors: &[&str]) -> Self {
        Self {
            errors: errors.iter().map(|e| (*e).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn expiry_checks(&self) -> usize {
        *self.expiry_checks.lock().unwrap()
    }
}

impl Verifier for FakeVerifier {
    fn peer_certificates(&self) -> Vec<Certificate> {
        self.chain.clone()
    }

    fn verification_errors(&self) -> Vec<String> {
        self.errors.clone()
    }

    fn warn_if_near_expiration(&self, _certificates: &[Certificate]) {
        *self.expiry_checks.lock().unwrap() += 1;
    }
}

/// Builder for `https://a.example:8140` with no backoff.
pub fn builder(pool: &ScriptedPool) -> ConnectionBuilder {
    Connection::builder("a.example", 8140, Arc::new(pool.clone())).retry_backoff(Duration::ZERO)
}

pub fn connection(pool: &ScriptedPool) -> Connection {
    builder(pool).build().unwrap()
}
