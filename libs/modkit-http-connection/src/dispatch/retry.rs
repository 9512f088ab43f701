use super::executor::RequestExecutor;
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::site::Site;
use crate::transport::Transport;
use std::time::Duration;

/// Bounded retry with a fixed pause for requests the caller declared idempotent.
///
/// Up to `retry_limit + 1` attempts are made on the same transport. A 500,
/// 502, 503 or 504 response or a transient transport error earns another
/// attempt; any other response ends the loop. Once attempts run out the last
/// response seen is returned, even a 5xx one. `RetryLimitExceeded` is raised
/// only when no attempt produced a response at all.
///
/// Idempotency is not checked here; the caller decides what may be retried.
pub struct RetryCoordinator<'a> {
    executor: &'a RequestExecutor<'a>,
    site: &'a Site,
    retry_limit: usize,
    backoff: Duration,
}

impl<'a> RetryCoordinator<'a> {
    pub fn new(
        executor: &'a RequestExecutor<'a>,
        site: &'a Site,
        retry_limit: usize,
        backoff: Duration,
    ) -> Self {
        Self {
            executor,
            site,
            retry_limit,
            backoff,
        }
    }

    pub async fn execute_with_retries(
        &self,
        transport: &mut dyn Transport,
        request: &Request,
    ) -> Result<Response, HttpError> {
        let max_attempts = self.retry_limit.saturating_add(1);
        let mut last_response: Option<Response> = None;
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let is_last = attempt >= max_attempts;

            match self.executor.execute(transport, request).await {
                Ok(response) if response.is_retryable() && !is_last => {
                    tracing::debug!(
                        retry = attempt,
                        retry_limit = self.retry_limit,
                        status = response.status().as_u16(),
                        method = %request.method(),
                        site = %self.site,
                        backoff_ms = self.backoff.as_millis(),
                        "Retrying request after status code"
                    );
                    last_response = Some(response);
                }
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() => {
                    if is_last {
                        return match last_response {
                            Some(response) => {
                                tracing::debug!(
                                    attempts = attempt,
                                    error = %err,
                                    status = response.status().as_u16(),
                                    site = %self.site,
                                    "Retries exhausted; returning last response"
                                );
                                Ok(response)
                            }
                            None => Err(HttpError::RetryLimitExceeded {
                                addr: self.site.addr(),
                                attempts: attempt,
                                source: Box::new(err),
                            }),
                        };
                    }
                    tracing::debug!(
                        retry = attempt,
                        retry_limit = self.retry_limit,
                        error = %err,
                        method = %request.method(),
                        site = %self.site,
                        backoff_ms = self.backoff.as_millis(),
                        "Retrying request after error"
                    );
                }
                Err(err) => return Err(err),
            }

            tokio::time::sleep(self.backoff).await;
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::site::Scheme;
    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use std::collections::VecDeque;
    use tokio::time::Instant;

    const BACKOFF: Duration = Duration::from_secs(3);

    enum Step {
        Status(StatusCode),
        Reset,
        Tls,
    }

    struct ScriptedTransport {
        steps: VecDeque<Step>,
        calls: usize,
    }

    impl ScriptedTransport {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                calls: 0,
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, _request: &Request) -> Result<Response, HttpError> {
            self.calls += 1;
            match self.steps.pop_front() {
                Some(Step::Status(status)) => Ok(Response::new(status)),
                Some(Step::Reset) => Err(HttpError::Transport("connection reset by peer".into())),
                Some(Step::Tls) => Err(HttpError::Tls("certificate verify failed".into())),
                None => panic!("script exhausted after {} calls", self.calls),
            }
        }
    }

    /// Paused-clock timers fire on millisecond ticks, so allow sub-backoff slack.
    fn assert_pauses(elapsed: Duration, pauses: u32) {
        let expected = pauses * BACKOFF;
        assert!(
            elapsed >= expected && elapsed < expected + BACKOFF,
            "expected {pauses} backoff pause(s), clock advanced {elapsed:?}"
        );
    }

    async fn run(
        retry_limit: usize,
        transport: &mut ScriptedTransport,
    ) -> (Result<Response, HttpError>, Duration) {
        let site = Site::new(Scheme::Https, "puppet", 8140);
        let executor = RequestExecutor::new(None);
        let coordinator = RetryCoordinator::new(&executor, &site, retry_limit, BACKOFF);
        let request = Request::new(Method::GET, "/status");

        let started = Instant::now();
        let result = coordinator.execute_with_retries(transport, &request).await;
        (result, started.elapsed())
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_on_success() {
        let mut transport = ScriptedTransport::new([Step::Status(StatusCode::OK)]);

        let (result, elapsed) = run(2, &mut transport).await;

        assert_eq!(result.unwrap().status(), StatusCode::OK);
        assert_eq!(transport.calls, 1);
        assert_pauses(elapsed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_is_returned_immediately() {
        let mut transport = ScriptedTransport::new([Step::Status(StatusCode::NOT_FOUND)]);

        let (result, _) = run(2, &mut transport).await;

        assert_eq!(result.unwrap().status(), StatusCode::NOT_FOUND);
        assert_eq!(transport.calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_5xx_until_success_with_fixed_backoff() {
        let mut transport = ScriptedTransport::new([
            Step::Status(StatusCode::SERVICE_UNAVAILABLE),
            Step::Status(StatusCode::BAD_GATEWAY),
            Step::Status(StatusCode::OK),
        ]);

        let (result, elapsed) = run(2, &mut transport).await;

        assert_eq!(result.unwrap().status(), StatusCode::OK);
        assert_eq!(transport.calls, 3);
        assert_pauses(elapsed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_5xx_returns_last_response() {
        let mut transport = ScriptedTransport::new([
            Step::Status(StatusCode::SERVICE_UNAVAILABLE),
            Step::Status(StatusCode::SERVICE_UNAVAILABLE),
            Step::Status(StatusCode::GATEWAY_TIMEOUT),
        ]);

        let (result, elapsed) = run(2, &mut transport).await;

        assert_eq!(result.unwrap().status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(transport.calls, 3);
        assert_pauses(elapsed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_transport_errors_raise_retry_limit() {
        let mut transport = ScriptedTransport::new([Step::Reset, Step::Reset, Step::Reset]);

        let (result, elapsed) = run(2, &mut transport).await;

        match result {
            Err(HttpError::RetryLimitExceeded {
                addr,
                attempts,
                source,
            }) => {
                assert_eq!(addr, "https://puppet:8140");
                assert_eq!(attempts, 3);
                assert!(matches!(*source, HttpError::Transport(_)));
            }
            other => panic!("expected RetryLimitExceeded, got {other:?}"),
        }
        assert_eq!(transport.calls, 3);
        assert_pauses(elapsed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_transport_error_falls_back_to_earlier_response() {
        let mut transport = ScriptedTransport::new([
            Step::Status(StatusCode::SERVICE_UNAVAILABLE),
            Step::Reset,
            Step::Reset,
        ]);

        let (result, _) = run(2, &mut transport).await;

        assert_eq!(result.unwrap().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(transport.calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_then_success() {
        let mut transport =
            ScriptedTransport::new([Step::Reset, Step::Status(StatusCode::OK)]);

        let (result, elapsed) = run(2, &mut transport).await;

        assert_eq!(result.unwrap().status(), StatusCode::OK);
        assert_pauses(elapsed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tls_error_is_never_retried() {
        let mut transport = ScriptedTransport::new([Step::Tls, Step::Status(StatusCode::OK)]);

        let (result, elapsed) = run(2, &mut transport).await;

        assert!(matches!(result, Err(HttpError::Tls(_))));
        assert_eq!(transport.calls, 1);
        assert_pauses(elapsed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retry_limit_makes_one_attempt() {
        let mut transport = ScriptedTransport::new([Step::Reset]);

        let (result, _) = run(0, &mut transport).await;

        assert!(matches!(
            result,
            Err(HttpError::RetryLimitExceeded { attempts: 1, .. })
        ));
        assert_eq!(transport.calls, 1);
    }
}
