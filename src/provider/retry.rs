// src/provider/retry.rs — Retry with exponential backoff for provider calls
//
// Wraps an HttpTransport and classifies every outcome.
// Retries: rate limits (429), server errors (5xx), timeouts, connection failures.
// Does NOT retry: auth (401, 403), other 4xx, malformed payloads.

use std::sync::Arc;
use std::time::Duration;

use super::transport::{HttpRequestSpec, HttpResponse, HttpTransport};
use super::{ErrorInfo, ErrorKind};

/// Default retry configuration.
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.1;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts against one candidate.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    /// Delays are stretched by up to this fraction, never shortened.
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl RetryConfig {
    /// Delay after a retryable failure on `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base_ms =
            self.base_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let jittered = capped_ms * deterministic_jitter(attempt, self.jitter_fraction);
        let backoff = Duration::from_millis(jittered as u64);

        // A server hint only ever lengthens the wait.
        match retry_after {
            Some(hint) if hint > backoff => hint,
            _ => backoff,
        }
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64; // 0.0..1.0
    1.0 + fraction.max(0.0) * hash
}

/// The HTTP retry/backoff layer.
///
/// Each call to `send` is one candidate's worth of attempts. Exhausting the
/// budget returns the last classified error; the fallback engine treats that
/// exactly like a single fatal failure.
pub struct RetryLayer {
    inner: Arc<dyn HttpTransport>,
    config: RetryConfig,
}

impl RetryLayer {
    pub fn new(inner: Arc<dyn HttpTransport>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn HttpTransport>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn send(
        &self,
        request: &HttpRequestSpec,
        provider: &str,
    ) -> Result<HttpResponse, ErrorInfo> {
        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let (error, retry_after) = match self.inner.send(request).await {
                Ok(response) if response.is_success() => {
                    if attempt > 0 {
                        tracing::debug!(
                            provider,
                            attempt = attempt + 1,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => (
                    ErrorInfo::from_status(response.status, &response.body),
                    response.retry_after(),
                ),
                Err(e) => (e, None),
            };
            let error = tag_provider(error, provider);

            if !error.is_retryable() {
                tracing::debug!(provider, kind = %error.kind, "Non-retryable failure: {}", error.message);
                return Err(error);
            }

            let delay = self.config.delay_for_attempt(attempt, retry_after);
            tracing::warn!(
                provider,
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retryable failure: {}",
                error
            );
            tokio::time::sleep(delay).await;
            last_error = Some(error);
        }

        tracing::warn!(provider, attempts = max_attempts, "Retry budget exhausted");
        Err(last_error.unwrap_or_else(|| {
            ErrorInfo::new(ErrorKind::ServerError, "All retries exhausted").with_provider(provider)
        }))
    }
}

pub(crate) fn tag_provider(error: ErrorInfo, provider: &str) -> ErrorInfo {
    if error.provider_id.is_some() {
        error
    } else {
        error.with_provider(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of outcomes, then keeps repeating the last.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<HttpResponse, ErrorInfo>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<HttpResponse, ErrorInfo>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for Scripted {
        async fn send(&self, _request: &HttpRequestSpec) -> Result<HttpResponse, ErrorInfo> {
            *self.calls.lock().unwrap() += 1;
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                outcomes.front().cloned().unwrap()
            }
        }
    }

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter_fraction: 0.0,
            ..RetryConfig::default()
        }
    }

    fn spec() -> HttpRequestSpec {
        HttpRequestSpec::post("http://provider.test/v1/chat", serde_json::json!({}))
    }

    #[test]
    fn test_default_config() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.base_delay, Duration::from_millis(1000));
        assert_eq!(cfg.backoff_factor, 2.0);
        assert_eq!(cfg.max_delay, Duration::from_millis(30_000));
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        let cfg = no_jitter();
        assert_eq!(cfg.delay_for_attempt(0, None), Duration::from_millis(1000));
        assert_eq!(cfg.delay_for_attempt(1, None), Duration::from_millis(2000));
        assert_eq!(cfg.delay_for_attempt(2, None), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let cfg = no_jitter();
        assert_eq!(cfg.delay_for_attempt(10, None), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_never_shortens() {
        let cfg = RetryConfig::default();
        for attempt in 0..5 {
            let base = no_jitter().delay_for_attempt(attempt, None);
            let d = cfg.delay_for_attempt(attempt, None);
            assert!(d >= base, "attempt {attempt}: {d:?} < {base:?}");
            assert!(d.as_millis() as f64 <= base.as_millis() as f64 * 1.1 + 1.0);
        }
    }

    #[test]
    fn test_retry_after_only_lengthens() {
        let cfg = no_jitter();
        assert_eq!(
            cfg.delay_for_attempt(0, Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            cfg.delay_for_attempt(2, Some(Duration::from_secs(1))),
            Duration::from_millis(4000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let t = Scripted::new(vec![Ok(HttpResponse::new(200, "{}"))]);
        let layer = RetryLayer::with_config(t.clone(), no_jitter());
        let r = layer.send(&spec(), "groq").await.unwrap();
        assert_eq!(r.status, 200);
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let t = Scripted::new(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(429, "slow down")),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        let layer = RetryLayer::with_config(t.clone(), no_jitter());
        let start = tokio::time::Instant::now();
        assert!(layer.send(&spec(), "groq").await.is_ok());
        assert_eq!(t.calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_makes_max_retries_attempts() {
        let t = Scripted::new(vec![Ok(HttpResponse::new(503, "down"))]);
        let layer = RetryLayer::with_config(t.clone(), no_jitter());
        let start = tokio::time::Instant::now();
        let err = layer.send(&spec(), "groq").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert_eq!(err.http_status, Some(503));
        assert_eq!(err.provider_id.as_deref(), Some("groq"));
        assert_eq!(t.calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_not_retried() {
        let t = Scripted::new(vec![Ok(HttpResponse::new(401, "bad key"))]);
        let layer = RetryLayer::with_config(t.clone(), no_jitter());
        let start = tokio::time::Instant::now();
        let err = layer.send(&spec(), "azure").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(t.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_not_retried() {
        let t = Scripted::new(vec![Ok(HttpResponse::new(404, "no such model"))]);
        let layer = RetryLayer::with_config(t.clone(), no_jitter());
        let err = layer.send(&spec(), "openrouter").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Rejected);
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_retried() {
        let t = Scripted::new(vec![
            Err(ErrorInfo::network("connection refused")),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        let layer = RetryLayer::with_config(t.clone(), no_jitter());
        assert!(layer.send(&spec(), "mistral").await.is_ok());
        assert_eq!(t.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_retries_still_attempts_once() {
        let t = Scripted::new(vec![Ok(HttpResponse::new(500, ""))]);
        let cfg = RetryConfig {
            max_retries: 0,
            ..no_jitter()
        };
        let layer = RetryLayer::with_config(t.clone(), cfg);
        assert!(layer.send(&spec(), "cohere").await.is_err());
        assert_eq!(t.calls(), 1);
    }
}
