use super::{Middleware, Next};
use crate::config::DispatchConfig;
use crate::core::Envelope;
use crate::response::Response;
use anyhow::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, trace, warn, Instrument, Level};

/// Wraps each dispatch in a `dispatch` span and logs its outcome.
///
/// Dispatches slower than the configured threshold are logged at `WARN`.
/// Serializable payloads are logged at `TRACE`.
#[derive(Debug, Clone)]
pub struct TracingMiddleware {
    slow_threshold: Duration,
}

impl TracingMiddleware {
    pub fn new(slow_threshold: Duration) -> Self {
        Self { slow_threshold }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.slow_threshold())
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn dispatch(&self, envelope: Envelope, next: Next<'_>) -> Result<Response> {
        let key = envelope.key();
        let span = info_span!(
            "dispatch",
            message = %key,
            kind = %envelope.kind(),
            correlation_id = %envelope.context().correlation_id(),
            caller = envelope.context().caller(),
        );

        async move {
            if tracing::enabled!(Level::TRACE) {
                if let Some(payload) = envelope.message().payload() {
                    match serde_json::to_string(payload) {
                        Ok(json) => trace!(payload = %json, "dispatching"),
                        Err(err) => trace!(error = %err, "payload not serializable"),
                    }
                }
            }

            let started = Instant::now();
            let result = next.run(envelope).await;
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_millis() as u64;

            match &result {
                Ok(Response::Success(_)) => debug!(elapsed_ms, "dispatch succeeded"),
                Ok(Response::Error(error)) => {
                    debug!(elapsed_ms, error_kind = %error.kind(), "dispatch returned error response")
                }
                Err(err) => warn!(elapsed_ms, error = %err, "dispatch faulted"),
            }

            if elapsed >= self.slow_threshold {
                warn!(
                    elapsed_ms,
                    threshold_ms = self.slow_threshold.as_millis() as u64,
                    "slow dispatch of {}",
                    key
                );
            }

            result
        }
        .instrument(span)
        .await
    }
}
