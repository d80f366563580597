pub mod provider;

use crate::domain::sender::{ProviderKind, SenderSettings};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use provider::{MessageHandler, OutboundMessage, ProviderError, ProviderStrategy, SendResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    send_duration_seconds: Histogram<f64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier");
        Self {
            sent_total: meter
                .u64_counter("courier_messages_sent_total")
                .with_description("Provider send attempts by outcome")
                .build(),
            send_duration_seconds: meter
                .f64_histogram("courier_send_duration_seconds")
                .with_description("Time spent in a single provider call")
                .build(),
        }
    }
}

/// Maps each provider to the strategy that builds its handler.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    strategies: HashMap<ProviderKind, Arc<dyn ProviderStrategy>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy, replacing any previous one for the same provider.
    #[must_use]
    pub fn with(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
        self.strategies.insert(strategy.provider(), strategy);
        self
    }

    /// # Errors
    /// Returns `ProviderError::Unsupported` when no strategy is registered for the settings' provider.
    pub fn handler_for(&self, settings: SenderSettings) -> Result<Arc<dyn MessageHandler>, ProviderError> {
        let provider = settings.provider();
        let strategy = self.strategies.get(&provider).ok_or(ProviderError::Unsupported(provider))?;
        strategy.execute(settings)
    }
}

#[derive(Clone, Debug)]
pub struct ProviderDispatcher {
    registry: ProviderRegistry,
    timeout: Duration,
    metrics: Metrics,
}

impl ProviderDispatcher {
    #[must_use]
    pub fn new(registry: ProviderRegistry, timeout: Duration) -> Self {
        Self { registry, timeout, metrics: Metrics::new() }
    }

    /// Resolves the handler once for a request. A failure here is kept and
    /// reported on every message of the request.
    #[must_use]
    pub fn prepare(&self, settings: SenderSettings) -> PreparedDispatch {
        let provider = settings.provider();
        let handler = self.registry.handler_for(settings).map_err(|e| {
            tracing::warn!(error = %e, %provider, "Could not build provider handler");
            SendResult::from(&e)
        });
        PreparedDispatch { provider, handler, timeout: self.timeout, metrics: self.metrics.clone() }
    }
}

/// A handler bound to one sender's settings, shared by every send of a request.
#[derive(Clone, Debug)]
pub struct PreparedDispatch {
    provider: ProviderKind,
    handler: Result<Arc<dyn MessageHandler>, SendResult>,
    timeout: Duration,
    metrics: Metrics,
}

impl PreparedDispatch {
    /// Sends `message` and always yields a result: errors, timeouts and panics
    /// inside the handler become failed results.
    #[tracing::instrument(skip(self, message), fields(message_id = %message.message_id, provider = %self.provider))]
    pub async fn dispatch(&self, message: Arc<OutboundMessage>) -> SendResult {
        let handler = match &self.handler {
            Ok(handler) => Arc::clone(handler),
            Err(result) => return result.clone(),
        };

        let started = Instant::now();
        let mut call = tokio::spawn(async move { handler.send(&message).await });
        let outcome = match tokio::time::timeout(self.timeout, &mut call).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join_error)) => Err(ProviderError::Aborted(join_error.to_string())),
            Err(_) => {
                call.abort();
                Err(ProviderError::Timeout(self.timeout))
            }
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Provider call failed");
                SendResult::from(&e)
            }
        };

        let status = if result.succeeded { "succeeded" } else { "failed" };
        let labels = [KeyValue::new("provider", self.provider.as_str()), KeyValue::new("status", status)];
        self.metrics.sent_total.add(1, &labels);
        self.metrics.send_duration_seconds.record(started.elapsed().as_secs_f64(), &labels);

        result
    }
}
