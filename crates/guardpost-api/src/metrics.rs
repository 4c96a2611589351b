//! Metrics collection for the API service.
//!
//! Metrics are registered on a registry owned by [`ServiceMetrics`] rather than
//! the process-global default, so several routers can live in one process
//! (tests, embedded use) without name collisions.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Service metrics for observability
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounter,
    pub http_request_duration: Histogram,

    // Webhook metrics
    pub webhook_requests_total: IntCounterVec,
    pub signature_validation_failures: IntCounter,

    // Signed URL metrics
    pub signed_url_requests_total: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some("guardpost".to_string()), None)?;

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests")?;
        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;
        let webhook_requests_total = IntCounterVec::new(
            Opts::new(
                "webhook_requests_total",
                "Inbound messaging webhooks by outcome",
            ),
            &["outcome"],
        )?;
        let signature_validation_failures = IntCounter::new(
            "signature_validation_failures",
            "Failed webhook signature validations",
        )?;
        let signed_url_requests_total = IntCounterVec::new(
            Opts::new("signed_url_requests_total", "Signed URL requests by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(signature_validation_failures.clone()))?;
        registry.register(Box::new(signed_url_requests_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration,
            webhook_requests_total,
            signature_validation_failures,
            signed_url_requests_total,
        }))
    }

    pub fn record_http_request(&self, duration: Duration) {
        self.http_requests_total.inc();
        self.http_request_duration.observe(duration.as_secs_f64());
    }

    /// Count a webhook by outcome (`accepted`, `invalid_signature`, ...)
    pub fn record_webhook(&self, outcome: &str) {
        self.webhook_requests_total
            .with_label_values(&[outcome])
            .inc();
        if outcome == "invalid_signature" {
            self.signature_validation_failures.inc();
        }
    }

    /// Count a signed-URL request by outcome
    pub fn record_signed_url(&self, outcome: &str) {
        self.signed_url_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
