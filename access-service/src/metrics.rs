use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AccessMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    lazy_expirations: IntCounter,
    audit_emit_failures: IntCounter,
}

impl AccessMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        // Reason codes are a small fixed set, so cardinality stays bounded.
        let decisions = IntCounterVec::new(
            Opts::new(
                "access_decisions_total",
                "Count of access decisions grouped by reason code",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let lazy_expirations = IntCounter::new(
            "subscription_lazy_expirations_total",
            "Subscriptions transitioned to expired during evaluation",
        )?;
        registry.register(Box::new(lazy_expirations.clone()))?;

        let audit_emit_failures = IntCounter::new(
            "audit_event_emit_failures_total",
            "Audit event emission failures",
        )?;
        registry.register(Box::new(audit_emit_failures.clone()))?;

        Ok(Self {
            registry,
            decisions,
            lazy_expirations,
            audit_emit_failures,
        })
    }

    pub fn decision(&self, reason: &str) {
        self.decisions.with_label_values(&[reason]).inc();
    }

    pub fn lazy_expiration(&self) {
        self.lazy_expirations.inc();
    }

    pub fn audit_emit_failure(&self) {
        self.audit_emit_failures.inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
