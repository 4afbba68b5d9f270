use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{AuditActor, AuditError, AuditEvent, AuditResult, AuditSeverity, AUDIT_EVENT_VERSION};

/// Destination for audit events. Implementations must be safe to share across
/// request tasks.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> AuditResult<()>;
}

/// Discards events. Default for tests and for deployments without a bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _event: &AuditEvent) -> AuditResult<()> {
        Ok(())
    }
}

/// Writes events to the local structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> AuditResult<()> {
        let serialized = serde_json::to_string(event)
            .map_err(|err| AuditError::Serialization(err.to_string()))?;
        info!(target: "audit", event = %serialized, "audit event");
        Ok(())
    }
}

#[cfg(feature = "kafka-producer")]
pub use kafka::KafkaAuditSink;

#[cfg(feature = "kafka-producer")]
mod kafka {
    use std::time::Duration;

    use async_trait::async_trait;
    use rdkafka::producer::{FutureProducer, FutureRecord};

    use crate::{AuditError, AuditEvent, AuditResult};

    use super::AuditSink;

    #[derive(Clone)]
    pub struct KafkaAuditSink {
        producer: FutureProducer,
        topic: String,
    }

    impl KafkaAuditSink {
        pub fn new(producer: FutureProducer, topic: impl Into<String>) -> Self {
            Self {
                producer,
                topic: topic.into(),
            }
        }
    }

    #[async_trait]
    impl AuditSink for KafkaAuditSink {
        async fn record(&self, event: &AuditEvent) -> AuditResult<()> {
            let serialized = serde_json::to_vec(event)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;
            // Key by organization so per-org ordering survives partitioning.
            let key = event
                .organization_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "platform".to_string());
            let record = FutureRecord::to(&self.topic).key(&key).payload(&serialized);
            if let Err((e, _)) = self.producer.send(record, Duration::from_secs(5)).await {
                return Err(AuditError::Kafka(e.to_string()));
            }
            Ok(())
        }
    }
}

/// Stamps ids/timestamps onto events and hands them to the configured sink.
#[derive(Clone)]
pub struct AuditProducer {
    sink: Arc<dyn AuditSink>,
    source_service: String,
}

impl AuditProducer {
    pub fn new(sink: impl AuditSink + 'static, source_service: impl Into<String>) -> Self {
        Self {
            sink: Arc::new(sink),
            source_service: source_service.into(),
        }
    }

    pub fn from_arc(sink: Arc<dyn AuditSink>, source_service: impl Into<String>) -> Self {
        Self {
            sink,
            source_service: source_service.into(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn emit(
        &self,
        organization_id: Option<Uuid>,
        actor: AuditActor,
        action: impl Into<String>,
        decision_reason: Option<String>,
        severity: AuditSeverity,
        trace_id: Option<Uuid>,
        payload: serde_json::Value,
        meta: serde_json::Value,
    ) -> AuditResult<AuditEvent> {
        let event = AuditEvent {
            event_id: Uuid::new_v4(),
            event_version: AUDIT_EVENT_VERSION,
            organization_id,
            actor,
            action: action.into(),
            decision_reason,
            occurred_at: Utc::now(),
            source_service: self.source_service.clone(),
            severity,
            trace_id,
            payload,
            meta,
        };
        self.sink.record(&event).await?;
        Ok(event)
    }
}
