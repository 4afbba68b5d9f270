pub mod model;
pub mod producer;

pub use model::{AuditActor, AuditError, AuditEvent, AuditResult, AuditSeverity, AUDIT_EVENT_VERSION};
pub use producer::{AuditProducer, AuditSink, NoopAuditSink, TracingAuditSink};
#[cfg(feature = "kafka-producer")]
pub use producer::KafkaAuditSink;
