use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use common_audit::AuditProducer;
use common_auth::TokenVerifier;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};

use access_service::app::{router, AppState};
use access_service::config::load_access_config;
use access_service::directory::PgUserDirectory;
use access_service::subscription::PgSubscriptionStore;

const SERVICE_NAME: &str = "access-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Fails fast without a signing secret; never a per-request error.
    let config = load_access_config()?;

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_pool = PgPool::connect(&database_url).await?;

    let verifier = TokenVerifier::new(config.jwt.clone())?;
    let audit = build_audit_producer(&config.audit_topic)?;

    let state = AppState::new(
        Arc::new(PgUserDirectory::new(db_pool.clone())),
        Arc::new(PgSubscriptionStore::new(db_pool)),
        verifier,
        audit,
        config,
    )?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("authorization"),
        ]);

    let app = router(state).layer(cors);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8086);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));

    info!(%addr, "starting {SERVICE_NAME}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "kafka-producer")]
fn build_audit_producer(topic: &str) -> anyhow::Result<AuditProducer> {
    use common_audit::KafkaAuditSink;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::FutureProducer;

    let brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("message.timeout.ms", "5000")
        .create()?;
    Ok(AuditProducer::new(
        KafkaAuditSink::new(producer, topic),
        SERVICE_NAME,
    ))
}

#[cfg(not(feature = "kafka-producer"))]
fn build_audit_producer(_topic: &str) -> anyhow::Result<AuditProducer> {
    Ok(AuditProducer::new(
        common_audit::TracingAuditSink,
        SERVICE_NAME,
    ))
}
