#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use access_service::app::{router, AppState};
use access_service::config::AccessConfig;
use access_service::directory::{AccountStatus, InMemoryUserDirectory, UserRecord};
use access_service::subscription::{
    InMemorySubscriptionStore, SubscriptionRecord, SubscriptionStatus,
};
use common_audit::{AuditProducer, NoopAuditSink};
use common_auth::{JwtConfig, Role, TokenVerifier};

pub const SECRET: &str = "integration-test-secret";
pub const ISSUER: &str = "havenpm";
pub const AUDIENCE: &str = "havenpm-api";

pub struct TestHarness {
    pub directory: Arc<InMemoryUserDirectory>,
    pub subscriptions: Arc<InMemorySubscriptionStore>,
    pub app: Router,
}

pub fn harness() -> TestHarness {
    let directory = Arc::new(InMemoryUserDirectory::new());
    let subscriptions = Arc::new(InMemorySubscriptionStore::new());

    let config = AccessConfig {
        jwt: JwtConfig::new(SECRET, ISSUER, AUDIENCE).with_leeway(0),
        trial_days: 7,
        token_cache_ttl: Duration::from_secs(60),
        token_cache_max: 1024,
        audit_topic: "security.access.decisions".to_string(),
    };
    let verifier = TokenVerifier::new(config.jwt.clone()).expect("verifier");
    let audit = AuditProducer::new(NoopAuditSink, "access-service");

    let state = AppState::new(
        directory.clone(),
        subscriptions.clone(),
        verifier,
        audit,
        config,
    )
    .expect("app state");

    TestHarness {
        directory,
        subscriptions,
        app: router(state),
    }
}

#[derive(Serialize)]
struct TokenClaims {
    sub: String,
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    org: Option<String>,
    iss: String,
    aud: String,
    exp: i64,
    iat: i64,
}

pub fn token_with_ttl(user_id: Uuid, role: Role, org: Option<Uuid>, ttl_seconds: i64) -> String {
    let issued_at = Utc::now().timestamp();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        org: org.map(|value| value.to_string()),
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        exp: issued_at + ttl_seconds,
        iat: issued_at,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("sign token")
}

pub fn token_for(user_id: Uuid, role: Role, org: Option<Uuid>) -> String {
    token_with_ttl(user_id, role, org, 600)
}

pub fn user(harness: &TestHarness, role: Role, status: AccountStatus, org: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    harness.directory.insert(UserRecord {
        id,
        role,
        status,
        organization_id: org,
    });
    id
}

pub fn subscription(
    harness: &TestHarness,
    org: Uuid,
    status: SubscriptionStatus,
) -> SubscriptionRecord {
    let record = SubscriptionRecord {
        organization_id: org,
        plan_id: None,
        status,
        is_lifetime: false,
        trial_expires_at: None,
        current_period_ends_at: None,
        expired_at: None,
        external_id: None,
    };
    harness.subscriptions.insert(record.clone());
    record
}
