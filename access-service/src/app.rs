use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use common_audit::{AuditActor, AuditProducer, AuditSeverity};
use common_auth::TokenVerifier;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::admin_handlers::{
    create_trial, get_subscription, grant_lifetime, revoke_lifetime, set_subscription,
};
use crate::cache::ClaimsCache;
use crate::config::AccessConfig;
use crate::directory::UserDirectory;
use crate::gate::{access_gate, whoami};
use crate::metrics::AccessMetrics;
use crate::subscription::{SubscriptionEvaluator, SubscriptionStore};

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn UserDirectory>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub evaluator: SubscriptionEvaluator,
    pub verifier: Arc<TokenVerifier>,
    pub claims_cache: Arc<ClaimsCache>,
    pub audit: AuditProducer,
    pub config: Arc<AccessConfig>,
    pub metrics: Arc<AccessMetrics>,
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl AppState {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        subscriptions: Arc<dyn SubscriptionStore>,
        verifier: TokenVerifier,
        audit: AuditProducer,
        config: AccessConfig,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(AccessMetrics::new()?);
        let evaluator =
            SubscriptionEvaluator::new(subscriptions.clone()).with_metrics(metrics.clone());
        let claims_cache = Arc::new(ClaimsCache::new(
            config.token_cache_ttl,
            config.token_cache_max,
        ));

        Ok(Self {
            directory,
            subscriptions,
            evaluator,
            verifier: Arc::new(verifier),
            claims_cache,
            audit,
            config: Arc::new(config),
            metrics,
        })
    }

    /// Best-effort audit emission. Failures are logged and counted, never
    /// surfaced to the request that produced the event.
    pub fn emit_decision_audit(
        &self,
        organization_id: Option<Uuid>,
        actor: AuditActor,
        action: &'static str,
        reason: String,
        severity: AuditSeverity,
        payload: serde_json::Value,
    ) {
        let audit = self.audit.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            if let Err(err) = audit
                .emit(
                    organization_id,
                    actor,
                    action,
                    Some(reason),
                    severity,
                    None,
                    payload,
                    json!({}),
                )
                .await
            {
                metrics.audit_emit_failure();
                warn!(error = %err, "failed to record audit event");
            }
        });
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {err}"),
        )
            .into_response(),
    }
}

/// Full service router. Everything under the gate requires a verified,
/// entitled caller; `/healthz` and `/metrics` stay open.
pub fn router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/whoami", get(whoami))
        .route(
            "/organizations/:org_id/subscription",
            get(get_subscription).put(set_subscription),
        )
        .route("/organizations/:org_id/grant-lifetime", put(grant_lifetime))
        .route(
            "/organizations/:org_id/revoke-lifetime",
            put(revoke_lifetime),
        )
        .route("/organizations/:org_id/trial", post(create_trial))
        .layer(middleware::from_fn_with_state(state.clone(), access_gate));

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(render_metrics))
        .merge(gated)
        .with_state(state)
}
