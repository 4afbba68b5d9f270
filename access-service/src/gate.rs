use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use common_audit::{AuditActor, AuditSeverity};
use common_auth::{parse_bearer, AuthError, AuthResult, Claims};
use common_http_errors::ApiError;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::decision::{decide, AccessDecision, AccessWarning, DecisionReason};
use crate::directory::{resolve, IdentityError, UserRecord};
use crate::subscription::SubscriptionOutcome;

pub const SUBSCRIPTION_WARNING_HEADER: &str = "X-Subscription-Warning";

/// Verified identity attached to every request that passes the gate.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub user: UserRecord,
    pub claims: Claims,
    pub warning: Option<AccessWarning>,
}

/// The request pipeline: bearer → verify → resolve → evaluate → decide.
/// Rejections carry a machine-readable reason code; allowed requests proceed
/// with a `RequestIdentity` extension and, when degraded, a warning header.
pub async fn access_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();

    let claims = match bearer_claims(&state, &request) {
        Ok(claims) => claims,
        Err(err) => {
            let reason = auth_reason(&err);
            return deny(&state, AuditActor::default(), None, reason, &path, err.to_string());
        }
    };

    let actor = actor_from_claims(&claims);

    let user = match resolve(state.directory.as_ref(), &claims).await {
        Ok(user) => user,
        Err(err) => {
            let (reason, message) = match &err {
                IdentityError::UserNotFound(_) => {
                    (DecisionReason::UserNotFound, err.to_string())
                }
                IdentityError::AccountInactive(_) => {
                    (DecisionReason::AccountInactive, err.to_string())
                }
                // Directory outage is a decisive deny, logged in resolve().
                IdentityError::Unavailable(_) => (
                    DecisionReason::UserNotFound,
                    "unable to verify user account".to_string(),
                ),
            };
            return deny(&state, actor, claims.organization_id, reason, &path, message);
        }
    };

    let outcome = if user.role.is_elevated() {
        // Elevated roles never reach the subscription store; decide()
        // returns RoleBypass before reading the outcome.
        SubscriptionOutcome::NoOrg
    } else {
        state.evaluator.evaluate(user.organization_id).await
    };

    let decision = decide(user.role, user.status, &outcome);

    if !decision.allowed {
        return deny(
            &state,
            actor,
            user.organization_id,
            decision.reason,
            &path,
            deny_message(decision.reason),
        );
    }

    record_allow(&state, &actor, &user, &decision, &path);

    let identity = RequestIdentity {
        user,
        claims,
        warning: decision.warning,
    };
    let warning = identity.warning;
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    if let Some(warning) = warning {
        response.headers_mut().insert(
            SUBSCRIPTION_WARNING_HEADER,
            HeaderValue::from_static(warning.code()),
        );
    }
    response
}

/// Demonstration of the downstream contract: handlers read the identity the
/// gate attached.
pub async fn whoami(Extension(identity): Extension<RequestIdentity>) -> Json<serde_json::Value> {
    Json(json!({
        "user": identity.user,
        "warning": identity.warning.map(|warning| warning.code()),
    }))
}

fn bearer_claims(state: &AppState, request: &Request) -> AuthResult<Claims> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;
    let token = parse_bearer(header)?;

    if let Some(claims) = state.claims_cache.get(&token) {
        return Ok(claims);
    }
    let claims = state.verifier.verify(&token)?;
    state.claims_cache.insert(token, claims.clone());
    Ok(claims)
}

fn auth_reason(err: &AuthError) -> DecisionReason {
    match err {
        AuthError::MissingAuthorization | AuthError::InvalidAuthorization => {
            DecisionReason::NoToken
        }
        AuthError::Expired => DecisionReason::ExpiredToken,
        _ => DecisionReason::InvalidToken,
    }
}

fn actor_from_claims(claims: &Claims) -> AuditActor {
    AuditActor {
        id: Some(claims.subject),
        name: claims
            .raw
            .get("name")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()),
        email: claims
            .raw
            .get("email")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()),
    }
}

fn deny_message(reason: DecisionReason) -> String {
    match reason {
        DecisionReason::SubscriptionExpired => "Organization subscription has expired".to_string(),
        DecisionReason::SubscriptionCanceled => {
            "Organization subscription is not active".to_string()
        }
        DecisionReason::AccountInactive => "User account is not active".to_string(),
        other => other.code().to_string(),
    }
}

fn deny(
    state: &AppState,
    actor: AuditActor,
    organization_id: Option<Uuid>,
    reason: DecisionReason,
    path: &str,
    message: String,
) -> Response {
    state.metrics.decision(reason.code());
    state.emit_decision_audit(
        organization_id,
        actor,
        "access.denied",
        reason.code().to_string(),
        AuditSeverity::Security,
        json!({ "path": path }),
    );

    let error = match reason {
        DecisionReason::SubscriptionExpired | DecisionReason::SubscriptionCanceled => {
            ApiError::forbidden(reason.code(), message)
        }
        _ => ApiError::unauthorized(reason.code(), message),
    };
    error.into_response()
}

fn record_allow(
    state: &AppState,
    actor: &AuditActor,
    user: &UserRecord,
    decision: &AccessDecision,
    path: &str,
) {
    state.metrics.decision(decision.reason.code());
    let severity = match decision.reason {
        DecisionReason::RoleBypass => AuditSeverity::Security,
        _ => AuditSeverity::Info,
    };
    state.emit_decision_audit(
        user.organization_id,
        actor.clone(),
        "access.allowed",
        decision.reason.code().to_string(),
        severity,
        json!({
            "path": path,
            "warning": decision.warning.map(|warning| warning.code()),
        }),
    );
}
