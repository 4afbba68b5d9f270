use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use common_audit::{AuditActor, AuditSeverity};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::gate::RequestIdentity;
use crate::subscription::{BillingCadence, SubscriptionRecord, SubscriptionStatus};

/// Administrative transitions operate on other organizations' billing state,
/// so they are restricted to platform operators on top of the gate itself.
fn ensure_elevated(identity: &RequestIdentity) -> Result<(), ApiError> {
    if identity.user.role.is_elevated() {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "ROLE_FORBIDDEN",
            format!("Role '{}' may not manage subscriptions", identity.user.role),
        ))
    }
}

fn admin_actor(identity: &RequestIdentity) -> AuditActor {
    AuditActor {
        id: Some(identity.user.id),
        name: None,
        email: None,
    }
}

pub async fn grant_lifetime(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    Path(org_id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionRecord>> {
    ensure_elevated(&identity)?;

    let record = state
        .subscriptions
        .upsert_lifetime(org_id, true, SubscriptionStatus::Active)
        .await
        .map_err(|err| ApiError::internal(err, None))?;

    state.emit_decision_audit(
        Some(org_id),
        admin_actor(&identity),
        "subscription.grant_lifetime",
        "LIFETIME_GRANTED".to_string(),
        AuditSeverity::Compliance,
        json!({ "target_organization": org_id }),
    );

    Ok(Json(record))
}

pub async fn revoke_lifetime(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    Path(org_id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionRecord>> {
    ensure_elevated(&identity)?;

    let existing = state
        .subscriptions
        .find_by_organization(org_id)
        .await
        .map_err(|err| ApiError::internal(err, None))?;
    if existing.is_none() {
        return Err(ApiError::NotFound {
            code: "SUBSCRIPTION_NOT_FOUND",
            trace_id: None,
        });
    }

    let record = state
        .subscriptions
        .upsert_lifetime(org_id, false, SubscriptionStatus::Inactive)
        .await
        .map_err(|err| ApiError::internal(err, None))?;

    state.emit_decision_audit(
        Some(org_id),
        admin_actor(&identity),
        "subscription.revoke_lifetime",
        "LIFETIME_REVOKED".to_string(),
        AuditSeverity::Compliance,
        json!({ "target_organization": org_id }),
    );

    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct SetSubscriptionRequest {
    pub status: SubscriptionStatus,
    /// Required when the new status opens a billing period
    /// (`active`/`trialing`).
    pub cadence: Option<BillingCadence>,
}

pub async fn set_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    Path(org_id): Path<Uuid>,
    Json(payload): Json<SetSubscriptionRequest>,
) -> ApiResult<Json<SubscriptionRecord>> {
    ensure_elevated(&identity)?;

    let needs_cadence = matches!(
        payload.status,
        SubscriptionStatus::Active | SubscriptionStatus::Trialing
    );
    if needs_cadence && payload.cadence.is_none() {
        return Err(ApiError::BadRequest {
            code: "MISSING_CADENCE",
            trace_id: None,
            message: Some(format!(
                "Status '{}' requires a billing cadence",
                payload.status.as_str()
            )),
        });
    }

    let now = Utc::now();
    let period_ends_at: Option<DateTime<Utc>> =
        payload.cadence.map(|cadence| cadence.period_end_from(now));
    let trial_expires_at = if payload.status == SubscriptionStatus::Trialing {
        period_ends_at
    } else {
        None
    };

    let record = state
        .subscriptions
        .set_status(org_id, payload.status, period_ends_at, trial_expires_at)
        .await
        .map_err(|err| ApiError::internal(err, None))?
        .ok_or(ApiError::NotFound {
            code: "SUBSCRIPTION_NOT_FOUND",
            trace_id: None,
        })?;

    state.emit_decision_audit(
        Some(org_id),
        admin_actor(&identity),
        "subscription.manual_update",
        "SUBSCRIPTION_MANUAL_UPDATE".to_string(),
        AuditSeverity::Compliance,
        json!({
            "target_organization": org_id,
            "status": payload.status.as_str(),
            "cadence": payload.cadence,
        }),
    );

    Ok(Json(record))
}

pub async fn create_trial(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    Path(org_id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionRecord>> {
    ensure_elevated(&identity)?;

    let trial_expires_at = Utc::now() + Duration::days(state.config.trial_days);
    let record = state
        .subscriptions
        .create_trial(org_id, trial_expires_at)
        .await
        .map_err(|err| ApiError::internal(err, None))?
        .ok_or(ApiError::Conflict {
            code: "SUBSCRIPTION_EXISTS",
            trace_id: None,
            message: Some("Organization already has a subscription".to_string()),
        })?;

    state.emit_decision_audit(
        Some(org_id),
        admin_actor(&identity),
        "subscription.trial_created",
        "TRIAL_CREATED".to_string(),
        AuditSeverity::Compliance,
        json!({ "target_organization": org_id, "trial_expires_at": trial_expires_at }),
    );

    Ok(Json(record))
}

/// Current record plus the computed "is expired now" view.
#[derive(Debug, Serialize)]
pub struct SubscriptionStatusView {
    pub has_subscription: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_lifetime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    Path(org_id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionStatusView>> {
    ensure_elevated(&identity)?;

    let record = state
        .subscriptions
        .find_by_organization(org_id)
        .await
        .map_err(|err| ApiError::internal(err, None))?;

    let view = match record {
        None => SubscriptionStatusView {
            has_subscription: false,
            status: None,
            is_expired: None,
            is_lifetime: None,
            expires_at: None,
        },
        Some(record) => {
            let now = Utc::now();
            let is_expired = !record.is_lifetime
                && record
                    .current_period_ends_at
                    .map(|ends_at| ends_at < now)
                    .unwrap_or(false);
            SubscriptionStatusView {
                has_subscription: true,
                status: Some(record.status),
                is_expired: Some(is_expired),
                is_lifetime: Some(record.is_lifetime),
                expires_at: record.current_period_ends_at,
            }
        }
    };

    Ok(Json(view))
}
