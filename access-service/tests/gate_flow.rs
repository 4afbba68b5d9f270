mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use common_auth::Role;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use access_service::directory::AccountStatus;
use access_service::subscription::SubscriptionStatus;
use support::{harness, subscription, token_for, token_with_ttl, user};

fn get_whoami(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/whoami").method("GET");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn error_code(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("X-Error-Code")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn missing_token_is_401_no_token() {
    let h = harness();
    let resp = h.app.oneshot(get_whoami(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&resp), "NO_TOKEN");
}

#[tokio::test]
async fn malformed_header_is_401_no_token() {
    let h = harness();
    let req = Request::builder()
        .uri("/whoami")
        .header("authorization", "Basic credentials")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&resp), "NO_TOKEN");
}

#[tokio::test]
async fn garbage_token_is_401_invalid_token() {
    let h = harness();
    let resp = h
        .app
        .oneshot(get_whoami(Some("not.a.token")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&resp), "INVALID_TOKEN");
}

#[tokio::test]
async fn expired_token_is_401_expired_token() {
    let h = harness();
    let token = token_with_ttl(Uuid::new_v4(), Role::Landlord, None, -600);
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&resp), "EXPIRED_TOKEN");
}

#[tokio::test]
async fn valid_token_for_deleted_account_is_401_user_not_found() {
    let h = harness();
    let token = token_for(Uuid::new_v4(), Role::Landlord, None);
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&resp), "USER_NOT_FOUND");
}

#[tokio::test]
async fn suspended_account_denies_before_subscription() {
    // Scenario: suspended account, perfectly healthy subscription.
    let h = harness();
    let org = Uuid::new_v4();
    let mut record = subscription(&h, org, SubscriptionStatus::Active);
    record.current_period_ends_at = Some(Utc::now() + Duration::days(30));
    h.subscriptions.insert(record);
    let id = user(&h, Role::Landlord, AccountStatus::Suspended, Some(org));

    let token = token_for(id, Role::Landlord, Some(org));
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&resp), "ACCOUNT_INACTIVE");
    // The subscription record was never touched.
    assert_eq!(
        h.subscriptions.get(org).unwrap().status,
        SubscriptionStatus::Active
    );
}

#[tokio::test]
async fn landlord_with_current_subscription_passes() {
    let h = harness();
    let org = Uuid::new_v4();
    let mut record = subscription(&h, org, SubscriptionStatus::Active);
    record.current_period_ends_at = Some(Utc::now() + Duration::days(1));
    h.subscriptions.insert(record);
    let id = user(&h, Role::Landlord, AccountStatus::Active, Some(org));

    let token = token_for(id, Role::Landlord, Some(org));
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("X-Subscription-Warning").is_none());
}

#[tokio::test]
async fn super_admin_bypasses_canceled_subscription() {
    let h = harness();
    let org = Uuid::new_v4();
    subscription(&h, org, SubscriptionStatus::Canceled);
    let id = user(&h, Role::SuperAdmin, AccountStatus::Active, Some(org));

    let token = token_for(id, Role::SuperAdmin, Some(org));
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn landlord_without_organization_passes_with_warning() {
    let h = harness();
    let id = user(&h, Role::Landlord, AccountStatus::Active, None);

    let token = token_for(id, Role::Landlord, None);
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("X-Subscription-Warning").unwrap(),
        "NO_ORG"
    );

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["warning"], "NO_ORG");
}

#[tokio::test]
async fn lapsed_trial_is_403_and_record_transitions() {
    let h = harness();
    let org = Uuid::new_v4();
    let mut record = subscription(&h, org, SubscriptionStatus::Trialing);
    record.trial_expires_at = Some(Utc::now() - Duration::days(1));
    h.subscriptions.insert(record);
    let id = user(&h, Role::Landlord, AccountStatus::Active, Some(org));

    let token = token_for(id, Role::Landlord, Some(org));
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&resp), "SUBSCRIPTION_EXPIRED");

    let stored = h.subscriptions.get(org).unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Expired);
    assert!(stored.expired_at.is_some());
}

#[tokio::test]
async fn canceled_subscription_is_403_subscription_canceled() {
    let h = harness();
    let org = Uuid::new_v4();
    subscription(&h, org, SubscriptionStatus::Canceled);
    let id = user(&h, Role::Agent, AccountStatus::Active, Some(org));

    let token = token_for(id, Role::Agent, Some(org));
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&resp), "SUBSCRIPTION_CANCELED");
}

#[tokio::test]
async fn billing_outage_degrades_to_warning_not_denial() {
    let h = harness();
    let org = Uuid::new_v4();
    subscription(&h, org, SubscriptionStatus::Active);
    let id = user(&h, Role::Landlord, AccountStatus::Active, Some(org));
    h.subscriptions.set_unavailable(true);

    let token = token_for(id, Role::Landlord, Some(org));
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("X-Subscription-Warning").unwrap(),
        "SUBSCRIPTION_UNKNOWN"
    );
}

#[tokio::test]
async fn directory_outage_is_a_decisive_deny() {
    let h = harness();
    let id = user(&h, Role::Landlord, AccountStatus::Active, None);
    h.directory.set_unavailable(true);

    let token = token_for(id, Role::Landlord, None);
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&resp), "USER_NOT_FOUND");
}

#[tokio::test]
async fn stale_token_role_does_not_grant_bypass() {
    // The claim says SuperAdmin, the directory says Tenant: the live record
    // wins and the canceled subscription denies.
    let h = harness();
    let org = Uuid::new_v4();
    subscription(&h, org, SubscriptionStatus::Canceled);
    let id = user(&h, Role::Tenant, AccountStatus::Active, Some(org));

    let token = token_for(id, Role::SuperAdmin, Some(org));
    let resp = h.app.oneshot(get_whoami(Some(&token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&resp), "SUBSCRIPTION_CANCELED");
}

#[tokio::test]
async fn healthz_stays_open() {
    let h = harness();
    let req = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
