use common_auth::Role;
use serde::Serialize;

use crate::directory::AccountStatus;
use crate::subscription::SubscriptionOutcome;

/// Machine-readable reason attached to every decision. Clients use the code
/// to distinguish "log in again" from "your subscription lapsed" from
/// "contact support".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    NoToken,
    InvalidToken,
    ExpiredToken,
    UserNotFound,
    AccountInactive,
    NoSubscriptionData,
    SubscriptionExpired,
    SubscriptionCanceled,
    RoleBypass,
    Allowed,
}

impl DecisionReason {
    pub fn code(&self) -> &'static str {
        match self {
            DecisionReason::NoToken => "NO_TOKEN",
            DecisionReason::InvalidToken => "INVALID_TOKEN",
            DecisionReason::ExpiredToken => "EXPIRED_TOKEN",
            DecisionReason::UserNotFound => "USER_NOT_FOUND",
            DecisionReason::AccountInactive => "ACCOUNT_INACTIVE",
            DecisionReason::NoSubscriptionData => "NO_SUBSCRIPTION_DATA",
            DecisionReason::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            DecisionReason::SubscriptionCanceled => "SUBSCRIPTION_CANCELED",
            DecisionReason::RoleBypass => "ROLE_BYPASS",
            DecisionReason::Allowed => "ALLOWED",
        }
    }
}

/// Non-fatal annotation on an allow decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessWarning {
    NoOrg,
    SubscriptionUnknown,
}

impl AccessWarning {
    pub fn code(&self) -> &'static str {
        match self {
            AccessWarning::NoOrg => "NO_ORG",
            AccessWarning::SubscriptionUnknown => "SUBSCRIPTION_UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub warning: Option<AccessWarning>,
}

impl AccessDecision {
    pub fn allow(reason: DecisionReason) -> Self {
        Self {
            allowed: true,
            reason,
            warning: None,
        }
    }

    pub fn allow_with(reason: DecisionReason, warning: AccessWarning) -> Self {
        Self {
            allowed: true,
            reason,
            warning: Some(warning),
        }
    }

    pub fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
            warning: None,
        }
    }
}

/// The decision table, first match wins. The ordering is part of the
/// contract: role bypass precedes every subscription outcome, and an unknown
/// subscription state is never treated as an expired one.
pub fn decide(
    role: Role,
    account_status: AccountStatus,
    outcome: &SubscriptionOutcome,
) -> AccessDecision {
    if account_status != AccountStatus::Active {
        return AccessDecision::deny(DecisionReason::AccountInactive);
    }

    if role.is_elevated() {
        return AccessDecision::allow(DecisionReason::RoleBypass);
    }

    match outcome {
        SubscriptionOutcome::NoOrg => {
            AccessDecision::allow_with(DecisionReason::Allowed, AccessWarning::NoOrg)
        }
        SubscriptionOutcome::Entitled => AccessDecision::allow(DecisionReason::Allowed),
        SubscriptionOutcome::NoSubscriptionData => AccessDecision::allow_with(
            DecisionReason::NoSubscriptionData,
            AccessWarning::SubscriptionUnknown,
        ),
        SubscriptionOutcome::Expired => AccessDecision::deny(DecisionReason::SubscriptionExpired),
        SubscriptionOutcome::NotEntitled(_) => {
            AccessDecision::deny(DecisionReason::SubscriptionCanceled)
        }
    }
}
