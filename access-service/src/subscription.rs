use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics::AccessMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    Inactive,
    Canceled,
    PastDue,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "active" => Ok(SubscriptionStatus::Active),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(format!("unknown subscription status '{other}'")),
        }
    }
}

/// Billing cadence used by the administrative transition surface to derive a
/// new period boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCadence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl BillingCadence {
    pub fn period_end_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            BillingCadence::Daily => now + Duration::days(1),
            BillingCadence::Weekly => now + Duration::weeks(1),
            BillingCadence::Monthly => now
                .checked_add_months(Months::new(1))
                .unwrap_or(now + Duration::days(30)),
            BillingCadence::Yearly => now
                .checked_add_months(Months::new(12))
                .unwrap_or(now + Duration::days(365)),
        }
    }
}

/// One subscription per organization; `organization_id` is the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub organization_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub status: SubscriptionStatus,
    pub is_lifetime: bool,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub current_period_ends_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
}

impl SubscriptionRecord {
    /// Deadline relevant to the record's current status.
    fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.status {
            SubscriptionStatus::Trialing => self.trial_expires_at,
            SubscriptionStatus::Active | SubscriptionStatus::PastDue => {
                self.current_period_ends_at
            }
            _ => None,
        }
    }
}

/// Result of evaluating an organization's entitlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    /// Account has no organization; the gate proceeds with a warning.
    NoOrg,
    Entitled,
    /// No record, or the store itself was unreachable. Never conflated with
    /// `Expired`; downstream policy degrades to allow-with-warning.
    NoSubscriptionData,
    Expired,
    NotEntitled(SubscriptionStatus),
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_by_organization(&self, org: Uuid) -> anyhow::Result<Option<SubscriptionRecord>>;

    /// Lazy-expiry write. Must be idempotent: re-marking an already-expired
    /// record is a no-op.
    async fn mark_expired(&self, org: Uuid, expired_at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Idempotent upsert used by the lifetime grant/revoke surface.
    async fn upsert_lifetime(
        &self,
        org: Uuid,
        is_lifetime: bool,
        status: SubscriptionStatus,
    ) -> anyhow::Result<SubscriptionRecord>;

    /// Manual status transition; `Ok(None)` when the organization has no
    /// subscription to update.
    async fn set_status(
        &self,
        org: Uuid,
        status: SubscriptionStatus,
        current_period_ends_at: Option<DateTime<Utc>>,
        trial_expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Option<SubscriptionRecord>>;

    /// Creates the initial trialing record; `Ok(None)` when one already
    /// exists (at most one subscription per organization).
    async fn create_trial(
        &self,
        org: Uuid,
        trial_expires_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<SubscriptionRecord>>;
}

/// Evaluates entitlement and opportunistically applies the lazy expiry
/// transition, so no background scheduler is needed.
#[derive(Clone)]
pub struct SubscriptionEvaluator {
    store: Arc<dyn SubscriptionStore>,
    metrics: Option<Arc<AccessMetrics>>,
}

impl SubscriptionEvaluator {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AccessMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    pub async fn evaluate(&self, organization_id: Option<Uuid>) -> SubscriptionOutcome {
        self.evaluate_at(organization_id, Utc::now()).await
    }

    /// Clock-injected variant; `evaluate` delegates here with `Utc::now()`.
    pub async fn evaluate_at(
        &self,
        organization_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> SubscriptionOutcome {
        let org = match organization_id {
            Some(org) => org,
            None => return SubscriptionOutcome::NoOrg,
        };

        let record = match self.store.find_by_organization(org).await {
            Ok(Some(record)) => record,
            // A missing record and an unreachable store both degrade: a read
            // failure must not lock out an otherwise-healthy organization.
            Ok(None) => return SubscriptionOutcome::NoSubscriptionData,
            Err(err) => {
                warn!(organization_id = %org, error = %err, "subscription lookup failed");
                return SubscriptionOutcome::NoSubscriptionData;
            }
        };

        if record.is_lifetime {
            return SubscriptionOutcome::Entitled;
        }

        match record.status {
            SubscriptionStatus::Trialing | SubscriptionStatus::Active => {
                match record.deadline() {
                    Some(deadline) if deadline < now => {
                        // The transition is applied before the decision, but a
                        // failed write still yields Expired for this request.
                        if let Err(err) = self.store.mark_expired(org, now).await {
                            warn!(
                                organization_id = %org,
                                error = %err,
                                "failed to persist lazy expiry"
                            );
                        } else {
                            info!(
                                organization_id = %org,
                                status = record.status.as_str(),
                                "subscription lazily expired"
                            );
                            if let Some(metrics) = &self.metrics {
                                metrics.lazy_expiration();
                            }
                        }
                        SubscriptionOutcome::Expired
                    }
                    _ => SubscriptionOutcome::Entitled,
                }
            }
            SubscriptionStatus::PastDue => match record.deadline() {
                Some(deadline) if deadline < now => SubscriptionOutcome::Expired,
                // Within the billing period past_due is payment grace.
                _ => SubscriptionOutcome::Entitled,
            },
            SubscriptionStatus::Canceled | SubscriptionStatus::Inactive => {
                SubscriptionOutcome::NotEntitled(record.status)
            }
            SubscriptionStatus::Expired => SubscriptionOutcome::Expired,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    organization_id: Uuid,
    plan_id: Option<Uuid>,
    status: String,
    is_lifetime: bool,
    trial_expires_at: Option<DateTime<Utc>>,
    current_period_ends_at: Option<DateTime<Utc>>,
    expired_at: Option<DateTime<Utc>>,
    external_id: Option<String>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = anyhow::Error;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = SubscriptionStatus::from_str(&row.status).map_err(|err| anyhow!(err))?;
        Ok(SubscriptionRecord {
            organization_id: row.organization_id,
            plan_id: row.plan_id,
            status,
            is_lifetime: row.is_lifetime,
            trial_expires_at: row.trial_expires_at,
            current_period_ends_at: row.current_period_ends_at,
            expired_at: row.expired_at,
            external_id: row.external_id,
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str = "organization_id, plan_id, status, is_lifetime, \
     trial_expires_at, current_period_ends_at, expired_at, external_id";

#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn find_by_organization(&self, org: Uuid) -> anyhow::Result<Option<SubscriptionRecord>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE organization_id = $1"
        ))
        .bind(org)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn mark_expired(&self, org: Uuid, expired_at: DateTime<Utc>) -> anyhow::Result<()> {
        // Guarded update keeps concurrent lazy writers idempotent.
        sqlx::query(
            "UPDATE subscriptions
             SET status = 'expired', expired_at = $2
             WHERE organization_id = $1 AND status <> 'expired'",
        )
        .bind(org)
        .bind(expired_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_lifetime(
        &self,
        org: Uuid,
        is_lifetime: bool,
        status: SubscriptionStatus,
    ) -> anyhow::Result<SubscriptionRecord> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "INSERT INTO subscriptions (organization_id, status, is_lifetime)
             VALUES ($1, $2, $3)
             ON CONFLICT (organization_id)
             DO UPDATE SET status = EXCLUDED.status, is_lifetime = EXCLUDED.is_lifetime
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(org)
        .bind(status.as_str())
        .bind(is_lifetime)
        .fetch_one(&self.pool)
        .await?;

        SubscriptionRecord::try_from(row)
    }

    async fn set_status(
        &self,
        org: Uuid,
        status: SubscriptionStatus,
        current_period_ends_at: Option<DateTime<Utc>>,
        trial_expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "UPDATE subscriptions
             SET status = $2,
                 current_period_ends_at = COALESCE($3, current_period_ends_at),
                 trial_expires_at = COALESCE($4, trial_expires_at),
                 expired_at = NULL
             WHERE organization_id = $1
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(org)
        .bind(status.as_str())
        .bind(current_period_ends_at)
        .bind(trial_expires_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn create_trial(
        &self,
        org: Uuid,
        trial_expires_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "INSERT INTO subscriptions
                 (organization_id, status, is_lifetime, trial_expires_at, current_period_ends_at)
             VALUES ($1, 'trialing', FALSE, $2, $2)
             ON CONFLICT (organization_id) DO NOTHING
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(org)
        .bind(trial_expires_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SubscriptionRecord::try_from).transpose()
    }
}

/// Map-backed store for tests and local development.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    records: RwLock<HashMap<Uuid, SubscriptionRecord>>,
    unavailable: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SubscriptionRecord) {
        let mut guard = self.records.write().expect("rwlock poisoned");
        guard.insert(record.organization_id, record);
    }

    pub fn get(&self, org: Uuid) -> Option<SubscriptionRecord> {
        let guard = self.records.read().expect("rwlock poisoned");
        guard.get(&org).cloned()
    }

    /// Make every read fail, simulating an unreachable billing store.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail writes while leaving reads intact.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_by_organization(&self, org: Uuid) -> anyhow::Result<Option<SubscriptionRecord>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("subscription store offline"));
        }
        Ok(self.get(org))
    }

    async fn mark_expired(&self, org: Uuid, expired_at: DateTime<Utc>) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) || self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("subscription store offline"));
        }
        let mut guard = self.records.write().expect("rwlock poisoned");
        if let Some(record) = guard.get_mut(&org) {
            if record.status != SubscriptionStatus::Expired {
                record.status = SubscriptionStatus::Expired;
                record.expired_at = Some(expired_at);
            }
        }
        Ok(())
    }

    async fn upsert_lifetime(
        &self,
        org: Uuid,
        is_lifetime: bool,
        status: SubscriptionStatus,
    ) -> anyhow::Result<SubscriptionRecord> {
        let mut guard = self.records.write().expect("rwlock poisoned");
        let record = guard
            .entry(org)
            .or_insert_with(|| SubscriptionRecord {
                organization_id: org,
                plan_id: None,
                status,
                is_lifetime,
                trial_expires_at: None,
                current_period_ends_at: None,
                expired_at: None,
                external_id: None,
            });
        record.status = status;
        record.is_lifetime = is_lifetime;
        Ok(record.clone())
    }

    async fn set_status(
        &self,
        org: Uuid,
        status: SubscriptionStatus,
        current_period_ends_at: Option<DateTime<Utc>>,
        trial_expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let mut guard = self.records.write().expect("rwlock poisoned");
        Ok(guard.get_mut(&org).map(|record| {
            record.status = status;
            if let Some(ends_at) = current_period_ends_at {
                record.current_period_ends_at = Some(ends_at);
            }
            if let Some(trial) = trial_expires_at {
                record.trial_expires_at = Some(trial);
            }
            record.expired_at = None;
            record.clone()
        }))
    }

    async fn create_trial(
        &self,
        org: Uuid,
        trial_expires_at: DateTime<Utc>,
    ) -> anyhow::Result<Option<SubscriptionRecord>> {
        let mut guard = self.records.write().expect("rwlock poisoned");
        if guard.contains_key(&org) {
            return Ok(None);
        }
        let record = SubscriptionRecord {
            organization_id: org,
            plan_id: None,
            status: SubscriptionStatus::Trialing,
            is_lifetime: false,
            trial_expires_at: Some(trial_expires_at),
            current_period_ends_at: Some(trial_expires_at),
            expired_at: None,
            external_id: None,
        };
        guard.insert(org, record.clone());
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(org: Uuid, status: SubscriptionStatus) -> SubscriptionRecord {
        SubscriptionRecord {
            organization_id: org,
            plan_id: None,
            status,
            is_lifetime: false,
            trial_expires_at: None,
            current_period_ends_at: None,
            expired_at: None,
            external_id: None,
        }
    }

    fn evaluator(store: Arc<InMemorySubscriptionStore>) -> SubscriptionEvaluator {
        SubscriptionEvaluator::new(store)
    }

    #[tokio::test]
    async fn no_organization_yields_no_org() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let outcome = evaluator(store).evaluate_at(None, Utc::now()).await;
        assert_eq!(outcome, SubscriptionOutcome::NoOrg);
    }

    #[tokio::test]
    async fn missing_record_degrades_to_unknown() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let outcome = evaluator(store)
            .evaluate_at(Some(Uuid::new_v4()), Utc::now())
            .await;
        assert_eq!(outcome, SubscriptionOutcome::NoSubscriptionData);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_unknown() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        store.insert(record(org, SubscriptionStatus::Active));
        store.set_unavailable(true);

        let outcome = evaluator(store).evaluate_at(Some(org), Utc::now()).await;
        assert_eq!(outcome, SubscriptionOutcome::NoSubscriptionData);
    }

    #[tokio::test]
    async fn active_within_period_is_entitled() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();
        let mut rec = record(org, SubscriptionStatus::Active);
        rec.current_period_ends_at = Some(now + Duration::days(1));
        store.insert(rec);

        let outcome = evaluator(store).evaluate_at(Some(org), now).await;
        assert_eq!(outcome, SubscriptionOutcome::Entitled);
    }

    #[tokio::test]
    async fn trial_past_deadline_expires_and_persists() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();
        let mut rec = record(org, SubscriptionStatus::Trialing);
        rec.trial_expires_at = Some(now - Duration::days(1));
        store.insert(rec);

        let outcome = evaluator(store.clone()).evaluate_at(Some(org), now).await;
        assert_eq!(outcome, SubscriptionOutcome::Expired);

        let stored = store.get(org).expect("record exists");
        assert_eq!(stored.status, SubscriptionStatus::Expired);
        assert_eq!(stored.expired_at, Some(now));
    }

    #[tokio::test]
    async fn lazy_expiry_is_idempotent() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();
        let mut rec = record(org, SubscriptionStatus::Active);
        rec.current_period_ends_at = Some(now - Duration::hours(2));
        store.insert(rec);

        let eval = evaluator(store.clone());
        let first = eval.evaluate_at(Some(org), now).await;
        let first_stamp = store.get(org).unwrap().expired_at;
        let second = eval.evaluate_at(Some(org), now + Duration::minutes(5)).await;

        assert_eq!(first, SubscriptionOutcome::Expired);
        assert_eq!(second, SubscriptionOutcome::Expired);
        // Second pass is a no-op: the stamp from the first transition stays.
        assert_eq!(store.get(org).unwrap().expired_at, first_stamp);
    }

    #[tokio::test]
    async fn expiry_is_monotonic_until_readmission() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();
        let mut rec = record(org, SubscriptionStatus::Trialing);
        rec.trial_expires_at = Some(now - Duration::days(1));
        store.insert(rec);

        let eval = evaluator(store.clone());
        assert_eq!(eval.evaluate_at(Some(org), now).await, SubscriptionOutcome::Expired);
        assert_eq!(
            eval.evaluate_at(Some(org), now + Duration::days(30)).await,
            SubscriptionOutcome::Expired
        );

        // Administrative re-activation is the only way back.
        store
            .set_status(
                org,
                SubscriptionStatus::Active,
                Some(now + Duration::days(60)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            eval.evaluate_at(Some(org), now + Duration::days(31)).await,
            SubscriptionOutcome::Entitled
        );
    }

    #[tokio::test]
    async fn lifetime_overrides_every_status_and_deadline() {
        let statuses = [
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Active,
            SubscriptionStatus::Inactive,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Expired,
        ];
        let now = Utc::now();
        for status in statuses {
            let store = Arc::new(InMemorySubscriptionStore::new());
            let org = Uuid::new_v4();
            let mut rec = record(org, status);
            rec.is_lifetime = true;
            rec.trial_expires_at = Some(now - Duration::days(400));
            rec.current_period_ends_at = Some(now - Duration::days(400));
            store.insert(rec);

            let outcome = evaluator(store).evaluate_at(Some(org), now).await;
            assert_eq!(outcome, SubscriptionOutcome::Entitled, "status {status:?}");
        }
    }

    #[tokio::test]
    async fn canceled_and_inactive_are_not_entitled() {
        let now = Utc::now();
        for status in [SubscriptionStatus::Canceled, SubscriptionStatus::Inactive] {
            let store = Arc::new(InMemorySubscriptionStore::new());
            let org = Uuid::new_v4();
            store.insert(record(org, status));
            let outcome = evaluator(store).evaluate_at(Some(org), now).await;
            assert_eq!(outcome, SubscriptionOutcome::NotEntitled(status));
        }
    }

    #[tokio::test]
    async fn past_due_expires_without_a_write() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();
        let mut rec = record(org, SubscriptionStatus::PastDue);
        rec.current_period_ends_at = Some(now - Duration::days(3));
        store.insert(rec);

        let outcome = evaluator(store.clone()).evaluate_at(Some(org), now).await;
        assert_eq!(outcome, SubscriptionOutcome::Expired);
        // Only active/trialing records are rewritten by the lazy transition.
        assert_eq!(store.get(org).unwrap().status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn past_due_within_period_keeps_grace() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();
        let mut rec = record(org, SubscriptionStatus::PastDue);
        rec.current_period_ends_at = Some(now + Duration::days(2));
        store.insert(rec);

        let outcome = evaluator(store).evaluate_at(Some(org), now).await;
        assert_eq!(outcome, SubscriptionOutcome::Entitled);
    }

    #[tokio::test]
    async fn failed_expiry_write_still_returns_expired() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        let now = Utc::now();
        let mut rec = record(org, SubscriptionStatus::Active);
        rec.current_period_ends_at = Some(now - Duration::hours(1));
        store.insert(rec);
        store.set_fail_writes(true);

        let outcome = evaluator(store.clone()).evaluate_at(Some(org), now).await;
        assert_eq!(outcome, SubscriptionOutcome::Expired);
        // The write failed; the stored record is unchanged.
        assert_eq!(store.get(org).unwrap().status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn active_without_deadline_is_entitled() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let org = Uuid::new_v4();
        store.insert(record(org, SubscriptionStatus::Active));
        let outcome = evaluator(store).evaluate_at(Some(org), Utc::now()).await;
        assert_eq!(outcome, SubscriptionOutcome::Entitled);
    }

    #[test]
    fn cadence_period_ends() {
        let now = Utc::now();
        assert_eq!(BillingCadence::Daily.period_end_from(now), now + Duration::days(1));
        assert_eq!(BillingCadence::Weekly.period_end_from(now), now + Duration::weeks(1));
        assert!(BillingCadence::Monthly.period_end_from(now) > now + Duration::days(27));
        assert!(BillingCadence::Yearly.period_end_from(now) > now + Duration::days(364));
    }
}
