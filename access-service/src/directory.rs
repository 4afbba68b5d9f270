use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;
use common_auth::{Claims, Role};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Pending,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Pending => "pending",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "pending" => Ok(AccountStatus::Pending),
            other => Err(format!("unknown account status '{other}'")),
        }
    }
}

/// Live user record from the directory. Authoritative over anything embedded
/// in a token: role and status can change after issuance.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub role: Role,
    pub status: AccountStatus,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("user account is not active ({})", .0.as_str())]
    AccountInactive(AccountStatus),
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns `Ok(None)` when no record exists for the id; `Err` only for
    /// directory failures.
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>>;
}

/// Resolves the claim's subject against the directory. Tokens for deleted
/// accounts stay valid until expiry, so a miss here is a normal outcome, not
/// a directory failure.
pub async fn resolve(
    directory: &dyn UserDirectory,
    claims: &Claims,
) -> Result<UserRecord, IdentityError> {
    let record = directory
        .find_user_by_id(claims.subject)
        .await
        .map_err(|err| {
            warn!(subject = %claims.subject, error = %err, "user directory lookup failed");
            IdentityError::Unavailable(err.to_string())
        })?
        .ok_or(IdentityError::UserNotFound(claims.subject))?;

    if record.status != AccountStatus::Active {
        return Err(IdentityError::AccountInactive(record.status));
    }

    Ok(record)
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    role: String,
    status: String,
    organization_id: Option<Uuid>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role)?;
        let status = AccountStatus::from_str(&row.status).map_err(|err| anyhow!(err))?;
        Ok(UserRecord {
            id: row.id,
            role,
            status,
            organization_id: row.organization_id,
        })
    }
}

#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, role, status, organization_id FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }
}

/// Map-backed directory for tests and local development.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: UserRecord) {
        let mut guard = self.users.write().expect("rwlock poisoned");
        guard.insert(record.id, record);
    }

    /// Make every lookup fail, simulating an unreachable directory.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("directory offline"));
        }
        let guard = self.users.read().expect("rwlock poisoned");
        Ok(guard.get(&id).cloned())
    }
}
