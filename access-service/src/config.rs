use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use common_auth::JwtConfig;

pub const DEFAULT_TRIAL_DAYS: i64 = 7;
const DEFAULT_TOKEN_CACHE_TTL_SECONDS: u64 = 60;
const DEFAULT_TOKEN_CACHE_MAX: usize = 10_000;

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub jwt: JwtConfig,
    /// Length of the trial period granted at organization registration.
    pub trial_days: i64,
    /// Bounds for the verified-claims cache.
    pub token_cache_ttl: Duration,
    pub token_cache_max: usize,
    pub audit_topic: String,
}

/// Reads service configuration from the environment. The signing secret is
/// required; its absence aborts startup rather than failing requests later.
pub fn load_access_config() -> Result<AccessConfig> {
    let jwt = JwtConfig::from_env().context("JWT_SECRET must be set")?;

    let trial_days = env::var("TRIAL_DAYS")
        .ok()
        .map(|value| {
            value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Invalid TRIAL_DAYS '{value}'"))
        })
        .transpose()?
        .unwrap_or(DEFAULT_TRIAL_DAYS);

    let token_cache_ttl = env::var("TOKEN_CACHE_TTL_SECONDS")
        .ok()
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid TOKEN_CACHE_TTL_SECONDS '{value}'"))
        })
        .transpose()?
        .unwrap_or(DEFAULT_TOKEN_CACHE_TTL_SECONDS);

    let token_cache_max = env::var("TOKEN_CACHE_MAX")
        .ok()
        .map(|value| {
            value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid TOKEN_CACHE_MAX '{value}'"))
        })
        .transpose()?
        .unwrap_or(DEFAULT_TOKEN_CACHE_MAX);

    let audit_topic =
        env::var("AUDIT_TOPIC").unwrap_or_else(|_| "security.access.decisions".to_string());

    Ok(AccessConfig {
        jwt,
        trial_days,
        token_cache_ttl: Duration::from_secs(token_cache_ttl),
        token_cache_max,
        audit_topic,
    })
}
