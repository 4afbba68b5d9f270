use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::Utc;
use common_auth::Claims;

/// TTL- and size-bounded cache of verified claims, keyed by the raw bearer
/// string. Owned by the application state and injected into the gate, never
/// held as process-global state.
///
/// A hit is only served while the token's own `exp` is in the future, so a
/// cache entry can never outlive the credential it was built from.
pub struct ClaimsCache {
    inner: RwLock<HashMap<String, CachedClaims>>,
    ttl: Duration,
    max_entries: usize,
}

struct CachedClaims {
    claims: Claims,
    cached_at: Instant,
}

impl ClaimsCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    pub fn get(&self, token: &str) -> Option<Claims> {
        let now = Instant::now();
        {
            let guard = self.inner.read().expect("rwlock poisoned");
            match guard.get(token) {
                Some(entry)
                    if now.duration_since(entry.cached_at) < self.ttl
                        && entry.claims.expires_at > Utc::now() =>
                {
                    return Some(entry.claims.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Stale entry: drop it under the write lock.
        let mut guard = self.inner.write().expect("rwlock poisoned");
        guard.remove(token);
        None
    }

    pub fn insert(&self, token: impl Into<String>, claims: Claims) {
        let mut guard = self.inner.write().expect("rwlock poisoned");
        if guard.len() >= self.max_entries {
            // Evict the oldest entry to stay bounded under token churn.
            if let Some(oldest) = guard
                .iter()
                .min_by_key(|(_, entry)| entry.cached_at)
                .map(|(key, _)| key.clone())
            {
                guard.remove(&oldest);
            }
        }
        guard.insert(
            token.into(),
            CachedClaims {
                claims,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("rwlock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
