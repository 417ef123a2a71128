//! Process-wide cache for acquired FEDAUTH tokens.
//!
//! Token acquisition (device-code prompts, CLI subprocess calls, HTTP
//! round-trips to the STS) is expensive enough that every new connection
//! re-acquiring a token would be unacceptable. Entries are keyed by
//! `secret_name[:tenant_override]` so the same named secret used against two
//! different tenants caches independently, and are treated as expired
//! `margin` before their real expiry so a token never goes stale mid-login.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A cached access token plus its expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The bearer token value.
    pub token: String,
    /// Absolute instant after which the token is considered expired.
    pub expires_at: Instant,
}

impl CachedToken {
    /// Create a cached token that expires after `ttl` from now.
    #[must_use]
    pub fn new(token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self, margin: Duration) -> bool {
        Instant::now() + margin >= self.expires_at
    }
}

fn cache_key(secret_name: &str, tenant_override: Option<&str>) -> String {
    match tenant_override {
        Some(tenant) => format!("{secret_name}:{tenant}"),
        None => secret_name.to_string(),
    }
}

/// A thread-safe, process-wide cache of acquired tokens.
///
/// The 5-minute default margin matches the window Azure STS tokens are
/// typically issued with slack for; a token within 5 minutes of expiry is
/// treated as already expired so a fresh one is acquired before it's needed.
pub struct TokenCache {
    margin: Duration,
    entries: Mutex<HashMap<String, CachedToken>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

impl TokenCache {
    /// Create a cache with a custom expiry margin.
    #[must_use]
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a cached, still-valid token for `secret_name`/`tenant_override`.
    ///
    /// Returns `None` and evicts the entry if it exists but is within the
    /// expiry margin.
    #[must_use]
    pub fn get(&self, secret_name: &str, tenant_override: Option<&str>) -> Option<CachedToken> {
        let key = cache_key(secret_name, tenant_override);
        let mut entries = self.entries.lock().expect("token cache poisoned");
        match entries.get(&key) {
            Some(cached) if !cached.is_expired(self.margin) => Some(cached.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace the cached token for `secret_name`/`tenant_override`.
    pub fn set(&self, secret_name: &str, tenant_override: Option<&str>, token: CachedToken) {
        let key = cache_key(secret_name, tenant_override);
        self.entries.lock().expect("token cache poisoned").insert(key, token);
    }

    /// Evict the cached token for `secret_name`/`tenant_override`, if any.
    pub fn invalidate(&self, secret_name: &str, tenant_override: Option<&str>) {
        let key = cache_key(secret_name, tenant_override);
        self.entries.lock().expect("token cache poisoned").remove(&key);
    }

    /// Evict every cached token.
    pub fn clear(&self) {
        self.entries.lock().expect("token cache poisoned").clear();
    }

    /// Number of entries currently cached (including any not yet evicted but
    /// within the expiry margin).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("token cache poisoned").len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_token() {
        let cache = TokenCache::default();
        cache.set("my-secret", None, CachedToken::new("abc", Duration::from_secs(3600)));
        let got = cache.get("my-secret", None).unwrap();
        assert_eq!(got.token, "abc");
    }

    #[test]
    fn tenant_override_is_a_distinct_key() {
        let cache = TokenCache::default();
        cache.set("my-secret", None, CachedToken::new("default-tenant", Duration::from_secs(3600)));
        cache.set(
            "my-secret",
            Some("other-tenant"),
            CachedToken::new("other-tenant", Duration::from_secs(3600)),
        );
        assert_eq!(cache.get("my-secret", None).unwrap().token, "default-tenant");
        assert_eq!(
            cache.get("my-secret", Some("other-tenant")).unwrap().token,
            "other-tenant"
        );
    }

    #[test]
    fn expired_within_margin_is_treated_as_missing() {
        let cache = TokenCache::new(Duration::from_secs(300));
        // Expires in 60s, well inside the 5-minute margin.
        cache.set("my-secret", None, CachedToken::new("abc", Duration::from_secs(60)));
        assert!(cache.get("my-secret", None).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = TokenCache::default();
        cache.set("my-secret", None, CachedToken::new("abc", Duration::from_secs(3600)));
        cache.invalidate("my-secret", None);
        assert!(cache.get("my-secret", None).is_none());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = TokenCache::default();
        cache.set("a", None, CachedToken::new("1", Duration::from_secs(3600)));
        cache.set("b", None, CachedToken::new("2", Duration::from_secs(3600)));
        cache.clear();
        assert!(cache.is_empty());
    }
}
