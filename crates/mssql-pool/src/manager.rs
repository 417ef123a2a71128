//! Process-wide pool registry, keyed by catalog/context name.
//!
//! Mirrors the one-pool-per-named-context model a host engine wants when it
//! attaches to several catalogs that may each point at a different server:
//! each context gets its own [`Pool`], looked up by name instead of threaded
//! through the caller explicitly.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use mssql_client::Config as ClientConfig;
use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::pool::{Pool, PoolMetrics, PoolStatus};

type Registry = Mutex<HashMap<String, Arc<Pool>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A process-wide `context name -> pool` registry.
///
/// This is a namespace of associated functions, not a type to instantiate —
/// the registry itself lives in a process-wide static.
pub struct PoolManager;

impl PoolManager {
    /// Return the pool registered for `context`, creating one with
    /// `pool_config`/`conn_config` if none exists yet.
    ///
    /// Creating a pool is a no-op if one is already registered for `context`:
    /// the passed-in configs are ignored and the existing pool is returned.
    /// Two concurrent calls racing on a not-yet-registered name may each
    /// build a `Pool` before the registry lock is taken; the loser's pool is
    /// simply dropped, which is harmless since nothing has been checked out
    /// of it yet.
    pub async fn get_or_create(
        context: impl Into<String>,
        pool_config: PoolConfig,
        conn_config: ClientConfig,
    ) -> Result<Arc<Pool>, PoolError> {
        let context = context.into();
        if let Some(existing) = registry().lock().get(&context) {
            return Ok(existing.clone());
        }

        let candidate = Arc::new(Pool::new(pool_config, conn_config).await?);
        let mut guard = registry().lock();
        let pool = guard.entry(context).or_insert(candidate).clone();
        Ok(pool)
    }

    /// Look up an already-registered pool by context name.
    #[must_use]
    pub fn get(context: &str) -> Option<Arc<Pool>> {
        registry().lock().get(context).cloned()
    }

    /// Shut down and remove the pool registered for `context`, if any.
    ///
    /// Idempotent: removing a name that isn't registered is a no-op.
    pub async fn remove(context: &str) {
        let pool = registry().lock().remove(context);
        if let Some(pool) = pool {
            pool.close().await;
        }
    }

    /// Stats for one registered context, if it exists.
    #[must_use]
    pub fn stats(context: &str) -> Option<PoolStats> {
        registry().lock().get(context).map(|pool| PoolStats {
            context: context.to_string(),
            status: pool.status(),
            metrics: pool.metrics(),
        })
    }

    /// Stats for every currently registered context.
    #[must_use]
    pub fn all_stats() -> Vec<PoolStats> {
        registry()
            .lock()
            .iter()
            .map(|(name, pool)| PoolStats {
                context: name.clone(),
                status: pool.status(),
                metrics: pool.metrics(),
            })
            .collect()
    }

    /// Number of contexts currently registered.
    #[must_use]
    pub fn len() -> usize {
        registry().lock().len()
    }

    /// Whether no contexts are currently registered.
    #[must_use]
    pub fn is_empty() -> bool {
        registry().lock().is_empty()
    }
}

/// Diagnostic snapshot of one registered pool, keyed by its context name.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// The context name this pool is registered under.
    pub context: String,
    /// Connection counts (idle/in-use/total/max).
    pub status: PoolStatus,
    /// Lifecycle counters (created/closed/checkouts/health checks/resets).
    pub metrics: PoolMetrics,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // `get_or_create`/`remove` require a live SQL Server to construct a real
    // `Pool`, so they're exercised in `tests/integration.rs`. The lookup-only
    // paths below don't need a server.

    #[test]
    fn test_get_unregistered_context_is_none() {
        assert!(PoolManager::get("mssql-pool-manager-test-context-that-does-not-exist").is_none());
    }

    #[test]
    fn test_stats_unregistered_context_is_none() {
        assert!(PoolManager::stats("mssql-pool-manager-test-context-that-does-not-exist").is_none());
    }
}
