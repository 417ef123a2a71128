//! Query execution against a named, pooled context.
//!
//! `mssql-client` can't depend back on this crate (it would make the
//! dependency graph circular), so the streaming machinery it exposes —
//! [`mssql_client::stream::ResultStream`] generic over anything that
//! `BorrowMut<Client<Ready>>` — is bridged here with [`PooledConnection`]
//! filling in for the generic parameter. This is the layer a host query
//! engine actually calls: give it a context name and a statement, get a
//! result stream back, without having to juggle pools or connections
//! itself.
//!
//! Statements issued while a transaction is pinned to a context (see
//! [`QueryExecutor::begin_transaction`]) all run on the same physical
//! connection, since SQL Server transactions are connection-scoped.

use std::collections::HashMap;
use std::sync::OnceLock;

use mssql_client::{IsolationLevel, ResultStream};
use parking_lot::Mutex;

use crate::error::PoolError;
use crate::manager::PoolManager;
use crate::pool::PooledConnection;

type TransactionRegistry = Mutex<HashMap<String, PooledConnection>>;

fn transactions() -> &'static TransactionRegistry {
    static REGISTRY: OnceLock<TransactionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Runs statements against whichever pool is registered for a context name.
///
/// This is a namespace of associated functions, not a type to instantiate —
/// transaction pinning lives in a process-wide static, mirroring
/// [`PoolManager`]'s registry.
pub struct QueryExecutor;

impl QueryExecutor {
    /// Run `sql` against `client_context` and return a stream over its
    /// result set.
    ///
    /// If a transaction is currently pinned to `client_context` (via
    /// [`QueryExecutor::begin_transaction`]), `sql` runs on that same
    /// connection; otherwise a connection is acquired from the context's
    /// pool for the duration of the stream and returned to the pool once
    /// the stream is dropped.
    pub async fn execute(
        client_context: &str,
        sql: &str,
    ) -> Result<ResultStream<PooledConnection>, PoolError> {
        Self::execute_projected(client_context, sql, None).await
    }

    /// Like [`QueryExecutor::execute`], but only the named columns are kept
    /// in the returned rows.
    pub async fn execute_projected(
        client_context: &str,
        sql: &str,
        columns: Option<&[&str]>,
    ) -> Result<ResultStream<PooledConnection>, PoolError> {
        let conn = Self::acquire(client_context).await?;
        let mut stream = ResultStream::new(conn);
        stream.initialize(sql, columns).await?;
        Ok(stream)
    }

    async fn acquire(client_context: &str) -> Result<PooledConnection, PoolError> {
        if let Some(conn) = transactions().lock().remove(client_context) {
            return Ok(conn);
        }

        let pool = PoolManager::get(client_context)
            .ok_or_else(|| PoolError::UnknownContext(client_context.to_string()))?;
        pool.get().await
    }

    /// Pin a new transaction to `client_context`.
    ///
    /// Acquires a connection from the context's pool, optionally sets its
    /// isolation level, issues `BEGIN TRANSACTION`, and holds the
    /// connection out of the pool until [`QueryExecutor::commit_transaction`]
    /// or [`QueryExecutor::rollback_transaction`] releases it.
    pub async fn begin_transaction(
        client_context: &str,
        isolation: Option<IsolationLevel>,
    ) -> Result<(), PoolError> {
        let pool = PoolManager::get(client_context)
            .ok_or_else(|| PoolError::UnknownContext(client_context.to_string()))?;
        let mut conn = pool.get().await?;

        if let Some(level) = isolation {
            conn.execute(level.as_sql(), &[]).await?;
        }
        conn.execute("BEGIN TRANSACTION", &[]).await?;

        transactions().lock().insert(client_context.to_string(), conn);
        Ok(())
    }

    /// Commit the transaction pinned to `client_context` and return its
    /// connection to the pool.
    pub async fn commit_transaction(client_context: &str) -> Result<(), PoolError> {
        let mut conn = transactions()
            .lock()
            .remove(client_context)
            .ok_or_else(|| PoolError::NoActiveTransaction(client_context.to_string()))?;
        conn.execute("COMMIT TRANSACTION", &[]).await?;
        Ok(())
    }

    /// Roll back the transaction pinned to `client_context` and return its
    /// connection to the pool.
    pub async fn rollback_transaction(client_context: &str) -> Result<(), PoolError> {
        let mut conn = transactions()
            .lock()
            .remove(client_context)
            .ok_or_else(|| PoolError::NoActiveTransaction(client_context.to_string()))?;
        conn.execute("ROLLBACK TRANSACTION", &[]).await?;
        Ok(())
    }

    /// Whether a transaction is currently pinned to `client_context`.
    #[must_use]
    pub fn has_active_transaction(client_context: &str) -> bool {
        transactions().lock().contains_key(client_context)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // `execute`/`begin_transaction` require a live SQL Server to acquire a
    // real pooled connection, so they're exercised in `tests/integration.rs`.
    // The lookup-only paths below don't need a server.

    #[test]
    fn unregistered_context_has_no_active_transaction() {
        assert!(!QueryExecutor::has_active_transaction(
            "mssql-pool-executor-test-context-that-does-not-exist"
        ));
    }

    #[tokio::test]
    async fn commit_without_begin_fails() {
        let result = QueryExecutor::commit_transaction(
            "mssql-pool-executor-test-context-never-began",
        )
        .await;
        assert!(matches!(result, Err(PoolError::NoActiveTransaction(_))));
    }

    #[tokio::test]
    async fn rollback_without_begin_fails() {
        let result = QueryExecutor::rollback_transaction(
            "mssql-pool-executor-test-context-never-began-either",
        )
        .await;
        assert!(matches!(result, Err(PoolError::NoActiveTransaction(_))));
    }

    #[tokio::test]
    async fn execute_against_unknown_context_fails() {
        let result =
            QueryExecutor::execute("mssql-pool-executor-test-context-unknown", "SELECT 1").await;
        assert!(matches!(result, Err(PoolError::UnknownContext(_))));
    }
}
