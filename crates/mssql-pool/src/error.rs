//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to acquire a connection within `connection_timeout`.
    #[error("timed out waiting for a connection")]
    Timeout,

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Connection creation failed.
    #[error("failed to create connection: {0}")]
    ConnectionCreation(String),

    /// Connection is unhealthy.
    #[error("connection health check failed: {0}")]
    UnhealthyConnection(String),

    /// Connection reset failed.
    #[error("connection reset failed: {0}")]
    ResetFailed(String),

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// Maximum connections reached.
    #[error("maximum connections ({max}) reached")]
    MaxConnectionsReached {
        /// Maximum allowed connections.
        max: u32,
    },

    /// Connection validation failed.
    #[error("connection validation failed: {0}")]
    ValidationFailed(String),

    /// No pool is registered for the requested context name.
    #[error("no pool registered for context '{0}'")]
    UnknownContext(String),

    /// Tried to commit/rollback a context with no transaction pinned to it.
    #[error("no active transaction for context '{0}'")]
    NoActiveTransaction(String),

    /// The underlying client call failed.
    #[error("client error: {0}")]
    Client(#[from] mssql_client::Error),
}
