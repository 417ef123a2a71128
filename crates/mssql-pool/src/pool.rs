//! Connection pool implementation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mssql_client::{Client, Config as ClientConfig};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::ConnectionMetadata;

/// A connection pool for SQL Server.
///
/// The pool manages a set of database connections, providing automatic
/// connection reuse, health checking, and lifecycle management. Capacity is
/// bounded by a semaphore sized to `max_connections`: a permit is held by
/// every connection the pool owns, whether idle or checked out, so the
/// total number of live connections (not just the in-use count) never
/// exceeds the configured maximum.
pub struct Pool {
    config: PoolConfig,
    inner: Arc<PoolInner>,
}

struct PoolInner {
    conn_config: ClientConfig,
    pool_config: PoolConfig,
    closed: Mutex<bool>,
    idle: Mutex<VecDeque<IdleConnection>>,
    semaphore: Arc<Semaphore>,
    next_id: AtomicU64,
    metrics: PoolMetricsInner,
}

#[derive(Default)]
struct PoolMetricsInner {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    checkouts_successful: AtomicU64,
    checkouts_failed: AtomicU64,
    health_checks_performed: AtomicU64,
    health_checks_failed: AtomicU64,
    resets_performed: AtomicU64,
    resets_failed: AtomicU64,
}

impl PoolInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

struct IdleConnection {
    client: Client<mssql_client::state::Ready>,
    metadata: ConnectionMetadata,
    permit: OwnedSemaphorePermit,
}

impl Pool {
    /// Open a new pool against `conn_config`, pre-filling it with
    /// `pool_config.min_connections` eagerly-established connections.
    pub async fn new(pool_config: PoolConfig, conn_config: ClientConfig) -> Result<Self, PoolError> {
        pool_config.validate()?;

        let inner = Arc::new(PoolInner {
            conn_config,
            pool_config: pool_config.clone(),
            closed: Mutex::new(false),
            idle: Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(pool_config.max_connections as usize)),
            next_id: AtomicU64::new(1),
            metrics: PoolMetricsInner::default(),
        });

        let pool = Self {
            config: pool_config,
            inner,
        };
        pool.prefill().await?;
        Self::spawn_cleanup_task(pool.inner.clone());
        Ok(pool)
    }

    /// Start building a pool with a fluent configuration API.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Periodically sweeps the idle queue, closing connections that have
    /// exceeded `idle_timeout` or `max_lifetime`. Exits on its own once the
    /// pool is closed.
    fn spawn_cleanup_task(inner: Arc<PoolInner>) {
        let interval = inner.pool_config.health_check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately

            loop {
                ticker.tick().await;
                if *inner.closed.lock() {
                    break;
                }

                let expired: Vec<IdleConnection> = {
                    let mut idle = inner.idle.lock();
                    let mut keep = VecDeque::with_capacity(idle.len());
                    let mut expired = Vec::new();
                    for conn in idle.drain(..) {
                        if conn.metadata.is_expired(inner.pool_config.max_lifetime)
                            || conn.metadata.is_idle_expired(inner.pool_config.idle_timeout)
                        {
                            expired.push(conn);
                        } else {
                            keep.push_back(conn);
                        }
                    }
                    *idle = keep;
                    expired
                };

                for conn in expired {
                    tracing::debug!(
                        id = conn.metadata.id,
                        "background cleanup closing expired idle connection"
                    );
                    let _ = conn.client.close().await;
                    inner.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
                    drop(conn.permit);
                }
            }
            tracing::trace!("pool cleanup task exiting");
        });
    }

    async fn prefill(&self) -> Result<(), PoolError> {
        for _ in 0..self.config.min_connections {
            let permit = self
                .inner
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("pool semaphore is never closed while the pool is alive");
            let client = Self::create_client(&self.inner).await?;
            let metadata = ConnectionMetadata::new(self.inner.next_id());
            self.inner.idle.lock().push_back(IdleConnection {
                client,
                metadata,
                permit,
            });
        }
        Ok(())
    }

    async fn create_client(inner: &PoolInner) -> Result<Client<mssql_client::state::Ready>, PoolError> {
        let timeout = inner.pool_config.connection_timeout;
        let client = tokio::time::timeout(timeout, Client::connect(inner.conn_config.clone()))
            .await
            .map_err(|_| PoolError::Timeout)?
            .map_err(|e| PoolError::ConnectionCreation(e.to_string()))?;
        inner.metrics.connections_created.fetch_add(1, Ordering::Relaxed);
        Ok(client)
    }

    async fn run_health_check(
        inner: &PoolInner,
        client: &mut Client<mssql_client::state::Ready>,
        query: &str,
    ) -> Result<(), PoolError> {
        inner.metrics.health_checks_performed.fetch_add(1, Ordering::Relaxed);
        let result = client
            .execute(query, &[])
            .await
            .map(|_| ())
            .map_err(|e| PoolError::UnhealthyConnection(e.to_string()));
        if result.is_err() {
            inner.metrics.health_checks_failed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Get a connection from the pool.
    ///
    /// This will either return an existing idle connection or create a new one
    /// if the pool is not at capacity. If all connections are in use and the
    /// pool is at capacity, this will wait until a connection becomes available
    /// or `connection_timeout` elapses.
    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        match self.get_inner().await {
            Ok(conn) => {
                self.inner.metrics.checkouts_successful.fetch_add(1, Ordering::Relaxed);
                Ok(conn)
            }
            Err(e) => {
                self.inner.metrics.checkouts_failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    async fn get_inner(&self) -> Result<PooledConnection, PoolError> {
        if *self.inner.closed.lock() {
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!("acquiring connection from pool");

        loop {
            let popped = self.inner.idle.lock().pop_front();
            if let Some(mut idle) = popped {
                if idle.metadata.is_expired(self.config.max_lifetime)
                    || idle.metadata.is_idle_expired(self.config.idle_timeout)
                {
                    tracing::debug!(id = idle.metadata.id, "discarding expired pooled connection");
                    let _ = idle.client.close().await;
                    self.inner.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
                    drop(idle.permit);
                    continue;
                }

                if self.config.test_on_checkout {
                    if let Err(e) = Self::run_health_check(
                        &self.inner,
                        &mut idle.client,
                        &self.config.health_check_query,
                    )
                    .await
                    {
                        tracing::debug!(
                            id = idle.metadata.id,
                            error = %e,
                            "discarding unhealthy pooled connection"
                        );
                        let _ = idle.client.close().await;
                        self.inner.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
                        drop(idle.permit);
                        continue;
                    }
                    idle.metadata.mark_health_check();
                }

                idle.metadata.mark_checkout();
                return Ok(PooledConnection::new(
                    self.inner.clone(),
                    idle.permit,
                    idle.client,
                    idle.metadata,
                ));
            }

            let permit = tokio::time::timeout(
                self.config.connection_timeout,
                self.inner.semaphore.clone().acquire_owned(),
            )
            .await
            .map_err(|_| PoolError::Timeout)?
            .expect("pool semaphore is never closed while the pool is alive");

            let client = Self::create_client(&self.inner).await?;
            let metadata = ConnectionMetadata::new(self.inner.next_id());
            return Ok(PooledConnection::new(self.inner.clone(), permit, client, metadata));
        }
    }

    /// Try to get an idle connection without waiting or creating a new one.
    ///
    /// Returns `Ok(None)` if the pool has no idle connections right now —
    /// callers that are fine waiting, or that want the pool to grow up to
    /// `max_connections`, should use [`Pool::get`] instead.
    pub fn try_get(&self) -> Result<Option<PooledConnection>, PoolError> {
        if *self.inner.closed.lock() {
            return Err(PoolError::PoolClosed);
        }

        loop {
            let popped = self.inner.idle.lock().pop_front();
            let Some(mut idle) = popped else {
                return Ok(None);
            };

            if idle.metadata.is_expired(self.config.max_lifetime)
                || idle.metadata.is_idle_expired(self.config.idle_timeout)
            {
                tracing::debug!(id = idle.metadata.id, "discarding expired pooled connection");
                self.inner.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
                drop(idle.permit);
                continue;
            }

            idle.metadata.mark_checkout();
            self.inner.metrics.checkouts_successful.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(PooledConnection::new(
                self.inner.clone(),
                idle.permit,
                idle.client,
                idle.metadata,
            )));
        }
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let available = self.inner.idle.lock().len() as u32;
        let free_permits = self.inner.semaphore.available_permits() as u32;
        let total = self.config.max_connections.saturating_sub(free_permits);
        PoolStatus {
            available,
            in_use: total.saturating_sub(available),
            total,
            max: self.config.max_connections,
        }
    }

    /// Get a snapshot of pool lifecycle metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let m = &self.inner.metrics;
        PoolMetrics {
            connections_created: m.connections_created.load(Ordering::Relaxed),
            connections_closed: m.connections_closed.load(Ordering::Relaxed),
            checkouts_successful: m.checkouts_successful.load(Ordering::Relaxed),
            checkouts_failed: m.checkouts_failed.load(Ordering::Relaxed),
            health_checks_performed: m.health_checks_performed.load(Ordering::Relaxed),
            health_checks_failed: m.health_checks_failed.load(Ordering::Relaxed),
            resets_performed: m.resets_performed.load(Ordering::Relaxed),
            resets_failed: m.resets_failed.load(Ordering::Relaxed),
        }
    }

    /// Close the pool, dropping all idle connections. Connections currently
    /// checked out are closed as they are returned.
    pub async fn close(&self) {
        *self.inner.closed.lock() = true;
        let drained: Vec<_> = std::mem::take(&mut *self.inner.idle.lock()).into_iter().collect();
        for conn in drained {
            let _ = conn.client.close().await;
            self.inner.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
            drop(conn.permit);
        }
        tracing::info!("connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.lock()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

/// Fluent builder for [`Pool`].
pub struct PoolBuilder {
    pool_config: PoolConfig,
    client_config: Option<ClientConfig>,
}

impl PoolBuilder {
    fn new() -> Self {
        Self {
            // Builder-constructed pools don't pre-warm connections unless the
            // caller explicitly asks for them, unlike `PoolConfig::default()`
            // (which assumes at least one connection is always wanted).
            pool_config: PoolConfig::new().min_connections(0),
            client_config: None,
        }
    }

    /// Set the connection config used to establish new connections.
    #[must_use]
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Set the minimum number of connections to pre-warm.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.pool_config = self.pool_config.min_connections(count);
        self
    }

    /// Set the maximum number of connections allowed.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.pool_config = self.pool_config.max_connections(count);
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config = self.pool_config.connection_timeout(timeout);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config = self.pool_config.idle_timeout(timeout);
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.pool_config = self.pool_config.max_lifetime(lifetime);
        self
    }

    /// Enable or disable testing connections on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.pool_config = self.pool_config.test_on_checkout(enabled);
        self
    }

    /// Enable or disable `sp_reset_connection` on return.
    #[must_use]
    pub fn sp_reset_connection(mut self, enabled: bool) -> Self {
        self.pool_config = self.pool_config.sp_reset_connection(enabled);
        self
    }

    /// Build the pool, pre-warming `min_connections` eagerly.
    pub async fn build(self) -> Result<Pool, PoolError> {
        let conn_config = self
            .client_config
            .ok_or_else(|| PoolError::Configuration("client_config is required".into()))?;
        Pool::new(self.pool_config, conn_config).await
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of connections (idle + in use).
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Percentage of `max` connections currently in use, in `[0.0, 100.0]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            (f64::from(self.in_use) / f64::from(self.max)) * 100.0
        }
    }
}

/// Point-in-time snapshot of pool lifecycle counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMetrics {
    /// Total connections established since the pool was created.
    pub connections_created: u64,
    /// Total connections closed (expired, unhealthy, or on pool close).
    pub connections_closed: u64,
    /// Successful `get`/`try_get` calls.
    pub checkouts_successful: u64,
    /// Failed `get`/`try_get` calls.
    pub checkouts_failed: u64,
    /// Health checks executed (checkout and checkin combined).
    pub health_checks_performed: u64,
    /// Health checks that failed.
    pub health_checks_failed: u64,
    /// `sp_reset_connection` calls executed on checkin.
    pub resets_performed: u64,
    /// `sp_reset_connection` calls that failed on checkin.
    pub resets_failed: u64,
}

impl PoolMetrics {
    /// Fraction of checkouts that succeeded, in `[0.0, 1.0]`.
    ///
    /// Returns `1.0` when no checkouts have been attempted yet.
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            1.0
        } else {
            self.checkouts_successful as f64 / total as f64
        }
    }
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is returned to the pool (after
/// `sp_reset_connection`, if configured) rather than closed.
pub struct PooledConnection {
    inner: Option<PooledConnectionInner>,
}

struct PooledConnectionInner {
    pool: Arc<PoolInner>,
    permit: OwnedSemaphorePermit,
    client: Client<mssql_client::state::Ready>,
    metadata: ConnectionMetadata,
}

impl PooledConnection {
    fn new(
        pool: Arc<PoolInner>,
        permit: OwnedSemaphorePermit,
        client: Client<mssql_client::state::Ready>,
        metadata: ConnectionMetadata,
    ) -> Self {
        Self {
            inner: Some(PooledConnectionInner {
                pool,
                permit,
                client,
                metadata,
            }),
        }
    }

    /// Metadata about this checked-out connection (id, age, checkout count).
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.inner.as_ref().expect("connection already detached").metadata
    }

    /// Detach the connection from the pool, returning the underlying client.
    ///
    /// The connection will not be returned to the pool when dropped, and the
    /// slot it occupied is freed immediately for another connection.
    pub fn detach(mut self) -> Result<Client<mssql_client::state::Ready>, PoolError> {
        let inner = self.inner.take().expect("connection already detached");
        drop(inner.permit);
        Ok(inner.client)
    }
}

impl std::borrow::Borrow<Client<mssql_client::state::Ready>> for PooledConnection {
    fn borrow(&self) -> &Client<mssql_client::state::Ready> {
        &self.inner.as_ref().expect("connection already detached").client
    }
}

impl std::borrow::BorrowMut<Client<mssql_client::state::Ready>> for PooledConnection {
    fn borrow_mut(&mut self) -> &mut Client<mssql_client::state::Ready> {
        &mut self.inner.as_mut().expect("connection already detached").client
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = Client<mssql_client::state::Ready>;

    fn deref(&self) -> &Self::Target {
        &self
            .inner
            .as_ref()
            .expect("connection already detached")
            .client
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self
            .inner
            .as_mut()
            .expect("connection already detached")
            .client
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(PooledConnectionInner {
            pool,
            permit,
            client,
            mut metadata,
        }) = self.inner.take()
        else {
            return;
        };

        metadata.mark_checkin();

        if *pool.closed.lock() {
            tracing::trace!(id = metadata.id, "pool closed, dropping connection on return");
            return;
        }

        tracing::trace!(id = metadata.id, "returning connection to pool");

        // sp_reset_connection (and, optionally, the checkin health check) are
        // network round-trips and Drop can't await, so the actual return to
        // the idle queue happens on a spawned task. The semaphore permit
        // travels with the task and is only released if the connection turns
        // out to be unusable, keeping the pool's capacity accounting correct
        // for the whole time the connection is mid-reset.
        tokio::spawn(async move {
            let sp_reset = pool.pool_config.sp_reset_connection;
            let test_on_checkin = pool.pool_config.test_on_checkin;
            let health_check_query = pool.pool_config.health_check_query.clone();

            let mut client = client;

            if sp_reset {
                match client.execute("EXEC sp_reset_connection", &[]).await {
                    Ok(_) => {
                        pool.metrics.resets_performed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        pool.metrics.resets_failed.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            id = metadata.id,
                            error = %e,
                            "sp_reset_connection failed, dropping connection"
                        );
                        pool.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                }
            }

            if test_on_checkin {
                if let Err(e) = Pool::run_health_check(&pool, &mut client, &health_check_query).await {
                    tracing::debug!(
                        id = metadata.id,
                        error = %e,
                        "checkin health check failed, dropping connection"
                    );
                    pool.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                metadata.mark_health_check();
            }

            pool.idle.lock().push_back(IdleConnection {
                client,
                metadata,
                permit,
            });
        });
    }
}
