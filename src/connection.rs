//! Connection Traits and Per-Endpoint Pooling
//!
//! The crate does not ship socket or serial implementations; callers supply
//! a [`ConnectionFactory`] and the pool handles lifecycle, concurrency
//! limiting and inter-transaction spacing on top of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::endpoint::{Endpoint, EndpointPoolConfiguration};
use crate::error::{Result, TransportError};

/// A single established link to a slave endpoint.
///
/// `transact` performs one request/response exchange. Response correlation
/// (MBAP transaction ids on TCP) is the implementation's duty; a mismatch
/// surfaces as [`TransportError::UnexpectedTransactionId`].
#[async_trait]
pub trait SlaveConnection: Send {
    /// Send a request PDU to `unit_id` and await the response PDU.
    async fn transact(
        &mut self,
        unit_id: u8,
        request_pdu: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>>;

    /// Whether the link is still usable.
    fn is_connected(&self) -> bool;

    /// Release the underlying resources.
    async fn close(&mut self);
}

/// Opens connections for endpoints.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn open(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<Box<dyn SlaveConnection>>;
}

/// A connection checked out of an [`EndpointPool`]. Holding it holds one of
/// the pool's permits, so same-endpoint concurrency never exceeds
/// `max_connections`.
pub(crate) struct PooledConnection {
    connection: Box<dyn SlaveConnection>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub(crate) fn connection(&mut self) -> &mut dyn SlaveConnection {
        self.connection.as_mut()
    }
}

/// Connection pool for one endpoint.
///
/// Connections are opened lazily on first acquisition and parked in an idle
/// stash on release. A reconfiguration swaps in a whole new pool, so the
/// settings here are immutable for the pool's lifetime; the old pool is
/// retired and closes connections instead of parking them, so nothing
/// released after the swap leaks an open link.
pub(crate) struct EndpointPool {
    endpoint: Endpoint,
    config: EndpointPoolConfiguration,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Box<dyn SlaveConnection>>>,
    last_transaction: Mutex<Option<Instant>>,
    retired: AtomicBool,
}

impl EndpointPool {
    pub(crate) fn new(endpoint: Endpoint, config: EndpointPoolConfiguration) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            endpoint,
            config,
            permits,
            idle: Mutex::new(Vec::new()),
            last_transaction: Mutex::new(None),
            retired: AtomicBool::new(false),
        }
    }

    pub(crate) fn config(&self) -> &EndpointPoolConfiguration {
        &self.config
    }

    /// Check a connection out of the pool, opening a new one if no healthy
    /// idle connection exists. Blocks until a permit is free.
    pub(crate) async fn acquire(
        &self,
        factory: &dyn ConnectionFactory,
    ) -> Result<PooledConnection> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Connection(self.endpoint.clone()))?;

        if let Some(connection) = self.take_idle().await {
            return Ok(PooledConnection {
                connection,
                _permit: permit,
            });
        }

        let connection = self.open_with_retries(factory).await?;
        Ok(PooledConnection {
            connection,
            _permit: permit,
        })
    }

    async fn take_idle(&self) -> Option<Box<dyn SlaveConnection>> {
        let mut idle = self.idle.lock().await;
        while let Some(mut connection) = idle.pop() {
            if connection.is_connected() {
                return Some(connection);
            }
            connection.close().await;
        }
        None
    }

    async fn open_with_retries(
        &self,
        factory: &dyn ConnectionFactory,
    ) -> Result<Box<dyn SlaveConnection>> {
        let tries = self.config.connect_max_tries.max(1);
        let mut last_error = TransportError::Connection(self.endpoint.clone());
        for attempt in 1..=tries {
            match factory.open(&self.endpoint, self.config.connect_timeout()).await {
                Ok(connection) => {
                    debug!(endpoint = %self.endpoint, attempt, "connection established");
                    return Ok(connection);
                }
                Err(err) => {
                    warn!(endpoint = %self.endpoint, attempt, error = %err, "connect failed");
                    last_error = err;
                    if attempt < tries {
                        tokio::time::sleep(self.config.reconnect_delay()).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    /// Sleep out the remainder of the inter-transaction quiet period.
    pub(crate) async fn wait_transaction_spacing(&self) {
        let delay = self.config.inter_transaction_delay();
        if delay.is_zero() {
            return;
        }
        let last = *self.last_transaction.lock().await;
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
    }

    /// Record that a transaction just finished on this endpoint.
    pub(crate) async fn note_transaction(&self) {
        *self.last_transaction.lock().await = Some(Instant::now());
    }

    /// Return a healthy connection for reuse. Releases into a retired pool
    /// close the connection instead.
    pub(crate) async fn release(&self, pooled: PooledConnection) {
        let mut idle = self.idle.lock().await;
        if self.retired.load(Ordering::SeqCst) {
            drop(idle);
            self.invalidate(pooled).await;
            return;
        }
        idle.push(pooled.connection);
    }

    /// Discard a connection whose link can no longer be trusted.
    pub(crate) async fn invalidate(&self, mut pooled: PooledConnection) {
        debug!(endpoint = %self.endpoint, "invalidating connection");
        pooled.connection.close().await;
    }

    /// Close every idle connection. In-flight connections are unaffected.
    pub(crate) async fn clear_idle(&self) {
        let mut idle = self.idle.lock().await;
        for mut connection in idle.drain(..) {
            connection.close().await;
        }
    }

    /// Take the pool out of service: close idle connections and make later
    /// releases close theirs too. The flag flips under the idle lock, so a
    /// concurrent release either parks before the drain or sees the pool
    /// retired.
    pub(crate) async fn retire(&self) {
        let mut idle = self.idle.lock().await;
        self.retired.store(true, Ordering::SeqCst);
        for mut connection in idle.drain(..) {
            connection.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestConnection {
        connected: bool,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SlaveConnection for TestConnection {
        async fn transact(&mut self, _: u8, pdu: &[u8], _: Duration) -> Result<Vec<u8>> {
            Ok(pdu.to_vec())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn close(&mut self) {
            self.connected = false;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TestFactory {
        opens: AtomicUsize,
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl TestFactory {
        fn new(fail: bool) -> Self {
            Self {
                opens: AtomicUsize::new(0),
                closes: Arc::new(AtomicUsize::new(0)),
                fail,
            }
        }
    }

    #[async_trait]
    impl ConnectionFactory for TestFactory {
        async fn open(&self, endpoint: &Endpoint, _: Duration) -> Result<Box<dyn SlaveConnection>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::Connection(endpoint.clone()));
            }
            Ok(Box::new(TestConnection {
                connected: true,
                closes: self.closes.clone(),
            }))
        }
    }

    fn pool() -> EndpointPool {
        let endpoint = Endpoint::tcp("localhost", 502);
        let mut config = EndpointPoolConfiguration::default_for(&endpoint);
        config.inter_transaction_delay_ms = 0;
        config.reconnect_delay_ms = 0;
        EndpointPool::new(endpoint, config)
    }

    #[tokio::test]
    async fn test_released_connection_is_reused() {
        let pool = pool();
        let factory = TestFactory::new(false);
        let first = pool.acquire(&factory).await.unwrap();
        pool.release(first).await;
        let _second = pool.acquire(&factory).await.unwrap();
        assert_eq!(factory.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidated_connection_is_not_reused() {
        let pool = pool();
        let factory = TestFactory::new(false);
        let first = pool.acquire(&factory).await.unwrap();
        pool.invalidate(first).await;
        let _second = pool.acquire(&factory).await.unwrap();
        assert_eq!(factory.opens.load(Ordering::SeqCst), 2);
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_retries_and_gives_up() {
        let endpoint = Endpoint::tcp("localhost", 502);
        let mut config = EndpointPoolConfiguration::default_for(&endpoint);
        config.connect_max_tries = 3;
        config.reconnect_delay_ms = 0;
        let pool = EndpointPool::new(endpoint.clone(), config);
        let factory = TestFactory::new(true);
        let result = pool.acquire(&factory).await;
        match result {
            Err(TransportError::Connection(failed)) => assert_eq!(failed, endpoint),
            other => panic!("expected connection error, got {:?}", other.is_ok()),
        }
        assert_eq!(factory.opens.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_release_into_retired_pool_closes_connection() {
        let pool = pool();
        let factory = TestFactory::new(false);
        let checked_out = pool.acquire(&factory).await.unwrap();
        pool.retire().await;
        pool.release(checked_out).await;
        // Closed on release, not parked for reuse
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
        let _fresh = pool.acquire(&factory).await.unwrap();
        assert_eq!(factory.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_idle_closes_connections() {
        let pool = pool();
        let factory = TestFactory::new(false);
        let first = pool.acquire(&factory).await.unwrap();
        pool.release(first).await;
        pool.clear_idle().await;
        assert_eq!(factory.closes.load(Ordering::SeqCst), 1);
    }
}
