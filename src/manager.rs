//! Transaction Scheduler
//!
//! [`ModbusManager`] owns the connection pools and runs every transaction on
//! tokio workers, never on the caller. One-shot reads and writes go through
//! [`ModbusManager::submit_poll`]/[`ModbusManager::submit_write`]; recurring
//! polls are registered with a period and keep firing until unregistered.
//!
//! Each execution retries up to the blueprint's `max_tries` before the
//! terminal outcome reaches the callback. Retries are silent and spaced by
//! the endpoint's inter-transaction delay. Any error except an explicit
//! slave exception invalidates the pooled connection before the next
//! attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::connection::{ConnectionFactory, EndpointPool};
use crate::endpoint::{Endpoint, EndpointPoolConfiguration};
use crate::error::{Result, TransportError};
use crate::pdu::{self, ReadOutcome, WriteResponse};
use crate::request::ReadRequest;
use crate::task::{PollTask, ReadResult, WriteResult, WriteTask};

/// Handle to a one-shot submission.
///
/// Cancellation is best-effort: it prevents an execution that has not
/// started, but never interrupts one in flight.
pub struct TaskHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to finish or be skipped.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

struct RegisteredPoll {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct ManagerInner {
    factory: Arc<dyn ConnectionFactory>,
    pools: Mutex<HashMap<Endpoint, Arc<EndpointPool>>>,
    configs: Mutex<HashMap<Endpoint, EndpointPoolConfiguration>>,
    polls: Mutex<HashMap<PollTask, RegisteredPoll>>,
}

/// The scheduler. Cheap to clone; all clones share pools and registrations.
#[derive(Clone)]
pub struct ModbusManager {
    inner: Arc<ManagerInner>,
}

impl ModbusManager {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                factory,
                pools: Mutex::new(HashMap::new()),
                configs: Mutex::new(HashMap::new()),
                polls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Execute a read once. The callback receives exactly one result unless
    /// the handle is cancelled before execution starts.
    pub fn submit_poll(&self, task: PollTask) -> TaskHandle {
        let inner = self.inner.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            if task_token.is_cancelled() {
                debug!(endpoint = %task.endpoint(), "one-shot read cancelled before execution");
                return;
            }
            let outcome = inner.execute_read(task.endpoint(), task.request()).await;
            deliver_read(&task, outcome);
        });
        TaskHandle { token, handle }
    }

    /// Execute a write once.
    pub fn submit_write(&self, task: WriteTask) -> TaskHandle {
        let inner = self.inner.clone();
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            if task_token.is_cancelled() {
                debug!(endpoint = %task.endpoint(), "write cancelled before execution");
                return;
            }
            let outcome = inner.execute_write(&task).await;
            deliver_write(&task, outcome);
        });
        TaskHandle { token, handle }
    }

    /// Register a recurring poll. The first firing happens after
    /// `initial_delay`, subsequent ones every `period`. A structurally-equal
    /// task that is already registered makes this a no-op returning `false`.
    ///
    /// A firing whose retries are exhausted reports the failure through the
    /// callback and the poll keeps running.
    pub async fn register_poll(
        &self,
        task: PollTask,
        period: Duration,
        initial_delay: Duration,
    ) -> bool {
        let mut polls = self.inner.polls.lock().await;
        if polls.contains_key(&task) {
            debug!(endpoint = %task.endpoint(), "poll already registered");
            return false;
        }

        let inner = self.inner.clone();
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let loop_task = task.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = loop_token.cancelled() => return,
                _ = tokio::time::sleep(initial_delay) => {}
            }
            let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                let outcome = inner
                    .execute_read(loop_task.endpoint(), loop_task.request())
                    .await;
                deliver_read(&loop_task, outcome);
                tokio::select! {
                    _ = loop_token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
            }
        });
        polls.insert(task, RegisteredPoll { token, handle });
        true
    }

    /// Stop a recurring poll. Future firings cease; an in-flight transaction
    /// runs to completion and still reaches the callback. Idle pooled
    /// connections for the endpoint are closed.
    pub async fn unregister_poll(&self, task: &PollTask) -> bool {
        let registered = self.inner.polls.lock().await.remove(task);
        let Some(registered) = registered else {
            return false;
        };
        registered.token.cancel();
        let pool = self.inner.pools.lock().await.get(task.endpoint()).cloned();
        if let Some(pool) = pool {
            pool.clear_idle().await;
        }
        debug!(endpoint = %task.endpoint(), "poll unregistered");
        true
    }

    /// Number of currently registered recurring polls.
    pub async fn registered_polls(&self) -> usize {
        self.inner.polls.lock().await.len()
    }

    pub async fn is_poll_registered(&self, task: &PollTask) -> bool {
        self.inner.polls.lock().await.contains_key(task)
    }

    /// Replace the pool configuration for an endpoint. Takes effect for
    /// acquisitions made after the call; in-flight transactions finish under
    /// the pool they started with.
    pub async fn set_pool_configuration(
        &self,
        endpoint: Endpoint,
        config: EndpointPoolConfiguration,
    ) {
        self.inner
            .configs
            .lock()
            .await
            .insert(endpoint.clone(), config);
        let old = self.inner.pools.lock().await.remove(&endpoint);
        if let Some(old) = old {
            old.retire().await;
        }
    }

    /// Effective pool configuration for an endpoint.
    pub async fn pool_configuration(&self, endpoint: &Endpoint) -> EndpointPoolConfiguration {
        self.inner
            .configs
            .lock()
            .await
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| EndpointPoolConfiguration::default_for(endpoint))
    }

    /// Unregister every poll, wait for their loops to exit and drain all
    /// connection pools.
    pub async fn close(&self) {
        let polls: Vec<RegisteredPoll> =
            self.inner.polls.lock().await.drain().map(|(_, p)| p).collect();
        for poll in &polls {
            poll.token.cancel();
        }
        for poll in polls {
            let _ = poll.handle.await;
        }
        let pools: Vec<Arc<EndpointPool>> =
            self.inner.pools.lock().await.drain().map(|(_, p)| p).collect();
        for pool in pools {
            pool.retire().await;
        }
        debug!("manager closed");
    }
}

impl ManagerInner {
    async fn pool_for(&self, endpoint: &Endpoint) -> Arc<EndpointPool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(endpoint) {
            return pool.clone();
        }
        let config = self
            .configs
            .lock()
            .await
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| EndpointPoolConfiguration::default_for(endpoint));
        let pool = Arc::new(EndpointPool::new(endpoint.clone(), config));
        pools.insert(endpoint.clone(), pool.clone());
        pool
    }

    async fn execute_read(
        &self,
        endpoint: &Endpoint,
        request: &ReadRequest,
    ) -> Result<ReadOutcome> {
        let request_pdu = pdu::build_read_pdu(request);
        self.execute(
            endpoint,
            request.slave_id(),
            request.max_tries(),
            &request_pdu,
            |response| pdu::parse_read_response(request, response),
        )
        .await
    }

    async fn execute_write(&self, task: &WriteTask) -> Result<WriteResponse> {
        let request = task.request();
        let request_pdu = pdu::build_write_pdu(request);
        self.execute(
            task.endpoint(),
            request.slave_id(),
            request.max_tries(),
            &request_pdu,
            |response| pdu::parse_write_response(request, response),
        )
        .await
    }

    async fn execute<T>(
        &self,
        endpoint: &Endpoint,
        unit_id: u8,
        max_tries: u32,
        request_pdu: &[u8],
        parse: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<T> {
        let pool = self.pool_for(endpoint).await;
        let tries = max_tries.max(1);
        let mut last_error = TransportError::Connection(endpoint.clone());
        for attempt in 1..=tries {
            match self.attempt(&pool, unit_id, request_pdu, &parse).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt < tries {
                        debug!(endpoint = %endpoint, attempt, error = %err, "attempt failed, retrying");
                    } else {
                        warn!(endpoint = %endpoint, tries, error = %err, "all attempts failed");
                    }
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }

    async fn attempt<T>(
        &self,
        pool: &EndpointPool,
        unit_id: u8,
        request_pdu: &[u8],
        parse: &impl Fn(&[u8]) -> Result<T>,
    ) -> Result<T> {
        let mut pooled = pool.acquire(self.factory.as_ref()).await?;
        pool.wait_transaction_spacing().await;
        trace!(unit_id, request = %hex::encode(request_pdu), "sending request");
        // the connect timeout doubles as the exchange timeout
        let timeout = pool.config().connect_timeout();
        let result = pooled
            .connection()
            .transact(unit_id, request_pdu, timeout)
            .await;
        pool.note_transaction().await;
        let parsed = result.and_then(|response| {
            trace!(response = %hex::encode(&response), "received response");
            parse(&response)
        });
        match parsed {
            Ok(value) => {
                pool.release(pooled).await;
                Ok(value)
            }
            Err(err) => {
                if err.drops_connection() {
                    pool.invalidate(pooled).await;
                } else {
                    pool.release(pooled).await;
                }
                Err(err)
            }
        }
    }
}

fn deliver_read(task: &PollTask, outcome: Result<ReadOutcome>) {
    if let Some(callback) = task.callback() {
        callback(ReadResult {
            endpoint: task.endpoint().clone(),
            request: task.request().clone(),
            outcome,
        });
    }
}

fn deliver_write(task: &WriteTask, outcome: Result<WriteResponse>) {
    if let Some(callback) = task.callback() {
        callback(WriteResult {
            endpoint: task.endpoint().clone(),
            request: task.request().clone(),
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::connection::SlaveConnection;

    struct NoFactory;

    #[async_trait]
    impl ConnectionFactory for NoFactory {
        async fn open(
            &self,
            endpoint: &Endpoint,
            _: Duration,
        ) -> Result<Box<dyn SlaveConnection>> {
            Err(TransportError::Connection(endpoint.clone()))
        }
    }

    #[tokio::test]
    async fn test_pool_configuration_roundtrip() {
        let manager = ModbusManager::new(Arc::new(NoFactory));
        let endpoint = Endpoint::tcp("localhost", 502);
        let default = manager.pool_configuration(&endpoint).await;
        assert_eq!(default, EndpointPoolConfiguration::default_for(&endpoint));

        let mut custom = default.clone();
        custom.max_connections = 2;
        custom.inter_transaction_delay_ms = 5;
        manager
            .set_pool_configuration(endpoint.clone(), custom.clone())
            .await;
        assert_eq!(manager.pool_configuration(&endpoint).await, custom);
    }

    #[tokio::test]
    async fn test_registration_bookkeeping() {
        let manager = ModbusManager::new(Arc::new(NoFactory));
        let endpoint = Endpoint::tcp("localhost", 502);
        let request = ReadRequest::new(
            1,
            crate::request::ReadFunction::ReadHoldingRegisters,
            0,
            1,
            1,
        )
        .unwrap();
        let task = PollTask::new(endpoint, request, None);

        assert_eq!(manager.registered_polls().await, 0);
        assert!(!manager.is_poll_registered(&task).await);
        assert!(
            manager
                .register_poll(task.clone(), Duration::from_secs(3600), Duration::from_secs(3600))
                .await
        );
        assert!(manager.is_poll_registered(&task).await);
        assert_eq!(manager.registered_polls().await, 1);
        assert!(manager.unregister_poll(&task).await);
        assert!(!manager.unregister_poll(&task).await);
        assert_eq!(manager.registered_polls().await, 0);
    }
}
