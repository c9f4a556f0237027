//! Connection Pool Management
//!
//! [`ConnectionPool`] hands out boxed [`Connection`]s built by a factory.
//! With `reuse` off (the default) the pool is a pass-through: every acquire
//! opens a fresh connection and every release closes it, while the counters
//! still record the traffic. With `reuse` on, released connections go back
//! to an idle list and are handed out again.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::statistics::{PoolCounters, PoolStats};
use crate::backends::{self, Connection, DriverConfig, NativeConfig};
use crate::error::{OrmError, OrmResult};

/// Builds a new backend connection on demand
pub type ConnectionFactory = Box<dyn Fn() -> OrmResult<Box<dyn Connection>> + Send + Sync>;

/// Connection pool configuration
///
/// Timeouts and intervals are whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    /// Idle connections older than this are closed; 0 keeps them forever
    pub idle_timeout: u64,
    /// How long `acquire` waits on a full pool; 0 fails immediately
    pub acquire_timeout: u64,
    /// Idle connections not checked within this window are pinged before
    /// reuse; 0 pings every time
    pub validation_interval: u64,
    /// Keep released connections for reuse
    pub reuse: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            idle_timeout: 600,
            acquire_timeout: 30,
            validation_interval: 30,
            reuse: false,
        }
    }
}

impl From<&NativeConfig> for PoolConfig {
    fn from(native: &NativeConfig) -> Self {
        Self {
            min_connections: native.min_idle,
            max_connections: native.max_connections,
            idle_timeout: native.max_idle_time,
            ..Self::default()
        }
    }
}

impl From<&DriverConfig> for PoolConfig {
    fn from(driver: &DriverConfig) -> Self {
        match driver {
            DriverConfig::Native(native) => Self::from(native),
            _ => Self::default(),
        }
    }
}

struct IdleConnection {
    conn: Box<dyn Connection>,
    idle_since: Instant,
    validated_at: Instant,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<IdleConnection>,
    /// Connections created and not yet destroyed, idle or checked out
    open: u32,
    closed: bool,
}

/// Blocking connection pool
pub struct ConnectionPool {
    config: PoolConfig,
    factory: ConnectionFactory,
    state: Mutex<PoolState>,
    available: Condvar,
    counters: PoolCounters,
    created_at: Instant,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConnectionPool {
    pub fn new<F>(config: PoolConfig, factory: F) -> Self
    where
        F: Fn() -> OrmResult<Box<dyn Connection>> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            counters: PoolCounters::default(),
            created_at: Instant::now(),
        }
    }

    /// Pool whose factory opens connections for `driver`
    pub fn for_driver(driver: DriverConfig, config: PoolConfig) -> Self {
        Self::new(config, move || backends::connect(&driver))
    }

    /// Pool with no way to open connections; only released connections can
    /// be handed out again
    pub fn detached(config: PoolConfig) -> Self {
        Self::new(config, || {
            Err(OrmError::Configuration(
                "pool has no connection factory".to_string(),
            ))
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn create(&self) -> OrmResult<Box<dyn Connection>> {
        match (self.factory)() {
            Ok(conn) => {
                PoolCounters::bump(&self.counters.creates);
                Ok(conn)
            }
            Err(e) => {
                PoolCounters::bump(&self.counters.acquire_errors);
                error!("Failed to open pooled connection: {}", e);
                Err(e)
            }
        }
    }

    fn destroy(&self, mut conn: Box<dyn Connection>) {
        PoolCounters::bump(&self.counters.destroys);
        if let Err(e) = conn.close() {
            warn!("Error closing pooled connection: {}", e);
        }
    }

    /// Check out a connection
    pub fn acquire(&self) -> OrmResult<Box<dyn Connection>> {
        PoolCounters::bump(&self.counters.acquires);
        if !self.config.reuse {
            PoolCounters::bump(&self.counters.misses);
            return self.create();
        }

        let deadline = Instant::now() + Duration::from_secs(self.config.acquire_timeout);
        let mut state = self.lock();
        loop {
            if state.closed {
                PoolCounters::bump(&self.counters.acquire_errors);
                return Err(OrmError::NotConnected);
            }

            // Backend I/O (ping, close) never runs under the state lock
            let expired = self.take_expired(&mut state);
            if !expired.is_empty() {
                drop(state);
                self.destroy_all(expired);
                state = self.lock();
                continue;
            }

            if let Some(idle) = state.idle.pop_back() {
                if !self.needs_validation(&idle) {
                    PoolCounters::bump(&self.counters.hits);
                    debug!(
                        "Reusing pooled connection (open: {}, idle: {})",
                        state.open,
                        state.idle.len()
                    );
                    return Ok(idle.conn);
                }

                drop(state);
                let mut conn = idle.conn;
                match conn.ping() {
                    Ok(()) => {
                        PoolCounters::bump(&self.counters.hits);
                        debug!("Reusing validated pooled connection");
                        return Ok(conn);
                    }
                    Err(e) => {
                        debug!("Discarding pooled connection that failed validation: {}", e);
                        self.destroy(conn);
                        state = self.lock();
                        state.open = state.open.saturating_sub(1);
                        continue;
                    }
                }
            }

            if state.open < self.config.max_connections {
                state.open += 1;
                drop(state);
                PoolCounters::bump(&self.counters.misses);
                return self.create().map_err(|e| {
                    let mut state = self.lock();
                    state.open = state.open.saturating_sub(1);
                    self.available.notify_one();
                    e
                });
            }

            if self.config.acquire_timeout == 0 {
                PoolCounters::bump(&self.counters.acquire_errors);
                warn!(
                    "Database pool exhausted: {}/{} connections in use",
                    state.open, self.config.max_connections
                );
                return Err(OrmError::PoolExhausted {
                    max_connections: self.config.max_connections,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                PoolCounters::bump(&self.counters.acquire_errors);
                return Err(OrmError::PoolTimeout {
                    timeout: self.config.acquire_timeout,
                });
            }
            state = self
                .available
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Return a connection obtained from [`acquire`](Self::acquire)
    pub fn release(&self, mut conn: Box<dyn Connection>) {
        PoolCounters::bump(&self.counters.releases);
        if !self.config.reuse {
            self.destroy(conn);
            return;
        }

        if conn.in_transaction() {
            warn!("Connection released inside a transaction; rolling back");
            if let Err(e) = conn.rollback() {
                warn!("Rollback on release failed: {}", e);
            }
        }

        let mut state = self.lock();
        if state.closed || !conn.is_connected() || conn.in_transaction() {
            state.open = state.open.saturating_sub(1);
            drop(state);
            self.destroy(conn);
        } else {
            let now = Instant::now();
            state.idle.push_back(IdleConnection {
                conn,
                idle_since: now,
                validated_at: now,
            });
        }
        self.available.notify_one();
    }

    /// Run `f` with a pooled connection, releasing it afterwards
    pub fn with_connection<T, F>(&self, f: F) -> OrmResult<T>
    where
        F: FnOnce(&mut dyn Connection) -> OrmResult<T>,
    {
        let mut conn = self.acquire()?;
        let result = f(conn.as_mut());
        self.release(conn);
        result
    }

    /// Open idle connections until `min_connections` exist; returns how many
    /// were created
    pub fn warm_up(&self) -> OrmResult<u32> {
        if !self.config.reuse {
            return Ok(0);
        }
        let target = self.config.min_connections.min(self.config.max_connections);
        let mut created = 0;
        loop {
            {
                let mut state = self.lock();
                if state.closed || state.open >= target {
                    break;
                }
                state.open += 1;
            }
            match self.create() {
                Ok(conn) => {
                    let now = Instant::now();
                    self.lock().idle.push_back(IdleConnection {
                        conn,
                        idle_since: now,
                        validated_at: now,
                    });
                    created += 1;
                }
                Err(e) => {
                    let mut state = self.lock();
                    state.open = state.open.saturating_sub(1);
                    return Err(e);
                }
            }
        }
        self.available.notify_all();
        Ok(created)
    }

    /// Close idle connections that outlived `idle_timeout`, keeping at least
    /// `min_connections` open
    pub fn evict_idle(&self) -> u32 {
        let expired = {
            let mut state = self.lock();
            self.take_expired(&mut state)
        };
        let evicted = expired.len() as u32;
        self.destroy_all(expired);
        if evicted > 0 {
            self.available.notify_all();
        }
        evicted
    }

    /// Unlink idle connections past `idle_timeout`; the caller closes them
    /// once the lock is released
    fn take_expired(&self, state: &mut PoolState) -> Vec<Box<dyn Connection>> {
        let mut expired = Vec::new();
        if self.config.idle_timeout == 0 {
            return expired;
        }
        let max_idle = Duration::from_secs(self.config.idle_timeout);
        while state.open > self.config.min_connections {
            // Oldest idle connections sit at the front
            match state.idle.front() {
                Some(idle) if idle.idle_since.elapsed() >= max_idle => {}
                _ => break,
            }
            if let Some(idle) = state.idle.pop_front() {
                state.open = state.open.saturating_sub(1);
                expired.push(idle.conn);
            }
        }
        if !expired.is_empty() {
            debug!("Evicting {} idle pooled connections", expired.len());
        }
        expired
    }

    fn destroy_all(&self, conns: Vec<Box<dyn Connection>>) {
        for conn in conns {
            self.destroy(conn);
        }
    }

    fn needs_validation(&self, idle: &IdleConnection) -> bool {
        idle.validated_at.elapsed() >= Duration::from_secs(self.config.validation_interval)
    }

    /// Close every idle connection and refuse further acquires
    pub fn close(&self) {
        let drained: Vec<IdleConnection> = {
            let mut state = self.lock();
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.open = state.open.saturating_sub(drained.len() as u32);
            drained
        };
        self.destroy_all(drained.into_iter().map(|idle| idle.conn).collect());
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats::snapshot(
            &self.counters,
            state.open,
            state.idle.len() as u32,
            self.config.max_connections,
            self.created_at,
        )
    }

    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;
    use crate::backends::{MemoryConnection, MemoryHandle};

    fn memory_pool(config: PoolConfig) -> (ConnectionPool, Arc<Mutex<Vec<MemoryHandle>>>) {
        let handles = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&handles);
        let pool = ConnectionPool::new(config, move || {
            let conn = MemoryConnection::new();
            sink.lock().unwrap().push(conn.handle());
            Ok(Box::new(conn) as Box<dyn Connection>)
        });
        (pool, handles)
    }

    fn reusing() -> PoolConfig {
        PoolConfig {
            reuse: true,
            ..PoolConfig::default()
        }
    }

    #[test]
    fn test_pass_through_never_reuses() {
        let (pool, handles) = memory_pool(PoolConfig::default());
        let first = pool.acquire().unwrap();
        pool.release(first);
        let second = pool.acquire().unwrap();
        pool.release(second);

        let stats = pool.stats();
        assert_eq!(stats.acquires, 2);
        assert_eq!(stats.releases, 2);
        assert_eq!(stats.creates, 2);
        assert_eq!(stats.destroys, 2);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
        assert_eq!(pool.hit_rate(), 0.0);

        let handles = handles.lock().unwrap();
        assert_eq!(handles.len(), 2);
        assert!(handles.iter().all(|h| !h.is_connected()));
    }

    #[test]
    fn test_reuse_hands_back_released_connection() {
        let (pool, handles) = memory_pool(reusing());
        let conn = pool.acquire().unwrap();
        pool.release(conn);
        let conn = pool.acquire().unwrap();
        assert!(conn.is_connected());
        pool.release(conn);

        let stats = pool.stats();
        assert_eq!(stats.creates, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(pool.hit_rate(), 0.5);
        assert_eq!(handles.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_exhausted_without_wait() {
        let (pool, _) = memory_pool(PoolConfig {
            max_connections: 1,
            acquire_timeout: 0,
            ..reusing()
        });
        let held = pool.acquire().unwrap();
        assert_eq!(
            pool.acquire().unwrap_err(),
            OrmError::PoolExhausted { max_connections: 1 }
        );
        pool.release(held);
        assert!(pool.acquire().is_ok());
        assert_eq!(pool.stats().acquire_errors, 1);
    }

    #[test]
    fn test_acquire_times_out() {
        let (pool, _) = memory_pool(PoolConfig {
            max_connections: 1,
            acquire_timeout: 1,
            ..reusing()
        });
        let _held = pool.acquire().unwrap();
        let started = Instant::now();
        assert_eq!(pool.acquire().unwrap_err(), OrmError::PoolTimeout { timeout: 1 });
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn test_waiter_wakes_on_release() {
        let (pool, _) = memory_pool(PoolConfig {
            max_connections: 1,
            acquire_timeout: 10,
            ..reusing()
        });
        let pool = Arc::new(pool);
        let held = pool.acquire().unwrap();

        let releaser = Arc::clone(&pool);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            releaser.release(held);
        });

        let conn = pool.acquire().unwrap();
        worker.join().unwrap();
        assert!(conn.is_connected());
        assert_eq!(pool.stats().hits, 1);
    }

    #[test]
    fn test_failed_validation_replaces_connection() {
        let (pool, handles) = memory_pool(PoolConfig {
            validation_interval: 0,
            ..reusing()
        });
        let conn = pool.acquire().unwrap();
        pool.release(conn);
        handles.lock().unwrap()[0].fail_next("server has gone away");

        let conn = pool.acquire().unwrap();
        pool.release(conn);
        let stats = pool.stats();
        assert_eq!(stats.creates, 2);
        assert_eq!(stats.destroys, 1);
        assert_eq!(stats.hits, 0);
        assert!(!handles.lock().unwrap()[0].is_connected());
    }

    /// Flags shared between a test and a connection whose ping blocks
    #[derive(Default)]
    struct PingGate {
        started: AtomicBool,
        go: AtomicBool,
        timed_out: AtomicBool,
    }

    struct SlowPing {
        inner: MemoryConnection,
        gate: Arc<PingGate>,
    }

    impl Connection for SlowPing {
        fn query(&mut self, sql: &str) -> OrmResult<crate::backends::ResultSet> {
            self.inner.query(sql)
        }
        fn exec(&mut self, sql: &str) -> OrmResult<u64> {
            self.inner.exec(sql)
        }
        fn begin_transaction(&mut self) -> OrmResult<()> {
            self.inner.begin_transaction()
        }
        fn commit(&mut self) -> OrmResult<()> {
            self.inner.commit()
        }
        fn rollback(&mut self) -> OrmResult<()> {
            self.inner.rollback()
        }
        fn last_insert_id(&self) -> u64 {
            self.inner.last_insert_id()
        }
        fn close(&mut self) -> OrmResult<()> {
            self.inner.close()
        }
        fn in_transaction(&self) -> bool {
            self.inner.in_transaction()
        }
        fn backend_type(&self) -> crate::backends::BackendType {
            self.inner.backend_type()
        }
        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }
        fn ping(&mut self) -> OrmResult<()> {
            self.gate.started.store(true, Ordering::SeqCst);
            let started = Instant::now();
            while !self.gate.go.load(Ordering::SeqCst) {
                if started.elapsed() > Duration::from_secs(2) {
                    self.gate.timed_out.store(true, Ordering::SeqCst);
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }
    }

    #[test]
    fn test_validation_ping_runs_without_holding_the_pool() {
        let gate = Arc::new(PingGate::default());
        let factory_gate = Arc::clone(&gate);
        let pool = Arc::new(ConnectionPool::new(
            PoolConfig {
                validation_interval: 0,
                ..reusing()
            },
            move || {
                Ok(Box::new(SlowPing {
                    inner: MemoryConnection::new(),
                    gate: Arc::clone(&factory_gate),
                }) as Box<dyn Connection>)
            },
        ));
        let conn = pool.acquire().unwrap();
        pool.release(conn);

        let worker_pool = Arc::clone(&pool);
        let worker = thread::spawn(move || worker_pool.acquire().map(|c| worker_pool.release(c)));
        while !gate.started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        // Other callers get through while the ping is still in flight
        let stats = pool.stats();
        assert!(!gate.timed_out.load(Ordering::SeqCst));
        assert_eq!(stats.open_connections, 1);
        assert_eq!(stats.idle_connections, 0);

        gate.go.store(true, Ordering::SeqCst);
        worker.join().unwrap().unwrap();
        assert_eq!(pool.stats().hits, 1);
    }

    #[test]
    fn test_release_rolls_back_open_transaction() {
        let (pool, handles) = memory_pool(reusing());
        let mut conn = pool.acquire().unwrap();
        conn.begin_transaction().unwrap();
        conn.exec("INSERT INTO t (a) VALUES (1)").unwrap();
        pool.release(conn);

        let handle = handles.lock().unwrap()[0].clone();
        assert!(!handle.in_transaction());
        assert_eq!(handle.transactions_rolled_back(), 1);
        assert_eq!(handle.insert_count(), 0);
    }

    #[test]
    fn test_warm_up_and_idle_eviction() {
        let (pool, _) = memory_pool(PoolConfig {
            min_connections: 1,
            idle_timeout: 1,
            ..reusing()
        });
        assert_eq!(pool.warm_up().unwrap(), 1);
        assert_eq!(pool.warm_up().unwrap(), 0);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.stats().open_connections, 2);

        thread::sleep(Duration::from_millis(1100));
        assert_eq!(pool.evict_idle(), 1);
        assert_eq!(pool.stats().open_connections, 1);
    }

    #[test]
    fn test_closed_pool_refuses_acquire() {
        let (pool, handles) = memory_pool(reusing());
        let conn = pool.acquire().unwrap();
        pool.release(conn);
        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.acquire().unwrap_err(), OrmError::NotConnected);
        assert!(!handles.lock().unwrap()[0].is_connected());
    }

    #[test]
    fn test_detached_pool_and_native_seed() {
        let pool = ConnectionPool::detached(PoolConfig::default());
        assert!(matches!(pool.acquire(), Err(OrmError::Configuration(_))));

        let native = NativeConfig {
            max_connections: 4,
            min_idle: 2,
            max_idle_time: 60,
            ..NativeConfig::default()
        };
        let config = PoolConfig::from(&native);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.idle_timeout, 60);
        assert!(!config.reuse);
    }
}
