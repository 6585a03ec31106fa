//! Backend connection pool.

use super::addr::BackendAddr;
use super::connection::BackendConnection;
use super::dial::DEFAULT_CONNECT_TIMEOUT;
use crate::error::Error;
use crate::metrics::{POOL_DISCARDS, POOL_HITS};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::trace;

/// Default number of idle connections kept per backend.
pub const DEFAULT_MAX_IDLE: usize = 10;

/// Idle connections to backend shards, kept as one stack per address.
///
/// The most recently released connection is handed out first. The lock is
/// only held to push or pop; dialing happens outside it.
pub struct BackendPool {
    idle: Mutex<AHashMap<BackendAddr, Vec<BackendConnection>>>,
    max_idle: usize,
    connect_timeout: Duration,
}

impl BackendPool {
    pub fn new(max_idle: usize, connect_timeout: Duration) -> Self {
        Self {
            idle: Mutex::new(AHashMap::new()),
            max_idle,
            connect_timeout,
        }
    }

    /// Maximum idle connections kept per backend.
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Number of idle connections currently held for `addr`.
    pub fn idle_count(&self, addr: &BackendAddr) -> usize {
        self.idle.lock().get(addr).map_or(0, Vec::len)
    }

    /// Take an idle connection to `addr`, or dial a new one.
    ///
    /// Pooled connections are not checked before reuse.
    pub async fn get(&self, addr: &BackendAddr) -> Result<BackendConnection, Error> {
        if let Some(conn) = self.take_idle(addr) {
            POOL_HITS.increment();
            return Ok(conn);
        }

        BackendConnection::connect(addr, self.connect_timeout).await
    }

    fn take_idle(&self, addr: &BackendAddr) -> Option<BackendConnection> {
        self.idle.lock().get_mut(addr)?.pop()
    }

    /// Return a connection after an exchange.
    ///
    /// The connection is closed if the exchange failed or the backend's idle
    /// stack is already full.
    pub fn put(&self, conn: BackendConnection, failed: bool) {
        let discarded = {
            let mut idle = self.idle.lock();
            let stack = idle.entry(conn.addr().clone()).or_default();
            if failed || stack.len() >= self.max_idle {
                Some(conn)
            } else {
                stack.push(conn);
                None
            }
        };

        if let Some(conn) = discarded {
            POOL_DISCARDS.increment();
            trace!(backend = %conn.addr(), conn = conn.id(), failed, "closing backend connection");
        }
    }
}

impl Default for BackendPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE, DEFAULT_CONNECT_TIMEOUT)
    }
}
