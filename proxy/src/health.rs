//! Shard health probing.
//!
//! Each shard gets its own polling task. A cycle dials the shard, sends a
//! NOOP and records whether a response came back. Only a change in liveness
//! triggers the callback, so a stable shard costs one probe per interval and
//! nothing more.

use crate::backend::{BackendAddr, BackendConnection, DEFAULT_CONNECT_TIMEOUT};
use crate::metrics::PROBE_FAILURES;
use crate::selector::Shard;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, trace, warn};

/// Default time between probes of one shard.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// Sleep between probe cycles, regardless of outcome.
    pub interval: Duration,
    /// Bound on the probe connect, and separately on the NOOP round trip.
    pub timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Dial `addr` and exchange one NOOP.
///
/// The probe connection is closed before returning. Failures are not retried.
pub async fn probe(addr: &BackendAddr, timeout: Duration) -> bool {
    let conn = match BackendConnection::connect(addr, timeout).await {
        Ok(conn) => conn,
        Err(e) => {
            trace!(backend = %addr, error = %e, "probe connect failed");
            return false;
        }
    };

    tokio::time::timeout(timeout, conn.ping())
        .await
        .unwrap_or(false)
}

/// Probe `shard` until `shutdown` is set or the shard is retired, calling
/// `on_change` after every liveness transition.
///
/// The shard's liveness flag is written only from here.
pub(crate) async fn watch<F>(
    shard: Arc<Shard>,
    config: HealthConfig,
    shutdown: Arc<AtomicBool>,
    on_change: F,
) where
    F: Fn() + Send + 'static,
{
    while !shutdown.load(Ordering::Relaxed) && !shard.is_retired() {
        let alive = probe(shard.addr(), config.timeout).await;
        if !alive {
            PROBE_FAILURES.increment();
        }

        if shard.set_alive(alive) != alive {
            if alive {
                info!(shard = shard.name(), backend = %shard.addr(), "shard is alive");
            } else {
                warn!(shard = shard.name(), backend = %shard.addr(), "shard is dead");
            }
            on_change();
        }

        tokio::time::sleep(config.interval).await;
    }

    trace!(shard = shard.name(), "health monitor stopped");
}
