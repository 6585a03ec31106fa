use super::ServerSelector;
use crate::backend::BackendAddr;
use crate::error::Error;
use crate::health::{self, HealthConfig};
use crate::metrics::RING_REBALANCES;
use crate::ring::HashRing;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Default ring ticks per shard.
pub const DEFAULT_POINTS: usize = 200;

/// A backend shard known to a [`KetamaList`].
#[derive(Debug)]
pub struct Shard {
    name: String,
    addr: BackendAddr,
    alive: AtomicBool,
    retired: AtomicBool,
}

impl Shard {
    /// New shards start out dead.
    pub fn new(name: String, addr: BackendAddr) -> Self {
        Self {
            name,
            addr,
            alive: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &BackendAddr {
        &self.addr
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Record liveness, returning the previous value.
    pub(crate) fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Whether another shard has since been registered under this name.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

struct State {
    ring: HashRing,
    shards: BTreeMap<String, Arc<Shard>>,
}

/// Where watch tasks run once [`ServerSelector::monitor`] has been called.
struct Monitoring {
    runtime: Handle,
    shutdown: Arc<AtomicBool>,
}

struct Inner {
    state: RwLock<State>,
    monitoring: Mutex<Option<Monitoring>>,
    points: usize,
    health: HealthConfig,
    rebalances: AtomicU64,
}

/// Consistent hashing over the shards that currently answer probes.
///
/// Lookups take a read lock. A rebalance takes the write lock, builds a new
/// ring from the alive shards with weight 1 each, and swaps it in whole.
/// Cloning is cheap and shares state.
#[derive(Clone)]
pub struct KetamaList {
    inner: Arc<Inner>,
}

impl KetamaList {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_POINTS, HealthConfig::default())
    }

    /// `points` ring ticks per shard, probing as described by `health`.
    pub fn with_config(points: usize, health: HealthConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    ring: HashRing::new(points),
                    shards: BTreeMap::new(),
                }),
                monitoring: Mutex::new(None),
                points,
                health,
                rebalances: AtomicU64::new(0),
            }),
        }
    }

    /// Register a shard. It stays out of the ring until a probe succeeds.
    ///
    /// A shard registered under an existing name replaces it, and the old
    /// shard's watch task stops. Once the list is monitored, new shards get
    /// a watch task of their own on the runtime `monitor` was called from.
    pub fn add_server(&self, name: &str, addr: &str) -> Result<(), Error> {
        let addr = BackendAddr::parse(addr)?;
        let shard = Arc::new(Shard::new(name.to_string(), addr));

        debug!(shard = name, backend = %shard.addr(), "registered shard");

        // Held across the insert so `monitor` sees each shard exactly once.
        let monitoring = self.inner.monitoring.lock();
        let replaced = self
            .inner
            .state
            .write()
            .shards
            .insert(name.to_string(), shard.clone());
        if let Some(old) = replaced {
            old.retire();
        }
        if let Some(monitoring) = monitoring.as_ref() {
            self.watch(shard, monitoring);
        }
        Ok(())
    }

    fn watch(&self, shard: Arc<Shard>, monitoring: &Monitoring) {
        let list = self.clone();
        monitoring.runtime.spawn(health::watch(
            shard,
            self.inner.health,
            monitoring.shutdown.clone(),
            move || list.rebalance(),
        ));
    }

    /// Registered shards, alive or not, in name order.
    pub fn shards(&self) -> Vec<Arc<Shard>> {
        self.inner.state.read().shards.values().cloned().collect()
    }

    /// Rebuild the ring from the alive shards.
    pub fn rebalance(&self) {
        let mut guard = self.inner.state.write();
        let state = &mut *guard;

        let mut ring = HashRing::new(self.inner.points);
        let mut alive = Vec::new();
        for (name, shard) in &state.shards {
            if shard.is_alive() {
                ring.add_node(name, 1);
                alive.push(name.as_str());
            }
        }
        ring.bake();

        info!(?alive, ticks = ring.len(), "rebalanced ring");
        state.ring = ring;

        RING_REBALANCES.increment();
        self.inner.rebalances.fetch_add(1, Ordering::Relaxed);
    }

    /// Rebalances since creation.
    pub fn rebalance_count(&self) -> u64 {
        self.inner.rebalances.load(Ordering::Relaxed)
    }
}

impl Default for KetamaList {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerSelector for KetamaList {
    fn pick_server(&self, key: &[u8]) -> Result<BackendAddr, Error> {
        let state = self.inner.state.read();
        let name = state.ring.hash(key).ok_or(Error::NoServers)?;

        state
            .shards
            .get(name)
            .map(|shard| shard.addr().clone())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn monitor(&self, shutdown: Arc<AtomicBool>) {
        let mut monitoring = self.inner.monitoring.lock();
        if monitoring.is_some() {
            return;
        }

        let current = monitoring.insert(Monitoring {
            runtime: Handle::current(),
            shutdown,
        });
        for shard in self.shards() {
            self.watch(shard, current);
        }
    }
}
