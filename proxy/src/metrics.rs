//! Proxy metrics.

use metriken::{Counter, Gauge, metric};

// Clients
#[metric(
    name = "proxy_client_connections",
    description = "Currently connected clients"
)]
pub static CLIENT_CONNECTIONS: Gauge = Gauge::new();

#[metric(
    name = "proxy_client_accepts",
    description = "Total client connections accepted"
)]
pub static CLIENT_ACCEPTS: Counter = Counter::new();

#[metric(
    name = "proxy_client_accept_errors",
    description = "Failed accept calls on the client listener"
)]
pub static CLIENT_ACCEPT_ERRORS: Counter = Counter::new();

#[metric(
    name = "proxy_client_requests",
    description = "Total requests read from clients"
)]
pub static CLIENT_REQUESTS: Counter = Counter::new();

#[metric(
    name = "proxy_no_servers",
    description = "Requests that could not be routed to any shard"
)]
pub static NO_SERVERS: Counter = Counter::new();

// Backends
#[metric(
    name = "proxy_backend_exchanges",
    description = "Total request/response exchanges with backends"
)]
pub static BACKEND_EXCHANGES: Counter = Counter::new();

#[metric(
    name = "proxy_backend_errors",
    description = "Exchanges that failed on the backend connection"
)]
pub static BACKEND_ERRORS: Counter = Counter::new();

#[metric(
    name = "proxy_backend_dials",
    description = "New backend connections opened"
)]
pub static BACKEND_DIALS: Counter = Counter::new();

#[metric(
    name = "proxy_backend_dial_timeouts",
    description = "Backend dials that lost the race against the connect timeout"
)]
pub static BACKEND_DIAL_TIMEOUTS: Counter = Counter::new();

#[metric(
    name = "proxy_pool_hits",
    description = "Backend connections taken from the idle pool"
)]
pub static POOL_HITS: Counter = Counter::new();

#[metric(
    name = "proxy_pool_discards",
    description = "Backend connections closed instead of returned to the idle pool"
)]
pub static POOL_DISCARDS: Counter = Counter::new();

// Selection
#[metric(
    name = "proxy_ring_rebalances",
    description = "Hash ring rebuilds"
)]
pub static RING_REBALANCES: Counter = Counter::new();

#[metric(
    name = "proxy_probe_failures",
    description = "Failed shard health probes"
)]
pub static PROBE_FAILURES: Counter = Counter::new();
