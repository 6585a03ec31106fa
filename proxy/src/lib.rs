//! mcproxy - a sharding proxy for the memcached binary protocol.
//!
//! Clients speak the binary protocol to the proxy as if it were a single
//! memcached. Each request is routed by key to one backend shard and the
//! response is relayed back unchanged. Shards are chosen either by a
//! consistent hash ring over the shards that currently pass health probes,
//! or by a plain checksum modulo a fixed list.
//!
//! Backend connections are pooled per shard and reused across clients.

pub mod backend;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod ring;
pub mod selector;
pub mod server;

pub mod logging;
pub mod signal;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::Error;
pub use ring::HashRing;
pub use selector::{KetamaList, ServerList, ServerSelector};
pub use server::{Proxy, run};
