//! Shard selection.
//!
//! The proxy only depends on [`ServerSelector`]. Two implementations exist:
//! [`ServerList`], a fixed list indexed by checksum, and [`KetamaList`], a
//! consistent hash ring that follows shard health.

mod ketama;
mod static_list;

pub use ketama::{DEFAULT_POINTS, KetamaList, Shard};
pub use static_list::ServerList;

use crate::backend::BackendAddr;
use crate::error::Error;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Picks the backend for a key.
pub trait ServerSelector: Send + Sync {
    /// The backend that owns `key`, or [`Error::NoServers`] when no backend
    /// is available.
    fn pick_server(&self, key: &[u8]) -> Result<BackendAddr, Error>;

    /// Start any background health tracking.
    ///
    /// Must be called from within a Tokio runtime. Tracking runs until
    /// `shutdown` is set, which by default is never.
    fn monitor(&self, shutdown: Arc<AtomicBool>);
}
