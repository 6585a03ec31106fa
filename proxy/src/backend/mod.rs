//! Backend connection management.

mod addr;
mod connection;
mod dial;
mod pool;

pub use addr::{BackendAddr, BackendStream};
pub use connection::BackendConnection;
pub use dial::{DEFAULT_CONNECT_TIMEOUT, dial};
pub use pool::{BackendPool, DEFAULT_MAX_IDLE};
