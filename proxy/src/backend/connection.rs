//! Single backend connection.

use super::addr::{BackendAddr, BackendStream};
use super::dial::dial;
use crate::codec::{read_message, write_message};
use crate::error::Error;
use crate::metrics::{BACKEND_ERRORS, BACKEND_EXCHANGES};
use protocol_memcache::binary::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::trace;

/// Connection ID counter.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// A connection to a backend shard.
///
/// Exchanges hold the stream lock from the start of the write to the end of
/// the response, so requests never interleave on one connection.
#[derive(Debug)]
pub struct BackendConnection {
    id: u64,
    addr: BackendAddr,
    stream: Mutex<BackendStream>,
}

impl BackendConnection {
    /// Wrap an already connected stream.
    pub fn new(addr: BackendAddr, stream: BackendStream) -> Self {
        Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            addr,
            stream: Mutex::new(stream),
        }
    }

    /// Dial `addr` with the given connect timeout.
    pub async fn connect(addr: &BackendAddr, timeout: Duration) -> Result<Self, Error> {
        let stream = dial(addr, timeout).await?;
        Ok(Self::new(addr.clone(), stream))
    }

    /// Process-unique connection ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> &BackendAddr {
        &self.addr
    }

    /// Send one request and wait for one response.
    ///
    /// There is no timeout; a backend that never answers blocks the caller.
    pub async fn exchange(&self, request: &Message) -> Result<Message, Error> {
        let mut stream = self.stream.lock().await;
        BACKEND_EXCHANGES.increment();

        let result: Result<Message, Error> = async {
            write_message(&mut *stream, request).await?;
            Ok(read_message(&mut *stream).await?)
        }
        .await;

        if let Err(e) = &result {
            BACKEND_ERRORS.increment();
            trace!(backend = %self.addr, conn = self.id, error = %e, "backend exchange failed");
        }
        result
    }

    /// Send a NOOP and report whether a response came back.
    ///
    /// This only shows the backend is answering; it says nothing about
    /// memory or load.
    pub async fn ping(&self) -> bool {
        self.exchange(&Message::noop()).await.is_ok()
    }
}
