//! Connecting to backends with a timeout.
//!
//! The connect attempt runs in its own task and races a timer. If the timer
//! wins the caller gets [`Error::Timeout`] right away, while a second task
//! keeps waiting on the attempt and closes the stream should it still
//! connect. A connect is never cancelled halfway through.

use super::addr::{BackendAddr, BackendStream};
use crate::error::Error;
use crate::metrics::{BACKEND_DIAL_TIMEOUTS, BACKEND_DIALS};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Default timeout for backend connects and health probes.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Connect to `addr`, failing with [`Error::Timeout`] after `timeout`.
pub async fn dial(addr: &BackendAddr, timeout: Duration) -> Result<BackendStream, Error> {
    BACKEND_DIALS.increment();

    let target = addr.clone();
    let result = race_connect(async move { target.connect().await }, timeout).await;

    match &result {
        Err(Error::Timeout) => {
            BACKEND_DIAL_TIMEOUTS.increment();
            debug!(backend = %addr, ?timeout, "backend connect timed out");
        }
        Err(e) => debug!(backend = %addr, error = %e, "backend connect failed"),
        Ok(_) => {}
    }

    result
}

/// Race `connect` against a timer.
///
/// A value produced after the timer fired is dropped, which for a stream
/// closes it.
pub(crate) async fn race_connect<T, F>(connect: F, timeout: Duration) -> Result<T, Error>
where
    T: Send + 'static,
    F: Future<Output = io::Result<T>> + Send + 'static,
{
    let (tx, mut rx) = oneshot::channel();

    tokio::spawn(async move {
        let _ = tx.send(connect.await);
    });

    tokio::select! {
        result = &mut rx => match result {
            Ok(connected) => connected.map_err(Error::from),
            Err(_) => Err(Error::Io(io::Error::other("connect task dropped"))),
        },
        _ = tokio::time::sleep(timeout) => {
            tokio::spawn(async move {
                if let Ok(Ok(late)) = rx.await {
                    debug!("closing connection that completed after timeout");
                    drop(late);
                }
            });
            Err(Error::Timeout)
        }
    }
}
