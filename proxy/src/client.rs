//! Client connection handling.
//!
//! One request is read, forwarded to the owning shard and answered before
//! the next is read. Any failure ends the connection; there is no retry and
//! no fallback to another shard.

use crate::backend::BackendPool;
use crate::codec::{read_next_message, write_message};
use crate::error::Error;
use crate::metrics::{CLIENT_REQUESTS, NO_SERVERS};
use crate::selector::ServerSelector;
use protocol_memcache::binary::Message;
use tokio::io::{AsyncRead, AsyncWrite};

/// Serve one client until it disconnects or a request fails.
///
/// A clean close between requests returns `Ok(())`.
pub async fn serve<S>(
    mut stream: S,
    selector: &dyn ServerSelector,
    pool: &BackendPool,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let Some(request) = read_next_message(&mut stream).await? else {
            return Ok(());
        };
        CLIENT_REQUESTS.increment();

        let response = forward(&request, selector, pool).await?;
        write_message(&mut stream, &response).await?;
    }
}

/// Run one request against the shard that owns its key.
///
/// The backend connection goes back to the pool afterwards, or is closed if
/// the exchange failed.
pub async fn forward(
    request: &Message,
    selector: &dyn ServerSelector,
    pool: &BackendPool,
) -> Result<Message, Error> {
    let addr = selector.pick_server(&request.key).inspect_err(|e| {
        if matches!(e, Error::NoServers) {
            NO_SERVERS.increment();
        }
    })?;

    let conn = pool.get(&addr).await?;
    let result = conn.exchange(request).await;
    pool.put(conn, result.is_err());

    result
}
