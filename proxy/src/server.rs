//! The proxy: accept loop and runtime setup.

use crate::backend::BackendPool;
use crate::client;
use crate::config::{Config, ConfigError, SelectorKind};
use crate::error::Error;
use crate::metrics::{CLIENT_ACCEPT_ERRORS, CLIENT_ACCEPTS, CLIENT_CONNECTIONS};
use crate::selector::{KetamaList, ServerList, ServerSelector};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// How often the accept loop checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A sharding proxy.
///
/// Owns the idle connection pool; nothing is shared between two `Proxy`
/// values. Clients are served until the shutdown flag is set, which by
/// default never happens.
pub struct Proxy {
    selector: Arc<dyn ServerSelector>,
    pool: Arc<BackendPool>,
    shutdown: Arc<AtomicBool>,
}

impl Proxy {
    /// A proxy over a fixed list of backends, using modulo selection.
    pub fn new<S: AsRef<str>>(servers: &[S]) -> Result<Self, Error> {
        let selector = ServerList::with_servers(servers)?;
        Ok(Self::from_selector(Arc::new(selector), BackendPool::default()))
    }

    pub fn from_selector(selector: Arc<dyn ServerSelector>, pool: BackendPool) -> Self {
        Self {
            selector,
            pool: Arc::new(pool),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build the selector and pool described by `config`.
    ///
    /// Ketama shards are named by their address string.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let servers = &config.backend.servers;

        let selector: Arc<dyn ServerSelector> = match config.selector.kind {
            SelectorKind::Ketama => {
                let list = KetamaList::with_config(config.selector.points, config.health());
                for server in servers {
                    list.add_server(server, server)
                        .map_err(|_| ConfigError::InvalidAddress(server.clone()))?;
                }
                Arc::new(list)
            }
            SelectorKind::Modulo => Arc::new(
                ServerList::with_servers(servers)
                    .map_err(|e| ConfigError::InvalidAddress(e.to_string()))?,
            ),
        };

        let pool = BackendPool::new(config.backend.max_idle, config.connect_timeout());
        Ok(Self::from_selector(selector, pool))
    }

    /// Stop accepting clients and probing shards once `shutdown` is set.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    /// Bind `addr`, start health tracking, then serve.
    pub async fn listen_and_serve(&self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, "proxy listening");

        self.selector.monitor(self.shutdown.clone());
        self.serve(listener).await
    }

    /// Accept clients on `listener`, one task each.
    ///
    /// Returns when the shutdown flag is set. Failed accepts are logged and
    /// retried after a short pause. Clients already connected keep being
    /// served.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Error> {
        self.accept_loop(&listener).await;
        Ok(())
    }

    async fn accept_loop<L: Accept + Sync>(&self, listener: &L) {
        while !self.shutdown.load(Ordering::Relaxed) {
            let accepted = tokio::select! {
                accepted = std::future::poll_fn(|cx| listener.poll_accept(cx)) => accepted,
                _ = tokio::time::sleep(SHUTDOWN_POLL) => continue,
            };

            match accepted {
                Ok((stream, peer)) => self.spawn_client(stream, peer),
                Err(e) => {
                    CLIENT_ACCEPT_ERRORS.increment();
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        info!("proxy stopped accepting clients");
    }

    fn spawn_client(&self, stream: TcpStream, peer: SocketAddr) {
        let _ = stream.set_nodelay(true);
        CLIENT_ACCEPTS.increment();
        CLIENT_CONNECTIONS.increment();

        let selector = self.selector.clone();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            debug!(%peer, "client connected");
            match client::serve(stream, &*selector, &pool).await {
                Ok(()) => debug!(%peer, "client disconnected"),
                Err(e) if e.is_disconnect() || matches!(e, Error::NoServers) => {
                    debug!(%peer, error = %e, "closing client")
                }
                Err(e) => warn!(%peer, error = %e, "closing client"),
            }
            CLIENT_CONNECTIONS.decrement();
        });
    }
}

/// Source of client connections for the accept loop.
trait Accept {
    fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<io::Result<(TcpStream, SocketAddr)>>;
}

impl Accept for TcpListener {
    fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<io::Result<(TcpStream, SocketAddr)>> {
        TcpListener::poll_accept(self, cx)
    }
}

/// Run the proxy described by `config` on a new multi-threaded runtime.
///
/// Blocks until `shutdown` is set. Errors only if the runtime cannot be
/// built or the listen address cannot be bound.
pub fn run(config: &Config, shutdown: Arc<AtomicBool>) -> Result<(), Box<dyn std::error::Error>> {
    let proxy = Proxy::from_config(config)?.with_shutdown(shutdown);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.threads())
        .enable_all()
        .build()?;

    info!(
        backends = config.backend.servers.len(),
        selector = ?config.selector.kind,
        threads = config.threads(),
        "starting proxy"
    );
    runtime.block_on(proxy.listen_and_serve(config.proxy.listen))?;

    info!("Proxy shutdown complete");
    Ok(())
}
