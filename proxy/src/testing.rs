//! In-process memcached stand-in for unit tests.

use crate::backend::BackendAddr;
use crate::codec::{read_message, write_message};
use bytes::Bytes;
use parking_lot::Mutex;
use protocol_memcache::binary::{Message, Opcode, status};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Store = Arc<Mutex<HashMap<Bytes, Bytes>>>;

/// Answers GET, SET and NOOP over the binary protocol. Every other opcode
/// gets an empty success response.
pub(crate) struct MockBackend {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    stop: watch::Sender<bool>,
    acceptor: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (stop, _) = watch::channel(false);
        let store = Store::default();

        let acceptor = tokio::spawn({
            let accepted = accepted.clone();
            let stopped = stop.subscribe();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(handle(stream, store.clone(), stopped.clone()));
                }
            }
        });

        Self {
            addr,
            accepted,
            stop,
            acceptor,
        }
    }

    pub fn addr(&self) -> BackendAddr {
        BackendAddr::Tcp(self.addr)
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stop listening and hang up on every open connection.
    pub fn shutdown(&self) {
        self.acceptor.abort();
        self.stop.send_replace(true);
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn handle(mut stream: TcpStream, store: Store, mut stop: watch::Receiver<bool>) {
    loop {
        let request = tokio::select! {
            request = read_message(&mut stream) => match request {
                Ok(request) => request,
                Err(_) => return,
            },
            _ = stop.changed() => return,
        };

        if write_message(&mut stream, &respond(&store, &request))
            .await
            .is_err()
        {
            return;
        }
    }
}

fn respond(store: &Store, request: &Message) -> Message {
    match Opcode::from_u8(request.header.opcode) {
        Some(Opcode::Set) => {
            store
                .lock()
                .insert(request.key.clone(), request.value.clone());
            Message::response_to(request, status::NO_ERROR)
        }
        Some(Opcode::Get) => match store.lock().get(&request.key) {
            Some(value) => Message::response_to(request, status::NO_ERROR)
                .with_extras(Bytes::from_static(&[0; 4]))
                .with_value(value.clone()),
            None => Message::response_to(request, status::KEY_NOT_FOUND)
                .with_value(Bytes::from_static(b"Not found")),
        },
        _ => Message::response_to(request, status::NO_ERROR),
    }
}
