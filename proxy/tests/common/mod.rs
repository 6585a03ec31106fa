//! Shared helpers for proxy integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use mcproxy::codec::{read_message, write_message};
use protocol_memcache::binary::{Message, Opcode, status};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Get an available port for testing.
pub fn get_available_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Wait until something accepts connections on `addr`.
pub async fn wait_for_server(addr: SocketAddr, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if TcpStream::connect(addr).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// A small memcached: GET, SET and DELETE against a map, success for the
/// rest. Every response carries the backend's name as its CAS value so tests
/// can tell which backend answered.
pub struct Backend {
    pub addr: SocketAddr,
    id: u64,
    accepted: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
    stop: watch::Sender<bool>,
    acceptor: JoinHandle<()>,
}

struct Shared {
    id: u64,
    store: Mutex<HashMap<Bytes, Bytes>>,
    requests: Arc<AtomicUsize>,
}

impl Backend {
    pub async fn start(id: u64) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));
        let (stop, stopped) = watch::channel(false);

        let shared = Arc::new(Shared {
            id,
            store: Mutex::new(HashMap::new()),
            requests: requests.clone(),
        });

        let acceptor = tokio::spawn({
            let accepted = accepted.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(handle(stream, shared.clone(), stopped.clone()));
                }
            }
        });

        Self {
            addr,
            id,
            accepted,
            requests,
            stop,
            acceptor,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Requests answered so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop listening and hang up on every connection.
    pub fn kill(&self) {
        self.acceptor.abort();
        self.stop.send_replace(true);
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.kill();
    }
}

async fn handle(mut stream: TcpStream, shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    loop {
        let request = tokio::select! {
            request = read_message(&mut stream) => match request {
                Ok(request) => request,
                Err(_) => return,
            },
            _ = stop.changed() => return,
        };
        shared.requests.fetch_add(1, Ordering::SeqCst);

        let mut response = respond(&shared, &request);
        response.header.cas = shared.id;
        if write_message(&mut stream, &response).await.is_err() {
            return;
        }
    }
}

fn respond(shared: &Shared, request: &Message) -> Message {
    let mut store = shared.store.lock();
    match Opcode::from_u8(request.header.opcode) {
        Some(Opcode::Set) => {
            store.insert(request.key.clone(), request.value.clone());
            Message::response_to(request, status::NO_ERROR)
        }
        Some(Opcode::Get) => match store.get(&request.key) {
            Some(value) => Message::response_to(request, status::NO_ERROR)
                .with_extras(Bytes::from_static(&[0; 4]))
                .with_value(value.clone()),
            None => Message::response_to(request, status::KEY_NOT_FOUND)
                .with_value(Bytes::from_static(b"Not found")),
        },
        Some(Opcode::Delete) => match store.remove(&request.key) {
            Some(_) => Message::response_to(request, status::NO_ERROR),
            None => Message::response_to(request, status::KEY_NOT_FOUND),
        },
        _ => Message::response_to(request, status::NO_ERROR),
    }
}

/// A SET request with zeroed flags and expiry.
pub fn set(key: &str, value: &str) -> Message {
    Message::request(Opcode::Set)
        .with_extras(Bytes::from_static(&[0; 8]))
        .with_key(Bytes::copy_from_slice(key.as_bytes()))
        .with_value(Bytes::copy_from_slice(value.as_bytes()))
}

pub fn get(key: &str) -> Message {
    Message::request(Opcode::Get).with_key(Bytes::copy_from_slice(key.as_bytes()))
}

/// Send one request and wait for its response.
pub async fn call(stream: &mut TcpStream, request: &Message) -> std::io::Result<Message> {
    write_message(stream, request)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    read_message(stream).await
}
