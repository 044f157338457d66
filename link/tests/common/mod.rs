#![allow(dead_code)]
//! Shared helpers for kalam-notify integration tests.
//!
//! Each test starts its own WebSocket server on `127.0.0.1:0`, so tests run
//! in parallel and need nothing external.

use futures_util::future::BoxFuture;
use kalam_notify::{ConnectionState, NotificationSubscription, StreamMessage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::WebSocketStream;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type ServerSocket = WebSocketStream<TcpStream>;

type Handler = Arc<dyn Fn(usize, ServerSocket) -> BoxFuture<'static, ()> + Send + Sync>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Local WebSocket server. The handler runs once per accepted connection
/// and receives the zero-based connection index.
pub struct TestServer {
    pub base_url: String,
    uris: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(usize, ServerSocket) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let uris = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let handler: Handler = Arc::new(handler);

        let accept_task = tokio::spawn({
            let uris = uris.clone();
            let connections = connections.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let uris = uris.clone();
                    let index = connections.fetch_add(1, Ordering::SeqCst);
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let record_uri = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                            uris.lock().unwrap().push(req.uri().to_string());
                            Ok(resp)
                        };
                        if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, record_uri).await {
                            handler(index, ws).await;
                        }
                    });
                }
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            uris,
            connections,
            accept_task,
        }
    }

    /// Request URIs (path and query) of every handshake so far.
    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Message callback that forwards into a channel.
pub fn forwarding_callback() -> (
    impl Fn(StreamMessage) -> kalam_notify::CallbackResult + Send + Sync + 'static,
    mpsc::UnboundedReceiver<StreamMessage>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |message: StreamMessage| -> kalam_notify::CallbackResult {
        let _ = tx.send(message);
        Ok(())
    };
    (callback, rx)
}

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<StreamMessage>) -> StreamMessage {
    tokio::time::timeout(TEST_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("message channel closed")
}

pub async fn wait_for_state(sub: &NotificationSubscription, target: ConnectionState) {
    let mut rx = sub.watch_state();
    tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(|s| *s == target))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {}", target))
        .expect("state channel closed");
}
