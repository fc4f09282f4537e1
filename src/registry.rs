//! Per-route registries of connected WebSocket clients.
//!
//! A client's own connection task is the only one that inserts or removes
//! its entry. Any task may look entries up or send to them. Sends never
//! touch the socket directly: they queue an encoded frame on the client's
//! outbound channel, which the connection's writer task drains.

use crate::websocket::{FrameCodec, WebSocketError, WebSocketResult};
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

/// Identifier of a connection, unique for the life of the process.
pub type ClientId = u64;

/// Work queued for a connection's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Pre-encoded frame bytes.
    Frame(Bytes),
    /// Flush and shut the write side down.
    Close,
}

/// Cloneable send endpoint for one WebSocket connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    peer: SocketAddr,
    path: Arc<str>,
    tx: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl ClientHandle {
    pub(crate) fn new(
        id: ClientId,
        peer: SocketAddr,
        path: Arc<str>,
        tx: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            id,
            peer,
            path,
            tx,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Connection identifier.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Remote address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Route the client connected on.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the connection is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue a text message for this client.
    ///
    /// # Errors
    ///
    /// Returns [`WebSocketError::NotConnected`] once the connection has closed.
    pub fn send_text(&self, text: &str) -> WebSocketResult<()> {
        self.send_encoded(FrameCodec::encode_text(text))
    }

    pub(crate) fn send_encoded(&self, frame: Bytes) -> WebSocketResult<()> {
        if !self.is_open() {
            return Err(WebSocketError::NotConnected);
        }
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| WebSocketError::NotConnected)
    }

    /// Refuse further sends.
    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Ask the writer task to finish. Frames queued earlier are still written.
    pub(crate) fn close(&self) {
        self.mark_closed();
        let _ = self.tx.send(Outbound::Close);
    }
}

#[derive(Debug)]
struct Entry {
    handle: ClientHandle,
    state: Value,
}

/// Clients currently connected on one WebSocket route, with their state.
#[derive(Debug)]
pub struct ClientRegistry {
    path: String,
    clients: RwLock<HashMap<ClientId, Entry>>,
}

impl ClientRegistry {
    /// Empty registry for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            clients: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ClientId, Entry>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ClientId, Entry>> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route this registry belongs to.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of connected clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no client is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether `id` is connected.
    #[must_use]
    pub fn contains(&self, id: ClientId) -> bool {
        self.read().contains_key(&id)
    }

    /// Handle for a connected client.
    #[must_use]
    pub fn get(&self, id: ClientId) -> Option<ClientHandle> {
        self.read().get(&id).map(|e| e.handle.clone())
    }

    /// Handles of every connected client.
    #[must_use]
    pub fn clients(&self) -> Vec<ClientHandle> {
        self.read().values().map(|e| e.handle.clone()).collect()
    }

    /// State stored for a client when it connected (or last updated).
    #[must_use]
    pub fn state(&self, id: ClientId) -> Option<Value> {
        self.read().get(&id).map(|e| e.state.clone())
    }

    /// Replace the state of the client owning `handle`.
    ///
    /// Returns `false` if the client is no longer registered.
    pub fn update_state(&self, handle: &ClientHandle, state: Value) -> bool {
        match self.write().get_mut(&handle.id()) {
            Some(entry) => {
                entry.state = state;
                true
            },
            None => false,
        }
    }

    /// Send a text message to one client.
    ///
    /// # Errors
    ///
    /// Returns [`WebSocketError::NotConnected`] if the client is gone.
    pub fn send(&self, id: ClientId, text: &str) -> WebSocketResult<()> {
        let handle = self.get(id).ok_or(WebSocketError::NotConnected)?;
        handle.send_text(text)
    }

    /// Send a text message to every client. Returns how many were queued.
    pub fn broadcast(&self, text: &str) -> usize {
        self.broadcast_filtered(text, |_| true)
    }

    /// Send a text message to every client except `skip`.
    pub fn broadcast_except(&self, skip: ClientId, text: &str) -> usize {
        self.broadcast_filtered(text, |id| id != skip)
    }

    fn broadcast_filtered(&self, text: &str, keep: impl Fn(ClientId) -> bool) -> usize {
        let frame = FrameCodec::encode_text(text);
        self.clients()
            .into_iter()
            .filter(|handle| keep(handle.id()))
            .filter(|handle| handle.send_encoded(frame.clone()).is_ok())
            .count()
    }

    pub(crate) fn insert(&self, handle: ClientHandle, state: Value) {
        self.write().insert(handle.id(), Entry { handle, state });
    }

    pub(crate) fn remove(&self, id: ClientId) -> Option<Value> {
        self.write().remove(&id).map(|e| e.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle(id: ClientId) -> (ClientHandle, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        (ClientHandle::new(id, peer, Arc::from("/chat"), tx), rx)
    }

    fn next_frame(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Bytes {
        match rx.try_recv().unwrap() {
            Outbound::Frame(bytes) => bytes,
            Outbound::Close => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_insert_and_state() {
        let registry = ClientRegistry::new("/chat");
        let (client, _rx) = handle(1);
        registry.insert(client.clone(), json!({"name": "ada"}));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(1));
        assert_eq!(registry.state(1), Some(json!({"name": "ada"})));

        assert!(registry.update_state(&client, json!({"name": "grace"})));
        assert_eq!(registry.state(1), Some(json!({"name": "grace"})));
    }

    #[test]
    fn test_send_encodes_text_frame() {
        let registry = ClientRegistry::new("/chat");
        let (client, mut rx) = handle(1);
        registry.insert(client, Value::Null);

        registry.send(1, "hi").unwrap();
        assert_eq!(next_frame(&mut rx).as_ref(), &[0x81, 2, b'h', b'i']);
    }

    #[test]
    fn test_send_after_remove_is_not_connected() {
        let registry = ClientRegistry::new("/chat");
        let (client, _rx) = handle(1);
        registry.insert(client.clone(), Value::Null);

        assert_eq!(registry.remove(1), Some(Value::Null));
        client.close();

        assert!(matches!(
            registry.send(1, "late"),
            Err(WebSocketError::NotConnected)
        ));
        assert!(matches!(
            client.send_text("late"),
            Err(WebSocketError::NotConnected)
        ));
        assert!(!registry.update_state(&client, Value::Bool(true)));
    }

    #[test]
    fn test_send_to_dropped_writer() {
        let (client, rx) = handle(1);
        drop(rx);
        assert!(matches!(
            client.send_text("x"),
            Err(WebSocketError::NotConnected)
        ));
    }

    #[test]
    fn test_broadcast_except() {
        let registry = ClientRegistry::new("/chat");
        let (a, mut rx_a) = handle(1);
        let (b, mut rx_b) = handle(2);
        registry.insert(a, Value::Null);
        registry.insert(b, Value::Null);

        assert_eq!(registry.broadcast_except(1, "yo"), 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(&next_frame(&mut rx_b)[2..], b"yo");

        assert_eq!(registry.broadcast("all"), 2);
    }

    #[test]
    fn test_close_queues_close_marker() {
        let (client, mut rx) = handle(1);
        client.send_text("before").unwrap();
        client.close();

        assert!(matches!(rx.try_recv().unwrap(), Outbound::Frame(_)));
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close));
        assert!(!client.is_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_insert_remove_send() {
        let registry = Arc::new(ClientRegistry::new("/chat"));
        let mut tasks = Vec::new();

        for id in 0..64u64 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (client, mut rx) = handle(id);
                registry.insert(client.clone(), json!(id));
                for _ in 0..50 {
                    registry.broadcast("tick");
                    let _ = registry.send((id + 1) % 64, "peer");
                    tokio::task::yield_now().await;
                }
                registry.remove(id);
                client.close();
                while rx.try_recv().is_ok() {}
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.is_empty());
    }
}
