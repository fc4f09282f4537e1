//! Server-wide counters.

use http::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by every connection task.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Total connections accepted.
    connections_total: AtomicU64,
    /// Currently active connections.
    connections_active: AtomicU64,
    /// HTTP requests dispatched to a view or answered with 404.
    http_requests: AtomicU64,
    /// 2xx/3xx responses.
    responses_ok: AtomicU64,
    /// 4xx responses.
    responses_client_error: AtomicU64,
    /// 5xx responses.
    responses_server_error: AtomicU64,
    /// Completed WebSocket upgrades.
    upgrades_success: AtomicU64,
    /// Refused or failed WebSocket upgrades.
    upgrades_failed: AtomicU64,
    /// Open WebSocket sessions.
    websockets_active: AtomicU64,
    /// WebSocket messages received.
    messages_received: AtomicU64,
    /// WebSocket frames sent.
    messages_sent: AtomicU64,
    /// Payload and body bytes received.
    bytes_received: AtomicU64,
    /// Bytes written to sockets.
    bytes_sent: AtomicU64,
}

impl ServerStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn http_request(&self, body_len: usize) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(body_len as u64, Ordering::Relaxed);
    }

    pub(crate) fn response_sent(&self, status: StatusCode, bytes: u64) {
        let counter = if status.is_server_error() {
            &self.responses_server_error
        } else if status.is_client_error() {
            &self.responses_client_error
        } else {
            &self.responses_ok
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn upgrade_success(&self) {
        self.upgrades_success.fetch_add(1, Ordering::Relaxed);
        self.websockets_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn upgrade_failed(&self) {
        self.upgrades_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn websocket_closed(&self) {
        self.websockets_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn message_received(&self, size: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn message_sent(&self, size: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Currently active connections.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            http_requests: self.http_requests.load(Ordering::Relaxed),
            responses_ok: self.responses_ok.load(Ordering::Relaxed),
            responses_client_error: self.responses_client_error.load(Ordering::Relaxed),
            responses_server_error: self.responses_server_error.load(Ordering::Relaxed),
            upgrades_success: self.upgrades_success.load(Ordering::Relaxed),
            upgrades_failed: self.upgrades_failed.load(Ordering::Relaxed),
            websockets_active: self.websockets_active.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Total connections accepted.
    pub connections_total: u64,
    /// Currently active connections.
    pub connections_active: u64,
    /// HTTP requests served.
    pub http_requests: u64,
    /// 2xx/3xx responses.
    pub responses_ok: u64,
    /// 4xx responses.
    pub responses_client_error: u64,
    /// 5xx responses.
    pub responses_server_error: u64,
    /// Completed WebSocket upgrades.
    pub upgrades_success: u64,
    /// Refused or failed WebSocket upgrades.
    pub upgrades_failed: u64,
    /// Open WebSocket sessions.
    pub websockets_active: u64,
    /// WebSocket messages received.
    pub messages_received: u64,
    /// WebSocket frames sent.
    pub messages_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_counters() {
        let stats = ServerStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.connections_total, 2);
        assert_eq!(snap.connections_active, 1);
    }

    #[test]
    fn test_response_classes() {
        let stats = ServerStats::new();
        stats.response_sent(StatusCode::OK, 10);
        stats.response_sent(StatusCode::NOT_FOUND, 20);
        stats.response_sent(StatusCode::INTERNAL_SERVER_ERROR, 30);

        let snap = stats.snapshot();
        assert_eq!(snap.responses_ok, 1);
        assert_eq!(snap.responses_client_error, 1);
        assert_eq!(snap.responses_server_error, 1);
        assert_eq!(snap.bytes_sent, 60);
    }

    #[test]
    fn test_websocket_counters() {
        let stats = ServerStats::new();
        stats.upgrade_success();
        stats.upgrade_failed();
        stats.message_received(5);
        stats.message_sent(7);
        stats.websocket_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.upgrades_success, 1);
        assert_eq!(snap.upgrades_failed, 1);
        assert_eq!(snap.websockets_active, 0);
        assert_eq!(snap.bytes_received, 5);
        assert_eq!(snap.bytes_sent, 7);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(ServerStats::new().snapshot()).unwrap();
        assert_eq!(json["connections_total"], 0);
    }
}
