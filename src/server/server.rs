//! Listener and accept loop.

use super::connection::{ConnectionHandler, Shared};
use super::error::{ServerError, ServerResult};
use super::stats::ServerStats;
use crate::config::ServerConfig;
use crate::http::{HttpReply, Request};
use crate::registry::ClientRegistry;
use crate::routing::{RoutingError, Router};
use crate::view::{BoxError, HttpView, SocketView};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Collects configuration and routes before binding.
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
    router: Router,
    stats: Option<Arc<ServerStats>>,
    error: Option<RoutingError>,
}

impl ServerBuilder {
    /// Use `config` instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Record into `stats` instead of fresh counters.
    #[must_use]
    pub fn stats(mut self, stats: Arc<ServerStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Route paths matching `pattern` to a closure.
    #[must_use]
    pub fn http<F>(self, pattern: &str, view: F) -> Self
    where
        F: Fn(&Request) -> Result<HttpReply, BoxError> + Send + Sync + 'static,
    {
        self.http_view(pattern, view)
    }

    /// Route paths matching `pattern` to `view`.
    #[must_use]
    pub fn http_view<V: HttpView>(mut self, pattern: &str, view: V) -> Self {
        if self.error.is_none() {
            self.error = self.router.add_http(pattern, Arc::new(view)).err();
        }
        self
    }

    /// Serve WebSocket upgrades at exactly `path` with `view`.
    #[must_use]
    pub fn websocket<V: SocketView>(mut self, path: &str, view: V) -> Self {
        if self.error.is_none() {
            self.error = self.router.add_websocket(path, Arc::new(view)).err();
        }
        self
    }

    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Fails on an invalid route, an empty route table, or when the address
    /// cannot be bound.
    pub async fn bind(self) -> ServerResult<Server> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        if self.router.is_empty() {
            return Err(ServerError::NoRoutes);
        }

        let address = self.config.listener.authority();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (http, ws) = self.router.counts();
        info!(
            address = %local_addr,
            http_routes = http,
            websocket_routes = ws,
            "Server listening"
        );

        let stats = self.stats.unwrap_or_default();
        let (shutdown, _) = watch::channel(false);
        Ok(Server {
            listener,
            local_addr,
            shared: Arc::new(Shared::new(self.router, self.config, stats)),
            shutdown: Arc::new(shutdown),
        })
    }
}

/// Stops a running [`Server`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop accepting connections. Open connections run to completion.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// A bound server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Server {
    /// Start building a server.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Client registry of the WebSocket route at `path`.
    #[must_use]
    pub fn registry(&self, path: &str) -> Option<Arc<ClientRegistry>> {
        self.shared.router.registry(path)
    }

    /// Server-wide counters.
    #[must_use]
    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Handle for stopping [`Server::run`].
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    /// Accept connections until shut down, one task per connection.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] on an accept error that cannot be
    /// retried.
    pub async fn run(self) -> ServerResult<()> {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!(peer = %peer_addr, error = %e, "Failed to configure stream");
                            }
                            debug!(peer = %peer_addr, "Accepted connection");
                            let handler = ConnectionHandler::new(peer_addr, Arc::clone(&self.shared));
                            tokio::spawn(handler.run(stream));
                        },
                        Err(e) if is_fatal_accept_error(&e) => {
                            error!(error = %e, "Fatal accept error");
                            return Err(ServerError::Accept(e));
                        },
                        Err(e) => warn!(error = %e, "Transient accept error"),
                    }
                },
                _ = shutdown.changed() => {},
            }
        }

        info!(address = %self.local_addr, "Server stopped accepting connections");
        Ok(())
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<ServerResult<()>> {
        tokio::spawn(self.run())
    }
}

fn is_fatal_accept_error(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        error.kind(),
        ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::NotFound
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn ephemeral() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listener.port = 0;
        config
    }

    fn ok(_: &Request) -> Result<HttpReply, BoxError> {
        Ok(Response::ok().body("ok").build().into())
    }

    #[tokio::test]
    async fn test_no_routes() {
        let result = Server::builder().config(ephemeral()).bind().await;
        assert!(matches!(result, Err(ServerError::NoRoutes)));
    }

    #[tokio::test]
    async fn test_invalid_pattern_reported_at_bind() {
        let result = Server::builder()
            .config(ephemeral())
            .http("/ok", ok)
            .http("/(", ok)
            .bind()
            .await;
        assert!(matches!(
            result,
            Err(ServerError::Routing(RoutingError::InvalidPattern { .. }))
        ));
    }

    #[tokio::test]
    async fn test_serves_and_shuts_down() {
        let server = Server::builder()
            .config(ephemeral())
            .http("/ok", ok)
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let stats = server.stats();
        let task = server.spawn();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /ok HTTP/1.1\r\n\r\n").await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("ok"));

        handle.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(stats.snapshot().connections_total, 1);
    }

    #[test]
    fn test_fatal_accept_errors() {
        use std::io::{Error, ErrorKind};

        assert!(is_fatal_accept_error(&Error::from(ErrorKind::InvalidInput)));
        assert!(!is_fatal_accept_error(&Error::from(
            ErrorKind::ConnectionAborted
        )));
    }
}
