//! Per-connection protocol driver.
//!
//! A connection reads one request head, decides between HTTP and WebSocket
//! from its `Upgrade` header, and then either serves exactly one HTTP
//! request or runs a WebSocket session until the peer goes away.

use super::error::ServerResult;
use super::state::{Connection, ConnectionState, Protocol};
use super::stats::ServerStats;
use crate::buffered::BufferedReader;
use crate::config::ServerConfig;
use crate::http::{
    HttpError, HttpHeaders, HttpMessageReader, HttpReply, Request, Response, ResponsePolicy,
};
use crate::registry::{ClientHandle, Outbound};
use crate::routing::{Router, SocketRoute};
use crate::view::{Admission, BoxError};
use crate::websocket::{
    is_websocket_upgrade, FrameCodec, Handshake, Message, OpCode, WebSocketError,
};
use http::StatusCode;
use std::any::Any;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

/// How long to keep draining input after an HTTP response.
const LINGER_TIMEOUT: Duration = Duration::from_millis(500);

/// Most bytes drained after an HTTP response.
const LINGER_MAX_BYTES: usize = 64 * 1024;

/// State shared by every connection of one server.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) router: Router,
    pub(crate) config: ServerConfig,
    pub(crate) stats: Arc<ServerStats>,
    pub(crate) policy: ResponsePolicy,
    pub(crate) http_reader: HttpMessageReader,
}

impl Shared {
    pub(crate) fn new(router: Router, config: ServerConfig, stats: Arc<ServerStats>) -> Self {
        let policy = ResponsePolicy::new(
            config.security.cors_allowed_origins.clone(),
            Some(config.security.frame_options.clone()),
        );
        let http_reader =
            HttpMessageReader::new(config.limits.max_header_size, config.limits.max_body_size);
        Self {
            router,
            config,
            stats,
            policy,
            http_reader,
        }
    }
}

/// A view that returned an error or panicked.
#[derive(Debug)]
enum ViewFailure {
    Error(BoxError),
    Panic(String),
}

impl fmt::Display for ViewFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Run a view hook, turning panics into errors.
fn guard<T>(hook: impl FnOnce() -> Result<T, BoxError>) -> Result<T, ViewFailure> {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ViewFailure::Error(e)),
        Err(payload) => Err(ViewFailure::Panic(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Drives a single accepted connection to completion.
#[derive(Debug)]
pub struct ConnectionHandler {
    conn: Connection,
    shared: Arc<Shared>,
}

impl ConnectionHandler {
    pub(crate) fn new(peer_addr: SocketAddr, shared: Arc<Shared>) -> Self {
        Self {
            conn: Connection::new(peer_addr),
            shared,
        }
    }

    /// Connection bookkeeping.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Serve `stream` until the connection closes.
    ///
    /// Errors are logged and never escape the connection.
    pub async fn run<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let stats = Arc::clone(&self.shared.stats);
        let (id, peer) = (self.conn.id(), self.conn.peer_addr());
        stats.connection_opened();
        trace!(conn_id = id, peer = %peer, "Connection accepted");

        if let Err(e) = self.drive(stream).await {
            debug!(conn_id = id, peer = %peer, error = %e, "Connection ended with error");
        }

        self.conn.close();
        stats.connection_closed();
        trace!(conn_id = id, peer = %peer, "Connection closed");
    }

    async fn drive<S>(&mut self, stream: S) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let (id, peer) = (self.conn.id(), self.conn.peer_addr());
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufferedReader::new(read_half, shared.config.limits.receive_size);

        self.conn.transition(ConnectionState::Classifying)?;
        let read = timeout(
            shared.config.timeouts.classify,
            shared.http_reader.read_head(&mut reader),
        )
        .await;

        let head = match read {
            Ok(Ok(head)) => head,
            Ok(Err(HttpError::ConnectionClosed)) => {
                trace!(conn_id = id, "Peer closed before sending a request");
                return Ok(());
            },
            Ok(Err(e)) if e.is_client_error() => {
                warn!(conn_id = id, peer = %peer, error = %e, "Malformed request head");
                self.write_response(&mut write_half, Response::error(e.status_code()), None)
                    .await?;
                finish_http(&mut reader, &mut write_half).await;
                return Ok(());
            },
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                debug!(conn_id = id, peer = %peer, "Timed out waiting for request head");
                return Ok(());
            },
        };

        if is_websocket_upgrade(&head) {
            self.conn.classify(Protocol::WebSocket)?;
            self.conn.transition(ConnectionState::WsHandshaking)?;
            self.serve_websocket(head, reader, write_half).await
        } else {
            self.conn.classify(Protocol::Http)?;
            self.conn.transition(ConnectionState::HttpActive)?;
            let served = self.serve_http(head, &mut reader, &mut write_half).await;
            finish_http(&mut reader, &mut write_half).await;
            served
        }
    }

    async fn serve_http<R, W>(
        &mut self,
        head: HttpHeaders,
        reader: &mut BufferedReader<R>,
        writer: &mut W,
    ) -> ServerResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let shared = Arc::clone(&self.shared);
        let (id, peer) = (self.conn.id(), self.conn.peer_addr());
        let origin = head.origin().map(str::to_string);

        let Some(view) = shared.router.resolve_http(head.path()) else {
            debug!(conn_id = id, method = %head.method(), path = head.path(), "No route matched");
            shared.stats.http_request(0);
            let page = shared.config.pages.render_not_found(head.path());
            self.write_response(
                writer,
                Response::html(StatusCode::NOT_FOUND, page),
                origin.as_deref(),
            )
            .await?;
            return self.conn.transition(ConnectionState::HttpDone);
        };

        let read = timeout(
            shared.config.timeouts.body,
            shared.http_reader.read_body(reader, &head),
        )
        .await;

        let body = match read {
            Ok(Ok(body)) => body,
            Ok(Err(HttpError::ConnectionClosed)) => {
                debug!(conn_id = id, path = head.path(), "Peer closed before body was complete");
                return Ok(());
            },
            Ok(Err(e)) if e.is_client_error() => {
                warn!(conn_id = id, peer = %peer, path = head.path(), error = %e, "Rejected request body");
                self.write_response(writer, Response::error(e.status_code()), origin.as_deref())
                    .await?;
                return self.conn.transition(ConnectionState::HttpDone);
            },
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                debug!(conn_id = id, path = head.path(), "Timed out waiting for request body");
                return Ok(());
            },
        };

        shared.stats.http_request(body.len());
        let request = Request::new(head, body, peer);
        debug!(
            conn_id = id,
            peer = %peer,
            method = %request.method(),
            path = request.path(),
            "Dispatching request"
        );

        let reply = match guard(|| view.call(&request)) {
            Ok(reply) => reply,
            Err(failure) => {
                error!(conn_id = id, path = request.path(), error = %failure, "HTTP view failed");
                Response::html(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    shared.config.pages.internal_error.clone(),
                )
                .into()
            },
        };

        self.write_reply(writer, reply, &request).await?;
        self.conn.transition(ConnectionState::HttpDone)
    }

    async fn write_reply<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        reply: HttpReply,
        request: &Request,
    ) -> ServerResult<()> {
        let shared = &self.shared;
        let origin = request.header("origin");

        let response = match reply {
            HttpReply::Response(response) => response,
            HttpReply::File(mut file) => match file.open().await {
                Ok((handle, len)) => {
                    for (name, value) in shared.policy.headers(origin) {
                        file.set_header(name, value);
                    }
                    let chunk_size = shared.config.limits.receive_size;
                    let written = file.send(handle, len, writer, chunk_size).await?;
                    shared.stats.response_sent(file.status_code(), written);
                    debug!(
                        conn_id = self.conn.id(),
                        file = %file.path().display(),
                        bytes = written,
                        "File sent"
                    );
                    return Ok(());
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(file = %file.path().display(), "File to send does not exist");
                    Response::html(
                        StatusCode::NOT_FOUND,
                        shared.config.pages.render_not_found(request.path()),
                    )
                },
                Err(e) => {
                    error!(file = %file.path().display(), error = %e, "Failed to open file");
                    Response::html(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        shared.config.pages.internal_error.clone(),
                    )
                },
            },
        };

        self.write_response(writer, response, origin).await
    }

    async fn write_response<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        mut response: Response,
        origin: Option<&str>,
    ) -> ServerResult<()> {
        for (name, value) in self.shared.policy.headers(origin) {
            response.set_header(name, value);
        }
        let bytes = response.serialize();
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        self.shared
            .stats
            .response_sent(response.status(), bytes.len() as u64);
        debug!(conn_id = self.conn.id(), status = response.status().as_u16(), "Response sent");
        Ok(())
    }

    async fn serve_websocket<R, W>(
        &mut self,
        head: HttpHeaders,
        mut reader: BufferedReader<R>,
        mut writer: W,
    ) -> ServerResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let (id, peer) = (self.conn.id(), self.conn.peer_addr());

        let Some(route) = shared.router.resolve_websocket(head.path()) else {
            debug!(conn_id = id, peer = %peer, path = head.path(), "No WebSocket route, closing");
            shared.stats.upgrade_failed();
            return Ok(());
        };

        let handshake = match Handshake::negotiate(&head, shared.config.security.validate_key) {
            Ok(handshake) => handshake,
            Err(e) => {
                warn!(conn_id = id, peer = %peer, path = head.path(), error = %e, "WebSocket handshake rejected");
                shared.stats.upgrade_failed();
                return Ok(());
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let client = ClientHandle::new(id, peer, Arc::clone(route.path()), tx);
        let view = route.view();
        let registry = route.registry();

        let state = match guard(|| view.on_connect(&client, &head, registry)) {
            Ok(Admission::Accept(state)) => state,
            Ok(Admission::Reject) => {
                info!(conn_id = id, peer = %peer, path = %route.path(), "WebSocket connection refused by view");
                shared.stats.upgrade_failed();
                return Ok(());
            },
            Err(failure) => {
                error!(conn_id = id, path = %route.path(), error = %failure, "WebSocket on_connect failed");
                shared.stats.upgrade_failed();
                return Ok(());
            },
        };

        if let Err(e) = writer.write_all(&handshake.response()).await {
            client.mark_closed();
            shared.stats.upgrade_failed();
            exit_view(route, &client);
            return Err(e.into());
        }

        self.conn.transition(ConnectionState::WsOpen)?;
        shared.stats.upgrade_success();
        registry.insert(client.clone(), state);
        info!(conn_id = id, peer = %peer, path = %route.path(), "WebSocket connection established");

        let writer_task = tokio::spawn(write_outbound(writer, rx, Arc::clone(&shared.stats)));
        let max_payload = view
            .max_message_size()
            .unwrap_or(shared.config.limits.max_message_size);
        let codec = FrameCodec::new(max_payload);

        let outcome = self.message_loop(&codec, &mut reader, route, &client).await;

        registry.remove(id);
        client.mark_closed();
        exit_view(route, &client);
        shared.stats.websocket_closed();
        client.close();
        if let Err(e) = writer_task.await {
            warn!(conn_id = id, error = %e, "WebSocket writer task failed");
        }

        info!(conn_id = id, peer = %peer, path = %route.path(), "WebSocket connection closed");
        outcome
    }

    async fn message_loop<R: AsyncRead + Unpin>(
        &mut self,
        codec: &FrameCodec,
        reader: &mut BufferedReader<R>,
        route: &SocketRoute,
        client: &ClientHandle,
    ) -> ServerResult<()> {
        let id = self.conn.id();
        let stats = Arc::clone(&self.shared.stats);

        loop {
            let frame = match codec.read_frame(reader).await {
                Ok(frame) => frame,
                Err(WebSocketError::ConnectionClosed) => {
                    debug!(conn_id = id, "Peer closed WebSocket stream");
                    return Ok(());
                },
                Err(
                    e @ (WebSocketError::InvalidFrame(_) | WebSocketError::FrameTooLarge { .. }),
                ) => {
                    warn!(conn_id = id, error = %e, "Dropping WebSocket connection");
                    return Ok(());
                },
                Err(e) => return Err(e.into()),
            };

            match frame.opcode {
                OpCode::Close => {
                    debug!(conn_id = id, "Close frame received");
                    return Ok(());
                },
                OpCode::Ping | OpCode::Pong => {
                    trace!(conn_id = id, opcode = ?frame.opcode, "Control frame ignored");
                    continue;
                },
                OpCode::Reserved(code) => {
                    warn!(conn_id = id, opcode = code, "Reserved opcode, closing");
                    return Ok(());
                },
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {},
            }

            stats.message_received(frame.payload.len());
            let message = match Message::from_frame(frame) {
                Ok(message) => message,
                Err(e) => {
                    warn!(conn_id = id, error = %e, "Undeliverable message, closing");
                    return Ok(());
                },
            };

            self.conn.transition(ConnectionState::WsOpen)?;
            trace!(conn_id = id, len = message.len(), "Message received");
            if let Err(failure) =
                guard(|| route.view().on_message(client, message, route.registry()))
            {
                error!(conn_id = id, path = %route.path(), error = %failure, "WebSocket on_message failed");
            }
        }
    }
}

fn exit_view(route: &SocketRoute, client: &ClientHandle) {
    if let Err(failure) = guard(|| route.view().on_exit(client, route.registry())) {
        error!(conn_id = client.id(), path = %route.path(), error = %failure, "WebSocket on_exit failed");
    }
}

/// Single writer for a WebSocket connection's socket.
async fn write_outbound<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    stats: Arc<ServerStats>,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Frame(frame) => {
                if let Err(e) = writer.write_all(&frame).await {
                    debug!(error = %e, "WebSocket write failed");
                    break;
                }
                stats.message_sent(frame.len());
            },
            Outbound::Close => break,
        }
    }
    rx.close();
    let _ = writer.shutdown().await;
}

/// Close the write side, then drain input briefly so unread request bytes
/// do not turn the close into a reset.
async fn finish_http<R, W>(reader: &mut BufferedReader<R>, writer: &mut W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if writer.shutdown().await.is_err() {
        return;
    }
    let drain = async {
        let mut drained = 0usize;
        while drained < LINGER_MAX_BYTES {
            match reader.fill().await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    drained += n;
                    reader.advance(reader.buffered());
                },
            }
        }
    };
    let _ = timeout(LINGER_TIMEOUT, drain).await;
}
