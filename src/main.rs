//! Duplex Gateway binary entry point.
//!
//! Serves a small demo site: a hello page, JSON counters, a WebSocket echo
//! and a broadcast chat room.

use clap::Parser;
use duplex_gateway::config::ConfigLoader;
use duplex_gateway::http::{HttpHeaders, HttpReply, Request, Response};
use duplex_gateway::registry::{ClientHandle, ClientRegistry};
use duplex_gateway::server::{Server, ServerStats};
use duplex_gateway::websocket::Message;
use duplex_gateway::{Admission, BoxError, SocketView};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "duplex-gateway", version, about = "HTTP and WebSocket demo server")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(short, long)]
    address: Option<String>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

/// Sends every message straight back.
struct Echo;

impl SocketView for Echo {
    fn on_message(
        &self,
        client: &ClientHandle,
        message: Message,
        _registry: &ClientRegistry,
    ) -> Result<(), BoxError> {
        match message {
            Message::Text(text) => client.send_text(&text)?,
            Message::Binary(data) => client.send_text(&format!("{} bytes", data.len()))?,
        }
        Ok(())
    }
}

/// Relays text to everyone else on the route.
struct Chat;

impl SocketView for Chat {
    fn on_connect(
        &self,
        client: &ClientHandle,
        head: &HttpHeaders,
        registry: &ClientRegistry,
    ) -> Result<Admission, BoxError> {
        let name = head
            .query()
            .and_then(|q| q.strip_prefix("name="))
            .filter(|n| !n.is_empty())
            .map_or_else(|| format!("guest-{}", client.id()), str::to_string);
        registry.broadcast(&format!("* {name} joined"));
        Ok(Admission::Accept(serde_json::json!({ "name": name })))
    }

    fn on_message(
        &self,
        client: &ClientHandle,
        message: Message,
        registry: &ClientRegistry,
    ) -> Result<(), BoxError> {
        let Some(text) = message.as_text() else {
            return Ok(());
        };
        let name = display_name(client, registry);
        registry.broadcast_except(client.id(), &format!("{name}: {text}"));
        Ok(())
    }

    fn on_exit(&self, client: &ClientHandle, registry: &ClientRegistry) -> Result<(), BoxError> {
        registry.broadcast(&format!("* client {} left", client.id()));
        Ok(())
    }
}

fn display_name(client: &ClientHandle, registry: &ClientRegistry) -> String {
    registry
        .state(client.id())
        .and_then(|state| state.get("name").and_then(|n| n.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("guest-{}", client.id()))
}

fn hello(request: &Request) -> Result<HttpReply, BoxError> {
    let body = format!(
        "<h1>duplex-gateway</h1><p>Hello {}. WebSocket routes: /echo, /chat</p>",
        request.peer_addr()
    );
    Ok(Response::ok()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(body)
        .build()
        .into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duplex_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!("duplex-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::with_defaults()
        .address(args.address)
        .port(args.port)
        .load(args.config.as_deref())?;

    tracing::info!(
        address = %config.listener.authority(),
        receive_size = config.limits.receive_size,
        max_message_size = config.limits.max_message_size,
        "Configuration loaded"
    );

    let stats = Arc::new(ServerStats::new());
    let stats_view = Arc::clone(&stats);
    let server = Server::builder()
        .config(config)
        .stats(stats)
        .http("/", hello)
        .http("/stats", move |_: &Request| -> Result<HttpReply, BoxError> {
            let body = serde_json::to_vec(&stats_view.snapshot())?;
            Ok(Response::ok()
                .header("Content-Type", "application/json")
                .body(body)
                .build()
                .into())
        })
        .websocket("/echo", Echo)
        .websocket("/chat", Chat)
        .bind()
        .await?;

    let shutdown = server.shutdown_handle();
    let running = server.spawn();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.shutdown();
    running.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
