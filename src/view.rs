//! Application hooks called by the server.
//!
//! Views run on the connection's task. Errors and panics they raise are
//! contained to that connection.

use crate::http::{HttpHeaders, HttpReply, Request};
use crate::registry::{ClientHandle, ClientRegistry};
use crate::websocket::Message;
use serde_json::Value;

/// Error type views may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Handles one HTTP request.
pub trait HttpView: Send + Sync + 'static {
    /// Produce the reply for `request`. An error becomes a 500 page.
    fn call(&self, request: &Request) -> Result<HttpReply, BoxError>;
}

impl<F> HttpView for F
where
    F: Fn(&Request) -> Result<HttpReply, BoxError> + Send + Sync + 'static,
{
    fn call(&self, request: &Request) -> Result<HttpReply, BoxError> {
        self(request)
    }
}

/// Outcome of [`SocketView::on_connect`].
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Complete the handshake and store this state for the client.
    Accept(Value),
    /// Close the connection without answering.
    Reject,
}

impl Admission {
    /// Accept with no state.
    #[must_use]
    pub fn accept() -> Self {
        Self::Accept(Value::Null)
    }
}

/// Handles the lifecycle of WebSocket clients on one route.
pub trait SocketView: Send + Sync + 'static {
    /// Called before the 101 response is written.
    fn on_connect(
        &self,
        _client: &ClientHandle,
        _head: &HttpHeaders,
        _registry: &ClientRegistry,
    ) -> Result<Admission, BoxError> {
        Ok(Admission::accept())
    }

    /// Called for every text or binary message, in arrival order.
    ///
    /// An error is logged and the connection stays open.
    fn on_message(
        &self,
        client: &ClientHandle,
        message: Message,
        registry: &ClientRegistry,
    ) -> Result<(), BoxError>;

    /// Called once after the client has been removed from `registry`.
    fn on_exit(&self, _client: &ClientHandle, _registry: &ClientRegistry) -> Result<(), BoxError> {
        Ok(())
    }

    /// Largest message payload accepted on this route, overriding the
    /// server-wide limit.
    fn max_message_size(&self) -> Option<usize> {
        None
    }
}
