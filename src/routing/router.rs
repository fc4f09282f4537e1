//! Path routing for HTTP and WebSocket endpoints.

use super::error::{RoutingError, RoutingResult};
use super::pattern::PathPattern;
use crate::registry::ClientRegistry;
use crate::view::{HttpView, SocketView};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A WebSocket endpoint and the registry of clients connected to it.
pub struct SocketRoute {
    path: Arc<str>,
    view: Arc<dyn SocketView>,
    registry: Arc<ClientRegistry>,
}

impl SocketRoute {
    fn new(path: &str, view: Arc<dyn SocketView>) -> Self {
        Self {
            path: Arc::from(path),
            view,
            registry: Arc::new(ClientRegistry::new(path)),
        }
    }

    /// Route path.
    #[must_use]
    pub fn path(&self) -> &Arc<str> {
        &self.path
    }

    /// Application hooks.
    #[must_use]
    pub fn view(&self) -> &Arc<dyn SocketView> {
        &self.view
    }

    /// Connected clients.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }
}

impl fmt::Debug for SocketRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketRoute")
            .field("path", &self.path)
            .field("clients", &self.registry.len())
            .finish()
    }
}

/// What a route dispatches to.
#[derive(Clone)]
pub enum Endpoint {
    /// Single-request HTTP view.
    Http(Arc<dyn HttpView>),
    /// WebSocket view with its client registry.
    WebSocket(Arc<SocketRoute>),
}

impl Endpoint {
    fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::WebSocket(_) => "websocket",
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(_) => f.write_str("Endpoint::Http"),
            Self::WebSocket(route) => f.debug_tuple("Endpoint::WebSocket").field(route).finish(),
        }
    }
}

/// A pattern and its endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: PathPattern,
    endpoint: Endpoint,
}

impl Route {
    /// The route's pattern.
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// The route's endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Ordered route table.
///
/// HTTP routes match the whole path, first registered wins. WebSocket routes
/// match by exact path.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_duplicate(&self, kind: &'static str, pattern: &str) -> RoutingResult<()> {
        let taken = self
            .routes
            .iter()
            .any(|r| r.endpoint.kind() == kind && r.pattern.as_str() == pattern);
        if taken {
            return Err(RoutingError::DuplicateRoute {
                kind,
                pattern: pattern.to_string(),
            });
        }
        Ok(())
    }

    /// Register an HTTP view.
    pub fn add_http(&mut self, pattern: &str, view: Arc<dyn HttpView>) -> RoutingResult<()> {
        self.check_duplicate("http", pattern)?;
        let pattern = PathPattern::compile(pattern)?;
        self.routes.push(Route {
            pattern,
            endpoint: Endpoint::Http(view),
        });
        Ok(())
    }

    /// Register a WebSocket view, returning the route's client registry.
    pub fn add_websocket(
        &mut self,
        path: &str,
        view: Arc<dyn SocketView>,
    ) -> RoutingResult<Arc<ClientRegistry>> {
        if path.is_empty() {
            return Err(RoutingError::EmptyPattern);
        }
        self.check_duplicate("websocket", path)?;
        let route = Arc::new(SocketRoute::new(path, view));
        let registry = route.registry.clone();
        self.routes.push(Route {
            pattern: PathPattern::Exact(path.to_string()),
            endpoint: Endpoint::WebSocket(route),
        });
        Ok(registry)
    }

    /// All routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Whether no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first HTTP view whose pattern matches all of `path`.
    #[must_use]
    pub fn resolve_http(&self, path: &str) -> Option<&Arc<dyn HttpView>> {
        let found = self.routes.iter().find_map(|route| match &route.endpoint {
            Endpoint::Http(view) if route.pattern.matches(path) => {
                Some((route.pattern.as_str(), view))
            },
            _ => None,
        });
        match found {
            Some((pattern, view)) => {
                debug!(route = pattern, path = path, "Route matched");
                Some(view)
            },
            None => None,
        }
    }

    /// Find the WebSocket route registered for exactly `path`.
    #[must_use]
    pub fn resolve_websocket(&self, path: &str) -> Option<&Arc<SocketRoute>> {
        self.routes.iter().find_map(|route| match &route.endpoint {
            Endpoint::WebSocket(socket) if &*socket.path == path => Some(socket),
            _ => None,
        })
    }

    /// Client registry of the WebSocket route at `path`.
    #[must_use]
    pub fn registry(&self, path: &str) -> Option<Arc<ClientRegistry>> {
        self.resolve_websocket(path).map(|r| r.registry.clone())
    }

    /// Number of HTTP and WebSocket routes.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let http = self
            .routes
            .iter()
            .filter(|r| matches!(r.endpoint, Endpoint::Http(_)))
            .count();
        (http, self.routes.len() - http)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpHeaders, HttpReply, Request, Response};
    use crate::registry::ClientHandle;
    use crate::view::BoxError;
    use crate::websocket::Message;
    use bytes::Bytes;

    struct Tagged(&'static str);

    impl HttpView for Tagged {
        fn call(&self, _request: &Request) -> Result<HttpReply, BoxError> {
            Ok(Response::ok().body(self.0).build().into())
        }
    }

    struct Silent;

    impl SocketView for Silent {
        fn on_message(
            &self,
            _client: &ClientHandle,
            _message: Message,
            _registry: &ClientRegistry,
        ) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn request(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        let (head, _) = HttpHeaders::parse(raw.as_bytes()).unwrap().unwrap();
        Request::new(head, Bytes::new(), "127.0.0.1:1".parse().unwrap())
    }

    fn resolved_tag(router: &Router, path: &str) -> Option<String> {
        let view = router.resolve_http(path)?;
        let request = request(path);
        match view.call(&request).ok()? {
            HttpReply::Response(resp) => Some(String::from_utf8_lossy(resp.body()).into_owned()),
            HttpReply::File(_) => None,
        }
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = Router::new();
        router.add_http("/a", Arc::new(Tagged("A"))).unwrap();
        router.add_http("/a/b", Arc::new(Tagged("AB"))).unwrap();
        router.add_http("/a.*", Arc::new(Tagged("A*"))).unwrap();

        assert_eq!(resolved_tag(&router, "/a").as_deref(), Some("A"));
        assert_eq!(resolved_tag(&router, "/a/b").as_deref(), Some("AB"));
        assert_eq!(resolved_tag(&router, "/a/c").as_deref(), Some("A*"));
        assert!(router.resolve_http("/b").is_none());
    }

    #[test]
    fn test_regex_registered_first_shadows_literal() {
        let mut router = Router::new();
        router.add_http("/a.*", Arc::new(Tagged("A*"))).unwrap();
        router.add_http("/a/b", Arc::new(Tagged("AB"))).unwrap();

        assert_eq!(resolved_tag(&router, "/a/b").as_deref(), Some("A*"));
    }

    #[test]
    fn test_websocket_exact_match_only() {
        let mut router = Router::new();
        router.add_websocket("/chat", Arc::new(Silent)).unwrap();

        assert!(router.resolve_websocket("/chat").is_some());
        assert!(router.resolve_websocket("/chat/room").is_none());
        assert!(router.resolve_http("/chat").is_none());
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let mut router = Router::new();
        router.add_http("/live", Arc::new(Tagged("page"))).unwrap();
        router.add_websocket("/live", Arc::new(Silent)).unwrap();

        assert!(router.resolve_http("/live").is_some());
        assert!(router.resolve_websocket("/live").is_some());
        assert_eq!(router.counts(), (1, 1));
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut router = Router::new();
        router.add_http("/x", Arc::new(Tagged("1"))).unwrap();
        assert!(matches!(
            router.add_http("/x", Arc::new(Tagged("2"))),
            Err(RoutingError::DuplicateRoute { kind: "http", .. })
        ));

        router.add_websocket("/ws", Arc::new(Silent)).unwrap();
        assert!(matches!(
            router.add_websocket("/ws", Arc::new(Silent)),
            Err(RoutingError::DuplicateRoute {
                kind: "websocket",
                ..
            })
        ));
    }

    #[test]
    fn test_registry_per_route() {
        let mut router = Router::new();
        let chat = router.add_websocket("/chat", Arc::new(Silent)).unwrap();
        router.add_websocket("/feed", Arc::new(Silent)).unwrap();

        let looked_up = router.registry("/chat").unwrap();
        assert!(Arc::ptr_eq(&chat, &looked_up));
        assert_eq!(router.registry("/feed").unwrap().path(), "/feed");
        assert!(router.registry("/none").is_none());
    }
}
