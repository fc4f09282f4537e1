//! Configuration type definitions.

use crate::http::escape_html;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening socket.
    pub listener: ListenerConfig,

    /// Size limits.
    pub limits: LimitsConfig,

    /// Read deadlines.
    pub timeouts: TimeoutsConfig,

    /// Handshake and response header policy.
    pub security: SecurityConfig,

    /// Built-in error pages.
    pub pages: PagesConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Listen address (IP or host name).
    pub address: String,

    /// Listen port. `0` picks a free port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ListenerConfig {
    /// `address:port` as given, for binding and error messages.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Size limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bytes requested per socket read.
    pub receive_size: usize,

    /// Maximum request head size in bytes.
    pub max_header_size: usize,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Maximum WebSocket frame payload in bytes.
    pub max_message_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            receive_size: 1024,
            max_header_size: 8 * 1024,
            max_body_size: 16 * 1024 * 1024,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// Read deadlines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Deadline for receiving the request head.
    #[serde(with = "humantime_serde")]
    pub classify: Duration,

    /// Deadline for receiving an HTTP body.
    #[serde(with = "humantime_serde")]
    pub body: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            classify: Duration::from_secs(5),
            body: Duration::from_secs(4),
        }
    }
}

/// Security settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Require Sec-WebSocket-Key to decode to 16 bytes.
    pub validate_key: bool,

    /// Origins answered with `Access-Control-Allow-Origin`. `*` allows all.
    pub cors_allowed_origins: Vec<String>,

    /// `X-Frame-Options` value. Empty disables the header.
    pub frame_options: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            validate_key: true,
            cors_allowed_origins: Vec::new(),
            frame_options: "SAMEORIGIN".to_string(),
        }
    }
}

/// Bodies of the pages the server answers with on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PagesConfig {
    /// 404 page. `{path}` is replaced by the HTML-escaped request path.
    pub not_found: String,

    /// 500 page.
    pub internal_error: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            not_found: "<b>Page {path} Was not Found (404 Status Code)</b>".to_string(),
            internal_error: "<h1>500 Internal Server Error</h1>".to_string(),
        }
    }
}

impl PagesConfig {
    /// 404 page for `path`.
    #[must_use]
    pub fn render_not_found(&self, path: &str) -> String {
        self.not_found.replace("{path}", &escape_html(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.authority(), "127.0.0.1:8000");
        assert_eq!(config.limits.receive_size, 1024);
        assert_eq!(config.timeouts.classify, Duration::from_secs(5));
        assert_eq!(config.timeouts.body, Duration::from_secs(4));
        assert!(config.security.validate_key);
        assert_eq!(config.security.frame_options, "SAMEORIGIN");
    }

    #[test]
    fn test_toml_deserialize() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            address = "0.0.0.0"
            port = 9000

            [limits]
            max_message_size = 65536

            [timeouts]
            classify = "2s"
            body = "500ms"

            [security]
            cors_allowed_origins = ["*"]
        "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.limits.max_message_size, 65536);
        assert_eq!(config.limits.receive_size, 1024);
        assert_eq!(config.timeouts.body, Duration::from_millis(500));
        assert_eq!(config.security.cors_allowed_origins, vec!["*"]);
    }

    #[test]
    fn test_ipv6_authority() {
        let listener = ListenerConfig {
            address: "::1".to_string(),
            port: 80,
        };
        assert_eq!(listener.authority(), "[::1]:80");
    }

    #[test]
    fn test_render_not_found_escapes() {
        let pages = PagesConfig::default();
        assert_eq!(
            pages.render_not_found("/<x>"),
            "<b>Page /&lt;x&gt; Was not Found (404 Status Code)</b>"
        );
    }
}
