//! # Configuration System
//!
//! TOML-based server configuration with validation. Every section is
//! optional; missing fields take their defaults.
//!
//! ## Example Configuration
//!
//! ```toml
//! [listener]
//! address = "0.0.0.0"
//! port = 8000
//!
//! [limits]
//! receive_size = 1024
//! max_message_size = 1048576
//!
//! [timeouts]
//! classify = "5s"
//! body = "4s"
//!
//! [security]
//! cors_allowed_origins = ["https://app.example.com"]
//! frame_options = "SAMEORIGIN"
//! ```

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{
    LimitsConfig, ListenerConfig, PagesConfig, SecurityConfig, ServerConfig, TimeoutsConfig,
};
pub use validation::{Finding, LimitsValidator, PolicyValidator, Report, Severity, Validator};
