//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or saving a [`super::ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read '{path}': {source}")]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("cannot write '{path}': {source}")]
    Write {
        /// Destination file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML or a field of the wrong type.
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// One or more validators reported an error.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// The configuration could not be rendered as TOML.
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
