//! Builds a [`ServerConfig`] from an optional TOML file plus overrides.

use super::error::{ConfigError, ConfigResult};
use super::types::ServerConfig;
use super::validation::{LimitsValidator, PolicyValidator, Report, Validator};
use std::path::Path;
use tracing::{debug, warn};

/// Loads, overrides and validates server configuration.
///
/// File values win over defaults, and overrides win over the file.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    validators: Vec<Box<dyn Validator>>,
    address: Option<String>,
    port: Option<u16>,
}

impl ConfigLoader {
    /// Loader without validators or overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader running the built-in limit and policy checks.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with_validator(LimitsValidator)
            .with_validator(PolicyValidator)
    }

    /// Run `validator` on every loaded configuration.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Replace `listener.address` after loading.
    #[must_use]
    pub fn address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    /// Replace `listener.port` after loading.
    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Load `path`, or start from defaults when no file is given.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed, or when a validator
    /// reports an error.
    pub fn load(&self, path: Option<&Path>) -> ConfigResult<ServerConfig> {
        let config = match path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                debug!(path = %path.display(), "Configuration file read");
                toml::from_str(&content)?
            },
            None => ServerConfig::default(),
        };
        self.finish(config)
    }

    /// Load configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or when a validator reports an error.
    pub fn load_str(&self, content: &str) -> ConfigResult<ServerConfig> {
        self.finish(toml::from_str(content)?)
    }

    fn finish(&self, mut config: ServerConfig) -> ConfigResult<ServerConfig> {
        if let Some(address) = &self.address {
            config.listener.address.clone_from(address);
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        self.check(&config)?;
        Ok(config)
    }

    /// Run every validator, logging warnings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing every error finding.
    pub fn check(&self, config: &ServerConfig) -> ConfigResult<Report> {
        let mut report = Report::new();
        for validator in &self.validators {
            validator.check(config, &mut report);
        }

        for finding in report.warnings() {
            warn!(field = finding.field, "{}", finding.message);
        }
        if report.has_errors() {
            return Err(ConfigError::Invalid(
                report.errors().map(ToString::to_string).collect(),
            ));
        }
        Ok(report)
    }

    /// Write `config` to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Fails if serialization or writing fails.
    pub fn save(config: &ServerConfig, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(config)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let config = ConfigLoader::with_defaults().load(None).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
            [security]
            frame_options = "DENY"
            "#,
        )
        .unwrap();

        let config = ConfigLoader::with_defaults().load(Some(&path)).unwrap();
        assert_eq!(config.security.frame_options, "DENY");
        assert_eq!(config.listener.port, 8000);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let config = ConfigLoader::new()
            .address(Some("0.0.0.0".to_string()))
            .port(Some(9100))
            .load_str(
                r#"
                [listener]
                address = "10.0.0.1"
                port = 8081
                "#,
            )
            .unwrap();
        assert_eq!(config.listener.authority(), "0.0.0.0:9100");
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new().load(Some(Path::new("/nonexistent/server.toml")));
        match result {
            Err(ConfigError::Read { source, .. }) => assert_eq!(source.kind(), ErrorKind::NotFound),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed() {
        let result = ConfigLoader::new().load_str("[listener\nport = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_errors_collected() {
        let result = ConfigLoader::with_defaults().load_str(
            r#"
            [limits]
            receive_size = 0
            max_message_size = 0
            "#,
        );
        match result {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].starts_with("limits.receive_size"));
            },
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_override_is_validated() {
        let result = ConfigLoader::with_defaults()
            .address(Some(String::new()))
            .load(None);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = ServerConfig::default();
        config.listener.port = 9100;
        config.security.cors_allowed_origins = vec!["http://app.local".to_string()];
        ConfigLoader::save(&config, &path).unwrap();

        let loaded = ConfigLoader::with_defaults().load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }
}
