//! Sanity checks run on a loaded [`ServerConfig`].

use super::types::ServerConfig;
use std::fmt;

/// Smallest head limit that still fits a request line and a few headers.
const MIN_HEADER_SIZE: usize = 64;

/// How serious a [`Finding`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The server cannot run with this value.
    Error,
    /// Allowed, but probably not what was meant.
    Warning,
}

/// One problem with one configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Dotted path of the field, e.g. `limits.receive_size`.
    pub field: &'static str,
    /// What is wrong.
    pub message: String,
    /// Error or warning.
    pub severity: Severity,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Findings collected from every validator.
#[derive(Debug, Default)]
pub struct Report {
    findings: Vec<Finding>,
}

impl Report {
    /// Empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.push(field, message.into(), Severity::Error);
    }

    /// Record a warning.
    pub fn warn(&mut self, field: &'static str, message: impl Into<String>) {
        self.push(field, message.into(), Severity::Warning);
    }

    fn push(&mut self, field: &'static str, message: String, severity: Severity) {
        self.findings.push(Finding {
            field,
            message,
            severity,
        });
    }

    /// Whether any finding is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// All findings in the order they were recorded.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Error findings.
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.by_severity(Severity::Error)
    }

    /// Warning findings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.by_severity(Severity::Warning)
    }

    fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }
}

/// A check over the whole server configuration.
pub trait Validator: fmt::Debug + Send + Sync {
    /// Record problems with `config` in `report`.
    fn check(&self, config: &ServerConfig, report: &mut Report);
}

/// Listener address, size limits and read deadlines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LimitsValidator;

impl Validator for LimitsValidator {
    fn check(&self, config: &ServerConfig, report: &mut Report) {
        if config.listener.address.trim().is_empty() {
            report.error("listener.address", "must not be empty");
        }

        let limits = &config.limits;
        if limits.receive_size == 0 {
            report.error("limits.receive_size", "must be greater than 0");
        }
        if limits.max_header_size < MIN_HEADER_SIZE {
            report.error(
                "limits.max_header_size",
                format!("must be at least {MIN_HEADER_SIZE} bytes"),
            );
        }
        if limits.max_message_size == 0 {
            report.error("limits.max_message_size", "must be greater than 0");
        }
        if limits.receive_size > limits.max_header_size {
            report.warn(
                "limits.receive_size",
                "larger than max_header_size; a single read may overshoot the head limit",
            );
        }

        if config.timeouts.classify.is_zero() {
            report.error("timeouts.classify", "must be greater than 0");
        }
        if config.timeouts.body.is_zero() {
            report.error("timeouts.body", "must be greater than 0");
        }
    }
}

/// Handshake and response header policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyValidator;

impl Validator for PolicyValidator {
    fn check(&self, config: &ServerConfig, report: &mut Report) {
        let security = &config.security;
        let origins = &security.cors_allowed_origins;

        if origins.iter().any(|o| o.trim().is_empty()) {
            report.error("security.cors_allowed_origins", "origins must not be empty");
        }
        if origins.len() > 1 && origins.iter().any(|o| o == "*") {
            report.warn(
                "security.cors_allowed_origins",
                "'*' allows every origin; the other entries have no effect",
            );
        }

        let frame_options = security.frame_options.trim();
        let known = ["DENY", "SAMEORIGIN"]
            .iter()
            .any(|v| frame_options.eq_ignore_ascii_case(v));
        if !frame_options.is_empty() && !known {
            report.warn(
                "security.frame_options",
                format!("unrecognized X-Frame-Options value {frame_options:?}"),
            );
        }

        if !security.validate_key {
            report.warn("security.validate_key", "Sec-WebSocket-Key is not checked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run(validator: &dyn Validator, config: &ServerConfig) -> Report {
        let mut report = Report::new();
        validator.check(config, &mut report);
        report
    }

    #[test]
    fn test_defaults_are_clean() {
        let config = ServerConfig::default();
        assert!(run(&LimitsValidator, &config).findings().is_empty());
        assert!(run(&PolicyValidator, &config).findings().is_empty());
    }

    #[test]
    fn test_limits() {
        let mut config = ServerConfig::default();
        config.limits.receive_size = 0;
        config.limits.max_header_size = 10;

        let report = run(&LimitsValidator, &config);
        assert!(report.has_errors());
        let fields: Vec<_> = report.errors().map(|f| f.field).collect();
        assert_eq!(fields, ["limits.receive_size", "limits.max_header_size"]);
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = ServerConfig::default();
        config.timeouts.body = Duration::ZERO;

        let report = run(&LimitsValidator, &config);
        assert_eq!(
            report.errors().next().map(ToString::to_string).as_deref(),
            Some("timeouts.body: must be greater than 0")
        );
    }

    #[test]
    fn test_oversized_receive_is_warning() {
        let mut config = ServerConfig::default();
        config.limits.receive_size = 64 * 1024;

        let report = run(&LimitsValidator, &config);
        assert!(!report.has_errors());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_policy_warnings_only() {
        let mut config = ServerConfig::default();
        config.security.cors_allowed_origins = vec!["*".to_string(), "http://a".to_string()];
        config.security.frame_options = "ALLOW-FROM x".to_string();
        config.security.validate_key = false;

        let report = run(&PolicyValidator, &config);
        assert!(!report.has_errors());
        assert_eq!(report.warnings().count(), 3);
    }

    #[test]
    fn test_blank_origin_is_error() {
        let mut config = ServerConfig::default();
        config.security.cors_allowed_origins = vec![" ".to_string()];

        assert!(run(&PolicyValidator, &config).has_errors());
    }
}
