//! Full-match path patterns.

use super::error::{RoutingError, RoutingResult};
use regex::Regex;

/// A compiled route pattern.
///
/// Patterns without regex syntax compare by string equality. Anything else is
/// compiled as a regular expression that must match the whole path.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Literal path.
    Exact(String),
    /// Anchored regular expression.
    Regex {
        /// Pattern as registered.
        source: String,
        /// Compiled `^(?:source)$`.
        regex: Regex,
    },
}

impl PathPattern {
    /// Compile a pattern.
    pub fn compile(pattern: &str) -> RoutingResult<Self> {
        if pattern.is_empty() {
            return Err(RoutingError::EmptyPattern);
        }
        if regex::escape(pattern) == pattern {
            return Ok(Self::Exact(pattern.to_string()));
        }
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            RoutingError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self::Regex {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(path) => path,
            Self::Regex { source, .. } => source,
        }
    }

    /// Whether the pattern matches all of `path`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == path,
            Self::Regex { regex, .. } => regex.is_match(path),
        }
    }
}
