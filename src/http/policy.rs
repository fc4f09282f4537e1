//! Headers added to every HTTP response.

use super::file::HttpReply;

/// CORS and framing headers applied after a view has answered.
#[derive(Debug, Clone, Default)]
pub struct ResponsePolicy {
    allowed_origins: Vec<String>,
    frame_options: Option<String>,
}

impl ResponsePolicy {
    /// Create a policy.
    ///
    /// An origin list containing `*` allows every origin. An empty or missing
    /// frame option disables the `X-Frame-Options` header.
    #[must_use]
    pub fn new(allowed_origins: Vec<String>, frame_options: Option<String>) -> Self {
        Self {
            allowed_origins,
            frame_options: frame_options.filter(|v| !v.trim().is_empty()),
        }
    }

    /// Value for `Access-Control-Allow-Origin` given the request's Origin.
    #[must_use]
    pub fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_string());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(origin))
            .then(|| origin.to_string())
    }

    /// Headers to add to a response for a request with this Origin.
    #[must_use]
    pub fn headers(&self, origin: Option<&str>) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(3);
        if let Some(allowed) = self.allow_origin(origin) {
            if allowed != "*" {
                headers.push(("Vary", "Origin".to_string()));
            }
            headers.push(("Access-Control-Allow-Origin", allowed));
        }
        if let Some(frame_options) = &self.frame_options {
            headers.push(("X-Frame-Options", frame_options.clone()));
        }
        headers
    }

    /// Apply the policy to an outgoing reply.
    pub fn apply(&self, origin: Option<&str>, reply: &mut HttpReply) {
        for (name, value) in self.headers(origin) {
            reply.set_header(name, value);
        }
    }
}
