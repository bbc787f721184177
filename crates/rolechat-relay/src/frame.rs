//! Downstream frames.

use serde_json::json;

/// Prefix of the content carried by a synthesized error frame.
pub const ERROR_CONTENT_PREFIX: &str = "[error] ";

/// One unit of relay output.
///
/// Both variants carry a serialized chat-completion delta, so a client can
/// render them through the same code path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// A payload read from upstream, forwarded byte-for-byte.
    Upstream(String),
    /// A delta synthesized from an upstream error response.
    Error(String),
}

impl RelayFrame {
    /// Builds the error frame for an upstream response with a non-2xx status.
    ///
    /// Newlines in `body` are flattened to spaces. A blank body is replaced
    /// by `HTTP <status>`.
    pub fn upstream_error(status: u16, body: &str) -> Self {
        let mut message = sanitize_error_message(body);
        if message.trim().is_empty() {
            message = format!("HTTP {}", status);
        }

        let delta = json!({
            "choices": [{
                "delta": { "content": format!("{}{}", ERROR_CONTENT_PREFIX, message) }
            }]
        });
        Self::Error(delta.to_string())
    }

    /// The serialized payload of this frame.
    pub fn payload(&self) -> &str {
        match self {
            Self::Upstream(p) | Self::Error(p) => p,
        }
    }

    pub fn into_payload(self) -> String {
        match self {
            Self::Upstream(p) | Self::Error(p) => p,
        }
    }
}

/// Replaces every carriage return and line feed with a single space.
///
/// Quote and backslash escaping is left to the JSON serializer.
pub fn sanitize_error_message(message: &str) -> String {
    message.replace(['\r', '\n'], " ")
}
