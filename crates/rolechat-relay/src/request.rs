//! Upstream request construction.

use serde::{Deserialize, Serialize};

/// Version segment appended to base URLs that do not carry one.
pub const DEFAULT_API_VERSION: &str = "v1";

const COMPLETIONS_PATH: &str = "chat/completions";

/// Ensures `base` ends in a `/v<digits>` segment.
///
/// A base that already ends in such a segment (optionally followed by `/`)
/// is returned unchanged. Otherwise trailing slashes are stripped and
/// `/v1` is appended. Applying this twice gives the same result as applying
/// it once.
pub fn normalize_base_url(base: &str) -> String {
    if has_version_suffix(base) {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), DEFAULT_API_VERSION)
    }
}

/// Builds the chat completions endpoint for a configured base URL.
pub fn completions_url(base: &str) -> String {
    let base = normalize_base_url(base);
    if base.ends_with('/') {
        format!("{}{}", base, COMPLETIONS_PATH)
    } else {
        format!("{}/{}", base, COMPLETIONS_PATH)
    }
}

fn has_version_suffix(base: &str) -> bool {
    let trimmed = base.strip_suffix('/').unwrap_or(base);
    let Some((_, segment)) = trimmed.rsplit_once('/') else {
        return false;
    };
    match segment.strip_prefix('v') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Streaming chat-completion request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<ChatMessage>,
}

impl ChatCompletionRequest {
    /// A streaming request with exactly one system and one user message.
    pub fn streaming(model: &str, system: &str, user: &str) -> Self {
        Self {
            model: model.to_string(),
            stream: true,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_version_when_missing() {
        assert_eq!(normalize_base_url("https://api.example.com"), "https://api.example.com/v1");
        assert_eq!(normalize_base_url("https://api.example.com/"), "https://api.example.com/v1");
        assert_eq!(
            normalize_base_url("https://api.example.com/openai"),
            "https://api.example.com/openai/v1"
        );
    }

    #[test]
    fn keeps_existing_version() {
        for base in [
            "https://api.example.com/v1",
            "https://api.example.com/v1/",
            "https://api.example.com/compat/v3",
            "http://localhost:8080/v12/",
        ] {
            assert_eq!(normalize_base_url(base), base);
        }
    }

    #[test]
    fn version_like_segments_that_are_not_versions_get_suffix() {
        assert_eq!(normalize_base_url("https://x.io/v"), "https://x.io/v/v1");
        assert_eq!(normalize_base_url("https://x.io/v1beta"), "https://x.io/v1beta/v1");
        assert_eq!(normalize_base_url("https://x.io/api-v1"), "https://x.io/api-v1/v1");
    }

    #[test]
    fn normalization_is_idempotent() {
        for base in [
            "https://api.example.com",
            "https://api.example.com/",
            "https://api.example.com//",
            "https://api.example.com/v1",
            "https://api.example.com/v2/",
            "http://127.0.0.1:9000/proxy",
        ] {
            let once = normalize_base_url(base);
            assert_eq!(normalize_base_url(&once), once, "base: {}", base);
        }
    }

    #[test]
    fn no_duplicate_slashes() {
        for base in [
            "https://api.example.com//",
            "https://api.example.com/v1/",
            "https://api.example.com/v1",
            "https://api.example.com",
        ] {
            let url = completions_url(base);
            let path = url.trim_start_matches("https://");
            assert!(!path.contains("//"), "url: {}", url);
        }
    }

    #[test]
    fn completions_url_joins_with_single_slash() {
        assert_eq!(
            completions_url("https://api.example.com"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            completions_url("https://api.example.com/v4"),
            "https://api.example.com/v4/chat/completions"
        );
    }

    #[test]
    fn request_body_round_trips_awkward_text() {
        let system = "Say \"hi\"\nthen C:\\path\\to\\file\t{\"json\": true}";
        let user = "line1\r\nline2 \u{0007} \\\" end";
        let request = ChatCompletionRequest::streaming("model-x", system, user);

        let body = serde_json::to_string(&request).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(parsed["model"], "model-x");
        assert_eq!(parsed["stream"], true);
        assert_eq!(parsed["messages"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["messages"][0]["role"], "system");
        assert_eq!(parsed["messages"][0]["content"], system);
        assert_eq!(parsed["messages"][1]["role"], "user");
        assert_eq!(parsed["messages"][1]["content"], user);
    }
}
