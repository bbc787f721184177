use serde::{Deserialize, Serialize};
use std::fmt;

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Upstream chat-completion settings.
///
/// All strings are used verbatim. Nothing is validated up front: a missing
/// key or a malformed URL surfaces as a relay failure on first use.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API, with or without a `/v<n>` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Model identifier sent in every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// TCP connect timeout in seconds. Default: 10.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}
