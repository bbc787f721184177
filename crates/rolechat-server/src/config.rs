//! Server configuration loading from file and environment variables.

use rolechat_relay::LlmConfig;
use rolechat_voice::{SttConfig, TtsConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream chat-completion provider.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-request streaming limits.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Speech recognition backend.
    #[serde(default)]
    pub asr: SttConfig,

    /// Speech synthesis backend.
    #[serde(default)]
    pub tts: TtsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with a browser client (`index.html` and assets), served as
    /// the fallback for unmatched paths.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

/// Limits applied to every chat stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Hard deadline for one streamed reply, in seconds.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,

    /// Frames buffered between the upstream reader and the HTTP response.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "rolechat_relay=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_stream_timeout_secs() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            stream_timeout_secs: default_stream_timeout_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ROLECHAT_HOST` overrides `server.host`
/// - `ROLECHAT_PORT` overrides `server.port`
/// - `ROLECHAT_LLM_BASE_URL` / `ROLECHAT_LLM_API_KEY` / `ROLECHAT_LLM_MODEL`
///   override the `llm` section
/// - `ROLECHAT_ASR_APP_ID` / `ROLECHAT_ASR_API_KEY` / `ROLECHAT_ASR_API_SECRET`
///   override `asr.xfyun` credentials
/// - `ROLECHAT_TTS_API_KEY` overrides `tts.http.api_key`
/// - `ROLECHAT_LOG_LEVEL` overrides `logging.level`
/// - `ROLECHAT_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `ROLECHAT_*` overrides read through `lookup`.
///
/// Unparseable host or port values are ignored.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("ROLECHAT_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("ROLECHAT_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(base_url) = lookup("ROLECHAT_LLM_BASE_URL") {
        config.llm.base_url = base_url;
    }
    if let Some(api_key) = lookup("ROLECHAT_LLM_API_KEY") {
        config.llm.api_key = api_key;
    }
    if let Some(model) = lookup("ROLECHAT_LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(app_id) = lookup("ROLECHAT_ASR_APP_ID") {
        config.asr.xfyun.app_id = app_id;
    }
    if let Some(api_key) = lookup("ROLECHAT_ASR_API_KEY") {
        config.asr.xfyun.api_key = api_key;
    }
    if let Some(api_secret) = lookup("ROLECHAT_ASR_API_SECRET") {
        config.asr.xfyun.api_secret = api_secret;
    }
    if let Some(api_key) = lookup("ROLECHAT_TTS_API_KEY") {
        config.tts.http.api_key = api_key;
    }
    if let Some(level) = lookup("ROLECHAT_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("ROLECHAT_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolechat_voice::{SttProvider, TtsProvider};
    use std::collections::HashMap;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(config.server.static_dir.is_none());
        assert_eq!(config.chat.stream_timeout_secs, 60);
        assert_eq!(config.chat.channel_capacity, 64);
        assert_eq!(config.llm.base_url, "https://api.openai.com");
        assert_eq!(config.asr.provider, SttProvider::Disabled);
        assert_eq!(config.tts.provider, TtsProvider::Disabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parses_all_sections() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9099
            static_dir = "web/dist"

            [llm]
            base_url = "https://llm.example.com/v1"
            api_key = "sk-file"
            model = "deepseek-v3"

            [chat]
            stream_timeout_secs = 15

            [asr]
            provider = "xfyun"
            [asr.xfyun]
            app_id = "app"

            [tts]
            provider = "http"
            [tts.http]
            base_url = "https://tts.example.com/v1/voice/tts"
            default_voice = "qiniu_zh_female_wwxkjx"

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9099);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("web/dist")));
        assert_eq!(config.llm.model, "deepseek-v3");
        assert_eq!(config.chat.stream_timeout_secs, 15);
        assert_eq!(config.chat.channel_capacity, 64);
        assert_eq!(config.asr.provider, SttProvider::Xfyun);
        assert_eq!(config.asr.xfyun.app_id, "app");
        assert_eq!(config.asr.xfyun.language, "zh_cn");
        assert_eq!(config.tts.provider, TtsProvider::Http);
        assert_eq!(config.tts.http.default_voice, "qiniu_zh_female_wwxkjx");
        assert!(config.logging.json);
    }

    #[test]
    fn unknown_provider_is_a_parse_error() {
        let result: Result<Config, _> = toml::from_str("[asr]\nprovider = \"whisper-cloud\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("ROLECHAT_HOST", "0.0.0.0"),
            ("ROLECHAT_PORT", "7000"),
            ("ROLECHAT_LLM_BASE_URL", "http://localhost:11434"),
            ("ROLECHAT_LLM_API_KEY", "sk-env"),
            ("ROLECHAT_LLM_MODEL", "qwen"),
            ("ROLECHAT_ASR_APP_ID", "a"),
            ("ROLECHAT_ASR_API_KEY", "k"),
            ("ROLECHAT_ASR_API_SECRET", "s"),
            ("ROLECHAT_TTS_API_KEY", "t"),
            ("ROLECHAT_LOG_LEVEL", "debug"),
            ("ROLECHAT_LOG_JSON", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.api_key, "sk-env");
        assert_eq!(config.llm.model, "qwen");
        assert_eq!(config.asr.xfyun.app_id, "a");
        assert_eq!(config.asr.xfyun.api_key, "k");
        assert_eq!(config.asr.xfyun.api_secret, "s");
        assert_eq!(config.tts.http.api_key, "t");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn bad_port_override_is_ignored() {
        let mut config = Config::default();
        apply_overrides(&mut config, |key| {
            (key == "ROLECHAT_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.chat.channel_capacity, 64);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config(path.to_str()),
            Err(ConfigError::Parse(_))
        ));
    }
}
