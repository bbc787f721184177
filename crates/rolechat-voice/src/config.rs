use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

fn default_xfyun_host_url() -> String {
    "https://iat-api.xfyun.cn/v2/iat".to_string()
}

fn default_language() -> String {
    "zh_cn".to_string()
}

fn default_domain() -> String {
    "iat".to_string()
}

fn default_accent() -> String {
    "mandarin".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_result_timeout_secs() -> u64 {
    30
}

fn default_tts_voice() -> String {
    "qiniu_zh_male_qinglin".to_string()
}

fn default_tts_encoding() -> String {
    "mp3".to_string()
}

fn default_tts_speed() -> f32 {
    1.2
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_piper_speed() -> f32 {
    1.0
}

/// Which transcription backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    /// Every call fails with a configuration error.
    #[default]
    Disabled,
    /// iFlytek streaming dictation over WebSocket.
    Xfyun,
    /// A local whisper.cpp-compatible binary.
    Command,
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default)]
    pub provider: SttProvider,
    #[serde(default)]
    pub xfyun: XfyunConfig,
    #[serde(default)]
    pub command: CommandSttConfig,
}

/// iFlytek dictation credentials and session parameters.
#[derive(Clone, Serialize, Deserialize)]
pub struct XfyunConfig {
    /// Dictation endpoint; `http(s)` is rewritten to `ws(s)` when connecting.
    #[serde(default = "default_xfyun_host_url")]
    pub host_url: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_accent")]
    pub accent: String,
    /// WebSocket handshake timeout in seconds. Default: 10.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Time allowed for the final result, in seconds. Default: 30.
    #[serde(default = "default_result_timeout_secs")]
    pub result_timeout_secs: u64,
}

impl Default for XfyunConfig {
    fn default() -> Self {
        Self {
            host_url: default_xfyun_host_url(),
            app_id: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            language: default_language(),
            domain: default_domain(),
            accent: default_accent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            result_timeout_secs: default_result_timeout_secs(),
        }
    }
}

impl fmt::Debug for XfyunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XfyunConfig")
            .field("host_url", &self.host_url)
            .field("app_id", &self.app_id)
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"[REDACTED]")
            .field("language", &self.language)
            .field("domain", &self.domain)
            .field("accent", &self.accent)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("result_timeout_secs", &self.result_timeout_secs)
            .finish()
    }
}

/// Local transcription binary settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSttConfig {
    #[serde(default)]
    pub binary_path: PathBuf,
    #[serde(default)]
    pub model_path: PathBuf,
}

/// Which synthesis backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    Disabled,
    /// JSON-over-HTTP synthesis API returning base64 audio.
    Http,
    /// A local piper binary.
    Piper,
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub provider: TtsProvider,
    #[serde(default)]
    pub http: HttpTtsConfig,
    #[serde(default)]
    pub piper: PiperConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct HttpTtsConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Voice used when the caller gives no hint or asks for `auto`.
    #[serde(default = "default_tts_voice")]
    pub default_voice: String,
    #[serde(default = "default_tts_encoding")]
    pub encoding: String,
    #[serde(default = "default_tts_speed")]
    pub speed: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpTtsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            default_voice: default_tts_voice(),
            encoding: default_tts_encoding(),
            speed: default_tts_speed(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for HttpTtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTtsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("default_voice", &self.default_voice)
            .field("encoding", &self.encoding)
            .field("speed", &self.speed)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiperConfig {
    #[serde(default)]
    pub binary_path: PathBuf,
    /// Directory holding `.onnx` voice models.
    #[serde(default)]
    pub voices_dir: PathBuf,
    /// Model file (relative to `voices_dir`) used without a voice hint.
    #[serde(default)]
    pub default_model: String,
    #[serde(default = "default_piper_speed")]
    pub speed: f32,
}

impl Default for PiperConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::new(),
            voices_dir: PathBuf::new(),
            default_model: String::new(),
            speed: default_piper_speed(),
        }
    }
}

/// Shows only the last four characters of a credential.
fn mask(value: &str) -> String {
    if value.is_empty() {
        return "<unset>".to_string();
    }
    let tail: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_default_to_disabled() {
        assert_eq!(SttConfig::default().provider, SttProvider::Disabled);
        assert_eq!(TtsConfig::default().provider, TtsProvider::Disabled);
    }

    #[test]
    fn debug_hides_secrets() {
        let stt = XfyunConfig {
            api_key: "key-123456".to_string(),
            api_secret: "topsecret".to_string(),
            ..Default::default()
        };
        let printed = format!("{:?}", stt);
        assert!(printed.contains("****3456"));
        assert!(!printed.contains("topsecret"));

        let tts = HttpTtsConfig {
            api_key: "tts-key".to_string(),
            ..Default::default()
        };
        assert!(!format!("{:?}", tts).contains("tts-key"));
    }

    #[test]
    fn parses_provider_sections_from_toml() {
        let stt: SttConfig = toml::from_str(
            r#"
            provider = "xfyun"
            [xfyun]
            app_id = "app"
            api_secret = "s"
            result_timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(stt.provider, SttProvider::Xfyun);
        assert_eq!(stt.xfyun.app_id, "app");
        assert_eq!(stt.xfyun.result_timeout_secs, 5);
        assert_eq!(stt.xfyun.connect_timeout_secs, 10);
        assert_eq!(stt.xfyun.host_url, "https://iat-api.xfyun.cn/v2/iat");

        let tts: TtsConfig = toml::from_str(
            r#"
            provider = "piper"
            [piper]
            binary_path = "/usr/bin/piper"
            voices_dir = "voices"
            default_model = "en_US-lessac-medium"
            "#,
        )
        .unwrap();
        assert_eq!(tts.provider, TtsProvider::Piper);
        assert_eq!(tts.piper.speed, 1.0);
        assert_eq!(tts.http.encoding, "mp3");
    }

    #[test]
    fn mask_handles_short_values() {
        assert_eq!(mask(""), "<unset>");
        assert_eq!(mask("ab"), "****ab");
    }
}
