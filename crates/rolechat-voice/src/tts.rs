use crate::config::{HttpTtsConfig, PiperConfig, TtsConfig, TtsProvider};
use crate::error::VoiceError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for TTS (64 KiB).
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for the piper process.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Voice hint that selects the configured default.
pub const AUTO_VOICE: &str = "auto";

fn check_text(text: &str) -> Result<(), VoiceError> {
    if text.trim().is_empty() {
        return Err(VoiceError::Tts("text is empty".to_string()));
    }
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(VoiceError::Tts(format!(
            "text exceeds maximum size: {} bytes (limit: {} bytes)",
            text.len(),
            MAX_TTS_INPUT_BYTES
        )));
    }
    Ok(())
}

/// Returns the explicit voice hint, or `None` for absent, blank or `auto`.
fn explicit_voice(hint: Option<&str>) -> Option<&str> {
    hint.map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(AUTO_VOICE))
}

/// Text-to-speech, with the backend picked by configuration.
#[derive(Debug, Clone)]
pub enum TtsService {
    Disabled,
    Http(HttpSynthesizer),
    Piper(PiperSynthesizer),
}

impl TtsService {
    pub fn from_config(config: &TtsConfig) -> Result<Self, VoiceError> {
        Ok(match config.provider {
            TtsProvider::Disabled => Self::Disabled,
            TtsProvider::Http => Self::Http(HttpSynthesizer::new(config.http.clone())?),
            TtsProvider::Piper => Self::Piper(PiperSynthesizer::new(config.piper.clone())),
        })
    }

    pub fn provider(&self) -> TtsProvider {
        match self {
            Self::Disabled => TtsProvider::Disabled,
            Self::Http(_) => TtsProvider::Http,
            Self::Piper(_) => TtsProvider::Piper,
        }
    }

    /// Synthesizes `text`. Returns encoded audio (http) or raw PCM (piper).
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, VoiceError> {
        match self {
            Self::Disabled => Err(VoiceError::Config(
                "speech synthesis is not configured".to_string(),
            )),
            Self::Http(s) => s.synthesize(text, voice).await,
            Self::Piper(s) => s.synthesize(text, voice).await,
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    request: SynthesisText<'a>,
    audio: SynthesisAudio<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisText<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SynthesisAudio<'a> {
    voice_type: &'a str,
    encoding: &'a str,
    speed: f32,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    data: Option<String>,
}

/// Posts text to a JSON synthesis API and decodes the base64 audio it returns.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    config: HttpTtsConfig,
}

impl HttpSynthesizer {
    pub fn new(config: HttpTtsConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build TTS client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, VoiceError> {
        check_text(text)?;
        if self.config.base_url.trim().is_empty() {
            return Err(VoiceError::Config("TTS base_url is not configured".to_string()));
        }

        let voice_type = explicit_voice(voice).unwrap_or(&self.config.default_voice);
        let body = SynthesisRequest {
            request: SynthesisText { text },
            audio: SynthesisAudio {
                voice_type,
                encoding: &self.config.encoding,
                speed: self.config.speed,
            },
        };

        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Transport(format!("TTS request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %detail, "TTS upstream rejected request");
            return Err(VoiceError::Tts(format!(
                "HTTP {} - {}",
                status.as_u16(),
                detail.trim()
            )));
        }

        let parsed: SynthesisResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Tts(format!("invalid TTS response: {}", e)))?;
        let encoded = parsed
            .data
            .filter(|d| !d.is_empty())
            .ok_or_else(|| VoiceError::Tts("no audio data in TTS response".to_string()))?;
        let audio = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| VoiceError::Tts(format!("TTS audio is not valid base64: {}", e)))?;
        if audio.is_empty() {
            return Err(VoiceError::Tts("no audio data in TTS response".to_string()));
        }

        tracing::debug!(voice = voice_type, bytes = audio.len(), "synthesized speech");
        Ok(audio)
    }
}

/// Runs a local piper binary, returning raw s16le PCM.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    config: PiperConfig,
}

impl PiperSynthesizer {
    pub fn new(config: PiperConfig) -> Self {
        Self { config }
    }

    /// Resolves the model for a voice hint inside `voices_dir`.
    fn model_path(&self, voice: Option<&str>) -> Result<PathBuf, VoiceError> {
        let name = explicit_voice(voice).unwrap_or(&self.config.default_model);
        if name.is_empty() {
            return Err(VoiceError::Config("no piper voice model configured".to_string()));
        }

        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(VoiceError::Tts(format!("invalid voice name: {}", name)));
        }

        let mut path = self.config.voices_dir.join(relative);
        if path.extension().is_none() {
            path.set_extension("onnx");
        }
        Ok(path)
    }

    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>, VoiceError> {
        check_text(text)?;
        let model_path = self.model_path(voice)?;
        if !model_path.exists() {
            return Err(VoiceError::Tts(format!(
                "Model file not found: {:?}",
                model_path
            )));
        }
        if self.config.speed < 0.1 || self.config.speed > 10.0 {
            return Err(VoiceError::Config(
                "Speed must be between 0.1 and 10.0".to_string(),
            ));
        }

        let mut child = Command::new(&self.config.binary_path)
            .arg("--model")
            .arg(&model_path)
            .arg("--output_raw")
            // piper takes a length scale, the inverse of speed.
            .arg("--length_scale")
            .arg((1.0 / self.config.speed).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("Failed to spawn piper: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Tts("Failed to open stdin".to_string()))?;
        let input = text.to_string();
        let write_task = tokio::spawn(async move { stdin.write_all(input.as_bytes()).await });

        let output = tokio::time::timeout(TTS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS process timed out after {} seconds",
                    TTS_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Tts(format!("Failed to wait for piper: {}", e)))?;

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(VoiceError::Tts(format!(
                    "Failed to write to piper stdin: {}",
                    e
                )))
            }
            Err(e) => return Err(VoiceError::Tts(format!("Stdin task failed: {}", e))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Tts(format!("Piper failed: {}", stderr.trim())));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_and_blank_hints_mean_default() {
        assert_eq!(explicit_voice(None), None);
        assert_eq!(explicit_voice(Some("auto")), None);
        assert_eq!(explicit_voice(Some(" AUTO ")), None);
        assert_eq!(explicit_voice(Some("")), None);
        assert_eq!(explicit_voice(Some("qiniu_zh_female")), Some("qiniu_zh_female"));
    }

    #[test]
    fn piper_model_path_stays_in_voices_dir() {
        let synth = PiperSynthesizer::new(PiperConfig {
            voices_dir: PathBuf::from("/voices"),
            default_model: "en_US-lessac".to_string(),
            ..Default::default()
        });

        assert_eq!(
            synth.model_path(None).unwrap(),
            PathBuf::from("/voices/en_US-lessac.onnx")
        );
        assert_eq!(
            synth.model_path(Some("de/thorsten.onnx")).unwrap(),
            PathBuf::from("/voices/de/thorsten.onnx")
        );
        assert!(synth.model_path(Some("../secret")).is_err());
        assert!(synth.model_path(Some("/etc/passwd")).is_err());
    }

    #[test]
    fn text_limits() {
        assert!(check_text("hello").is_ok());
        assert!(check_text("   ").is_err());
        let long = "a".repeat(MAX_TTS_INPUT_BYTES + 1);
        assert!(matches!(check_text(&long), Err(VoiceError::Tts(msg)) if msg.contains("maximum size")));
    }

    #[test]
    fn request_body_shape() {
        let body = SynthesisRequest {
            request: SynthesisText { text: "hi \"there\"" },
            audio: SynthesisAudio {
                voice_type: "v",
                encoding: "mp3",
                speed: 1.5,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["request"]["text"], "hi \"there\"");
        assert_eq!(value["audio"]["voice_type"], "v");
        assert_eq!(value["audio"]["encoding"], "mp3");
        assert_eq!(value["audio"]["speed"], 1.5);
    }
}
