use crate::audio::prepare_pcm;
use crate::config::{CommandSttConfig, SttConfig, SttProvider};
use crate::error::VoiceError;
use crate::xfyun::XfyunTranscriber;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum audio input size for the local binary (10 MiB).
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for the local binary.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

/// Speech-to-text, with the backend picked by configuration.
#[derive(Debug, Clone)]
pub enum SttService {
    Disabled,
    Xfyun(XfyunTranscriber),
    Command(CommandTranscriber),
}

impl SttService {
    pub fn from_config(config: &SttConfig) -> Self {
        match config.provider {
            SttProvider::Disabled => Self::Disabled,
            SttProvider::Xfyun => Self::Xfyun(XfyunTranscriber::new(config.xfyun.clone())),
            SttProvider::Command => Self::Command(CommandTranscriber::from_config(&config.command)),
        }
    }

    pub fn provider(&self) -> SttProvider {
        match self {
            Self::Disabled => SttProvider::Disabled,
            Self::Xfyun(_) => SttProvider::Xfyun,
            Self::Command(_) => SttProvider::Command,
        }
    }

    /// Transcribes an uploaded clip. `format` is the container hint
    /// (`wav`, `pcm`, ...) the client sent along.
    pub async fn transcribe(&self, audio: &[u8], format: &str) -> Result<String, VoiceError> {
        match self {
            Self::Disabled => Err(VoiceError::Config(
                "speech recognition is not configured".to_string(),
            )),
            Self::Xfyun(t) => {
                let pcm = prepare_pcm(audio, format)?;
                t.transcribe(&pcm).await
            }
            Self::Command(t) => t.transcribe(audio).await,
        }
    }
}

/// Runs a whisper.cpp-style binary that reads audio on stdin and prints
/// the transcript on stdout.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    model_path: PathBuf,
    binary_path: PathBuf,
}

impl CommandTranscriber {
    pub fn new(model_path: impl Into<PathBuf>, binary_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            binary_path: binary_path.into(),
        }
    }

    pub fn from_config(config: &CommandSttConfig) -> Self {
        Self::new(config.model_path.clone(), config.binary_path.clone())
    }

    pub async fn transcribe(&self, audio: &[u8]) -> Result<String, VoiceError> {
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }
        if self.binary_path.as_os_str().is_empty() {
            return Err(VoiceError::Config(
                "STT binary path is not configured".to_string(),
            ));
        }

        let mut child = Command::new(&self.binary_path)
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Stt(format!("Failed to spawn STT binary: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Stt("Failed to open stdin".to_string()))?;
        let input = audio.to_vec();
        // Feed stdin concurrently so a chatty child cannot block on a full stdout pipe.
        let write_task = tokio::spawn(async move { stdin.write_all(&input).await });

        let output = tokio::time::timeout(STT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Stt(format!(
                    "STT process timed out after {} seconds",
                    STT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Stt(format!("Failed to read stdout: {}", e)))?;

        if let Ok(Err(e)) = write_task.await {
            // A binary that exits before reading everything is judged by its status.
            tracing::debug!(error = %e, "STT binary closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Stt(format!("STT binary failed: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
