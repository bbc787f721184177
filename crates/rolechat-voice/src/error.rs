use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
