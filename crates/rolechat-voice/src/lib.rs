//! Voice input and output for role chat.
//!
//! Speech-to-text turns an uploaded clip into the user turn of a chat
//! request; text-to-speech renders a reply for playback. Both are enums
//! over interchangeable backends chosen from configuration:
//!
//! | Service      | Backends                                   |
//! |--------------|--------------------------------------------|
//! | [`SttService`] | `disabled`, `xfyun` (WebSocket), `command` (local binary) |
//! | [`TtsService`] | `disabled`, `http` (JSON API), `piper` (local binary)     |
//!
//! A disabled backend fails every call with [`VoiceError::Config`].

pub mod audio;
pub mod config;
pub mod error;
pub mod stt;
pub mod tts;
pub mod xfyun;

pub use config::{
    CommandSttConfig, HttpTtsConfig, PiperConfig, SttConfig, SttProvider, TtsConfig, TtsProvider,
    XfyunConfig,
};
pub use error::VoiceError;
pub use stt::{CommandTranscriber, SttService};
pub use tts::{HttpSynthesizer, PiperSynthesizer, TtsService, AUTO_VOICE};
pub use xfyun::XfyunTranscriber;
