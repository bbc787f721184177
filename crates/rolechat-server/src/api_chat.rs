//! Chat handlers: the streamed reply plus the standalone speech endpoints.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Json},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures_util::{stream, Stream};
use rolechat_persona::PromptBuild;
use rolechat_relay::{ChannelSink, RelayError, SinkEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Prefix of the user text substituted when transcription fails.
pub const ASR_ERROR_PREFIX: &str = "[asr error] ";

const DEFAULT_AUDIO_FORMAT: &str = "wav";

/// One prior turn of the conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// Request body for `POST /api/chat/stream`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub role_id: String,
    #[serde(default)]
    pub user_text: Option<String>,
    #[serde(default)]
    pub audio_base64: Option<String>,
    /// Container of `audio_base64`. Default: `wav`.
    #[serde(default)]
    pub audio_format: Option<String>,
    /// Earlier turns. Logged only; the upstream sees the current turn.
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    /// `text` or `audio`; the client decides whether to call TTS.
    #[serde(default)]
    pub answer_content_type: Option<String>,
    #[serde(default)]
    pub preferred_voice: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsrRequest {
    pub audio_base64: String,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AsrResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    pub audio_base64: String,
}

/// Joins the persona prompt and its guidelines into one system message.
pub fn render_system_prompt(build: &PromptBuild) -> String {
    format!(
        "{}\n\nAssistant guidelines:\n- {}",
        build.system_message,
        build.guidelines.join("\n- ")
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn decode_audio(encoded: &str) -> Result<Vec<u8>, ApiError> {
    let audio = BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadRequest(format!("audioBase64 is not valid base64: {}", e)))?;
    if audio.is_empty() {
        return Err(ApiError::BadRequest("audioBase64 is empty".to_string()));
    }
    Ok(audio)
}

/// Resolves the user turn: typed text wins, otherwise the audio is
/// transcribed. A failed transcription becomes sentinel text so the
/// persona can still answer.
async fn resolve_user_text(state: &AppState, req: &ChatRequest) -> Result<String, ApiError> {
    if let Some(text) = non_blank(req.user_text.as_deref()) {
        return Ok(text.to_string());
    }
    let Some(encoded) = non_blank(req.audio_base64.as_deref()) else {
        return Err(ApiError::BadRequest(
            "either userText or audioBase64 is required".to_string(),
        ));
    };

    let audio = decode_audio(encoded)?;
    let format = non_blank(req.audio_format.as_deref()).unwrap_or(DEFAULT_AUDIO_FORMAT);
    match state.stt.transcribe(&audio, format).await {
        Ok(text) if !text.trim().is_empty() => Ok(text),
        Ok(_) => Ok(format!("{}no speech recognized", ASR_ERROR_PREFIX)),
        Err(e) => {
            tracing::warn!(error = %e, format, "transcription failed, continuing with error text");
            Ok(format!("{}{}", ASR_ERROR_PREFIX, e))
        }
    }
}

/// Turns relay events into SSE events.
///
/// The stream ends after `Completed` or when the relay goes away (deadline
/// or cancellation). `Failed` yields one error item, which makes axum
/// abort the response body instead of closing it cleanly.
fn sse_events(rx: mpsc::Receiver<SinkEvent>) -> impl Stream<Item = Result<Event, RelayError>> {
    stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        match rx.recv().await? {
            SinkEvent::Frame(frame) => {
                Some((Ok(Event::default().data(frame.into_payload())), Some(rx)))
            }
            SinkEvent::Completed => None,
            SinkEvent::Failed(e) => {
                tracing::error!(error = %e, "chat stream failed");
                Some((Err(e), None))
            }
        }
    })
}

/// Handler for `POST /api/chat/stream`.
///
/// Validation failures are answered with a JSON error before any streaming
/// starts. Once the stream is open, upstream problems only show up inside it.
pub async fn chat_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, RelayError>>>, ApiError> {
    let role = state
        .catalog
        .get(&req.role_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("role {}", req.role_id)))?;

    let user_text = resolve_user_text(&state, &req).await?;
    tracing::info!(
        role = %role.id,
        history = req.history.len(),
        answer = req.answer_content_type.as_deref().unwrap_or("text"),
        voice = req.preferred_voice.as_deref().unwrap_or("auto"),
        "chat stream requested"
    );

    let system = render_system_prompt(&state.composer.build(&role, &user_text));
    let (sink, rx) = ChannelSink::channel(state.chat.channel_capacity);
    let relay = state.relay.clone();
    let deadline = Duration::from_secs(state.chat.stream_timeout_secs);
    let role_id = role.id;

    tokio::spawn(async move {
        tokio::select! {
            outcome = relay.relay(&system, &user_text, sink) => {
                tracing::debug!(role = %role_id, ?outcome, "chat stream finished");
            }
            () = tokio::time::sleep(deadline) => {
                tracing::warn!(
                    role = %role_id,
                    timeout_secs = deadline.as_secs(),
                    "chat stream deadline reached, closing upstream"
                );
            }
        }
    });

    Ok(Sse::new(sse_events(rx)).keep_alive(KeepAlive::default()))
}

/// Handler for `POST /api/chat/asr`.
pub async fn asr_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<AsrRequest>,
) -> Result<Json<AsrResponse>, ApiError> {
    let audio = decode_audio(&req.audio_base64)?;
    let format = non_blank(req.format.as_deref()).unwrap_or(DEFAULT_AUDIO_FORMAT);
    let text = state.stt.transcribe(&audio, format).await.map_err(|e| {
        tracing::warn!(error = %e, format, "transcription failed");
        ApiError::from(e)
    })?;
    Ok(Json(AsrResponse { text }))
}

/// Handler for `POST /api/chat/tts`.
pub async fn tts_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }
    let audio = state
        .tts
        .synthesize(&req.text, req.voice.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "synthesis failed");
            ApiError::from(e)
        })?;
    Ok(Json(TtsResponse {
        audio_base64: BASE64.encode(audio),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_guidelines_as_bullets() {
        let build = PromptBuild {
            system_message: "You are Socrates.".to_string(),
            guidelines: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(
            render_system_prompt(&build),
            "You are Socrates.\n\nAssistant guidelines:\n- first\n- second"
        );
    }

    #[test]
    fn chat_request_uses_camel_case() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"roleId":"socrates","userText":"hi","audioFormat":"pcm",
                "history":[{"role":"user","content":"earlier"}],
                "answerContentType":"audio","preferredVoice":"v"}"#,
        )
        .unwrap();
        assert_eq!(req.role_id, "socrates");
        assert_eq!(req.user_text.as_deref(), Some("hi"));
        assert_eq!(req.audio_format.as_deref(), Some("pcm"));
        assert_eq!(req.history.len(), 1);
        assert_eq!(req.preferred_voice.as_deref(), Some("v"));
    }

    #[test]
    fn decode_audio_rejects_garbage_and_empty() {
        assert!(matches!(decode_audio("***"), Err(ApiError::BadRequest(_))));
        assert!(matches!(decode_audio(""), Err(ApiError::BadRequest(_))));
        assert_eq!(decode_audio(" aGk= ").unwrap(), b"hi");
    }

    #[tokio::test]
    async fn event_stream_stops_after_completion() {
        use futures_util::StreamExt;

        let (tx, rx) = mpsc::channel(4);
        tx.send(SinkEvent::Frame(rolechat_relay::RelayFrame::Upstream("{}".into())))
            .await
            .unwrap();
        tx.send(SinkEvent::Completed).await.unwrap();
        tx.send(SinkEvent::Frame(rolechat_relay::RelayFrame::Upstream("late".into())))
            .await
            .unwrap();

        let items: Vec<_> = sse_events(rx).collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[tokio::test]
    async fn event_stream_ends_when_relay_goes_away() {
        use futures_util::StreamExt;

        let (tx, rx) = mpsc::channel(4);
        drop(tx);
        let items: Vec<_> = sse_events(rx).collect().await;
        assert!(items.is_empty());
    }
}
