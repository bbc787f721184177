//! Streaming chat-completion relay.
//!
//! Opens one streaming request against an OpenAI-compatible
//! `chat/completions` endpoint and forwards every `data:` payload, verbatim
//! and in order, to a [`FrameSink`]. The relay defines what the caller sees
//! when things go wrong:
//!
//! | Upstream behavior | Downstream result |
//! |-------------------|-------------------|
//! | 2xx, `data: [DONE]` or clean EOF | frames, then `complete` |
//! | non-2xx status | one `[error] ...` delta frame, then `complete` |
//! | connect failure / broken body | frames so far, then `complete_with_error` |
//! | sink cancelled | upstream dropped, no terminal call |
//!
//! # Usage
//!
//! ```rust,ignore
//! use rolechat_relay::{ChannelSink, LlmConfig, SinkEvent, StreamRelay};
//!
//! let relay = StreamRelay::new(LlmConfig::new(base_url, api_key, model))?;
//! let (sink, mut rx) = ChannelSink::channel(64);
//! tokio::spawn(async move { relay.relay(&system, &user, sink).await });
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         SinkEvent::Frame(frame) => println!("{}", frame.payload()),
//!         SinkEvent::Completed => break,
//!         SinkEvent::Failed(e) => return Err(e.into()),
//!     }
//! }
//! ```

mod config;
mod error;
mod frame;
mod relay;
mod request;
mod sink;
mod sse;

pub use config::LlmConfig;
pub use error::{InvalidTransition, RelayError};
pub use frame::{sanitize_error_message, RelayFrame, ERROR_CONTENT_PREFIX};
pub use relay::{RelayState, StreamRelay};
pub use request::{
    completions_url, normalize_base_url, ChatCompletionRequest, ChatMessage, DEFAULT_API_VERSION,
};
pub use sink::{ChannelSink, FrameSink, SinkClosed, SinkEvent};
pub use sse::{parse_event_line, EventLine, LineBuffer, DONE_SENTINEL, MAX_LINE_BYTES};
