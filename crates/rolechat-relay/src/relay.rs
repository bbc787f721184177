//! The streaming completion relay.

use crate::config::LlmConfig;
use crate::error::{InvalidTransition, RelayError};
use crate::frame::RelayFrame;
use crate::request::{completions_url, ChatCompletionRequest};
use crate::sink::FrameSink;
use crate::sse::{parse_event_line, EventLine, LineBuffer, MAX_LINE_BYTES};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Lifecycle of one relay run.
///
/// ```text
/// Idle -> Connecting -> Streaming -> Completed | ErrorCompleted | Failed
///         Connecting -> Failed
///         Connecting | Streaming -> Cancelled
/// ```
///
/// Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Connecting,
    Streaming,
    /// Sentinel seen or upstream body ended cleanly.
    Completed,
    /// Upstream answered with an error status, forwarded as one content frame.
    ErrorCompleted,
    /// Transport failure; the sink got an error signal.
    Failed,
    /// The downstream consumer went away; upstream was abandoned.
    Cancelled,
}

impl RelayState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::ErrorCompleted | Self::Failed | Self::Cancelled
        )
    }

    pub fn can_transition_to(self, next: RelayState) -> bool {
        use RelayState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Streaming)
                | (Connecting, Failed)
                | (Connecting, Cancelled)
                | (Streaming, Completed)
                | (Streaming, ErrorCompleted)
                | (Streaming, Failed)
                | (Streaming, Cancelled)
        )
    }

    /// Moves to `next`, or rejects the transition and stays put.
    pub fn transition(&mut self, next: RelayState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

/// Relays streaming chat completions from an OpenAI-compatible upstream.
///
/// Holds no per-request state; one instance is shared by all requests and
/// every call to [`StreamRelay::relay`] is independent.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    client: reqwest::Client,
    config: LlmConfig,
    url: String,
}

impl StreamRelay {
    /// Creates a relay with its own pooled HTTP client.
    pub fn new(config: LlmConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RelayError::Client(e.to_string()))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: LlmConfig, client: reqwest::Client) -> Self {
        let url = completions_url(&config.base_url);
        Self {
            client,
            config,
            url,
        }
    }

    /// The fully normalized chat completions URL.
    pub fn completions_url(&self) -> &str {
        &self.url
    }

    /// Streams one completion for `system` + `user` into `sink`.
    ///
    /// Returns the terminal state reached. Every outcome except
    /// [`RelayState::Cancelled`] ends with exactly one terminal call on the
    /// sink. The upstream response is dropped, closing its connection, before
    /// this returns.
    pub async fn relay<S: FrameSink>(&self, system: &str, user: &str, sink: S) -> RelayState {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("relay", %request_id, model = %self.config.model);
        self.run(system, user, sink).instrument(span).await
    }

    async fn run<S: FrameSink>(&self, system: &str, user: &str, sink: S) -> RelayState {
        let mut state = RelayState::Idle;
        advance(&mut state, RelayState::Connecting);

        let body = ChatCompletionRequest::streaming(&self.config.model, system, user);
        let send = self
            .client
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send();

        let result = tokio::select! {
            biased;
            () = sink.cancelled() => None,
            result = send => Some(result),
        };

        let response = match result {
            None => {
                tracing::debug!("caller went away before upstream answered");
                advance(&mut state, RelayState::Cancelled);
                return state;
            }
            Some(Err(e)) => {
                tracing::warn!(url = %self.url, error = %e, "upstream connection failed");
                advance(&mut state, RelayState::Failed);
                sink.complete_with_error(RelayError::Connect(e)).await;
                return state;
            }
            Some(Ok(response)) => response,
        };

        advance(&mut state, RelayState::Streaming);
        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "upstream stream opened");
            forward_stream(response, sink, state).await
        } else {
            forward_upstream_error(response, sink, state).await
        }
    }
}

/// Drains an error response and forwards it as one synthesized frame.
async fn forward_upstream_error<S: FrameSink>(
    response: reqwest::Response,
    mut sink: S,
    mut state: RelayState,
) -> RelayState {
    let status = response.status().as_u16();

    let body = tokio::select! {
        biased;
        () = sink.cancelled() => None,
        body = response.text() => Some(body),
    };

    match body {
        None => advance(&mut state, RelayState::Cancelled),
        Some(Err(e)) => {
            tracing::warn!(status, error = %e, "failed to read upstream error body");
            advance(&mut state, RelayState::Failed);
            sink.complete_with_error(RelayError::Body(e)).await;
        }
        Some(Ok(body)) => {
            tracing::error!(status, body = %body, "upstream returned an error status");
            if sink
                .push_frame(RelayFrame::upstream_error(status, &body))
                .await
                .is_err()
            {
                advance(&mut state, RelayState::Cancelled);
            } else {
                advance(&mut state, RelayState::ErrorCompleted);
                sink.complete().await;
            }
        }
    }
    state
}

/// Result of handling one upstream line.
enum Step {
    Skipped,
    Forwarded,
    Done,
    Cancelled,
}

async fn forward_line<S: FrameSink>(sink: &mut S, line: &str) -> Step {
    match parse_event_line(line) {
        EventLine::Skip => Step::Skipped,
        EventLine::Done => Step::Done,
        EventLine::Data(payload) => {
            match sink.push_frame(RelayFrame::Upstream(payload.to_string())).await {
                Ok(()) => Step::Forwarded,
                Err(_) => Step::Cancelled,
            }
        }
    }
}

/// Forwards data payloads from a 2xx response until the sentinel or EOF.
async fn forward_stream<S: FrameSink>(
    response: reqwest::Response,
    mut sink: S,
    mut state: RelayState,
) -> RelayState {
    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::new();
    let mut frames: usize = 0;

    let end = 'read: loop {
        let next = tokio::select! {
            biased;
            () = sink.cancelled() => None,
            chunk = body.next() => Some(chunk),
        };

        match next {
            None => break 'read Step::Cancelled,
            Some(Some(Ok(bytes))) => {
                lines.extend(&bytes);
                while let Some(line) = lines.next_line() {
                    match forward_line(&mut sink, &line).await {
                        Step::Skipped => {}
                        Step::Forwarded => frames += 1,
                        end => break 'read end,
                    }
                }
                if lines.pending() > MAX_LINE_BYTES {
                    tracing::warn!(frames, pending = lines.pending(), "upstream line too long");
                    advance(&mut state, RelayState::Failed);
                    sink.complete_with_error(RelayError::LineTooLong(MAX_LINE_BYTES))
                        .await;
                    return state;
                }
            }
            Some(Some(Err(e))) => {
                tracing::warn!(frames, error = %e, "upstream stream broke");
                advance(&mut state, RelayState::Failed);
                sink.complete_with_error(RelayError::Body(e)).await;
                return state;
            }
            Some(None) => {
                // A final line without a terminator still counts.
                if let Some(line) = lines.finish() {
                    match forward_line(&mut sink, &line).await {
                        Step::Forwarded => frames += 1,
                        Step::Cancelled => break 'read Step::Cancelled,
                        Step::Skipped | Step::Done => {}
                    }
                }
                break 'read Step::Done;
            }
        }
    };

    if matches!(end, Step::Cancelled) {
        tracing::info!(frames, "caller went away, abandoning upstream stream");
        advance(&mut state, RelayState::Cancelled);
    } else {
        tracing::debug!(frames, "upstream stream completed");
        advance(&mut state, RelayState::Completed);
        sink.complete().await;
    }
    state
}

fn advance(state: &mut RelayState, next: RelayState) {
    if let Err(e) = state.transition(next) {
        tracing::error!("{}", e);
    }
}
