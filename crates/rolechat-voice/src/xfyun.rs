//! iFlytek streaming dictation over WebSocket.

use crate::config::XfyunConfig;
use crate::error::VoiceError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

/// Bytes of 16 kHz 16-bit mono PCM per frame (40 ms).
pub const FRAME_BYTES: usize = 1280;

/// Pacing between audio frames.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(40);

const AUDIO_FORMAT: &str = "audio/L16;rate=16000";
const AUDIO_ENCODING: &str = "raw";

/// Frame status values of the dictation protocol.
const STATUS_FIRST: u8 = 0;
const STATUS_CONTINUE: u8 = 1;
const STATUS_LAST: u8 = 2;

type HmacSha256 = Hmac<Sha256>;

/// Builds the signed WebSocket URL for `host_url` at instant `now`.
///
/// The signature covers the host (without port), the RFC 1123 date and
/// the request line. The returned URL uses `ws`/`wss`.
pub fn auth_url(
    host_url: &str,
    api_key: &str,
    api_secret: &str,
    now: DateTime<Utc>,
) -> Result<Url, VoiceError> {
    let mut url = Url::parse(host_url)
        .map_err(|e| VoiceError::Config(format!("invalid ASR host url {}: {}", host_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| VoiceError::Config(format!("ASR host url has no host: {}", host_url)))?
        .to_string();
    let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();

    let signed = format!("host: {}\ndate: {}\nGET {} HTTP/1.1", host, date, url.path());
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|e| VoiceError::Config(format!("invalid ASR api secret: {}", e)))?;
    mac.update(signed.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let authorization = format!(
        "api_key=\"{}\", algorithm=\"hmac-sha256\", headers=\"host date request-line\", signature=\"{}\"",
        api_key, signature
    );

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(VoiceError::Config(format!(
                "unsupported ASR url scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| VoiceError::Config(format!("cannot use scheme {} for {}", scheme, host_url)))?;

    url.query_pairs_mut()
        .clear()
        .append_pair("authorization", &BASE64.encode(authorization))
        .append_pair("date", &date)
        .append_pair("host", &host);

    Ok(url)
}

/// Opening frame: carries the app id and session parameters.
pub fn first_frame(config: &XfyunConfig, audio: &[u8]) -> Value {
    json!({
        "common": { "app_id": config.app_id },
        "business": {
            "language": config.language,
            "domain": config.domain,
            "accent": config.accent,
            "dwa": "wpgs",
        },
        "data": audio_data(STATUS_FIRST, audio),
    })
}

pub fn continue_frame(audio: &[u8]) -> Value {
    json!({ "data": audio_data(STATUS_CONTINUE, audio) })
}

pub fn last_frame() -> Value {
    json!({ "data": audio_data(STATUS_LAST, &[]) })
}

fn audio_data(status: u8, audio: &[u8]) -> Value {
    json!({
        "status": status,
        "format": AUDIO_FORMAT,
        "encoding": AUDIO_ENCODING,
        "audio": BASE64.encode(audio),
    })
}

/// Splits PCM into the full frame sequence, closing frame included.
pub fn audio_frames(config: &XfyunConfig, pcm: &[u8]) -> Vec<Value> {
    let mut frames: Vec<Value> = pcm
        .chunks(FRAME_BYTES)
        .enumerate()
        .map(|(i, chunk)| {
            if i == 0 {
                first_frame(config, chunk)
            } else {
                continue_frame(chunk)
            }
        })
        .collect();
    frames.push(last_frame());
    frames
}

#[derive(Debug, Deserialize)]
pub struct DictationResponse {
    #[serde(default = "missing_code")]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub data: Option<DictationData>,
}

fn missing_code() -> i64 {
    -1
}

#[derive(Debug, Deserialize)]
pub struct DictationData {
    #[serde(default)]
    pub status: Option<u8>,
    #[serde(default)]
    pub result: Option<DictationResult>,
}

#[derive(Debug, Deserialize)]
pub struct DictationResult {
    #[serde(default)]
    pub ws: Vec<WordSlot>,
}

#[derive(Debug, Deserialize)]
pub struct WordSlot {
    #[serde(default)]
    pub cw: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub w: String,
}

impl DictationResponse {
    /// Best-candidate text carried by this message.
    pub fn text(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.result.as_ref())
            .map(|r| {
                r.ws.iter()
                    .filter_map(|slot| slot.cw.first())
                    .map(|c| c.w.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_last(&self) -> bool {
        self.data.as_ref().and_then(|d| d.status) == Some(STATUS_LAST)
    }
}

/// Collects partial results in arrival order.
#[derive(Debug, Default)]
struct Transcript {
    parts: Vec<String>,
}

impl Transcript {
    fn push(&mut self, text: String) {
        if !text.is_empty() {
            self.parts.push(text);
        }
    }

    fn text(&self) -> String {
        self.parts.join(" ").trim().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct XfyunTranscriber {
    config: XfyunConfig,
}

impl XfyunTranscriber {
    pub fn new(config: XfyunConfig) -> Self {
        Self { config }
    }

    fn check_credentials(&self) -> Result<(), VoiceError> {
        let missing: Vec<&str> = [
            ("app_id", &self.config.app_id),
            ("api_key", &self.config.api_key),
            ("api_secret", &self.config.api_secret),
        ]
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VoiceError::Config(format!(
                "xfyun ASR credentials missing: {}",
                missing.join(", ")
            )))
        }
    }

    /// Streams 16 kHz PCM to the dictation service and returns the text.
    pub async fn transcribe(&self, pcm: &[u8]) -> Result<String, VoiceError> {
        self.check_credentials()?;
        if pcm.is_empty() {
            return Err(VoiceError::Audio("audio data is empty".to_string()));
        }

        let url = auth_url(
            &self.config.host_url,
            &self.config.api_key,
            &self.config.api_secret,
            Utc::now(),
        )?;

        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let (socket, _) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                VoiceError::Transport(format!(
                    "ASR connect timed out after {} seconds",
                    connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Transport(format!("ASR connect failed: {}", e)))?;
        tracing::debug!(bytes = pcm.len(), "xfyun session opened");

        let (mut write, mut read) = socket.split();

        let frames = audio_frames(&self.config, pcm);
        let sender = tokio::spawn(async move {
            let total = frames.len();
            for (i, frame) in frames.into_iter().enumerate() {
                write.send(Message::Text(frame.to_string().into())).await?;
                if i + 1 < total {
                    tokio::time::sleep(FRAME_INTERVAL).await;
                }
            }
            Ok::<_, tokio_tungstenite::tungstenite::Error>(write)
        });

        let mut transcript = Transcript::default();
        let result_timeout = Duration::from_secs(self.config.result_timeout_secs);
        let outcome = tokio::time::timeout(result_timeout, async {
            while let Some(msg) = read.next().await {
                let msg = msg.map_err(|e| VoiceError::Transport(e.to_string()))?;
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };

                let response: DictationResponse = serde_json::from_str(text.as_str())
                    .map_err(|e| VoiceError::Stt(format!("invalid ASR response: {}", e)))?;
                if response.code != 0 {
                    return Err(VoiceError::Stt(format!(
                        "ASR returned code {}: {}",
                        response.code, response.message
                    )));
                }
                if let Some(sid) = &response.sid {
                    tracing::trace!(%sid, "xfyun partial result");
                }

                transcript.push(response.text());
                if response.is_last() {
                    break;
                }
            }
            Ok::<(), VoiceError>(())
        })
        .await;

        sender.abort();

        let text = transcript.text();
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(VoiceError::Transport(e))) if !text.is_empty() => {
                tracing::warn!(error = %e, "ASR connection dropped, using partial result");
            }
            Ok(Err(e)) => return Err(e),
            Err(_) if !text.is_empty() => {
                tracing::warn!(
                    timeout_secs = result_timeout.as_secs(),
                    "ASR result timed out, using partial result"
                );
            }
            Err(_) => {
                return Err(VoiceError::Stt(format!(
                    "ASR result timed out after {} seconds",
                    result_timeout.as_secs()
                )))
            }
        }

        if text.is_empty() {
            return Err(VoiceError::Stt("no speech recognized".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn auth_url_is_signed_and_websocket() {
        let url = auth_url(
            "https://iat-api.xfyun.cn/v2/iat",
            "key",
            "secret",
            fixed_now(),
        )
        .unwrap();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("iat-api.xfyun.cn"));
        assert_eq!(url.path(), "/v2/iat");

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["date"], "Mon, 06 May 2024 07:08:09 GMT");
        assert_eq!(pairs["host"], "iat-api.xfyun.cn");

        let authorization =
            String::from_utf8(BASE64.decode(&pairs["authorization"]).unwrap()).unwrap();
        assert!(authorization.starts_with("api_key=\"key\", algorithm=\"hmac-sha256\""));
        assert!(authorization.contains("headers=\"host date request-line\""));

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"host: iat-api.xfyun.cn\ndate: Mon, 06 May 2024 07:08:09 GMT\nGET /v2/iat HTTP/1.1");
        let expected = BASE64.encode(mac.finalize().into_bytes());
        assert!(authorization.ends_with(&format!("signature=\"{}\"", expected)));
    }

    #[test]
    fn auth_url_keeps_port_but_signs_bare_host() {
        let url = auth_url("http://127.0.0.1:8123/v2/iat", "k", "s", fixed_now()).unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(8123));
        let host = url
            .query_pairs()
            .find(|(k, _)| k == "host")
            .map(|(_, v)| v.into_owned());
        assert_eq!(host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn auth_url_rejects_garbage() {
        assert!(matches!(
            auth_url("not a url", "k", "s", fixed_now()),
            Err(VoiceError::Config(_))
        ));
        assert!(matches!(
            auth_url("ftp://host/path", "k", "s", fixed_now()),
            Err(VoiceError::Config(_))
        ));
    }

    #[test]
    fn frames_follow_status_sequence() {
        let config = XfyunConfig {
            app_id: "app".to_string(),
            ..Default::default()
        };
        let pcm = vec![0u8; FRAME_BYTES * 2 + 10];
        let frames = audio_frames(&config, &pcm);

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0]["common"]["app_id"], "app");
        assert_eq!(frames[0]["business"]["dwa"], "wpgs");
        assert_eq!(frames[0]["business"]["language"], "zh_cn");
        assert_eq!(frames[0]["data"]["status"], 0);
        assert_eq!(frames[1]["data"]["status"], 1);
        assert!(frames[1].get("common").is_none());
        assert_eq!(frames[2]["data"]["status"], 1);
        assert_eq!(
            BASE64
                .decode(frames[2]["data"]["audio"].as_str().unwrap())
                .unwrap()
                .len(),
            10
        );
        assert_eq!(frames[3]["data"]["status"], 2);
        assert_eq!(frames[3]["data"]["audio"], "");
        assert_eq!(frames[3]["data"]["format"], AUDIO_FORMAT);
    }

    #[test]
    fn response_text_takes_first_candidates() {
        let response: DictationResponse = serde_json::from_str(
            r#"{"code":0,"sid":"x","data":{"status":1,"result":{"ws":[
                {"cw":[{"w":"hel"},{"w":"HEL"}]},{"cw":[{"w":"lo"}]},{"cw":[]}
            ]}}}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "hello");
        assert!(!response.is_last());
    }

    #[test]
    fn response_without_code_is_an_error_code() {
        let response: DictationResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.code, -1);
        assert_eq!(response.text(), "");
    }

    #[test]
    fn transcript_joins_parts_with_single_space() {
        let mut t = Transcript::default();
        t.push("hello".to_string());
        t.push(String::new());
        t.push("world".to_string());
        assert_eq!(t.text(), "hello world");
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_connecting() {
        let transcriber = XfyunTranscriber::new(XfyunConfig {
            app_id: "app".to_string(),
            ..Default::default()
        });
        let err = transcriber.transcribe(&[1, 2, 3]).await.unwrap_err();
        match err {
            VoiceError::Config(msg) => {
                assert!(msg.contains("api_key"));
                assert!(msg.contains("api_secret"));
                assert!(!msg.contains("app_id"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
