//! HTTP client adapter for the Inworld TTS REST API.
//!
//! One network round trip per call; no internal retrying. Retry policy
//! belongs to the dispatcher, which inspects [`SynthesisError::is_retryable`]
//! on whatever this adapter returns.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bytes::BytesMut;
use futures::Stream;
use futures_util::StreamExt;
use serde_json::json;
use tracing::{debug, warn};

use super::messages::{StreamLine, SynthesisResponse, TimestampInfo};
use crate::config::SynthesisConfig;
use crate::errors::{SynthesisError, SynthesisResult};

/// Path of the non-streaming synthesis endpoint.
pub const TTS_VOICE_PATH: &str = "/tts/v1/voice";

/// Path of the streaming (JSON lines) synthesis endpoint.
pub const TTS_VOICE_STREAM_PATH: &str = "/tts/v1/voice:stream";

/// Seam between the dispatcher and the remote service: one bounded text
/// payload in, one audio buffer out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in a single round trip.
    async fn synthesize(&self, text: &str) -> SynthesisResult<Vec<u8>>;
}

/// Decoded result of one non-streaming synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    /// Raw audio bytes as returned by the provider (container framing, if
    /// any, still attached).
    pub audio: Vec<u8>,
    /// Alignment metadata, when requested.
    pub timestamp_info: Option<TimestampInfo>,
}

/// One decoded fragment of a streaming synthesis response.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Decoded audio fragment.
    pub audio: Vec<u8>,
    /// Alignment metadata; the provider attaches it to at most one line.
    pub timestamp_info: Option<TimestampInfo>,
}

/// Inworld TTS client.
///
/// Holds one `reqwest::Client` (connection pooling is the transport's
/// concern) and an immutable [`SynthesisConfig`] shared by every call.
pub struct InworldClient {
    http_client: reqwest::Client,
    config: SynthesisConfig,
}

impl InworldClient {
    /// Build a client for the given configuration.
    pub fn new(config: SynthesisConfig) -> SynthesisResult<Self> {
        config.validate().map_err(SynthesisError::InvalidRequest)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SynthesisError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Synthesize one chunk and return the decoded audio plus any
    /// alignment metadata.
    pub async fn synthesize_detailed(&self, text: &str) -> SynthesisResult<SynthesisOutput> {
        let url = format!("{}{}", self.config.base_url, TTS_VOICE_PATH);
        debug!(text_len = text.len(), "synthesis request");

        let response = self.post(&url, text).await?;
        let parsed: SynthesisResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::InvalidResponse(format!("failed to parse response: {e}")))?;

        let audio = BASE64
            .decode(&parsed.audio_content)
            .map_err(|e| SynthesisError::InvalidResponse(format!("base64 decode error: {e}")))?;

        debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(SynthesisOutput {
            audio,
            timestamp_info: parsed.timestamp_info,
        })
    }

    /// Streaming synthesis: the server answers with one JSON object per
    /// line, each carrying a base64 audio fragment. The returned stream
    /// yields fragments in arrival order and stops when the connection
    /// closes; dropping it cancels the request.
    pub fn synthesize_stream(
        &self,
        text: String,
    ) -> impl Stream<Item = SynthesisResult<StreamEvent>> + Send + 'static {
        let client = self.http_client.clone();
        let config = self.config.clone();

        try_stream! {
            let url = format!("{}{}", config.base_url, TTS_VOICE_STREAM_PATH);
            let response = client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Basic {}", config.api_key))
                .json(&build_request_body(&config, &text))
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                Err(error_from_status(status.as_u16(), &body))?;
                return;
            }

            let mut body = response.bytes_stream();
            let mut buf = BytesMut::new();
            while let Some(piece) = body.next().await {
                let piece = piece.map_err(map_transport_error)?;
                buf.extend_from_slice(&piece);
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line = buf.split_to(pos + 1);
                    if let Some(event) = parse_stream_line(&line)? {
                        yield event;
                    }
                }
            }
            // Trailing line without a newline terminator.
            if let Some(event) = parse_stream_line(&buf)? {
                yield event;
            }
        }
    }

    async fn post(&self, url: &str, text: &str) -> SynthesisResult<reqwest::Response> {
        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Basic {}", self.config.api_key))
            .json(&build_request_body(&self.config, text))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl SpeechSynthesizer for InworldClient {
    async fn synthesize(&self, text: &str) -> SynthesisResult<Vec<u8>> {
        Ok(self.synthesize_detailed(text).await?.audio)
    }
}

/// Build the JSON request body. Optional parameters are added only when
/// explicitly configured so the wire payload matches what the API expects.
fn build_request_body(config: &SynthesisConfig, text: &str) -> serde_json::Value {
    let mut body = json!({
        "text": text,
        "voice_id": config.voice_id,
        "model_id": config.model_id,
        "audio_config": {
            "audio_encoding": config.audio_encoding.as_str(),
            "sample_rate_hertz": config.sample_rate_hertz,
        },
    });

    if let Some(temperature) = config.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(timestamp_type) = config.timestamp_type {
        body["timestampType"] = json!(timestamp_type.as_str());
    }
    if let Some(normalization) = config.text_normalization {
        body["applyTextNormalization"] = json!(normalization.as_str());
    }
    body
}

/// Map an HTTP status to the error taxonomy the retry loop inspects.
fn error_from_status(status: u16, body: &str) -> SynthesisError {
    match status {
        400 | 404 => SynthesisError::InvalidRequest(format!("HTTP {status}: {body}")),
        401 | 403 => SynthesisError::AuthFailed(format!("HTTP {status}: {body}")),
        429 => SynthesisError::RateLimited(format!("HTTP {status}: {body}")),
        500..=599 => SynthesisError::Server(format!("HTTP {status}: {body}")),
        _ => SynthesisError::Server(format!("unexpected HTTP {status}: {body}")),
    }
}

/// Map a transport-level failure. Timeouts are transient; everything else
/// is a hard network error.
fn map_transport_error(err: reqwest::Error) -> SynthesisError {
    if err.is_timeout() {
        SynthesisError::Timeout(err.to_string())
    } else {
        SynthesisError::Network(err.to_string())
    }
}

/// Decode one line of a streaming response. Blank or unparseable lines and
/// lines without audio are skipped, matching the provider's keepalive
/// behavior; a fragment that fails base64 decoding is a real error.
fn parse_stream_line(line: &[u8]) -> SynthesisResult<Option<StreamEvent>> {
    let trimmed = match std::str::from_utf8(line) {
        Ok(s) => s.trim(),
        Err(_) => {
            warn!("skipping non-UTF8 line in stream response");
            return Ok(None);
        }
    };
    if trimmed.is_empty() {
        return Ok(None);
    }

    let parsed: StreamLine = match serde_json::from_str(trimmed) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "skipping unparseable line in stream response");
            return Ok(None);
        }
    };

    let Some(result) = parsed.result else {
        return Ok(None);
    };
    let Some(encoded) = result.audio_content else {
        return Ok(None);
    };

    let audio = BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| SynthesisError::InvalidResponse(format!("base64 decode error: {e}")))?;

    Ok(Some(StreamEvent {
        audio,
        timestamp_info: result.timestamp_info,
    }))
}
