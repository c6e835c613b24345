//! Configuration for the long-form synthesis pipeline.
//!
//! Two structs cover the whole surface: [`SynthesisConfig`] describes one
//! remote synthesis call (voice, model, encoding, credential) and is shared
//! read-only by every concurrent dispatch call; [`PipelineConfig`] tunes the
//! orchestration around those calls (chunk sizes, concurrency ceiling,
//! retry policy). Both are plain values passed into the pipeline entry
//! point - there is no process-wide mutable state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::text::BoundaryPolicy;

/// Default Inworld TTS API base URL.
pub const INWORLD_API_BASE_URL: &str = "https://api.inworld.ai";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "INWORLD_API_KEY";

/// Minimum characters before the chunker starts looking for a break point.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 500;

/// Maximum chunk size. The remote request limit is 2000 characters; staying
/// below it leaves headroom for multi-byte text.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1900;

/// Default ceiling on in-flight synthesis requests (provider RPS limits).
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 2;

/// Default total attempts per chunk for rate-limit errors.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Output sample width. LINEAR16 is 16-bit.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Output channel count. The API returns mono audio.
pub const CHANNELS: u16 = 1;

fn default_request_timeout() -> u64 {
    60
}

fn default_base_url() -> String {
    INWORLD_API_BASE_URL.to_string()
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

/// Audio encoding requested from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioEncoding {
    /// Uncompressed 16-bit PCM (WAV-framed by the provider).
    #[default]
    #[serde(rename = "LINEAR16")]
    Linear16,
    /// Compressed MP3 byte stream.
    #[serde(rename = "MP3")]
    Mp3,
}

impl AudioEncoding {
    /// Wire value for the `audio_encoding` request field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear16 => "LINEAR16",
            Self::Mp3 => "MP3",
        }
    }

    /// Parse from a CLI/config string.
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "linear16" | "pcm" | "wav" => Ok(Self::Linear16),
            "mp3" => Ok(Self::Mp3),
            _ => Err(format!(
                "Unsupported audio encoding: {s}. Use linear16 or mp3"
            )),
        }
    }
}

/// Timestamp alignment granularity, forwarded as `timestampType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampType {
    /// Word-level alignment.
    #[serde(rename = "WORD")]
    Word,
    /// Character-level alignment.
    #[serde(rename = "CHARACTER")]
    Character,
}

impl TimestampType {
    /// Wire value for the `timestampType` request field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "WORD",
            Self::Character => "CHARACTER",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "word" => Ok(Self::Word),
            "character" | "char" => Ok(Self::Character),
            _ => Err(format!("Invalid timestamp type: {s}. Use word or character")),
        }
    }
}

/// Text normalization switch, forwarded as `applyTextNormalization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextNormalization {
    /// Expand abbreviations and numbers.
    #[serde(rename = "ON")]
    On,
    /// Literal reading.
    #[serde(rename = "OFF")]
    Off,
}

impl TextNormalization {
    /// Wire value for the `applyTextNormalization` request field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            _ => Err(format!("Invalid text normalization: {s}. Use on or off")),
        }
    }
}

/// Configuration for one remote synthesis call.
///
/// Immutable once built; the dispatcher shares it read-only across all
/// concurrent calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// API key sent as `Authorization: Basic {key}`.
    #[serde(default, skip_serializing)]
    pub api_key: String,

    /// Voice identifier. Not validated locally; an unknown voice surfaces
    /// as a remote-call failure.
    pub voice_id: String,

    /// Model identifier.
    pub model_id: String,

    /// Requested audio encoding.
    #[serde(default)]
    pub audio_encoding: AudioEncoding,

    /// Requested sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hertz: u32,

    /// Sampling temperature (0.0-2.0). Omitted from the request when unset.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Timestamp alignment request. Omitted when unset.
    #[serde(default)]
    pub timestamp_type: Option<TimestampType>,

    /// Text normalization request. Omitted when unset.
    #[serde(default)]
    pub text_normalization: Option<TextNormalization>,

    /// Per-request timeout in seconds. A timed-out call is treated as
    /// transient and retried like a rate limit.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// API base URL. Overridable so tests can point at a mock server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: "Dennis".to_string(),
            model_id: "inworld-tts-1".to_string(),
            audio_encoding: AudioEncoding::Linear16,
            sample_rate_hertz: DEFAULT_SAMPLE_RATE,
            temperature: None,
            timestamp_type: None,
            text_normalization: None,
            request_timeout_secs: default_request_timeout(),
            base_url: default_base_url(),
        }
    }
}

impl SynthesisConfig {
    /// Read the API key from the environment into an otherwise-default
    /// config. The key stays an explicit field from here on; nothing else
    /// in the pipeline touches the environment.
    pub fn from_env() -> Result<Self, String> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            format!(
                "{API_KEY_ENV} environment variable is not set. \
                 Set it with: export {API_KEY_ENV}=your_api_key_here"
            )
        })?;
        Ok(Self {
            api_key,
            ..Default::default()
        })
    }

    /// Validate the configuration before any network call is attempted.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err(format!(
                "API key is required. Set the {API_KEY_ENV} environment variable."
            ));
        }
        if self.voice_id.is_empty() {
            return Err("voice_id must not be empty".to_string());
        }
        if self.model_id.is_empty() {
            return Err("model_id must not be empty".to_string());
        }
        if self.sample_rate_hertz == 0 {
            return Err("sample_rate_hertz must be positive".to_string());
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(format!("temperature {t} out of range (0.0-2.0)"));
            }
        }
        Ok(())
    }

    /// Bytes of raw PCM per second of audio for this config.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate_hertz * u32::from(BITS_PER_SAMPLE / 8) * u32::from(CHANNELS)
    }
}

/// Orchestration parameters for the long-form pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum characters before the chunker looks for a break point.
    pub min_chunk_size: usize,

    /// Maximum raw chunk length. Must stay below the remote request limit.
    pub max_chunk_size: usize,

    /// Ceiling on simultaneously in-flight synthesis requests.
    pub max_concurrency: usize,

    /// Total attempts per chunk before a transient error becomes fatal.
    pub max_retries: u32,

    /// Base delay for exponential backoff: `base * 2^attempt`.
    pub retry_base_delay: Duration,

    /// Break-point selection policy used by the chunker.
    pub boundary_policy: BoundaryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            boundary_policy: BoundaryPolicy::Natural,
        }
    }
}

impl PipelineConfig {
    /// Validate the orchestration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_chunk_size == 0 {
            return Err("min_chunk_size must be positive".to_string());
        }
        if self.min_chunk_size >= self.max_chunk_size {
            return Err(format!(
                "min_chunk_size ({}) must be smaller than max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            ));
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_encoding_parsing() {
        assert_eq!(
            AudioEncoding::from_str("linear16").unwrap(),
            AudioEncoding::Linear16
        );
        assert_eq!(AudioEncoding::from_str("WAV").unwrap(), AudioEncoding::Linear16);
        assert_eq!(AudioEncoding::from_str("mp3").unwrap(), AudioEncoding::Mp3);
        assert!(AudioEncoding::from_str("ogg").is_err());
    }

    #[test]
    fn test_audio_encoding_wire_values() {
        assert_eq!(AudioEncoding::Linear16.as_str(), "LINEAR16");
        assert_eq!(AudioEncoding::Mp3.as_str(), "MP3");
    }

    #[test]
    fn test_timestamp_type_parsing() {
        assert_eq!(TimestampType::from_str("word").unwrap(), TimestampType::Word);
        assert_eq!(
            TimestampType::from_str("character").unwrap(),
            TimestampType::Character
        );
        assert!(TimestampType::from_str("phoneme").is_err());
    }

    #[test]
    fn test_synthesis_config_validation() {
        let mut config = SynthesisConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.temperature = Some(3.0);
        assert!(config.validate().is_err());

        config.temperature = Some(0.8);
        config.api_key.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bytes_per_second() {
        let config = SynthesisConfig {
            sample_rate_hertz: 48_000,
            ..Default::default()
        };
        // 48kHz * 2 bytes * 1 channel
        assert_eq!(config.bytes_per_second(), 96_000);
    }

    #[test]
    fn test_pipeline_config_validation() {
        assert!(PipelineConfig::default().validate().is_ok());

        let inverted = PipelineConfig {
            min_chunk_size: 1900,
            max_chunk_size: 500,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let zero_workers = PipelineConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(zero_workers.validate().is_err());
    }
}
