//! Wire types for the Inworld TTS REST API.
//!
//! Field names mirror the API exactly via serde renames. The request body
//! itself is assembled in `client.rs` with `serde_json::json!` so optional
//! fields are omitted rather than sent as null.

use serde::{Deserialize, Serialize};

/// Non-streaming synthesis response body.
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisResponse {
    /// Base64-encoded audio buffer.
    #[serde(rename = "audioContent")]
    pub audio_content: String,

    /// Optional word/character alignment, present when the request set
    /// `timestampType`.
    #[serde(rename = "timestampInfo", default)]
    pub timestamp_info: Option<TimestampInfo>,
}

/// One line of a streaming synthesis response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamLine {
    #[serde(default)]
    pub result: Option<StreamResult>,
}

/// Payload of one streamed line.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamResult {
    /// Base64-encoded audio fragment. Lines without audio are skipped.
    #[serde(rename = "audioContent", default)]
    pub audio_content: Option<String>,

    /// Alignment metadata; the provider may attach it to the final line.
    #[serde(rename = "timestampInfo", default)]
    pub timestamp_info: Option<TimestampInfo>,
}

/// Timestamp alignment metadata returned alongside audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampInfo {
    #[serde(rename = "wordAlignment", default, skip_serializing_if = "Option::is_none")]
    pub word_alignment: Option<WordAlignment>,

    #[serde(
        rename = "characterAlignment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub character_alignment: Option<CharacterAlignment>,
}

/// Word-level alignment: parallel arrays of words and their time spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordAlignment {
    #[serde(default)]
    pub words: Vec<String>,

    #[serde(rename = "wordStartTimeSeconds", default)]
    pub start_times: Vec<f64>,

    #[serde(rename = "wordEndTimeSeconds", default)]
    pub end_times: Vec<f64>,
}

impl WordAlignment {
    /// Whether the parallel arrays line up.
    pub fn is_consistent(&self) -> bool {
        self.words.len() == self.start_times.len() && self.words.len() == self.end_times.len()
    }
}

/// Character-level alignment: parallel arrays of characters and time spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterAlignment {
    #[serde(default)]
    pub characters: Vec<String>,

    #[serde(rename = "characterStartTimeSeconds", default)]
    pub start_times: Vec<f64>,

    #[serde(rename = "characterEndTimeSeconds", default)]
    pub end_times: Vec<f64>,
}

impl CharacterAlignment {
    /// Whether the parallel arrays line up.
    pub fn is_consistent(&self) -> bool {
        self.characters.len() == self.start_times.len()
            && self.characters.len() == self.end_times.len()
    }
}
