//! Synthesis client adapter for the Inworld TTS REST API.

mod client;
mod messages;

pub use client::{
    InworldClient, SpeechSynthesizer, StreamEvent, SynthesisOutput, TTS_VOICE_PATH,
    TTS_VOICE_STREAM_PATH,
};
pub use messages::{
    CharacterAlignment, StreamLine, StreamResult, SynthesisResponse, TimestampInfo, WordAlignment,
};
