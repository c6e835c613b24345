//! Long-form synthesis pipeline entry point.
//!
//! Wires the chunker, the bounded dispatcher, and the reassembler into one
//! operation: text in, a single continuous audio buffer plus splice report
//! out. All tuning comes in through explicit config structs; there is no
//! global state.

use std::sync::Arc;

use tracing::info;

use crate::config::{AudioEncoding, PipelineConfig, SynthesisConfig};
use crate::core::audio::{self, CombinedAudio, SplicePoint};
use crate::core::dispatch::{DispatchOptions, dispatch_all};
use crate::core::synthesis::SpeechSynthesizer;
use crate::core::text::{TextChunk, chunk_document};
use crate::errors::PipelineResult;

/// Result of one long-form synthesis run.
#[derive(Debug, Clone)]
pub struct LongFormOutput {
    /// The combined audio: raw PCM for LINEAR16, concatenated bytes for MP3.
    pub audio: Vec<u8>,
    /// The chunks the document was split into.
    pub chunks: Vec<TextChunk>,
    /// One splice per boundary between adjacent chunks.
    pub splices: Vec<SplicePoint>,
    /// Total duration in seconds (zero for MP3 output).
    pub total_duration: f64,
}

/// Synthesize an arbitrarily long document into one continuous audio
/// stream.
///
/// The document is split at boundaries chosen by the configured policy,
/// every chunk is synthesized under the configured concurrency ceiling and
/// retry policy, and the per-chunk results are reassembled in original
/// order. Either the whole document synthesizes or the operation fails;
/// a truncated buffer is never returned.
pub async fn synthesize_long_form(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    document: &str,
    pipeline_config: &PipelineConfig,
    synthesis_config: &SynthesisConfig,
) -> PipelineResult<LongFormOutput> {
    let chunks = chunk_document(
        document,
        pipeline_config.min_chunk_size,
        pipeline_config.max_chunk_size,
        pipeline_config.boundary_policy,
    )?;
    info!(
        chunks = chunks.len(),
        chars = document.len(),
        min = pipeline_config.min_chunk_size,
        max = pipeline_config.max_chunk_size,
        "document chunked"
    );

    let options = DispatchOptions::from(pipeline_config);
    let audio_results = dispatch_all(synthesizer, &chunks, &options).await?;

    let CombinedAudio {
        data,
        splices,
        total_duration,
    } = match synthesis_config.audio_encoding {
        AudioEncoding::Linear16 => {
            audio::combine_linear16(&audio_results, &chunks, synthesis_config.bytes_per_second())?
        }
        AudioEncoding::Mp3 => audio::combine_mp3(&audio_results)?,
    };

    info!(
        bytes = data.len(),
        splices = splices.len(),
        duration_secs = total_duration,
        "synthesis complete"
    );

    Ok(LongFormOutput {
        audio: data,
        chunks,
        splices,
        total_duration,
    })
}
