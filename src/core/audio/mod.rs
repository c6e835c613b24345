//! Audio reassembly, splice reporting, and WAV output.
//!
//! Per-chunk results come back WAV-framed (LINEAR16) or as raw MP3 byte
//! streams. Reassembly strips the container framing from each LINEAR16
//! piece, concatenates raw samples in chunk order, and reports the
//! timestamp of every splice between adjacent chunks so the joins can be
//! audited by ear.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BITS_PER_SAMPLE, CHANNELS};
use crate::core::text::TextChunk;
use crate::errors::{PipelineError, PipelineResult};

/// Size of the RIFF/WAVE header the provider prepends to LINEAR16 audio.
const WAV_HEADER_LEN: usize = 44;

/// Bytes per sample frame (16-bit mono).
const FRAME_LEN: usize = (BITS_PER_SAMPLE as usize / 8) * CHANNELS as usize;

/// The timestamp in the final audio where two independently synthesized
/// chunks are joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplicePoint {
    /// Index of the chunk that starts at this splice (1-based boundary
    /// count: splice i joins chunk i-1 and chunk i).
    pub splice_index: usize,
    /// Cumulative audio duration of all prior chunks, in seconds.
    pub timestamp: f64,
    /// `timestamp` rendered as `M:SS.mmm`.
    pub formatted_time: String,
    /// Originating text offsets of the chunk after the splice.
    pub chunk_start_char: usize,
    pub chunk_end_char: usize,
    /// Short preview of the chunk text for human inspection.
    pub text_preview: String,
}

/// Reassembled audio plus the splice report.
#[derive(Debug, Clone)]
pub struct CombinedAudio {
    /// Raw PCM sample bytes (LINEAR16) or concatenated MP3 bytes.
    pub data: Vec<u8>,
    /// One splice per boundary between adjacent chunks: exactly N-1 for N
    /// chunks, empty for a single chunk (or for MP3, where frame timing is
    /// unknown without decoding).
    pub splices: Vec<SplicePoint>,
    /// Total duration in seconds. Zero for MP3 output.
    pub total_duration: f64,
}

/// Strip the WAV container framing from one result, if present.
pub fn extract_raw_audio(audio: &[u8]) -> &[u8] {
    if audio.len() > WAV_HEADER_LEN && audio.starts_with(b"RIFF") {
        &audio[WAV_HEADER_LEN..]
    } else {
        audio
    }
}

/// Duration in seconds of a raw PCM buffer at the given byte rate.
fn pcm_duration(raw_len: usize, bytes_per_second: u32) -> PipelineResult<f64> {
    if bytes_per_second == 0 {
        return Err(PipelineError::Reassembly(
            "bytes_per_second must be positive".to_string(),
        ));
    }
    Ok(raw_len as f64 / f64::from(bytes_per_second))
}

/// Format seconds as `M:SS.mmm`.
pub fn format_time(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = seconds - (minutes as f64) * 60.0;
    format!("{minutes}:{secs:06.3}")
}

/// Combine LINEAR16 results into one continuous raw PCM buffer and compute
/// the splice report.
///
/// Walks the index-ordered results once, stripping each piece's WAV header,
/// accumulating durations, and emitting a [`SplicePoint`] for every
/// boundary between chunk i-1 and chunk i. A piece shorter than one sample
/// frame after header stripping is rejected rather than silently rounded
/// away.
pub fn combine_linear16(
    audio_results: &[Vec<u8>],
    chunks: &[TextChunk],
    bytes_per_second: u32,
) -> PipelineResult<CombinedAudio> {
    debug_assert_eq!(audio_results.len(), chunks.len());

    let mut splices = Vec::new();
    let mut current_time = 0.0f64;
    let mut data = Vec::new();

    for (index, result) in audio_results.iter().enumerate() {
        let raw = extract_raw_audio(result);
        if raw.len() < FRAME_LEN {
            return Err(PipelineError::Reassembly(format!(
                "chunk {index} produced {} byte(s), less than one sample frame",
                raw.len()
            )));
        }
        let duration = pcm_duration(raw.len(), bytes_per_second)?;

        if index > 0 {
            splices.push(SplicePoint {
                splice_index: index,
                timestamp: current_time,
                formatted_time: format_time(current_time),
                chunk_start_char: chunks[index].start_char,
                chunk_end_char: chunks[index].end_char,
                text_preview: chunks[index].preview(),
            });
        }

        current_time += duration;
        data.extend_from_slice(raw);
    }

    debug!(
        pieces = audio_results.len(),
        bytes = data.len(),
        duration_secs = current_time,
        "combined audio"
    );

    Ok(CombinedAudio {
        data,
        splices,
        total_duration: current_time,
    })
}

/// Combine MP3 results by plain concatenation. MP3 frame streams join
/// cleanly back to back; no framing is stripped and no timed splice report
/// is produced.
pub fn combine_mp3(audio_results: &[Vec<u8>]) -> PipelineResult<CombinedAudio> {
    let mut data = Vec::new();
    for (index, result) in audio_results.iter().enumerate() {
        if result.is_empty() {
            return Err(PipelineError::Reassembly(format!(
                "chunk {index} produced an empty buffer"
            )));
        }
        data.extend_from_slice(result);
    }
    Ok(CombinedAudio {
        data,
        splices: Vec::new(),
        total_duration: 0.0,
    })
}

/// Write raw PCM sample bytes to a standard WAV file (mono, 16-bit).
pub fn write_wav(path: &Path, raw_pcm: &[u8], sample_rate: u32) -> PipelineResult<()> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for frame in raw_pcm.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([frame[0], frame[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}
