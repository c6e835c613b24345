//! Core of the long-form synthesis pipeline: text chunking, the synthesis
//! client adapter, bounded dispatch, and audio reassembly.

pub mod audio;
pub mod dispatch;
pub mod pipeline;
pub mod synthesis;
pub mod text;

pub use audio::{CombinedAudio, SplicePoint};
pub use dispatch::{DispatchOptions, dispatch_all};
pub use pipeline::{LongFormOutput, synthesize_long_form};
pub use synthesis::{InworldClient, SpeechSynthesizer, StreamEvent, SynthesisOutput};
pub use text::{BoundaryPolicy, TextChunk, chunk_document, find_boundary};
