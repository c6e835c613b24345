pub mod config;
pub mod core;
pub mod errors;

// Re-export commonly used items for convenience
pub use config::{AudioEncoding, PipelineConfig, SynthesisConfig};
pub use core::*;
pub use errors::{PipelineError, PipelineResult, SynthesisError, SynthesisResult};
