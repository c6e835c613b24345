//! Error types for the long-form synthesis pipeline.
//!
//! Two layers: [`SynthesisError`] describes a single remote synthesis call
//! and carries the transient/fatal distinction the dispatcher's retry loop
//! inspects; [`PipelineError`] is what the pipeline as a whole surfaces to
//! callers, with enough detail (chunk index, attempt count) to diagnose
//! which portion of the text could not be synthesized.

use thiserror::Error;

/// Result alias for single synthesis calls.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Result alias for pipeline-level operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failure of one remote synthesis round trip.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// HTTP 429 - the provider asked us to back off.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// HTTP 401/403 - bad or expired credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// HTTP 400/404 - the request itself was rejected.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request exceeded the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Network-level failure (connect, DNS, TLS, broken stream).
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 5xx or any other provider-side failure.
    #[error("server error: {0}")]
    Server(String),

    /// Response body could not be parsed or decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SynthesisError {
    /// Whether the dispatcher should retry this failure with backoff.
    ///
    /// Rate limiting and timeouts are transient; everything else aborts the
    /// chunk (and with it the pipeline) immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_))
    }
}

/// Failure of the overall long-form synthesis operation.
///
/// The pipeline never returns a partially assembled buffer: any of these
/// means the whole operation failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input document could not be chunked.
    #[error("chunking error: {0}")]
    Chunking(String),

    /// One chunk exhausted its retries or hit a fatal remote error.
    #[error("chunk {index} failed after {attempts} attempt(s): {source}")]
    ChunkFailed {
        /// Index of the failing chunk in the original ordered sequence.
        index: usize,
        /// Attempts actually made before giving up.
        attempts: u32,
        /// The final error returned by the synthesis adapter.
        source: SynthesisError,
    },

    /// A result buffer was malformed during reassembly.
    #[error("reassembly error: {0}")]
    Reassembly(String),

    /// Writing the output container failed.
    #[error("audio output error: {0}")]
    AudioOutput(#[from] hound::Error),

    /// Reading input or writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
