//! Bounded concurrent dispatch of synthesis requests.
//!
//! Fans every chunk out to the synthesis adapter under a fixed concurrency
//! ceiling, retries transient failures with exponential backoff, and
//! collects results into slots addressed by the originating chunk's index
//! so completion order never affects output order. The first fatal error
//! aborts all sibling work; the operation either yields exactly N buffers
//! in input order or fails as a whole.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::core::synthesis::SpeechSynthesizer;
use crate::core::text::TextChunk;
use crate::errors::{PipelineError, PipelineResult};

/// Retry and concurrency parameters for one dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Ceiling on simultaneously in-flight synthesis calls.
    pub max_concurrency: usize,
    /// Total attempts per chunk before a transient error becomes fatal.
    pub max_retries: u32,
    /// Base delay for exponential backoff: `base * 2^attempt`.
    pub retry_base_delay: Duration,
}

impl From<&PipelineConfig> for DispatchOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
        }
    }
}

/// Synthesize every chunk concurrently and return the audio buffers
/// index-aligned with `chunks`.
///
/// Workers queue on a semaphore sized to `max_concurrency`; a permit is
/// held across the worker's retries so backoff sleeps keep the slot
/// occupied rather than admitting extra requests. Suspension points are
/// the network call and the backoff sleep only - neither blocks sibling
/// workers.
pub async fn dispatch_all(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    chunks: &[TextChunk],
    options: &DispatchOptions,
) -> PipelineResult<Vec<Vec<u8>>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let total = chunks.len();
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency));
    let mut workers: JoinSet<PipelineResult<(usize, Vec<u8>)>> = JoinSet::new();

    for (index, chunk) in chunks.iter().enumerate() {
        let synthesizer = Arc::clone(&synthesizer);
        let semaphore = Arc::clone(&semaphore);
        let options = options.clone();
        let text = chunk.text.clone();

        workers.spawn(async move {
            // The semaphore lives for the whole dispatch and is never
            // closed, so acquisition cannot fail.
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("dispatch semaphore closed");
            let audio =
                synthesize_with_retry(synthesizer.as_ref(), &text, index, total, &options).await?;
            Ok((index, audio))
        });
    }

    // Fan-in: results arrive in completion order and land in the slot of
    // their originating index.
    let mut slots: Vec<Option<Vec<u8>>> = vec![None; total];
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok((index, audio))) => {
                slots[index] = Some(audio);
            }
            Ok(Err(err)) => {
                warn!(error = %err, "aborting in-flight synthesis");
                workers.abort_all();
                return Err(err);
            }
            Err(join_err) => {
                workers.abort_all();
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                // We return on the first error before polling again, so a
                // cancelled worker is never observed here.
                unreachable!("dispatch worker cancelled while collecting");
            }
        }
    }

    let mut results = Vec::with_capacity(total);
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(audio) => results.push(audio),
            None => {
                return Err(PipelineError::Reassembly(format!(
                    "no result recorded for chunk {index}"
                )));
            }
        }
    }
    Ok(results)
}

/// One worker's retry loop: transient errors back off and retry up to
/// `max_retries` total attempts; anything else fails immediately without
/// consuming the remaining budget.
async fn synthesize_with_retry(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    index: usize,
    total: usize,
    options: &DispatchOptions,
) -> PipelineResult<Vec<u8>> {
    let mut attempt: u32 = 0;
    loop {
        info!(
            chunk = index + 1,
            total,
            chars = text.len(),
            attempt = attempt + 1,
            "synthesizing chunk"
        );

        match synthesizer.synthesize(text).await {
            Ok(audio) => {
                info!(chunk = index + 1, total, bytes = audio.len(), "chunk done");
                return Ok(audio);
            }
            Err(err) if err.is_retryable() && attempt + 1 < options.max_retries => {
                let delay = options.retry_base_delay * 2u32.pow(attempt);
                warn!(
                    chunk = index + 1,
                    total,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(PipelineError::ChunkFailed {
                    index,
                    attempts: attempt + 1,
                    source: err,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use crate::errors::{SynthesisError, SynthesisResult};

    fn make_chunks(n: usize) -> Vec<TextChunk> {
        (0..n)
            .map(|i| TextChunk {
                text: format!("chunk {i}"),
                start_char: i * 10,
                end_char: (i + 1) * 10,
            })
            .collect()
    }

    fn options(max_concurrency: usize, max_retries: u32, base_ms: u64) -> DispatchOptions {
        DispatchOptions {
            max_concurrency,
            max_retries,
            retry_base_delay: Duration::from_millis(base_ms),
        }
    }

    /// Completes chunks in reverse order: later chunks finish first.
    struct StaggeredSynthesizer {
        total: usize,
    }

    #[async_trait]
    impl SpeechSynthesizer for StaggeredSynthesizer {
        async fn synthesize(&self, text: &str) -> SynthesisResult<Vec<u8>> {
            let index: usize = text
                .strip_prefix("chunk ")
                .and_then(|s| s.parse().ok())
                .unwrap();
            sleep(Duration::from_millis(((self.total - index) * 10) as u64)).await;
            Ok(format!("audio-{index}").into_bytes())
        }
    }

    /// Tracks the peak number of simultaneous in-flight calls.
    struct CountingSynthesizer {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingSynthesizer {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for CountingSynthesizer {
        async fn synthesize(&self, _text: &str) -> SynthesisResult<Vec<u8>> {
            let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(in_flight, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![0u8; 4])
        }
    }

    /// Always rate limited; counts attempts.
    struct AlwaysRateLimited {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SpeechSynthesizer for AlwaysRateLimited {
        async fn synthesize(&self, _text: &str) -> SynthesisResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SynthesisError::RateLimited("try later".to_string()))
        }
    }

    /// Rate limited on the first call, succeeds afterwards.
    struct RateLimitedOnce {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SpeechSynthesizer for RateLimitedOnce {
        async fn synthesize(&self, _text: &str) -> SynthesisResult<Vec<u8>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SynthesisError::RateLimited("first call".to_string()))
            } else {
                Ok(b"ok".to_vec())
            }
        }
    }

    /// Chunk 0 fails fatally at once; the rest are slow and count
    /// completions.
    struct FatalOnFirst {
        completed: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for FatalOnFirst {
        async fn synthesize(&self, text: &str) -> SynthesisResult<Vec<u8>> {
            if text == "chunk 0" {
                return Err(SynthesisError::AuthFailed("bad key".to_string()));
            }
            sleep(Duration::from_millis(200)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(b"late".to_vec())
        }
    }

    #[tokio::test]
    async fn test_results_are_index_ordered_regardless_of_completion() {
        let chunks = make_chunks(10);
        let synthesizer = Arc::new(StaggeredSynthesizer { total: 10 });
        let results = dispatch_all(synthesizer, &chunks, &options(10, 3, 1))
            .await
            .unwrap();

        assert_eq!(results.len(), 10);
        for (index, audio) in results.iter().enumerate() {
            assert_eq!(audio, format!("audio-{index}").as_bytes());
        }
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_respected() {
        let chunks = make_chunks(10);
        let synthesizer = Arc::new(CountingSynthesizer::new());
        let results = dispatch_all(synthesizer.clone(), &chunks, &options(2, 3, 1))
            .await
            .unwrap();

        assert_eq!(results.len(), 10);
        assert!(
            synthesizer.peak.load(Ordering::SeqCst) <= 2,
            "peak in-flight {} exceeded ceiling",
            synthesizer.peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_fails_pipeline_with_backoff() {
        let chunks = make_chunks(1);
        let synthesizer = Arc::new(AlwaysRateLimited {
            calls: AtomicU32::new(0),
        });

        let started = Instant::now();
        let err = dispatch_all(synthesizer.clone(), &chunks, &options(1, 3, 1000))
            .await
            .unwrap_err();

        // Exactly max_retries attempts, with 1s + 2s of backoff between.
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        match err {
            PipelineError::ChunkFailed {
                index,
                attempts,
                source,
            } => {
                assert_eq!(index, 0);
                assert_eq!(attempts, 3);
                assert!(matches!(source, SynthesisError::RateLimited(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_recovers() {
        let chunks = make_chunks(1);
        let synthesizer = Arc::new(RateLimitedOnce {
            calls: AtomicU32::new(0),
        });
        let results = dispatch_all(synthesizer.clone(), &chunks, &options(1, 3, 100))
            .await
            .unwrap();

        assert_eq!(results[0], b"ok");
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_siblings() {
        let chunks = make_chunks(4);
        let synthesizer = Arc::new(FatalOnFirst {
            completed: AtomicUsize::new(0),
        });

        let err = dispatch_all(synthesizer.clone(), &chunks, &options(4, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ChunkFailed {
                index: 0,
                attempts: 1,
                source: SynthesisError::AuthFailed(_),
            }
        ));

        // Siblings were aborted at their sleep point and never completed.
        sleep(Duration::from_millis(300)).await;
        assert_eq!(synthesizer.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_chunk_list_yields_empty_results() {
        struct Unreachable;
        #[async_trait]
        impl SpeechSynthesizer for Unreachable {
            async fn synthesize(&self, _text: &str) -> SynthesisResult<Vec<u8>> {
                panic!("must not be called");
            }
        }
        let results = dispatch_all(Arc::new(Unreachable), &[], &options(2, 3, 1))
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
