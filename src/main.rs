use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::Parser;
use futures::pin_mut;
use futures_util::StreamExt;
use tracing::info;

use longform_tts::config::{
    AudioEncoding, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_MAX_RETRIES,
    DEFAULT_MIN_CHUNK_SIZE, PipelineConfig, SynthesisConfig, TextNormalization, TimestampType,
};
use longform_tts::core::audio::{self, SplicePoint, extract_raw_audio, format_time};
use longform_tts::core::synthesis::{InworldClient, TimestampInfo};
use longform_tts::core::text::BoundaryPolicy;
use longform_tts::core::{LongFormOutput, synthesize_long_form};

/// Long-form text-to-speech synthesis via the Inworld TTS API
#[derive(Parser, Debug)]
#[command(name = "longform-tts")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Text to synthesize
    #[arg(long, conflicts_with = "input_file")]
    text: Option<String>,

    /// Read the text to synthesize from a file
    #[arg(long, value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Output audio file path (WAV for linear16, raw bytes for mp3)
    #[arg(short = 'o', long, value_name = "FILE")]
    output_file: PathBuf,

    /// Voice ID to use
    #[arg(long, default_value = "Dennis")]
    voice_id: String,

    /// Model ID to use
    #[arg(long, default_value = "inworld-tts-1")]
    model_id: String,

    /// Audio encoding: linear16 or mp3
    #[arg(long, default_value = "linear16")]
    encoding: String,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// Sampling temperature (0.0-2.0); higher values are more expressive
    #[arg(long)]
    temperature: Option<f32>,

    /// Timestamp alignment: word or character (single-request mode)
    #[arg(long)]
    timestamp: Option<String>,

    /// Text normalization: on to expand abbreviations/numbers, off for
    /// literal reading
    #[arg(long)]
    text_normalization: Option<String>,

    /// Use streaming synthesis (single request, text must fit one chunk)
    #[arg(long)]
    stream: bool,

    /// Minimum characters before looking for a chunk break
    #[arg(long, default_value_t = DEFAULT_MIN_CHUNK_SIZE)]
    min_chunk_size: usize,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,

    /// Maximum concurrent synthesis requests
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_REQUESTS)]
    max_concurrency: usize,

    /// Maximum attempts per chunk for rate-limit errors
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Chunk boundary policy: natural or sentence
    #[arg(long, default_value = "natural")]
    boundary_policy: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let text = match (&cli.text, &cli.input_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display()))?,
        (None, None) => "Hello, adventurer! What a beautiful day, isn't it?".to_string(),
    };

    let mut synthesis_config = SynthesisConfig::from_env().map_err(anyhow::Error::msg)?;
    synthesis_config.voice_id = cli.voice_id.clone();
    synthesis_config.model_id = cli.model_id.clone();
    synthesis_config.audio_encoding =
        AudioEncoding::from_str(&cli.encoding).map_err(anyhow::Error::msg)?;
    synthesis_config.sample_rate_hertz = cli.sample_rate;
    synthesis_config.temperature = cli.temperature;
    synthesis_config.timestamp_type = cli
        .timestamp
        .as_deref()
        .map(TimestampType::from_str)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    synthesis_config.text_normalization = cli
        .text_normalization
        .as_deref()
        .map(TextNormalization::from_str)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let pipeline_config = PipelineConfig {
        min_chunk_size: cli.min_chunk_size,
        max_chunk_size: cli.max_chunk_size,
        max_concurrency: cli.max_concurrency,
        max_retries: cli.max_retries,
        boundary_policy: BoundaryPolicy::from_str(&cli.boundary_policy)
            .map_err(anyhow::Error::msg)?,
        ..Default::default()
    };
    pipeline_config.validate().map_err(anyhow::Error::msg)?;

    let client = InworldClient::new(synthesis_config.clone())?;

    info!(
        voice = %synthesis_config.voice_id,
        model = %synthesis_config.model_id,
        encoding = synthesis_config.audio_encoding.as_str(),
        chars = text.len(),
        "starting synthesis"
    );

    if cli.stream {
        run_streaming(&cli, &client, &synthesis_config, text).await
    } else if synthesis_config.timestamp_type.is_some() {
        run_single_with_timestamps(&cli, &client, &synthesis_config, text).await
    } else {
        run_long_form(&cli, client, &pipeline_config, &synthesis_config, text).await
    }
}

/// Long-form pipeline: chunk, dispatch, reassemble, report splices.
async fn run_long_form(
    cli: &Cli,
    client: InworldClient,
    pipeline_config: &PipelineConfig,
    synthesis_config: &SynthesisConfig,
    text: String,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let output =
        synthesize_long_form(Arc::new(client), &text, pipeline_config, synthesis_config).await?;

    print_chunk_table(&output);
    write_output(cli, synthesis_config, &output.audio)?;
    print_splice_report(&output.splices, output.total_duration);

    println!(
        "\nTotal synthesis time: {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    println!(
        "Synthesis completed! Output file: {}",
        cli.output_file.display()
    );
    if synthesis_config.audio_encoding == AudioEncoding::Linear16 {
        println!("   Audio duration: {}", format_time(output.total_duration));
    } else {
        println!("   Output size: {:.1} KB", output.audio.len() as f64 / 1024.0);
    }
    Ok(())
}

/// Single request with word/character alignment output.
async fn run_single_with_timestamps(
    cli: &Cli,
    client: &InworldClient,
    synthesis_config: &SynthesisConfig,
    text: String,
) -> anyhow::Result<()> {
    if text.len() > cli.max_chunk_size {
        bail!(
            "timestamp alignment is a single-request feature; the text ({} chars) \
             exceeds the maximum chunk size ({})",
            text.len(),
            cli.max_chunk_size
        );
    }

    let started = Instant::now();
    let result = client.synthesize_detailed(&text).await?;
    println!(
        "Synthesis time: {:.2}s",
        started.elapsed().as_secs_f64()
    );

    let raw = extract_raw_audio(&result.audio).to_vec();
    write_output(cli, synthesis_config, &raw)?;
    println!("Audio saved to: {}", cli.output_file.display());

    if let Some(info) = &result.timestamp_info {
        print_timestamp_info(info);
    }
    Ok(())
}

/// Streaming synthesis: consume the JSON-lines stream and assemble
/// fragments in arrival order.
async fn run_streaming(
    cli: &Cli,
    client: &InworldClient,
    synthesis_config: &SynthesisConfig,
    text: String,
) -> anyhow::Result<()> {
    if text.len() > cli.max_chunk_size {
        bail!(
            "streaming mode is a single-request feature; the text ({} chars) \
             exceeds the maximum chunk size ({})",
            text.len(),
            cli.max_chunk_size
        );
    }

    let started = Instant::now();
    let mut first_chunk_at = None;
    let mut timestamp_info = None;
    let mut audio = Vec::new();
    let mut fragments = 0usize;

    let stream = client.synthesize_stream(text);
    pin_mut!(stream);
    while let Some(event) = stream.next().await {
        let event = event?;
        if first_chunk_at.is_none() {
            first_chunk_at = Some(started.elapsed());
        }
        fragments += 1;
        audio.extend_from_slice(extract_raw_audio(&event.audio));
        if event.timestamp_info.is_some() {
            timestamp_info = event.timestamp_info;
        }
    }

    if let Some(first) = first_chunk_at {
        println!("Time to first chunk: {:.2}s", first.as_secs_f64());
    }
    println!(
        "Streaming completed: {} fragment(s) in {:.2}s",
        fragments,
        started.elapsed().as_secs_f64()
    );

    write_output(cli, synthesis_config, &audio)?;
    println!("Audio saved to: {}", cli.output_file.display());

    if synthesis_config.audio_encoding == AudioEncoding::Linear16 {
        let duration = audio.len() as f64 / f64::from(synthesis_config.bytes_per_second());
        println!("Audio duration: {}", format_time(duration));
    }
    if let Some(info) = &timestamp_info {
        print_timestamp_info(info);
    }
    Ok(())
}

/// Write the combined buffer in the configured container format.
fn write_output(
    cli: &Cli,
    synthesis_config: &SynthesisConfig,
    audio: &[u8],
) -> anyhow::Result<()> {
    match synthesis_config.audio_encoding {
        AudioEncoding::Linear16 => {
            audio::write_wav(&cli.output_file, audio, synthesis_config.sample_rate_hertz)?;
        }
        AudioEncoding::Mp3 => {
            std::fs::write(&cli.output_file, audio).with_context(|| {
                format!("failed to write output file {}", cli.output_file.display())
            })?;
        }
    }
    Ok(())
}

fn print_chunk_table(output: &LongFormOutput) {
    println!("Split into {} chunk(s):", output.chunks.len());
    for (i, chunk) in output.chunks.iter().enumerate() {
        println!(
            "   Chunk {}: {} chars (positions {}-{})",
            i + 1,
            chunk.text.len(),
            chunk.start_char,
            chunk.end_char
        );
    }
}

fn print_splice_report(splices: &[SplicePoint], total_duration: f64) {
    println!("\nSPLICE REPORT - Check these timestamps for voice quality:");
    println!("{}", "=".repeat(70));

    if splices.is_empty() {
        println!("   No splices - text was short enough for single request");
        return;
    }

    println!("   Total splices: {}", splices.len());
    println!("   Total duration: {}\n", format_time(total_duration));

    for splice in splices {
        println!("   Splice #{}:", splice.splice_index);
        println!("      Timestamp: {}", splice.formatted_time);
        println!("      Character position: {}", splice.chunk_start_char);
        println!("      Text: \"{}\"", splice.text_preview);
        println!();
    }

    println!("   Tip: Listen to timestamps above to verify consistent voice quality");
    println!("{}", "=".repeat(70));
}

fn print_timestamp_info(info: &TimestampInfo) {
    println!("\nTIMESTAMP INFORMATION:");

    if let Some(words) = &info.word_alignment {
        if words.is_consistent() {
            println!(" Word-level alignment:");
            for ((word, start), end) in words
                .words
                .iter()
                .zip(&words.start_times)
                .zip(&words.end_times)
            {
                println!("  '{word}': {start:.3}s - {end:.3}s");
            }
        }
    }

    if let Some(chars) = &info.character_alignment {
        if chars.is_consistent() {
            println!(" Character-level alignment:");
            let rendered: Vec<String> = chars
                .characters
                .iter()
                .zip(&chars.start_times)
                .map(|(ch, start)| format!("'{ch}'@{start:.2}s"))
                .collect();
            println!("  {}", rendered.join(" "));
        }
    }
}
