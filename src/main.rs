//! lpcnet-dump - Extract LPCNet-style features from 16 kHz speech.
//!
//! Reads raw little-endian 16-bit PCM (or WAV with `--wav`) and writes one
//! vector of little-endian f32 features per 10 ms frame.

use std::io::Cursor;

use anyhow::{Context, Result};
use clap::Parser;
use lpcnet_features_rs::io::{dump_features, open_input, open_output, read_wav};
use lpcnet_features_rs::{ExtractorConfig, FeatureExtractor, FREQ_SIZE, NlpPitchEstimator};

/// Extract LPCNet-style features from 16 kHz speech.
#[derive(Parser, Debug)]
#[command(name = "lpcnet-dump")]
#[command(about = "Extract LPCNet-style features from 16 kHz speech")]
struct Args {
    /// Input PCM file, or `-` for standard input
    input: String,

    /// Output feature file, or `-` for standard output
    output: String,

    /// Seed for the tilt filter and dither (default: OS entropy)
    #[arg(long)]
    seed: Option<u64>,

    /// Use a flat tilt filter instead of a random one
    #[arg(long)]
    no_tilt: bool,

    /// Disable dither
    #[arg(long)]
    no_dither: bool,

    /// Zero spectrum bins at or above this index
    #[arg(long, default_value_t = FREQ_SIZE)]
    lowpass: usize,

    /// Replace the pitch period with the non-linear pitch estimator
    #[arg(long)]
    alt_pitch: bool,

    /// Decode the input as WAV and resample it to 16 kHz
    #[arg(long)]
    wav: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ExtractorConfig::default()
        .with_lowpass(args.lowpass)
        .with_random_tilt(!args.no_tilt)
        .with_dither(!args.no_dither);
    config.seed = args.seed;

    let mut extractor = FeatureExtractor::new(config).context("invalid settings")?;
    if args.alt_pitch {
        extractor = extractor.with_alt_pitch(Box::new(NlpPitchEstimator::new()));
    }

    let input = open_input(&args.input)?;
    let output = open_output(&args.output)?;

    let frames = if args.wav {
        let pcm = read_wav(input).with_context(|| format!("reading {}", args.input))?;
        let bytes: Vec<u8> = pcm.iter().flat_map(|s| s.to_le_bytes()).collect();
        dump_features(&mut extractor, Cursor::new(bytes), output)?
    } else {
        dump_features(&mut extractor, input, output)?
    };

    log::info!("{} frames written to {}", frames, args.output);
    Ok(())
}
