use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sound_codec::dictionary::SearchPolicy;
use sound_codec::output::SampleFormat;
use sound_codec::resample::ResampleQuality;
use sound_codec::{
    DictionaryConfig, EncodeParams, FftConfig, FrameConfig, LoadOptions, PursuitConfig, Strategy,
};

mod pipeline;

/// Encode audio clips with matching pursuit or FFT, and decode them back
#[derive(Parser, Debug)]
#[command(name = "sound-codec")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (RUST_LOG overrides the log level)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a WAV file into a JSON clip
    Encode {
        /// Input WAV file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output clip file (default: <INPUT stem>.clip.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Transform strategy: pursuit, fft
        #[arg(short, long, default_value = "pursuit")]
        strategy: Strategy,

        /// Maximum atoms per channel (pursuit)
        #[arg(short, long, default_value = "256")]
        max_atoms: usize,

        /// Stop once residual energy falls to this fraction of the original (pursuit)
        #[arg(long, default_value = "0.01")]
        residual_ratio: f64,

        /// Stop when no atom correlates above this (pursuit)
        #[arg(long, default_value = "1e-6")]
        min_correlation: f64,

        /// Try every offset instead of sampling a quarter-atom hop (pursuit, slow)
        #[arg(long)]
        exhaustive: bool,

        /// Zero FFT bins with magnitude below this (fft, lossy)
        #[arg(long)]
        min_magnitude: Option<f64>,

        /// Encode short-time frames of this many samples (fft)
        #[arg(long)]
        window: Option<usize>,

        /// Samples between frame starts (fft, default: half the window)
        #[arg(long, requires = "window")]
        hop: Option<usize>,

        /// Resample to this rate (Hz) before encoding
        #[arg(short = 'r', long)]
        sample_rate: Option<u32>,

        /// Use linear instead of windowed-sinc interpolation when resampling
        #[arg(long)]
        fast_resample: bool,

        /// Mix all channels to mono before encoding
        #[arg(long)]
        mono: bool,

        /// Normalize to zero mean and unit variance before encoding
        #[arg(long)]
        normalize: bool,
    },

    /// Decode a JSON clip into a WAV file
    Decode {
        /// Input clip file
        #[arg(value_name = "CLIP")]
        input: PathBuf,

        /// Output WAV file (default: <stem>_<strategy>_<timestamp>.wav next to the clip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output float32 WAV instead of int16
        #[arg(long)]
        float32: bool,
    },

    /// Show the header and per-channel summary of a clip
    Info {
        #[arg(value_name = "CLIP")]
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match args.command {
        Command::Encode {
            input,
            output,
            strategy,
            max_atoms,
            residual_ratio,
            min_correlation,
            exhaustive,
            min_magnitude,
            window,
            hop,
            sample_rate,
            fast_resample,
            mono,
            normalize,
        } => {
            let mut dictionary = DictionaryConfig::default();
            if exhaustive {
                dictionary.search = SearchPolicy::Exhaustive;
            }
            let params = EncodeParams {
                dictionary,
                pursuit: PursuitConfig {
                    max_atoms,
                    residual_ratio,
                    min_correlation,
                },
                fft: FftConfig {
                    min_magnitude,
                    frame: window.map(|window_len| match hop {
                        Some(hop) => FrameConfig { window_len, hop },
                        None => FrameConfig::with_overlap(window_len, 0.5),
                    }),
                },
            };
            let options = LoadOptions {
                sample_rate,
                quality: if fast_resample {
                    ResampleQuality::Fast
                } else {
                    ResampleQuality::Best
                },
                mono,
                normalize,
            };
            let output = output.unwrap_or_else(|| input.with_extension("clip.json"));

            if args.verbose {
                println!("Processing file: {}", input.display());
            }
            pipeline::encode_file(&input, &output, strategy, &params, &options, args.verbose)?;
        }
        Command::Decode {
            input,
            output,
            float32,
        } => {
            let format = if float32 {
                SampleFormat::Float32
            } else {
                SampleFormat::Int16
            };
            pipeline::decode_file(&input, output.as_deref(), format, args.verbose)?;
        }
        Command::Info { input } => {
            pipeline::describe_file(&input)?;
        }
    }

    Ok(())
}
