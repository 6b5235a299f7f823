use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use sound_codec::input::read_wav;
use sound_codec::output::{generate_filename, save, SampleFormat};
use sound_codec::{
    decode, encode, ChannelPayload, EncodeParams, EncodedClip, LoadOptions, SignalBuffer, Strategy,
};

/// Encode a WAV file and write the clip as JSON
pub fn encode_file(
    input_path: &Path,
    output_path: &Path,
    strategy: Strategy,
    params: &EncodeParams,
    options: &LoadOptions,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if verbose {
        println!("Reading audio file...");
    }
    let (buffer, metadata) = read_wav(input_path)?;

    if verbose {
        println!(
            "Loaded {} frames x {} channel(s) at {} Hz ({:.2}s, {}-bit {})",
            metadata.frames,
            metadata.channels,
            metadata.sample_rate,
            buffer.duration_secs(),
            metadata.bits_per_sample,
            if metadata.float { "float" } else { "int" }
        );
    }

    let buffer = options.apply(buffer)?;
    if verbose && (options.mono || buffer.sample_rate() != metadata.sample_rate) {
        println!(
            "Preprocessed to {} channel(s) at {} Hz ({} frames)",
            buffer.channel_count(),
            buffer.sample_rate(),
            buffer.len()
        );
    }

    if verbose {
        println!("Encoding with {}...", strategy);
    }
    let start = Instant::now();
    let clip = encode(&buffer, strategy, params)?;
    let elapsed = start.elapsed();

    if verbose {
        print_channel_summary(&clip, Some(&buffer));
    }

    clip.save(output_path)?;

    println!(
        "Encoded {} coefficient(s) in {:.2}s to {}",
        clip.coefficient_count(),
        elapsed.as_secs_f64(),
        output_path.display()
    );

    Ok(())
}

/// Decode a JSON clip back to a WAV file
///
/// Returns the path written, which is derived from the clip's file name
/// when `output_path` is not given.
pub fn decode_file(
    input_path: &Path,
    output_path: Option<&Path>,
    format: SampleFormat,
    verbose: bool,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let clip = EncodedClip::load(input_path)?;

    if verbose {
        println!(
            "Loaded {} clip: {} channel(s) x {} samples at {} Hz",
            clip.strategy, clip.channel_count, clip.sample_count, clip.sample_rate
        );
    }

    let buffer = decode(&clip)?;

    let output_path = match output_path {
        Some(p) => p.to_path_buf(),
        None => {
            let stem = input_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "clip".to_string());
            let stem = stem.strip_suffix(".clip").unwrap_or(&stem).to_string();
            let filename = generate_filename(&stem, clip.strategy, Local::now());
            input_path.with_file_name(filename)
        }
    };

    save(&buffer, &output_path, format)?;

    println!(
        "Decoded {:.2}s of audio to {}",
        buffer.duration_secs(),
        output_path.display()
    );

    Ok(output_path)
}

/// Print the header and per-channel summary of a JSON clip
pub fn describe_file(input_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let clip = EncodedClip::load(input_path)?;

    println!("{}", input_path.display());
    println!("  strategy:    {}", clip.strategy);
    println!("  sample rate: {} Hz", clip.sample_rate);
    println!("  channels:    {}", clip.channel_count);
    println!(
        "  samples:     {} ({:.2}s)",
        clip.sample_count,
        clip.sample_count as f64 / clip.sample_rate as f64
    );
    println!("  encoded at:  {}", clip.encoded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
    print_channel_summary(&clip, None);

    Ok(())
}

fn print_channel_summary(clip: &EncodedClip, original: Option<&SignalBuffer>) {
    for (i, payload) in clip.channels.iter().enumerate() {
        match payload {
            ChannelPayload::Pursuit {
                records,
                residual_energy,
                termination,
            } => {
                let ratio = original
                    .and_then(|b| b.channel_energy(i))
                    .filter(|&e| e > 0.0)
                    .map(|e| format!(", {:.2}% residual energy", 100.0 * residual_energy / e))
                    .unwrap_or_default();
                println!(
                    "  Channel {}: {} atom(s), stopped: {}{}",
                    i + 1,
                    records.len(),
                    termination,
                    ratio
                );
                if let Some(first) = records.first() {
                    println!(
                        "    strongest: {} scale={} f={:.1} Hz @ {} (coeff {:.4})",
                        first.atom.kind.name(),
                        first.atom.scale,
                        first.atom.frequency,
                        first.offset,
                        first.coefficient
                    );
                }
            }
            ChannelPayload::Fft { coefficients } => {
                let nonzero = coefficients
                    .iter()
                    .filter(|c| c[0] != 0.0 || c[1] != 0.0)
                    .count();
                println!(
                    "  Channel {}: {} FFT bin(s), {} non-zero",
                    i + 1,
                    coefficients.len(),
                    nonzero
                );
            }
            ChannelPayload::Stft {
                window_len,
                hop,
                frames,
            } => {
                let nonzero = frames
                    .iter()
                    .flatten()
                    .filter(|c| c[0] != 0.0 || c[1] != 0.0)
                    .count();
                println!(
                    "  Channel {}: {} frame(s) of {} bins every {} samples, {} non-zero",
                    i + 1,
                    frames.len(),
                    window_len,
                    hop,
                    nonzero
                );
            }
        }
    }
}
