use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::SourceMetadata;
use crate::buffer::SignalBuffer;
use crate::error::{CodecError, Result};

/// Read a WAV file into a buffer, keeping every channel
///
/// Integer PCM is scaled to [-1, 1); float data is passed through.
///
/// # Errors
///
/// `CodecError::UnsupportedFormat` for non-WAV paths or encodings hound
/// rejects, `CodecError::Io` for filesystem failures.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(SignalBuffer, SourceMetadata)> {
    let path = path.as_ref();
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("wave"))
        .unwrap_or(false);
    if !is_wav {
        return Err(CodecError::UnsupportedFormat(format!(
            "{}: only WAV input is supported",
            path.display()
        )));
    }

    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(CodecError::UnsupportedFormat(format!(
            "{}: WAV header declares 0 channels",
            path.display()
        )));
    }

    let metadata = SourceMetadata {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        float: spec.sample_format == SampleFormat::Float,
        frames: reader.duration() as usize,
    };

    let interleaved = match spec.sample_format {
        SampleFormat::Float => read_float_samples(reader)?,
        SampleFormat::Int => read_int_samples(reader, spec.bits_per_sample)?,
    };

    let buffer = SignalBuffer::from_interleaved(spec.sample_rate, spec.channels as usize, &interleaved)?;

    log::info!(
        "{}: read {} frames x {} channel(s) at {} Hz ({:.2} sec)",
        path.display(),
        buffer.len(),
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration_secs()
    );

    Ok((buffer, metadata))
}

/// Read a WAV file into a buffer
pub fn load<P: AsRef<Path>>(path: P) -> Result<SignalBuffer> {
    read_wav(path).map(|(buffer, _)| buffer)
}

fn read_float_samples(mut reader: WavReader<BufReader<File>>) -> Result<Vec<f32>> {
    let samples = reader.samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(samples)
}

fn read_int_samples(mut reader: WavReader<BufReader<File>>, bits: u16) -> Result<Vec<f32>> {
    if bits == 0 || bits > 32 {
        return Err(CodecError::UnsupportedFormat(format!(
            "{} bits per sample",
            bits
        )));
    }
    let max_val = (1i64 << (bits - 1)) as f32;

    let samples = reader
        .samples::<i32>()
        .map(|s| s.map(|s| s as f32 / max_val))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(samples)
}
