//! Writing sample buffers to WAV files

use chrono::{DateTime, Local};
use hound::{WavSpec, WavWriter};
use std::path::Path;

use crate::buffer::SignalBuffer;
use crate::encoded::Strategy;
use crate::error::{CodecError, Result};

/// Sample encoding of written WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit PCM, clamped to [-1, 1]
    Int16,
    /// 32-bit IEEE float, unclamped
    Float32,
}

/// Write a buffer as a WAV file with one WAV channel per buffer channel
pub fn save<P: AsRef<Path>>(buffer: &SignalBuffer, path: P, format: SampleFormat) -> Result<()> {
    let path = path.as_ref();
    let channels = u16::try_from(buffer.channel_count()).map_err(|_| {
        CodecError::UnsupportedFormat(format!(
            "WAV cannot hold {} channels",
            buffer.channel_count()
        ))
    })?;

    let spec = match format {
        SampleFormat::Int16 => WavSpec {
            channels,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
        SampleFormat::Float32 => WavSpec {
            channels,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
    };

    let mut writer = WavWriter::create(path, spec)?;

    match format {
        SampleFormat::Int16 => {
            let mut clipped = 0usize;
            for sample in buffer.interleaved() {
                if sample.abs() > 1.0 {
                    clipped += 1;
                }
                let s = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(s)?;
            }
            if clipped > 0 {
                log::warn!(
                    "{}: clipped {} sample(s) outside [-1, 1] to 16-bit range",
                    path.display(),
                    clipped
                );
            }
        }
        SampleFormat::Float32 => {
            for sample in buffer.interleaved() {
                writer.write_sample(sample)?;
            }
        }
    }

    writer.finalize()?;
    log::info!(
        "{}: wrote {} frames x {} channel(s) at {} Hz",
        path.display(),
        buffer.len(),
        buffer.channel_count(),
        buffer.sample_rate()
    );
    Ok(())
}

/// Generate an output filename for a decoded clip
pub fn generate_filename(stem: &str, strategy: Strategy, timestamp: DateTime<Local>) -> String {
    format!(
        "{}_{}_{}.wav",
        stem,
        strategy,
        timestamp.format("%Y-%m-%d_%H-%M-%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_filename() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            generate_filename("voice", Strategy::Pursuit, ts),
            "voice_pursuit_2024-03-09_14-05-07.wav"
        );
    }

    #[test]
    fn test_float32_round_trip_is_exact() {
        let path = std::env::temp_dir().join(format!("sound_codec_output_{}.wav", std::process::id()));
        let buffer = SignalBuffer::new(22050, vec![vec![0.5, -0.25, 1.5], vec![0.0, 0.125, -2.0]]).unwrap();
        save(&buffer, &path, SampleFormat::Float32).unwrap();
        let loaded = crate::input::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, buffer);
    }

    #[test]
    fn test_int16_round_trip_is_close() {
        let path = std::env::temp_dir().join(format!("sound_codec_output_i16_{}.wav", std::process::id()));
        let buffer = SignalBuffer::mono(8000, vec![0.5, -0.5, 0.0, 0.99]).unwrap();
        save(&buffer, &path, SampleFormat::Int16).unwrap();
        let loaded = crate::input::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.sample_rate(), 8000);
        for (a, b) in buffer.channel(0).unwrap().iter().zip(loaded.channel(0).unwrap()) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
