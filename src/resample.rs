//! Sample rate conversion
//!
//! Codecs never resample on their own; callers convert a buffer before
//! encoding when they need a particular rate.

use crate::buffer::SignalBuffer;
use crate::error::{CodecError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input frames handed to the sinc resampler per call
const CHUNK_FRAMES: usize = 1024;

/// Interpolation quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleQuality {
    /// Linear interpolation between neighbouring samples
    Fast,
    /// Band-limited sinc interpolation (rubato), low-passed at the lower
    /// Nyquist frequency
    #[default]
    Best,
}

/// Convert `buffer` to `target_rate`
///
/// Output length is `round(len * target_rate / sample_rate)`. Returns an
/// unchanged copy when the rates already match.
///
/// # Errors
///
/// Returns `CodecError::Configuration` if `target_rate` is zero, or
/// `CodecError::Resample` if the sinc resampler rejects the ratio.
pub fn resample(buffer: &SignalBuffer, target_rate: u32, quality: ResampleQuality) -> Result<SignalBuffer> {
    if target_rate == 0 {
        return Err(CodecError::Configuration(
            "Target sample rate must be > 0".to_string(),
        ));
    }
    if target_rate == buffer.sample_rate() {
        return Ok(buffer.clone());
    }

    let ratio = target_rate as f64 / buffer.sample_rate() as f64;
    let out_len = (buffer.len() as f64 * ratio).round() as usize;

    let channels = match quality {
        ResampleQuality::Fast => buffer
            .channels()
            .iter()
            .map(|samples| {
                (0..out_len)
                    .map(|i| linear_at(samples, i as f64 / ratio) as f32)
                    .collect()
            })
            .collect(),
        ResampleQuality::Best => sinc_resample(buffer, ratio, out_len)?,
    };

    let resampled = SignalBuffer::new(target_rate, channels)?;
    log::info!(
        "Resampled {} frames at {} Hz to {} frames at {} Hz ({:?})",
        buffer.len(),
        buffer.sample_rate(),
        resampled.len(),
        target_rate,
        quality
    );
    Ok(resampled)
}

fn linear_at(samples: &[f32], x: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let i = x.floor() as usize;
    if i + 1 >= samples.len() {
        return samples[samples.len() - 1] as f64;
    }
    let frac = x - i as f64;
    samples[i] as f64 * (1.0 - frac) + samples[i + 1] as f64 * frac
}

/// Feed the buffer through a rubato sinc resampler in fixed chunks
///
/// The resampler delays its output by `output_delay()` frames; that lead-in
/// is dropped and the tail is flushed with silence until `out_len` frames
/// are available.
fn sinc_resample(buffer: &SignalBuffer, ratio: f64, out_len: usize) -> Result<Vec<Vec<f32>>> {
    let channel_count = buffer.channel_count();
    if out_len == 0 {
        return Ok(vec![Vec::new(); channel_count]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f64>::new(ratio, 1.0, params, CHUNK_FRAMES, channel_count)?;
    let delay = resampler.output_delay();
    let wanted = delay + out_len;

    let input: Vec<Vec<f64>> = buffer
        .channels()
        .iter()
        .map(|c| c.iter().map(|&s| s as f64).collect())
        .collect();
    let mut output: Vec<Vec<f64>> = vec![Vec::with_capacity(wanted); channel_count];

    let mut pos = 0;
    while output[0].len() < wanted {
        let chunk = if pos < buffer.len() {
            let end = (pos + CHUNK_FRAMES).min(buffer.len());
            let slices: Vec<&[f64]> = input.iter().map(|c| &c[pos..end]).collect();
            pos = end;
            resampler.process_partial(Some(slices.as_slice()), None)?
        } else {
            resampler.process_partial::<&[f64]>(None, None)?
        };
        for (out, frames) in output.iter_mut().zip(chunk) {
            out.extend(frames);
        }
    }

    Ok(output
        .into_iter()
        .map(|c| c[delay..wanted].iter().map(|&s| s as f32).collect())
        .collect())
}
