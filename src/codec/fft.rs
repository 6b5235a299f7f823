//! Dense FFT codec, whole-buffer or framed
//!
//! Whole-buffer mode zero-pads each channel to a transform size rustfft
//! handles efficiently (a 5-smooth length), transforms it forward, and
//! stores the full complex spectrum. Decode runs the inverse transform,
//! scales by `1/N` and crops back to the original length.
//!
//! Framed mode cuts the channel into Hann-windowed frames of `window_len`
//! samples starting every `hop` samples and stores one spectrum per frame.
//! Decode overlap-adds the inverse frames and divides by the summed window,
//! which undoes the analysis window exactly.
//!
//! Nothing is discarded in either mode unless a magnitude threshold is
//! configured.

use super::Codec;
use crate::atom::hann_window;
use crate::buffer::SignalBuffer;
use crate::encoded::{ChannelPayload, EncodedClip, Strategy};
use crate::error::{CodecError, Result};
use rustfft::{num_complex::Complex, FftPlanner};

/// Short-time framing: window length and distance between frame starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    pub window_len: usize,
    pub hop: usize,
}

impl FrameConfig {
    /// Frames of `window_len` samples overlapping by `overlap` (in `[0, 1)`)
    pub fn with_overlap(window_len: usize, overlap: f64) -> Self {
        let hop = (window_len as f64 * (1.0 - overlap)).round() as usize;
        Self {
            window_len,
            hop: hop.clamp(1, window_len.max(1)),
        }
    }

    /// Number of frames needed to cover `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len <= self.window_len {
            1
        } else {
            (len - self.window_len).div_ceil(self.hop) + 1
        }
    }
}

/// FFT codec configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FftConfig {
    /// Zero every coefficient whose magnitude is below this (lossy)
    pub min_magnitude: Option<f64>,
    /// Encode short-time frames instead of one whole-buffer spectrum
    pub frame: Option<FrameConfig>,
}

impl FftConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(frame) = self.frame {
            if frame.window_len == 0 || frame.hop == 0 || frame.hop > frame.window_len {
                return Err(CodecError::Configuration(format!(
                    "Frame hop must be in 1..={} for a {} sample window, got {}",
                    frame.window_len, frame.window_len, frame.hop
                )));
            }
        }
        if let Some(m) = self.min_magnitude {
            if !m.is_finite() || m < 0.0 {
                return Err(CodecError::Configuration(format!(
                    "Magnitude threshold must be finite and >= 0, got {}",
                    m
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FftCodec {
    config: FftConfig,
}

impl FftCodec {
    pub fn new(config: FftConfig) -> Self {
        Self { config }
    }

    /// Forward transform of one channel, padded to `transform_size(len)`
    pub fn encode_channel(&self, samples: &[f32], planner: &mut FftPlanner<f64>) -> Result<Vec<Complex<f64>>> {
        if samples.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        let fft_size = transform_size(samples.len());
        let fft = planner.plan_fft_forward(fft_size);

        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .map(|&s| Complex::new(s as f64, 0.0))
            .collect();
        buffer.resize(fft_size, Complex::new(0.0, 0.0));

        fft.process(&mut buffer);

        let zeroed = self.apply_threshold(&mut buffer);
        if zeroed > 0 {
            log::debug!("Thresholded {} of {} FFT bins", zeroed, fft_size);
        }

        Ok(buffer)
    }

    /// Forward transforms of Hann-windowed frames of one channel
    ///
    /// The last frame is zero-padded past the end of the channel.
    pub fn encode_frames(
        &self,
        samples: &[f32],
        frame: FrameConfig,
        planner: &mut FftPlanner<f64>,
    ) -> Result<Vec<Vec<Complex<f64>>>> {
        if samples.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        let window = hann_window(frame.window_len);
        let fft = planner.plan_fft_forward(frame.window_len);
        let count = frame.frame_count(samples.len());

        let mut zeroed = 0usize;
        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            let start = i * frame.hop;
            let mut buffer: Vec<Complex<f64>> = window
                .iter()
                .enumerate()
                .map(|(n, w)| {
                    let s = samples.get(start + n).copied().unwrap_or(0.0);
                    Complex::new(s as f64 * w, 0.0)
                })
                .collect();
            fft.process(&mut buffer);
            zeroed += self.apply_threshold(&mut buffer);
            frames.push(buffer);
        }

        log::debug!(
            "Framed {} samples into {} window(s) of {} (hop {}), {} bin(s) thresholded",
            samples.len(),
            count,
            frame.window_len,
            frame.hop,
            zeroed
        );
        Ok(frames)
    }

    /// Zero bins below the configured magnitude, returning how many
    fn apply_threshold(&self, spectrum: &mut [Complex<f64>]) -> usize {
        let Some(threshold) = self.config.min_magnitude else {
            return 0;
        };
        let mut zeroed = 0usize;
        for c in spectrum.iter_mut() {
            if c.norm() < threshold {
                *c = Complex::new(0.0, 0.0);
                zeroed += 1;
            }
        }
        zeroed
    }

    /// Overlap-add the inverse frames and divide out the analysis window
    pub fn decode_frames(
        frames: &[Vec<Complex<f64>>],
        frame: FrameConfig,
        original_length: usize,
        planner: &mut FftPlanner<f64>,
    ) -> Vec<f64> {
        let window = hann_window(frame.window_len);
        let ifft = planner.plan_fft_inverse(frame.window_len);
        let total = frames.len().saturating_sub(1) * frame.hop + frame.window_len;
        let scale = 1.0 / frame.window_len as f64;

        let mut sum = vec![0.0f64; total.max(original_length)];
        let mut weight = vec![0.0f64; sum.len()];
        for (i, spectrum) in frames.iter().enumerate() {
            let start = i * frame.hop;
            let mut buffer = spectrum.clone();
            ifft.process(&mut buffer);
            for (n, (c, w)) in buffer.iter().zip(&window).enumerate() {
                sum[start + n] += c.re * scale;
                weight[start + n] += w;
            }
        }

        sum.iter()
            .zip(&weight)
            .take(original_length)
            .map(|(&s, &w)| if w > 0.0 { s / w } else { 0.0 })
            .collect()
    }

    /// Inverse transform of one spectrum, cropped to `original_length`
    pub fn decode_channel(
        coefficients: &[Complex<f64>],
        original_length: usize,
        planner: &mut FftPlanner<f64>,
    ) -> Vec<f64> {
        if coefficients.is_empty() {
            return vec![0.0; original_length];
        }
        let fft_size = coefficients.len();
        let ifft = planner.plan_fft_inverse(fft_size);

        let mut buffer = coefficients.to_vec();
        ifft.process(&mut buffer);

        let scale = 1.0 / fft_size as f64;
        buffer
            .iter()
            .take(original_length)
            .map(|c| c.re * scale)
            .collect()
    }
}

impl Codec for FftCodec {
    fn strategy(&self) -> Strategy {
        Strategy::Fft
    }

    fn encode(&self, buffer: &SignalBuffer) -> Result<EncodedClip> {
        self.config.validate()?;
        if buffer.is_empty() {
            return Err(CodecError::EmptyInput);
        }

        match self.config.frame {
            Some(frame) => log::debug!(
                "FFT encoding {} channel(s) x {} samples in {} frame(s) of {}",
                buffer.channel_count(),
                buffer.len(),
                frame.frame_count(buffer.len()),
                frame.window_len
            ),
            None => log::debug!(
                "FFT encoding {} channel(s) x {} samples (transform size {})",
                buffer.channel_count(),
                buffer.len(),
                transform_size(buffer.len())
            ),
        }

        let mut planner = FftPlanner::new();
        let channels = buffer
            .channels()
            .iter()
            .map(|samples| match self.config.frame {
                Some(frame) => {
                    let frames = self.encode_frames(samples, frame, &mut planner)?;
                    Ok(ChannelPayload::Stft {
                        window_len: frame.window_len,
                        hop: frame.hop,
                        frames: frames.iter().map(|f| to_pairs(f)).collect(),
                    })
                }
                None => {
                    let spectrum = self.encode_channel(samples, &mut planner)?;
                    Ok(ChannelPayload::Fft {
                        coefficients: to_pairs(&spectrum),
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodedClip::new(
            Strategy::Fft,
            buffer.sample_rate(),
            buffer.len(),
            channels,
        ))
    }

    fn decode(&self, clip: &EncodedClip) -> Result<SignalBuffer> {
        clip.validate()?;

        let mut planner = FftPlanner::new();
        let mut channels = Vec::with_capacity(clip.channel_count);
        for payload in &clip.channels {
            let samples = match payload {
                ChannelPayload::Fft { coefficients } => {
                    Self::decode_channel(&from_pairs(coefficients), clip.sample_count, &mut planner)
                }
                ChannelPayload::Stft {
                    window_len,
                    hop,
                    frames,
                } => {
                    let frame = FrameConfig {
                        window_len: *window_len,
                        hop: *hop,
                    };
                    let spectra: Vec<Vec<Complex<f64>>> = frames.iter().map(|f| from_pairs(f)).collect();
                    Self::decode_frames(&spectra, frame, clip.sample_count, &mut planner)
                }
                other => {
                    return Err(CodecError::Configuration(format!(
                        "FFT codec cannot decode {} payload",
                        other.strategy()
                    )))
                }
            };
            channels.push(samples.into_iter().map(|s| s as f32).collect());
        }

        SignalBuffer::new(clip.sample_rate, channels)
    }
}

fn to_pairs(spectrum: &[Complex<f64>]) -> Vec<[f64; 2]> {
    spectrum.iter().map(|c| [c.re, c.im]).collect()
}

fn from_pairs(pairs: &[[f64; 2]]) -> Vec<Complex<f64>> {
    pairs.iter().map(|&[re, im]| Complex::new(re, im)).collect()
}

/// Smallest length >= `len` whose only prime factors are 2, 3 and 5
pub fn transform_size(len: usize) -> usize {
    let mut n = len.max(1);
    loop {
        if is_five_smooth(n) {
            return n;
        }
        n += 1;
    }
}

fn is_five_smooth(mut n: usize) -> bool {
    for p in [2, 3, 5] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}
