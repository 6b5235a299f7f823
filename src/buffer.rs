//! Multi-channel sample buffer shared by every codec

use crate::error::{CodecError, Result};

/// One or more equal-length channels of samples at a fixed sample rate
///
/// The shape is fixed at construction; transforms return new buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SignalBuffer {
    /// Build a buffer from per-channel sample vectors
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Configuration` if the sample rate is zero, there
    /// are no channels, or the channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(CodecError::Configuration(
                "Sample rate must be > 0".to_string(),
            ));
        }
        if channels.is_empty() {
            return Err(CodecError::Configuration(
                "A buffer needs at least one channel".to_string(),
            ));
        }
        let len = channels[0].len();
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, c)| c.len() != len) {
            return Err(CodecError::Configuration(format!(
                "Channel {} has {} samples, expected {}",
                idx,
                ch.len(),
                len
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Single-channel buffer
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Result<Self> {
        Self::new(sample_rate, vec![samples])
    }

    /// Build a buffer from interleaved frames (as stored in WAV data)
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Result<Self> {
        if channel_count == 0 {
            return Err(CodecError::Configuration(
                "A buffer needs at least one channel".to_string(),
            ));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples in each channel
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Sum of squares of one channel, accumulated in f64
    pub fn channel_energy(&self, index: usize) -> Option<f64> {
        self.channel(index).map(energy)
    }

    /// Iterate frames as interleaved samples (channel-minor order)
    pub fn interleaved(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len()).flat_map(move |i| self.channels.iter().map(move |c| c[i]))
    }

    /// Average all channels into a single channel
    pub fn mix_to_mono(&self) -> SignalBuffer {
        if self.channel_count() == 1 {
            return self.clone();
        }
        let n = self.channel_count() as f32;
        let mixed = (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / n)
            .collect();
        SignalBuffer {
            sample_rate: self.sample_rate,
            channels: vec![mixed],
        }
    }

    /// Zero-mean, unit-variance copy of this buffer (per channel)
    ///
    /// A constant channel only has its mean removed.
    pub fn normalized(&self) -> SignalBuffer {
        let channels = self
            .channels
            .iter()
            .map(|c| {
                if c.is_empty() {
                    return Vec::new();
                }
                let n = c.len() as f64;
                let mean = c.iter().map(|&s| s as f64).sum::<f64>() / n;
                let var = c.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                let scale = if std > 0.0 { 1.0 / std } else { 1.0 };
                c.iter().map(|&s| ((s as f64 - mean) * scale) as f32).collect()
            })
            .collect();
        SignalBuffer {
            sample_rate: self.sample_rate,
            channels,
        }
    }

    /// RMS difference against another buffer of the same shape and rate
    pub fn rms_error(&self, other: &SignalBuffer) -> Result<f64> {
        if self.sample_rate != other.sample_rate
            || self.channel_count() != other.channel_count()
            || self.len() != other.len()
        {
            return Err(CodecError::Configuration(format!(
                "Cannot compare {}ch x {} @ {} Hz with {}ch x {} @ {} Hz",
                self.channel_count(),
                self.len(),
                self.sample_rate,
                other.channel_count(),
                other.len(),
                other.sample_rate
            )));
        }
        let total = self.channel_count() * self.len();
        if total == 0 {
            return Ok(0.0);
        }
        let sum_sq: f64 = self
            .channels
            .iter()
            .zip(&other.channels)
            .flat_map(|(a, b)| a.iter().zip(b).map(|(&x, &y)| (x as f64 - y as f64).powi(2)))
            .sum();
        Ok((sum_sq / total as f64).sqrt())
    }
}

/// Sum of squares accumulated in double precision
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_channels() {
        let result = SignalBuffer::new(8000, vec![vec![0.0; 4], vec![0.0; 3]]);
        assert!(matches!(result, Err(CodecError::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_rate_and_no_channels() {
        assert!(SignalBuffer::new(0, vec![vec![0.0]]).is_err());
        assert!(SignalBuffer::new(8000, vec![]).is_err());
    }

    #[test]
    fn test_interleaved_round_trip() {
        let buf = SignalBuffer::from_interleaved(100, 2, &[1.0, -1.0, 2.0, -2.0, 3.0, -3.0]).unwrap();
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.channel(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(buf.channel(1).unwrap(), &[-1.0, -2.0, -3.0]);
        let frames: Vec<f32> = buf.interleaved().collect();
        assert_eq!(frames, vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn test_mix_to_mono_averages() {
        let buf = SignalBuffer::new(100, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let mono = buf.mix_to_mono();
        assert_eq!(mono.channel_count(), 1);
        assert_eq!(mono.channel(0).unwrap(), &[0.5, 0.5]);
    }

    #[test]
    fn test_normalized_has_zero_mean_unit_variance() {
        let buf = SignalBuffer::mono(100, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let norm = buf.normalized();
        let c = norm.channel(0).unwrap();
        let mean: f32 = c.iter().sum::<f32>() / 4.0;
        let var: f32 = c.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalized_constant_channel_is_zeroed() {
        let buf = SignalBuffer::mono(100, vec![0.5; 8]).unwrap();
        assert!(buf.normalized().channel(0).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_rms_error() {
        let a = SignalBuffer::mono(100, vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let b = SignalBuffer::mono(100, vec![0.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((a.rms_error(&b).unwrap() - 1.0).abs() < 1e-12);
        let c = SignalBuffer::mono(200, vec![0.0; 4]).unwrap();
        assert!(a.rms_error(&c).is_err());
    }
}
