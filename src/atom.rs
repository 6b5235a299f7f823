//! Parameterized unit-energy waveforms used as pursuit basis elements
//!
//! An [`Atom`] is a small descriptor: its waveform is never stored, only
//! re-rendered on demand from `(kind, scale, frequency, phase, chirp)` and the
//! sample rate of the buffer it belongs to. Rendering is deterministic, so
//! an encoder and a decoder that agree on the descriptor agree on the
//! samples.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Order of the gamma envelope used by [`AtomKind::Gammatone`]
pub const GAMMATONE_ORDER: i32 = 4;

/// Below this squared norm a rendered waveform is considered silent
const MIN_WAVEFORM_ENERGY: f64 = f64::EPSILON;

/// Envelope family of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomKind {
    /// Plain sinusoid with a rectangular envelope
    Sinusoid,
    /// Sinusoid under a Hann envelope
    Gabor,
    /// Sinusoid under a 4th order gamma envelope with ERB bandwidth
    Gammatone,
    /// Gammatone whose carrier phase bends by `chirp * ln(t)`
    Gammachirp,
}

impl AtomKind {
    pub fn name(&self) -> &'static str {
        match self {
            AtomKind::Sinusoid => "sinusoid",
            AtomKind::Gabor => "gabor",
            AtomKind::Gammatone => "gammatone",
            AtomKind::Gammachirp => "gammachirp",
        }
    }
}

/// Descriptor of a single atom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub kind: AtomKind,
    /// Support length in samples
    pub scale: usize,
    /// Carrier frequency in Hz
    pub frequency: f64,
    /// Carrier phase in radians
    pub phase: f64,
    /// Frequency asymmetry, only non-zero for gammachirps
    #[serde(default)]
    pub chirp: f64,
}

impl Atom {
    pub fn new(kind: AtomKind, scale: usize, frequency: f64, phase: f64) -> Self {
        Self {
            kind,
            scale,
            frequency,
            phase,
            chirp: 0.0,
        }
    }

    pub fn gammachirp(scale: usize, frequency: f64, phase: f64, chirp: f64) -> Self {
        Self {
            chirp,
            ..Self::new(AtomKind::Gammachirp, scale, frequency, phase)
        }
    }

    /// Check that the descriptor can be rendered at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidAtomParameters` for a zero scale, a
    /// frequency outside `[0, sample_rate / 2]`, a non-finite phase, or a
    /// chirp on anything but a gammachirp.
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(CodecError::InvalidAtomParameters(
                "Sample rate must be > 0".to_string(),
            ));
        }
        if self.scale == 0 {
            return Err(CodecError::InvalidAtomParameters(format!(
                "{} atom has zero scale",
                self.kind.name()
            )));
        }
        let nyquist = sample_rate as f64 / 2.0;
        if !self.frequency.is_finite() || self.frequency < 0.0 || self.frequency > nyquist {
            return Err(CodecError::InvalidAtomParameters(format!(
                "Frequency {} Hz outside [0, {}] Hz",
                self.frequency, nyquist
            )));
        }
        if !self.phase.is_finite() {
            return Err(CodecError::InvalidAtomParameters(format!(
                "Phase {} is not finite",
                self.phase
            )));
        }
        if !self.chirp.is_finite() || (self.chirp != 0.0 && self.kind != AtomKind::Gammachirp) {
            return Err(CodecError::InvalidAtomParameters(format!(
                "Chirp {} not allowed on a {} atom",
                self.chirp,
                self.kind.name()
            )));
        }
        Ok(())
    }

    /// Render `scale` samples of this atom, normalized to unit L2 norm
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidAtomParameters` if the descriptor is
    /// invalid or the rendered waveform is silent (e.g. a 0 Hz carrier at
    /// phase pi/2).
    pub fn render(&self, sample_rate: u32) -> Result<Vec<f64>> {
        self.validate(sample_rate)?;

        let sr = sample_rate as f64;
        let omega = 2.0 * PI * self.frequency / sr;
        let mut wave: Vec<f64> = match self.kind {
            AtomKind::Sinusoid => (0..self.scale)
                .map(|n| (omega * n as f64 + self.phase).cos())
                .collect(),
            AtomKind::Gabor => hann_window(self.scale)
                .into_iter()
                .enumerate()
                .map(|(n, w)| w * (omega * n as f64 + self.phase).cos())
                .collect(),
            AtomKind::Gammatone | AtomKind::Gammachirp => gamma_envelope(self.scale, sr, erb(self.frequency))
                .into_iter()
                .enumerate()
                .map(|(n, env)| {
                    let bend = if self.chirp != 0.0 && n > 0 {
                        self.chirp * (n as f64 / sr).ln()
                    } else {
                        0.0
                    };
                    env * (omega * n as f64 + self.phase + bend).cos()
                })
                .collect(),
        };

        let norm_sq: f64 = wave.iter().map(|x| x * x).sum();
        if norm_sq < MIN_WAVEFORM_ENERGY {
            return Err(CodecError::InvalidAtomParameters(format!(
                "{} atom (scale={}, frequency={} Hz, phase={}) renders to silence",
                self.kind.name(),
                self.scale,
                self.frequency,
                self.phase
            )));
        }
        let inv = 1.0 / norm_sq.sqrt();
        wave.iter_mut().for_each(|x| *x *= inv);
        Ok(wave)
    }
}

/// Equivalent rectangular bandwidth of frequency `f` (Hz)
pub fn erb(f: f64) -> f64 {
    0.1039 * f + 24.7
}

/// `t^(order-1) exp(-2 pi b t)` over `size` samples, scaled to peak 1
pub fn gamma_envelope(size: usize, sample_rate: f64, bandwidth: f64) -> Vec<f64> {
    let mut env: Vec<f64> = (0..size)
        .map(|n| {
            let t = n as f64 / sample_rate;
            t.powi(GAMMATONE_ORDER - 1) * (-2.0 * PI * bandwidth * t).exp()
        })
        .collect();
    let peak = env.iter().copied().fold(0.0f64, f64::max);
    if peak > 0.0 {
        env.iter_mut().for_each(|x| *x /= peak);
    }
    env
}

/// Hann window sampled at bin centers
///
/// Uses `sin^2(pi (n + 0.5) / size)` so no sample is exactly zero, which
/// keeps two-sample atoms renderable.
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|n| {
            let x = PI * (n as f64 + 0.5) / size as f64;
            x.sin().powi(2)
        })
        .collect()
}
