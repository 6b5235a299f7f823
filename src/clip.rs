//! Named clips: a buffer plus where it came from

use std::path::{Path, PathBuf};

use crate::buffer::SignalBuffer;
use crate::codec::{self, EncodeParams};
use crate::encoded::{EncodedClip, Strategy};
use crate::error::Result;
use crate::input;
use crate::output::{self, SampleFormat};
use crate::resample::{resample, ResampleQuality};

/// Preprocessing applied when loading a clip from disk
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Resample to this rate if the file differs
    pub sample_rate: Option<u32>,
    pub quality: ResampleQuality,
    /// Average all channels into one
    pub mono: bool,
    /// Zero mean, unit variance per channel
    pub normalize: bool,
}

impl LoadOptions {
    /// Mix, resample, then normalize `buffer` as configured
    pub fn apply(&self, mut buffer: SignalBuffer) -> Result<SignalBuffer> {
        if self.mono {
            buffer = buffer.mix_to_mono();
        }
        if let Some(rate) = self.sample_rate {
            if rate != buffer.sample_rate() {
                buffer = resample(&buffer, rate, self.quality)?;
            }
        }
        if self.normalize {
            buffer = buffer.normalized();
            log::info!("Normalized {} samples per channel", buffer.len());
        }
        Ok(buffer)
    }
}

/// A single piece of sound with a title and optional source path
#[derive(Debug, Clone)]
pub struct Clip {
    pub title: String,
    pub source: Option<PathBuf>,
    pub buffer: SignalBuffer,
}

impl Clip {
    pub fn new(title: impl Into<String>, buffer: SignalBuffer) -> Self {
        Self {
            title: title.into(),
            source: None,
            buffer,
        }
    }

    /// Load a WAV file and apply `options` in order: mix, resample, normalize
    pub fn load<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let buffer = options.apply(input::load(path)?)?;

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());

        Ok(Self {
            title,
            source: Some(path.to_path_buf()),
            buffer,
        })
    }

    /// Rebuild a clip from its encoded form
    pub fn from_encoded(title: impl Into<String>, encoded: &EncodedClip) -> Result<Self> {
        Ok(Self::new(title, codec::decode(encoded)?))
    }

    pub fn encode(&self, strategy: Strategy, params: &EncodeParams) -> Result<EncodedClip> {
        codec::encode(&self.buffer, strategy, params)
    }

    /// Encode then decode, returning the approximation
    pub fn reconstruct(&self, strategy: Strategy, params: &EncodeParams) -> Result<Clip> {
        let encoded = self.encode(strategy, params)?;
        let mut clip = Self::from_encoded(format!("{} ({})", self.title, strategy), &encoded)?;
        clip.source = self.source.clone();
        Ok(clip)
    }

    pub fn rms_error(&self, other: &Clip) -> Result<f64> {
        self.buffer.rms_error(&other.buffer)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: SampleFormat) -> Result<()> {
        output::save(&self.buffer, path, format)
    }
}
