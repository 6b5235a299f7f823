//! Transform-domain representation of a clip and its JSON persistence
//!
//! An [`EncodedClip`] carries everything decode needs to rebuild a buffer
//! of the original shape: strategy tag, sample rate, channel count, samples
//! per channel, and one payload per channel.

use crate::atom::Atom;
use crate::error::{CodecError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Version written into every persisted clip
pub const FORMAT_VERSION: u32 = 1;

/// Longest channel a clip may declare (about 93 minutes at 48 kHz)
pub const MAX_SAMPLE_COUNT: usize = 1 << 28;

/// Transform used to produce a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Sparse matching pursuit over an atom dictionary
    Pursuit,
    /// Dense FFT, whole-buffer or framed
    Fft,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Pursuit => write!(f, "pursuit"),
            Strategy::Fft => write!(f, "fft"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pursuit" | "mp" => Ok(Strategy::Pursuit),
            "fft" => Ok(Strategy::Fft),
            _ => Err(format!("Invalid strategy '{}'. Use: pursuit, fft", s)),
        }
    }
}

/// One selected atom: `coefficient * atom` placed at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub atom: Atom,
    pub coefficient: f64,
    /// Start sample of the atom within the channel
    pub offset: usize,
}

/// Why a pursuit stopped selecting atoms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The configured atom budget was used up
    MaxAtoms,
    /// Residual energy fell to the configured fraction of the original
    ResidualEnergy,
    /// No atom correlated above the numeric floor
    CorrelationFloor,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::MaxAtoms => write!(f, "max atoms reached"),
            Termination::ResidualEnergy => write!(f, "residual energy target met"),
            Termination::CorrelationFloor => write!(f, "correlation below floor"),
        }
    }
}

/// Per-channel payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelPayload {
    /// Atom records in greedy selection order (not time order)
    Pursuit {
        records: Vec<AtomRecord>,
        residual_energy: f64,
        termination: Termination,
    },
    /// `[re, im]` pairs, one per transform bin
    Fft { coefficients: Vec<[f64; 2]> },
    /// Short-time spectra of Hann-windowed frames starting every `hop`
    /// samples, each `window_len` bins of `[re, im]`
    Stft {
        window_len: usize,
        hop: usize,
        frames: Vec<Vec<[f64; 2]>>,
    },
}

impl ChannelPayload {
    pub fn strategy(&self) -> Strategy {
        match self {
            ChannelPayload::Pursuit { .. } => Strategy::Pursuit,
            ChannelPayload::Fft { .. } | ChannelPayload::Stft { .. } => Strategy::Fft,
        }
    }

    /// Atom records for pursuit payloads, `None` for FFT payloads
    pub fn records(&self) -> Option<&[AtomRecord]> {
        match self {
            ChannelPayload::Pursuit { records, .. } => Some(records),
            ChannelPayload::Fft { .. } | ChannelPayload::Stft { .. } => None,
        }
    }

    /// Number of stored coefficients (atoms or FFT bins)
    pub fn coefficient_count(&self) -> usize {
        match self {
            ChannelPayload::Pursuit { records, .. } => records.len(),
            ChannelPayload::Fft { coefficients } => coefficients.len(),
            ChannelPayload::Stft { frames, .. } => frames.iter().map(Vec::len).sum(),
        }
    }
}

/// Encoded form of a multi-channel buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedClip {
    pub version: u32,
    pub strategy: Strategy,
    pub sample_rate: u32,
    pub channel_count: usize,
    /// Samples per channel of the original buffer
    pub sample_count: usize,
    pub encoded_at: DateTime<Utc>,
    pub channels: Vec<ChannelPayload>,
}

impl EncodedClip {
    pub fn new(strategy: Strategy, sample_rate: u32, sample_count: usize, channels: Vec<ChannelPayload>) -> Self {
        Self {
            version: FORMAT_VERSION,
            strategy,
            sample_rate,
            channel_count: channels.len(),
            sample_count,
            encoded_at: Utc::now(),
            channels,
        }
    }

    /// Check that header and payloads agree
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Configuration` describing the first mismatch.
    pub fn validate(&self) -> Result<()> {
        if self.version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedFormat(format!(
                "Clip format version {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        if self.sample_rate == 0 {
            return Err(CodecError::Configuration(
                "Malformed clip: sample rate is 0".to_string(),
            ));
        }
        if self.sample_count > MAX_SAMPLE_COUNT {
            return Err(CodecError::Configuration(format!(
                "Malformed clip: {} samples per channel exceeds the limit of {}",
                self.sample_count, MAX_SAMPLE_COUNT
            )));
        }
        if self.channel_count == 0 || self.channel_count != self.channels.len() {
            return Err(CodecError::Configuration(format!(
                "Malformed clip: header says {} channel(s), payload has {}",
                self.channel_count,
                self.channels.len()
            )));
        }
        for (idx, payload) in self.channels.iter().enumerate() {
            if payload.strategy() != self.strategy {
                return Err(CodecError::Configuration(format!(
                    "Malformed clip: channel {} holds {} data in a {} clip",
                    idx,
                    payload.strategy(),
                    self.strategy
                )));
            }
            match payload {
                ChannelPayload::Pursuit { records, .. } => {
                    if let Some(r) = records.iter().find(|r| r.atom.scale > self.sample_count) {
                        return Err(CodecError::Configuration(format!(
                            "Malformed clip: channel {} has a {} sample atom in a {} sample clip",
                            idx, r.atom.scale, self.sample_count
                        )));
                    }
                }
                ChannelPayload::Fft { coefficients } => {
                    if coefficients.len() < self.sample_count || coefficients.is_empty() {
                        return Err(CodecError::Configuration(format!(
                            "Malformed clip: channel {} has {} FFT bins for {} samples",
                            idx,
                            coefficients.len(),
                            self.sample_count
                        )));
                    }
                }
                ChannelPayload::Stft {
                    window_len,
                    hop,
                    frames,
                } => {
                    if *window_len == 0 || *hop == 0 || hop > window_len {
                        return Err(CodecError::Configuration(format!(
                            "Malformed clip: channel {} has window {} with hop {}",
                            idx, window_len, hop
                        )));
                    }
                    if frames.iter().any(|f| f.len() != *window_len) {
                        return Err(CodecError::Configuration(format!(
                            "Malformed clip: channel {} has a frame that is not {} bins",
                            idx, window_len
                        )));
                    }
                    let covered = frames.len().saturating_sub(1) * hop + window_len;
                    if frames.is_empty() || covered < self.sample_count {
                        return Err(CodecError::Configuration(format!(
                            "Malformed clip: channel {} frames cover {} of {} samples",
                            idx,
                            if frames.is_empty() { 0 } else { covered },
                            self.sample_count
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Total atoms or bins across all channels
    pub fn coefficient_count(&self) -> usize {
        self.channels.iter().map(|c| c.coefficient_count()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let clip: EncodedClip = serde_json::from_str(json)?;
        clip.validate()?;
        Ok(clip)
    }

    /// Write the clip as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        log::info!(
            "{}: wrote {} clip ({} coefficient(s))",
            path.display(),
            self.strategy,
            self.coefficient_count()
        );
        Ok(())
    }

    /// Read and validate a clip written by [`EncodedClip::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let clip: EncodedClip = serde_json::from_reader(reader)?;
        clip.validate()?;
        log::info!(
            "{}: read {} clip, {} channel(s) x {} samples at {} Hz",
            path.display(),
            clip.strategy,
            clip.channel_count,
            clip.sample_count,
            clip.sample_rate
        );
        Ok(clip)
    }
}
