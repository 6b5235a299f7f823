//! Matching pursuit: greedy sparse approximation over an atom dictionary
//!
//! Each channel runs an independent state machine:
//!
//! 1. **Init**: residual = channel (in f64), nothing selected
//! 2. **Check termination**: atom budget spent, residual energy at or below
//!    `residual_ratio` of the original, or (after selection) best
//!    correlation under `min_correlation`
//! 3. **Select atom**: scan every candidate at every admissible offset and
//!    keep the largest |<residual, atom>|; the first maximum in enumeration
//!    order wins, then the smallest offset
//! 4. **Update residual**: subtract `coefficient * atom` at the offset,
//!    record it, go to 2
//!
//! Because atoms have unit norm, each update removes exactly
//! `coefficient^2` of energy (up to rounding), so residual energy never
//! increases.
//!
//! [`ChannelPursuit`] exposes the loop one step at a time so callers can
//! encode a few atoms, inspect the residual, and resume later.

use super::Codec;
use crate::atom::Atom;
use crate::buffer::SignalBuffer;
use crate::dictionary::{Dictionary, DictionaryConfig};
use crate::encoded::{AtomRecord, ChannelPayload, EncodedClip, Strategy, Termination};
use crate::error::{CodecError, Result};

/// Termination settings for one encode call
#[derive(Debug, Clone, PartialEq)]
pub struct PursuitConfig {
    /// Stop after this many atoms per channel
    pub max_atoms: usize,
    /// Stop once residual energy <= this fraction of the original energy
    pub residual_ratio: f64,
    /// Stop when the best |correlation| is below this
    pub min_correlation: f64,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self {
            max_atoms: 256,
            residual_ratio: 0.01,
            min_correlation: 1e-6,
        }
    }
}

impl PursuitConfig {
    /// Reject settings that cannot drive a pursuit
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Configuration` if `max_atoms` is zero,
    /// `residual_ratio` is not in `(0, 1)`, or `min_correlation` is not
    /// positive and finite.
    pub fn validate(&self) -> Result<()> {
        if self.max_atoms == 0 {
            return Err(CodecError::Configuration(
                "max_atoms must be > 0".to_string(),
            ));
        }
        if !self.residual_ratio.is_finite() || self.residual_ratio <= 0.0 {
            return Err(CodecError::Configuration(format!(
                "residual_ratio must be > 0, got {}",
                self.residual_ratio
            )));
        }
        if self.residual_ratio >= 1.0 {
            return Err(CodecError::Configuration(format!(
                "residual_ratio {} would stop before the first of {} atom(s)",
                self.residual_ratio, self.max_atoms
            )));
        }
        if !self.min_correlation.is_finite() || self.min_correlation <= 0.0 {
            return Err(CodecError::Configuration(format!(
                "min_correlation must be > 0, got {}",
                self.min_correlation
            )));
        }
        Ok(())
    }
}

/// Best match found by one selection scan
#[derive(Debug, Clone, Copy)]
struct Selection {
    atom: Atom,
    offset: usize,
    coefficient: f64,
}

/// Residual state of one channel being encoded
pub struct ChannelPursuit<'d> {
    dictionary: &'d Dictionary,
    config: PursuitConfig,
    residual: Vec<f64>,
    selected: Vec<AtomRecord>,
    original_energy: f64,
    residual_energy: f64,
    termination: Option<Termination>,
}

impl<'d> ChannelPursuit<'d> {
    /// Start a pursuit over `samples`
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EmptyInput` for an empty channel and
    /// `CodecError::Configuration` for an invalid `config`.
    pub fn new(dictionary: &'d Dictionary, config: PursuitConfig, samples: &[f32]) -> Result<Self> {
        config.validate()?;
        if samples.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        let residual: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let energy = sum_of_squares(&residual);
        Ok(Self {
            dictionary,
            config,
            residual,
            selected: Vec::new(),
            original_energy: energy,
            residual_energy: energy,
            termination: None,
        })
    }

    pub fn iteration(&self) -> usize {
        self.selected.len()
    }

    pub fn original_energy(&self) -> f64 {
        self.original_energy
    }

    pub fn residual_energy(&self) -> f64 {
        self.residual_energy
    }

    pub fn residual(&self) -> &[f64] {
        &self.residual
    }

    pub fn selected(&self) -> &[AtomRecord] {
        &self.selected
    }

    /// `Some` once the pursuit has stopped
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Run one select/update cycle
    ///
    /// Returns the record that was added, or `None` once a termination
    /// condition holds. Further calls after termination keep returning
    /// `None`.
    pub fn step(&mut self) -> Result<Option<AtomRecord>> {
        if self.termination.is_some() {
            return Ok(None);
        }
        if self.selected.len() >= self.config.max_atoms {
            return Ok(self.stop(Termination::MaxAtoms));
        }
        if self.residual_energy <= self.config.residual_ratio * self.original_energy {
            return Ok(self.stop(Termination::ResidualEnergy));
        }

        let best = match self.select_atom()? {
            Some(best) if best.coefficient.abs() >= self.config.min_correlation => best,
            _ => return Ok(self.stop(Termination::CorrelationFloor)),
        };

        let wave = self.dictionary.materialize(&best.atom, best.atom.scale)?;
        let window = &mut self.residual[best.offset..best.offset + wave.len()];
        for (r, w) in window.iter_mut().zip(&wave) {
            *r -= best.coefficient * w;
        }
        self.residual_energy = sum_of_squares(&self.residual);

        let record = AtomRecord {
            atom: best.atom,
            coefficient: best.coefficient,
            offset: best.offset,
        };
        self.selected.push(record);

        log::trace!(
            "Atom {}: {} scale={} f={:.1} Hz phase={:.3} @ {} coeff={:.6}, residual energy {:.6e}",
            self.selected.len(),
            best.atom.kind.name(),
            best.atom.scale,
            best.atom.frequency,
            best.atom.phase,
            best.offset,
            best.coefficient,
            self.residual_energy
        );

        Ok(Some(record))
    }

    /// Step until a termination condition holds
    pub fn run(&mut self) -> Result<Termination> {
        while self.step()?.is_some() {}
        // step() only returns None after setting a termination reason
        Ok(self.termination.unwrap_or(Termination::CorrelationFloor))
    }

    /// Consume the pursuit into a channel payload, running it to completion
    pub fn finish(mut self) -> Result<ChannelPayload> {
        let termination = self.run()?;
        Ok(ChannelPayload::Pursuit {
            records: self.selected,
            residual_energy: self.residual_energy,
            termination,
        })
    }

    fn stop(&mut self, reason: Termination) -> Option<AtomRecord> {
        log::debug!(
            "Pursuit stopped after {} atom(s): {} (residual {:.3e} of {:.3e})",
            self.selected.len(),
            reason,
            self.residual_energy,
            self.original_energy
        );
        self.termination = Some(reason);
        None
    }

    /// Exhaustive scan for the atom/offset with the largest |correlation|
    fn select_atom(&self) -> Result<Option<Selection>> {
        let len = self.residual.len();
        let mut best: Option<Selection> = None;

        for atom in self.dictionary.propose_candidates(len) {
            let wave = match self.dictionary.materialize(&atom, atom.scale) {
                Ok(wave) => wave,
                Err(CodecError::InvalidAtomParameters(msg)) => {
                    log::trace!("Skipping candidate: {}", msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            for offset in self.dictionary.admissible_offsets(&atom, len) {
                let coefficient = dot(&wave, &self.residual[offset..offset + wave.len()]);
                let better = match &best {
                    None => true,
                    Some(b) => coefficient.abs() > b.coefficient.abs(),
                };
                if better {
                    best = Some(Selection {
                        atom,
                        offset,
                        coefficient,
                    });
                }
            }
        }

        Ok(best)
    }
}

/// Codec wrapping a dictionary configuration and termination settings
#[derive(Debug, Clone, Default)]
pub struct MatchingPursuitCodec {
    dictionary: DictionaryConfig,
    config: PursuitConfig,
}

impl MatchingPursuitCodec {
    pub fn new(dictionary: DictionaryConfig, config: PursuitConfig) -> Self {
        Self { dictionary, config }
    }

    pub fn config(&self) -> &PursuitConfig {
        &self.config
    }
}

impl Codec for MatchingPursuitCodec {
    fn strategy(&self) -> Strategy {
        Strategy::Pursuit
    }

    fn encode(&self, buffer: &SignalBuffer) -> Result<EncodedClip> {
        self.config.validate()?;
        if buffer.is_empty() {
            return Err(CodecError::EmptyInput);
        }
        let dictionary = Dictionary::new(buffer.sample_rate(), &self.dictionary)?;

        log::debug!(
            "Pursuit encoding {} channel(s) x {} samples, {} candidate atom(s), max {} atom(s)",
            buffer.channel_count(),
            buffer.len(),
            dictionary.candidate_count(buffer.len()),
            self.config.max_atoms
        );

        let channels = buffer
            .channels()
            .iter()
            .map(|samples| ChannelPursuit::new(&dictionary, self.config.clone(), samples)?.finish())
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodedClip::new(
            Strategy::Pursuit,
            buffer.sample_rate(),
            buffer.len(),
            channels,
        ))
    }

    fn decode(&self, clip: &EncodedClip) -> Result<SignalBuffer> {
        clip.validate()?;

        let mut channels = Vec::with_capacity(clip.channel_count);
        for payload in &clip.channels {
            let records = payload.records().ok_or_else(|| {
                CodecError::Configuration(format!(
                    "Pursuit codec cannot decode {} payload",
                    payload.strategy()
                ))
            })?;
            let samples = reconstruct(records, clip.sample_rate, clip.sample_count)?;
            channels.push(samples.into_iter().map(|s| s as f32).collect());
        }

        SignalBuffer::new(clip.sample_rate, channels)
    }
}

/// Sum scaled, shifted atoms into a zeroed buffer of `length` samples
///
/// The result does not depend on record order. Atom samples past the end of
/// the buffer are dropped.
///
/// # Errors
///
/// Returns `CodecError::InvalidAtomParameters` if a record's atom cannot be
/// rendered at `sample_rate`.
pub fn reconstruct(records: &[AtomRecord], sample_rate: u32, length: usize) -> Result<Vec<f64>> {
    let mut out = vec![0.0f64; length];
    for record in records {
        if record.offset >= length {
            continue;
        }
        let wave = record.atom.render(sample_rate)?;
        for (o, w) in out[record.offset..].iter_mut().zip(&wave) {
            *o += record.coefficient * w;
        }
    }
    Ok(out)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sum_of_squares(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomKind;
    use crate::dictionary::{EdgePolicy, FrequencyGrid, SearchPolicy};
    use std::f64::consts::{FRAC_PI_2, PI};

    fn test_dictionary_config() -> DictionaryConfig {
        DictionaryConfig {
            kinds: vec![AtomKind::Gabor, AtomKind::Sinusoid],
            scales: vec![32, 128],
            frequencies: FrequencyGrid::Explicit(vec![250.0, 500.0, 1000.0, 2000.0]),
            phases: vec![0.0, FRAC_PI_2],
            chirps: vec![],
            search: SearchPolicy::Sampled { hop_divisor: 8 },
            edge: EdgePolicy::Exclude,
        }
    }

    fn two_tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                let t = n as f64 / 8000.0;
                (0.6 * (2.0 * PI * 500.0 * t).sin() + 0.3 * (2.0 * PI * 2000.0 * t).cos()) as f32
            })
            .collect()
    }

    #[test]
    fn test_config_validation() {
        let ok = PursuitConfig::default();
        assert!(ok.validate().is_ok());

        let bad = [
            PursuitConfig { max_atoms: 0, ..ok.clone() },
            PursuitConfig { residual_ratio: 0.0, ..ok.clone() },
            PursuitConfig { residual_ratio: -0.5, ..ok.clone() },
            PursuitConfig { residual_ratio: 1.0, ..ok.clone() },
            PursuitConfig { min_correlation: 0.0, ..ok.clone() },
            PursuitConfig { min_correlation: f64::NAN, ..ok.clone() },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(CodecError::Configuration(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_energy_never_increases() {
        let dict = Dictionary::new(8000, &test_dictionary_config()).unwrap();
        let samples = two_tone(512);
        let config = PursuitConfig {
            max_atoms: 40,
            residual_ratio: 1e-9,
            min_correlation: 1e-9,
        };
        let mut pursuit = ChannelPursuit::new(&dict, config, &samples).unwrap();
        let mut previous = pursuit.residual_energy();
        while let Some(record) = pursuit.step().unwrap() {
            let current = pursuit.residual_energy();
            assert!(
                current <= previous + previous * 1e-12,
                "energy rose from {} to {}",
                previous,
                current
            );
            // unit-norm atoms remove exactly coefficient^2
            let removed = previous - current;
            assert!((removed - record.coefficient * record.coefficient).abs() < 1e-9 * pursuit.original_energy());
            previous = current;
        }
        assert!(pursuit.termination().is_some());
    }

    #[test]
    fn test_zero_input_stops_immediately() {
        let dict = Dictionary::new(8000, &test_dictionary_config()).unwrap();
        let mut pursuit = ChannelPursuit::new(&dict, PursuitConfig::default(), &[0.0; 256]).unwrap();
        assert_eq!(pursuit.run().unwrap(), Termination::ResidualEnergy);
        assert_eq!(pursuit.iteration(), 0);
    }

    #[test]
    fn test_empty_channel_is_rejected() {
        let dict = Dictionary::new(8000, &test_dictionary_config()).unwrap();
        assert!(matches!(
            ChannelPursuit::new(&dict, PursuitConfig::default(), &[]),
            Err(CodecError::EmptyInput)
        ));
    }

    #[test]
    fn test_max_atoms_terminates() {
        let dict = Dictionary::new(8000, &test_dictionary_config()).unwrap();
        let config = PursuitConfig {
            max_atoms: 3,
            residual_ratio: 1e-12,
            min_correlation: 1e-12,
        };
        let mut pursuit = ChannelPursuit::new(&dict, config, &two_tone(256)).unwrap();
        assert_eq!(pursuit.run().unwrap(), Termination::MaxAtoms);
        assert_eq!(pursuit.selected().len(), 3);
        // stays stopped
        assert!(pursuit.step().unwrap().is_none());
    }

    #[test]
    fn test_correlation_floor_terminates() {
        let dict = Dictionary::new(8000, &test_dictionary_config()).unwrap();
        let config = PursuitConfig {
            max_atoms: 100,
            residual_ratio: 1e-12,
            min_correlation: 1e6,
        };
        let mut pursuit = ChannelPursuit::new(&dict, config, &two_tone(256)).unwrap();
        assert_eq!(pursuit.run().unwrap(), Termination::CorrelationFloor);
        assert_eq!(pursuit.iteration(), 0);
    }

    #[test]
    fn test_residual_ratio_terminates() {
        let dict = Dictionary::new(8000, &test_dictionary_config()).unwrap();
        // a single dictionary atom is explained by one selection
        let atom = Atom::new(AtomKind::Gabor, 128, 1000.0, 0.0);
        let mut samples = vec![0.0f32; 256];
        for (i, w) in dict.materialize(&atom, 128).unwrap().iter().enumerate() {
            samples[64 + i] = (3.0 * w) as f32;
        }
        let config = PursuitConfig {
            max_atoms: 10,
            residual_ratio: 1e-6,
            min_correlation: 1e-9,
        };
        let mut pursuit = ChannelPursuit::new(&dict, config, &samples).unwrap();
        assert_eq!(pursuit.run().unwrap(), Termination::ResidualEnergy);
        assert_eq!(pursuit.selected().len(), 1);
        let record = pursuit.selected()[0];
        assert_eq!(record.atom, atom);
        assert_eq!(record.offset, 64);
        assert!((record.coefficient - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_pause_and_resume_matches_single_run() {
        let dict = Dictionary::new(8000, &test_dictionary_config()).unwrap();
        let samples = two_tone(384);
        let config = PursuitConfig {
            max_atoms: 6,
            residual_ratio: 1e-9,
            min_correlation: 1e-9,
        };

        let mut whole = ChannelPursuit::new(&dict, config.clone(), &samples).unwrap();
        whole.run().unwrap();

        let mut paused = ChannelPursuit::new(&dict, config, &samples).unwrap();
        for _ in 0..2 {
            paused.step().unwrap();
        }
        assert_eq!(paused.iteration(), 2);
        assert!(paused.termination().is_none());
        paused.run().unwrap();

        assert_eq!(whole.selected(), paused.selected());
    }

    #[test]
    fn test_tie_break_prefers_first_atom_then_smallest_offset() {
        // Exhaustive search over a signal with two identical bursts: the
        // earlier burst wins, and among equal atoms the first enumerated one.
        let config = DictionaryConfig {
            kinds: vec![AtomKind::Sinusoid],
            scales: vec![4],
            frequencies: FrequencyGrid::Explicit(vec![1000.0]),
            phases: vec![0.0],
            chirps: vec![],
            search: SearchPolicy::Exhaustive,
            edge: EdgePolicy::Exclude,
        };
        let dict = Dictionary::new(8000, &config).unwrap();
        let wave = dict.materialize(&Atom::new(AtomKind::Sinusoid, 4, 1000.0, 0.0), 4).unwrap();
        let mut samples = vec![0.0f32; 16];
        for i in 0..4 {
            samples[2 + i] = wave[i] as f32;
            samples[10 + i] = wave[i] as f32;
        }
        let mut pursuit = ChannelPursuit::new(&dict, PursuitConfig::default(), &samples).unwrap();
        let first = pursuit.step().unwrap().unwrap();
        assert_eq!(first.offset, 2);
    }

    #[test]
    fn test_codec_round_trip_shape_and_error() {
        let samples = two_tone(512);
        let buffer = SignalBuffer::new(8000, vec![samples.clone(), samples.iter().map(|s| s * 0.5).collect()]).unwrap();
        let codec = MatchingPursuitCodec::new(
            test_dictionary_config(),
            PursuitConfig {
                max_atoms: 32,
                residual_ratio: 0.05,
                min_correlation: 1e-6,
            },
        );
        let clip = codec.encode(&buffer).unwrap();
        assert_eq!(clip.strategy, Strategy::Pursuit);
        assert_eq!(clip.channel_count, 2);

        let decoded = codec.decode(&clip).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.len(), 512);

        // decoded energy error matches the residual energy the encoder reported
        for (idx, payload) in clip.channels.iter().enumerate() {
            let residual_energy = match payload {
                ChannelPayload::Pursuit { residual_energy, .. } => *residual_energy,
                _ => panic!("expected pursuit payload"),
            };
            let original = buffer.channel(idx).unwrap();
            let rebuilt = decoded.channel(idx).unwrap();
            let err: f64 = original
                .iter()
                .zip(rebuilt)
                .map(|(&a, &b)| (a as f64 - b as f64).powi(2))
                .sum();
            assert!((err - residual_energy).abs() < 1e-4 * buffer.channel_energy(idx).unwrap());
        }
    }

    #[test]
    fn test_reconstruct_is_order_independent() {
        let records = vec![
            AtomRecord {
                atom: Atom::new(AtomKind::Gabor, 32, 500.0, 0.0),
                coefficient: 1.0,
                offset: 0,
            },
            AtomRecord {
                atom: Atom::new(AtomKind::Sinusoid, 32, 1000.0, FRAC_PI_2),
                coefficient: -0.5,
                offset: 16,
            },
        ];
        let forward = reconstruct(&records, 8000, 64).unwrap();
        let reversed: Vec<AtomRecord> = records.iter().rev().copied().collect();
        let backward = reconstruct(&reversed, 8000, 64).unwrap();
        for (a, b) in forward.iter().zip(&backward) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reconstruct_clips_atoms_at_buffer_end() {
        let records = vec![AtomRecord {
            atom: Atom::new(AtomKind::Sinusoid, 32, 0.0, 0.0),
            coefficient: 2.0,
            offset: 20,
        }];
        let out = reconstruct(&records, 8000, 24).unwrap();
        assert_eq!(out.len(), 24);
        assert!(out[..20].iter().all(|&x| x == 0.0));
        assert!(out[20..].iter().all(|&x| x > 0.0));
    }
}
