//! Searchable atom dictionaries
//!
//! A [`Dictionary`] is the cartesian product of kinds, scales, frequencies
//! and phases (and chirps, for gammachirps). It is never materialized as a
//! table of waveforms: candidates are produced lazily, in a fixed nesting
//! order (kind, scale, frequency, phase, chirp), and rendered on demand. The enumeration order is what the
//! pursuit tie-break relies on, so it must stay stable.

use crate::atom::{Atom, AtomKind};
use crate::error::{CodecError, Result};
use std::f64::consts::FRAC_PI_2;

/// Chirp set for every kind other than [`AtomKind::Gammachirp`]
const NO_CHIRP: &[f64] = &[0.0];

/// Which time offsets are tried for each candidate atom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPolicy {
    /// Every offset where the atom fits
    Exhaustive,
    /// Offsets spaced `max(1, scale / hop_divisor)` samples apart
    Sampled { hop_divisor: usize },
}

/// How atoms longer than the residual are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolicy {
    /// Skip them
    Exclude,
    /// Propose them once, shortened to the residual length
    Truncate,
}

/// How the carrier frequencies of a dictionary are chosen
#[derive(Debug, Clone, PartialEq)]
pub enum FrequencyGrid {
    /// Logarithmically spaced bands starting at `min_hz`
    ///
    /// `max_hz` of `None` means "up to Nyquist".
    Log {
        min_hz: f64,
        max_hz: Option<f64>,
        bands_per_octave: usize,
    },
    /// Exactly these frequencies, in this order
    Explicit(Vec<f64>),
}

/// Dictionary configuration (default: 3 kinds, 4 scales, semitone grid from 55 Hz)
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryConfig {
    pub kinds: Vec<AtomKind>,
    /// Atom support lengths in samples
    pub scales: Vec<usize>,
    pub frequencies: FrequencyGrid,
    /// Carrier phases in radians
    pub phases: Vec<f64>,
    /// Chirp values tried for gammachirp atoms; ignored by other kinds
    pub chirps: Vec<f64>,
    pub search: SearchPolicy,
    pub edge: EdgePolicy,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            kinds: vec![AtomKind::Sinusoid, AtomKind::Gabor, AtomKind::Gammatone],
            scales: vec![256, 1024, 4096, 16384],
            frequencies: FrequencyGrid::Log {
                min_hz: 55.0,
                max_hz: None,
                bands_per_octave: 12,
            },
            phases: vec![0.0, FRAC_PI_2],
            chirps: vec![-1.0, 1.0],
            search: SearchPolicy::Sampled { hop_divisor: 4 },
            edge: EdgePolicy::Truncate,
        }
    }
}

/// A validated dictionary bound to one sample rate
///
/// Immutable once built; safe to share across threads encoding different
/// buffers.
#[derive(Debug, Clone)]
pub struct Dictionary {
    sample_rate: u32,
    kinds: Vec<AtomKind>,
    /// Sorted ascending, deduplicated
    scales: Vec<usize>,
    frequencies: Vec<f64>,
    phases: Vec<f64>,
    chirps: Vec<f64>,
    search: SearchPolicy,
    edge: EdgePolicy,
}

impl Dictionary {
    /// Build a dictionary for buffers sampled at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Configuration` if any parameter set is empty, a
    /// scale is zero, a frequency is not in `(0, Nyquist]`, a phase is not
    /// finite, a gammachirp dictionary has no finite chirps, or the search
    /// policy has a zero hop divisor.
    pub fn new(sample_rate: u32, config: &DictionaryConfig) -> Result<Self> {
        if sample_rate == 0 {
            return Err(CodecError::Configuration(
                "Sample rate must be > 0".to_string(),
            ));
        }
        let nyquist = sample_rate as f64 / 2.0;

        if config.kinds.is_empty() {
            return Err(CodecError::Configuration(
                "Dictionary needs at least one atom kind".to_string(),
            ));
        }
        let mut kinds = Vec::with_capacity(config.kinds.len());
        for &kind in &config.kinds {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        if config.scales.is_empty() {
            return Err(CodecError::Configuration(
                "Dictionary needs at least one scale".to_string(),
            ));
        }
        if config.scales.contains(&0) {
            return Err(CodecError::Configuration(
                "Atom scales must be > 0".to_string(),
            ));
        }
        let mut scales = config.scales.clone();
        scales.sort_unstable();
        scales.dedup();

        let frequencies = resolve_frequencies(&config.frequencies, nyquist)?;

        if config.phases.is_empty() {
            return Err(CodecError::Configuration(
                "Dictionary needs at least one phase".to_string(),
            ));
        }
        if let Some(p) = config.phases.iter().find(|p| !p.is_finite()) {
            return Err(CodecError::Configuration(format!(
                "Phase {} is not finite",
                p
            )));
        }

        if kinds.contains(&AtomKind::Gammachirp) {
            if config.chirps.is_empty() {
                return Err(CodecError::Configuration(
                    "Gammachirp atoms need at least one chirp".to_string(),
                ));
            }
            if let Some(c) = config.chirps.iter().find(|c| !c.is_finite()) {
                return Err(CodecError::Configuration(format!(
                    "Chirp {} is not finite",
                    c
                )));
            }
        }

        if let SearchPolicy::Sampled { hop_divisor: 0 } = config.search {
            return Err(CodecError::Configuration(
                "Hop divisor must be > 0".to_string(),
            ));
        }

        Ok(Self {
            sample_rate,
            kinds,
            scales,
            frequencies,
            phases: config.phases.clone(),
            chirps: config.chirps.clone(),
            search: config.search,
            edge: config.edge,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    fn chirps_for(&self, kind: AtomKind) -> &[f64] {
        match kind {
            AtomKind::Gammachirp => &self.chirps,
            _ => NO_CHIRP,
        }
    }

    /// Scales searchable against a residual of `residual_length` samples
    fn effective_scales(&self, residual_length: usize) -> Vec<usize> {
        if residual_length == 0 {
            return Vec::new();
        }
        let mut scales: Vec<usize> = self
            .scales
            .iter()
            .copied()
            .filter(|&s| s <= residual_length)
            .collect();
        let oversized = self.scales.iter().any(|&s| s > residual_length);
        if oversized && self.edge == EdgePolicy::Truncate && scales.last() != Some(&residual_length) {
            scales.push(residual_length);
        }
        scales
    }

    /// Number of candidates `propose_candidates(residual_length)` will yield
    pub fn candidate_count(&self, residual_length: usize) -> usize {
        let per_kind = self.effective_scales(residual_length).len() * self.frequencies.len() * self.phases.len();
        self.kinds
            .iter()
            .map(|&kind| per_kind * self.chirps_for(kind).len())
            .sum()
    }

    /// Lazily enumerate every atom relevant to a residual of this length
    ///
    /// Finite per call and restartable: each call starts a fresh sequence in
    /// the same order.
    pub fn propose_candidates(&self, residual_length: usize) -> impl Iterator<Item = Atom> + '_ {
        let scales = self.effective_scales(residual_length);
        self.kinds.iter().flat_map(move |&kind| {
            scales.clone().into_iter().flat_map(move |scale| {
                self.frequencies.iter().flat_map(move |&frequency| {
                    self.phases.iter().flat_map(move |&phase| {
                        self.chirps_for(kind).iter().map(move |&chirp| Atom {
                            chirp,
                            ..Atom::new(kind, scale, frequency, phase)
                        })
                    })
                })
            })
        })
    }

    /// Offsets at which `atom` fits entirely inside the residual, ascending
    pub fn admissible_offsets(&self, atom: &Atom, residual_length: usize) -> impl Iterator<Item = usize> {
        let hop = match self.search {
            SearchPolicy::Exhaustive => 1,
            SearchPolicy::Sampled { hop_divisor } => (atom.scale / hop_divisor).max(1),
        };
        let last = if atom.scale == 0 || atom.scale > residual_length {
            None
        } else {
            Some(residual_length - atom.scale)
        };
        last.into_iter().flat_map(move |last| (0..=last).step_by(hop))
    }

    /// Render `atom` as exactly `length` samples of unit energy
    ///
    /// Shorter lengths truncate the rendering and renormalize it; longer
    /// lengths zero-pad after the atom's support.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidAtomParameters` if the atom cannot be
    /// rendered at this dictionary's sample rate or truncation leaves no
    /// energy.
    pub fn materialize(&self, atom: &Atom, length: usize) -> Result<Vec<f64>> {
        let mut wave = atom.render(self.sample_rate)?;
        if length < wave.len() {
            wave.truncate(length);
            let norm_sq: f64 = wave.iter().map(|x| x * x).sum();
            if norm_sq < f64::EPSILON {
                return Err(CodecError::InvalidAtomParameters(format!(
                    "{} atom truncated to {} samples has no energy",
                    atom.kind.name(),
                    length
                )));
            }
            let inv = 1.0 / norm_sq.sqrt();
            wave.iter_mut().for_each(|x| *x *= inv);
        } else {
            wave.resize(length, 0.0);
        }
        Ok(wave)
    }
}

fn resolve_frequencies(grid: &FrequencyGrid, nyquist: f64) -> Result<Vec<f64>> {
    let frequencies = match grid {
        FrequencyGrid::Explicit(list) => list.clone(),
        FrequencyGrid::Log {
            min_hz,
            max_hz,
            bands_per_octave,
        } => {
            let max_hz = max_hz.unwrap_or(nyquist);
            if !(*min_hz > 0.0) || !max_hz.is_finite() || max_hz < *min_hz {
                return Err(CodecError::Configuration(format!(
                    "Invalid frequency range: min={} Hz, max={} Hz",
                    min_hz, max_hz
                )));
            }
            if *bands_per_octave == 0 {
                return Err(CodecError::Configuration(
                    "Bands per octave must be > 0".to_string(),
                ));
            }
            let step = 1.0 / *bands_per_octave as f64;
            (0..)
                .map(|k| min_hz * 2f64.powf(k as f64 * step))
                .take_while(|&f| f <= max_hz * (1.0 + 1e-12))
                .collect()
        }
    };

    if frequencies.is_empty() {
        return Err(CodecError::Configuration(
            "Dictionary needs at least one frequency".to_string(),
        ));
    }
    if let Some(f) = frequencies
        .iter()
        .find(|&&f| !f.is_finite() || f <= 0.0 || f > nyquist)
    {
        return Err(CodecError::Configuration(format!(
            "Frequency {} Hz outside (0, {}] Hz",
            f, nyquist
        )));
    }
    Ok(frequencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> DictionaryConfig {
        DictionaryConfig {
            kinds: vec![AtomKind::Sinusoid, AtomKind::Gabor],
            scales: vec![64, 16],
            frequencies: FrequencyGrid::Explicit(vec![100.0, 200.0, 400.0]),
            phases: vec![0.0, FRAC_PI_2],
            chirps: vec![],
            search: SearchPolicy::Exhaustive,
            edge: EdgePolicy::Exclude,
        }
    }

    #[test]
    fn test_candidates_follow_nesting_order() {
        let dict = Dictionary::new(8000, &small_config()).unwrap();
        let atoms: Vec<Atom> = dict.propose_candidates(100).collect();
        assert_eq!(atoms.len(), 2 * 2 * 3 * 2);
        assert_eq!(atoms.len(), dict.candidate_count(100));
        // kind outermost, then ascending scale, frequency, phase
        assert_eq!(atoms[0], Atom::new(AtomKind::Sinusoid, 16, 100.0, 0.0));
        assert_eq!(atoms[1], Atom::new(AtomKind::Sinusoid, 16, 100.0, FRAC_PI_2));
        assert_eq!(atoms[2], Atom::new(AtomKind::Sinusoid, 16, 200.0, 0.0));
        assert_eq!(atoms[6].scale, 64);
        assert_eq!(atoms[12].kind, AtomKind::Gabor);
    }

    #[test]
    fn test_candidates_are_restartable() {
        let dict = Dictionary::new(8000, &small_config()).unwrap();
        let first: Vec<Atom> = dict.propose_candidates(100).collect();
        let second: Vec<Atom> = dict.propose_candidates(100).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_exclude_drops_long_atoms() {
        let dict = Dictionary::new(8000, &small_config()).unwrap();
        assert!(dict.propose_candidates(32).all(|a| a.scale == 16));
        assert_eq!(dict.propose_candidates(8).count(), 0);
    }

    #[test]
    fn test_truncate_clamps_long_atoms_once() {
        let mut config = small_config();
        config.scales = vec![16, 64, 128];
        config.edge = EdgePolicy::Truncate;
        let dict = Dictionary::new(8000, &config).unwrap();
        let scales: Vec<usize> = dict
            .propose_candidates(40)
            .filter(|a| a.kind == AtomKind::Sinusoid && a.frequency == 100.0 && a.phase == 0.0)
            .map(|a| a.scale)
            .collect();
        assert_eq!(scales, vec![16, 40]);
    }

    #[test]
    fn test_gammachirps_enumerate_chirps_innermost() {
        let mut config = small_config();
        config.kinds = vec![AtomKind::Gabor, AtomKind::Gammachirp];
        config.chirps = vec![-1.0, 0.5, 1.0];
        let dict = Dictionary::new(8000, &config).unwrap();
        let atoms: Vec<Atom> = dict.propose_candidates(100).collect();
        // gabor: 2 scales x 3 freqs x 2 phases; gammachirp adds 3 chirps each
        assert_eq!(atoms.len(), 12 + 12 * 3);
        assert_eq!(atoms.len(), dict.candidate_count(100));
        assert!(atoms[..12].iter().all(|a| a.chirp == 0.0));
        assert_eq!(atoms[12], Atom::gammachirp(16, 100.0, 0.0, -1.0));
        assert_eq!(atoms[13], Atom::gammachirp(16, 100.0, 0.0, 0.5));
        assert_eq!(atoms[15], Atom::gammachirp(16, 100.0, FRAC_PI_2, -1.0));
        for atom in &atoms {
            assert!(dict.materialize(atom, atom.scale).is_ok(), "{:?}", atom);
        }
    }

    #[test]
    fn test_default_dictionary_renders_every_gamma_candidate() {
        let mut config = DictionaryConfig::default();
        config.kinds = vec![AtomKind::Gammatone, AtomKind::Gammachirp];
        let dict = Dictionary::new(8000, &config).unwrap();
        let mut count = 0;
        for atom in dict.propose_candidates(20000) {
            assert!(dict.materialize(&atom, atom.scale).is_ok(), "{:?}", atom);
            count += 1;
        }
        assert_eq!(count, dict.candidate_count(20000));
    }

    #[test]
    fn test_offsets_exhaustive_and_sampled() {
        let dict = Dictionary::new(8000, &small_config()).unwrap();
        let atom = Atom::new(AtomKind::Gabor, 16, 100.0, 0.0);
        let offsets: Vec<usize> = dict.admissible_offsets(&atom, 20).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);

        let mut config = small_config();
        config.search = SearchPolicy::Sampled { hop_divisor: 4 };
        let dict = Dictionary::new(8000, &config).unwrap();
        let offsets: Vec<usize> = dict.admissible_offsets(&atom, 30).collect();
        assert_eq!(offsets, vec![0, 4, 8, 12]);
        assert_eq!(dict.admissible_offsets(&atom, 10).count(), 0);
    }

    #[test]
    fn test_materialize_pads_and_truncates_to_unit_norm() {
        let dict = Dictionary::new(8000, &small_config()).unwrap();
        let atom = Atom::new(AtomKind::Gabor, 64, 400.0, 0.0);

        let padded = dict.materialize(&atom, 100).unwrap();
        assert_eq!(padded.len(), 100);
        assert!(padded[64..].iter().all(|&x| x == 0.0));

        let truncated = dict.materialize(&atom, 20).unwrap();
        assert_eq!(truncated.len(), 20);
        let norm: f64 = truncated.iter().map(|x| x * x).sum();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_materialize_rejects_invalid_atom() {
        let dict = Dictionary::new(8000, &small_config()).unwrap();
        let atom = Atom::new(AtomKind::Sinusoid, 16, 9000.0, 0.0);
        assert!(matches!(
            dict.materialize(&atom, 16),
            Err(CodecError::InvalidAtomParameters(_))
        ));
    }

    #[test]
    fn test_log_grid_hits_a440() {
        let dict = Dictionary::new(8000, &DictionaryConfig::default()).unwrap();
        let freqs = dict.frequencies();
        assert!((freqs[0] - 55.0).abs() < 1e-9);
        assert!(freqs.iter().any(|f| (f - 440.0).abs() < 1e-6));
        assert!(freqs.iter().all(|&f| f <= 4000.0));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let mut config = small_config();
        config.scales = vec![];
        assert!(matches!(
            Dictionary::new(8000, &config),
            Err(CodecError::Configuration(_))
        ));

        let mut config = small_config();
        config.frequencies = FrequencyGrid::Explicit(vec![100.0, 5000.0]);
        assert!(Dictionary::new(8000, &config).is_err());

        let mut config = small_config();
        config.search = SearchPolicy::Sampled { hop_divisor: 0 };
        assert!(Dictionary::new(8000, &config).is_err());

        let mut config = small_config();
        config.scales = vec![0, 16];
        assert!(Dictionary::new(8000, &config).is_err());

        let mut config = small_config();
        config.kinds.push(AtomKind::Gammachirp);
        assert!(matches!(
            Dictionary::new(8000, &config),
            Err(CodecError::Configuration(_))
        ));
    }
}
