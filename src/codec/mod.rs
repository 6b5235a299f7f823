//! Encode/decode strategies sharing one contract
//!
//! Both codecs take a [`SignalBuffer`] to an [`EncodedClip`] and back.
//! Callers pick a [`Strategy`] by configuration; nothing downstream needs to
//! know which transform produced a clip, since the clip records it.

pub mod fft;
pub mod pursuit;

use crate::buffer::SignalBuffer;
use crate::dictionary::DictionaryConfig;
use crate::encoded::{EncodedClip, Strategy};
use crate::error::Result;

pub use fft::{FftCodec, FftConfig, FrameConfig};
pub use pursuit::{ChannelPursuit, MatchingPursuitCodec, PursuitConfig};

/// Common contract of every transform strategy
pub trait Codec {
    /// Strategy tag written into encoded clips
    fn strategy(&self) -> Strategy;

    /// Encode every channel of `buffer`
    fn encode(&self, buffer: &SignalBuffer) -> Result<EncodedClip>;

    /// Rebuild a buffer with the clip's original shape and sample rate
    fn decode(&self, clip: &EncodedClip) -> Result<SignalBuffer>;
}

/// Parameters for every strategy; only the selected one is consulted
#[derive(Debug, Clone, Default)]
pub struct EncodeParams {
    pub dictionary: DictionaryConfig,
    pub pursuit: PursuitConfig,
    pub fft: FftConfig,
}

/// Build the codec for `strategy`
pub fn codec_for(strategy: Strategy, params: &EncodeParams) -> Box<dyn Codec> {
    match strategy {
        Strategy::Pursuit => Box::new(MatchingPursuitCodec::new(
            params.dictionary.clone(),
            params.pursuit.clone(),
        )),
        Strategy::Fft => Box::new(FftCodec::new(params.fft.clone())),
    }
}

/// Encode `buffer` with the chosen strategy
pub fn encode(buffer: &SignalBuffer, strategy: Strategy, params: &EncodeParams) -> Result<EncodedClip> {
    codec_for(strategy, params).encode(buffer)
}

/// Decode a clip with the strategy it was encoded with
pub fn decode(clip: &EncodedClip) -> Result<SignalBuffer> {
    codec_for(clip.strategy, &EncodeParams::default()).decode(clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    #[test]
    fn test_dispatch_matches_strategy() {
        let params = EncodeParams::default();
        assert_eq!(codec_for(Strategy::Pursuit, &params).strategy(), Strategy::Pursuit);
        assert_eq!(codec_for(Strategy::Fft, &params).strategy(), Strategy::Fft);
    }

    #[test]
    fn test_empty_input_rejected_by_both_strategies() {
        let empty = SignalBuffer::mono(8000, vec![]).unwrap();
        let params = EncodeParams::default();
        for strategy in [Strategy::Pursuit, Strategy::Fft] {
            assert!(
                matches!(encode(&empty, strategy, &params), Err(CodecError::EmptyInput)),
                "{} accepted an empty buffer",
                strategy
            );
        }
    }

    #[test]
    fn test_decode_uses_stored_strategy() {
        let buffer = SignalBuffer::new(1000, vec![vec![0.25, -0.5, 1.0], vec![0.0, 0.1, 0.2]]).unwrap();
        let clip = encode(&buffer, Strategy::Fft, &EncodeParams::default()).unwrap();
        let decoded = decode(&clip).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.sample_rate(), 1000);
        assert!(decoded.rms_error(&buffer).unwrap() < 1e-9);
    }
}
