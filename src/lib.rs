//! # sound-codec
//!
//! Encode audio clips as a sparse set of time-shifted atoms (matching
//! pursuit) or as a dense FFT spectrum, and decode them back.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sound_codec::{decode, encode, EncodeParams, SignalBuffer, Strategy};
//!
//! let samples: Vec<f32> = vec![0.0; 8000]; // one second at 8 kHz
//! let buffer = SignalBuffer::mono(8000, samples)?;
//!
//! let clip = encode(&buffer, Strategy::Pursuit, &EncodeParams::default())?;
//! let approx = decode(&clip)?;
//! assert_eq!(approx.len(), buffer.len());
//! # Ok::<(), sound_codec::CodecError>(())
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! WAV → SignalBuffer → {pursuit | fft}.encode → EncodedClip → decode → SignalBuffer → WAV
//! ```

#![warn(clippy::all)]

pub mod atom;
pub mod buffer;
pub mod clip;
pub mod codec;
pub mod dictionary;
pub mod encoded;
pub mod error;
pub mod input;
pub mod output;
pub mod resample;

pub use atom::{Atom, AtomKind};
pub use buffer::SignalBuffer;
pub use clip::{Clip, LoadOptions};
pub use codec::{
    decode, encode, ChannelPursuit, Codec, EncodeParams, FftCodec, FftConfig, FrameConfig,
    MatchingPursuitCodec, PursuitConfig,
};
pub use dictionary::{Dictionary, DictionaryConfig, EdgePolicy, FrequencyGrid, SearchPolicy};
pub use encoded::{AtomRecord, ChannelPayload, EncodedClip, Strategy, Termination};
pub use error::{CodecError, Result};
