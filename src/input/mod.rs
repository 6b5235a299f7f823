//! Loading sample buffers from audio files

pub mod wav;

pub use wav::{load, read_wav};

/// Metadata about the file a buffer was loaded from
#[derive(Debug, Clone)]
pub struct SourceMetadata {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// `true` for IEEE float data, `false` for integer PCM
    pub float: bool,
    /// Frames (samples per channel) declared in the header
    pub frames: usize,
}
