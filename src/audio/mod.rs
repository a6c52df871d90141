//! Audio storage for the effect-chain search.
//!
//! This module holds the mono sample buffer that flows between the renderer
//! and the similarity oracle, plus WAV reading and writing.
//!
//! # Sample Format
//!
//! All processing happens on mono `f32` samples in roughly `[-1, 1]`:
//!
//! ```text
//! Input WAV (any channel count, int or float)
//!   -> downmix to mono, normalize integer samples to [-1, 1]
//!   -> AudioBuffer { samples, sample_rate }
//!
//! Output WAV:
//!   mono, 32-bit IEEE float, original sample rate
//! ```

mod buffer;
mod wav;

pub use buffer::AudioBuffer;
pub use wav::{load_wav, save_wav, trim_directory};

use std::io;
use std::path::PathBuf;

/// Errors raised while loading, saving or preparing audio.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("WAV error for {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported WAV format in {path}: {detail}")]
    UnsupportedFormat { path: PathBuf, detail: String },
    #[error("Audio buffer is empty")]
    Empty,
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}
