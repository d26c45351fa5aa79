//! Reverbline Audio - decode, rate-normalize, convolve, encode
//!
//! Everything needed to turn one (phrase, impulse response) pair of WAV
//! files into a reverberated WAV:
//!
//! - [`wav`]: mono decode of any PCM/float WAV, atomic 16-bit PCM encode
//! - [`normalize`]: bring two buffers to a common rate by upsampling the lower one
//! - [`convolve`]: linear convolution (FFT and direct reference)
//! - [`engine`]: the per-pair pipeline tying the above together
//!
//! # Example
//!
//! ```ignore
//! use reverbline_audio::ConvolutionEngine;
//!
//! let engine = ConvolutionEngine::new();
//! let stats = engine.convolve_pair("hello.wav".as_ref(), "room1.wav".as_ref(), "hello_room1.wav".as_ref())?;
//! println!("{} frames at {} Hz", stats.output_frames, stats.sample_rate);
//! ```

pub mod buffer;
pub mod convolve;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod resample;
pub mod wav;

// Re-exports
pub use buffer::AudioBuffer;
pub use convolve::{convolved_len, direct_convolve, fft_convolve};
pub use engine::{ConvolutionEngine, PairStats};
pub use error::AudioError;
pub use normalize::{Normalized, normalize};
pub use resample::{Resample, SincResampler};
pub use wav::{read_wav, write_wav};
