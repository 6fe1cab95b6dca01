//! Streaming voice processing: echo cancellation, noise suppression, gain
//! control, voice activity detection, RMS metering and resampling.
//!
//! Audio is processed in 10 ms frames. Each tick, the far-end (render)
//! frame goes to a reverse-stream call and the microphone (capture) frame
//! to a stream call, which runs it through the high-pass filter, the echo
//! canceller, the noise suppressor and both gain controllers.
//!
//! # Quick Start
//!
//! ```ignore
//! use clarion::{AudioProcessing, Config, StreamConfig};
//! use clarion::config::{EchoCanceller, NoiseSuppression};
//!
//! let config = Config {
//!     echo_canceller: EchoCanceller { enabled: true, ..Default::default() },
//!     noise_suppression: NoiseSuppression { enabled: true, ..Default::default() },
//!     ..Default::default()
//! };
//!
//! let stream = StreamConfig::new(16000, 1);
//! let mut apm = AudioProcessing::builder()
//!     .config(config)
//!     .capture_config(stream)
//!     .build()?;
//!
//! // For each 10 ms audio frame:
//! // 1. Feed far-end (render) audio:
//! // apm.process_reverse_stream_f32(&src, &stream, &stream, &mut dest)?;
//! // 2. Process near-end (capture) audio:
//! // apm.process_stream_f32(&src, &stream, &stream, &mut dest)?;
//! ```
//!
//! The voice activity detectors and the resampler are usable on their own:
//! see [`Vad`], [`VoiceActivityDetector`] and [`Resampler`].
#![deny(unsafe_code)]

pub(crate) mod audio_buffer;
mod audio_processing;
pub(crate) mod audio_processing_impl;
pub mod config;
mod error;
pub(crate) mod high_pass_filter;
pub(crate) mod render_queue;
mod rms_level;
pub mod stats;
mod stream_config;

// Public re-exports.
pub use audio_processing::{AudioProcessing, AudioProcessingBuilder};
pub use config::Config;
pub use error::{Error, ErrorKind, NO_ERROR, result_code};
pub use rms_level::{Levels, RmsLevel};
pub use stats::AudioProcessingStats;
pub use stream_config::{
    CheckedStreamConfig, DEFAULT_BLOCK_MS, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE,
    MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ, StreamConfig, StreamConfigError, get_frame_size,
};

pub use clarion_common_audio::frame_accumulator::FrameAccumulator;
pub use clarion_common_audio::resampler::{Resampler, ResamplerError};
pub use clarion_vad::{
    MIN_ENERGY, NON_SPEECH_PROBABILITY, SPEECH_PROBABILITY, StandaloneVad, VALID_FRAME_MS,
    VALID_RATES, Vad, VadError, VadMode, VoiceActivityDetector,
};
