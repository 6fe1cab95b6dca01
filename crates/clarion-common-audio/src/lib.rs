#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod audio_util;
pub mod cascaded_biquad_filter;
pub mod channel_buffer;
pub mod frame_accumulator;
pub mod polyphase_resampler;
pub mod push_resampler;
pub mod resampler;
