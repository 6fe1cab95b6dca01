#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod adaptive_fir_filter;
mod aec_fft;
mod block_framer;
mod comfort_noise_generator;
pub mod common;
pub mod config;
mod delay_estimator;
mod double_talk_detector;
mod echo_canceller;
mod echo_remover_metrics;
mod fft_data;
mod frame_blocker;
mod mobile;
mod render_buffer;
mod residual_echo_estimator;
mod subband_erle_estimator;
mod suppression_filter;
mod suppression_gain;

pub use config::EchoCancellerConfig;
pub use echo_canceller::EchoCanceller;
pub use echo_remover_metrics::EchoMetrics;
