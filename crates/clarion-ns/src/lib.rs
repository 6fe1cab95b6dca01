#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod config;
mod noise_estimator;
mod noise_suppressor;
mod ns_fft;
mod quantile_noise_estimator;
mod signal_model;
mod speech_probability_estimator;
mod wiener_filter;

pub use config::{NsConfig, SuppressionLevel};
pub use noise_suppressor::NoiseSuppressor;
