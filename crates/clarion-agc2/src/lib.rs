#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod adaptive_digital_gain_controller;
pub mod common;
pub mod config;
pub mod fixed_digital_level_estimator;
pub mod gain_applier;
mod gain_controller2;
pub mod limiter;
pub mod limiter_db_gain_curve;
pub mod noise_level_estimator;
pub mod saturation_protector;
pub mod speech_level_estimator;
pub mod vad_wrapper;

pub use config::{AdaptiveDigitalConfig, Agc2Config, FixedDigitalConfig};
pub use gain_controller2::GainController2;
