#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod activity_detector;
mod analog_level;
mod config;
mod digital_agc;
mod gain_controller1;
mod gain_curve;

pub use config::{Agc1Config, AgcMode};
pub use gain_controller1::GainController1;
pub use gain_curve::GainCurve;

/// Subframes per 10 ms frame for envelope tracking and gain interpolation.
pub(crate) const SUBFRAMES_IN_FRAME: usize = 10;
