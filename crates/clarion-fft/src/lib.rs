#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

mod complex_fft;
mod real_fft;

pub use complex_fft::ComplexFft;
pub use real_fft::RealFft;
