//! Block layout shared by the echo canceller stages.

/// Samples per processing block.
pub const BLOCK_SIZE: usize = 64;
pub const FFT_LENGTH: usize = 2 * BLOCK_SIZE;
pub const FFT_LENGTH_BY_2: usize = BLOCK_SIZE;
pub const FFT_LENGTH_BY_2_PLUS_1: usize = FFT_LENGTH_BY_2 + 1;

/// Render power per bin below which a band is considered unexcited.
pub(crate) const X2_BAND_ENERGY_THRESHOLD: f32 = 44015068.0;
pub(crate) const BLOCKS_TO_HOLD_ERLE: i32 = 100;

/// Blocks between metric snapshots, about one second at 16 kHz.
pub(crate) const METRICS_REPORTING_INTERVAL_BLOCKS: usize = 250;

/// One block of samples for a single channel.
pub type Block = [f32; BLOCK_SIZE];

/// Power spectrum of one block.
pub type Spectrum = [f32; FFT_LENGTH_BY_2_PLUS_1];

/// Number of whole blocks covering `ms` milliseconds, rounded up.
pub fn blocks_for_ms(ms: usize, sample_rate_hz: u32) -> usize {
    (ms * sample_rate_hz as usize / 1000).div_ceil(BLOCK_SIZE)
}

pub(crate) fn power(x: &[f32]) -> f32 {
    x.iter().map(|v| v * v).sum()
}
