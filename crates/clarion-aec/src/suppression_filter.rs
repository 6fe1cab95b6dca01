//! Applies the suppression gain in the frequency domain and resynthesizes
//! the output with a sqrt-Hann overlap-add, adding comfort noise in
//! proportion to the attenuation.

use crate::aec_fft::AecFft;
use crate::common::{BLOCK_SIZE, Block, FFT_LENGTH, FFT_LENGTH_BY_2_PLUS_1, Spectrum};
use crate::fft_data::FftData;

#[derive(derive_more::Debug)]
pub(crate) struct SuppressionFilter {
    #[debug(skip)]
    overlap: Block,
    #[debug(skip)]
    spectrum: FftData,
    #[debug(skip)]
    time: [f32; FFT_LENGTH],
}

impl SuppressionFilter {
    pub(crate) fn new() -> Self {
        Self {
            overlap: [0.0; BLOCK_SIZE],
            spectrum: FftData::default(),
            time: [0.0; FFT_LENGTH],
        }
    }

    /// `error` is the windowed spectrum of the last two error blocks. The
    /// output lags the error by one block.
    pub(crate) fn apply(
        &mut self,
        fft: &mut AecFft,
        error: &FftData,
        gain: &Spectrum,
        comfort_noise: &FftData,
        output: &mut Block,
    ) {
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            let g = gain[k];
            let noise_gain = (1.0 - g * g).max(0.0).sqrt();
            self.spectrum.re[k] = g * error.re[k] + noise_gain * comfort_noise.re[k];
            self.spectrum.im[k] = g * error.im[k] + noise_gain * comfort_noise.im[k];
        }
        fft.ifft(&self.spectrum, &mut self.time);
        let window = fft.sqrt_hann();
        for (x, w) in self.time.iter_mut().zip(window) {
            *x *= w;
        }
        for i in 0..BLOCK_SIZE {
            output[i] = (self.overlap[i] + self.time[i]).clamp(-32768.0, 32767.0);
        }
        self.overlap.copy_from_slice(&self.time[BLOCK_SIZE..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_gain_reconstructs_with_one_block_delay() {
        let mut fft = AecFft::new();
        let mut filter = SuppressionFilter::new();
        let gain = [1.0; FFT_LENGTH_BY_2_PLUS_1];
        let noise = FftData::default();
        let mut previous = [0.0; BLOCK_SIZE];
        let mut input = Vec::new();
        let mut output = Vec::new();
        for n in 0..6 {
            let mut block = [0.0; BLOCK_SIZE];
            for (i, x) in block.iter_mut().enumerate() {
                *x = 1000.0 * ((n * BLOCK_SIZE + i) as f32 * 0.05).sin();
            }
            let mut error = FftData::default();
            fft.padded_fft(&block, &previous, true, &mut error);
            let mut out = [0.0; BLOCK_SIZE];
            filter.apply(&mut fft, &error, &gain, &noise, &mut out);
            previous = block;
            input.extend_from_slice(&block);
            output.extend_from_slice(&out);
        }
        for i in BLOCK_SIZE..output.len() {
            let expected = input[i - BLOCK_SIZE];
            assert!((output[i] - expected).abs() < 0.05, "sample {i}: {} vs {expected}", output[i]);
        }
    }

    #[test]
    fn zero_gain_without_noise_is_silent() {
        let mut fft = AecFft::new();
        let mut filter = SuppressionFilter::new();
        let mut error = FftData::default();
        fft.padded_fft(&[500.0; BLOCK_SIZE], &[500.0; BLOCK_SIZE], true, &mut error);
        let mut out = [1.0; BLOCK_SIZE];
        filter.apply(&mut fft, &error, &[0.0; FFT_LENGTH_BY_2_PLUS_1], &FftData::default(), &mut out);
        assert!(out.iter().all(|&x| x.abs() < 1e-3));
    }
}
