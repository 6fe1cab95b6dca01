//! 128-point transforms in the layouts the canceller needs.

use std::f32::consts::PI;

use clarion_fft::RealFft;

use crate::common::{BLOCK_SIZE, Block, FFT_LENGTH};
use crate::fft_data::FftData;

#[derive(derive_more::Debug)]
pub(crate) struct AecFft {
    #[debug(skip)]
    fft: RealFft,
    #[debug(skip)]
    sqrt_hann: [f32; FFT_LENGTH],
    scratch: [f32; FFT_LENGTH],
}

impl AecFft {
    pub(crate) fn new() -> Self {
        let mut sqrt_hann = [0.0; FFT_LENGTH];
        for (n, w) in sqrt_hann.iter_mut().enumerate() {
            *w = (PI * n as f32 / FFT_LENGTH as f32).sin();
        }
        Self {
            fft: RealFft::new(FFT_LENGTH),
            sqrt_hann,
            scratch: [0.0; FFT_LENGTH],
        }
    }

    pub(crate) fn fft(&mut self, x: &[f32; FFT_LENGTH], out: &mut FftData) {
        self.fft.forward(x, &mut out.re, &mut out.im);
    }

    /// Inverse transform, scaled so that `ifft(fft(x)) == x`.
    pub(crate) fn ifft(&mut self, x: &FftData, out: &mut [f32; FFT_LENGTH]) {
        self.fft.inverse(&x.re, &x.im, out);
    }

    /// Transform of `[0; 64] ++ block`.
    pub(crate) fn zero_padded_fft(&mut self, block: &Block, out: &mut FftData) {
        self.scratch[..BLOCK_SIZE].fill(0.0);
        self.scratch[BLOCK_SIZE..].copy_from_slice(block);
        self.fft.forward(&self.scratch, &mut out.re, &mut out.im);
    }

    /// Transform of `previous ++ block`, optionally sqrt-Hann windowed.
    pub(crate) fn padded_fft(
        &mut self,
        block: &Block,
        previous: &Block,
        windowed: bool,
        out: &mut FftData,
    ) {
        self.scratch[..BLOCK_SIZE].copy_from_slice(previous);
        self.scratch[BLOCK_SIZE..].copy_from_slice(block);
        if windowed {
            for (x, w) in self.scratch.iter_mut().zip(&self.sqrt_hann) {
                *x *= w;
            }
        }
        self.fft.forward(&self.scratch, &mut out.re, &mut out.im);
    }

    pub(crate) fn sqrt_hann(&self) -> &[f32; FFT_LENGTH] {
        &self.sqrt_hann
    }
}
