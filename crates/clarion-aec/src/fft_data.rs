//! One-sided complex spectrum of a 128-point real FFT.

use crate::common::{FFT_LENGTH_BY_2_PLUS_1, Spectrum};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FftData {
    pub(crate) re: [f32; FFT_LENGTH_BY_2_PLUS_1],
    pub(crate) im: [f32; FFT_LENGTH_BY_2_PLUS_1],
}

impl Default for FftData {
    fn default() -> Self {
        Self {
            re: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            im: [0.0; FFT_LENGTH_BY_2_PLUS_1],
        }
    }
}

impl FftData {
    pub(crate) fn clear(&mut self) {
        self.re.fill(0.0);
        self.im.fill(0.0);
    }

    /// `power[k] = re[k]^2 + im[k]^2`.
    pub(crate) fn spectrum(&self, power: &mut Spectrum) {
        for ((p, &re), &im) in power.iter_mut().zip(&self.re).zip(&self.im) {
            *p = re * re + im * im;
        }
    }

    /// `self += a * b` per bin.
    pub(crate) fn multiply_accumulate(&mut self, a: &Self, b: &Self) {
        for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
            self.re[k] += a.re[k] * b.re[k] - a.im[k] * b.im[k];
            self.im[k] += a.re[k] * b.im[k] + a.im[k] * b.re[k];
        }
    }

    pub(crate) fn scale(&mut self, factor: f32) {
        for (re, im) in self.re.iter_mut().zip(self.im.iter_mut()) {
            *re *= factor;
            *im *= factor;
        }
    }
}
