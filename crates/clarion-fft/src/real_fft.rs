//! Real-input FFT computed with a half-length complex transform.

use std::f64::consts::PI;

use crate::ComplexFft;

/// FFT of `len` real samples producing `len / 2 + 1` complex bins.
#[derive(Debug, Clone)]
pub struct RealFft {
    len: usize,
    half: ComplexFft,
    // W^k = exp(-2*pi*i*k/len) for k in 0..=len/2.
    w_re: Vec<f32>,
    w_im: Vec<f32>,
    scratch_re: Vec<f32>,
    scratch_im: Vec<f32>,
}

impl RealFft {
    /// # Panics
    ///
    /// Panics if `len` is not a power of two of at least 2.
    pub fn new(len: usize) -> Self {
        assert!(len >= 2 && len.is_power_of_two(), "FFT length {len} is not a power of two >= 2");
        let half_len = len / 2;
        let (w_re, w_im) = (0..=half_len)
            .map(|k| {
                let phase = -2.0 * PI * k as f64 / len as f64;
                (phase.cos() as f32, phase.sin() as f32)
            })
            .unzip();
        Self {
            len,
            half: ComplexFft::new(half_len),
            w_re,
            w_im,
            scratch_re: vec![0.0; half_len],
            scratch_im: vec![0.0; half_len],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of output bins, `len / 2 + 1`.
    pub fn num_bins(&self) -> usize {
        self.len / 2 + 1
    }

    /// Unscaled forward transform of `input` into `re`/`im`.
    pub fn forward(&mut self, input: &[f32], re: &mut [f32], im: &mut [f32]) {
        let m = self.len / 2;
        assert_eq!(input.len(), self.len);
        assert_eq!(re.len(), m + 1);
        assert_eq!(im.len(), m + 1);

        for (n, pair) in input.chunks_exact(2).enumerate() {
            self.scratch_re[n] = pair[0];
            self.scratch_im[n] = pair[1];
        }
        self.half.forward(&mut self.scratch_re, &mut self.scratch_im);

        for k in 0..=m {
            let (zr, zi) = (self.scratch_re[k % m], self.scratch_im[k % m]);
            let (cr, ci) = (self.scratch_re[(m - k) % m], -self.scratch_im[(m - k) % m]);
            // Even and odd sample spectra.
            let er = 0.5 * (zr + cr);
            let ei = 0.5 * (zi + ci);
            let or = 0.5 * (zi - ci);
            let oi = -0.5 * (zr - cr);
            let (wr, wi) = (self.w_re[k], self.w_im[k]);
            re[k] = er + wr * or - wi * oi;
            im[k] = ei + wr * oi + wi * or;
        }
    }

    /// Inverse transform scaled by `1/len`. The imaginary parts of the DC
    /// and Nyquist bins are ignored.
    pub fn inverse(&mut self, re: &[f32], im: &[f32], output: &mut [f32]) {
        let m = self.len / 2;
        assert_eq!(re.len(), m + 1);
        assert_eq!(im.len(), m + 1);
        assert_eq!(output.len(), self.len);

        for k in 0..m {
            let (xr, xi) = (re[k], if k == 0 { 0.0 } else { im[k] });
            let (cr, ci) = (re[m - k], if k == 0 { 0.0 } else { -im[m - k] });
            let er = 0.5 * (xr + cr);
            let ei = 0.5 * (xi + ci);
            let dr = 0.5 * (xr - cr);
            let di = 0.5 * (xi - ci);
            // Odd spectrum: d * conj(W^k).
            let (wr, wi) = (self.w_re[k], -self.w_im[k]);
            let or = dr * wr - di * wi;
            let oi = dr * wi + di * wr;
            // Z = E + i * O
            self.scratch_re[k] = er - oi;
            self.scratch_im[k] = ei + or;
        }
        self.half.inverse(&mut self.scratch_re, &mut self.scratch_im);

        for (n, pair) in output.chunks_exact_mut(2).enumerate() {
            pair[0] = self.scratch_re[n];
            pair[1] = self.scratch_im[n];
        }
    }
}
