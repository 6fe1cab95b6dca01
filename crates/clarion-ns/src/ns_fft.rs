//! Windowed FFT analysis and overlap-add synthesis.

use std::f32::consts::FRAC_PI_2;

use clarion_fft::RealFft;

use crate::config::FrameLayout;

/// Sine-rise / flat / cosine-fall window over the extended frame. Applied
/// on both analysis and synthesis, so overlapping halves sum to one.
fn extended_window(layout: &FrameLayout) -> Vec<f32> {
    let ov = layout.overlap_len as f32;
    (0..layout.extended_len())
        .map(|t| {
            if t < layout.overlap_len {
                (FRAC_PI_2 * (t as f32 + 0.5) / ov).sin()
            } else if t >= layout.frame_len {
                (FRAC_PI_2 * ((t - layout.frame_len) as f32 + 0.5) / ov).cos()
            } else {
                1.0
            }
        })
        .collect()
}

#[derive(derive_more::Debug)]
pub(crate) struct NsFft {
    #[debug(skip)]
    fft: RealFft,
    #[debug(skip)]
    window: Vec<f32>,
    #[debug(skip)]
    scratch: Vec<f32>,
}

impl NsFft {
    pub(crate) fn new(layout: &FrameLayout) -> Self {
        Self {
            fft: RealFft::new(layout.fft_len),
            window: extended_window(layout),
            scratch: vec![0.0; layout.fft_len],
        }
    }

    pub(crate) fn apply_window(&self, extended: &mut [f32]) {
        debug_assert_eq!(extended.len(), self.window.len());
        for (x, w) in extended.iter_mut().zip(&self.window) {
            *x *= w;
        }
    }

    /// Zero-pads the windowed extended frame and transforms it.
    pub(crate) fn fft(&mut self, extended: &[f32], re: &mut [f32], im: &mut [f32]) {
        let n = extended.len();
        self.scratch[..n].copy_from_slice(extended);
        self.scratch[n..].fill(0.0);
        self.fft.forward(&self.scratch, re, im);
    }

    /// Inverse transform, keeping the first `extended.len()` samples.
    pub(crate) fn ifft(&mut self, re: &[f32], im: &[f32], extended: &mut [f32]) {
        self.fft.inverse(re, im, &mut self.scratch);
        extended.copy_from_slice(&self.scratch[..extended.len()]);
    }
}
