//! Cascade of direct-form I biquad sections.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Normalized biquad coefficients (`a0 == 1`).
///
/// `y[n] = b0 x[n] + b1 x[n-1] + b2 x[n-2] - a1 y[n-1] - a2 y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiQuadCoefficients {
    pub b: [f32; 3],
    pub a: [f32; 2],
}

impl BiQuadCoefficients {
    /// Second-order Butterworth high-pass at `cutoff_hz`.
    pub fn butterworth_high_pass(cutoff_hz: f32, sample_rate_hz: u32) -> Self {
        let p = Prototype::new(cutoff_hz, sample_rate_hz);
        let b0 = (1.0 + p.cos_w0) / 2.0 / p.a0;
        p.with_numerator(b0, -2.0 * b0, b0)
    }

    /// Second-order Butterworth low-pass at `cutoff_hz`.
    pub fn butterworth_low_pass(cutoff_hz: f32, sample_rate_hz: u32) -> Self {
        let p = Prototype::new(cutoff_hz, sample_rate_hz);
        let b0 = (1.0 - p.cos_w0) / 2.0 / p.a0;
        p.with_numerator(b0, 2.0 * b0, b0)
    }
}

// Bilinear-transform terms shared by the Butterworth designs (Q = 1/sqrt(2)).
struct Prototype {
    cos_w0: f64,
    a0: f64,
    alpha: f64,
}

impl Prototype {
    fn new(cutoff_hz: f32, sample_rate_hz: u32) -> Self {
        let w0 = 2.0 * PI * f64::from(cutoff_hz) / f64::from(sample_rate_hz);
        let alpha = w0.sin() / (2.0 * FRAC_1_SQRT_2);
        Self {
            cos_w0: w0.cos(),
            a0: 1.0 + alpha,
            alpha,
        }
    }

    fn with_numerator(&self, b0: f64, b1: f64, b2: f64) -> BiQuadCoefficients {
        BiQuadCoefficients {
            b: [b0 as f32, b1 as f32, b2 as f32],
            a: [
                (-2.0 * self.cos_w0 / self.a0) as f32,
                ((1.0 - self.alpha) / self.a0) as f32,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BiQuadState {
    x: [f32; 2],
    y: [f32; 2],
}

#[derive(Debug, Clone)]
struct BiQuad {
    coefficients: BiQuadCoefficients,
    state: BiQuadState,
}

/// Applies a series of biquad sections to a mono signal.
#[derive(Debug, Clone)]
pub struct CascadedBiQuadFilter {
    biquads: Vec<BiQuad>,
}

impl CascadedBiQuadFilter {
    pub fn new(coefficients: &[BiQuadCoefficients]) -> Self {
        Self {
            biquads: coefficients
                .iter()
                .map(|&coefficients| BiQuad {
                    coefficients,
                    state: BiQuadState::default(),
                })
                .collect(),
        }
    }

    /// A single section repeated `num_sections` times.
    pub fn with_sections(coefficients: BiQuadCoefficients, num_sections: usize) -> Self {
        Self::new(&vec![coefficients; num_sections])
    }

    pub fn process(&mut self, x: &[f32], y: &mut [f32]) {
        y[..x.len()].copy_from_slice(x);
        self.process_in_place(&mut y[..x.len()]);
    }

    pub fn process_in_place(&mut self, y: &mut [f32]) {
        for biquad in &mut self.biquads {
            let c = biquad.coefficients;
            let s = &mut biquad.state;
            for v in y.iter_mut() {
                let x = *v;
                let out = c.b[0] * x + c.b[1] * s.x[0] + c.b[2] * s.x[1]
                    - c.a[0] * s.y[0]
                    - c.a[1] * s.y[1];
                s.x[1] = s.x[0];
                s.x[0] = x;
                s.y[1] = s.y[0];
                s.y[0] = out;
                *v = out;
            }
        }
    }

    pub fn reset(&mut self) {
        for biquad in &mut self.biquads {
            biquad.state = BiQuadState::default();
        }
    }
}
