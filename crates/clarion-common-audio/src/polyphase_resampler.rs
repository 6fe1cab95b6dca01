//! Rational-ratio polyphase FIR resampler for a single channel.
//!
//! The conversion `input_rate -> output_rate` is reduced to `L / M` with
//! `L = output_rate / g` and `M = input_rate / g`, `g = gcd(input, output)`.
//! A Kaiser-windowed sinc prototype at the upsampled rate is split into `L`
//! phases of `TAPS_PER_PHASE` coefficients. Each output sample is one dot
//! product of a phase against the most recent input history.
//!
//! The position of the next output is carried between calls, so feeding a
//! signal in arbitrary chunk sizes yields the same output as feeding it at
//! once, and 10 ms chunks at rates that are multiples of 100 Hz always yield
//! exactly `output_rate / 100` samples.

use std::f64::consts::PI;

use clarion_simd::SimdBackend;

/// Filter taps per polyphase branch when upsampling. Downsampling by `M / L`
/// scales this by `ceil(M / L)` to keep the transition band proportional to
/// the output rate.
pub const TAPS_PER_PHASE: usize = 64;

/// Upper bound on the prototype filter length.
pub const MAX_PROTOTYPE_LEN: usize = 1 << 18;

const KAISER_BETA: f64 = 8.0;
// Fraction of the lower Nyquist frequency kept in the passband.
const CUTOFF_RATIO: f64 = 0.92;

pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Reduced `(up, down)` factors, or `None` if the prototype would exceed
/// [`MAX_PROTOTYPE_LEN`] or a rate is zero.
pub fn ratio(input_rate_hz: u32, output_rate_hz: u32) -> Option<(usize, usize)> {
    if input_rate_hz == 0 || output_rate_hz == 0 {
        return None;
    }
    let g = gcd(u64::from(input_rate_hz), u64::from(output_rate_hz));
    let up = (u64::from(output_rate_hz) / g) as usize;
    let down = (u64::from(input_rate_hz) / g) as usize;
    (up.checked_mul(taps_per_phase(up, down))? <= MAX_PROTOTYPE_LEN).then_some((up, down))
}

fn taps_per_phase(up: usize, down: usize) -> usize {
    TAPS_PER_PHASE.saturating_mul(down.div_ceil(up).max(1))
}

/// Zeroth-order modified Bessel function of the first kind.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half = x / 2.0;
    for k in 1..64 {
        term *= half / k as f64;
        let t2 = term * term;
        sum += t2;
        if t2 < sum * 1e-16 {
            break;
        }
    }
    sum
}

/// Phase-major filter bank; each row is stored time-reversed.
fn design_phases(up: usize, down: usize) -> (Vec<f32>, usize) {
    if up == 1 && down == 1 {
        return (vec![1.0], 1);
    }
    let taps = taps_per_phase(up, down);
    let len = up * taps;
    let cutoff = CUTOFF_RATIO * 0.5 / up.max(down) as f64;
    let center = (len - 1) as f64 / 2.0;
    let norm = bessel_i0(KAISER_BETA);
    let prototype: Vec<f64> = (0..len)
        .map(|m| {
            let t = m as f64 - center;
            let arg = 2.0 * cutoff * t;
            let sinc = if arg.abs() < 1e-12 {
                1.0
            } else {
                (PI * arg).sin() / (PI * arg)
            };
            let r = 2.0 * m as f64 / (len - 1) as f64 - 1.0;
            let window = bessel_i0(KAISER_BETA * (1.0 - r * r).max(0.0).sqrt()) / norm;
            2.0 * cutoff * sinc * window
        })
        .collect();

    let mut phases = vec![0.0f32; len];
    for p in 0..up {
        let row: Vec<f64> = (0..taps).map(|k| prototype[p + up * k]).collect();
        let sum: f64 = row.iter().sum();
        let scale = if sum.abs() > 1e-12 { 1.0 / sum } else { up as f64 };
        let dest = &mut phases[p * taps..(p + 1) * taps];
        for (j, d) in dest.iter_mut().enumerate() {
            *d = (row[taps - 1 - j] * scale) as f32;
        }
    }
    (phases, taps)
}

#[derive(derive_more::Debug, Clone)]
pub struct PolyphaseResampler {
    input_rate_hz: u32,
    output_rate_hz: u32,
    up: usize,
    down: usize,
    taps: usize,
    #[debug(skip)]
    phases: Vec<f32>,
    #[debug(skip)]
    history: Vec<f32>,
    #[debug(skip)]
    work: Vec<f32>,
    // Upsampled-rate position of the next output, relative to the start of
    // the next input chunk.
    next_up: usize,
    backend: SimdBackend,
}

impl PolyphaseResampler {
    /// Returns `None` when the ratio is unsupported (see [`ratio`]).
    pub fn new(input_rate_hz: u32, output_rate_hz: u32, backend: SimdBackend) -> Option<Self> {
        let (up, down) = ratio(input_rate_hz, output_rate_hz)?;
        let (phases, taps) = design_phases(up, down);
        Some(Self {
            input_rate_hz,
            output_rate_hz,
            up,
            down,
            taps,
            phases,
            history: vec![0.0; taps - 1],
            work: Vec::new(),
            next_up: 0,
            backend,
        })
    }

    pub fn input_rate_hz(&self) -> u32 {
        self.input_rate_hz
    }

    pub fn output_rate_hz(&self) -> u32 {
        self.output_rate_hz
    }

    /// Group delay in input samples.
    pub fn delay_input_samples(&self) -> f32 {
        if self.taps == 1 {
            0.0
        } else {
            ((self.up * self.taps - 1) as f32 / 2.0) / self.up as f32
        }
    }

    /// Exact number of samples the next `process` call yields for
    /// `input_len` input samples.
    pub fn output_len(&self, input_len: usize) -> usize {
        let span = input_len * self.up;
        if span <= self.next_up {
            0
        } else {
            (span - self.next_up).div_ceil(self.down)
        }
    }

    /// Clears history and phase.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.next_up = 0;
    }

    /// Resamples `input` into the front of `output` and returns the number of
    /// samples written, which equals [`Self::output_len`].
    ///
    /// # Panics
    ///
    /// Panics if `output` is shorter than [`Self::output_len`].
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let needed = self.output_len(input.len());
        assert!(
            output.len() >= needed,
            "output holds {} samples, {needed} needed",
            output.len()
        );

        self.work.clear();
        self.work.extend_from_slice(&self.history);
        self.work.extend_from_slice(input);

        let span = input.len() * self.up;
        let mut produced = 0;
        while self.next_up < span {
            let i = self.next_up / self.up;
            let p = self.next_up % self.up;
            let row = &self.phases[p * self.taps..(p + 1) * self.taps];
            output[produced] = self.backend.dot_product(row, &self.work[i..i + self.taps]);
            produced += 1;
            self.next_up += self.down;
        }
        self.next_up -= span;

        let keep = self.history.len();
        let start = self.work.len() - keep;
        self.history.copy_from_slice(&self.work[start..]);
        produced
    }
}
