//! Sub-band log energies for the frame classifier.

use std::f32::consts::PI;

use clarion_fft::RealFft;

pub(crate) const NUM_BANDS: usize = 6;

/// Band edges in Hz. Everything above 4 kHz is ignored so that all rates
/// share one model.
const BAND_EDGES_HZ: [f32; NUM_BANDS + 1] = [80.0, 250.0, 500.0, 1000.0, 2000.0, 3000.0, 4000.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrameFeatures {
    /// Mean square of the frame, int16 units squared.
    pub(crate) energy: f32,
    /// Per-band mean-square contribution in dB re 1 LSB^2.
    pub(crate) log_energy: [f32; NUM_BANDS],
}

#[derive(derive_more::Debug)]
struct Plan {
    frame_len: usize,
    #[debug(skip)]
    fft: RealFft,
    #[debug(skip)]
    window: Vec<f32>,
    window_energy: f32,
}

impl Plan {
    fn new(frame_len: usize) -> Self {
        let fft_len = frame_len.next_power_of_two();
        let window: Vec<f32> = (0..frame_len)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * (n as f32 + 0.5) / frame_len as f32).cos())
            .collect();
        let window_energy = window.iter().map(|w| w * w).sum();
        Self {
            frame_len,
            fft: RealFft::new(fft_len),
            window,
            window_energy,
        }
    }
}

/// Caches one FFT plan per frame length.
#[derive(Debug, Default)]
pub(crate) struct FeatureExtractor {
    plans: Vec<Plan>,
    input: Vec<f32>,
    re: Vec<f32>,
    im: Vec<f32>,
}

impl FeatureExtractor {
    pub(crate) fn extract(&mut self, frame: &[i16], sample_rate_hz: u32) -> FrameFeatures {
        let energy =
            frame.iter().map(|&s| f32::from(s) * f32::from(s)).sum::<f32>() / frame.len() as f32;

        let index = match self.plans.iter().position(|p| p.frame_len == frame.len()) {
            Some(index) => index,
            None => {
                self.plans.push(Plan::new(frame.len()));
                self.plans.len() - 1
            }
        };
        let plan = &mut self.plans[index];
        let fft_len = plan.fft.len();

        self.input.clear();
        self.input
            .extend(frame.iter().zip(&plan.window).map(|(&s, w)| f32::from(s) * w));
        self.input.resize(fft_len, 0.0);
        self.re.resize(fft_len / 2 + 1, 0.0);
        self.im.resize(fft_len / 2 + 1, 0.0);
        plan.fft.forward(&self.input, &mut self.re, &mut self.im);

        let bin_hz = sample_rate_hz as f32 / fft_len as f32;
        // One-sided Parseval, normalized by the window energy.
        let scale = 2.0 / (fft_len as f32 * plan.window_energy);
        let mut log_energy = [0.0f32; NUM_BANDS];
        for (band, log_e) in log_energy.iter_mut().enumerate() {
            let lo = (BAND_EDGES_HZ[band] / bin_hz).ceil() as usize;
            let hi = ((BAND_EDGES_HZ[band + 1] / bin_hz).ceil() as usize).min(self.re.len());
            let power: f32 = (lo..hi)
                .map(|k| self.re[k] * self.re[k] + self.im[k] * self.im[k])
                .sum();
            *log_e = 10.0 * (power * scale + 1.0).log10();
        }
        FrameFeatures { energy, log_energy }
    }
}
