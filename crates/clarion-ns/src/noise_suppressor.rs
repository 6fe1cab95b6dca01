use crate::config::{FrameLayout, NsConfig, SuppressionParams};
use crate::noise_estimator::NoiseEstimator;
use crate::ns_fft::NsFft;
use crate::speech_probability_estimator::SpeechProbabilityEstimator;
use crate::wiener_filter::WienerFilter;

/// Magnitude spectrum, offset by one so that logs stay finite.
fn magnitude_spectrum(re: &[f32], im: &[f32], magnitude: &mut [f32]) {
    for ((m, &r), &i) in magnitude.iter_mut().zip(re).zip(im) {
        *m = (r * r + i * i).sqrt() + 1.0;
    }
}

fn energy(x: &[f32]) -> f32 {
    x.iter().map(|v| v * v).sum()
}

/// Single-channel noise suppressor for 10 ms frames of float S16 audio.
///
/// [`Self::analyze`] must be called before [`Self::process`] for each
/// frame. Output is delayed by half a frame.
#[derive(derive_more::Debug)]
pub struct NoiseSuppressor {
    config: NsConfig,
    layout: FrameLayout,
    #[debug(skip)]
    fft: NsFft,
    num_analyzed_frames: usize,
    noise_estimator: NoiseEstimator,
    speech_probability_estimator: SpeechProbabilityEstimator,
    wiener_filter: WienerFilter,

    #[debug(skip)]
    analyze_memory: Vec<f32>,
    #[debug(skip)]
    process_memory: Vec<f32>,
    #[debug(skip)]
    overlap_memory: Vec<f32>,

    #[debug(skip)]
    extended: Vec<f32>,
    #[debug(skip)]
    re: Vec<f32>,
    #[debug(skip)]
    im: Vec<f32>,
    #[debug(skip)]
    signal_spectrum: Vec<f32>,
    #[debug(skip)]
    prev_analysis_signal_spectrum: Vec<f32>,
    #[debug(skip)]
    prior_snr: Vec<f32>,
    #[debug(skip)]
    post_snr: Vec<f32>,
}

impl NoiseSuppressor {
    /// Creates a suppressor for audio at `sample_rate_hz`.
    ///
    /// # Panics
    ///
    /// If the rate is below 8 kHz or not a multiple of 100 Hz.
    pub fn new(config: NsConfig, sample_rate_hz: u32) -> Self {
        assert!(
            sample_rate_hz >= 8000 && sample_rate_hz % 100 == 0,
            "unsupported noise suppression rate {sample_rate_hz}"
        );
        let layout = FrameLayout::new(sample_rate_hz);
        let params = SuppressionParams::new(config.target_level);
        let bins = layout.num_bins;
        tracing::debug!(
            sample_rate_hz,
            fft_len = layout.fft_len,
            level = ?config.target_level,
            "noise suppressor initialized"
        );
        Self {
            config,
            layout,
            fft: NsFft::new(&layout),
            num_analyzed_frames: 0,
            noise_estimator: NoiseEstimator::new(params, bins),
            speech_probability_estimator: SpeechProbabilityEstimator::new(
                bins,
                layout.num_feature_bins,
            ),
            wiener_filter: WienerFilter::new(params, bins),
            analyze_memory: vec![0.0; layout.overlap_len],
            process_memory: vec![0.0; layout.overlap_len],
            overlap_memory: vec![0.0; layout.overlap_len],
            extended: vec![0.0; layout.extended_len()],
            re: vec![0.0; bins],
            im: vec![0.0; bins],
            signal_spectrum: vec![0.0; bins],
            prev_analysis_signal_spectrum: vec![0.0; bins],
            prior_snr: vec![0.0; bins],
            post_snr: vec![0.0; bins],
        }
    }

    pub fn config(&self) -> NsConfig {
        self.config
    }

    /// Samples per 10 ms frame.
    pub fn frame_len(&self) -> usize {
        self.layout.frame_len
    }

    /// Frame-level prior speech probability from the last analysis.
    pub fn speech_probability(&self) -> f32 {
        self.speech_probability_estimator.prior_probability()
    }

    /// Updates the noise and speech models from one frame.
    pub fn analyze(&mut self, frame: &[f32]) {
        debug_assert_eq!(frame.len(), self.layout.frame_len);
        Self::form_extended_frame(frame, &mut self.analyze_memory, &mut self.extended);
        self.fft.apply_window(&mut self.extended);

        // Zero frames carry no information about the noise.
        if energy(&self.extended) == 0.0 {
            return;
        }
        self.num_analyzed_frames = self.num_analyzed_frames.saturating_add(1);

        self.noise_estimator.prepare_analysis();
        self.fft.fft(&self.extended, &mut self.re, &mut self.im);
        magnitude_spectrum(&self.re, &self.im, &mut self.signal_spectrum);
        let signal_spectral_sum: f32 = self.signal_spectrum.iter().sum();

        self.noise_estimator.pre_update(
            self.num_analyzed_frames,
            &self.signal_spectrum,
            signal_spectral_sum,
        );

        let filter = self.wiener_filter.filter();
        let noise = self.noise_estimator.noise_spectrum();
        let prev_noise = self.noise_estimator.prev_noise_spectrum();
        for i in 0..self.layout.num_bins {
            let prev_estimate =
                self.prev_analysis_signal_spectrum[i] / (prev_noise[i] + 0.0001) * filter[i];
            self.post_snr[i] = if self.signal_spectrum[i] > noise[i] + 0.0001 {
                self.signal_spectrum[i] / (noise[i] + 0.0001) - 1.0
            } else {
                0.0
            };
            self.prior_snr[i] = 0.98 * prev_estimate + 0.02 * self.post_snr[i];
        }

        self.speech_probability_estimator
            .update(&self.prior_snr, &self.post_snr, &self.signal_spectrum);
        self.noise_estimator.post_update(
            self.speech_probability_estimator.probability(),
            &self.signal_spectrum,
        );
        self.prev_analysis_signal_spectrum
            .copy_from_slice(&self.signal_spectrum);
    }

    /// Applies the suppression gain to one frame in place.
    pub fn process(&mut self, frame: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.layout.frame_len);
        Self::form_extended_frame(frame, &mut self.process_memory, &mut self.extended);
        self.fft.apply_window(&mut self.extended);
        let energy_before = energy(&self.extended);

        self.fft.fft(&self.extended, &mut self.re, &mut self.im);
        magnitude_spectrum(&self.re, &self.im, &mut self.signal_spectrum);

        self.wiener_filter.update(
            self.num_analyzed_frames,
            self.noise_estimator.noise_spectrum(),
            self.noise_estimator.prev_noise_spectrum(),
            self.noise_estimator.parametric_noise_spectrum(),
            &self.signal_spectrum,
        );
        for ((r, i), &g) in self
            .re
            .iter_mut()
            .zip(self.im.iter_mut())
            .zip(self.wiener_filter.filter())
        {
            *r *= g;
            *i *= g;
        }

        self.fft.ifft(&self.re, &self.im, &mut self.extended);
        let energy_after = energy(&self.extended);
        let scale = self.wiener_filter.overall_scaling_factor(
            self.num_analyzed_frames,
            self.speech_probability_estimator.prior_probability(),
            energy_before,
            energy_after,
        );
        self.fft.apply_window(&mut self.extended);

        let ov = self.layout.overlap_len;
        let n = self.layout.frame_len;
        for (t, out) in frame.iter_mut().enumerate() {
            let mut v = self.extended[t];
            if t < ov {
                v += self.overlap_memory[t];
            }
            *out = (v * scale).clamp(-32768.0, 32767.0);
        }
        self.overlap_memory.copy_from_slice(&self.extended[n..]);
    }

    /// `[memory, frame]` into `extended`, then keeps the frame tail as the
    /// next memory.
    fn form_extended_frame(frame: &[f32], memory: &mut [f32], extended: &mut [f32]) {
        let ov = memory.len();
        extended[..ov].copy_from_slice(memory);
        extended[ov..].copy_from_slice(frame);
        memory.copy_from_slice(&frame[frame.len() - ov..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SuppressionLevel;

    fn lcg_noise(seed: &mut u32, amplitude: f32) -> f32 {
        *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (*seed >> 8) as f32 / (1u32 << 24) as f32 * 2.0 * amplitude - amplitude
    }

    #[test]
    fn silence_stays_silent() {
        for rate in [8000, 16000, 32000, 48000] {
            let mut ns = NoiseSuppressor::new(NsConfig::default(), rate);
            let mut frame = vec![0.0f32; ns.frame_len()];
            for _ in 0..20 {
                ns.analyze(&frame);
                ns.process(&mut frame);
                assert!(frame.iter().all(|&s| s == 0.0));
            }
        }
    }

    #[test]
    fn passes_signal_unchanged_through_overlap_add_with_unit_gain() {
        // Before any analysis the filter is unity, so output is the input
        // delayed by half a frame.
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 16000);
        let input: Vec<f32> = (0..480).map(|i| 1000.0 * (i as f32 * 0.05).sin()).collect();
        let mut output = Vec::new();
        for chunk in input.chunks(160) {
            let mut frame = chunk.to_vec();
            ns.process(&mut frame);
            output.extend(frame);
        }
        for t in 160..480 {
            assert!((output[t] - input[t - 80]).abs() < 0.5, "t={t}");
        }
    }

    #[test]
    fn stationary_noise_is_attenuated() {
        let mut ns = NoiseSuppressor::new(NsConfig::default(), 16000);
        let mut seed = 7u32;
        let mut energy_in = 0.0f64;
        let mut energy_out = 0.0f64;
        for frame_index in 0..500 {
            let mut frame: Vec<f32> = (0..160).map(|_| lcg_noise(&mut seed, 3000.0)).collect();
            if frame_index >= 300 {
                energy_in += frame.iter().map(|&s| f64::from(s * s)).sum::<f64>();
            }
            ns.analyze(&frame);
            ns.process(&mut frame);
            assert!(frame.iter().all(|s| s.is_finite()));
            if frame_index >= 300 {
                energy_out += frame.iter().map(|&s| f64::from(s * s)).sum::<f64>();
            }
        }
        let reduction_db = 10.0 * (energy_in / energy_out).log10();
        assert!(reduction_db > 6.0, "reduction {reduction_db} dB");
    }

    #[test]
    fn stronger_levels_remove_more_noise() {
        let levels = [
            SuppressionLevel::K6dB,
            SuppressionLevel::K12dB,
            SuppressionLevel::K18dB,
            SuppressionLevel::K21dB,
        ];
        let residual: Vec<f64> = levels
            .iter()
            .map(|&target_level| {
                let mut ns = NoiseSuppressor::new(NsConfig { target_level }, 16000);
                let mut seed = 99u32;
                let mut out = 0.0f64;
                for frame_index in 0..400 {
                    let mut frame: Vec<f32> =
                        (0..160).map(|_| lcg_noise(&mut seed, 2000.0)).collect();
                    ns.analyze(&frame);
                    ns.process(&mut frame);
                    if frame_index >= 250 {
                        out += frame.iter().map(|&s| f64::from(s * s)).sum::<f64>();
                    }
                }
                out
            })
            .collect();
        for pair in residual.windows(2) {
            assert!(pair[1] < pair[0], "residuals {residual:?}");
        }
    }
}
