//! Output limiter.
//!
//! Maps the subframe envelope through [`LimiterDbGainCurve`] to one gain per
//! subframe boundary and interpolates between them per sample. When the gain
//! drops at the start of a frame, the first subframe follows a steep
//! power curve so the attack completes before the transient.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::common::{MAX_FLOAT_S16_VALUE, MIN_FLOAT_S16_VALUE, SUB_FRAMES_IN_FRAME};
use crate::fixed_digital_level_estimator::FixedDigitalLevelEstimator;
use crate::limiter_db_gain_curve::{GainCurveRegion, LimiterDbGainCurve};

const ATTACK_FIRST_SUBFRAME_INTERPOLATION_POWER: i32 = 8;
/// Frames between region statistics log lines.
const STATS_LOG_PERIOD_FRAMES: usize = 1000;

#[derive(Debug, Default, Clone, Copy)]
struct RegionStats {
    identity: usize,
    knee: usize,
    limiter: usize,
    saturation: usize,
}

impl RegionStats {
    fn record(&mut self, region: GainCurveRegion) {
        match region {
            GainCurveRegion::Identity => self.identity += 1,
            GainCurveRegion::Knee => self.knee += 1,
            GainCurveRegion::Limiter => self.limiter += 1,
            GainCurveRegion::Saturation => self.saturation += 1,
        }
    }

    fn total(&self) -> usize {
        self.identity + self.knee + self.limiter + self.saturation
    }
}

#[derive(derive_more::Debug)]
pub struct Limiter {
    curve: LimiterDbGainCurve,
    level_estimator: FixedDigitalLevelEstimator,
    #[debug(skip)]
    scaling_factors: [f32; SUB_FRAMES_IN_FRAME + 1],
    #[debug(skip)]
    per_sample_scaling_factors: Vec<f32>,
    last_scaling_factor: f32,
    stats: RegionStats,
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Limiter {
    pub fn new() -> Self {
        Self {
            curve: LimiterDbGainCurve::new(),
            level_estimator: FixedDigitalLevelEstimator::new(),
            scaling_factors: [1.0; SUB_FRAMES_IN_FRAME + 1],
            per_sample_scaling_factors: Vec::new(),
            last_scaling_factor: 1.0,
            stats: RegionStats::default(),
        }
    }

    /// Envelope at the end of the last processed frame, float S16.
    pub fn last_audio_level(&self) -> f32 {
        self.level_estimator.last_level()
    }

    pub fn last_scaling_factor(&self) -> f32 {
        self.last_scaling_factor
    }

    pub fn reset(&mut self) {
        self.level_estimator.reset();
        self.last_scaling_factor = 1.0;
        self.stats = RegionStats::default();
    }

    pub fn process(&mut self, audio: &mut ChannelBuffer<f32>) {
        let num_frames = audio.num_frames();
        if num_frames == 0 {
            return;
        }
        let envelope = self.level_estimator.compute_level(audio);

        self.scaling_factors[0] = self.last_scaling_factor;
        for (factor, &level) in self.scaling_factors[1..].iter_mut().zip(&envelope) {
            *factor = self.curve.gain_linear(f64::from(level)) as f32;
        }
        self.stats
            .record(self.curve.region(f64::from(envelope[SUB_FRAMES_IN_FRAME - 1])));

        self.per_sample_scaling_factors.resize(num_frames, 1.0);
        compute_per_sample_factors(
            &self.scaling_factors,
            FixedDigitalLevelEstimator::subframe_len(num_frames),
            &mut self.per_sample_scaling_factors,
        );

        for channel in audio.channels_mut() {
            for (x, &gain) in channel.iter_mut().zip(&self.per_sample_scaling_factors) {
                *x = (*x * gain).clamp(MIN_FLOAT_S16_VALUE, MAX_FLOAT_S16_VALUE);
            }
        }

        self.last_scaling_factor = self.scaling_factors[SUB_FRAMES_IN_FRAME];
        if self.stats.total() >= STATS_LOG_PERIOD_FRAMES {
            tracing::debug!(
                identity = self.stats.identity,
                knee = self.stats.knee,
                limiter = self.stats.limiter,
                saturation = self.stats.saturation,
                "limiter region stats"
            );
            self.stats = RegionStats::default();
        }
    }
}

fn compute_per_sample_factors(
    scaling_factors: &[f32; SUB_FRAMES_IN_FRAME + 1],
    sub_len: usize,
    per_sample: &mut [f32],
) {
    let num_frames = per_sample.len();
    let is_attack = scaling_factors[0] > scaling_factors[1];
    let first_len = sub_len.min(num_frames);
    if is_attack {
        let (last, current) = (scaling_factors[0], scaling_factors[1]);
        for (i, factor) in per_sample[..first_len].iter_mut().enumerate() {
            let t = 1.0 - i as f32 / first_len as f32;
            *factor = t.powi(ATTACK_FIRST_SUBFRAME_INTERPOLATION_POWER) * (last - current) + current;
        }
    }

    let first = usize::from(is_attack);
    for i in first..SUB_FRAMES_IN_FRAME {
        let start = (i * sub_len).min(num_frames);
        let end = ((i + 1) * sub_len).min(num_frames);
        let (from, to) = (scaling_factors[i], scaling_factors[i + 1]);
        let step = (to - from) / sub_len as f32;
        for (j, factor) in per_sample[start..end].iter_mut().enumerate() {
            *factor = from + step * j as f32;
        }
    }
    let covered = (SUB_FRAMES_IN_FRAME * sub_len).min(num_frames);
    per_sample[covered..].fill(scaling_factors[SUB_FRAMES_IN_FRAME]);
}
