//! Adaptive digital gain.
//!
//! Picks the gain that brings the estimated speech level plus its headroom
//! to `-headroom_db` dBFS, then limits it so the noise floor stays below
//! `max_output_noise_level_dbfs` and, while the speech level is not yet
//! reliable, so the limiter is not driven. The gain moves at most
//! `max_gain_change_db_per_second` and only increases after a run of
//! speech frames.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::common::{
    ADJACENT_SPEECH_FRAMES_THRESHOLD, FRAME_DURATION_MS, LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS,
    VAD_CONFIDENCE_THRESHOLD, db_to_ratio,
};
use crate::config::AdaptiveDigitalConfig;
use crate::gain_applier::GainApplier;

/// Per-frame inputs to [`AdaptiveDigitalGainController::process`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub speech_probability: f32,
    pub speech_level_dbfs: f32,
    pub speech_level_reliable: bool,
    pub noise_rms_dbfs: f32,
    pub headroom_db: f32,
    /// Limiter envelope after the previous frame.
    pub limiter_envelope_dbfs: f32,
}

fn compute_gain_db(input_level_dbfs: f32, config: &AdaptiveDigitalConfig) -> f32 {
    if input_level_dbfs < -(config.headroom_db + config.max_gain_db) {
        config.max_gain_db
    } else if input_level_dbfs < -config.headroom_db {
        -config.headroom_db - input_level_dbfs
    } else {
        0.0
    }
}

fn limit_gain_by_noise(
    target_gain_db: f32,
    input_noise_level_dbfs: f32,
    max_output_noise_level_dbfs: f32,
) -> f32 {
    let max_allowed_gain_db = max_output_noise_level_dbfs - input_noise_level_dbfs;
    target_gain_db.min(max_allowed_gain_db.max(0.0))
}

fn limit_gain_by_low_confidence(
    target_gain_db: f32,
    last_gain_db: f32,
    limiter_audio_level_dbfs: f32,
    estimate_is_confident: bool,
) -> f32 {
    if estimate_is_confident || limiter_audio_level_dbfs <= LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS {
        return target_gain_db;
    }
    let level_before_gain_dbfs = limiter_audio_level_dbfs - last_gain_db;
    let new_target_gain_db = (LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS - level_before_gain_dbfs).max(0.0);
    new_target_gain_db.min(target_gain_db)
}

#[derive(Debug, Clone)]
pub struct AdaptiveDigitalGainController {
    config: AdaptiveDigitalConfig,
    gain_applier: GainApplier,
    max_gain_change_db_per_frame: f32,
    last_gain_db: f32,
    frames_to_gain_increase_allowed: usize,
}

impl AdaptiveDigitalGainController {
    pub fn new(config: AdaptiveDigitalConfig) -> Self {
        Self {
            gain_applier: GainApplier::new(false, db_to_ratio(config.initial_gain_db)),
            max_gain_change_db_per_frame: config.max_gain_change_db_per_second
                * FRAME_DURATION_MS as f32
                / 1000.0,
            last_gain_db: config.initial_gain_db,
            frames_to_gain_increase_allowed: ADJACENT_SPEECH_FRAMES_THRESHOLD,
            config,
        }
    }

    /// Gain applied to the last frame.
    pub fn gain_db(&self) -> f32 {
        self.last_gain_db
    }

    pub fn process(&mut self, info: &FrameInfo, audio: &mut ChannelBuffer<f32>) {
        let input_level_dbfs = info.speech_level_dbfs + info.headroom_db;
        let target_gain_db = limit_gain_by_low_confidence(
            limit_gain_by_noise(
                compute_gain_db(input_level_dbfs, &self.config),
                info.noise_rms_dbfs,
                self.config.max_output_noise_level_dbfs,
            ),
            self.last_gain_db,
            info.limiter_envelope_dbfs,
            info.speech_level_reliable,
        );

        let mut max_gain_increase_db = self.max_gain_change_db_per_frame;
        if info.speech_probability < VAD_CONFIDENCE_THRESHOLD {
            self.frames_to_gain_increase_allowed = ADJACENT_SPEECH_FRAMES_THRESHOLD;
            max_gain_increase_db = 0.0;
        } else if self.frames_to_gain_increase_allowed > 0 {
            self.frames_to_gain_increase_allowed -= 1;
            max_gain_increase_db = 0.0;
        }

        let gain_change_db = (target_gain_db - self.last_gain_db)
            .clamp(-self.max_gain_change_db_per_frame, max_gain_increase_db);
        if gain_change_db != 0.0 {
            self.gain_applier
                .set_gain_factor(db_to_ratio(self.last_gain_db + gain_change_db));
        }
        self.gain_applier.apply(audio);
        self.last_gain_db += gain_change_db;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(speech_probability: f32, speech_level_dbfs: f32) -> FrameInfo {
        FrameInfo {
            speech_probability,
            speech_level_dbfs,
            speech_level_reliable: true,
            noise_rms_dbfs: -90.0,
            headroom_db: 12.0,
            limiter_envelope_dbfs: -30.0,
        }
    }

    fn run(controller: &mut AdaptiveDigitalGainController, info: &FrameInfo, frames: usize) {
        let mut audio = ChannelBuffer::new(160, 1);
        for _ in 0..frames {
            audio.fill(100.0);
            controller.process(info, &mut audio);
        }
    }

    #[test]
    fn target_gain_regions() {
        let config = AdaptiveDigitalConfig::default();
        assert_eq!(compute_gain_db(-80.0, &config), 50.0);
        assert_eq!(compute_gain_db(-25.0, &config), 20.0);
        assert_eq!(compute_gain_db(-2.0, &config), 0.0);
    }

    #[test]
    fn noise_limits_gain() {
        assert_eq!(limit_gain_by_noise(30.0, -70.0, -50.0), 20.0);
        assert_eq!(limit_gain_by_noise(30.0, -40.0, -50.0), 0.0);
    }

    #[test]
    fn low_confidence_keeps_limiter_idle() {
        assert_eq!(limit_gain_by_low_confidence(30.0, 10.0, 0.0, false), 9.0);
        assert_eq!(limit_gain_by_low_confidence(30.0, 10.0, 0.0, true), 30.0);
        assert_eq!(limit_gain_by_low_confidence(30.0, 10.0, -20.0, false), 30.0);
    }

    #[test]
    fn gain_rises_at_limited_rate_during_speech() {
        let mut controller = AdaptiveDigitalGainController::new(AdaptiveDigitalConfig::default());
        // Noise caps the 45 dB target at 40 dB, well above the initial 15 dB.
        let speech = info(1.0, -62.0);
        run(&mut controller, &speech, ADJACENT_SPEECH_FRAMES_THRESHOLD);
        assert_eq!(controller.gain_db(), 15.0);
        run(&mut controller, &speech, 100);
        assert!((controller.gain_db() - 21.0).abs() < 1e-3, "{}", controller.gain_db());
    }

    #[test]
    fn gain_holds_without_speech() {
        let mut controller = AdaptiveDigitalGainController::new(AdaptiveDigitalConfig::default());
        run(&mut controller, &info(0.0, -62.0), 500);
        assert_eq!(controller.gain_db(), 15.0);
    }

    #[test]
    fn gain_falls_for_loud_speech() {
        let mut controller = AdaptiveDigitalGainController::new(AdaptiveDigitalConfig::default());
        run(&mut controller, &info(0.0, -3.0), 100);
        assert!((controller.gain_db() - 9.0).abs() < 1e-3, "{}", controller.gain_db());
    }
}
