use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::adaptive_digital_gain_controller::{AdaptiveDigitalGainController, FrameInfo};
use crate::common::{
    SATURATION_PROTECTOR_INITIAL_HEADROOM_DB, compute_audio_levels, db_to_ratio,
    float_s16_to_dbfs,
};
use crate::config::Agc2Config;
use crate::gain_applier::GainApplier;
use crate::limiter::Limiter;
use crate::noise_level_estimator::NoiseLevelEstimator;
use crate::saturation_protector::SaturationProtector;
use crate::speech_level_estimator::SpeechLevelEstimator;
use crate::vad_wrapper::VadWrapper;

/// Speech probability, level and headroom estimation plus the adaptive
/// gain stage. Present only when adaptive digital gain is enabled.
#[derive(Debug)]
struct AdaptiveStage {
    vad: VadWrapper,
    speech_level_estimator: SpeechLevelEstimator,
    saturation_protector: SaturationProtector,
    controller: AdaptiveDigitalGainController,
}

/// Gain controller 2.
///
/// Per frame: speech probability, audio levels, noise floor and speech
/// level are estimated first; then the fixed gain, the adaptive gain and
/// the limiter are applied in that order. Operates on float S16 audio.
#[derive(Debug)]
pub struct GainController2 {
    config: Agc2Config,
    sample_rate_hz: u32,
    num_channels: usize,
    fixed_gain_applier: GainApplier,
    noise_level_estimator: NoiseLevelEstimator,
    adaptive: Option<AdaptiveStage>,
    limiter: Limiter,
    last_speech_probability: f32,
}

impl GainController2 {
    pub fn new(mut config: Agc2Config, sample_rate_hz: u32, num_channels: usize) -> Self {
        if config.validate() {
            tracing::warn!(?config, "agc2 config out of range, clamped");
        }
        tracing::debug!(
            sample_rate_hz,
            num_channels,
            fixed_gain_db = config.fixed_digital.gain_db,
            adaptive = config.adaptive_digital.enabled,
            "agc2 initialized"
        );
        let adaptive = config.adaptive_digital.enabled.then(|| AdaptiveStage {
            vad: VadWrapper::new(sample_rate_hz),
            speech_level_estimator: SpeechLevelEstimator::new(&config.adaptive_digital),
            saturation_protector: SaturationProtector::new(SATURATION_PROTECTOR_INITIAL_HEADROOM_DB),
            controller: AdaptiveDigitalGainController::new(config.adaptive_digital),
        });
        Self {
            fixed_gain_applier: GainApplier::new(false, db_to_ratio(config.fixed_digital.gain_db)),
            noise_level_estimator: NoiseLevelEstimator::new(sample_rate_hz),
            adaptive,
            limiter: Limiter::new(),
            last_speech_probability: 0.0,
            config,
            sample_rate_hz,
            num_channels,
        }
    }

    pub fn config(&self) -> &Agc2Config {
        &self.config
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Adaptive gain applied to the last frame, 0 when adaptive gain is
    /// disabled.
    pub fn adaptive_gain_db(&self) -> f32 {
        self.adaptive
            .as_ref()
            .map_or(0.0, |stage| stage.controller.gain_db())
    }

    pub fn speech_level_dbfs(&self) -> Option<f32> {
        self.adaptive
            .as_ref()
            .map(|stage| stage.speech_level_estimator.level_dbfs())
    }

    pub fn last_speech_probability(&self) -> f32 {
        self.last_speech_probability
    }

    /// Processes one 10 ms frame in place.
    pub fn process(&mut self, audio: &mut ChannelBuffer<f32>) {
        let speech_probability = self
            .adaptive
            .as_mut()
            .map_or(0.0, |stage| stage.vad.analyze(audio));
        self.last_speech_probability = speech_probability;

        let levels = compute_audio_levels(audio);
        let noise_rms_dbfs = self.noise_level_estimator.analyze(audio);
        if let Some(stage) = self.adaptive.as_mut() {
            stage
                .speech_level_estimator
                .update(levels.rms_dbfs, levels.peak_dbfs, speech_probability);
        }

        self.fixed_gain_applier.apply(audio);

        if let Some(stage) = self.adaptive.as_mut() {
            let speech_level_dbfs = stage.speech_level_estimator.level_dbfs();
            stage
                .saturation_protector
                .analyze(speech_probability, levels.peak_dbfs, speech_level_dbfs);
            let info = FrameInfo {
                speech_probability,
                speech_level_dbfs,
                speech_level_reliable: stage.speech_level_estimator.is_confident(),
                noise_rms_dbfs,
                headroom_db: stage.saturation_protector.headroom_db(),
                limiter_envelope_dbfs: float_s16_to_dbfs(self.limiter.last_audio_level()),
            };
            stage.controller.process(&info, audio);
        }

        self.limiter.process(audio);
    }
}
