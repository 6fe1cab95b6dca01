//! Speech level estimator.
//!
//! Averages the RMS level of speech frames, weighted by speech probability.
//! A preliminary estimate is updated on every speech frame and promoted to
//! the reliable one only after [`ADJACENT_SPEECH_FRAMES_THRESHOLD`]
//! consecutive speech frames. Shorter bursts are discarded.

use crate::common::{
    ADJACENT_SPEECH_FRAMES_THRESHOLD, FRAME_DURATION_MS, LEVEL_ESTIMATOR_LEAK_FACTOR,
    LEVEL_ESTIMATOR_TIME_TO_CONFIDENCE_MS, SATURATION_PROTECTOR_INITIAL_HEADROOM_DB,
    VAD_CONFIDENCE_THRESHOLD,
};
use crate::config::AdaptiveDigitalConfig;

const MIN_SPEECH_LEVEL_DBFS: f32 = -90.0;
const MAX_SPEECH_LEVEL_DBFS: f32 = 30.0;

fn clamp_level_dbfs(level_dbfs: f32) -> f32 {
    level_dbfs.clamp(MIN_SPEECH_LEVEL_DBFS, MAX_SPEECH_LEVEL_DBFS)
}

/// Level estimate before the first speech has been observed.
pub fn initial_speech_level_dbfs(config: &AdaptiveDigitalConfig) -> f32 {
    (-SATURATION_PROTECTOR_INITIAL_HEADROOM_DB - config.initial_gain_db - config.headroom_db)
        .clamp(MIN_SPEECH_LEVEL_DBFS, 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LevelEstimatorState {
    time_to_confidence_ms: usize,
    numerator: f32,
    denominator: f32,
}

impl LevelEstimatorState {
    fn new(initial_level_dbfs: f32) -> Self {
        Self {
            time_to_confidence_ms: LEVEL_ESTIMATOR_TIME_TO_CONFIDENCE_MS,
            numerator: initial_level_dbfs,
            denominator: 1.0,
        }
    }

    fn level_dbfs(&self) -> f32 {
        self.numerator / self.denominator
    }
}

#[derive(Debug, Clone)]
pub struct SpeechLevelEstimator {
    initial_level_dbfs: f32,
    preliminary_state: LevelEstimatorState,
    reliable_state: LevelEstimatorState,
    level_dbfs: f32,
    is_confident: bool,
    num_adjacent_speech_frames: usize,
}

impl SpeechLevelEstimator {
    pub fn new(config: &AdaptiveDigitalConfig) -> Self {
        let initial_level_dbfs = initial_speech_level_dbfs(config);
        let state = LevelEstimatorState::new(initial_level_dbfs);
        Self {
            initial_level_dbfs,
            preliminary_state: state,
            reliable_state: state,
            level_dbfs: clamp_level_dbfs(initial_level_dbfs),
            is_confident: false,
            num_adjacent_speech_frames: 0,
        }
    }

    pub fn update(&mut self, rms_dbfs: f32, _peak_dbfs: f32, speech_probability: f32) {
        if speech_probability < VAD_CONFIDENCE_THRESHOLD {
            if self.num_adjacent_speech_frames >= ADJACENT_SPEECH_FRAMES_THRESHOLD {
                self.reliable_state = self.preliminary_state;
            } else if self.num_adjacent_speech_frames > 0 {
                self.preliminary_state = self.reliable_state;
            }
            self.num_adjacent_speech_frames = 0;
        } else {
            self.num_adjacent_speech_frames += 1;
            let state = &mut self.preliminary_state;
            let buffer_is_full = state.time_to_confidence_ms == 0;
            if !buffer_is_full {
                state.time_to_confidence_ms -= FRAME_DURATION_MS;
            }
            let leak = if buffer_is_full {
                LEVEL_ESTIMATOR_LEAK_FACTOR
            } else {
                1.0
            };
            state.numerator = state.numerator * leak + rms_dbfs * speech_probability;
            state.denominator = state.denominator * leak + speech_probability;
            if self.num_adjacent_speech_frames >= ADJACENT_SPEECH_FRAMES_THRESHOLD {
                self.level_dbfs = clamp_level_dbfs(state.level_dbfs());
            }
        }
        self.is_confident = self.reliable_state.time_to_confidence_ms == 0
            || (self.num_adjacent_speech_frames >= ADJACENT_SPEECH_FRAMES_THRESHOLD
                && self.preliminary_state.time_to_confidence_ms == 0);
    }

    pub fn level_dbfs(&self) -> f32 {
        self.level_dbfs
    }

    /// True once enough speech has been observed for the level to be
    /// trusted.
    pub fn is_confident(&self) -> bool {
        self.is_confident
    }

    pub fn reset(&mut self) {
        let state = LevelEstimatorState::new(self.initial_level_dbfs);
        self.preliminary_state = state;
        self.reliable_state = state;
        self.level_dbfs = clamp_level_dbfs(self.initial_level_dbfs);
        self.is_confident = false;
        self.num_adjacent_speech_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> SpeechLevelEstimator {
        SpeechLevelEstimator::new(&AdaptiveDigitalConfig::default())
    }

    #[test]
    fn initial_level_from_config() {
        let estimator = estimator();
        assert_eq!(estimator.level_dbfs(), -40.0);
        assert!(!estimator.is_confident());
    }

    #[test]
    fn converges_on_sustained_speech() {
        let mut estimator = estimator();
        for _ in 0..300 {
            estimator.update(-20.0, -10.0, 1.0);
        }
        assert!((estimator.level_dbfs() + 20.0).abs() < 0.5, "{}", estimator.level_dbfs());
        assert!(estimator.is_confident());
    }

    #[test]
    fn short_bursts_are_discarded() {
        let mut estimator = estimator();
        for _ in 0..50 {
            for _ in 0..ADJACENT_SPEECH_FRAMES_THRESHOLD - 1 {
                estimator.update(-10.0, 0.0, 1.0);
            }
            estimator.update(-80.0, -70.0, 0.0);
        }
        assert_eq!(estimator.level_dbfs(), -40.0);
        assert!(!estimator.is_confident());
    }

    #[test]
    fn non_speech_frames_do_not_move_the_level() {
        let mut estimator = estimator();
        for _ in 0..100 {
            estimator.update(-30.0, -20.0, 1.0);
        }
        let level = estimator.level_dbfs();
        for _ in 0..100 {
            estimator.update(-80.0, -70.0, 0.5);
        }
        assert_eq!(estimator.level_dbfs(), level);
    }
}
