//! Slow microphone level adaptation.
//!
//! The mean speech level is measured over blocks of speech frames and the
//! level is stepped towards a window around the target. Clipping input
//! lowers the level immediately. The level range is treated as spanning
//! [`LEVEL_RANGE_DB`] linearly in dB.

/// Gain span of the full level range.
const LEVEL_RANGE_DB: f32 = 30.0;
/// Speech frames per level decision.
const FRAMES_PER_UPDATE: usize = 10;
const TARGET_WINDOW_DB: f32 = 3.0;
const MAX_STEP_DB: f32 = 3.0;
/// Input speech is aimed this far below the compressor target.
const TARGET_OFFSET_DB: f32 = 15.0;
/// Peak sample magnitude treated as clipping.
const SATURATION_THRESHOLD: f32 = 32000.0;
/// Fraction of the distance to the minimum dropped on saturation.
const SATURATION_DROP: f32 = 0.05;

#[derive(Debug, Clone)]
pub(crate) struct AnalogLevelController {
    minimum: i32,
    maximum: i32,
    level: i32,
    target_dbfs: f32,
    speech_level_sum_db: f32,
    speech_frames: usize,
}

impl AnalogLevelController {
    pub(crate) fn new(minimum: i32, maximum: i32, initial: i32, target_level_dbfs: i32) -> Self {
        Self {
            minimum,
            maximum,
            level: initial.clamp(minimum, maximum),
            target_dbfs: -(target_level_dbfs as f32) - TARGET_OFFSET_DB,
            speech_level_sum_db: 0.0,
            speech_frames: 0,
        }
    }

    pub(crate) fn level(&self) -> i32 {
        self.level
    }

    /// Takes over a level set from outside, such as a user moving the
    /// hardware slider.
    pub(crate) fn set_level(&mut self, level: i32) {
        let level = level.clamp(self.minimum, self.maximum);
        if level != self.level {
            self.level = level;
            self.speech_level_sum_db = 0.0;
            self.speech_frames = 0;
        }
    }

    /// Gain in dB represented by the current level, relative to the
    /// minimum.
    pub(crate) fn level_gain_db(&self) -> f32 {
        (self.level - self.minimum) as f32 * LEVEL_RANGE_DB / (self.maximum - self.minimum) as f32
    }

    fn levels_for_db(&self, db: f32) -> i32 {
        let per_db = (self.maximum - self.minimum) as f32 / LEVEL_RANGE_DB;
        ((db * per_db).round() as i32).max(1)
    }

    /// Feeds one frame. `rms_dbfs` and `peak` describe the input as the
    /// controller should see it.
    pub(crate) fn update(&mut self, rms_dbfs: f32, peak: f32, speech: bool, allow_increase: bool) {
        if peak >= SATURATION_THRESHOLD {
            let drop = (((self.level - self.minimum) as f32 * SATURATION_DROP).round() as i32).max(1);
            let level = (self.level - drop).max(self.minimum);
            if level != self.level {
                tracing::debug!(from = self.level, to = level, "input saturated, lowering level");
                self.level = level;
            }
            self.speech_level_sum_db = 0.0;
            self.speech_frames = 0;
            return;
        }
        if !speech {
            return;
        }
        self.speech_level_sum_db += rms_dbfs;
        self.speech_frames += 1;
        if self.speech_frames < FRAMES_PER_UPDATE {
            return;
        }

        let mean_db = self.speech_level_sum_db / self.speech_frames as f32;
        self.speech_level_sum_db = 0.0;
        self.speech_frames = 0;

        let error_db = self.target_dbfs - mean_db;
        let level = if error_db > TARGET_WINDOW_DB && allow_increase {
            self.level + self.levels_for_db(error_db.min(MAX_STEP_DB))
        } else if error_db < -TARGET_WINDOW_DB {
            self.level - self.levels_for_db((-error_db).min(MAX_STEP_DB))
        } else {
            self.level
        };
        let level = level.clamp(self.minimum, self.maximum);
        if level != self.level {
            tracing::debug!(from = self.level, to = level, mean_db, "adjusting level");
            self.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_speech_raises_the_level() {
        let mut controller = AnalogLevelController::new(0, 255, 100, 3);
        for _ in 0..100 {
            controller.update(-50.0, 100.0, true, true);
        }
        assert!(controller.level() > 100);
        assert!(controller.level() <= 255);
    }

    #[test]
    fn loud_speech_lowers_the_level() {
        let mut controller = AnalogLevelController::new(0, 255, 200, 3);
        for _ in 0..30 {
            controller.update(-5.0, 20000.0, true, true);
        }
        assert!(controller.level() < 200);
    }

    #[test]
    fn level_inside_window_holds() {
        let mut controller = AnalogLevelController::new(0, 255, 128, 3);
        for _ in 0..100 {
            controller.update(-18.0, 5000.0, true, true);
        }
        assert_eq!(controller.level(), 128);
    }

    #[test]
    fn saturation_drops_the_level_at_once() {
        let mut controller = AnalogLevelController::new(0, 255, 200, 3);
        controller.update(-3.0, 32767.0, false, true);
        assert_eq!(controller.level(), 190);
    }

    #[test]
    fn increases_can_be_blocked_and_range_is_respected() {
        let mut controller = AnalogLevelController::new(20, 120, 100, 3);
        for _ in 0..100 {
            controller.update(-60.0, 10.0, true, false);
        }
        assert_eq!(controller.level(), 100);
        for _ in 0..1000 {
            controller.update(-60.0, 10.0, true, true);
        }
        assert_eq!(controller.level(), 120);
        controller.set_level(5);
        assert_eq!(controller.level(), 20);
        assert_eq!(controller.level_gain_db(), 0.0);
    }

    #[test]
    fn non_speech_frames_are_ignored() {
        let mut controller = AnalogLevelController::new(0, 255, 128, 3);
        for _ in 0..100 {
            controller.update(-80.0, 10.0, false, true);
        }
        assert_eq!(controller.level(), 128);
    }
}
