//! Energy-based speech activity for the gain loops.
//!
//! Compares a short-term level against running long-term statistics and
//! reports a smoothed standardized ratio. Stationary input settles near
//! zero; onsets well above the long-term mean push it positive.

/// Frames over which the long-term statistics are averaged.
const LONG_TERM_FRAMES: f32 = 250.0;
const SHORT_TERM_SMOOTHING: f32 = 0.5;
const RATIO_SMOOTHING: f32 = 0.7;
const MIN_STD_DB: f32 = 1.0;
const MAX_LOG_RATIO: f32 = 2.0;
/// Ratio above which a frame counts as speech.
const SPEECH_THRESHOLD: f32 = 0.5;
/// Frames of input quieter than this are never speech, dBFS.
const MIN_SPEECH_LEVEL_DBFS: f32 = -70.0;

#[derive(Debug, Clone)]
pub(crate) struct ActivityDetector {
    counter: f32,
    mean_long_term: f32,
    mean_square_long_term: f32,
    mean_short_term: f32,
    log_ratio: f32,
    last_level_dbfs: f32,
}

impl Default for ActivityDetector {
    fn default() -> Self {
        Self {
            counter: 0.0,
            mean_long_term: 0.0,
            mean_square_long_term: 0.0,
            mean_short_term: -90.0,
            log_ratio: 0.0,
            last_level_dbfs: -90.0,
        }
    }
}

impl ActivityDetector {
    /// Updates with a frame's mean-square level in dBFS.
    pub(crate) fn update(&mut self, level_dbfs: f32) {
        self.last_level_dbfs = level_dbfs;
        self.mean_short_term += SHORT_TERM_SMOOTHING * (level_dbfs - self.mean_short_term);

        if self.counter == 0.0 {
            self.mean_long_term = level_dbfs;
            self.mean_square_long_term = level_dbfs * level_dbfs;
            self.mean_short_term = level_dbfs;
        } else {
            let n = self.counter.min(LONG_TERM_FRAMES);
            self.mean_long_term = (self.mean_long_term * n + level_dbfs) / (n + 1.0);
            self.mean_square_long_term =
                (self.mean_square_long_term * n + level_dbfs * level_dbfs) / (n + 1.0);
        }
        self.counter += 1.0;

        let variance = (self.mean_square_long_term - self.mean_long_term * self.mean_long_term).max(0.0);
        let std = variance.sqrt().max(MIN_STD_DB);
        let ratio = (self.mean_short_term - self.mean_long_term) / std;
        self.log_ratio = (RATIO_SMOOTHING * self.log_ratio + (1.0 - RATIO_SMOOTHING) * ratio)
            .clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO);
    }

    pub(crate) fn log_ratio(&self) -> f32 {
        self.log_ratio
    }

    pub(crate) fn is_speech(&self) -> bool {
        self.log_ratio > SPEECH_THRESHOLD && self.last_level_dbfs > MIN_SPEECH_LEVEL_DBFS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_level_is_not_speech() {
        let mut detector = ActivityDetector::default();
        for _ in 0..300 {
            detector.update(-50.0);
        }
        assert!(detector.log_ratio().abs() < 0.1);
        assert!(!detector.is_speech());
    }

    #[test]
    fn onset_above_background_is_speech() {
        let mut detector = ActivityDetector::default();
        for i in 0..300 {
            // Background with a little jitter.
            detector.update(-55.0 + (i % 3) as f32);
        }
        for _ in 0..5 {
            detector.update(-25.0);
        }
        assert!(detector.is_speech(), "ratio {}", detector.log_ratio());
    }

    #[test]
    fn digital_silence_is_never_speech() {
        let mut detector = ActivityDetector::default();
        for _ in 0..50 {
            detector.update(-120.0);
        }
        detector.update(-90.0);
        detector.update(-90.0);
        assert!(!detector.is_speech());
    }
}
