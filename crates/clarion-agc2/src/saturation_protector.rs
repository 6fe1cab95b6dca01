//! Saturation protector.
//!
//! Estimates the headroom needed between the speech level and full scale
//! by comparing the speech level against speech peaks delayed by
//! [`SATURATION_PROTECTOR_BUFFER_SIZE`] super-frames of 400 ms.

use std::collections::VecDeque;

use crate::common::{
    ADJACENT_SPEECH_FRAMES_THRESHOLD, FRAME_DURATION_MS, MIN_LEVEL_DBFS,
    SATURATION_PROTECTOR_BUFFER_SIZE, SATURATION_PROTECTOR_INITIAL_HEADROOM_DB,
    VAD_CONFIDENCE_THRESHOLD,
};

const PEAK_ENVELOPER_SUPER_FRAME_LENGTH_MS: usize = 400;
const MIN_MARGIN_DB: f32 = 12.0;
const MAX_MARGIN_DB: f32 = 25.0;
const ATTACK: f32 = 0.998_849_4;
const DECAY: f32 = 0.999_769_8;

#[derive(Debug, Clone, PartialEq)]
struct SaturationProtectorState {
    headroom_db: f32,
    peak_delay_buffer: VecDeque<f32>,
    max_peaks_dbfs: f32,
    time_since_push_ms: usize,
}

impl SaturationProtectorState {
    fn new(initial_headroom_db: f32) -> Self {
        Self {
            headroom_db: initial_headroom_db,
            peak_delay_buffer: VecDeque::with_capacity(SATURATION_PROTECTOR_BUFFER_SIZE + 1),
            max_peaks_dbfs: MIN_LEVEL_DBFS,
            time_since_push_ms: 0,
        }
    }

    fn update(&mut self, peak_dbfs: f32, speech_level_dbfs: f32) {
        self.max_peaks_dbfs = self.max_peaks_dbfs.max(peak_dbfs);
        self.time_since_push_ms += FRAME_DURATION_MS;
        if self.time_since_push_ms > PEAK_ENVELOPER_SUPER_FRAME_LENGTH_MS {
            self.peak_delay_buffer.push_back(self.max_peaks_dbfs);
            if self.peak_delay_buffer.len() > SATURATION_PROTECTOR_BUFFER_SIZE {
                self.peak_delay_buffer.pop_front();
            }
            self.max_peaks_dbfs = MIN_LEVEL_DBFS;
            self.time_since_push_ms = 0;
        }

        let delayed_peak_dbfs = self
            .peak_delay_buffer
            .front()
            .copied()
            .unwrap_or(self.max_peaks_dbfs);
        let difference_db = delayed_peak_dbfs - speech_level_dbfs;
        let smoothing = if difference_db > self.headroom_db {
            ATTACK
        } else {
            DECAY
        };
        self.headroom_db = (self.headroom_db * smoothing + difference_db * (1.0 - smoothing))
            .clamp(MIN_MARGIN_DB, MAX_MARGIN_DB);
    }
}

#[derive(Debug, Clone)]
pub struct SaturationProtector {
    initial_headroom_db: f32,
    preliminary_state: SaturationProtectorState,
    reliable_state: SaturationProtectorState,
    headroom_db: f32,
    num_adjacent_speech_frames: usize,
}

impl Default for SaturationProtector {
    fn default() -> Self {
        Self::new(SATURATION_PROTECTOR_INITIAL_HEADROOM_DB)
    }
}

impl SaturationProtector {
    pub fn new(initial_headroom_db: f32) -> Self {
        let state = SaturationProtectorState::new(initial_headroom_db);
        Self {
            initial_headroom_db,
            preliminary_state: state.clone(),
            reliable_state: state,
            headroom_db: initial_headroom_db,
            num_adjacent_speech_frames: 0,
        }
    }

    pub fn headroom_db(&self) -> f32 {
        self.headroom_db
    }

    pub fn analyze(&mut self, speech_probability: f32, peak_dbfs: f32, speech_level_dbfs: f32) {
        if speech_probability < VAD_CONFIDENCE_THRESHOLD {
            if self.num_adjacent_speech_frames >= ADJACENT_SPEECH_FRAMES_THRESHOLD {
                self.reliable_state.clone_from(&self.preliminary_state);
            } else if self.num_adjacent_speech_frames > 0 {
                self.preliminary_state.clone_from(&self.reliable_state);
            }
            self.num_adjacent_speech_frames = 0;
        } else {
            self.num_adjacent_speech_frames += 1;
            self.preliminary_state.update(peak_dbfs, speech_level_dbfs);
            if self.num_adjacent_speech_frames >= ADJACENT_SPEECH_FRAMES_THRESHOLD {
                self.headroom_db = self.preliminary_state.headroom_db;
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.initial_headroom_db);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_headroom() {
        assert_eq!(SaturationProtector::default().headroom_db(), 20.0);
    }

    #[test]
    fn headroom_stays_within_margins() {
        let mut protector = SaturationProtector::default();
        for _ in 0..20_000 {
            protector.analyze(1.0, 0.0, -60.0);
        }
        assert_eq!(protector.headroom_db(), MAX_MARGIN_DB);
        for _ in 0..40_000 {
            protector.analyze(1.0, -30.0, -30.0);
        }
        assert_eq!(protector.headroom_db(), MIN_MARGIN_DB);
    }

    #[test]
    fn crest_factor_is_tracked() {
        let mut protector = SaturationProtector::default();
        for _ in 0..30_000 {
            protector.analyze(1.0, -10.0, -25.0);
        }
        assert!((protector.headroom_db() - 15.0).abs() < 0.5, "{}", protector.headroom_db());
    }

    #[test]
    fn short_speech_bursts_leave_headroom_unchanged() {
        let mut protector = SaturationProtector::default();
        for _ in 0..100 {
            for _ in 0..ADJACENT_SPEECH_FRAMES_THRESHOLD - 1 {
                protector.analyze(1.0, 0.0, -60.0);
            }
            protector.analyze(0.0, 0.0, -60.0);
        }
        assert_eq!(protector.headroom_db(), 20.0);
    }
}
