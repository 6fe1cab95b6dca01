//! RMS level meter.
//!
//! Levels are reported as positive dB below full scale, clamped to
//! `0..=127`, where [`RmsLevel::MIN_LEVEL_DB`] means digital silence. Every
//! read resets the meter, so a caller polling once per interval gets the
//! level of that interval.

use clarion_common_audio::audio_util::{clamp_float_s16, float_to_float_s16};

const MAX_SQUARED_LEVEL: f32 = 32768.0 * 32768.0;
// 10^(-127 / 10)
const MIN_LEVEL: f32 = 1.995262314968883e-13;

/// Average and peak level of one measurement interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    /// RMS over all analyzed samples.
    pub average: i32,
    /// RMS of the loudest analyzed block.
    pub peak: i32,
}

fn compute_rms(mean_square: f32) -> i32 {
    if mean_square <= MIN_LEVEL * MAX_SQUARED_LEVEL {
        return RmsLevel::MIN_LEVEL_DB;
    }
    let rms = 10.0 * (mean_square / MAX_SQUARED_LEVEL).log10();
    // Rounded, and clamped against loud input exceeding full scale.
    ((-rms + 0.5) as i32).clamp(0, RmsLevel::MIN_LEVEL_DB)
}

/// Running RMS meter over blocks of a fixed size.
///
/// Changing the block size between calls starts a new interval.
#[derive(Debug, Clone, Default)]
pub struct RmsLevel {
    sum_square: f32,
    sample_count: usize,
    max_sum_square: f32,
    block_size: Option<usize>,
}

impl RmsLevel {
    /// Level of digital silence.
    pub const MIN_LEVEL_DB: i32 = 127;
    /// Reported instead of [`Self::MIN_LEVEL_DB`] when the signal is below
    /// the meter's range but not exactly zero.
    pub const INAUDIBLE_BUT_NOT_MUTED: i32 = 126;

    pub fn new() -> Self {
        Self::default()
    }

    /// Discards everything analyzed so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Analyzes one block of `i16` samples.
    pub fn analyze_i16(&mut self, data: &[i16]) {
        if data.is_empty() {
            return;
        }
        let sum_square = data.iter().map(|&x| f32::from(x) * f32::from(x)).sum();
        self.accumulate(data.len(), sum_square);
    }

    /// Analyzes one block of float samples in `[-1, 1]`. Values beyond full
    /// scale are clamped.
    pub fn analyze_f32(&mut self, data: &[f32]) {
        if data.is_empty() {
            return;
        }
        let sum_square = data
            .iter()
            .map(|&x| {
                let v = clamp_float_s16(float_to_float_s16(x));
                v * v
            })
            .sum();
        self.accumulate(data.len(), sum_square);
    }

    /// Analyzes a block of float S16 samples.
    pub(crate) fn analyze_float_s16(&mut self, data: &[f32]) {
        if data.is_empty() {
            return;
        }
        let sum_square = data
            .iter()
            .map(|&x| {
                let v = clamp_float_s16(x);
                v * v
            })
            .sum();
        self.accumulate(data.len(), sum_square);
    }

    /// Counts `len` samples of digital silence.
    pub fn analyze_muted(&mut self, len: usize) {
        self.check_block_size(len);
        self.sample_count += len;
    }

    /// Average level since the last read, then resets.
    pub fn average(&mut self) -> i32 {
        let have_samples = self.sample_count != 0;
        let mut rms = if have_samples {
            compute_rms(self.sum_square / self.sample_count as f32)
        } else {
            Self::MIN_LEVEL_DB
        };
        // MIN_LEVEL_DB is reserved for true silence.
        if have_samples && rms == Self::MIN_LEVEL_DB && self.sum_square != 0.0 {
            rms = Self::INAUDIBLE_BUT_NOT_MUTED;
        }
        self.reset();
        rms
    }

    /// Average and peak level since the last read, then resets.
    pub fn average_and_peak(&mut self) -> Levels {
        let levels = match self.block_size {
            Some(block_size) if self.sample_count != 0 => Levels {
                average: compute_rms(self.sum_square / self.sample_count as f32),
                peak: compute_rms(self.max_sum_square / block_size as f32),
            },
            _ => Levels {
                average: Self::MIN_LEVEL_DB,
                peak: Self::MIN_LEVEL_DB,
            },
        };
        self.reset();
        levels
    }

    fn accumulate(&mut self, len: usize, sum_square: f32) {
        self.check_block_size(len);
        self.sum_square += sum_square;
        self.sample_count += len;
        self.max_sum_square = self.max_sum_square.max(sum_square);
    }

    fn check_block_size(&mut self, block_size: usize) {
        if self.block_size != Some(block_size) {
            self.reset();
            self.block_size = Some(block_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn square_wave(amplitude: i16, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| if (i / 8) % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    fn sine(amplitude: f32, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| (amplitude * (i as f32 * 0.05).sin()) as i16)
            .collect()
    }

    #[test]
    fn full_scale_square_wave_is_at_full_scale() {
        let mut meter = RmsLevel::new();
        let frame = square_wave(i16::MAX, 160);
        for _ in 0..10 {
            meter.analyze_i16(&frame);
        }
        assert_eq!(meter.average_and_peak(), Levels { average: 0, peak: 0 });
    }

    #[test]
    fn half_scale_square_wave_is_six_db_down() {
        let mut meter = RmsLevel::new();
        meter.analyze_i16(&square_wave(16384, 480));
        assert_eq!(meter.average(), 6);
    }

    #[test]
    fn float_input_matches_integer_input() {
        let ints = sine(10000.0, 480);
        let floats: Vec<f32> = ints.iter().map(|&x| f32::from(x) / 32768.0).collect();
        let mut a = RmsLevel::new();
        let mut b = RmsLevel::new();
        a.analyze_i16(&ints);
        b.analyze_f32(&floats);
        assert_eq!(a.average(), b.average());
    }

    #[test]
    fn reading_resets() {
        let mut meter = RmsLevel::new();
        meter.analyze_i16(&square_wave(1000, 160));
        assert!(meter.average() < RmsLevel::MIN_LEVEL_DB);
        assert_eq!(meter.average(), RmsLevel::MIN_LEVEL_DB);
        assert_eq!(
            meter.average_and_peak(),
            Levels {
                average: RmsLevel::MIN_LEVEL_DB,
                peak: RmsLevel::MIN_LEVEL_DB
            }
        );
    }

    #[test]
    fn silence_and_near_silence_are_distinguished() {
        let mut meter = RmsLevel::new();
        meter.analyze_i16(&[0; 160]);
        assert_eq!(meter.average(), RmsLevel::MIN_LEVEL_DB);

        // A single LSB in a long run of muted blocks is far below -127 dBFS.
        meter.analyze_i16(&{
            let mut block = [0i16; 160];
            block[0] = 1;
            block
        });
        for _ in 0..100_000 {
            meter.analyze_muted(160);
        }
        assert_eq!(meter.average(), RmsLevel::INAUDIBLE_BUT_NOT_MUTED);
    }

    #[test]
    fn peak_tracks_the_loudest_block() {
        let mut meter = RmsLevel::new();
        meter.analyze_i16(&square_wave(16384, 160));
        meter.analyze_muted(160);
        meter.analyze_muted(160);
        meter.analyze_muted(160);
        let levels = meter.average_and_peak();
        assert_eq!(levels.peak, 6);
        // A quarter of the energy: another 6 dB down.
        assert_eq!(levels.average, 12);
    }

    #[test]
    fn block_size_change_starts_a_new_interval() {
        let mut meter = RmsLevel::new();
        meter.analyze_i16(&square_wave(i16::MAX, 160));
        meter.analyze_i16(&square_wave(1024, 320));
        assert_eq!(meter.average(), 30);
    }

    #[proptest]
    fn levels_stay_in_range(
        #[strategy(proptest::collection::vec(any::<i16>(), 1..512))] data: Vec<i16>,
    ) {
        let mut meter = RmsLevel::new();
        meter.analyze_i16(&data);
        let levels = meter.average_and_peak();
        prop_assert!((0..=RmsLevel::MIN_LEVEL_DB).contains(&levels.average));
        prop_assert!(levels.peak <= levels.average, "{levels:?}");
    }
}
