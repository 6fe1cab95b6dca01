//! Static compressor curve.
//!
//! Quiet input receives the full compression gain. Above the knee the
//! output rises at a 3:1 ratio so that a full-scale input lands on the
//! target level. The transition is a quadratic soft knee.

use clarion_common_audio::audio_util::db_to_linear;

const COMPRESSION_RATIO: f32 = 3.0;
const KNEE_WIDTH_DB: f32 = 6.0;
/// Table covers input levels from 0 down to this many dB below full scale.
const TABLE_RANGE_DB: usize = 96;
const FULL_SCALE: f32 = 32768.0;

/// Tabulated gain, in dB, for each whole dB of peak input level.
#[derive(derive_more::Debug, Clone, PartialEq)]
pub struct GainCurve {
    target_level_dbfs: f32,
    compression_gain_db: f32,
    limiter: bool,
    #[debug(skip)]
    table_db: Vec<f32>,
}

impl GainCurve {
    /// `target_level_dbfs` is positive: 3 means -3 dBFS.
    pub fn new(target_level_dbfs: i32, compression_gain_db: i32, limiter: bool) -> Self {
        let target = -(target_level_dbfs as f32);
        let gain = compression_gain_db as f32;
        let knee = 1.5 * (target - gain);
        let table_db = (0..=TABLE_RANGE_DB)
            .map(|below| static_gain_db(-(below as f32), target, gain, knee))
            .collect();
        Self {
            target_level_dbfs: target,
            compression_gain_db: gain,
            limiter,
            table_db,
        }
    }

    /// Input level where compression starts, dBFS.
    pub fn knee_dbfs(&self) -> f32 {
        1.5 * (self.target_level_dbfs - self.compression_gain_db)
    }

    /// Output ceiling when the limiter is on, dBFS.
    pub fn limit_dbfs(&self) -> Option<f32> {
        self.limiter.then_some(self.target_level_dbfs)
    }

    /// Gain for a peak input level in dBFS, linearly interpolated.
    pub fn gain_db(&self, input_dbfs: f32) -> f32 {
        let below = (-input_dbfs).clamp(0.0, TABLE_RANGE_DB as f32);
        let index = below.floor() as usize;
        let frac = below - index as f32;
        let lo = self.table_db[index];
        let hi = self.table_db[(index + 1).min(TABLE_RANGE_DB)];
        lo + frac * (hi - lo)
    }

    /// Linear gain for a float S16 peak envelope, limiter applied.
    pub(crate) fn gain_for_envelope(&self, envelope: f32) -> f32 {
        let level_dbfs = if envelope > 0.0 {
            20.0 * (envelope / FULL_SCALE).log10()
        } else {
            -(TABLE_RANGE_DB as f32)
        };
        let mut gain = db_to_linear(self.gain_db(level_dbfs));
        if self.limiter && envelope > 0.0 {
            let ceiling = db_to_linear(self.target_level_dbfs) * FULL_SCALE;
            gain = gain.min(ceiling / envelope);
        }
        gain
    }
}

fn static_gain_db(x: f32, target: f32, gain: f32, knee: f32) -> f32 {
    let half = KNEE_WIDTH_DB / 2.0;
    let slope = 1.0 / COMPRESSION_RATIO - 1.0;
    if x <= knee - half {
        gain
    } else if x >= knee + half {
        // Output follows target + x / ratio.
        target + x / COMPRESSION_RATIO - x
    } else {
        let d = x - knee + half;
        gain + slope * d * d / (2.0 * KNEE_WIDTH_DB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_input_receives_full_gain() {
        let curve = GainCurve::new(3, 9, false);
        assert!((curve.gain_db(-60.0) - 9.0).abs() < 1e-4);
        assert!((curve.knee_dbfs() + 18.0).abs() < 1e-4);
    }

    #[test]
    fn full_scale_maps_to_target() {
        let curve = GainCurve::new(3, 9, false);
        assert!((curve.gain_db(0.0) + 3.0).abs() < 1e-4);
        let curve = GainCurve::new(10, 20, true);
        assert!((curve.gain_db(0.0) + 10.0).abs() < 1e-4);
        assert_eq!(curve.limit_dbfs(), Some(-10.0));
    }

    #[test]
    fn output_level_never_decreases_with_input() {
        let curve = GainCurve::new(3, 9, false);
        let mut last = f32::MIN;
        for tenth in 0..=900 {
            let x = -90.0 + tenth as f32 * 0.1;
            let y = x + curve.gain_db(x);
            assert!(y >= last - 1e-3, "output fell at {x}: {y} < {last}");
            last = y;
        }
    }

    #[test]
    fn zero_gain_is_identity_below_knee() {
        let curve = GainCurve::new(0, 0, false);
        assert!(curve.gain_db(-40.0).abs() < 1e-4);
    }

    #[test]
    fn limiter_caps_envelope_times_gain() {
        let curve = GainCurve::new(6, 30, true);
        let envelope = 20000.0;
        let g = curve.gain_for_envelope(envelope);
        let ceiling = db_to_linear(-6.0) * FULL_SCALE;
        assert!(envelope * g <= ceiling * 1.0001);
        assert!(curve.gain_for_envelope(0.0) > 1.0);
    }
}
