//! Analytic limiter gain curve.
//!
//! Identity below the knee, a quadratic knee of width
//! [`LIMITER_KNEE_SMOOTHNESS_DB`], then a 5:1 compressor that maps the
//! maximum input level to 0 dBFS. Input beyond the maximum is hard
//! limited to full scale.

use crate::common::{
    LIMITER_COMPRESSION_RATIO, LIMITER_KNEE_SMOOTHNESS_DB, LIMITER_MAX_INPUT_LEVEL_DB_FS,
    MAX_ABS_FLOAT_S16_VALUE, dbfs_to_float_s16_f64, float_s16_to_dbfs_f64,
};

/// Which part of the curve an input level falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainCurveRegion {
    Identity,
    Knee,
    Limiter,
    Saturation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimiterDbGainCurve {
    max_input_level_linear: f64,
    knee_start_dbfs: f64,
    knee_start_linear: f64,
    limiter_start_dbfs: f64,
    limiter_start_linear: f64,
    knee_region_polynomial: [f64; 3],
}

impl Default for LimiterDbGainCurve {
    fn default() -> Self {
        Self::new()
    }
}

impl LimiterDbGainCurve {
    pub fn new() -> Self {
        let ratio = LIMITER_COMPRESSION_RATIO;
        let smooth = LIMITER_KNEE_SMOOTHNESS_DB;
        let knee_start_dbfs = -smooth / 2.0 - LIMITER_MAX_INPUT_LEVEL_DB_FS / (ratio - 1.0);
        let a = (1.0 - ratio) / (2.0 * smooth * ratio);
        let b = 1.0 - 2.0 * a * knee_start_dbfs;
        let c = a * knee_start_dbfs * knee_start_dbfs;
        let limiter_start_dbfs = knee_start_dbfs + smooth;
        Self {
            max_input_level_linear: dbfs_to_float_s16_f64(LIMITER_MAX_INPUT_LEVEL_DB_FS),
            knee_start_dbfs,
            knee_start_linear: dbfs_to_float_s16_f64(knee_start_dbfs),
            limiter_start_dbfs,
            limiter_start_linear: dbfs_to_float_s16_f64(limiter_start_dbfs),
            knee_region_polynomial: [a, b, c],
        }
    }

    pub fn knee_start_dbfs(&self) -> f64 {
        self.knee_start_dbfs
    }

    pub fn limiter_start_dbfs(&self) -> f64 {
        self.limiter_start_dbfs
    }

    pub fn max_input_level_linear(&self) -> f64 {
        self.max_input_level_linear
    }

    pub fn region(&self, input_level_linear: f64) -> GainCurveRegion {
        if input_level_linear < self.knee_start_linear {
            GainCurveRegion::Identity
        } else if input_level_linear < self.limiter_start_linear {
            GainCurveRegion::Knee
        } else if input_level_linear < self.max_input_level_linear {
            GainCurveRegion::Limiter
        } else {
            GainCurveRegion::Saturation
        }
    }

    pub fn output_level_dbfs(&self, input_level_dbfs: f64) -> f64 {
        if input_level_dbfs < self.knee_start_dbfs {
            input_level_dbfs
        } else if input_level_dbfs < self.limiter_start_dbfs {
            let [a, b, c] = self.knee_region_polynomial;
            a * input_level_dbfs * input_level_dbfs + b * input_level_dbfs + c
        } else {
            (input_level_dbfs - LIMITER_MAX_INPUT_LEVEL_DB_FS) / LIMITER_COMPRESSION_RATIO
        }
    }

    /// Linear gain for a float S16 envelope level.
    pub fn gain_linear(&self, input_level_linear: f64) -> f64 {
        if input_level_linear < self.knee_start_linear {
            return 1.0;
        }
        if input_level_linear >= self.max_input_level_linear {
            return f64::from(MAX_ABS_FLOAT_S16_VALUE) / input_level_linear;
        }
        dbfs_to_float_s16_f64(self.output_level_dbfs(float_s16_to_dbfs_f64(input_level_linear)))
            / input_level_linear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knee_points() {
        let curve = LimiterDbGainCurve::new();
        assert!((curve.knee_start_dbfs() + 0.75).abs() < 1e-9);
        assert!((curve.limiter_start_dbfs() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn curve_is_continuous() {
        let curve = LimiterDbGainCurve::new();
        for x in [curve.knee_start_dbfs(), curve.limiter_start_dbfs()] {
            let below = curve.output_level_dbfs(x - 1e-6);
            let above = curve.output_level_dbfs(x + 1e-6);
            assert!((below - above).abs() < 1e-4, "jump at {x}: {below} vs {above}");
        }
        assert!(curve.output_level_dbfs(LIMITER_MAX_INPUT_LEVEL_DB_FS).abs() < 1e-9);
    }

    #[test]
    fn output_never_exceeds_full_scale() {
        let curve = LimiterDbGainCurve::new();
        let mut x = 1.0;
        while x < 200_000.0 {
            let y = x * curve.gain_linear(x);
            assert!(y <= f64::from(MAX_ABS_FLOAT_S16_VALUE) + 1e-6, "{x} -> {y}");
            assert!(curve.gain_linear(x) <= 1.0);
            x *= 1.05;
        }
    }

    #[test]
    fn regions_are_ordered() {
        let curve = LimiterDbGainCurve::new();
        assert_eq!(curve.region(1000.0), GainCurveRegion::Identity);
        assert_eq!(curve.region(dbfs_to_float_s16_f64(-0.5)), GainCurveRegion::Knee);
        assert_eq!(curve.region(dbfs_to_float_s16_f64(0.5)), GainCurveRegion::Limiter);
        assert_eq!(curve.region(40000.0), GainCurveRegion::Saturation);
    }
}
