//! Gain controller 2 settings.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDigitalConfig {
    /// Gain applied before the limiter, `0.0..50.0` dB.
    pub gain_db: f32,
}

impl Default for FixedDigitalConfig {
    fn default() -> Self {
        Self { gain_db: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveDigitalConfig {
    pub enabled: bool,
    /// Margin kept between the estimated speech peaks and full scale.
    pub headroom_db: f32,
    pub max_gain_db: f32,
    pub initial_gain_db: f32,
    pub max_gain_change_db_per_second: f32,
    /// The gain never lifts the noise floor above this level.
    pub max_output_noise_level_dbfs: f32,
}

impl Default for AdaptiveDigitalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            headroom_db: 5.0,
            max_gain_db: 50.0,
            initial_gain_db: 15.0,
            max_gain_change_db_per_second: 6.0,
            max_output_noise_level_dbfs: -50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Agc2Config {
    pub fixed_digital: FixedDigitalConfig,
    pub adaptive_digital: AdaptiveDigitalConfig,
}

impl Agc2Config {
    pub const MAX_FIXED_GAIN_DB: f32 = 50.0;

    pub fn is_valid(&self) -> bool {
        let a = &self.adaptive_digital;
        (0.0..Self::MAX_FIXED_GAIN_DB).contains(&self.fixed_digital.gain_db)
            && a.headroom_db >= 0.0
            && a.max_gain_db > 0.0
            && a.initial_gain_db >= 0.0
            && a.max_gain_change_db_per_second > 0.0
            && a.max_output_noise_level_dbfs <= 0.0
    }

    /// Clamps every field into range. Returns true if anything changed.
    pub fn validate(&mut self) -> bool {
        let before = *self;
        let fixed = &mut self.fixed_digital.gain_db;
        if !fixed.is_finite() || *fixed < 0.0 {
            *fixed = 0.0;
        }
        *fixed = fixed.min(Self::MAX_FIXED_GAIN_DB - 0.01);

        let a = &mut self.adaptive_digital;
        a.headroom_db = a.headroom_db.max(0.0);
        if a.max_gain_db <= 0.0 {
            a.max_gain_db = AdaptiveDigitalConfig::default().max_gain_db;
        }
        a.initial_gain_db = a.initial_gain_db.clamp(0.0, a.max_gain_db);
        if a.max_gain_change_db_per_second <= 0.0 {
            a.max_gain_change_db_per_second =
                AdaptiveDigitalConfig::default().max_gain_change_db_per_second;
        }
        a.max_output_noise_level_dbfs = a.max_output_noise_level_dbfs.min(0.0);
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let mut config = Agc2Config::default();
        assert!(config.is_valid());
        assert!(!config.validate());
    }

    #[test]
    fn invalid_values_are_clamped() {
        let mut config = Agc2Config::default();
        config.fixed_digital.gain_db = 80.0;
        config.adaptive_digital.max_gain_change_db_per_second = 0.0;
        config.adaptive_digital.max_output_noise_level_dbfs = 3.0;
        assert!(!config.is_valid());
        assert!(config.validate());
        assert!(config.is_valid());
        assert_eq!(config.adaptive_digital.max_output_noise_level_dbfs, 0.0);
        assert_eq!(config.adaptive_digital.max_gain_change_db_per_second, 6.0);
    }
}
