//! Gain controller 1 settings.

/// Level adaptation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgcMode {
    /// Recommend an analog level to the caller.
    #[default]
    AdaptiveAnalog,
    /// Adapt a virtual level applied as digital pre-gain.
    AdaptiveDigital,
    /// Compressor only.
    FixedDigital,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Agc1Config {
    pub mode: AgcMode,
    /// Target peak level in dB below full scale, `0..=31`.
    pub target_level_dbfs: i32,
    /// Maximum gain applied to quiet input, `0..=90`.
    pub compression_gain_db: i32,
    pub enable_limiter: bool,
    pub analog_level_minimum: i32,
    pub analog_level_maximum: i32,
}

impl Default for Agc1Config {
    fn default() -> Self {
        Self {
            mode: AgcMode::AdaptiveAnalog,
            target_level_dbfs: 3,
            compression_gain_db: 9,
            enable_limiter: true,
            analog_level_minimum: 0,
            analog_level_maximum: 255,
        }
    }
}

impl Agc1Config {
    pub const MAX_TARGET_LEVEL_DBFS: i32 = 31;
    pub const MAX_COMPRESSION_GAIN_DB: i32 = 90;
    pub const MAX_ANALOG_LEVEL: i32 = 255;

    /// True when every field is inside its documented range.
    pub fn is_valid(&self) -> bool {
        (0..=Self::MAX_TARGET_LEVEL_DBFS).contains(&self.target_level_dbfs)
            && (0..=Self::MAX_COMPRESSION_GAIN_DB).contains(&self.compression_gain_db)
            && (0..=Self::MAX_ANALOG_LEVEL).contains(&self.analog_level_minimum)
            && (0..=Self::MAX_ANALOG_LEVEL).contains(&self.analog_level_maximum)
            && self.analog_level_minimum < self.analog_level_maximum
    }

    /// Clamps every field into range. Returns true if anything changed.
    pub fn validate(&mut self) -> bool {
        let before = *self;
        self.target_level_dbfs = self.target_level_dbfs.clamp(0, Self::MAX_TARGET_LEVEL_DBFS);
        self.compression_gain_db = self
            .compression_gain_db
            .clamp(0, Self::MAX_COMPRESSION_GAIN_DB);
        self.analog_level_minimum = self.analog_level_minimum.clamp(0, Self::MAX_ANALOG_LEVEL - 1);
        self.analog_level_maximum = self
            .analog_level_maximum
            .clamp(self.analog_level_minimum + 1, Self::MAX_ANALOG_LEVEL);
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let mut config = Agc1Config::default();
        assert!(config.is_valid());
        assert!(!config.validate());
    }

    #[test]
    fn validate_clamps_out_of_range_fields() {
        let mut config = Agc1Config {
            target_level_dbfs: 40,
            compression_gain_db: -1,
            analog_level_minimum: 300,
            analog_level_maximum: 10,
            ..Agc1Config::default()
        };
        assert!(!config.is_valid());
        assert!(config.validate());
        assert_eq!(config.target_level_dbfs, 31);
        assert_eq!(config.compression_gain_db, 0);
        assert_eq!(config.analog_level_minimum, 254);
        assert_eq!(config.analog_level_maximum, 255);
        assert!(config.is_valid());
    }
}
