//! AGC2 constants and level conversions.

use clarion_common_audio::channel_buffer::ChannelBuffer;

/// Minimum value of a float-encoded S16 sample (`-32768.0`).
pub const MIN_FLOAT_S16_VALUE: f32 = -32768.0;
/// Maximum value of a float-encoded S16 sample (`32767.0`).
pub const MAX_FLOAT_S16_VALUE: f32 = 32767.0;
/// Absolute maximum magnitude of a float-encoded S16 sample (`32768.0`).
pub const MAX_ABS_FLOAT_S16_VALUE: f32 = 32768.0;

/// Minimum audio level in dBFS scale for S16 samples (`20 * log10(1/32768)`).
pub const MIN_LEVEL_DBFS: f32 = -90.309;

/// Duration of one audio frame in milliseconds.
pub const FRAME_DURATION_MS: usize = 10;
/// Number of sub-frames per frame for the limiter envelope.
pub const SUB_FRAMES_IN_FRAME: usize = 20;

/// Limiter envelope above which the adaptive gain is reduced.
pub const LIMITER_THRESHOLD_FOR_AGC_GAIN_DBFS: f32 = -1.0;

/// Speech probability threshold to detect speech activity.
pub const VAD_CONFIDENCE_THRESHOLD: f32 = 0.95;

/// Minimum number of adjacent speech frames having a sufficiently high speech
/// probability to reliably detect speech activity.
pub const ADJACENT_SPEECH_FRAMES_THRESHOLD: usize = 12;

/// Milliseconds of speech to observe before the level estimate is
/// confident.
pub const LEVEL_ESTIMATOR_TIME_TO_CONFIDENCE_MS: usize = 400;
/// Exponential decay factor for the speech level estimator.
pub const LEVEL_ESTIMATOR_LEAK_FACTOR: f32 =
    1.0 - 1.0 / LEVEL_ESTIMATOR_TIME_TO_CONFIDENCE_MS as f32;

/// Initial headroom in dB for the saturation protector.
pub const SATURATION_PROTECTOR_INITIAL_HEADROOM_DB: f32 = 20.0;
/// Number of delayed peak slots in the saturation protector.
pub const SATURATION_PROTECTOR_BUFFER_SIZE: usize = 4;

/// Maximum input level in dBFS for the limiter.
pub const LIMITER_MAX_INPUT_LEVEL_DB_FS: f64 = 1.0;
/// Smoothness of the limiter knee transition in dB.
pub const LIMITER_KNEE_SMOOTHNESS_DB: f64 = 1.0;
/// Compression ratio applied above the limiter knee.
pub const LIMITER_COMPRESSION_RATIO: f64 = 5.0;

/// Converts a dB value to a linear ratio: `10^(v/20)`.
pub fn db_to_ratio(v: f32) -> f32 {
    10.0_f32.powf(v / 20.0)
}

/// Converts a dBFS value to a float S16 linear value.
pub fn dbfs_to_float_s16(v: f32) -> f32 {
    db_to_ratio(v) * MAX_ABS_FLOAT_S16_VALUE
}

/// Converts a float S16 linear value to dBFS.
pub fn float_s16_to_dbfs(v: f32) -> f32 {
    debug_assert!(v >= 0.0);
    if v <= 1.0 {
        return MIN_LEVEL_DBFS;
    }
    20.0 * v.log10() + MIN_LEVEL_DBFS
}

/// Converts a dBFS value to a float S16 linear value (f64 version).
pub fn dbfs_to_float_s16_f64(v: f64) -> f64 {
    10.0_f64.powf(v / 20.0) * MAX_ABS_FLOAT_S16_VALUE as f64
}

/// Converts a float S16 linear value to dBFS (f64 version).
pub fn float_s16_to_dbfs_f64(v: f64) -> f64 {
    debug_assert!(v >= 0.0);
    const MIN_DBFS: f64 = -90.308_998_699_194_36;
    if v <= 1.0 {
        return MIN_DBFS;
    }
    20.0 * v.log10() + MIN_DBFS
}

/// Peak and RMS level of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioLevels {
    pub peak_dbfs: f32,
    pub rms_dbfs: f32,
}

/// Peak over all channels; RMS of the loudest channel.
pub fn compute_audio_levels(audio: &ChannelBuffer<f32>) -> AudioLevels {
    let mut peak = 0.0f32;
    let mut rms = 0.0f32;
    let frames = audio.num_frames().max(1) as f32;
    for channel in audio.channels() {
        let mut energy = 0.0f32;
        for &x in channel {
            peak = peak.max(x.abs());
            energy += x * x;
        }
        rms = rms.max((energy / frames).sqrt());
    }
    AudioLevels {
        peak_dbfs: float_s16_to_dbfs(peak),
        rms_dbfs: float_s16_to_dbfs(rms),
    }
}
