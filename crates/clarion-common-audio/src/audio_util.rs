//! Sample format conversion and channel layout helpers.
//!
//! Three sample representations are in use:
//! - `i16`: the integer wire format.
//! - float in `[-1, 1]`: the planar float API format.
//! - "float S16": floats scaled to the `i16` range, used internally by the
//!   DSP stages so that thresholds read the same in either API.

const S16_SCALE: f32 = 32768.0;

/// Converts an `i16` sample to a float in `[-1, 1)`.
#[inline]
pub fn s16_to_float(v: i16) -> f32 {
    f32::from(v) / S16_SCALE
}

/// Converts a float in `[-1, 1]` to `i16` with rounding and saturation.
#[inline]
pub fn float_to_s16(v: f32) -> i16 {
    float_s16_to_s16(v * S16_SCALE)
}

/// Rounds and saturates an int16-scaled float.
#[inline]
pub fn float_s16_to_s16(v: f32) -> i16 {
    let v = v.clamp(-32768.0, 32767.0);
    (v + if v > 0.0 { 0.5 } else { -0.5 }) as i16
}

#[inline]
pub fn float_to_float_s16(v: f32) -> f32 {
    v * S16_SCALE
}

#[inline]
pub fn float_s16_to_float(v: f32) -> f32 {
    v / S16_SCALE
}

/// Clamps an int16-scaled float to the representable `i16` range.
#[inline]
pub fn clamp_float_s16(v: f32) -> f32 {
    v.clamp(-32768.0, 32767.0)
}

pub fn s16_to_float_slice(src: &[i16], dest: &mut [f32]) {
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = s16_to_float(s);
    }
}

pub fn float_to_s16_slice(src: &[f32], dest: &mut [i16]) {
    for (d, &s) in dest.iter_mut().zip(src) {
        *d = float_to_s16(s);
    }
}

/// Converts `dB` to a linear amplitude factor.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Converts a linear amplitude factor to `dB`.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-10).log10()
}

/// Splits an interleaved buffer into one slice per channel.
pub fn deinterleave<T: Copy>(interleaved: &[T], num_channels: usize, dest: &mut [&mut [T]]) {
    debug_assert_eq!(dest.len(), num_channels);
    for (frame_idx, frame) in interleaved.chunks_exact(num_channels).enumerate() {
        for (channel, &sample) in dest.iter_mut().zip(frame) {
            channel[frame_idx] = sample;
        }
    }
}

/// Weaves per-channel slices into one interleaved buffer.
pub fn interleave<T: Copy>(src: &[&[T]], num_channels: usize, interleaved: &mut [T]) {
    debug_assert_eq!(src.len(), num_channels);
    for (frame_idx, frame) in interleaved.chunks_exact_mut(num_channels).enumerate() {
        for (sample, channel) in frame.iter_mut().zip(src) {
            *sample = channel[frame_idx];
        }
    }
}

/// Averages all channels into `dest`.
pub fn downmix_to_mono(src: &[&[f32]], dest: &mut [f32]) {
    let Some((first, rest)) = src.split_first() else {
        dest.fill(0.0);
        return;
    };
    dest.copy_from_slice(&first[..dest.len()]);
    for channel in rest {
        for (d, s) in dest.iter_mut().zip(channel.iter()) {
            *d += s;
        }
    }
    let scale = 1.0 / src.len() as f32;
    for d in dest.iter_mut() {
        *d *= scale;
    }
}
