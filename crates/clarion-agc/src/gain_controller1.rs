use clarion_common_audio::audio_util::{db_to_linear, linear_to_db};
use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::activity_detector::ActivityDetector;
use crate::analog_level::AnalogLevelController;
use crate::config::{Agc1Config, AgcMode};
use crate::digital_agc::DigitalAgc;
use crate::gain_curve::GainCurve;

/// Virtual levels used by the adaptive digital mode.
const VIRTUAL_LEVEL_MAX: i32 = 255;

/// Mean-square level of `audio` in dBFS, floored at -100.
fn frame_level_dbfs(audio: &ChannelBuffer<f32>, gain: f32) -> f32 {
    let samples = (audio.num_frames() * audio.num_channels()).max(1) as f32;
    let energy: f32 = audio.channels().flat_map(|ch| ch.iter()).map(|x| x * x).sum();
    let mean_square = energy / samples * gain * gain;
    10.0 * (mean_square / (32768.0 * 32768.0)).max(1e-10).log10()
}

fn frame_peak(audio: &ChannelBuffer<f32>) -> f32 {
    audio
        .channels()
        .flat_map(|ch| ch.iter())
        .fold(0.0f32, |m, &x| m.max(x.abs()))
}

/// Gain controller 1.
///
/// Call [`Self::analyze`] on the capture signal early in the chain and
/// [`Self::process`] on the signal to be compressed, once per frame.
#[derive(Debug, Clone)]
pub struct GainController1 {
    config: Agc1Config,
    digital: DigitalAgc,
    activity: ActivityDetector,
    level: AnalogLevelController,
    stream_analog_level: i32,
    key_pressed: bool,
}

impl GainController1 {
    pub fn new(mut config: Agc1Config) -> Self {
        if config.validate() {
            tracing::warn!(?config, "gain controller 1 parameters clamped");
        }
        let level = match config.mode {
            AgcMode::AdaptiveAnalog => AnalogLevelController::new(
                config.analog_level_minimum,
                config.analog_level_maximum,
                config.analog_level_maximum,
                config.target_level_dbfs,
            ),
            AgcMode::AdaptiveDigital | AgcMode::FixedDigital => {
                AnalogLevelController::new(0, VIRTUAL_LEVEL_MAX, 0, config.target_level_dbfs)
            }
        };
        tracing::debug!(mode = ?config.mode, "gain controller 1 initialized");
        Self {
            digital: DigitalAgc::new(GainCurve::new(
                config.target_level_dbfs,
                config.compression_gain_db,
                config.enable_limiter,
            )),
            activity: ActivityDetector::default(),
            level,
            stream_analog_level: config.analog_level_maximum,
            key_pressed: false,
            config,
        }
    }

    pub fn config(&self) -> &Agc1Config {
        &self.config
    }

    /// Reports the level currently applied by the hardware.
    pub fn set_stream_analog_level(&mut self, level: i32) {
        self.stream_analog_level = level;
        if self.config.mode == AgcMode::AdaptiveAnalog {
            self.level.set_level(level);
        }
    }

    /// Level the caller should apply before the next frame. Outside the
    /// adaptive analog mode this echoes the level last reported.
    pub fn recommended_analog_level(&self) -> i32 {
        match self.config.mode {
            AgcMode::AdaptiveAnalog => self.level.level(),
            AgcMode::AdaptiveDigital | AgcMode::FixedDigital => self.stream_analog_level,
        }
    }

    /// Keyboard activity freezes gain increases.
    pub fn set_key_pressed(&mut self, pressed: bool) {
        self.key_pressed = pressed;
    }

    /// Digital pre-gain from the virtual level, dB.
    pub fn virtual_gain_db(&self) -> f32 {
        match self.config.mode {
            AgcMode::AdaptiveDigital => self.level.level_gain_db(),
            AgcMode::AdaptiveAnalog | AgcMode::FixedDigital => 0.0,
        }
    }

    /// Compressor gain at the end of the last frame, dB.
    pub fn compression_gain_db(&self) -> f32 {
        linear_to_db(self.digital.gain())
    }

    pub fn is_speech(&self) -> bool {
        self.activity.is_speech()
    }

    /// Measures the capture signal for the level loop.
    pub fn analyze(&mut self, audio: &ChannelBuffer<f32>) {
        let pregain = db_to_linear(self.virtual_gain_db());
        let level_dbfs = frame_level_dbfs(audio, pregain);
        self.activity.update(level_dbfs);
        if self.config.mode == AgcMode::FixedDigital {
            return;
        }
        let peak = frame_peak(audio) * pregain;
        self.level.update(
            level_dbfs,
            peak,
            self.activity.is_speech(),
            !self.key_pressed,
        );
    }

    /// Applies pre-gain (adaptive digital) and compression in place.
    pub fn process(&mut self, audio: &mut ChannelBuffer<f32>) {
        if self.config.mode == AgcMode::AdaptiveDigital {
            let pregain = db_to_linear(self.virtual_gain_db());
            if pregain != 1.0 {
                for channel in audio.channels_mut() {
                    for x in channel.iter_mut() {
                        *x = (*x * pregain).clamp(-32768.0, 32767.0);
                    }
                }
            }
        }
        let allow_increase = !self.key_pressed && self.activity.log_ratio() > -1.0;
        self.digital.process(audio, allow_increase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech_like(frame_index: usize, amplitude: f32) -> ChannelBuffer<f32> {
        // 200 ms bursts separated by 200 ms of near silence.
        let on = (frame_index / 20) % 2 == 0;
        let mut buffer = ChannelBuffer::new(160, 1);
        for (i, x) in buffer.channel_mut(0).iter_mut().enumerate() {
            let n = frame_index * 160 + i;
            let t = n as f32 / 16000.0;
            let v = (2.0 * std::f32::consts::PI * 300.0 * t).sin()
                + 0.5 * (2.0 * std::f32::consts::PI * 900.0 * t).sin();
            *x = if on { amplitude * v } else { 2.0 * v };
        }
        buffer
    }

    #[test]
    fn analog_mode_raises_recommendation_for_quiet_speech() {
        let mut agc = GainController1::new(Agc1Config::default());
        agc.set_stream_analog_level(100);
        for frame in 0..400 {
            let mut audio = speech_like(frame, 100.0);
            agc.analyze(&audio);
            agc.process(&mut audio);
        }
        assert!(agc.recommended_analog_level() > 100);
    }

    #[test]
    fn key_press_blocks_analog_increase() {
        let mut agc = GainController1::new(Agc1Config::default());
        agc.set_stream_analog_level(100);
        agc.set_key_pressed(true);
        for frame in 0..400 {
            let mut audio = speech_like(frame, 100.0);
            agc.analyze(&audio);
            agc.process(&mut audio);
        }
        assert_eq!(agc.recommended_analog_level(), 100);
    }

    #[test]
    fn adaptive_digital_builds_up_virtual_gain() {
        let mut agc = GainController1::new(Agc1Config {
            mode: AgcMode::AdaptiveDigital,
            ..Agc1Config::default()
        });
        assert_eq!(agc.virtual_gain_db(), 0.0);
        for frame in 0..600 {
            let mut audio = speech_like(frame, 300.0);
            agc.analyze(&audio);
            agc.process(&mut audio);
        }
        assert!(agc.virtual_gain_db() > 3.0, "virtual gain {}", agc.virtual_gain_db());
        agc.set_stream_analog_level(42);
        assert_eq!(agc.recommended_analog_level(), 42);
    }

    #[test]
    fn fixed_digital_never_exceeds_full_scale() {
        let mut agc = GainController1::new(Agc1Config {
            mode: AgcMode::FixedDigital,
            compression_gain_db: 40,
            ..Agc1Config::default()
        });
        for frame in 0..180 {
            let mut audio = speech_like(frame, 30000.0);
            agc.analyze(&audio);
            agc.process(&mut audio);
            assert!(audio.channel(0).iter().all(|x| x.abs() <= 32768.0));
        }
        // Last frame was part of a loud burst.
        assert!(agc.compression_gain_db() < 0.0);
    }
}
