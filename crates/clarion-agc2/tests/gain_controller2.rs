//! Behavioral tests for the public AGC2 API.

use clarion_agc2::{AdaptiveDigitalConfig, Agc2Config, GainController2};
use clarion_common_audio::channel_buffer::ChannelBuffer;
use proptest::prelude::*;
use test_strategy::proptest;

// ── Helpers ──

fn voiced_frame(rate: u32, frame: usize, amplitude: f32) -> ChannelBuffer<f32> {
    let len = rate as usize / 100;
    let mut audio = ChannelBuffer::new(len, 1);
    for (i, x) in audio.channel_mut(0).iter_mut().enumerate() {
        let t = (frame * len + i) as f32 / rate as f32;
        *x = (1..=19)
            .map(|h| (2.0 * std::f32::consts::PI * 200.0 * h as f32 * t).sin())
            .sum::<f32>()
            * amplitude;
    }
    audio
}

fn adaptive_config() -> Agc2Config {
    Agc2Config {
        adaptive_digital: AdaptiveDigitalConfig {
            enabled: true,
            ..AdaptiveDigitalConfig::default()
        },
        ..Agc2Config::default()
    }
}

// ── Tests ──

#[test]
fn silence_keeps_the_initial_gain() {
    let mut agc = GainController2::new(adaptive_config(), 16000, 1);
    for _ in 0..200 {
        let mut audio = ChannelBuffer::new(160, 1);
        agc.process(&mut audio);
        assert!(audio.channel(0).iter().all(|&x| x == 0.0));
    }
    assert_eq!(agc.adaptive_gain_db(), 15.0);
}

#[test]
fn loud_speech_lowers_the_adaptive_gain() {
    let mut agc = GainController2::new(adaptive_config(), 16000, 1);
    for frame in 0..300 {
        let mut audio = voiced_frame(16000, frame, 1500.0);
        agc.process(&mut audio);
    }
    assert!(agc.last_speech_probability() > 0.95);
    assert!(agc.adaptive_gain_db() < 10.0, "{}", agc.adaptive_gain_db());
    let level = agc.speech_level_dbfs().unwrap_or(f32::NAN);
    assert!(level > -25.0, "speech level {level}");
}

#[test]
fn gain_changes_are_rate_limited() {
    let mut agc = GainController2::new(adaptive_config(), 16000, 1);
    let mut last = agc.adaptive_gain_db();
    for frame in 0..300 {
        let mut audio = voiced_frame(16000, frame, 1500.0);
        agc.process(&mut audio);
        let gain = agc.adaptive_gain_db();
        assert!((gain - last).abs() <= 0.06 + 1e-4, "frame {frame}: {last} -> {gain}");
        last = gain;
    }
}

#[proptest(ProptestConfig { cases: 16, ..ProptestConfig::default() })]
fn output_stays_in_range(
    #[strategy(0.0f32..49.0)] fixed_gain_db: f32,
    #[strategy(100.0f32..40000.0)] amplitude: f32,
    adaptive: bool,
) {
    let mut config = Agc2Config::default();
    config.fixed_digital.gain_db = fixed_gain_db;
    config.adaptive_digital.enabled = adaptive;
    let mut agc = GainController2::new(config, 48000, 1);
    for frame in 0..20 {
        let mut audio = voiced_frame(48000, frame, amplitude);
        agc.process(&mut audio);
        for &x in audio.channel(0) {
            prop_assert!(x.is_finite() && (-32768.0..=32767.0).contains(&x), "{x}");
        }
    }
}
