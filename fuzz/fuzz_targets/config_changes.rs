#![no_main]

use arbitrary::Arbitrary;
use clarion::config::{
    EchoCanceller, GainController1, GainController1Mode, GainController2, HighPassFilter,
    MaxProcessingRate, NoiseSuppression, NoiseSuppressionLevel, Pipeline,
};
use clarion::{AudioProcessing, Config, StreamConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    configs: Vec<FuzzConfig>,
    /// Audio samples to process between config changes
    samples: Vec<f32>,
}

#[derive(Debug, Arbitrary)]
struct FuzzConfig {
    max_rate_48k: bool,
    hpf_enabled: bool,
    ec_enabled: bool,
    ec_mobile: bool,
    ns_enabled: bool,
    ns_level: u8,
    agc1_enabled: bool,
    agc1_mode: u8,
    agc1_target: i8,
    agc2_enabled: bool,
    analog_level: u8,
    delay_ms: i16,
}

fn ns_level(idx: u8) -> NoiseSuppressionLevel {
    match idx % 4 {
        0 => NoiseSuppressionLevel::Low,
        1 => NoiseSuppressionLevel::Moderate,
        2 => NoiseSuppressionLevel::High,
        _ => NoiseSuppressionLevel::VeryHigh,
    }
}

fn agc1_mode(idx: u8) -> GainController1Mode {
    match idx % 3 {
        0 => GainController1Mode::AdaptiveAnalog,
        1 => GainController1Mode::AdaptiveDigital,
        _ => GainController1Mode::FixedDigital,
    }
}

fuzz_target!(|input: FuzzInput| {
    let stream = StreamConfig::new(48000, 1);
    let frames = stream.num_frames();

    if input.samples.len() < frames || input.configs.is_empty() {
        return;
    }

    let Ok(mut apm) = AudioProcessing::builder().capture_config(stream).build() else {
        return;
    };
    let src: Vec<f32> = input.samples[..frames]
        .iter()
        .map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
        .collect();
    let src_slices = [src.as_slice()];
    let mut dest = vec![0.0f32; frames];

    for cfg in &input.configs {
        let config = Config {
            pipeline: Pipeline {
                maximum_internal_processing_rate: if cfg.max_rate_48k {
                    MaxProcessingRate::Rate48kHz
                } else {
                    MaxProcessingRate::Rate32kHz
                },
            },
            high_pass_filter: HighPassFilter {
                enabled: cfg.hpf_enabled,
                ..Default::default()
            },
            echo_canceller: EchoCanceller {
                enabled: cfg.ec_enabled,
                mobile_mode: cfg.ec_mobile,
                ..Default::default()
            },
            noise_suppression: NoiseSuppression {
                enabled: cfg.ns_enabled,
                level: ns_level(cfg.ns_level),
                ..Default::default()
            },
            gain_controller1: GainController1 {
                enabled: cfg.agc1_enabled,
                mode: agc1_mode(cfg.agc1_mode),
                target_level_dbfs: i32::from(cfg.agc1_target),
                ..Default::default()
            },
            gain_controller2: GainController2 {
                enabled: cfg.agc2_enabled,
                ..Default::default()
            },
        };
        // Invalid configs are rejected and leave the previous one running.
        let _ = apm.apply_config(config);
        let _ = apm.set_stream_analog_level(i32::from(cfg.analog_level));
        let _ = apm.set_stream_delay_ms(i32::from(cfg.delay_ms));

        let mut render_out = vec![0.0f32; frames];
        apm.process_render_f32(&src_slices, &mut [render_out.as_mut_slice()])
            .expect("render frame");
        let mut dst_slices = [dest.as_mut_slice()];
        apm.process_capture_f32(&src_slices, &mut dst_slices)
            .expect("capture frame");
    }
});
