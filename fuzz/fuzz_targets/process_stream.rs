#![no_main]

use arbitrary::Arbitrary;
use clarion::config::{EchoCanceller, GainController1, GainController1Mode, GainController2, NoiseSuppression};
use clarion::{AudioProcessing, Config, StreamConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    /// Sample rate index: 0=8k, 1=16k, 2=32k, 3=44.1k, 4=48k
    sample_rate_idx: u8,
    /// Number of channels (clamped to 1-2)
    channels: u8,
    /// Also run the first gain controller in fixed digital mode.
    agc1: bool,
    /// Audio samples, consumed one capture and one render frame at a time.
    samples: Vec<f32>,
}

fn sample_rate(idx: u8) -> u32 {
    match idx % 5 {
        0 => 8000,
        1 => 16000,
        2 => 32000,
        3 => 44100,
        _ => 48000,
    }
}

/// Clamp to valid audio range [-1, 1], replacing NaN/inf with 0.
fn sanitize_sample(s: f32) -> f32 {
    if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 }
}

fuzz_target!(|input: FuzzInput| {
    let rate = sample_rate(input.sample_rate_idx);
    let channels = u16::from(input.channels % 2) + 1;
    let stream = StreamConfig::new(rate, channels);
    let frames = stream.num_frames();
    let frame_samples = stream.num_samples();

    let config = Config {
        echo_canceller: EchoCanceller {
            enabled: true,
            ..Default::default()
        },
        noise_suppression: NoiseSuppression {
            enabled: true,
            ..Default::default()
        },
        gain_controller1: GainController1 {
            enabled: input.agc1,
            mode: GainController1Mode::FixedDigital,
            ..Default::default()
        },
        gain_controller2: GainController2 {
            enabled: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let Ok(mut apm) = AudioProcessing::builder()
        .config(config)
        .capture_config(stream)
        .build()
    else {
        return;
    };

    let sanitized: Vec<f32> = input.samples.iter().copied().map(sanitize_sample).collect();
    let mut dest_data = vec![vec![0.0f32; frames]; usize::from(channels)];

    // Alternate render and capture frames.
    for (i, frame) in sanitized.chunks_exact(frame_samples).enumerate() {
        let src_slices: Vec<&[f32]> = frame.chunks_exact(frames).collect();
        let mut dest_slices: Vec<&mut [f32]> = dest_data.iter_mut().map(Vec::as_mut_slice).collect();
        let result = if i % 2 == 0 {
            apm.process_render_f32(&src_slices, &mut dest_slices)
        } else {
            apm.process_capture_f32(&src_slices, &mut dest_slices)
        };
        assert!(result.is_ok(), "valid frame rejected: {result:?}");
        assert!(
            dest_data.iter().flatten().all(|s| s.is_finite()),
            "non-finite output"
        );
    }
});
