//! Benchmarks for the Clarion pipeline and its heavier components.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use clarion::config::{EchoCanceller, GainController2, HighPassFilter, NoiseSuppression};
use clarion::{AudioProcessing, Config, RmsLevel, StreamConfig, Vad, VadMode};
use clarion_common_audio::resampler::Resampler;
use clarion_ns::{NoiseSuppressor, NsConfig, SuppressionLevel};

// ---------------------------------------------------------------------------
// Full pipeline benchmarks
// ---------------------------------------------------------------------------

fn signal(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i as f32 * 0.01).sin() * 0.1).collect()
}

fn make_apm(sample_rate: u32, channels: u16) -> (AudioProcessing, StreamConfig) {
    let config = Config {
        high_pass_filter: HighPassFilter {
            enabled: true,
            ..Default::default()
        },
        echo_canceller: EchoCanceller {
            enabled: true,
            ..Default::default()
        },
        noise_suppression: NoiseSuppression {
            enabled: true,
            ..Default::default()
        },
        gain_controller2: GainController2 {
            enabled: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let stream = StreamConfig::new(sample_rate, channels);
    let mut apm = AudioProcessing::builder()
        .config(config)
        .capture_config(stream)
        .build()
        .unwrap();

    // Warm up so the benchmark measures steady state.
    let frames = stream.num_frames();
    let src_ch = signal(frames);
    let src: Vec<&[f32]> = (0..channels).map(|_| src_ch.as_slice()).collect();
    let mut dst_data = vec![vec![0.0f32; frames]; usize::from(channels)];
    for _ in 0..20 {
        let mut dst: Vec<&mut [f32]> = dst_data.iter_mut().map(Vec::as_mut_slice).collect();
        apm.process_render_f32(&src, &mut dst).unwrap();
        apm.process_capture_f32(&src, &mut dst).unwrap();
    }
    (apm, stream)
}

fn bench_process_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_stream");

    for (name, sample_rate, channels) in [
        ("16k_mono", 16000, 1u16),
        ("48k_mono", 48000, 1),
        ("48k_stereo", 48000, 2),
    ] {
        let (mut apm, stream) = make_apm(sample_rate, channels);
        let src_ch = signal(stream.num_frames());
        let src: Vec<&[f32]> = (0..channels).map(|_| src_ch.as_slice()).collect();
        let mut dst_data = vec![vec![0.0f32; stream.num_frames()]; usize::from(channels)];

        group.bench_function(name, |b| {
            b.iter(|| {
                let mut dst: Vec<&mut [f32]> =
                    dst_data.iter_mut().map(Vec::as_mut_slice).collect();
                apm.process_render_f32(black_box(&src), &mut dst).unwrap();
                apm.process_capture_f32(black_box(&src), &mut dst).unwrap();
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Component benchmarks
// ---------------------------------------------------------------------------

fn bench_noise_suppressor(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise_suppressor");
    let mut ns = NoiseSuppressor::new(
        NsConfig {
            target_level: SuppressionLevel::K12dB,
        },
        16000,
    );

    let mut frame: Vec<f32> = (0..ns.frame_len())
        .map(|i| (i as f32 * 0.05).sin() * 3000.0)
        .collect();

    // Warm up
    for _ in 0..50 {
        ns.analyze(&frame);
        ns.process(&mut frame);
    }

    group.bench_function("analyze_and_process", |b| {
        b.iter(|| {
            ns.analyze(black_box(&frame));
            ns.process(black_box(&mut frame));
        });
    });

    group.finish();
}

fn bench_resampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampler");

    for (name, from, to) in [("48k_to_16k", 48000, 16000), ("44k1_to_48k", 44100, 48000)] {
        let mut resampler = Resampler::new(from, to, 1).unwrap();
        let input: Vec<i16> = (0..from as usize / 100)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();
        let mut output = vec![0i16; resampler.output_len(input.len()) + 1];

        group.bench_function(name, |b| {
            b.iter(|| resampler.push(black_box(&input), &mut output).unwrap());
        });
    }

    group.finish();
}

fn bench_vad(c: &mut Criterion) {
    let mut group = c.benchmark_group("vad");
    let mut vad = Vad::new(VadMode::Aggressive);
    let frame: Vec<i16> = (0..480)
        .map(|i| ((i as f32 * 0.08).sin() * 6000.0) as i16)
        .collect();

    group.bench_function("30ms_16k", |b| {
        b.iter(|| vad.is_speech(black_box(&frame), 16000).unwrap());
    });

    group.finish();
}

fn bench_rms_level(c: &mut Criterion) {
    let mut group = c.benchmark_group("rms_level");
    let mut meter = RmsLevel::new();
    let block = signal(480);

    group.bench_function("analyze_480", |b| {
        b.iter(|| {
            meter.analyze_f32(black_box(&block));
            meter.average()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_process_stream,
    bench_noise_suppressor,
    bench_resampler,
    bench_vad,
    bench_rms_level,
);
criterion_main!(benches);
