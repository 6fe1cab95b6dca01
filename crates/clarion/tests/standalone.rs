//! Components usable without an `AudioProcessing` session: the voice
//! activity detectors, the resampler and the RMS meter.

use clarion::{
    Levels, MIN_ENERGY, NON_SPEECH_PROBABILITY, Resampler, RmsLevel, StandaloneVad, VALID_FRAME_MS,
    VALID_RATES, Vad, VadError, VadMode, VoiceActivityDetector,
};
use proptest::prelude::*;
use test_strategy::proptest;

// ── Helpers ──────────────────────────────────────────────────────────────────

const MODES: [VadMode; 4] = [
    VadMode::Quality,
    VadMode::LowBitrate,
    VadMode::Aggressive,
    VadMode::VeryAggressive,
];

fn sine(freq_hz: f32, rate: u32, len: usize, amplitude: f32) -> Vec<i16> {
    (0..len)
        .map(|i| (amplitude * (2.0 * std::f32::consts::PI * freq_hz * i as f32 / rate as f32).sin()) as i16)
        .collect()
}

fn zero_crossings(x: &[i16]) -> usize {
    x.windows(2).filter(|w| (w[0] < 0) != (w[1] < 0)).count()
}

// ── Vad ──────────────────────────────────────────────────────────────────────

#[test]
fn frame_length_validation() {
    assert!(Vad::is_valid_config(16000, 480));
    assert!(Vad::is_valid_config(8000, 240));
    assert!(Vad::is_valid_config(32000, 320));
    assert!(!Vad::is_valid_config(16000, 100));
    assert!(!Vad::is_valid_config(48000, 480));
    assert!(!Vad::is_valid_config(16000, 0));
}

#[test]
fn silence_is_non_speech_everywhere() {
    for mode in MODES {
        let mut vad = Vad::new(mode);
        for rate in VALID_RATES {
            for ms in VALID_FRAME_MS {
                let frame = vec![0i16; (rate * ms / 1000) as usize];
                assert_eq!(vad.process(rate, &frame), 0, "{mode:?} {rate} Hz {ms} ms");
            }
        }
    }
}

#[test]
fn invalid_frames_report_the_sentinel() {
    let mut vad = Vad::new(VadMode::default());
    assert_eq!(vad.process(16000, &[0; 100]), -1);
    assert_eq!(
        vad.is_speech(&[0; 100], 16000),
        Err(VadError::InvalidConfig { rate: 16000, len: 100 })
    );
    assert_eq!(vad.set_mode(4), Err(VadError::InvalidMode(4)));
    assert_eq!(vad.set_mode(0), Ok(()));
    assert_eq!(vad.mode(), VadMode::Quality);
}

#[proptest(ProptestConfig { cases: 32, ..ProptestConfig::default() })]
fn vad_output_is_binary(
    #[strategy(0..4i32)] mode: i32,
    #[strategy(proptest::sample::select(VALID_RATES.to_vec()))] rate: u32,
    #[strategy(0.0f32..32767.0)] amplitude: f32,
    #[strategy(50.0f32..3000.0)] freq_hz: f32,
) {
    let mut vad = Vad::new(VadMode::default());
    vad.set_mode(mode).unwrap();
    let frame = sine(freq_hz, rate, rate as usize / 100 * 3, amplitude);
    let decision = vad.process(rate, &frame);
    prop_assert!(decision == 0 || decision == 1, "{decision}");
}

#[test]
fn standalone_vad_buffers_chunks() {
    let mut vad = StandaloneVad::new();
    let mut probabilities = [0.0f64; 3];
    assert_eq!(vad.get_activity(&mut probabilities), Err(VadError::NoAudio));
    for _ in 0..2 {
        vad.add_audio(&[0; 160]).unwrap();
    }
    assert_eq!(vad.buffered_chunks(), 2);
    vad.get_activity(&mut probabilities).unwrap();
    assert_eq!(probabilities[..2], [NON_SPEECH_PROBABILITY; 2]);
    assert_eq!(vad.buffered_chunks(), 0);
}

#[test]
fn frames_below_the_energy_floor_are_never_speech() {
    // The largest constant level whose mean square is still under the floor.
    let level = MIN_ENERGY.sqrt().floor() as i16;
    assert!(f32::from(level).powi(2) < MIN_ENERGY);
    let frame = [level; 160];
    for mode in 0..=3 {
        let mut vad = Vad::default();
        vad.set_mode(mode).unwrap();
        assert_eq!(vad.is_speech(&frame, 16000), Ok(false), "mode {mode}");
    }
}

#[test]
fn voice_activity_history_drains_on_read() {
    let mut vad = VoiceActivityDetector::new();
    vad.process_chunk(&[0; 480 * 3], 48000).unwrap();
    assert_eq!(vad.take_voice_probabilities().count(), 3);
    assert_eq!(vad.take_rms().count(), 3);
    assert_eq!(vad.take_voice_probabilities().count(), 0);
    assert!(vad.process_chunk(&[0; 100], 48000).is_err());
}

// ── Resampler ────────────────────────────────────────────────────────────────

#[test]
fn down_then_up_preserves_a_low_tone() {
    let mut down = Resampler::new(48000, 16000, 1).unwrap();
    let mut up = Resampler::new(16000, 48000, 1).unwrap();
    let input = sine(300.0, 48000, 48000, 10000.0);
    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks(480) {
        let low = down.process(chunk).unwrap();
        output.extend(up.process(&low).unwrap());
    }
    assert_eq!(output.len(), input.len());

    // Skip the filter delay, then compare one second worth of crossings.
    let settled = &output[4800..];
    let reference = &input[4800..];
    let crossings = zero_crossings(settled) as i64;
    assert!((crossings - zero_crossings(reference) as i64).abs() <= 2, "{crossings}");
    let peak = settled.iter().map(|x| x.unsigned_abs()).max().unwrap_or(0);
    assert!((9000..=10500).contains(&peak), "peak {peak}");
}

#[test]
fn output_length_follows_the_ratio() {
    let mut resampler = Resampler::new(44100, 48000, 2).unwrap();
    let mut total_in = 0usize;
    let mut total_out = 0usize;
    for i in 0..500 {
        let frames = 100 + (i * 37) % 400;
        let chunk = vec![0i16; frames * 2];
        total_in += frames;
        total_out += resampler.process(&chunk).unwrap().len() / 2;
    }
    let expected = total_in as f64 * 48000.0 / 44100.0;
    assert!((total_out as f64 - expected).abs() <= 1.0, "{total_out} vs {expected}");
}

// ── RmsLevel ─────────────────────────────────────────────────────────────────

#[test]
fn full_scale_square_wave() {
    let mut meter = RmsLevel::new();
    let frame: Vec<i16> = (0..480)
        .map(|i| if (i / 24) % 2 == 0 { i16::MAX } else { i16::MIN + 1 })
        .collect();
    for _ in 0..100 {
        meter.analyze_i16(&frame);
    }
    assert_eq!(meter.average_and_peak(), Levels { average: 0, peak: 0 });
    // Read resets the meter.
    assert_eq!(meter.average(), RmsLevel::MIN_LEVEL_DB);
}

#[test]
fn float_square_wave_matches_its_amplitude() {
    let mut meter = RmsLevel::new();
    // 0.1 of full scale is 20 dB down.
    let frame: Vec<f32> = (0..160).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
    meter.analyze_f32(&frame);
    assert_eq!(meter.average(), 20);
}
