//! Voice activity detection on a WAV file.
//!
//! Classifies every 10, 20 or 30 ms frame with [`Vad`], prints the speech
//! segments, and runs the same audio through [`VoiceActivityDetector`] for
//! smoothed per-chunk probabilities. Without a file, a synthetic signal
//! alternating one second of voiced audio and one second of silence is used.
//!
//! ```sh
//! cargo run -p clarion --features examples --example vad -- speech.wav --mode 3
//! ```

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use hound::{SampleFormat, WavReader};

use clarion::{VALID_FRAME_MS, Vad, VoiceActivityDetector};

#[allow(dead_code, reason = "shared helpers for the examples")]
mod common;

#[derive(Parser, Debug)]
#[command(about = "Find the speech in a 16-bit WAV file")]
struct Args {
    /// 16-bit PCM WAV file. Synthetic audio when omitted.
    input: Option<PathBuf>,

    /// Aggressiveness, 0 (permissive) to 3 (most aggressive).
    #[arg(short, long, default_value_t = 2)]
    mode: i32,

    /// Frame duration in ms: 10, 20 or 30.
    #[arg(short, long, default_value_t = 30)]
    frame_ms: u32,
}

fn load(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader = WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!("{} is not 16-bit PCM", path.display());
    }
    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("decoding samples")?;
    let mono = common::downmix_interleaved(&samples, usize::from(spec.channels));
    Ok((mono, spec.sample_rate))
}

fn synthetic(sample_rate: u32, seconds: usize) -> Vec<i16> {
    let rate = sample_rate as usize;
    (0..rate * seconds)
        .map(|n| {
            if (n / rate) % 2 == 1 {
                return 0;
            }
            let t = n as f32 / sample_rate as f32;
            let envelope = (PI * (n % rate) as f32 / rate as f32).sin();
            let voice = 0.3 * (2.0 * PI * 200.0 * t).sin()
                + 0.2 * (2.0 * PI * 400.0 * t).sin()
                + 0.1 * (2.0 * PI * 800.0 * t).sin();
            (voice * envelope * 16384.0) as i16
        })
        .collect()
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();
    ensure!(
        VALID_FRAME_MS.contains(&args.frame_ms),
        "frame duration must be one of {VALID_FRAME_MS:?} ms"
    );

    let (audio, sample_rate) = match &args.input {
        Some(path) => load(path)?,
        None => (synthetic(16000, 6), 16000),
    };
    let seconds = audio.len() as f64 / f64::from(sample_rate);
    println!("{} samples at {sample_rate} Hz ({seconds:.2} s)", audio.len());

    let frame_len = (sample_rate * args.frame_ms / 1000) as usize;
    if Vad::is_valid_config(sample_rate, frame_len) {
        let mut vad = Vad::default();
        vad.set_mode(args.mode)?;
        println!("\nmode {:?}, {} ms frames", vad.mode(), args.frame_ms);

        let mut segment_start = None;
        let mut speech_frames = 0usize;
        let frames = audio.chunks_exact(frame_len);
        let num_frames = frames.len();
        for (i, frame) in frames.enumerate() {
            let speech = vad.is_speech(frame, sample_rate)?;
            speech_frames += usize::from(speech);
            let t = (i * frame_len) as f64 / f64::from(sample_rate);
            match (speech, segment_start) {
                (true, None) => segment_start = Some(t),
                (false, Some(start)) => {
                    println!("  speech {start:7.2} s .. {t:7.2} s");
                    segment_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = segment_start {
            println!("  speech {start:7.2} s .. {seconds:7.2} s");
        }
        println!(
            "{speech_frames} of {num_frames} frames speech ({:.1}%)",
            100.0 * speech_frames as f64 / num_frames.max(1) as f64
        );
    } else {
        println!("\nframe classifier needs 8, 16 or 32 kHz; skipping it");
    }

    let chunk_len = sample_rate as usize / 100;
    let whole = audio.len() / chunk_len * chunk_len;
    let mut detector = VoiceActivityDetector::new();
    detector.process_chunk(&audio[..whole], sample_rate)?;
    let probabilities: Vec<f64> = detector.take_voice_probabilities().collect();
    let rms: Vec<f64> = detector.take_rms().collect();

    println!("\nsmoothed voice probability, one line per 500 ms:");
    for (second, (p, r)) in probabilities.chunks(50).zip(rms.chunks(50)).enumerate() {
        let mean_p = p.iter().sum::<f64>() / p.len() as f64;
        let mean_rms = r.iter().sum::<f64>() / r.len() as f64;
        println!(
            "  {:6.1} s  p={mean_p:.2}  rms={mean_rms:8.1}",
            second as f64 * 0.5
        );
    }
    Ok(())
}
