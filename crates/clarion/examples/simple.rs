//! Minimal echo cancellation demo.
//!
//! Plays a synthetic far-end signal into the pipeline, feeds back a capture
//! signal that contains a delayed, attenuated copy of it plus a near-end
//! tone, and prints how much of the echo was removed.
//!
//! ```sh
//! cargo run -p clarion --example simple
//! ```

use std::f32::consts::PI;

use clarion::config::{EchoCanceller, NoiseSuppression};
use clarion::{AudioProcessing, Config, Error, StreamConfig};

#[allow(dead_code, reason = "shared helpers for the examples")]
mod common;

const SAMPLE_RATE: u32 = 16_000;
const NUM_FRAMES: usize = 300;
const ECHO_DELAY: usize = 96;

fn main() -> Result<(), Error> {
    common::init_tracing();

    let stream = StreamConfig::new(SAMPLE_RATE, 1);
    let frame_len = stream.num_frames();
    let config = Config {
        echo_canceller: EchoCanceller {
            enabled: true,
            ..Default::default()
        },
        noise_suppression: NoiseSuppression {
            enabled: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut apm = AudioProcessing::builder()
        .config(config)
        .capture_config(stream)
        .build()?;
    apm.set_stream_delay_ms((ECHO_DELAY * 1000 / SAMPLE_RATE as usize) as i32)?;

    let far_end = far_end_signal(NUM_FRAMES * frame_len);
    let mut render_out = vec![0.0f32; frame_len];
    let mut capture_out = vec![0.0f32; frame_len];
    let (mut echo_in, mut echo_out) = (0.0f64, 0.0f64);

    for frame in 0..NUM_FRAMES {
        let start = frame * frame_len;
        let render = &far_end[start..start + frame_len];
        let capture: Vec<f32> = (start..start + frame_len)
            .map(|n| {
                let echo = n.checked_sub(ECHO_DELAY).map_or(0.0, |m| 0.4 * far_end[m]);
                echo + 0.05 * (n as f32 * 0.031).sin()
            })
            .collect();

        apm.process_render_f32(&[render], &mut [&mut render_out])?;
        apm.process_capture_f32(&[&capture], &mut [&mut capture_out])?;

        if frame >= NUM_FRAMES - 100 {
            echo_in += capture.iter().map(|&x| f64::from(x).powi(2)).sum::<f64>();
            echo_out += capture_out.iter().map(|&x| f64::from(x).powi(2)).sum::<f64>();
        }
    }

    let stats = apm.statistics();
    println!("processed {NUM_FRAMES} frames at {SAMPLE_RATE} Hz");
    println!(
        "capture level reduced by {:.1} dB over the last second",
        10.0 * (echo_in / echo_out.max(1e-12)).log10()
    );
    if let Some(erle) = stats.echo_return_loss_enhancement {
        println!("ERLE reported by the echo canceller: {erle:.1} dB");
    }
    if let Some(delay_ms) = stats.delay_ms {
        println!("estimated echo delay: {delay_ms} ms");
    }
    Ok(())
}

/// Deterministic, speech-like far-end audio: a few harmonics under a slow
/// amplitude envelope.
fn far_end_signal(len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| {
            let t = n as f32 / SAMPLE_RATE as f32;
            let envelope = 0.5 + 0.5 * (2.0 * PI * 3.0 * t).sin();
            let voice: f32 = [180.0f32, 360.0, 540.0, 900.0]
                .iter()
                .enumerate()
                .map(|(k, &f)| (2.0 * PI * f * t).sin() / (k + 1) as f32)
                .sum();
            0.2 * envelope * voice
        })
        .collect()
}
