//! Full-duplex microphone loopback with echo cancellation.
//!
//! The microphone is processed and played back on the speakers, and the
//! played signal is fed back as the echo reference, so the speakers do not
//! howl. The capture callback, a processing thread and the playback
//! callback are connected by fixed-size ring buffers. When one fills up the
//! newest samples are dropped rather than blocking an audio callback.
//!
//! ```sh
//! cargo run -p clarion --features examples --example karaoke
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};

use clarion::config::{EchoCanceller, HighPassFilter, NoiseSuppression};
use clarion::{AudioProcessing, Config, StreamConfig};

#[allow(dead_code, reason = "shared helpers for the examples")]
mod common;

const NUM_CHANNELS: u16 = 1;
const QUEUE_FRAMES: usize = 10;

#[derive(Parser, Debug)]
#[command(about = "Loop the microphone to the speakers through the echo canceller")]
struct Args {
    /// Device sample rate.
    #[arg(long, default_value_t = 48_000)]
    rate: u32,

    /// Use the mobile echo canceller.
    #[arg(long)]
    mobile: bool,

    /// Disable noise suppression.
    #[arg(long)]
    no_ns: bool,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();
    let running = Arc::new(AtomicBool::new(true));
    let dropped = Arc::new(AtomicUsize::new(0));

    ctrlc::set_handler({
        let running = running.clone();
        move || running.store(false, Ordering::SeqCst)
    })?;

    let host = cpal::default_host();
    let input_device = host
        .default_input_device()
        .context("no input device available")?;
    let output_device = host
        .default_output_device()
        .context("no output device available")?;
    println!("Input:  {}", input_device.name()?);
    println!("Output: {}", output_device.name()?);

    let stream_config = StreamConfig::new(args.rate, NUM_CHANNELS);
    let frame_len = stream_config.num_samples();
    let cpal_config = cpal::StreamConfig {
        channels: NUM_CHANNELS,
        sample_rate: cpal::SampleRate(args.rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // Mic callback -> processing thread -> speaker callback.
    let (mut mic_prod, mut mic_cons) = HeapRb::<f32>::new(frame_len * QUEUE_FRAMES).split();
    let (mut spk_prod, mut spk_cons) = HeapRb::<f32>::new(frame_len * QUEUE_FRAMES).split();

    let input_stream = input_device.build_input_stream(
        &cpal_config,
        {
            let dropped = dropped.clone();
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let pushed = mic_prod.push_slice(data);
                dropped.fetch_add(data.len() - pushed, Ordering::Relaxed);
            }
        },
        |err| eprintln!("input error: {err}"),
        None,
    )?;

    let output_stream = output_device.build_output_stream(
        &cpal_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let filled = spk_cons.pop_slice(data);
            data[filled..].fill(0.0);
        },
        |err| eprintln!("output error: {err}"),
        None,
    )?;

    let config = Config {
        high_pass_filter: HighPassFilter {
            enabled: true,
            ..Default::default()
        },
        echo_canceller: EchoCanceller {
            enabled: true,
            mobile_mode: args.mobile,
            ..Default::default()
        },
        noise_suppression: NoiseSuppression {
            enabled: !args.no_ns,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut apm = AudioProcessing::builder()
        .config(config)
        .capture_config(stream_config)
        .build()?;

    input_stream.play()?;
    output_stream.play()?;

    let processing = thread::spawn({
        let running = running.clone();
        let dropped = dropped.clone();
        move || -> Result<()> {
            let mut mic = vec![0.0f32; frame_len];
            let mut processed = vec![0.0f32; frame_len];
            let mut played = vec![0.0f32; frame_len];
            while running.load(Ordering::SeqCst) {
                if mic_cons.occupied_len() < frame_len {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
                mic_cons.pop_slice(&mut mic);
                apm.process_capture_f32(&[&mic], &mut [&mut processed])?;

                // What goes to the speakers is the next echo reference.
                apm.process_render_f32(&[&processed], &mut [&mut played])?;
                let pushed = spk_prod.push_slice(&played);
                dropped.fetch_add(frame_len - pushed, Ordering::Relaxed);
            }
            if let Some(delay_ms) = apm.statistics().delay_ms {
                println!("\nestimated echo delay: {delay_ms} ms");
            }
            Ok(())
        }
    });

    println!("Looping mic -> clarion -> speakers (Ctrl+C to stop)");
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    drop(input_stream);
    drop(output_stream);
    processing
        .join()
        .map_err(|_| anyhow!("processing thread panicked"))??;

    println!("dropped {} samples", dropped.load(Ordering::Relaxed));
    Ok(())
}
