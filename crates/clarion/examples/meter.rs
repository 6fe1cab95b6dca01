//! Live microphone level meter.
//!
//! Analyzes the default input device in 10 ms blocks and prints the average
//! and peak RMS level twice a second. The device delivers buffers of any
//! size; they are re-framed before metering.
//!
//! ```sh
//! cargo run -p clarion --features examples --example meter -- --rate 32000
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};

use clarion::{FrameAccumulator, RmsLevel};

#[allow(dead_code, reason = "shared helpers for the examples")]
mod common;

const REPORT_INTERVAL: Duration = Duration::from_millis(500);
const BAR_WIDTH: usize = 45;

#[derive(Parser, Debug)]
#[command(about = "Print the microphone level")]
struct Args {
    /// Device sample rate.
    #[arg(long, default_value_t = 32_000)]
    rate: u32,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();
    let running = Arc::new(AtomicBool::new(true));
    ctrlc::set_handler({
        let running = running.clone();
        move || running.store(false, Ordering::SeqCst)
    })?;

    let device = cpal::default_host()
        .default_input_device()
        .context("no input device available")?;
    println!("Input: {}", device.name()?);

    let mut blocks = FrameAccumulator::for_stream(args.rate, 1);
    let cpal_config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(args.rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let (mut prod, mut cons) = HeapRb::<f32>::new(blocks.frame_len() * 50).split();
    let stream = device.build_input_stream(
        &cpal_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            prod.push_slice(data);
        },
        |err| eprintln!("input error: {err}"),
        None,
    )?;
    stream.play()?;

    println!("  avg  peak   (dBFS below full scale, Ctrl+C to stop)");
    let mut meter = RmsLevel::new();
    let mut scratch = vec![0.0f32; blocks.frame_len() * 4];
    let mut last_report = Instant::now();
    while running.load(Ordering::SeqCst) {
        if cons.is_empty() {
            thread::sleep(Duration::from_millis(2));
            continue;
        }
        let available = cons.pop_slice(&mut scratch);
        blocks.push(&scratch[..available], |block| meter.analyze_f32(block));

        if last_report.elapsed() >= REPORT_INTERVAL {
            let levels = meter.average_and_peak();
            println!(
                "  {:3}  {:3}  {}",
                levels.average,
                levels.peak,
                common::level_bar(levels.peak, BAR_WIDTH)
            );
            last_report = Instant::now();
        }
    }
    Ok(())
}
