//! Offline echo cancellation of raw PCM recordings.
//!
//! Reads the far-end (played) and near-end (recorded) audio as headerless
//! little-endian 16-bit PCM, runs both through the pipeline one 10 ms frame
//! at a time and writes the processed recording.
//!
//! ```sh
//! cargo run -p clarion --features examples --example offline -- play.raw rec.raw out.raw
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, ensure};
use clap::Parser;

use clarion::config::GainController1Mode;
use clarion::{AudioProcessing, Config, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, StreamConfig};

#[allow(dead_code, reason = "shared helpers for the examples")]
mod common;

#[derive(Parser, Debug)]
#[command(about = "Cancel the echo of play.raw in rec.raw and write out.raw")]
struct Args {
    /// Far-end audio, raw s16le.
    play_file: PathBuf,

    /// Near-end recording, raw s16le.
    rec_file: PathBuf,

    /// Processed near-end output, raw s16le.
    out_file: PathBuf,

    /// Sample rate of all three files.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    rate: u32,

    /// Interleaved channels in all three files.
    #[arg(long, default_value_t = DEFAULT_CHANNELS)]
    channels: u16,

    /// Known render-to-capture delay hint in milliseconds.
    #[arg(long)]
    delay_ms: Option<i32>,

    /// Use the mobile echo canceller.
    #[arg(long)]
    mobile: bool,
}

fn read_raw(path: &Path) -> Result<Vec<i16>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    ensure!(bytes.len() % 2 == 0, "{} has an odd number of bytes", path.display());
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let play = read_raw(&args.play_file)?;
    let rec = read_raw(&args.rec_file)?;

    let mut config = Config::default();
    config.echo_canceller.enabled = true;
    config.echo_canceller.mobile_mode = args.mobile;
    config.gain_controller1.enabled = true;
    config.gain_controller1.mode = GainController1Mode::AdaptiveAnalog;
    config.gain_controller2.enabled = true;
    config.high_pass_filter.enabled = true;

    let stream = StreamConfig::new(args.rate, args.channels);
    let mut apm = AudioProcessing::builder()
        .config(config)
        .capture_config(stream)
        .build()
        .context("creating the audio processor")?;
    if let Some(delay_ms) = args.delay_ms {
        apm.set_stream_delay_ms(delay_ms)
            .context("delay out of range")?;
    }

    let frame_len = stream.num_samples();
    let num_frames = play.len().min(rec.len()) / frame_len;
    let mut output = Vec::with_capacity(num_frames * frame_len);
    let mut play_out = vec![0i16; frame_len];
    let mut analog_level = apm.recommended_stream_analog_level();
    let started = Instant::now();

    for (play_frame, rec_frame) in play.chunks_exact(frame_len).zip(rec.chunks_exact(frame_len)) {
        apm.process_reverse_stream_i16(play_frame, &stream, &stream, &mut play_out)?;

        let mut frame = rec_frame.to_vec();
        apm.set_stream_analog_level(analog_level)?;
        apm.process_stream_i16_in_place(&mut frame, &stream)?;
        analog_level = apm.recommended_stream_analog_level();

        output.extend(frame.iter().map(|s| s.to_le()));
    }

    fs::write(&args.out_file, bytemuck::cast_slice::<i16, u8>(&output))
        .with_context(|| format!("writing {}", args.out_file.display()))?;

    let ignored = play.len().max(rec.len()) - num_frames * frame_len;
    let stats = apm.statistics();
    println!(
        "processed {num_frames} frames in {:.2?} ({ignored} trailing samples ignored)",
        started.elapsed()
    );
    println!("final analog level: {analog_level}");
    if let (Some(erl), Some(erle)) = (stats.echo_return_loss, stats.echo_return_loss_enhancement) {
        println!("ERL {erl:.1} dB, ERLE {erle:.1} dB");
    }
    if let Some(delay_ms) = stats.delay_ms {
        println!("echo delay {delay_ms} ms");
    }
    Ok(())
}
