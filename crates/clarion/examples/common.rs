//! Helpers shared by the examples.

use std::io;

use tracing_subscriber::EnvFilter;

/// Logs to stderr, filtered by `RUST_LOG` (default `info`).
pub(crate) fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
}

/// Average an interleaved multi-channel buffer down to mono.
///
/// ```text
/// Interleaved (stereo, 2 frames):
/// [L0, R0, L1, R1]
///
/// Mono:
/// [(L0 + R0) / 2, (L1 + R1) / 2]
/// ```
pub(crate) fn downmix_interleaved(src: &[i16], num_channels: usize) -> Vec<i16> {
    if num_channels <= 1 {
        return src.to_vec();
    }
    src.chunks_exact(num_channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / num_channels as i32) as i16
        })
        .collect()
}

/// Level bar for a dB-below-full-scale reading, `0` full, `127` silent.
pub(crate) fn level_bar(level_dbfs: i32, width: usize) -> String {
    let filled = width.saturating_sub((level_dbfs.clamp(0, 90) as usize * width) / 90);
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}
