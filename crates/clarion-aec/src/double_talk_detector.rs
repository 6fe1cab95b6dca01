//! Near-end activity detection for the full canceller.

use crate::common::Spectrum;
use crate::config::DoubleTalk;

/// Error power, summed over bins, below which the near end is considered
/// silent.
const MIN_NEAREND_POWER: f32 = 128.0 * 100.0;

/// Flags blocks where the error clearly exceeds the residual echo estimate.
/// Only meaningful once the linear filter has converged; before that the
/// residual estimate is too coarse to separate echo from near-end speech.
#[derive(Debug)]
pub(crate) struct DoubleTalkDetector {
    nearend_ratio: f32,
    hangover_blocks: usize,
    hangover: usize,
}

impl DoubleTalkDetector {
    pub(crate) fn new(config: &DoubleTalk) -> Self {
        Self {
            nearend_ratio: config.nearend_ratio,
            hangover_blocks: config.hangover_blocks,
            hangover: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.hangover = 0;
    }

    pub(crate) fn active(&self) -> bool {
        self.hangover > 0
    }

    pub(crate) fn update(&mut self, converged: bool, e2: &Spectrum, r2: &Spectrum) -> bool {
        let error: f32 = e2.iter().sum();
        let residual: f32 = r2.iter().sum();
        if converged && error > MIN_NEAREND_POWER && error > self.nearend_ratio * residual {
            self.hangover = self.hangover_blocks.max(1);
        } else {
            self.hangover = self.hangover.saturating_sub(1);
        }
        self.active()
    }
}
