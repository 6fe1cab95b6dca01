//! Echo canceller quality metrics, aggregated over fixed intervals.

use crate::common::METRICS_REPORTING_INTERVAL_BLOCKS;

/// Quality snapshot of the echo canceller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EchoMetrics {
    /// Echo return loss of the modelled echo path, dB.
    pub echo_return_loss_db: f64,
    /// Capture power over output power, dB.
    pub echo_return_loss_enhancement_db: f64,
    /// Share of blocks in the last interval where the linear filter made
    /// the capture louder.
    pub divergent_filter_fraction: f64,
    /// Render-to-capture delay in use, milliseconds.
    pub delay_ms: i32,
}

/// Instant value with the floor and ceiling seen since the last report.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DbMetric {
    pub(crate) value: f32,
    pub(crate) floor: f32,
    pub(crate) ceil: f32,
}

impl DbMetric {
    fn new() -> Self {
        Self {
            value: 0.0,
            floor: f32::MAX,
            ceil: f32::MIN,
        }
    }

    pub(crate) fn update_instant(&mut self, value: f32) {
        self.value = value;
        self.floor = self.floor.min(value);
        self.ceil = self.ceil.max(value);
    }
}

fn to_db(ratio: f64) -> f64 {
    10.0 * ratio.max(1e-10).log10()
}

#[derive(Debug)]
pub(crate) struct EchoRemoverMetrics {
    blocks: usize,
    capture_power: f64,
    output_power: f64,
    divergent_blocks: usize,
    erle_instant: DbMetric,
    reported: Option<EchoMetrics>,
}

impl EchoRemoverMetrics {
    pub(crate) fn new() -> Self {
        Self {
            blocks: 0,
            capture_power: 0.0,
            output_power: 0.0,
            divergent_blocks: 0,
            erle_instant: DbMetric::new(),
            reported: None,
        }
    }

    /// Accounts one block. `erl` is only evaluated when an interval
    /// completes.
    pub(crate) fn update(
        &mut self,
        capture_power: f32,
        output_power: f32,
        divergent: bool,
        delay_ms: i32,
        erl: impl FnOnce() -> f32,
    ) {
        self.blocks += 1;
        self.capture_power += f64::from(capture_power);
        self.output_power += f64::from(output_power);
        self.divergent_blocks += usize::from(divergent);
        self.erle_instant.update_instant(
            to_db((f64::from(capture_power) + 1.0) / (f64::from(output_power) + 1.0)) as f32,
        );

        if self.blocks < METRICS_REPORTING_INTERVAL_BLOCKS {
            return;
        }
        let metrics = EchoMetrics {
            echo_return_loss_db: -to_db(f64::from(erl())),
            echo_return_loss_enhancement_db: to_db(
                (self.capture_power + 1.0) / (self.output_power + 1.0),
            ),
            divergent_filter_fraction: self.divergent_blocks as f64 / self.blocks as f64,
            delay_ms,
        };
        tracing::debug!(
            erl_db = metrics.echo_return_loss_db,
            erle_db = metrics.echo_return_loss_enhancement_db,
            erle_floor_db = self.erle_instant.floor,
            erle_ceil_db = self.erle_instant.ceil,
            divergent = metrics.divergent_filter_fraction,
            "echo canceller metrics"
        );
        self.reported = Some(metrics);
        self.blocks = 0;
        self.capture_power = 0.0;
        self.output_power = 0.0;
        self.divergent_blocks = 0;
        self.erle_instant = DbMetric::new();
    }

    pub(crate) fn reported(&self) -> Option<EchoMetrics> {
        self.reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_metric_tracks_extremes() {
        let mut metric = DbMetric::new();
        for value in [-3.0, 12.0, 4.0] {
            metric.update_instant(value);
        }
        assert_eq!((metric.value, metric.floor, metric.ceil), (4.0, -3.0, 12.0));
    }

    #[test]
    fn reports_once_per_interval() {
        let mut metrics = EchoRemoverMetrics::new();
        for i in 0..METRICS_REPORTING_INTERVAL_BLOCKS - 1 {
            metrics.update(1.0e6, 1.0e4, i % 5 == 0, 20, || panic!("erl evaluated early"));
        }
        assert_eq!(metrics.reported(), None);
        metrics.update(1.0e6, 1.0e4, false, 20, || 0.01);
        let reported = metrics.reported().unwrap_or_default();
        assert!((reported.echo_return_loss_db - 20.0).abs() < 1e-6);
        assert!((reported.echo_return_loss_enhancement_db - 20.0).abs() < 0.01);
        assert!((reported.divergent_filter_fraction - 50.0 / 250.0).abs() < 1e-9);
        assert_eq!(reported.delay_ms, 20);
    }
}
