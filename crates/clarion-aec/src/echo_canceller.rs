use clarion_common_audio::audio_util::downmix_to_mono;
use clarion_common_audio::channel_buffer::ChannelBuffer;
use clarion_simd::SimdBackend;

use crate::adaptive_fir_filter::AdaptiveFirFilter;
use crate::aec_fft::AecFft;
use crate::block_framer::BlockFramer;
use crate::comfort_noise_generator::ComfortNoiseGenerator;
use crate::common::{BLOCK_SIZE, Block, FFT_LENGTH_BY_2_PLUS_1, Spectrum, blocks_for_ms, power};
use crate::config::EchoCancellerConfig;
use crate::delay_estimator::DelayEstimator;
use crate::double_talk_detector::DoubleTalkDetector;
use crate::echo_remover_metrics::{EchoMetrics, EchoRemoverMetrics};
use crate::fft_data::FftData;
use crate::frame_blocker::FrameBlocker;
use crate::mobile::MobileCanceller;
use crate::render_buffer::RenderBuffer;
use crate::residual_echo_estimator::ResidualEchoEstimator;
use crate::subband_erle_estimator::SubbandErleEstimator;
use crate::suppression_filter::SuppressionFilter;
use crate::suppression_gain::SuppressionGain;

/// How far the render stream may run ahead of the capture stream.
const RENDER_LOOKAHEAD_MS: usize = 200;
/// Smoothed capture power over error power above which the linear filter
/// counts as converged.
const CONVERGED_RATIO: f32 = 2.0;
/// Error power per block below which a block is never divergent.
const DIVERGENCE_FLOOR: f32 = BLOCK_SIZE as f32 * 100.0;
const SATURATION_THRESHOLD: f32 = 32000.0;

/// Full-mode state for one capture channel.
#[derive(derive_more::Debug)]
struct FullChannel {
    filter: AdaptiveFirFilter,
    erle: SubbandErleEstimator,
    double_talk: DoubleTalkDetector,
    residual_echo: ResidualEchoEstimator,
    suppression_gain: SuppressionGain,
    suppression_filter: SuppressionFilter,
    comfort_noise: ComfortNoiseGenerator,
    #[debug(skip)]
    previous_capture: Block,
    #[debug(skip)]
    previous_error: Block,
    #[debug(skip)]
    previous_echo: Block,
    capture_smoothed: f32,
    error_smoothed: f32,
    converged: bool,
    divergent_run: usize,
    divergence_factor: f32,
    divergence_blocks: usize,
}

/// Render-side inputs shared by every capture channel for one block.
#[derive(Debug)]
struct RenderView<'a> {
    buffer: &'a RenderBuffer,
    aligned: u64,
    delay: usize,
    active: bool,
    x2_max: &'a Spectrum,
}

impl FullChannel {
    fn new(config: &EchoCancellerConfig, num_partitions: usize, backend: SimdBackend) -> Self {
        Self {
            filter: AdaptiveFirFilter::new(num_partitions, &config.filter, backend),
            erle: SubbandErleEstimator::new(&config.erle),
            double_talk: DoubleTalkDetector::new(&config.double_talk),
            residual_echo: ResidualEchoEstimator::new(&config.suppressor),
            suppression_gain: SuppressionGain::new(&config.suppressor),
            suppression_filter: SuppressionFilter::new(),
            comfort_noise: ComfortNoiseGenerator::new(&config.comfort_noise, backend),
            previous_capture: [0.0; BLOCK_SIZE],
            previous_error: [0.0; BLOCK_SIZE],
            previous_echo: [0.0; BLOCK_SIZE],
            capture_smoothed: 0.0,
            error_smoothed: 0.0,
            converged: false,
            divergent_run: 0,
            divergence_factor: config.filter.divergence_factor,
            divergence_blocks: config.filter.divergence_blocks,
        }
    }

    fn reset_filter(&mut self) {
        self.filter.reset();
        self.erle.reset();
        self.double_talk.reset();
        self.capture_smoothed = 0.0;
        self.error_smoothed = 0.0;
        self.converged = false;
        self.divergent_run = 0;
    }

    /// Returns true if the linear filter made this block louder.
    fn process(
        &mut self,
        fft: &mut AecFft,
        render: &RenderView<'_>,
        capture: &Block,
        linear: &mut Block,
        output: &mut Block,
    ) -> bool {
        let mut echo = [0.0; BLOCK_SIZE];
        self.filter
            .estimate_echo(render.buffer, render.aligned, render.delay, fft, &mut echo);
        for ((e, &y), &s) in linear.iter_mut().zip(capture).zip(&echo) {
            *e = y - s;
        }

        let capture_power = power(capture);
        let error_power = power(linear);
        let divergent =
            error_power > capture_power * self.divergence_factor && error_power > DIVERGENCE_FLOOR;
        if divergent {
            self.divergent_run += 1;
            if self.divergent_run >= self.divergence_blocks {
                tracing::warn!(blocks = self.divergent_run, "echo filter diverged, resetting");
                self.reset_filter();
            }
        } else {
            self.divergent_run = 0;
        }

        if render.active && !self.double_talk.active() {
            let mut error = FftData::default();
            fft.zero_padded_fft(linear, &mut error);
            self.filter
                .adapt(render.buffer, render.aligned, render.delay, &error, fft);
            self.capture_smoothed += 0.1 * (capture_power - self.capture_smoothed);
            self.error_smoothed += 0.1 * (error_power - self.error_smoothed);
            self.converged = self.capture_smoothed > CONVERGED_RATIO * self.error_smoothed;
        }
        if error_power > capture_power {
            linear.copy_from_slice(capture);
        }

        let mut capture_fft = FftData::default();
        let mut error_fft = FftData::default();
        let mut echo_fft = FftData::default();
        fft.padded_fft(capture, &self.previous_capture, true, &mut capture_fft);
        fft.padded_fft(linear, &self.previous_error, true, &mut error_fft);
        fft.padded_fft(&echo, &self.previous_echo, true, &mut echo_fft);
        let mut y2 = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        let mut e2 = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        let mut s2 = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        capture_fft.spectrum(&mut y2);
        error_fft.spectrum(&mut e2);
        echo_fft.spectrum(&mut s2);

        let x2 = render.buffer.spectrum(render.aligned, render.delay);
        self.erle.update(x2, &y2, &e2, self.converged);
        let mut r2 = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        self.residual_echo
            .estimate(self.converged, &s2, self.erle.erle(true), render.x2_max, &mut r2);
        let nearend = self.double_talk.update(self.converged, &e2, &r2);
        let gain = self.suppression_gain.compute(&e2, &r2, nearend);

        let saturated = capture.iter().any(|y| y.abs() >= SATURATION_THRESHOLD);
        let mut noise = FftData::default();
        self.comfort_noise.compute(saturated, &y2, &e2, &mut noise);
        self.suppression_filter
            .apply(fft, &error_fft, gain, &noise, output);

        self.previous_capture = *capture;
        self.previous_error = *linear;
        self.previous_echo = echo;
        divergent
    }

    fn erl(&self) -> f32 {
        let mut erl = [0.0; FFT_LENGTH_BY_2_PLUS_1];
        self.filter.erl(&mut erl);
        erl.iter().sum::<f32>() / FFT_LENGTH_BY_2_PLUS_1 as f32
    }
}

#[derive(Debug)]
enum Channels {
    Full(Vec<FullChannel>),
    Mobile(Vec<MobileCanceller>),
}

/// Acoustic echo canceller for one render stream and a multi-channel
/// capture stream.
///
/// Audio is float S16 in 10 ms frames. The render stream is downmixed to
/// mono. Capture output lags the input by one block (64 samples), plus one
/// more in full mode where the suppressor resynthesizes the signal with an
/// overlap-add. The linear output lags by one block in both modes.
#[derive(derive_more::Debug)]
pub struct EchoCanceller {
    config: EchoCancellerConfig,
    mobile_mode: bool,
    sample_rate_hz: u32,
    num_channels: usize,
    #[debug(skip)]
    fft: AecFft,
    #[debug(skip)]
    render_blocker: FrameBlocker,
    #[debug(skip)]
    render_mono: ChannelBuffer<f32>,
    #[debug(skip)]
    capture_blocker: FrameBlocker,
    #[debug(skip)]
    output_framer: BlockFramer,
    #[debug(skip)]
    linear_framer: BlockFramer,
    #[debug(skip)]
    linear_scratch: ChannelBuffer<f32>,
    #[debug(skip)]
    render_buffer: RenderBuffer,
    delay_estimator: DelayEstimator,
    max_delay_blocks: usize,
    delay_hint_blocks: usize,
    delay_blocks: usize,
    capture_blocks: u64,
    #[debug(skip)]
    capture: Vec<Block>,
    #[debug(skip)]
    linear: Vec<Block>,
    #[debug(skip)]
    output: Vec<Block>,
    channels: Channels,
    metrics: EchoRemoverMetrics,
}

impl EchoCanceller {
    pub fn new(
        config: &EchoCancellerConfig,
        mobile_mode: bool,
        sample_rate_hz: u32,
        num_capture_channels: usize,
    ) -> Self {
        let mut config = config.clone();
        if config.validate() {
            tracing::warn!(?config, "echo canceller config out of range, clamped");
        }
        let num_channels = num_capture_channels.max(1);
        let backend = clarion_simd::detect_backend();
        let max_delay_blocks = blocks_for_ms(config.delay.max_delay_ms, sample_rate_hz);
        let num_partitions = if mobile_mode {
            1
        } else {
            blocks_for_ms(config.filter.length_ms, sample_rate_hz).max(1)
        };
        let channels = if mobile_mode {
            Channels::Mobile(
                (0..num_channels)
                    .map(|_| MobileCanceller::new(&config.mobile, &config.filter, sample_rate_hz, backend))
                    .collect(),
            )
        } else {
            Channels::Full(
                (0..num_channels)
                    .map(|_| FullChannel::new(&config, num_partitions, backend))
                    .collect(),
            )
        };
        tracing::debug!(
            sample_rate_hz,
            num_channels,
            mobile_mode,
            num_partitions,
            max_delay_blocks,
            simd = backend.name(),
            "echo canceller initialized"
        );
        Self {
            delay_estimator: DelayEstimator::new(&config.delay, sample_rate_hz, backend),
            render_buffer: RenderBuffer::new(
                max_delay_blocks + num_partitions + 1,
                blocks_for_ms(RENDER_LOOKAHEAD_MS, sample_rate_hz),
            ),
            config,
            mobile_mode,
            sample_rate_hz,
            num_channels,
            fft: AecFft::new(),
            render_blocker: FrameBlocker::new(1),
            render_mono: ChannelBuffer::new(sample_rate_hz as usize / 100, 1),
            capture_blocker: FrameBlocker::new(num_channels),
            output_framer: BlockFramer::new(num_channels),
            linear_framer: BlockFramer::new(num_channels),
            linear_scratch: ChannelBuffer::new(sample_rate_hz as usize / 100, num_channels),
            max_delay_blocks,
            delay_hint_blocks: 0,
            delay_blocks: 0,
            capture_blocks: 0,
            capture: vec![[0.0; BLOCK_SIZE]; num_channels],
            linear: vec![[0.0; BLOCK_SIZE]; num_channels],
            output: vec![[0.0; BLOCK_SIZE]; num_channels],
            channels,
            metrics: EchoRemoverMetrics::new(),
        }
    }

    pub fn config(&self) -> &EchoCancellerConfig {
        &self.config
    }

    pub fn mobile_mode(&self) -> bool {
        self.mobile_mode
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Buffers one render frame as the echo reference.
    pub fn analyze_render(&mut self, render: &ChannelBuffer<f32>) {
        if self.render_mono.num_frames() != render.num_frames() {
            self.render_mono = ChannelBuffer::new(render.num_frames(), 1);
        }
        downmix_to_mono(&render.as_slices(), self.render_mono.channel_mut(0));
        self.render_blocker.insert_frame(&self.render_mono);
        let mut block = [[0.0; BLOCK_SIZE]];
        while self.render_blocker.extract_block(&mut block) {
            self.render_buffer.insert(&block[0], &mut self.fft);
        }
    }

    /// Removes the echo from one capture frame in place. The output of the
    /// linear filter alone is written to `linear_output` when given.
    pub fn process_capture(
        &mut self,
        capture: &mut ChannelBuffer<f32>,
        linear_output: Option<&mut ChannelBuffer<f32>>,
    ) {
        debug_assert_eq!(capture.num_channels(), self.num_channels);
        self.capture_blocker.insert_frame(capture);
        while self.capture_blocker.extract_block(&mut self.capture) {
            self.process_block();
            self.output_framer.insert_block(&self.output);
            self.linear_framer.insert_block(&self.linear);
        }
        self.output_framer.extract_frame(capture);
        match linear_output {
            Some(linear) => self.linear_framer.extract_frame(linear),
            None => {
                if self.linear_scratch.num_frames() != capture.num_frames() {
                    self.linear_scratch = ChannelBuffer::new(capture.num_frames(), self.num_channels);
                }
                self.linear_framer.extract_frame(&mut self.linear_scratch);
            }
        }
    }

    /// Delay between render and capture reported by the audio device. Used
    /// until the delay estimator has locked on.
    pub fn set_audio_buffer_delay(&mut self, delay_ms: usize) {
        self.delay_hint_blocks =
            (delay_ms * self.sample_rate_hz as usize / 1000 / BLOCK_SIZE).min(self.max_delay_blocks);
    }

    /// Render-to-capture delay currently compensated, milliseconds.
    pub fn delay_ms(&self) -> i32 {
        let samples = match self.delay_estimator.estimate() {
            Some(lag) => lag,
            None => self.delay_blocks * BLOCK_SIZE,
        };
        (samples * 1000 / self.sample_rate_hz.max(1) as usize) as i32
    }

    /// Latest metrics snapshot, once a full reporting interval has passed.
    pub fn metrics(&self) -> Option<EchoMetrics> {
        self.metrics.reported().map(|metrics| EchoMetrics {
            delay_ms: self.delay_ms(),
            ..metrics
        })
    }

    fn process_block(&mut self) {
        if self.render_buffer.is_empty() {
            self.render_buffer.insert(&[0.0; BLOCK_SIZE], &mut self.fft);
        }
        let aligned = self.render_buffer.align(self.capture_blocks).unwrap_or_default();
        self.capture_blocks += 1;

        let estimate = self
            .delay_estimator
            .update(self.render_buffer.block(aligned, 0), &self.capture[0]);
        let delay = estimate
            .map_or(self.delay_hint_blocks, |lag| {
                lag.saturating_sub(self.config.delay.headroom_samples) / BLOCK_SIZE
            })
            .min(self.max_delay_blocks);
        if delay != self.delay_blocks {
            tracing::debug!(from = self.delay_blocks, to = delay, "echo path delay changed, resetting filters");
            self.delay_blocks = delay;
            match &mut self.channels {
                Channels::Full(channels) => channels.iter_mut().for_each(FullChannel::reset_filter),
                Channels::Mobile(channels) => channels.iter_mut().for_each(MobileCanceller::reset_filter),
            }
        }

        let divergent = match &mut self.channels {
            Channels::Full(channels) => {
                let num_partitions = channels.first().map_or(1, |c| c.filter.num_partitions());
                let mut x2_max = [0.0f32; FFT_LENGTH_BY_2_PLUS_1];
                for p in 0..num_partitions {
                    for (m, &x) in x2_max.iter_mut().zip(self.render_buffer.spectrum(aligned, delay + p)) {
                        *m = m.max(x);
                    }
                }
                let x2 = self.render_buffer.spectrum(aligned, delay);
                let render = RenderView {
                    buffer: &self.render_buffer,
                    aligned,
                    delay,
                    active: x2.iter().sum::<f32>() / FFT_LENGTH_BY_2_PLUS_1 as f32
                        > self.config.filter.noise_gate,
                    x2_max: &x2_max,
                };
                let mut divergent = false;
                for (ch, channel) in channels.iter_mut().enumerate() {
                    let d = channel.process(
                        &mut self.fft,
                        &render,
                        &self.capture[ch],
                        &mut self.linear[ch],
                        &mut self.output[ch],
                    );
                    divergent |= ch == 0 && d;
                }
                divergent
            }
            Channels::Mobile(channels) => {
                let render = self.render_buffer.block(aligned, delay);
                let mut divergent = false;
                for (ch, channel) in channels.iter_mut().enumerate() {
                    let block = channel.process(
                        render,
                        &self.capture[ch],
                        &mut self.linear[ch],
                        &mut self.output[ch],
                    );
                    divergent |= ch == 0 && block.divergent;
                }
                divergent
            }
        };

        let delay_ms = self.delay_ms();
        let channels = &self.channels;
        self.metrics.update(
            power(&self.capture[0]),
            power(&self.output[0]),
            divergent,
            delay_ms,
            || match channels {
                Channels::Full(channels) => channels.first().map_or(1.0, FullChannel::erl),
                Channels::Mobile(channels) => channels.first().map_or(1.0, MobileCanceller::energy),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_in_silence_out() {
        for mobile_mode in [false, true] {
            let mut aec = EchoCanceller::new(&EchoCancellerConfig::default(), mobile_mode, 16000, 2);
            let render = ChannelBuffer::<f32>::new(160, 1);
            let mut capture = ChannelBuffer::<f32>::new(160, 2);
            for _ in 0..50 {
                aec.analyze_render(&render);
                aec.process_capture(&mut capture, None);
                assert!(capture.channels().flatten().all(|x| x.abs() < 1.0));
            }
        }
    }

    #[test]
    fn missing_render_is_treated_as_silence() {
        let mut aec = EchoCanceller::new(&EchoCancellerConfig::default(), false, 16000, 1);
        let mut capture = ChannelBuffer::<f32>::new(160, 1);
        let mut linear = ChannelBuffer::<f32>::new(160, 1);
        for _ in 0..20 {
            for (i, x) in capture.channel_mut(0).iter_mut().enumerate() {
                *x = 1000.0 * (i as f32 * 0.1).sin();
            }
            aec.process_capture(&mut capture, Some(&mut linear));
        }
        // The linear output is the capture, one block late.
        let expected = 1000.0 * ((100 - BLOCK_SIZE) as f32 * 0.1).sin();
        assert!((linear.channel(0)[100] - expected).abs() < 1e-2);
    }

    #[test]
    fn delay_hint_is_bounded() {
        let mut aec = EchoCanceller::new(&EchoCancellerConfig::default(), true, 16000, 1);
        aec.set_audio_buffer_delay(40);
        let render = ChannelBuffer::<f32>::new(160, 1);
        let mut capture = ChannelBuffer::<f32>::new(160, 1);
        aec.analyze_render(&render);
        aec.process_capture(&mut capture, None);
        assert_eq!(aec.delay_ms(), 40);
        aec.set_audio_buffer_delay(100_000);
        aec.analyze_render(&render);
        aec.process_capture(&mut capture, None);
        assert_eq!(aec.delay_ms(), 400);
        assert_eq!(aec.metrics(), None);
    }
}
