//! Capture and render pipelines behind [`AudioProcessing`](crate::AudioProcessing).
//!
//! Owns the stream formats, the audio buffers and every submodule, and
//! runs the fixed chain once per 10 ms capture frame: high-pass filter,
//! echo canceller, noise suppressor, gain controller 1, gain controller 2.
//! Callers validate frames before handing them in; nothing here fails
//! half-way through a frame.

use clarion_aec::{EchoCanceller, EchoCancellerConfig};
use clarion_agc::GainController1;
use clarion_agc2::GainController2;
use clarion_common_audio::audio_util::float_s16_to_float;
use clarion_common_audio::channel_buffer::ChannelBuffer;
use clarion_ns::NoiseSuppressor;

use crate::Error;
use crate::audio_buffer::AudioBuffer;
use crate::config::{Config, GainController1Mode, MaxProcessingRate};
use crate::high_pass_filter::HighPassFilter;
use crate::render_queue::{MAX_NUM_FRAMES_TO_BUFFER, RenderQueue};
use crate::rms_level::RmsLevel;
use crate::stats::AudioProcessingStats;
use crate::stream_config::StreamConfig;

/// Candidate processing rates, lowest first.
const NATIVE_PROCESSING_RATES: [u32; 3] = [16000, 32000, 48000];

// ─── ProcessingConfig ────────────────────────────────────────────────

/// The four streams handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ProcessingConfig {
    pub(crate) capture_input: StreamConfig,
    pub(crate) capture_output: StreamConfig,
    pub(crate) render_input: StreamConfig,
    pub(crate) render_output: StreamConfig,
}

impl ProcessingConfig {
    /// Same format on both sides of both streams.
    pub(crate) fn symmetric(capture: StreamConfig, render: StreamConfig) -> Self {
        Self {
            capture_input: capture,
            capture_output: capture,
            render_input: render,
            render_output: render,
        }
    }
}

// ─── Streams ─────────────────────────────────────────────────────────

/// Buffers sized for one [`ProcessingConfig`].
#[derive(Debug)]
struct Streams {
    api: ProcessingConfig,
    proc_rate_hz: u32,
    proc_channels: usize,
    capture_audio: AudioBuffer,
    render_audio: AudioBuffer,
    // Present when the render output format differs from the input.
    render_converter: Option<AudioBuffer>,
}

impl Streams {
    fn new(api: ProcessingConfig, max_rate: MaxProcessingRate) -> Result<Self, Error> {
        let capture_in = api.capture_input;
        let capture_out = api.capture_output;
        let render_in = api.render_input;
        let render_out = api.render_output;

        let min_rate = capture_in
            .sample_rate_hz()
            .min(capture_out.sample_rate_hz())
            .min(render_in.sample_rate_hz());
        let proc_rate_hz = suitable_process_rate(min_rate, max_rate.as_hz());
        let proc_channels = usize::from(capture_out.num_channels());
        let render_channels = usize::from(render_in.num_channels());

        let capture_audio = AudioBuffer::new(
            capture_in.sample_rate_hz(),
            usize::from(capture_in.num_channels()),
            proc_rate_hz,
            proc_channels,
            capture_out.sample_rate_hz(),
        )?;
        let render_audio = AudioBuffer::new(
            render_in.sample_rate_hz(),
            render_channels,
            proc_rate_hz,
            render_channels,
            proc_rate_hz,
        )?;
        let render_converter = if render_in == render_out {
            None
        } else {
            Some(AudioBuffer::new(
                render_in.sample_rate_hz(),
                render_channels,
                render_out.sample_rate_hz(),
                usize::from(render_out.num_channels()),
                render_out.sample_rate_hz(),
            )?)
        };

        tracing::debug!(
            capture_rate_hz = capture_in.sample_rate_hz(),
            render_rate_hz = render_in.sample_rate_hz(),
            proc_rate_hz,
            proc_channels,
            "processing format selected"
        );
        Ok(Self {
            api,
            proc_rate_hz,
            proc_channels,
            capture_audio,
            render_audio,
            render_converter,
        })
    }

    fn reset(&mut self) {
        self.capture_audio.reset();
        self.render_audio.reset();
        if let Some(converter) = &mut self.render_converter {
            converter.reset();
        }
    }
}

// ─── Capture / Render State ──────────────────────────────────────────

#[derive(Debug, Default)]
struct CaptureState {
    linear_output: Option<ChannelBuffer<f32>>,
    output_level: RmsLevel,
    stats: AudioProcessingStats,
    stream_delay_ms: Option<i32>,
    analog_level: Option<i32>,
    key_pressed: bool,
}

#[derive(derive_more::Debug)]
struct RenderState {
    queue: RenderQueue,
    // Reference fed to the echo canceller on ticks without render audio.
    #[debug(skip)]
    silence: ChannelBuffer<f32>,
}

impl RenderState {
    fn new(streams: &Streams) -> Self {
        let num_frames = streams.render_audio.num_frames();
        Self {
            queue: RenderQueue::new(
                MAX_NUM_FRAMES_TO_BUFFER,
                num_frames,
                streams.render_audio.num_channels(),
            ),
            silence: ChannelBuffer::new(num_frames, 1),
        }
    }
}

// ─── Submodules ──────────────────────────────────────────────────────

/// Every optional processing stage. `None` / empty means disabled.
#[derive(Debug, Default)]
struct Submodules {
    high_pass_filter: Option<HighPassFilter>,
    echo_canceller: Option<EchoCanceller>,
    noise_suppressors: Vec<NoiseSuppressor>,
    gain_controller1: Option<GainController1>,
    gain_controller2: Option<GainController2>,
}

// ─── AudioProcessingImpl ─────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct AudioProcessingImpl {
    config: Config,
    streams: Streams,
    capture: CaptureState,
    render: RenderState,
    submodules: Submodules,
}

impl AudioProcessingImpl {
    pub(crate) fn new(config: Config, api: ProcessingConfig) -> Result<Self, Error> {
        config.validate()?;
        let streams = Streams::new(api, config.pipeline.maximum_internal_processing_rate)?;
        let mut apm = Self {
            config,
            render: RenderState::new(&streams),
            streams,
            capture: CaptureState::default(),
            submodules: Submodules::default(),
        };
        apm.initialize_submodules();
        Ok(apm)
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn api_format(&self) -> &ProcessingConfig {
        &self.streams.api
    }

    pub(crate) fn proc_sample_rate_hz(&self) -> u32 {
        self.streams.proc_rate_hz
    }

    pub(crate) fn proc_num_channels(&self) -> usize {
        self.streams.proc_channels
    }

    pub(crate) fn statistics(&self) -> AudioProcessingStats {
        self.capture.stats
    }

    /// Clears all adaptive state. Formats, config and stream parameters are
    /// kept.
    pub(crate) fn initialize(&mut self) {
        self.streams.reset();
        self.initialize_submodules();
    }

    /// Applies `config`, re-creating only the submodules whose settings
    /// changed. The previous config stays in place on error.
    pub(crate) fn apply_config(&mut self, config: Config) -> Result<(), Error> {
        config.validate()?;

        if self.config.pipeline != config.pipeline {
            let streams = Streams::new(
                self.streams.api,
                config.pipeline.maximum_internal_processing_rate,
            )?;
            tracing::debug!(pipeline = ?config.pipeline, "pipeline changed, reinitializing");
            self.config = config;
            self.install(streams);
            return Ok(());
        }

        let old = &self.config;
        let ec_changed = old.echo_canceller.enabled != config.echo_canceller.enabled
            || old.echo_canceller.mobile_mode != config.echo_canceller.mobile_mode;
        let ns_changed = old.noise_suppression.enabled != config.noise_suppression.enabled
            || old.noise_suppression.level != config.noise_suppression.level;
        let agc1_changed = old.gain_controller1 != config.gain_controller1;
        let agc2_changed = old.gain_controller2 != config.gain_controller2;
        self.config = config;

        if ec_changed {
            self.initialize_echo_canceller();
        }
        if ns_changed {
            self.initialize_noise_suppressors();
        }
        self.initialize_high_pass_filter(false);
        if agc1_changed {
            self.initialize_gain_controller1();
        }
        if agc2_changed {
            self.initialize_gain_controller2();
        }
        self.allocate_linear_output();
        tracing::debug!(ec_changed, ns_changed, agc1_changed, agc2_changed, "config applied");
        Ok(())
    }

    /// Rebuilds the buffers if the capture format changed.
    pub(crate) fn maybe_initialize_capture(
        &mut self,
        input: &StreamConfig,
        output: &StreamConfig,
    ) -> Result<(), Error> {
        let api = self.streams.api;
        if api.capture_input == *input && api.capture_output == *output {
            return Ok(());
        }
        self.reinitialize(ProcessingConfig {
            capture_input: *input,
            capture_output: *output,
            ..api
        })
    }

    /// Rebuilds the buffers if the render format changed.
    pub(crate) fn maybe_initialize_render(
        &mut self,
        input: &StreamConfig,
        output: &StreamConfig,
    ) -> Result<(), Error> {
        let api = self.streams.api;
        if api.render_input == *input && api.render_output == *output {
            return Ok(());
        }
        self.reinitialize(ProcessingConfig {
            render_input: *input,
            render_output: *output,
            ..api
        })
    }

    // ─── Stream parameters ───────────────────────────────────────

    pub(crate) fn set_stream_delay_ms(&mut self, delay_ms: i32) {
        self.capture.stream_delay_ms = Some(delay_ms);
    }

    pub(crate) fn stream_delay_ms(&self) -> i32 {
        self.capture.stream_delay_ms.unwrap_or(0)
    }

    pub(crate) fn set_stream_analog_level(&mut self, level: i32) {
        self.capture.analog_level = Some(level);
        if let Some(agc) = &mut self.submodules.gain_controller1 {
            agc.set_stream_analog_level(level);
        }
    }

    pub(crate) fn recommended_stream_analog_level(&self) -> i32 {
        match &self.submodules.gain_controller1 {
            Some(agc) => agc.recommended_analog_level(),
            None => self.capture.analog_level.unwrap_or(0),
        }
    }

    pub(crate) fn set_stream_key_pressed(&mut self, pressed: bool) {
        self.capture.key_pressed = pressed;
        if let Some(agc) = &mut self.submodules.gain_controller1 {
            agc.set_key_pressed(pressed);
        }
    }

    /// Per-frame parameters the enabled submodules depend on.
    pub(crate) fn check_stream_parameters(&self) -> Result<(), Error> {
        let agc1 = &self.config.gain_controller1;
        if agc1.enabled
            && agc1.mode == GainController1Mode::AdaptiveAnalog
            && self.capture.analog_level.is_none()
        {
            return Err(Error::StreamParameterNotSet);
        }
        Ok(())
    }

    // ─── Processing ──────────────────────────────────────────────

    pub(crate) fn process_stream_f32(
        &mut self,
        src: &[&[f32]],
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        self.streams.capture_audio.copy_from_float(src);
        let result = self.process_capture();
        self.streams.capture_audio.copy_to_float(dest);
        result
    }

    pub(crate) fn process_stream_i16(&mut self, src: &[i16], dest: &mut [i16]) -> Result<(), Error> {
        self.streams.capture_audio.copy_from_interleaved_i16(src);
        let result = self.process_capture();
        let num_channels = usize::from(self.streams.api.capture_output.num_channels());
        self.streams
            .capture_audio
            .copy_to_interleaved_i16(dest, num_channels);
        result
    }

    pub(crate) fn process_stream_i16_in_place(&mut self, frame: &mut [i16]) -> Result<(), Error> {
        self.streams.capture_audio.copy_from_interleaved_i16(frame);
        let result = self.process_capture();
        let num_channels = usize::from(self.streams.api.capture_output.num_channels());
        self.streams
            .capture_audio
            .copy_to_interleaved_i16(frame, num_channels);
        result
    }

    pub(crate) fn analyze_reverse_stream_f32(&mut self, src: &[&[f32]]) {
        self.streams.render_audio.copy_from_float(src);
        self.queue_render();
    }

    pub(crate) fn analyze_reverse_stream_i16(&mut self, src: &[i16]) {
        self.streams.render_audio.copy_from_interleaved_i16(src);
        self.queue_render();
    }

    pub(crate) fn process_reverse_stream_f32(&mut self, src: &[&[f32]], dest: &mut [&mut [f32]]) {
        self.analyze_reverse_stream_f32(src);
        match &mut self.streams.render_converter {
            Some(converter) => {
                converter.copy_from_float(src);
                converter.copy_to_float(dest);
            }
            None => {
                for (out, channel) in dest.iter_mut().zip(src) {
                    out.copy_from_slice(channel);
                }
            }
        }
    }

    /// Writes the linear echo canceller output of the last capture frame,
    /// one slice per processing channel at the processing rate.
    pub(crate) fn linear_aec_output(&self, dest: &mut [&mut [f32]]) -> Result<(), Error> {
        let linear = self
            .capture
            .linear_output
            .as_ref()
            .filter(|_| self.config.echo_canceller.export_linear_aec_output)
            .ok_or(Error::NotEnabled)?;
        if dest.len() != linear.num_channels() {
            return Err(Error::BadChannelCount {
                expected: linear.num_channels(),
                actual: dest.len(),
            });
        }
        for (out, channel) in dest.iter_mut().zip(linear.channels()) {
            if out.len() != channel.len() {
                return Err(Error::BadDataLength {
                    expected: channel.len(),
                    actual: out.len(),
                });
            }
        }
        for (out, channel) in dest.iter_mut().zip(linear.channels()) {
            for (d, &x) in out.iter_mut().zip(channel) {
                *d = float_s16_to_float(x);
            }
        }
        Ok(())
    }

    fn queue_render(&mut self) {
        if self.submodules.echo_canceller.is_some() {
            self.render.queue.push(self.streams.render_audio.data());
        }
    }

    fn process_capture(&mut self) -> Result<(), Error> {
        self.run_capture_chain();

        let audio = self.streams.capture_audio.data_mut();
        let finite = audio.channels().all(|c| c.iter().all(|x| x.is_finite()));
        if !finite {
            audio.fill(0.0);
            tracing::warn!("non-finite capture output, muting frame and resetting adaptive state");
            self.initialize_submodules();
            return Err(Error::Internal("non-finite capture output"));
        }

        let level = &mut self.capture.output_level;
        for channel in audio.channels() {
            level.analyze_float_s16(channel);
        }
        self.capture.stats.output_rms_dbfs = Some(level.average());
        self.update_statistics();
        Ok(())
    }

    fn run_capture_chain(&mut self) {
        let Self {
            config,
            streams,
            capture,
            render,
            submodules,
        } = self;
        let audio = streams.capture_audio.data_mut();

        if let Some(ec) = &mut submodules.echo_canceller {
            if render.queue.is_empty() {
                ec.analyze_render(&render.silence);
            } else {
                render.queue.drain(|frame| ec.analyze_render(frame));
            }
            if let Some(delay_ms) = capture.stream_delay_ms {
                ec.set_audio_buffer_delay(usize::try_from(delay_ms).unwrap_or(0));
            }
        }

        if let Some(hpf) = &mut submodules.high_pass_filter {
            hpf.process(audio);
        }

        if let Some(agc) = &mut submodules.gain_controller1 {
            agc.analyze(audio);
        }

        let analyze_linear = config.noise_suppression.analyze_linear_aec_output_when_available
            && capture.linear_output.is_some();
        if !analyze_linear {
            for (ch, ns) in submodules.noise_suppressors.iter_mut().enumerate() {
                ns.analyze(audio.channel(ch));
            }
        }

        if let Some(ec) = &mut submodules.echo_canceller {
            ec.process_capture(audio, capture.linear_output.as_mut());
        }

        if let Some(linear) = capture.linear_output.as_ref().filter(|_| analyze_linear) {
            for (ch, ns) in submodules.noise_suppressors.iter_mut().enumerate() {
                ns.analyze(linear.channel(ch));
            }
        }
        for (ch, ns) in submodules.noise_suppressors.iter_mut().enumerate() {
            ns.process(audio.channel_mut(ch));
        }

        if let Some(agc) = &mut submodules.gain_controller1 {
            agc.process(audio);
        }
        if let Some(agc) = &mut submodules.gain_controller2 {
            agc.process(audio);
        }
    }

    fn update_statistics(&mut self) {
        let stats = &mut self.capture.stats;
        if let Some(ec) = &self.submodules.echo_canceller {
            if let Some(metrics) = ec.metrics() {
                stats.echo_return_loss = Some(metrics.echo_return_loss_db);
                stats.echo_return_loss_enhancement = Some(metrics.echo_return_loss_enhancement_db);
                stats.divergent_filter_fraction = Some(metrics.divergent_filter_fraction);
            }
            stats.delay_ms = Some(ec.delay_ms());
        }
        stats.speech_probability = self
            .submodules
            .gain_controller2
            .as_ref()
            .filter(|agc| agc.speech_level_dbfs().is_some())
            .map(GainController2::last_speech_probability);
    }

    // ─── Initialization internals ────────────────────────────────

    fn reinitialize(&mut self, api: ProcessingConfig) -> Result<(), Error> {
        let streams = Streams::new(api, self.config.pipeline.maximum_internal_processing_rate)?;
        tracing::debug!(?api, "stream format changed, reinitializing");
        self.install(streams);
        Ok(())
    }

    fn install(&mut self, streams: Streams) {
        self.render = RenderState::new(&streams);
        self.streams = streams;
        self.initialize_submodules();
    }

    fn initialize_submodules(&mut self) {
        self.initialize_high_pass_filter(true);
        self.initialize_echo_canceller();
        self.initialize_noise_suppressors();
        self.initialize_gain_controller1();
        self.initialize_gain_controller2();
        self.allocate_linear_output();
        self.capture.output_level.reset();
        self.capture.stats = AudioProcessingStats::default();
    }

    fn initialize_high_pass_filter(&mut self, forced_reset: bool) {
        if !self.config.high_pass_filter_active() {
            self.submodules.high_pass_filter = None;
            return;
        }
        let rate = self.proc_sample_rate_hz();
        let num_channels = self.proc_num_channels();
        let reusable = !forced_reset
            && self
                .submodules
                .high_pass_filter
                .as_ref()
                .is_some_and(|hpf| hpf.sample_rate_hz() == rate && hpf.num_channels() == num_channels);
        if !reusable {
            self.submodules.high_pass_filter = Some(HighPassFilter::new(rate, num_channels));
        }
    }

    fn initialize_echo_canceller(&mut self) {
        self.render.queue.clear();
        let ec = &self.config.echo_canceller;
        self.submodules.echo_canceller = ec.enabled.then(|| {
            EchoCanceller::new(
                &EchoCancellerConfig::default(),
                ec.mobile_mode,
                self.streams.proc_rate_hz,
                self.streams.proc_channels,
            )
        });
    }

    fn initialize_noise_suppressors(&mut self) {
        let ns = &self.config.noise_suppression;
        self.submodules.noise_suppressors = if ns.enabled {
            (0..self.streams.proc_channels)
                .map(|_| NoiseSuppressor::new(ns.to_ns_config(), self.streams.proc_rate_hz))
                .collect()
        } else {
            Vec::new()
        };
    }

    fn initialize_gain_controller1(&mut self) {
        let agc1 = &self.config.gain_controller1;
        self.submodules.gain_controller1 = agc1.enabled.then(|| {
            let mut agc = GainController1::new(agc1.to_agc1_config());
            if let Some(level) = self.capture.analog_level {
                agc.set_stream_analog_level(level);
            }
            agc.set_key_pressed(self.capture.key_pressed);
            agc
        });
    }

    fn initialize_gain_controller2(&mut self) {
        let agc2 = &self.config.gain_controller2;
        self.submodules.gain_controller2 = agc2.enabled.then(|| {
            GainController2::new(
                agc2.to_agc2_config(),
                self.streams.proc_rate_hz,
                self.streams.proc_channels,
            )
        });
    }

    fn allocate_linear_output(&mut self) {
        self.capture.linear_output = self.config.linear_aec_output_needed().then(|| {
            ChannelBuffer::new(
                self.streams.capture_audio.num_frames(),
                self.streams.proc_channels,
            )
        });
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Lowest native rate that covers `minimum_rate`, capped at `max_rate`.
fn suitable_process_rate(minimum_rate: u32, max_rate: u32) -> u32 {
    NATIVE_PROCESSING_RATES
        .into_iter()
        .find(|&rate| rate >= minimum_rate)
        .unwrap_or(48000)
        .min(max_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EchoCanceller, GainController2 as Gc2Config, NoiseSuppression};

    fn mono(rate: u32) -> ProcessingConfig {
        ProcessingConfig::symmetric(StreamConfig::new(rate, 1), StreamConfig::new(rate, 1))
    }

    fn apm(config: Config) -> AudioProcessingImpl {
        AudioProcessingImpl::new(config, mono(16000)).unwrap()
    }

    #[test]
    fn suitable_process_rate_picks_the_lowest_covering_rate() {
        assert_eq!(suitable_process_rate(8000, 32000), 16000);
        assert_eq!(suitable_process_rate(16000, 32000), 16000);
        assert_eq!(suitable_process_rate(24000, 32000), 32000);
        assert_eq!(suitable_process_rate(44100, 32000), 32000);
        assert_eq!(suitable_process_rate(44100, 48000), 48000);
        assert_eq!(suitable_process_rate(96000, 48000), 48000);
    }

    #[test]
    fn processing_rate_follows_the_slowest_stream() {
        let api = ProcessingConfig {
            render_input: StreamConfig::new(8000, 1),
            render_output: StreamConfig::new(8000, 1),
            ..mono(48000)
        };
        let apm = AudioProcessingImpl::new(Config::default(), api).unwrap();
        assert_eq!(apm.proc_sample_rate_hz(), 16000);
    }

    #[test]
    fn create_default() {
        let apm = apm(Config::default());
        assert!(apm.submodules.high_pass_filter.is_none());
        assert!(apm.submodules.echo_canceller.is_none());
        assert!(apm.submodules.noise_suppressors.is_empty());
        assert!(apm.submodules.gain_controller1.is_none());
        assert!(apm.submodules.gain_controller2.is_none());
        assert!(apm.capture.linear_output.is_none());
    }

    #[test]
    fn echo_canceller_brings_the_high_pass_filter() {
        let mut config = Config::default();
        config.echo_canceller.enabled = true;
        let apm = apm(config);
        assert!(apm.submodules.echo_canceller.is_some());
        assert!(apm.submodules.high_pass_filter.is_some());
    }

    #[test]
    fn one_noise_suppressor_per_processing_channel() {
        let mut config = Config::default();
        config.noise_suppression.enabled = true;
        let stereo = StreamConfig::new(32000, 2);
        let apm = AudioProcessingImpl::new(config, ProcessingConfig::symmetric(stereo, stereo)).unwrap();
        assert_eq!(apm.submodules.noise_suppressors.len(), 2);
        assert_eq!(apm.proc_num_channels(), 2);
    }

    #[test]
    fn apply_config_toggles_submodules() {
        let mut apm = apm(Config::default());
        let config = Config {
            echo_canceller: EchoCanceller {
                enabled: true,
                export_linear_aec_output: true,
                ..Default::default()
            },
            noise_suppression: NoiseSuppression {
                enabled: true,
                ..Default::default()
            },
            gain_controller2: Gc2Config {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        apm.apply_config(config).unwrap();
        assert!(apm.submodules.echo_canceller.is_some());
        assert_eq!(apm.submodules.noise_suppressors.len(), 1);
        assert!(apm.submodules.gain_controller2.is_some());
        assert!(apm.capture.linear_output.is_some());

        apm.apply_config(Config::default()).unwrap();
        assert!(apm.submodules.echo_canceller.is_none());
        assert!(apm.submodules.noise_suppressors.is_empty());
        assert!(apm.submodules.gain_controller2.is_none());
        assert!(apm.capture.linear_output.is_none());
    }

    #[test]
    fn invalid_config_leaves_the_previous_one() {
        let mut apm = apm(Config::default());
        let mut config = Config::default();
        config.gain_controller1.enabled = true;
        config.gain_controller1.compression_gain_db = 200;
        assert_eq!(
            apm.apply_config(config),
            Err(Error::BadParameter("gain_controller1"))
        );
        assert_eq!(apm.config(), &Config::default());
    }

    #[test]
    fn pipeline_change_can_raise_the_processing_rate() {
        let api = mono(48000);
        let mut apm = AudioProcessingImpl::new(Config::default(), api).unwrap();
        assert_eq!(apm.proc_sample_rate_hz(), 32000);
        let mut config = Config::default();
        config.pipeline.maximum_internal_processing_rate = MaxProcessingRate::Rate48kHz;
        apm.apply_config(config).unwrap();
        assert_eq!(apm.proc_sample_rate_hz(), 48000);
    }

    #[test]
    fn render_frames_are_queued_only_for_the_echo_canceller() {
        let mut apm = apm(Config::default());
        apm.analyze_reverse_stream_f32(&[&[0.1; 160]]);
        assert!(apm.render.queue.is_empty());

        let mut config = Config::default();
        config.echo_canceller.enabled = true;
        apm.apply_config(config).unwrap();
        apm.analyze_reverse_stream_f32(&[&[0.1; 160]]);
        assert!(!apm.render.queue.is_empty());

        let mut out = [0.0f32; 160];
        apm.process_stream_f32(&[&[0.0; 160]], &mut [&mut out]).unwrap();
        assert!(apm.render.queue.is_empty());
    }

    #[test]
    fn format_change_rebuilds_the_buffers() {
        let mut apm = apm(Config::default());
        let wide = StreamConfig::new(48000, 2);
        apm.maybe_initialize_capture(&wide, &wide).unwrap();
        assert_eq!(apm.api_format().capture_input, wide);
        assert_eq!(apm.api_format().render_input, StreamConfig::new(16000, 1));
        assert_eq!(apm.proc_sample_rate_hz(), 16000);
        assert_eq!(apm.proc_num_channels(), 2);
    }

    #[test]
    fn analog_mode_needs_the_stream_level() {
        let mut config = Config::default();
        config.gain_controller1.enabled = true;
        let mut apm = apm(config);
        assert_eq!(apm.check_stream_parameters(), Err(Error::StreamParameterNotSet));
        apm.set_stream_analog_level(100);
        assert!(apm.check_stream_parameters().is_ok());
        assert_eq!(apm.recommended_stream_analog_level(), 100);
    }

    #[test]
    fn statistics_start_empty() {
        let stats = apm(Config::default()).statistics();
        assert!(stats.echo_return_loss.is_none());
        assert!(stats.delay_ms.is_none());
        assert!(stats.output_rms_dbfs.is_none());
    }

    #[test]
    fn linear_output_requires_export() {
        let mut config = Config::default();
        config.echo_canceller.enabled = true;
        config.noise_suppression.enabled = true;
        config.noise_suppression.analyze_linear_aec_output_when_available = true;
        let apm = apm(config);
        let mut out = [0.0f32; 160];
        assert_eq!(apm.linear_aec_output(&mut [&mut out]), Err(Error::NotEnabled));
    }
}
