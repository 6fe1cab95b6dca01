//! Public audio processing API.

use crate::Error;
use crate::audio_processing_impl::{AudioProcessingImpl, ProcessingConfig};
use crate::config::Config;
use crate::stats::AudioProcessingStats;
use crate::stream_config::StreamConfig;

const MAX_STREAM_DELAY_MS: i32 = 500;
const MAX_ANALOG_LEVEL: i32 = 255;

// ─── Builder ─────────────────────────────────────────────────────────

/// Builder for an [`AudioProcessing`] instance.
///
/// # Example
/// ```
/// use clarion::{AudioProcessing, Config, StreamConfig};
///
/// let mut config = Config::default();
/// config.echo_canceller.enabled = true;
/// config.noise_suppression.enabled = true;
///
/// let apm = AudioProcessing::builder()
///     .config(config)
///     .capture_config(StreamConfig::new(48000, 1))
///     .build()?;
/// assert_eq!(apm.proc_sample_rate_hz(), 32000);
/// # Ok::<(), clarion::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct AudioProcessingBuilder {
    config: Config,
    capture: Option<StreamConfig>,
    render: Option<StreamConfig>,
}

impl AudioProcessingBuilder {
    /// Sets the initial configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Format of the capture stream, input and output.
    pub fn capture_config(mut self, config: StreamConfig) -> Self {
        self.capture = Some(config);
        self
    }

    /// Format of the render stream, input and output.
    pub fn render_config(mut self, config: StreamConfig) -> Self {
        self.render = Some(config);
        self
    }

    /// Validates the configuration and the stream formats and allocates
    /// every enabled component.
    ///
    /// When only one stream format is given the other stream uses the same
    /// format. With neither, both start at 32 kHz mono and the
    /// `process_capture_*` / `process_render_*` shorthands are unavailable
    /// until a format is passed explicitly.
    pub fn build(self) -> Result<AudioProcessing, Error> {
        let formats_bound = self.capture.is_some() || self.render.is_some();
        let capture = self.capture.or(self.render).unwrap_or_default();
        let render = self.render.unwrap_or(capture);
        capture.check()?;
        render.check()?;
        let inner = AudioProcessingImpl::new(self.config, ProcessingConfig::symmetric(capture, render))?;
        Ok(AudioProcessing {
            inner,
            formats_bound,
        })
    }
}

// ─── AudioProcessing ─────────────────────────────────────────────────

/// Echo cancellation, noise suppression and gain control for one pair of
/// capture and render streams.
///
/// # Usage
///
/// 1. Create an instance with [`AudioProcessing::builder()`].
/// 2. For every 10 ms tick:
///    - pass the far-end audio to
///      [`process_reverse_stream_f32()`](AudioProcessing::process_reverse_stream_f32)
///      (or one of the other reverse-stream calls),
///    - then pass the microphone audio to
///      [`process_stream_f32()`](AudioProcessing::process_stream_f32).
/// 3. Change settings with [`apply_config()`](AudioProcessing::apply_config).
///
/// The `f32` calls take one slice per channel with samples in `[-1, 1]`.
/// The `i16` calls take interleaved samples. A frame whose shape does not
/// match its [`StreamConfig`] is rejected before anything is processed.
///
/// A frame format different from the previous call reinitializes the
/// pipeline, discarding all adaptive state.
#[derive(Debug)]
pub struct AudioProcessing {
    inner: AudioProcessingImpl,
    formats_bound: bool,
}

impl AudioProcessing {
    pub fn builder() -> AudioProcessingBuilder {
        AudioProcessingBuilder::default()
    }

    /// Resets all adaptive state. Config, formats and stream parameters are
    /// kept.
    pub fn initialize(&mut self) {
        self.inner.initialize();
    }

    /// Applies a new configuration at the next frame boundary. Components
    /// whose settings did not change keep their state.
    ///
    /// On error the previous configuration stays in effect.
    pub fn apply_config(&mut self, config: Config) -> Result<(), Error> {
        self.inner.apply_config(config)
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> &Config {
        self.inner.config()
    }

    pub fn statistics(&self) -> AudioProcessingStats {
        self.inner.statistics()
    }

    /// Internal capture processing rate.
    pub fn proc_sample_rate_hz(&self) -> u32 {
        self.inner.proc_sample_rate_hz()
    }

    // ─── Stream parameters ───────────────────────────────────────

    /// Sets the delay in ms between a render frame being played out and
    /// its echo reaching the capture frame.
    ///
    /// Clamped to `[0, 500]`. Returns `Err(BadStreamParameter)` if clamping
    /// was necessary; the clamped value is still used.
    pub fn set_stream_delay_ms(&mut self, delay_ms: i32) -> Result<(), Error> {
        let clamped = delay_ms.clamp(0, MAX_STREAM_DELAY_MS);
        self.inner.set_stream_delay_ms(clamped);
        if clamped == delay_ms {
            Ok(())
        } else {
            tracing::warn!(delay_ms, clamped, "stream delay out of range");
            Err(Error::BadStreamParameter)
        }
    }

    pub fn stream_delay_ms(&self) -> i32 {
        self.inner.stream_delay_ms()
    }

    /// Reports the current analog (hardware) capture level.
    ///
    /// Required before every capture frame while gain controller 1 runs
    /// in adaptive analog mode. Clamped to `[0, 255]` with
    /// `Err(BadStreamParameter)` when out of range.
    pub fn set_stream_analog_level(&mut self, level: i32) -> Result<(), Error> {
        let clamped = level.clamp(0, MAX_ANALOG_LEVEL);
        self.inner.set_stream_analog_level(clamped);
        if clamped == level {
            Ok(())
        } else {
            tracing::warn!(level, clamped, "analog level out of range");
            Err(Error::BadStreamParameter)
        }
    }

    /// Analog level gain controller 1 would like applied. Read after
    /// processing the capture frame.
    pub fn recommended_stream_analog_level(&self) -> i32 {
        self.inner.recommended_stream_analog_level()
    }

    /// Tells gain controller 1 the user is typing, so keyboard clicks are
    /// not taken for speech.
    pub fn set_stream_key_pressed(&mut self, pressed: bool) {
        self.inner.set_stream_key_pressed(pressed);
    }

    // ─── Capture (float, planar) ─────────────────────────────────

    /// Processes one capture frame.
    ///
    /// `src` holds `input_config.num_channels()` slices of
    /// `input_config.num_frames()` samples, `dest` likewise for
    /// `output_config`. The output must have one channel or as many as the
    /// input.
    pub fn process_stream_f32(
        &mut self,
        src: &[&[f32]],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        validate_float_configs(input_config, output_config)?;
        check_planar(src, input_config)?;
        check_planar(dest, output_config)?;
        self.inner.check_stream_parameters()?;
        self.inner.maybe_initialize_capture(input_config, output_config)?;
        self.inner.process_stream_f32(src, dest)
    }

    /// [`process_stream_f32`](Self::process_stream_f32) with the capture
    /// format given to the builder.
    pub fn process_capture_f32(&mut self, src: &[&[f32]], dest: &mut [&mut [f32]]) -> Result<(), Error> {
        let api = self.bound_format()?;
        self.process_stream_f32(src, &api.capture_input, &api.capture_output, dest)
    }

    // ─── Capture (i16, interleaved) ──────────────────────────────

    /// Processes one interleaved capture frame. Input and output formats
    /// must match.
    pub fn process_stream_i16(
        &mut self,
        src: &[i16],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [i16],
    ) -> Result<(), Error> {
        validate_i16_configs(input_config, output_config)?;
        check_interleaved(src, input_config)?;
        check_interleaved(dest, output_config)?;
        self.inner.check_stream_parameters()?;
        self.inner.maybe_initialize_capture(input_config, output_config)?;
        self.inner.process_stream_i16(src, dest)
    }

    /// Processes one interleaved capture frame in place.
    pub fn process_stream_i16_in_place(&mut self, frame: &mut [i16], config: &StreamConfig) -> Result<(), Error> {
        config.check()?;
        check_interleaved(frame, config)?;
        self.inner.check_stream_parameters()?;
        self.inner.maybe_initialize_capture(config, config)?;
        self.inner.process_stream_i16_in_place(frame)
    }

    // ─── Render ──────────────────────────────────────────────────

    /// Buffers one far-end frame as the echo reference.
    pub fn analyze_reverse_stream_f32(&mut self, src: &[&[f32]], config: &StreamConfig) -> Result<(), Error> {
        config.check()?;
        check_planar(src, config)?;
        self.inner.maybe_initialize_render(config, config)?;
        self.inner.analyze_reverse_stream_f32(src);
        Ok(())
    }

    /// Buffers one interleaved far-end frame as the echo reference.
    pub fn analyze_reverse_stream_i16(&mut self, src: &[i16], config: &StreamConfig) -> Result<(), Error> {
        config.check()?;
        check_interleaved(src, config)?;
        self.inner.maybe_initialize_render(config, config)?;
        self.inner.analyze_reverse_stream_i16(src);
        Ok(())
    }

    /// Buffers one far-end frame and writes it to `dest` in
    /// `output_config`'s format. The render signal itself is not modified.
    pub fn process_reverse_stream_f32(
        &mut self,
        src: &[&[f32]],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [&mut [f32]],
    ) -> Result<(), Error> {
        validate_float_configs(input_config, output_config)?;
        check_planar(src, input_config)?;
        check_planar(dest, output_config)?;
        self.inner.maybe_initialize_render(input_config, output_config)?;
        self.inner.process_reverse_stream_f32(src, dest);
        Ok(())
    }

    /// [`process_reverse_stream_f32`](Self::process_reverse_stream_f32)
    /// with the render format given to the builder.
    pub fn process_render_f32(&mut self, src: &[&[f32]], dest: &mut [&mut [f32]]) -> Result<(), Error> {
        let api = self.bound_format()?;
        self.process_reverse_stream_f32(src, &api.render_input, &api.render_output, dest)
    }

    /// Interleaved form of
    /// [`process_reverse_stream_f32`](Self::process_reverse_stream_f32).
    /// Input and output formats must match.
    pub fn process_reverse_stream_i16(
        &mut self,
        src: &[i16],
        input_config: &StreamConfig,
        output_config: &StreamConfig,
        dest: &mut [i16],
    ) -> Result<(), Error> {
        validate_i16_configs(input_config, output_config)?;
        check_interleaved(src, input_config)?;
        check_interleaved(dest, output_config)?;
        self.inner.maybe_initialize_render(input_config, output_config)?;
        self.inner.analyze_reverse_stream_i16(src);
        dest.copy_from_slice(src);
        Ok(())
    }

    // ─── Linear echo canceller output ────────────────────────────

    /// Copies the linear echo canceller output of the last capture frame.
    ///
    /// Only available with
    /// [`export_linear_aec_output`](crate::config::EchoCanceller::export_linear_aec_output)
    /// set, otherwise `Err(NotEnabled)`. `dest` must hold one slice per
    /// processing channel of `proc_sample_rate_hz() / 100` samples.
    pub fn linear_aec_output(&self, dest: &mut [&mut [f32]]) -> Result<(), Error> {
        self.inner.linear_aec_output(dest)
    }

    fn bound_format(&self) -> Result<ProcessingConfig, Error> {
        if self.formats_bound {
            Ok(*self.inner.api_format())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

// ─── Validation ──────────────────────────────────────────────────────

fn validate_float_configs(input: &StreamConfig, output: &StreamConfig) -> Result<(), Error> {
    input.check()?;
    output.check()?;
    let out_channels = output.num_channels();
    if out_channels != 1 && out_channels != input.num_channels() {
        return Err(Error::BadNumberChannels {
            num_channels: usize::from(out_channels),
        });
    }
    Ok(())
}

fn validate_i16_configs(input: &StreamConfig, output: &StreamConfig) -> Result<(), Error> {
    input.check()?;
    output.check()?;
    if input.sample_rate_hz() != output.sample_rate_hz() {
        return Err(Error::BadSampleRate {
            sample_rate_hz: output.sample_rate_hz(),
        });
    }
    if input.num_channels() != output.num_channels() {
        return Err(Error::BadNumberChannels {
            num_channels: usize::from(output.num_channels()),
        });
    }
    Ok(())
}

fn check_planar<S: AsRef<[f32]>>(channels: &[S], config: &StreamConfig) -> Result<(), Error> {
    let expected = usize::from(config.num_channels());
    if channels.len() != expected {
        return Err(Error::BadChannelCount {
            expected,
            actual: channels.len(),
        });
    }
    let num_frames = config.num_frames();
    match channels.iter().map(|c| c.as_ref().len()).find(|&len| len != num_frames) {
        Some(actual) => Err(Error::BadDataLength {
            expected: num_frames,
            actual,
        }),
        None => Ok(()),
    }
}

fn check_interleaved(samples: &[i16], config: &StreamConfig) -> Result<(), Error> {
    let expected = config.num_samples();
    if samples.len() == expected {
        Ok(())
    } else {
        Err(Error::BadDataLength {
            expected,
            actual: samples.len(),
        })
    }
}
