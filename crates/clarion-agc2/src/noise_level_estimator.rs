//! Noise floor estimator based on minimum tracking.
//!
//! The lowest frame energy over a 5 s observation period becomes the noise
//! floor for the next period. Within a period the estimate can only go
//! down. During the very first period it follows the running minimum.

use clarion_common_audio::channel_buffer::ChannelBuffer;

use crate::common::float_s16_to_dbfs;

const FRAMES_PER_SECOND: usize = 100;
const UPDATE_PERIOD_NUM_FRAMES: usize = 500;

#[derive(Debug, Clone)]
pub struct NoiseLevelEstimator {
    sample_rate_hz: u32,
    min_noise_energy: f32,
    first_period: bool,
    preliminary_noise_energy: Option<f32>,
    counter: usize,
    noise_energy: f32,
}

impl NoiseLevelEstimator {
    pub fn new(sample_rate_hz: u32) -> Self {
        let mut estimator = Self {
            sample_rate_hz,
            min_noise_energy: 0.0,
            first_period: true,
            preliminary_noise_energy: None,
            counter: UPDATE_PERIOD_NUM_FRAMES,
            noise_energy: 0.0,
        };
        estimator.initialize(sample_rate_hz);
        estimator
    }

    fn initialize(&mut self, sample_rate_hz: u32) {
        self.sample_rate_hz = sample_rate_hz;
        // Energy of a 2 LSB square wave over one frame.
        self.min_noise_energy = sample_rate_hz as f32 * 2.0 * 2.0 / FRAMES_PER_SECOND as f32;
        self.first_period = true;
        self.preliminary_noise_energy = None;
        self.counter = UPDATE_PERIOD_NUM_FRAMES;
        self.noise_energy = self.min_noise_energy;
    }

    /// Analyzes one frame and returns the noise floor RMS in dBFS.
    pub fn analyze(&mut self, audio: &ChannelBuffer<f32>) -> f32 {
        let num_frames = audio.num_frames();
        let sample_rate_hz = (num_frames * FRAMES_PER_SECOND) as u32;
        if sample_rate_hz != self.sample_rate_hz {
            self.initialize(sample_rate_hz);
        }

        let frame_energy = audio
            .channels()
            .map(|channel| channel.iter().map(|x| x * x).sum::<f32>())
            .fold(f32::INFINITY, f32::min);
        if !frame_energy.is_finite() || frame_energy <= self.min_noise_energy {
            return self.noise_rms_dbfs(num_frames);
        }

        let preliminary = self
            .preliminary_noise_energy
            .map_or(frame_energy, |p| p.min(frame_energy));
        self.preliminary_noise_energy = Some(preliminary);

        if self.counter == 0 {
            self.first_period = false;
            self.noise_energy = preliminary;
            self.counter = UPDATE_PERIOD_NUM_FRAMES;
            self.preliminary_noise_energy = None;
        } else if self.first_period {
            self.noise_energy = preliminary;
            self.counter -= 1;
        } else {
            self.noise_energy = self.noise_energy.min(preliminary);
            self.counter -= 1;
        }
        self.noise_rms_dbfs(num_frames)
    }

    fn noise_rms_dbfs(&self, num_frames: usize) -> f32 {
        float_s16_to_dbfs((self.noise_energy / num_frames.max(1) as f32).sqrt())
    }
}
