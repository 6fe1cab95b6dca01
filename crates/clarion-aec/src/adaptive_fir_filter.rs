//! Partitioned-block frequency-domain adaptive filter.
//!
//! The echo path is modelled by `P` partitions of 64 taps, each held as the
//! 128-point spectrum of its zero-padded impulse response. Filtering is
//! overlap-save: the estimate for the current block is the second half of
//! `ifft(sum_p H_p X_{n-p})`. Adaptation is NLMS with the update normalized
//! per bin by the render power summed over the partitions. One partition
//! per block has its gradient constrained back to 64 taps.

use clarion_simd::SimdBackend;

use crate::aec_fft::AecFft;
use crate::common::{BLOCK_SIZE, Block, FFT_LENGTH, FFT_LENGTH_BY_2, FFT_LENGTH_BY_2_PLUS_1, Spectrum};
use crate::config::Filter;
use crate::fft_data::FftData;
use crate::render_buffer::RenderBuffer;

/// Sums the per-partition power responses into the echo return loss
/// spectrum.
pub(crate) fn compute_erl(backend: SimdBackend, h2: &[Spectrum], erl: &mut Spectrum) {
    erl.fill(0.0);
    for h2_p in h2 {
        backend.elementwise_accumulate(&h2_p[..FFT_LENGTH_BY_2], &mut erl[..FFT_LENGTH_BY_2]);
        erl[FFT_LENGTH_BY_2] += h2_p[FFT_LENGTH_BY_2];
    }
}

/// Time-domain energy of a partition, from its unscaled 128-point spectrum.
fn partition_energy(h: &FftData) -> f32 {
    let mut energy = h.re[0] * h.re[0] + h.re[FFT_LENGTH_BY_2] * h.re[FFT_LENGTH_BY_2];
    for k in 1..FFT_LENGTH_BY_2 {
        energy += 2.0 * (h.re[k] * h.re[k] + h.im[k] * h.im[k]);
    }
    energy / FFT_LENGTH as f32
}

#[derive(derive_more::Debug)]
pub(crate) struct AdaptiveFirFilter {
    backend: SimdBackend,
    #[debug(skip)]
    partitions: Vec<FftData>,
    constrain_index: usize,
    step_size: f32,
    leakage: f32,
    regularization: f32,
    max_energy: f32,
    #[debug(skip)]
    render_power: Spectrum,
    #[debug(skip)]
    gradient: FftData,
    #[debug(skip)]
    scratch: [f32; FFT_LENGTH],
}

impl AdaptiveFirFilter {
    pub(crate) fn new(num_partitions: usize, config: &Filter, backend: SimdBackend) -> Self {
        Self {
            backend,
            partitions: vec![FftData::default(); num_partitions.max(1)],
            constrain_index: 0,
            step_size: config.step_size,
            leakage: config.leakage,
            regularization: config.regularization,
            max_energy: config.max_energy,
            render_power: [0.0; FFT_LENGTH_BY_2_PLUS_1],
            gradient: FftData::default(),
            scratch: [0.0; FFT_LENGTH],
        }
    }

    pub(crate) fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub(crate) fn reset(&mut self) {
        for h in &mut self.partitions {
            h.clear();
        }
        self.constrain_index = 0;
    }

    /// Spectrum of the echo estimate for the block rendered `delay` blocks
    /// before `aligned`.
    pub(crate) fn filter(&self, render: &RenderBuffer, aligned: u64, delay: usize, echo: &mut FftData) {
        echo.clear();
        for (p, h) in self.partitions.iter().enumerate() {
            echo.multiply_accumulate(h, render.fft(aligned, delay + p));
        }
    }

    /// Time-domain echo estimate for the current block.
    pub(crate) fn estimate_echo(
        &mut self,
        render: &RenderBuffer,
        aligned: u64,
        delay: usize,
        fft: &mut AecFft,
        echo: &mut Block,
    ) {
        let mut spectrum = FftData::default();
        self.filter(render, aligned, delay, &mut spectrum);
        fft.ifft(&spectrum, &mut self.scratch);
        echo.copy_from_slice(&self.scratch[BLOCK_SIZE..]);
    }

    /// NLMS update from the spectrum of the zero-padded error block.
    pub(crate) fn adapt(
        &mut self,
        render: &RenderBuffer,
        aligned: u64,
        delay: usize,
        error: &FftData,
        fft: &mut AecFft,
    ) {
        self.render_power.fill(self.regularization.max(1.0));
        for p in 0..self.partitions.len() {
            self.backend
                .elementwise_accumulate(render.spectrum(aligned, delay + p), &mut self.render_power);
        }

        let decay = 1.0 - self.leakage;
        for (p, h) in self.partitions.iter_mut().enumerate() {
            let x = render.fft(aligned, delay + p);
            for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
                let mu = self.step_size / self.render_power[k];
                // conj(X) * E
                let g_re = x.re[k] * error.re[k] + x.im[k] * error.im[k];
                let g_im = x.re[k] * error.im[k] - x.im[k] * error.re[k];
                h.re[k] = decay * h.re[k] + mu * g_re;
                h.im[k] = decay * h.im[k] + mu * g_im;
            }
        }

        self.constrain(fft);
        self.limit_energy();
    }

    fn constrain(&mut self, fft: &mut AecFft) {
        let p = self.constrain_index;
        self.constrain_index = (self.constrain_index + 1) % self.partitions.len();
        fft.ifft(&self.partitions[p], &mut self.scratch);
        self.scratch[BLOCK_SIZE..].fill(0.0);
        fft.fft(&self.scratch, &mut self.gradient);
        self.partitions[p].clone_from(&self.gradient);
    }

    fn limit_energy(&mut self) {
        let energy = self.energy();
        if energy > self.max_energy {
            let scale = (self.max_energy / energy).sqrt();
            for h in &mut self.partitions {
                h.scale(scale);
            }
        }
    }

    /// Sum of squared impulse response taps. A unit impulse gives 1.
    pub(crate) fn energy(&self) -> f32 {
        self.partitions.iter().map(partition_energy).sum()
    }

    /// Power gain of the modelled echo path per bin.
    pub(crate) fn erl(&self, erl: &mut Spectrum) {
        let h2: Vec<Spectrum> = self
            .partitions
            .iter()
            .map(|h| {
                let mut h2 = [0.0; FFT_LENGTH_BY_2_PLUS_1];
                h.spectrum(&mut h2);
                h2
            })
            .collect();
        compute_erl(self.backend, &h2, erl);
    }

    /// Impulse response of the whole filter, oldest partition last.
    #[cfg(test)]
    fn impulse_response(&self, fft: &mut AecFft) -> Vec<f32> {
        let mut taps = Vec::with_capacity(self.partitions.len() * BLOCK_SIZE);
        let mut time = [0.0; FFT_LENGTH];
        for h in &self.partitions {
            fft.ifft(h, &mut time);
            taps.extend_from_slice(&time[..BLOCK_SIZE]);
        }
        taps
    }
}
