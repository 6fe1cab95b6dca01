//! In-place iterative radix-2 FFT on split real/imaginary buffers.

use std::f64::consts::PI;

/// Complex FFT of a fixed power-of-two length.
#[derive(Debug, Clone)]
pub struct ComplexFft {
    len: usize,
    // cos/sin of -2*pi*k/len for k in 0..len/2.
    cos: Vec<f32>,
    sin: Vec<f32>,
    bit_reverse: Vec<u32>,
}

impl ComplexFft {
    /// Creates a transform of `len` points.
    ///
    /// # Panics
    ///
    /// Panics if `len` is not a power of two.
    pub fn new(len: usize) -> Self {
        assert!(len.is_power_of_two(), "FFT length {len} is not a power of two");
        let half = len / 2;
        let (cos, sin) = (0..half)
            .map(|k| {
                let phase = -2.0 * PI * k as f64 / len as f64;
                (phase.cos() as f32, phase.sin() as f32)
            })
            .unzip();
        let bits = len.trailing_zeros();
        let bit_reverse = (0..len as u32)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (32 - bits) })
            .collect();
        Self {
            len,
            cos,
            sin,
            bit_reverse,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unscaled forward transform.
    pub fn forward(&self, re: &mut [f32], im: &mut [f32]) {
        self.transform(re, im, false);
    }

    /// Inverse transform scaled by `1/len`.
    pub fn inverse(&self, re: &mut [f32], im: &mut [f32]) {
        self.transform(re, im, true);
        let scale = 1.0 / self.len as f32;
        for (r, i) in re.iter_mut().zip(im.iter_mut()) {
            *r *= scale;
            *i *= scale;
        }
    }

    fn transform(&self, re: &mut [f32], im: &mut [f32], inverse: bool) {
        let n = self.len;
        assert_eq!(re.len(), n);
        assert_eq!(im.len(), n);

        for i in 0..n {
            let j = self.bit_reverse[i] as usize;
            if j > i {
                re.swap(i, j);
                im.swap(i, j);
            }
        }

        let sign = if inverse { -1.0 } else { 1.0 };
        let mut size = 2;
        while size <= n {
            let half = size / 2;
            let stride = n / size;
            for start in (0..n).step_by(size) {
                for k in 0..half {
                    let wr = self.cos[k * stride];
                    let wi = sign * self.sin[k * stride];
                    let a = start + k;
                    let b = a + half;
                    let tr = re[b] * wr - im[b] * wi;
                    let ti = re[b] * wi + im[b] * wr;
                    re[b] = re[a] - tr;
                    im[b] = im[a] - ti;
                    re[a] += tr;
                    im[a] += ti;
                }
            }
            size *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(re: &[f32], im: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let n = re.len();
        let mut out_re = vec![0.0f32; n];
        let mut out_im = vec![0.0f32; n];
        for k in 0..n {
            let (mut sr, mut si) = (0.0f64, 0.0f64);
            for t in 0..n {
                let phase = -2.0 * PI * (k * t) as f64 / n as f64;
                sr += re[t] as f64 * phase.cos() - im[t] as f64 * phase.sin();
                si += re[t] as f64 * phase.sin() + im[t] as f64 * phase.cos();
            }
            out_re[k] = sr as f32;
            out_im[k] = si as f32;
        }
        (out_re, out_im)
    }

    #[test]
    fn matches_naive_dft() {
        for n in [1usize, 2, 4, 16, 64] {
            let fft = ComplexFft::new(n);
            let re: Vec<f32> = (0..n).map(|i| (i as f32 * 0.7).sin()).collect();
            let im: Vec<f32> = (0..n).map(|i| (i as f32 * 0.3).cos()).collect();
            let (expected_re, expected_im) = naive_dft(&re, &im);
            let (mut r, mut i) = (re.clone(), im.clone());
            fft.forward(&mut r, &mut i);
            for k in 0..n {
                assert!((r[k] - expected_re[k]).abs() < 1e-3, "n={n} re[{k}]");
                assert!((i[k] - expected_im[k]).abs() < 1e-3, "n={n} im[{k}]");
            }
        }
    }

    #[test]
    fn inverse_restores_input() {
        let fft = ComplexFft::new(32);
        let re: Vec<f32> = (0..32).map(|i| i as f32 - 16.0).collect();
        let im = vec![0.5f32; 32];
        let (mut r, mut i) = (re.clone(), im.clone());
        fft.forward(&mut r, &mut i);
        fft.inverse(&mut r, &mut i);
        for k in 0..32 {
            assert!((r[k] - re[k]).abs() < 1e-4);
            assert!((i[k] - im[k]).abs() < 1e-4);
        }
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn rejects_non_power_of_two() {
        let _ = ComplexFft::new(12);
    }
}
