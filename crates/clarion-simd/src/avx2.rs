//! AVX2 kernels, 8 lanes.

#[cfg(target_arch = "x86")]
use std::arch::x86::{
    _mm256_add_ps, _mm256_loadu_ps, _mm256_mul_ps, _mm256_setzero_ps, _mm256_sqrt_ps,
    _mm256_storeu_ps,
};
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{
    _mm256_add_ps, _mm256_loadu_ps, _mm256_mul_ps, _mm256_setzero_ps, _mm256_sqrt_ps,
    _mm256_storeu_ps,
};

const LANES: usize = 8;

#[target_feature(enable = "avx2")]
pub(crate) unsafe fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let body = n - n % LANES;
    let mut lanes = [0.0f32; LANES];
    // SAFETY: every load reads `LANES` elements starting below `body <= n`.
    unsafe {
        let mut acc = _mm256_setzero_ps();
        let mut i = 0;
        while i < body {
            let va = _mm256_loadu_ps(a.as_ptr().add(i));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i));
            acc = _mm256_add_ps(acc, _mm256_mul_ps(va, vb));
            i += LANES;
        }
        _mm256_storeu_ps(lanes.as_mut_ptr(), acc);
    }
    let tail: f32 = a[body..n].iter().zip(&b[body..n]).map(|(x, y)| x * y).sum();
    lanes.iter().sum::<f32>() + tail
}

#[target_feature(enable = "avx2")]
pub(crate) unsafe fn elementwise_accumulate(x: &[f32], z: &mut [f32]) {
    let n = x.len().min(z.len());
    let body = n - n % LANES;
    // SAFETY: loads and stores stay below `body <= n`.
    unsafe {
        let mut i = 0;
        while i < body {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i));
            let vz = _mm256_loadu_ps(z.as_ptr().add(i));
            _mm256_storeu_ps(z.as_mut_ptr().add(i), _mm256_add_ps(vz, vx));
            i += LANES;
        }
    }
    for (z, x) in z[body..n].iter_mut().zip(&x[body..n]) {
        *z += x;
    }
}

#[target_feature(enable = "avx2")]
pub(crate) unsafe fn elementwise_multiply(x: &[f32], y: &[f32], z: &mut [f32]) {
    let n = x.len().min(y.len()).min(z.len());
    let body = n - n % LANES;
    // SAFETY: loads and stores stay below `body <= n`.
    unsafe {
        let mut i = 0;
        while i < body {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i));
            let vy = _mm256_loadu_ps(y.as_ptr().add(i));
            _mm256_storeu_ps(z.as_mut_ptr().add(i), _mm256_mul_ps(vx, vy));
            i += LANES;
        }
    }
    for ((z, x), y) in z[body..n].iter_mut().zip(&x[body..n]).zip(&y[body..n]) {
        *z = x * y;
    }
}

#[target_feature(enable = "avx2")]
pub(crate) unsafe fn elementwise_sqrt(x: &mut [f32]) {
    let n = x.len();
    let body = n - n % LANES;
    // SAFETY: loads and stores stay below `body <= n`.
    unsafe {
        let mut i = 0;
        while i < body {
            let v = _mm256_loadu_ps(x.as_ptr().add(i));
            _mm256_storeu_ps(x.as_mut_ptr().add(i), _mm256_sqrt_ps(v));
            i += LANES;
        }
    }
    for v in &mut x[body..] {
        *v = v.sqrt();
    }
}
