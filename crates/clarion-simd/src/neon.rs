//! NEON kernels, 4 lanes.

use std::arch::aarch64::{
    vaddq_f32, vaddvq_f32, vdupq_n_f32, vld1q_f32, vmulq_f32, vsqrtq_f32, vst1q_f32,
};

const LANES: usize = 4;

#[target_feature(enable = "neon")]
pub(crate) unsafe fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let body = n - n % LANES;
    // SAFETY: every load reads `LANES` elements starting below `body <= n`.
    let head = unsafe {
        let mut acc = vdupq_n_f32(0.0);
        let mut i = 0;
        while i < body {
            let va = vld1q_f32(a.as_ptr().add(i));
            let vb = vld1q_f32(b.as_ptr().add(i));
            acc = vaddq_f32(acc, vmulq_f32(va, vb));
            i += LANES;
        }
        vaddvq_f32(acc)
    };
    let tail: f32 = a[body..n].iter().zip(&b[body..n]).map(|(x, y)| x * y).sum();
    head + tail
}

#[target_feature(enable = "neon")]
pub(crate) unsafe fn elementwise_accumulate(x: &[f32], z: &mut [f32]) {
    let n = x.len().min(z.len());
    let body = n - n % LANES;
    // SAFETY: loads and stores stay below `body <= n`.
    unsafe {
        let mut i = 0;
        while i < body {
            let vx = vld1q_f32(x.as_ptr().add(i));
            let vz = vld1q_f32(z.as_ptr().add(i));
            vst1q_f32(z.as_mut_ptr().add(i), vaddq_f32(vz, vx));
            i += LANES;
        }
    }
    for (z, x) in z[body..n].iter_mut().zip(&x[body..n]) {
        *z += x;
    }
}

#[target_feature(enable = "neon")]
pub(crate) unsafe fn elementwise_multiply(x: &[f32], y: &[f32], z: &mut [f32]) {
    let n = x.len().min(y.len()).min(z.len());
    let body = n - n % LANES;
    // SAFETY: loads and stores stay below `body <= n`.
    unsafe {
        let mut i = 0;
        while i < body {
            let vx = vld1q_f32(x.as_ptr().add(i));
            let vy = vld1q_f32(y.as_ptr().add(i));
            vst1q_f32(z.as_mut_ptr().add(i), vmulq_f32(vx, vy));
            i += LANES;
        }
    }
    for ((z, x), y) in z[body..n].iter_mut().zip(&x[body..n]).zip(&y[body..n]) {
        *z = x * y;
    }
}

#[target_feature(enable = "neon")]
pub(crate) unsafe fn elementwise_sqrt(x: &mut [f32]) {
    let n = x.len();
    let body = n - n % LANES;
    // SAFETY: loads and stores stay below `body <= n`.
    unsafe {
        let mut i = 0;
        while i < body {
            let v = vld1q_f32(x.as_ptr().add(i));
            vst1q_f32(x.as_mut_ptr().add(i), vsqrtq_f32(v));
            i += LANES;
        }
    }
    for v in &mut x[body..] {
        *v = v.sqrt();
    }
}
