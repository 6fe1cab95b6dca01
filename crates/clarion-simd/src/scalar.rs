//! Reference implementations.

pub(crate) fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn elementwise_accumulate(x: &[f32], z: &mut [f32]) {
    for (z, x) in z.iter_mut().zip(x) {
        *z += x;
    }
}

pub(crate) fn elementwise_multiply(x: &[f32], y: &[f32], z: &mut [f32]) {
    for ((z, x), y) in z.iter_mut().zip(x).zip(y) {
        *z = x * y;
    }
}

pub(crate) fn elementwise_sqrt(x: &mut [f32]) {
    for v in x.iter_mut() {
        *v = v.sqrt();
    }
}
