#![doc = include_str!("../README.md")]
// SIMD modules require unsafe for intrinsics; safe wrappers are provided.
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
mod avx2;
#[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
mod neon;
mod scalar;
#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
mod sse2;

#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
cpufeatures::new!(cpuid_avx2, "avx2");
#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
cpufeatures::new!(cpuid_sse2, "sse2");

/// Instruction set used by the vector kernels.
///
/// Obtain one with [`detect_backend`]. Constructing a non-scalar variant by
/// hand on a CPU that lacks the feature is not possible from safe code: the
/// SIMD variants only exist on the architectures that have them, and
/// [`detect_backend`] is the only place that selects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdBackend {
    /// Portable fallback.
    Scalar,
    /// 128-bit SSE2.
    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
    Sse2,
    /// 256-bit AVX2.
    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
    Avx2,
    /// 128-bit NEON.
    #[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
    Neon,
}

/// Detect the best backend supported by the running CPU.
pub fn detect_backend() -> SimdBackend {
    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
    {
        if cpuid_avx2::get() {
            return SimdBackend::Avx2;
        }
        if cpuid_sse2::get() {
            return SimdBackend::Sse2;
        }
    }
    #[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
    let backend = SimdBackend::Neon;
    #[cfg(not(all(target_arch = "aarch64", not(feature = "force-scalar"))))]
    let backend = SimdBackend::Scalar;
    backend
}

impl SimdBackend {
    /// Human readable backend name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Sse2 => "sse2",
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Avx2 => "avx2",
            #[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
            Self::Neon => "neon",
        }
    }

    /// `sum(a[i] * b[i])` over the common length.
    pub fn dot_product(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Scalar => scalar::dot_product(a, b),
            // SAFETY: the variant is only produced by `detect_backend` after
            // the runtime feature check succeeded.
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Sse2 => unsafe { sse2::dot_product(a, b) },
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Avx2 => unsafe { avx2::dot_product(a, b) },
            #[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
            Self::Neon => unsafe { neon::dot_product(a, b) },
        }
    }

    /// `z[i] += x[i]` over the common length.
    pub fn elementwise_accumulate(self, x: &[f32], z: &mut [f32]) {
        match self {
            Self::Scalar => scalar::elementwise_accumulate(x, z),
            // SAFETY: see `dot_product`.
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Sse2 => unsafe { sse2::elementwise_accumulate(x, z) },
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Avx2 => unsafe { avx2::elementwise_accumulate(x, z) },
            #[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
            Self::Neon => unsafe { neon::elementwise_accumulate(x, z) },
        }
    }

    /// `z[i] = x[i] * y[i]` over the common length.
    pub fn elementwise_multiply(self, x: &[f32], y: &[f32], z: &mut [f32]) {
        match self {
            Self::Scalar => scalar::elementwise_multiply(x, y, z),
            // SAFETY: see `dot_product`.
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Sse2 => unsafe { sse2::elementwise_multiply(x, y, z) },
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Avx2 => unsafe { avx2::elementwise_multiply(x, y, z) },
            #[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
            Self::Neon => unsafe { neon::elementwise_multiply(x, y, z) },
        }
    }

    /// `x[i] = sqrt(x[i])`.
    pub fn elementwise_sqrt(self, x: &mut [f32]) {
        match self {
            Self::Scalar => scalar::elementwise_sqrt(x),
            // SAFETY: see `dot_product`.
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Sse2 => unsafe { sse2::elementwise_sqrt(x) },
            #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), not(feature = "force-scalar")))]
            Self::Avx2 => unsafe { avx2::elementwise_sqrt(x) },
            #[cfg(all(target_arch = "aarch64", not(feature = "force-scalar")))]
            Self::Neon => unsafe { neon::elementwise_sqrt(x) },
        }
    }

    /// `sum(x[i] * x[i])`.
    pub fn energy(self, x: &[f32]) -> f32 {
        self.dot_product(x, x)
    }
}
