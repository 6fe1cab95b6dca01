//! Echo power left after the linear filter.

use crate::common::{FFT_LENGTH_BY_2_PLUS_1, Spectrum};
use crate::config::Suppressor;

#[derive(Debug)]
pub(crate) struct ResidualEchoEstimator {
    default_echo_path_gain: f32,
}

impl ResidualEchoEstimator {
    pub(crate) fn new(config: &Suppressor) -> Self {
        Self {
            default_echo_path_gain: config.default_echo_path_gain,
        }
    }

    /// With a converged filter the residual is the linear echo estimate
    /// `s2` scaled down by the achieved enhancement. Otherwise the strongest
    /// recent render power `x2_max` through the default echo path gain is
    /// used.
    pub(crate) fn estimate(
        &self,
        converged: bool,
        s2: &Spectrum,
        erle: &Spectrum,
        x2_max: &Spectrum,
        r2: &mut Spectrum,
    ) {
        if converged {
            for k in 0..FFT_LENGTH_BY_2_PLUS_1 {
                r2[k] = s2[k] / erle[k].max(1.0);
            }
        } else {
            for (r, &x) in r2.iter_mut().zip(x2_max) {
                *r = x * self.default_echo_path_gain;
            }
        }
    }
}
