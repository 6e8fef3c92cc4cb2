//! Propagator-shape maps for invariant-mass sampling.
//!
//! Each map is a normalised density on an interval of the squared invariant
//! mass, with an explicit quantile transform. Resonant particles use the
//! Breit–Wigner tangent map; massless and auxiliary channels use power laws
//! with configurable exponent. Adaptive sampling wraps the quantile in a
//! one-dimensional [`Parni`](crate::parni::Parni) grid on the unit interval.

use serde::{Deserialize, Serialize};

/// Normalised density on `[lower, upper]` in the squared invariant mass.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum InvariantMap {
    /// Breit–Wigner shape around `mass` with width `width`.
    BreitWigner {
        /// Resonance mass.
        mass: f64,
        /// Resonance width.
        width: f64,
    },
    /// Power law `(s − pole)^{-exponent}` for `s > pole`.
    PowerLaw {
        /// Shape exponent, below one for an integrable endpoint.
        exponent: f64,
        /// Pole position, zero for massless timelike propagators.
        pole: f64,
    },
    /// Flat density.
    Uniform,
}

impl InvariantMap {
    /// Maps a uniform variable `x ∈ [0, 1]` to an invariant in
    /// `[lower, upper]`. Returns `None` for an empty range.
    #[must_use]
    pub fn quantile(&self, x: f64, lower: f64, upper: f64) -> Option<f64> {
        if !(upper > lower) {
            return None;
        }
        match self {
            Self::BreitWigner { mass, width } => {
                let scale = mass * width;
                if scale <= 0.0 {
                    return Self::Uniform.quantile(x, lower, upper);
                }
                let theta_lower = ((lower - mass * mass) / scale).atan();
                let theta_upper = ((upper - mass * mass) / scale).atan();
                let theta = theta_lower + x * (theta_upper - theta_lower);
                Some(mass * mass + scale * theta.tan())
            }
            Self::PowerLaw { exponent, pole } => {
                let a = (lower - pole).max(0.0);
                let b = upper - pole;
                if b <= 0.0 {
                    return None;
                }
                let nu = *exponent;
                if (nu - 1.0).abs() < 1e-10 {
                    // logarithmic limit; guard the endpoint at the pole
                    let a = a.max(1e-12 * b);
                    Some(pole + a * (b / a).powf(x))
                } else {
                    let power = 1.0 - nu;
                    let edge_a = a.max(0.0).powf(power);
                    let edge_b = b.powf(power);
                    Some(pole + (edge_a + x * (edge_b - edge_a)).powf(1.0 / power))
                }
            }
            Self::Uniform => Some(lower + x * (upper - lower)),
        }
    }

    /// Normalised density at `s` on `[lower, upper]`; zero outside.
    #[must_use]
    pub fn density(&self, s: f64, lower: f64, upper: f64) -> f64 {
        if !(upper > lower) || s < lower || s > upper {
            return 0.0;
        }
        match self {
            Self::BreitWigner { mass, width } => {
                let scale = mass * width;
                if scale <= 0.0 {
                    return Self::Uniform.density(s, lower, upper);
                }
                let theta_lower = ((lower - mass * mass) / scale).atan();
                let theta_upper = ((upper - mass * mass) / scale).atan();
                let delta = s - mass * mass;
                scale / ((delta * delta + scale * scale) * (theta_upper - theta_lower))
            }
            Self::PowerLaw { exponent, pole } => {
                let a = (lower - pole).max(0.0);
                let b = upper - pole;
                let z = s - pole;
                if z <= 0.0 || b <= 0.0 {
                    return 0.0;
                }
                let nu = *exponent;
                if (nu - 1.0).abs() < 1e-10 {
                    let a = a.max(1e-12 * b);
                    1.0 / (z * (b / a).ln())
                } else {
                    let power = 1.0 - nu;
                    let norm = (b.powf(power) - a.max(0.0).powf(power)) / power;
                    z.powf(-nu) / norm
                }
            }
            Self::Uniform => 1.0 / (upper - lower),
        }
    }
}
