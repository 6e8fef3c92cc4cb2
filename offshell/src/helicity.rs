//! Helicity samplers.
//!
//! Each sampler assigns the helicity degrees of freedom of every external
//! leg of the selected subprocess and returns the statistical weight that
//! makes the event estimate the helicity-summed squared amplitude.

use crate::algorithm::Algorithm;
use crate::config::HelicityGenerators;
use crate::tensor::Amplitude;
use rand::Rng;

/// Helicity sampling strategy bound to an algorithm's leg structure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HelicitySampler {
    /// One uniformly drawn helicity per leg; the weight is the product of
    /// the helicity multiplicities.
    Uniform,
    /// Random spin wave functions on the complex unit sphere, scaled so
    /// the weight stays one.
    Continuous,
    /// Exact summation through the algorithm, weight one.
    Summed,
}

impl HelicitySampler {
    /// Creates the sampler matching the configuration.
    #[must_use]
    pub const fn from_settings(generator: HelicityGenerators) -> Self {
        match generator {
            HelicityGenerators::Uniform => Self::Uniform,
            HelicityGenerators::Continuous => Self::Continuous,
            HelicityGenerators::SpinorSum => Self::Summed,
        }
    }

    /// Assigns helicities to every leg and returns the sampling weight.
    pub fn generate<R: Rng>(&self, algorithm: &mut Algorithm<'_>, rng: &mut R) -> f64 {
        let n = algorithm.n_external();
        match self {
            Self::Uniform => {
                let mut weight = 1.0;
                for leg in 0..n {
                    let dof = algorithm.particle(leg).spin_dof();
                    algorithm.set_helicity(leg, rng.gen_range(0..dof));
                    weight *= dof as f64;
                }
                weight
            }
            Self::Continuous => {
                for leg in 0..n {
                    let particle = algorithm.particle(leg);
                    let dof = particle.spin_dof();
                    let momentum = algorithm.momentum(leg);
                    let outgoing = leg >= algorithm.n_in();
                    let coefficients = random_sphere(dof, rng);
                    // superpose the helicity basis states; the √dof scale
                    // keeps the event weight at one
                    let mut wave = vec![
                        Amplitude::new(0.0, 0.0);
                        particle.wave_function(&momentum, 0, outgoing).len()
                    ];
                    for (index, coefficient) in coefficients.iter().enumerate() {
                        let basis = particle.wave_function(&momentum, index, outgoing);
                        for (slot, value) in basis.iter().enumerate() {
                            wave[slot] += coefficient * value;
                        }
                    }
                    algorithm.set_spin_wave(leg, wave);
                }
                1.0
            }
            Self::Summed => {
                for leg in 0..n {
                    algorithm.sum_helicity(leg);
                }
                1.0
            }
        }
    }

    /// Helicity labels of the last assignment, for the event record. The
    /// continuous and summed modes report nine as the undefined marker.
    #[must_use]
    pub fn labels(&self, algorithm: &Algorithm<'_>) -> Vec<i8> {
        let n = algorithm.n_external();
        match self {
            Self::Uniform => (0..n)
                .map(|leg| {
                    let particle = algorithm.particle(leg);
                    particle.helicity_label(algorithm.helicity(leg))
                })
                .collect(),
            _ => vec![9; n],
        }
    }
}

/// A uniformly distributed point on the complex unit sphere of the given
/// dimension, scaled by `√dim`.
pub fn random_sphere<R: Rng>(dim: usize, rng: &mut R) -> Vec<Amplitude> {
    loop {
        let mut point: Vec<Amplitude> = (0..dim)
            .map(|_| Amplitude::new(gaussian(rng), gaussian(rng)))
            .collect();
        let norm: f64 = point.iter().map(num_complex::Complex::norm_sqr).sum();
        if norm > 1e-30 {
            let scale = (dim as f64 / norm).sqrt();
            for value in &mut point {
                *value *= scale;
            }
            return point;
        }
    }
}

/// Standard normal variate by Box-Muller.
fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let v: f64 = rng.gen();
    (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn sphere_points_are_normalised() {
        let mut rng = Pcg64::seed_from_u64(41);
        for dim in [1, 2, 3, 8] {
            let point = random_sphere(dim, &mut rng);
            let norm: f64 = point.iter().map(num_complex::Complex::norm_sqr).sum();
            assert!((norm - dim as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn sphere_mean_projector_is_isotropic() {
        let mut rng = Pcg64::seed_from_u64(43);
        let dim = 3;
        let n = 20_000;
        let mut diagonal = vec![0.0; dim];
        for _ in 0..n {
            let point = random_sphere(dim, &mut rng);
            for (slot, value) in point.iter().enumerate() {
                diagonal[slot] += value.norm_sqr() / f64::from(n);
            }
        }
        // E[|c_i|²] = 1 with the √dim scale
        for value in diagonal {
            assert!((value - 1.0).abs() < 0.05);
        }
    }
}
