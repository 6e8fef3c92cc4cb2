//! Flat phase-space generation in the RAMBO scheme.
//!
//! Massless momenta are drawn isotropically and conformally mapped onto the
//! requested total momentum; outgoing masses are restored by a Newton
//! iteration on the common momentum rescaling factor. Weights are the exact
//! phase-space volumes of the flat measure.

use crate::momentum::FourVector;
use rand::Rng;

/// Flat `1 → n` phase-space generator at fixed total invariant mass.
#[derive(Clone, Debug)]
pub struct Rambo {
    masses: Vec<f64>,
    newton_iterations: usize,
}

impl Rambo {
    /// Creates a generator for the given outgoing masses.
    #[must_use]
    pub fn new(masses: Vec<f64>, newton_iterations: usize) -> Self {
        Self {
            masses,
            newton_iterations,
        }
    }

    /// Number of outgoing momenta.
    #[must_use]
    pub fn n_out(&self) -> usize {
        self.masses.len()
    }

    /// Generates `n` outgoing momenta in the centre-of-mass frame of a
    /// system with energy `sqrt_s`, returning them with the phase-space
    /// weight. Returns `None` below the mass threshold.
    pub fn generate<R: Rng>(&self, sqrt_s: f64, rng: &mut R) -> Option<(Vec<FourVector>, f64)> {
        let n = self.masses.len();
        if n < 2 || sqrt_s <= self.masses.iter().sum::<f64>() {
            return None;
        }
        // isotropic massless momenta with exponential energies
        let mut q = Vec::with_capacity(n);
        for _ in 0..n {
            let energy = -(rng.gen::<f64>() * rng.gen::<f64>()).ln();
            let cos_theta: f64 = 2.0 * rng.gen::<f64>() - 1.0;
            let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
            let phi = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
            q.push(FourVector::new(
                energy,
                energy * sin_theta * phi.cos(),
                energy * sin_theta * phi.sin(),
                energy * cos_theta,
            ));
        }
        // conformal map onto total momentum (sqrt_s, 0)
        let total = q.iter().fold(FourVector::ZERO, |sum, k| sum + *k);
        let m = total.mass();
        let b = [-total[1] / m, -total[2] / m, -total[3] / m];
        let gamma = total[0] / m;
        let a = 1.0 / (1.0 + gamma);
        let x = sqrt_s / m;
        let mut p = Vec::with_capacity(n);
        for k in &q {
            let bq = b[0] * k[1] + b[1] * k[2] + b[2] * k[3];
            p.push(FourVector::new(
                x * (gamma * k[0] + bq),
                x * (k[1] + b[0] * (k[0] + a * bq)),
                x * (k[2] + b[1] * (k[0] + a * bq)),
                x * (k[3] + b[2] * (k[0] + a * bq)),
            ));
        }
        let mut weight = massless_weight(n, sqrt_s);

        if self.masses.iter().any(|mass| *mass > 0.0) {
            let xi = self.solve_rescaling(sqrt_s, &p)?;
            let mut sum_k = 0.0;
            let mut product = 1.0;
            let mut sum_k2_over_e = 0.0;
            for (momentum, mass) in p.iter_mut().zip(&self.masses) {
                let modulus = xi * momentum.spatial();
                let energy = (mass * mass + modulus * modulus).sqrt();
                *momentum = FourVector::new(
                    energy,
                    xi * momentum[1],
                    xi * momentum[2],
                    xi * momentum[3],
                );
                sum_k += modulus;
                product *= modulus / energy;
                sum_k2_over_e += modulus * modulus / energy;
            }
            weight *= (sum_k / sqrt_s).powi(2 * n as i32 - 3) * product * sqrt_s / sum_k2_over_e;
        }
        Some((p, weight))
    }

    /// Newton iteration for the momentum rescaling restoring the masses.
    fn solve_rescaling(&self, sqrt_s: f64, massless: &[FourVector]) -> Option<f64> {
        let mass_sum: f64 = self.masses.iter().sum();
        let mut xi = (1.0 - (mass_sum / sqrt_s).powi(2)).max(0.0).sqrt();
        for _ in 0..self.newton_iterations.max(1) {
            let mut value = -sqrt_s;
            let mut derivative = 0.0;
            for (momentum, mass) in massless.iter().zip(&self.masses) {
                let k = momentum.spatial();
                let energy = (mass * mass + xi * xi * k * k).sqrt();
                value += energy;
                derivative += xi * k * k / energy;
            }
            if derivative <= 0.0 {
                return None;
            }
            xi -= value / derivative;
        }
        (xi.is_finite() && xi > 0.0).then_some(xi)
    }
}

/// Exact flat massless phase-space volume with the `(2π)⁴` convention.
fn massless_weight(n: usize, sqrt_s: f64) -> f64 {
    let s = sqrt_s * sqrt_s;
    let half_pi = std::f64::consts::FRAC_PI_2;
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut weight = half_pi.powi(n as i32 - 1) * s.powi(n as i32 - 2)
        / two_pi.powi(3 * n as i32 - 4);
    for k in 1..n {
        weight /= k as f64;
        if k < n - 1 {
            weight /= k as f64;
        }
    }
    weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn momenta_balance_and_sit_on_shell() {
        let masses = vec![0.0, 1.5, 80.0, 4.2];
        let rambo = Rambo::new(masses.clone(), 10);
        let mut rng = Pcg64::seed_from_u64(2);
        let sqrt_s = 500.0;
        for _ in 0..100 {
            let (p, weight) = rambo.generate(sqrt_s, &mut rng).unwrap();
            assert!(weight > 0.0);
            let total = p.iter().fold(FourVector::ZERO, |sum, k| sum + *k);
            assert!((total[0] - sqrt_s).abs() < 1e-8 * sqrt_s);
            for mu in 1..4 {
                assert!(total[mu].abs() < 1e-8 * sqrt_s);
            }
            for (momentum, mass) in p.iter().zip(&masses) {
                assert!((momentum.squared() - mass * mass).abs() < 1e-6 * sqrt_s * sqrt_s * 1e-4);
            }
        }
    }

    #[test]
    fn below_threshold_fails() {
        let rambo = Rambo::new(vec![60.0, 60.0], 10);
        let mut rng = Pcg64::seed_from_u64(4);
        assert!(rambo.generate(100.0, &mut rng).is_none());
    }

    #[test]
    fn two_body_weight_matches_the_closed_form() {
        // ∫ dΦ₂ = 1/(8π) for massless momenta in the (2π)⁴ convention
        let rambo = Rambo::new(vec![0.0, 0.0], 10);
        let mut rng = Pcg64::seed_from_u64(6);
        let (_, weight) = rambo.generate(100.0, &mut rng).unwrap();
        assert!((weight - 1.0 / (8.0 * std::f64::consts::PI)).abs() < 1e-12);
    }
}
