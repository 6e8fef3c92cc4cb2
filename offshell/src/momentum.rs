//! Minkowski four-vectors with the (+,−,−,−) metric.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub, SubAssign};

/// A real four-vector. Component `0` is the energy.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FourVector(pub [f64; 4]);

impl FourVector {
    /// The zero vector.
    pub const ZERO: Self = Self([0.0; 4]);

    /// Constructs a four-vector from its components.
    #[must_use]
    pub const fn new(e: f64, x: f64, y: f64, z: f64) -> Self {
        Self([e, x, y, z])
    }

    /// Minkowski inner product with `other`.
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.0[0] * other.0[0] - self.0[1] * other.0[1] - self.0[2] * other.0[2]
            - self.0[3] * other.0[3]
    }

    /// Invariant square `p·p`.
    #[must_use]
    pub fn squared(&self) -> f64 {
        self.dot(self)
    }

    /// Squared length of the spatial part.
    #[must_use]
    pub fn spatial_squared(&self) -> f64 {
        self.0[1] * self.0[1] + self.0[2] * self.0[2] + self.0[3] * self.0[3]
    }

    /// Length of the spatial part.
    #[must_use]
    pub fn spatial(&self) -> f64 {
        self.spatial_squared().sqrt()
    }

    /// Invariant mass, zero for spacelike arguments.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.squared().max(0.0).sqrt()
    }

    /// Transverse momentum.
    #[must_use]
    pub fn pt(&self) -> f64 {
        self.0[1].hypot(self.0[2])
    }

    /// Azimuthal angle.
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.0[2].atan2(self.0[1])
    }

    /// Rapidity along the beam axis.
    #[must_use]
    pub fn rapidity(&self) -> f64 {
        0.5 * ((self.0[0] + self.0[3]) / (self.0[0] - self.0[3])).ln()
    }

    /// Polar angle with respect to the beam axis.
    #[must_use]
    pub fn theta(&self) -> f64 {
        let p = self.spatial();
        if p == 0.0 {
            return 0.0;
        }
        (self.0[3] / p).clamp(-1.0, 1.0).acos()
    }

    /// Angular separation `sqrt(Δy² + Δφ²)` with `other`.
    #[must_use]
    pub fn delta_r(&self, other: &Self) -> f64 {
        let dy = self.rapidity() - other.rapidity();
        let mut dphi = (self.phi() - other.phi()).abs();
        if dphi > std::f64::consts::PI {
            dphi = 2.0 * std::f64::consts::PI - dphi;
        }
        dy.hypot(dphi)
    }

    /// Boosts `self` from the rest frame of `frame` to the frame in which
    /// `frame` is given. `frame` must be timelike.
    #[must_use]
    pub fn boosted_from_rest_frame_of(&self, frame: &Self) -> Self {
        let m = frame.mass();
        debug_assert!(m > 0.0, "boost frame must be timelike");
        let bp = self.0[1] * frame.0[1] + self.0[2] * frame.0[2] + self.0[3] * frame.0[3];
        let gamma = frame.0[0] / m;
        let c = bp / (m * (frame.0[0] + m)) + self.0[0] / m;
        Self([
            gamma * self.0[0] + bp / m,
            self.0[1] + c * frame.0[1],
            self.0[2] + c * frame.0[2],
            self.0[3] + c * frame.0[3],
        ])
    }

    /// Boosts `self` into the rest frame of `frame`.
    #[must_use]
    pub fn boosted_to_rest_frame_of(&self, frame: &Self) -> Self {
        let reversed = Self([frame.0[0], -frame.0[1], -frame.0[2], -frame.0[3]]);
        self.boosted_from_rest_frame_of(&reversed)
    }
}

/// Källén triangle function `λ(a, b, c)`.
#[must_use]
pub fn kallen(a: f64, b: f64, c: f64) -> f64 {
    a * a + b * b + c * c - 2.0 * (a * b + b * c + c * a)
}

/// Momentum of either decay product of a particle with squared mass `s`
/// decaying into squared masses `s1` and `s2`, in the parent rest frame.
/// Returns `None` below threshold.
#[must_use]
pub fn two_body_momentum(s: f64, s1: f64, s2: f64) -> Option<f64> {
    let lambda = kallen(s, s1, s2);
    if lambda < 0.0 || s <= 0.0 {
        return None;
    }
    Some(lambda.sqrt() / (2.0 * s.sqrt()))
}

impl Index<usize> for FourVector {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for FourVector {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Add for FourVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self([
            self.0[0] + rhs.0[0],
            self.0[1] + rhs.0[1],
            self.0[2] + rhs.0[2],
            self.0[3] + rhs.0[3],
        ])
    }
}

impl Sub for FourVector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self([
            self.0[0] - rhs.0[0],
            self.0[1] - rhs.0[1],
            self.0[2] - rhs.0[2],
            self.0[3] - rhs.0[3],
        ])
    }
}

impl Neg for FourVector {
    type Output = Self;

    fn neg(self) -> Self {
        Self([-self.0[0], -self.0[1], -self.0[2], -self.0[3]])
    }
}

impl Mul<FourVector> for f64 {
    type Output = FourVector;

    fn mul(self, rhs: FourVector) -> FourVector {
        FourVector([
            self * rhs.0[0],
            self * rhs.0[1],
            self * rhs.0[2],
            self * rhs.0[3],
        ])
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for FourVector {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric() {
        let p = FourVector::new(2.0, 1.0, 0.0, 1.0);
        assert_eq!(p.squared(), 2.0);
        assert_eq!(p.pt(), 1.0);
    }

    #[test]
    fn boost_round_trip() {
        let frame = FourVector::new(5.0, 1.0, 2.0, 3.0);
        let p = FourVector::new(2.0, 0.3, -0.4, 0.1);
        let q = p
            .boosted_from_rest_frame_of(&frame)
            .boosted_to_rest_frame_of(&frame);
        for i in 0..4 {
            assert!((q[i] - p[i]).abs() < 1e-12);
        }
        // the invariant square is preserved
        let r = p.boosted_from_rest_frame_of(&frame);
        assert!((r.squared() - p.squared()).abs() < 1e-12);
    }

    #[test]
    fn boost_of_rest_vector_reproduces_frame() {
        let frame = FourVector::new(5.0, 1.0, 2.0, 3.0);
        let rest = FourVector::new(frame.mass(), 0.0, 0.0, 0.0);
        let p = rest.boosted_from_rest_frame_of(&frame);
        for i in 0..4 {
            assert!((p[i] - frame[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn kallen_threshold() {
        assert_eq!(kallen(1.0, 0.0, 0.0), 1.0);
        assert!(two_body_momentum(1.0, 0.3, 0.4).is_none());
        let p = two_body_momentum(100.0, 0.0, 0.0).unwrap();
        assert!((p - 5.0).abs() < 1e-12);
    }
}
