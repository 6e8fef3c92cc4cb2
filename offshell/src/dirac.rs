//! Dirac algebra in the Weyl (chiral) representation.
//!
//! Spinor components are ordered as the two left-handed components followed
//! by the two right-handed ones. Helicity arguments take the values `+1` and
//! `-1`, meaning helicity `±1/2`.

use crate::momentum::FourVector;
use crate::tensor::Amplitude;
use std::sync::OnceLock;

/// A 4×4 complex matrix in spinor space.
pub type Matrix4 = [[Amplitude; 4]; 4];

/// A four-component spinor.
pub type Spinor = [Amplitude; 4];

const fn c(re: f64, im: f64) -> Amplitude {
    Amplitude::new(re, im)
}

fn zero_matrix() -> Matrix4 {
    [[c(0.0, 0.0); 4]; 4]
}

/// Returns the four γ-matrices with upper Lorentz index.
pub fn gamma() -> &'static [Matrix4; 4] {
    static GAMMA: OnceLock<[Matrix4; 4]> = OnceLock::new();
    GAMMA.get_or_init(|| {
        let o = c(0.0, 0.0);
        let e = c(1.0, 0.0);
        let i = c(0.0, 1.0);
        let g0 = [[o, o, e, o], [o, o, o, e], [e, o, o, o], [o, e, o, o]];
        let g1 = [[o, o, o, e], [o, o, e, o], [o, -e, o, o], [-e, o, o, o]];
        let g2 = [[o, o, o, -i], [o, o, i, o], [o, i, o, o], [-i, o, o, o]];
        let g3 = [[o, o, e, o], [o, o, o, -e], [-e, o, o, o], [o, e, o, o]];
        [g0, g1, g2, g3]
    })
}

/// Returns the charge-conjugation matrix `C = iγ²γ⁰`.
pub fn conjugation_matrix() -> &'static Matrix4 {
    static C: OnceLock<Matrix4> = OnceLock::new();
    C.get_or_init(|| {
        let g = gamma();
        let mut ig2 = zero_matrix();
        for (row, g2row) in ig2.iter_mut().zip(&g[2]) {
            for (x, y) in row.iter_mut().zip(g2row) {
                *x = c(0.0, 1.0) * y;
            }
        }
        matmul(&ig2, &g[0])
    })
}

/// Matrix product.
#[must_use]
pub fn matmul(a: &Matrix4, b: &Matrix4) -> Matrix4 {
    let mut result = zero_matrix();
    for i in 0..4 {
        for k in 0..4 {
            if a[i][k].norm_sqr() == 0.0 {
                continue;
            }
            for j in 0..4 {
                result[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    result
}

/// Transforms a vertex kernel to its charge-conjugated form `C Γᵀ C⁻¹`.
#[must_use]
pub fn charge_conjugate(kernel: &Matrix4) -> Matrix4 {
    let cc = conjugation_matrix();
    // C is unitary and antisymmetric in this representation, so the inverse
    // is the negated transpose
    let mut cinv = zero_matrix();
    for i in 0..4 {
        for j in 0..4 {
            cinv[i][j] = -cc[j][i];
        }
    }
    let mut transposed = zero_matrix();
    for i in 0..4 {
        for j in 0..4 {
            transposed[i][j] = kernel[j][i];
        }
    }
    matmul(&matmul(cc, &transposed), &cinv)
}

/// Contraction `γ·p` with a real four-vector, i.e. `γ⁰p⁰ − γ⃗·p⃗`.
#[must_use]
pub fn slash(p: &FourVector) -> Matrix4 {
    let g = gamma();
    let mut result = zero_matrix();
    let signs = [p[0], -p[1], -p[2], -p[3]];
    for (mu, sign) in signs.iter().copied().enumerate() {
        for i in 0..4 {
            for j in 0..4 {
                result[i][j] += sign * g[mu][i][j];
            }
        }
    }
    result
}

/// Applies a matrix to a column spinor.
#[must_use]
pub fn apply_column(m: &Matrix4, v: &Spinor) -> Spinor {
    let mut result = [c(0.0, 0.0); 4];
    for (i, row) in m.iter().enumerate() {
        for (j, x) in row.iter().enumerate() {
            result[i] += x * v[j];
        }
    }
    result
}

/// Applies a matrix to a row spinor from the right.
#[must_use]
pub fn apply_row(v: &Spinor, m: &Matrix4) -> Spinor {
    let mut result = [c(0.0, 0.0); 4];
    for (i, row) in m.iter().enumerate() {
        for (j, r) in result.iter_mut().enumerate() {
            *r += v[i] * row[j];
        }
    }
    result
}

/// Two-component helicity eigenspinor of the direction of `p`.
fn chi(p: &FourVector, helicity: i8) -> [Amplitude; 2] {
    let pt = p[1].hypot(p[2]);
    let pr = p.spatial();
    if pr == 0.0 {
        // rest frame, quantise along the z axis
        return if helicity > 0 {
            [c(1.0, 0.0), c(0.0, 0.0)]
        } else {
            [c(0.0, 0.0), c(1.0, 0.0)]
        };
    }
    if pt == 0.0 {
        // along the z axis the azimuth is undefined; fix the phase
        return match (helicity > 0, p[3] > 0.0) {
            (true, true) => [c(1.0, 0.0), c(0.0, 0.0)],
            (true, false) => [c(0.0, 0.0), c(1.0, 0.0)],
            (false, true) => [c(0.0, 0.0), c(1.0, 0.0)],
            (false, false) => [c(-1.0, 0.0), c(0.0, 0.0)],
        };
    }
    let cos_half = ((1.0 + p[3] / pr) / 2.0).sqrt();
    let sin_half = ((1.0 - p[3] / pr) / 2.0).sqrt();
    let phase = c(p[1] / pt, p[2] / pt);
    if helicity > 0 {
        [c(cos_half, 0.0), phase * sin_half]
    } else {
        [phase.conj() * (-sin_half), c(cos_half, 0.0)]
    }
}

/// Particle spinor `u(p, λ)`.
#[must_use]
pub fn u_spinor(p: &FourVector, mass: f64, helicity: i8) -> Spinor {
    let pr = p.spatial();
    let energy = (pr * pr + mass * mass).sqrt();
    let h = f64::from(helicity);
    let lower = (energy - h * pr).max(0.0).sqrt();
    let upper = (energy + h * pr).max(0.0).sqrt();
    let x = chi(p, helicity);
    [x[0] * lower, x[1] * lower, x[0] * upper, x[1] * upper]
}

/// Antiparticle spinor `v(p, λ)`.
#[must_use]
pub fn v_spinor(p: &FourVector, mass: f64, helicity: i8) -> Spinor {
    let pr = p.spatial();
    let energy = (pr * pr + mass * mass).sqrt();
    let h = f64::from(helicity);
    let lower = (energy + h * pr).max(0.0).sqrt();
    let upper = (energy - h * pr).max(0.0).sqrt();
    let x = chi(p, -helicity);
    [
        x[0] * (-h * lower),
        x[1] * (-h * lower),
        x[0] * (h * upper),
        x[1] * (h * upper),
    ]
}

/// Row spinor `ū = u†γ⁰`.
#[must_use]
pub fn bar(s: &Spinor) -> Spinor {
    [s[2].conj(), s[3].conj(), s[0].conj(), s[1].conj()]
}
