//! Lorentz structures of vertices, external wave functions and the strided
//! views the recursive relations operate on.
//!
//! Every vertex carries one [`LorentzStructure`]. Applying it for a given
//! produced leg writes the produced current's Lorentz block from the incoming
//! currents' blocks, walking the tensors through [`LegView`] strides so that
//! colour indices (which always trail the Lorentz and Dirac indices) can be
//! pinned from outside.

use crate::dirac::{self, Matrix4, Spinor};
use crate::momentum::FourVector;
use crate::tensor::Amplitude;

const METRIC: [f64; 4] = [1.0, -1.0, -1.0, -1.0];

/// Read-only strided view of one leg's Lorentz block.
#[derive(Clone, Copy)]
pub struct LegView<'a> {
    data: &'a [Amplitude],
    offset: usize,
    stride: usize,
}

impl<'a> LegView<'a> {
    /// Creates a view into `data`, starting at `offset` and advancing by
    /// `stride` per Lorentz/Dirac component.
    #[must_use]
    pub const fn new(data: &'a [Amplitude], offset: usize, stride: usize) -> Self {
        Self {
            data,
            offset,
            stride,
        }
    }

    /// Returns component `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Amplitude {
        self.data[self.offset + i * self.stride]
    }

    fn spinor(&self) -> Spinor {
        [self.get(0), self.get(1), self.get(2), self.get(3)]
    }
}

/// Mutable strided view of the produced leg's Lorentz block.
pub struct LegViewMut<'a> {
    data: &'a mut [Amplitude],
    offset: usize,
    stride: usize,
}

impl<'a> LegViewMut<'a> {
    /// Creates a mutable view, see [`LegView::new`].
    pub fn new(data: &'a mut [Amplitude], offset: usize, stride: usize) -> Self {
        Self {
            data,
            offset,
            stride,
        }
    }

    /// Adds `value` to component `i`.
    pub fn add(&mut self, i: usize, value: Amplitude) {
        self.data[self.offset + i * self.stride] += value;
    }
}

/// Minkowski contraction of two vector views.
fn dot_views(a: &LegView<'_>, b: &LegView<'_>) -> Amplitude {
    (0..4).map(|mu| METRIC[mu] * a.get(mu) * b.get(mu)).sum()
}

/// Minkowski contraction of a vector view with a real four-vector.
fn dot_momentum(a: &LegView<'_>, p: &FourVector) -> Amplitude {
    (0..4).map(|mu| METRIC[mu] * p[mu] * a.get(mu)).sum()
}

/// Contraction `γ·V` of the γ-matrices with a complex vector view.
fn gamma_dot(v: &LegView<'_>) -> Matrix4 {
    let g = dirac::gamma();
    let mut result = [[Amplitude::new(0.0, 0.0); 4]; 4];
    for mu in 0..4 {
        let coeff = METRIC[mu] * v.get(mu);
        for i in 0..4 {
            for j in 0..4 {
                result[i][j] += coeff * g[mu][i][j];
            }
        }
    }
    result
}

/// Fermion-flow variant of a Feynman rule, selected by the vertex dispatch.
///
/// The conjugated variants attach the charge-conjugation matrix to the right
/// or left fermion leg; the reversed variant transposes the kernel between
/// two conjugations. Ordinary Dirac vertices always dispatch `Natural`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleVariant {
    /// The rule as registered.
    Natural,
    /// Right charge-conjugated rule, `Γ C⁻¹`.
    RightConjugate,
    /// Left charge-conjugated rule, `C Γ`.
    LeftConjugate,
    /// Fully reversed rule, `C Γᵀ C⁻¹`.
    ReversedConjugate,
}

impl RuleVariant {
    fn transform(self, kernel: &Matrix4) -> Matrix4 {
        let cc = dirac::conjugation_matrix();
        match self {
            Self::Natural => *kernel,
            Self::RightConjugate => {
                let mut cinv = [[Amplitude::new(0.0, 0.0); 4]; 4];
                for i in 0..4 {
                    for j in 0..4 {
                        cinv[i][j] = -cc[j][i];
                    }
                }
                dirac::matmul(kernel, &cinv)
            }
            Self::LeftConjugate => dirac::matmul(cc, kernel),
            Self::ReversedConjugate => dirac::charge_conjugate(kernel),
        }
    }
}

/// Lorentz part of a vertex Feynman rule.
///
/// Fermionic structures order their legs as (boson, row spinor, column
/// spinor), so that the fermion pair always sits at slots 1 and 2; vector
/// structures use all-incoming momentum conventions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LorentzStructure {
    /// Cubic scalar self-coupling.
    ScalarCubic,
    /// Quartic scalar self-coupling.
    ScalarQuartic,
    /// Scalar coupling to a fermion bilinear, `φψ̄ψ`.
    Yukawa,
    /// Vector coupling to the fermion vector current, `V_μ ψ̄γ^μψ`.
    VectorFermion,
    /// Yang–Mills three-vector structure.
    TripleVector,
    /// Contact four-vector structure; the colour pairing index selects the
    /// metric-tensor combination.
    QuarticVector,
}

impl LorentzStructure {
    /// Number of legs of the structure.
    #[must_use]
    pub const fn legs(&self) -> usize {
        match self {
            Self::ScalarCubic | Self::Yukawa | Self::VectorFermion | Self::TripleVector => 3,
            Self::ScalarQuartic | Self::QuarticVector => 4,
        }
    }

    /// Tensor index ranges of leg `leg`, Lorentz and Dirac indices only.
    #[must_use]
    pub fn leg_ranges(&self, leg: usize) -> Vec<usize> {
        match self {
            Self::ScalarCubic | Self::ScalarQuartic => vec![],
            Self::Yukawa => {
                if leg == 0 {
                    vec![]
                } else {
                    vec![4]
                }
            }
            Self::VectorFermion => vec![4],
            Self::TripleVector | Self::QuarticVector => vec![4],
        }
    }

    /// Returns whether legs `1` and `2` are the fermionic pair.
    #[must_use]
    pub const fn is_fermionic(&self) -> bool {
        matches!(self, Self::Yukawa | Self::VectorFermion)
    }

    /// Applies the rule, adding the contribution of the incoming legs to the
    /// produced leg's block.
    ///
    /// `ins` holds one view per vertex leg except at `produced`; `momenta`
    /// are the incoming momenta per leg, with the produced leg's entry being
    /// the negated channel momentum. `pairing` selects the tensor pairing of
    /// [`Self::QuarticVector`] and is ignored elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if a required input view is missing.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        variant: RuleVariant,
        produced: usize,
        factor: Amplitude,
        out: &mut LegViewMut<'_>,
        ins: &[Option<LegView<'_>>; 4],
        momenta: &[FourVector; 4],
        pairing: u8,
    ) {
        let input = |slot: usize| ins[slot].as_ref().expect("missing input leg");
        match self {
            Self::ScalarCubic => {
                let (a, b) = two_slots(produced, 3);
                out.add(0, factor * input(a).get(0) * input(b).get(0));
            }
            Self::ScalarQuartic => {
                let (a, b, c) = three_slots(produced);
                out.add(
                    0,
                    factor * input(a).get(0) * input(b).get(0) * input(c).get(0),
                );
            }
            Self::Yukawa => {
                let unit = unit_kernel();
                self.apply_fermionic(&unit, variant, produced, factor, out, ins);
            }
            Self::VectorFermion => match produced {
                0 => {
                    let g = dirac::gamma();
                    let row = input(1).spinor();
                    let col = input(2).spinor();
                    for mu in 0..4 {
                        let kernel = variant.transform(&g[mu]);
                        let contracted = dirac::apply_column(&kernel, &col);
                        let value: Amplitude =
                            row.iter().zip(&contracted).map(|(r, c)| r * c).sum();
                        out.add(mu, factor * value);
                    }
                }
                produced => {
                    let kernel = variant.transform(&gamma_dot(input(0)));
                    if produced == 1 {
                        // the ψ̄ slot produces a column current
                        let col = dirac::apply_column(&kernel, &input(2).spinor());
                        for (i, x) in col.iter().enumerate() {
                            out.add(i, factor * x);
                        }
                    } else {
                        // the ψ slot produces a row current
                        let row = dirac::apply_row(&input(1).spinor(), &kernel);
                        for (i, x) in row.iter().enumerate() {
                            out.add(i, factor * x);
                        }
                    }
                }
            },
            Self::TripleVector => {
                let (a, b) = two_slots(produced, 3);
                let ja = input(a);
                let jb = input(b);
                let (pa, pb, pt) = (momenta[a], momenta[b], momenta[produced]);
                // V^{μ0μ1μ2} = g^{μ0μ1}(p0−p1)^{μ2} + g^{μ1μ2}(p1−p2)^{μ0}
                //            + g^{μ2μ0}(p2−p0)^{μ1}, contracted on slots a, b
                let mut value = [Amplitude::new(0.0, 0.0); 4];
                match produced {
                    0 => {
                        let c1 = dot_momentum(jb, &(pt - pa));
                        let c2 = dot_views(ja, jb);
                        let c3 = dot_momentum(ja, &(pb - pt));
                        let diff = pa - pb;
                        for (mu, v) in value.iter_mut().enumerate() {
                            *v = c1 * ja.get(mu) + c2 * diff[mu] + c3 * jb.get(mu);
                        }
                    }
                    1 => {
                        let c1 = dot_momentum(jb, &(pa - pt));
                        let c2 = dot_momentum(ja, &(pt - pb));
                        let c3 = dot_views(ja, jb);
                        let diff = pb - pa;
                        for (mu, v) in value.iter_mut().enumerate() {
                            *v = c1 * ja.get(mu) + c2 * jb.get(mu) + c3 * diff[mu];
                        }
                    }
                    _ => {
                        let c1 = dot_views(ja, jb);
                        let c2 = dot_momentum(ja, &(pb - pt));
                        let c3 = dot_momentum(jb, &(pt - pa));
                        let diff = pa - pb;
                        for (mu, v) in value.iter_mut().enumerate() {
                            *v = c1 * diff[mu] + c2 * jb.get(mu) + c3 * ja.get(mu);
                        }
                    }
                }
                for (mu, v) in value.iter().enumerate() {
                    out.add(mu, factor * v);
                }
            }
            Self::QuarticVector => {
                let (pair1, pair2) = match pairing {
                    0 => (((0, 2), (1, 3)), ((0, 3), (1, 2))),
                    1 => (((0, 1), (2, 3)), ((0, 3), (1, 2))),
                    _ => (((0, 1), (2, 3)), ((0, 2), (1, 3))),
                };
                add_double_metric(produced, pair1.0, pair1.1, factor, out, ins);
                add_double_metric(produced, pair2.0, pair2.1, -factor, out, ins);
            }
        }
    }

    fn apply_fermionic(
        &self,
        kernel: &Matrix4,
        variant: RuleVariant,
        produced: usize,
        factor: Amplitude,
        out: &mut LegViewMut<'_>,
        ins: &[Option<LegView<'_>>; 4],
    ) {
        let input = |slot: usize| ins[slot].as_ref().expect("missing input leg");
        let kernel = variant.transform(kernel);
        match produced {
            0 => {
                let row = input(1).spinor();
                let contracted = dirac::apply_column(&kernel, &input(2).spinor());
                let value: Amplitude = row.iter().zip(&contracted).map(|(r, c)| r * c).sum();
                out.add(0, factor * value);
            }
            1 => {
                let col = dirac::apply_column(&kernel, &input(2).spinor());
                let scalar = input(0).get(0);
                for (i, x) in col.iter().enumerate() {
                    out.add(i, factor * scalar * x);
                }
            }
            _ => {
                let row = dirac::apply_row(&input(1).spinor(), &kernel);
                let scalar = input(0).get(0);
                for (i, x) in row.iter().enumerate() {
                    out.add(i, factor * scalar * x);
                }
            }
        }
    }
}

fn unit_kernel() -> Matrix4 {
    let mut unit = [[Amplitude::new(0.0, 0.0); 4]; 4];
    for (i, row) in unit.iter_mut().enumerate() {
        row[i] = Amplitude::new(1.0, 0.0);
    }
    unit
}

/// The two slots of a cubic structure other than `produced`.
fn two_slots(produced: usize, legs: usize) -> (usize, usize) {
    debug_assert!(produced < legs);
    match produced {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// The three slots of a quartic structure other than `produced`.
fn three_slots(produced: usize) -> (usize, usize, usize) {
    match produced {
        0 => (1, 2, 3),
        1 => (0, 2, 3),
        2 => (0, 1, 3),
        _ => (0, 1, 2),
    }
}

/// Adds the contraction of `g^{ij} g^{kl}` with the three input vectors to
/// the produced leg.
fn add_double_metric(
    produced: usize,
    (i, j): (usize, usize),
    (k, l): (usize, usize),
    factor: Amplitude,
    out: &mut LegViewMut<'_>,
    ins: &[Option<LegView<'_>>; 4],
) {
    let input = |slot: usize| ins[slot].as_ref().expect("missing input leg");
    let (partner, other) = if produced == i {
        (j, (k, l))
    } else if produced == j {
        (i, (k, l))
    } else if produced == k {
        (l, (i, j))
    } else {
        (k, (i, j))
    };
    let scalar = dot_views(input(other.0), input(other.1));
    let partner = input(partner);
    for mu in 0..4 {
        out.add(mu, factor * scalar * partner.get(mu));
    }
}

/// Transverse polarisation vector of a massless or massive vector boson.
///
/// `helicity` is `-1`, `0` or `+1`; the longitudinal state requires a
/// positive `mass`. Outgoing legs use the complex conjugate.
#[must_use]
pub fn polarisation(p: &FourVector, mass: f64, helicity: i8, conjugate: bool) -> [Amplitude; 4] {
    let pt = p[1].hypot(p[2]);
    let pr = p.spatial();
    let (e1, e2): ([f64; 4], [f64; 4]) = if pt > 1e-14 * pr {
        let (st, ct) = (pt / pr, p[3] / pr);
        let (sp, cp) = (p[2] / pt, p[1] / pt);
        ([0.0, ct * cp, ct * sp, -st], [0.0, -sp, cp, 0.0])
    } else if p[3] >= 0.0 {
        ([0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0])
    } else {
        ([0.0, -1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0])
    };
    let mut eps = [Amplitude::new(0.0, 0.0); 4];
    match helicity {
        0 => {
            debug_assert!(mass > 0.0, "longitudinal state of a massless vector");
            let energy = (pr * pr + mass * mass).sqrt();
            eps[0] = Amplitude::new(pr / mass, 0.0);
            if pr > 0.0 {
                for mu in 1..4 {
                    eps[mu] = Amplitude::new(energy * p[mu] / (pr * mass), 0.0);
                }
            } else {
                eps[3] = Amplitude::new(1.0, 0.0);
            }
        }
        h => {
            let sign = -f64::from(h);
            let norm = 1.0 / 2.0_f64.sqrt();
            for mu in 0..4 {
                eps[mu] = Amplitude::new(sign * norm * e1[mu], -norm * f64::from(h) * e2[mu]);
            }
        }
    }
    if conjugate {
        for x in &mut eps {
            *x = x.conj();
        }
    }
    eps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polarisations_are_transverse_and_normalised() {
        let p = FourVector::new(5.0, 1.0, 2.0, 3.0_f64.sqrt() * 2.0);
        for h in [-1, 1] {
            let eps = polarisation(&p, 0.0, h, false);
            let kdot: Amplitude = (0..4).map(|mu| METRIC[mu] * p[mu] * eps[mu]).sum();
            assert!(kdot.norm() < 1e-12, "k·ε must vanish");
            let norm: Amplitude = (0..4)
                .map(|mu| METRIC[mu] * eps[mu] * eps[mu].conj())
                .sum();
            assert!((norm + Amplitude::new(1.0, 0.0)).norm() < 1e-12, "ε·ε* = −1");
        }
        // opposite helicities are orthogonal
        let plus = polarisation(&p, 0.0, 1, false);
        let minus = polarisation(&p, 0.0, -1, false);
        let cross: Amplitude = (0..4)
            .map(|mu| METRIC[mu] * plus[mu] * minus[mu].conj())
            .sum();
        assert!(cross.norm() < 1e-12);
    }

    #[test]
    fn longitudinal_polarisation() {
        let m: f64 = 3.0;
        let p = FourVector::new((16.0 + m * m).sqrt(), 0.0, 0.0, 4.0);
        let eps = polarisation(&p, m, 0, false);
        let kdot: Amplitude = (0..4).map(|mu| METRIC[mu] * p[mu] * eps[mu]).sum();
        assert!(kdot.norm() < 1e-12);
        let norm: Amplitude = (0..4)
            .map(|mu| METRIC[mu] * eps[mu] * eps[mu].conj())
            .sum();
        assert!((norm + Amplitude::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn scalar_cubic_rule() {
        let data_a = vec![Amplitude::new(2.0, 0.0)];
        let data_b = vec![Amplitude::new(0.0, 3.0)];
        let mut out_data = vec![Amplitude::new(0.0, 0.0)];
        let mut out = LegViewMut::new(&mut out_data, 0, 1);
        let ins = [
            None,
            Some(LegView::new(&data_a, 0, 1)),
            Some(LegView::new(&data_b, 0, 1)),
            None,
        ];
        LorentzStructure::ScalarCubic.apply(
            RuleVariant::Natural,
            0,
            Amplitude::new(1.0, 0.0),
            &mut out,
            &ins,
            &[FourVector::ZERO; 4],
            0,
        );
        assert_eq!(out_data[0], Amplitude::new(0.0, 6.0));
    }

    #[test]
    fn strided_views() {
        let data: Vec<Amplitude> = (0..8).map(|i| Amplitude::new(f64::from(i), 0.0)).collect();
        let view = LegView::new(&data, 1, 2);
        assert_eq!(view.get(0), Amplitude::new(1.0, 0.0));
        assert_eq!(view.get(3), Amplitude::new(7.0, 0.0));
    }
}
