//! Colour representations and sparse colour tensors.
//!
//! Vertex colour structures are compiled once, at vertex registration, into
//! flat lists of non-zero entries: per term one colour offset per leg and one
//! scalar coefficient. The recursion then walks these lists instead of nested
//! index loops. The SU(N) tables (generators and structure constants) are
//! built numerically for arbitrary N, and the colour-flow variants are
//! obtained by transporting every adjoint index with `√2 T^a`, which keeps
//! the flow basis exactly equivalent to the adjoint one.

use crate::tensor::Amplitude;

/// Colour transformation property of a particle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColourRep {
    /// Colour singlet.
    Singlet,
    /// Fundamental representation.
    Fundamental,
    /// Anti-fundamental representation.
    AntiFundamental,
    /// Adjoint representation with a single gluon index.
    Adjoint,
    /// Adjoint representation in the colour-flow basis, carried as a
    /// (fundamental, anti-fundamental) index pair.
    FlowAdjoint,
}

impl ColourRep {
    /// Tensor index ranges contributed by the representation.
    #[must_use]
    pub fn ranges(&self, nc: usize) -> Vec<usize> {
        match self {
            Self::Singlet => vec![],
            Self::Fundamental | Self::AntiFundamental => vec![nc],
            Self::Adjoint => vec![nc * nc - 1],
            Self::FlowAdjoint => vec![nc, nc],
        }
    }

    /// Total number of colour degrees of freedom.
    #[must_use]
    pub fn dof(&self, nc: usize) -> usize {
        self.ranges(nc).iter().product::<usize>().max(1)
    }

    /// Colour orientation of index `i`: `+1` for a colour index, `-1` for an
    /// anti-colour index and `0` for anything else.
    #[must_use]
    pub const fn colour_type(&self, i: usize) -> i8 {
        match (self, i) {
            (Self::Fundamental, 0) | (Self::FlowAdjoint, 0) => 1,
            (Self::AntiFundamental, 0) | (Self::FlowAdjoint, 1) => -1,
            _ => 0,
        }
    }

    /// Returns the conjugate representation.
    #[must_use]
    pub const fn conjugate(&self) -> Self {
        match self {
            Self::Fundamental => Self::AntiFundamental,
            Self::AntiFundamental => Self::Fundamental,
            other => *other,
        }
    }
}

/// Numerical SU(N) data shared by a model.
#[derive(Clone, Debug)]
pub struct SuN {
    nc: usize,
    /// Generators in the generalised Gell-Mann basis, `tr(TᵃTᵇ) = δᵃᵇ/2`.
    generators: Vec<Vec<Vec<Amplitude>>>,
    /// Dense structure-constant table, indexed as `(a·rank + b)·rank + c`.
    f: Vec<f64>,
}

impl SuN {
    /// Builds the group data for `nc` colours.
    ///
    /// # Panics
    ///
    /// Panics if `nc < 2`.
    #[must_use]
    pub fn new(nc: usize) -> Self {
        assert!(nc >= 2, "SU(N) needs at least two colours");
        let mut generators = Vec::with_capacity(nc * nc - 1);
        let zero = vec![vec![Amplitude::new(0.0, 0.0); nc]; nc];
        for i in 0..nc {
            for j in i + 1..nc {
                let mut sym = zero.clone();
                sym[i][j] = Amplitude::new(0.5, 0.0);
                sym[j][i] = Amplitude::new(0.5, 0.0);
                generators.push(sym);
                let mut asym = zero.clone();
                asym[i][j] = Amplitude::new(0.0, -0.5);
                asym[j][i] = Amplitude::new(0.0, 0.5);
                generators.push(asym);
            }
        }
        for l in 1..nc {
            let norm = 1.0 / (2.0 * l as f64 * (l as f64 + 1.0)).sqrt();
            let mut diag = zero.clone();
            for (k, row) in diag.iter_mut().enumerate().take(l) {
                row[k] = Amplitude::new(norm, 0.0);
            }
            diag[l][l] = Amplitude::new(-(l as f64) * norm, 0.0);
            generators.push(diag);
        }

        let rank = generators.len();
        let mut f = vec![0.0; rank * rank * rank];
        for a in 0..rank {
            for b in 0..rank {
                for c in 0..rank {
                    // f^{abc} = −2i tr([Tᵃ, Tᵇ] Tᶜ)
                    let mut trace = Amplitude::new(0.0, 0.0);
                    for i in 0..nc {
                        for j in 0..nc {
                            for k in 0..nc {
                                let comm = generators[a][i][j] * generators[b][j][k]
                                    - generators[b][i][j] * generators[a][j][k];
                                trace += comm * generators[c][k][i];
                            }
                        }
                    }
                    let value = (Amplitude::new(0.0, -2.0) * trace).re;
                    if value.abs() > 1e-12 {
                        f[(a * rank + b) * rank + c] = value;
                    }
                }
            }
        }
        Self { nc, generators, f }
    }

    /// Number of colours.
    #[must_use]
    pub const fn nc(&self) -> usize {
        self.nc
    }

    /// Dimension of the adjoint representation.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.generators.len()
    }

    /// Generator entry `Tᵃ_{ij}`.
    #[must_use]
    pub fn generator(&self, a: usize, i: usize, j: usize) -> Amplitude {
        self.generators[a][i][j]
    }

    /// Structure constant `f^{abc}`.
    #[must_use]
    pub fn structure_constant(&self, a: usize, b: usize, c: usize) -> f64 {
        self.f[(a * self.rank() + b) * self.rank() + c]
    }
}

/// Colour part of a vertex, identified by the leg slots it acts on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColourStructure {
    /// No coloured legs.
    None,
    /// Kronecker delta between a fundamental and an anti-fundamental leg.
    FundamentalDelta(usize, usize),
    /// Generator `Tᵃ_{ij}` between an adjoint leg and a fundamental pair.
    Generator {
        /// Leg carrying the adjoint index.
        adjoint: usize,
        /// Leg contracted with the row index of the generator matrix.
        row: usize,
        /// Leg contracted with the column index of the generator matrix.
        col: usize,
    },
    /// Structure constants `f^{abc}` over three adjoint legs.
    StructureConstants,
    /// Contracted structure constants `f^{abe}f^{cde}` plus its two other
    /// pairings over four adjoint legs.
    DoubleStructureConstants,
}

/// One non-zero entry of a compiled colour tensor.
#[derive(Clone, Copy, Debug)]
pub struct ColourTerm {
    /// Colour block offset per vertex leg.
    pub offsets: [u32; 4],
    /// Scalar coefficient.
    pub coeff: Amplitude,
    /// Metric-pairing selector for quartic vector structures.
    pub pairing: u8,
}

/// Compiled sparse form of a colour structure.
#[derive(Clone, Debug, Default)]
pub struct CompiledColour {
    /// Non-zero entries.
    pub terms: Vec<ColourTerm>,
}

impl ColourStructure {
    /// Compiles the structure into its non-zero entries.
    ///
    /// `flow` selects the colour-flow basis, in which every adjoint index is
    /// transported to a fundamental pair with `√2 Tᵃ`.
    #[must_use]
    pub fn compile(&self, group: &SuN, flow: bool) -> CompiledColour {
        let terms = match self {
            Self::None => vec![ColourTerm {
                offsets: [0; 4],
                coeff: Amplitude::new(1.0, 0.0),
                pairing: 0,
            }],
            Self::FundamentalDelta(i, j) => (0..group.nc())
                .map(|c| {
                    let mut offsets = [0; 4];
                    offsets[*i] = c as u32;
                    offsets[*j] = c as u32;
                    ColourTerm {
                        offsets,
                        coeff: Amplitude::new(1.0, 0.0),
                        pairing: 0,
                    }
                })
                .collect(),
            Self::Generator { adjoint, row, col } => {
                let mut terms = Vec::new();
                for (gluon, coeff) in adjoint_states(group, flow) {
                    for i in 0..group.nc() {
                        for j in 0..group.nc() {
                            let value: Amplitude = coeff
                                .iter()
                                .map(|(a, w)| w * group.generator(*a, i, j))
                                .sum();
                            if value.norm() <= 1e-12 {
                                continue;
                            }
                            let mut offsets = [0; 4];
                            offsets[*adjoint] = gluon;
                            offsets[*row] = i as u32;
                            offsets[*col] = j as u32;
                            terms.push(ColourTerm {
                                offsets,
                                coeff: value,
                                pairing: 0,
                            });
                        }
                    }
                }
                terms
            }
            Self::StructureConstants => {
                let states = adjoint_states(group, flow);
                let mut terms = Vec::new();
                for (ga, ca) in &states {
                    for (gb, cb) in &states {
                        for (gc, cc) in &states {
                            let mut value = Amplitude::new(0.0, 0.0);
                            for (a, wa) in ca {
                                for (b, wb) in cb {
                                    for (c, wc) in cc {
                                        let f = group.structure_constant(*a, *b, *c);
                                        if f != 0.0 {
                                            value += wa * wb * wc * f;
                                        }
                                    }
                                }
                            }
                            if value.norm() > 1e-12 {
                                terms.push(ColourTerm {
                                    offsets: [*ga, *gb, *gc, 0],
                                    coeff: value,
                                    pairing: 0,
                                });
                            }
                        }
                    }
                }
                terms
            }
            Self::DoubleStructureConstants => {
                let states = adjoint_states(group, flow);
                let pairings: [[usize; 4]; 3] = [[0, 1, 2, 3], [0, 2, 1, 3], [0, 3, 1, 2]];
                let mut terms = Vec::new();
                for (pairing, order) in pairings.iter().enumerate() {
                    for entry in contracted_ff(group, &states, *order) {
                        terms.push(ColourTerm {
                            offsets: entry.0,
                            coeff: entry.1,
                            pairing: pairing as u8,
                        });
                    }
                }
                terms
            }
        };
        CompiledColour { terms }
    }
}

/// Adjoint index states of one leg. In the adjoint basis each state is one
/// generator label with unit weight; in the flow basis each state is a
/// fundamental pair `(i, j)` carrying the weights `√2 Tᵃ_{ij}` over all
/// generator labels.
fn adjoint_states(group: &SuN, flow: bool) -> Vec<(u32, Vec<(usize, Amplitude)>)> {
    if flow {
        let sqrt2 = 2.0_f64.sqrt();
        let mut states = Vec::new();
        for i in 0..group.nc() {
            for j in 0..group.nc() {
                let weights = (0..group.rank())
                    .map(|a| (a, sqrt2 * group.generator(a, i, j)))
                    .filter(|(_, w)| w.norm() > 1e-12)
                    .collect();
                states.push(((i * group.nc() + j) as u32, weights));
            }
        }
        states
    } else {
        (0..group.rank())
            .map(|a| (a as u32, vec![(a, Amplitude::new(1.0, 0.0))]))
            .collect()
    }
}

/// Computes `Σ_e f^{x0 x1 e} f^{x2 x3 e}` over the given leg permutation in
/// the chosen basis.
fn contracted_ff(
    group: &SuN,
    states: &[(u32, Vec<(usize, Amplitude)>)],
    order: [usize; 4],
) -> Vec<([u32; 4], Amplitude)> {
    let rank = group.rank();
    // f^{abe} with the pair (a, b) transported to the basis of the legs
    let mut half: Vec<Vec<Vec<Amplitude>>> =
        vec![vec![vec![Amplitude::new(0.0, 0.0); rank]; states.len()]; states.len()];
    for (sa, (_, ca)) in states.iter().enumerate() {
        for (sb, (_, cb)) in states.iter().enumerate() {
            for (a, wa) in ca {
                for (b, wb) in cb {
                    for e in 0..rank {
                        let f = group.structure_constant(*a, *b, e);
                        if f != 0.0 {
                            half[sa][sb][e] += wa * wb * f;
                        }
                    }
                }
            }
        }
    }
    let mut result = Vec::new();
    for (s0, row0) in half.iter().enumerate() {
        for (s1, left) in row0.iter().enumerate() {
            for (s2, row2) in half.iter().enumerate() {
                for (s3, right) in row2.iter().enumerate() {
                    let value: Amplitude = left.iter().zip(right).map(|(x, y)| x * y).sum();
                    if value.norm() > 1e-12 {
                        let mut offsets = [0_u32; 4];
                        offsets[order[0]] = states[s0].0;
                        offsets[order[1]] = states[s1].0;
                        offsets[order[2]] = states[s2].0;
                        offsets[order[3]] = states[s3].0;
                        result.push((offsets, value));
                    }
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_normalisation() {
        let su3 = SuN::new(3);
        assert_eq!(su3.rank(), 8);
        for a in 0..8 {
            for b in 0..8 {
                let mut trace = Amplitude::new(0.0, 0.0);
                for i in 0..3 {
                    for j in 0..3 {
                        trace += su3.generator(a, i, j) * su3.generator(b, j, i);
                    }
                }
                let expected = if a == b { 0.5 } else { 0.0 };
                assert!((trace - Amplitude::new(expected, 0.0)).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn structure_constants_are_antisymmetric() {
        let su3 = SuN::new(3);
        for a in 0..8 {
            for b in 0..8 {
                for c in 0..8 {
                    let f = su3.structure_constant(a, b, c);
                    assert!((f + su3.structure_constant(b, a, c)).abs() < 1e-12);
                    assert!((f - su3.structure_constant(b, c, a)).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn casimir_of_the_fundamental() {
        let su3 = SuN::new(3);
        // Σₐ (TᵃTᵃ)_{ij} = C_F δ_{ij} with C_F = (N²−1)/(2N)
        for i in 0..3 {
            for j in 0..3 {
                let mut sum = Amplitude::new(0.0, 0.0);
                for a in 0..8 {
                    for k in 0..3 {
                        sum += su3.generator(a, i, k) * su3.generator(a, k, j);
                    }
                }
                let expected = if i == j { 4.0 / 3.0 } else { 0.0 };
                assert!((sum - Amplitude::new(expected, 0.0)).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn compiled_generator_matches_table() {
        let su3 = SuN::new(3);
        let compiled = ColourStructure::Generator {
            adjoint: 2,
            row: 0,
            col: 1,
        }
        .compile(&su3, false);
        for term in &compiled.terms {
            let expected = su3.generator(
                term.offsets[2] as usize,
                term.offsets[0] as usize,
                term.offsets[1] as usize,
            );
            assert!((term.coeff - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn flow_generator_contains_trace_subtraction() {
        let su3 = SuN::new(3);
        let compiled = ColourStructure::Generator {
            adjoint: 0,
            row: 1,
            col: 2,
        }
        .compile(&su3, true);
        // Fierz: √2 Σₐ Tᵃ_{ij}Tᵃ_{kl} = (δ_{il}δ_{kj} − δ_{ij}δ_{kl}/N)/√2
        let coeff = |i: u32, j: u32, k: u32, l: u32| -> Amplitude {
            compiled
                .terms
                .iter()
                .find(|t| t.offsets[0] == 3 * i + j && t.offsets[1] == k && t.offsets[2] == l)
                .map_or(Amplitude::new(0.0, 0.0), |t| t.coeff)
        };
        let inv_sqrt2 = 1.0 / 2.0_f64.sqrt();
        assert!((coeff(0, 1, 1, 0) - Amplitude::new(inv_sqrt2, 0.0)).norm() < 1e-12);
        assert!((coeff(0, 0, 0, 0) - Amplitude::new(inv_sqrt2 * 2.0 / 3.0, 0.0)).norm() < 1e-12);
        assert!((coeff(0, 0, 1, 1) - Amplitude::new(-inv_sqrt2 / 3.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn flow_and_adjoint_triple_structures_have_equal_norm() {
        let su3 = SuN::new(3);
        let adjoint = ColourStructure::StructureConstants.compile(&su3, false);
        let flow = ColourStructure::StructureConstants.compile(&su3, true);
        let norm = |c: &CompiledColour| -> f64 { c.terms.iter().map(|t| t.coeff.norm_sqr()).sum() };
        // the flow transport is an isometry on every leg
        assert!((norm(&adjoint) - norm(&flow)).abs() < 1e-9);
        // f^{abc}f^{abc} = N(N²−1)
        assert!((norm(&adjoint) - 24.0).abs() < 1e-9);
    }
}
