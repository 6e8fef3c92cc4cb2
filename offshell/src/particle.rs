//! Particle descriptors.
//!
//! A [`Particle`] is static metadata owned by the model registry: name,
//! spin, mass and width, fermion number, colour representation and the link
//! to its anti-particle. Wave-function construction, propagator application
//! and the final-leg contraction dispatch on this data.

use crate::colour::ColourRep;
use crate::dirac;
use crate::lorentz;
use crate::momentum::FourVector;
use crate::tensor::{Amplitude, Tensor};

/// Internal flavour index, assigned in order of model construction.
pub type Flavour = usize;

/// Immutable particle metadata plus the mutable mass and width slots.
#[derive(Clone, Debug)]
pub struct Particle {
    pub(crate) name: String,
    pub(crate) flavour: Flavour,
    pub(crate) pdg_id: i32,
    /// Twice the spin, so `1` is a Dirac fermion and `2` a vector boson.
    pub(crate) spin2: u8,
    pub(crate) mass: Option<f64>,
    pub(crate) width: Option<f64>,
    /// Fermion number, `+1` for fermions, `-1` for anti-fermions, `0` else.
    pub(crate) fermion_number: i8,
    pub(crate) majorana: bool,
    pub(crate) colour: ColourRep,
    pub(crate) anti: Flavour,
    pub(crate) coupled: bool,
    pub(crate) erased: bool,
}

impl Particle {
    /// Returns the particle name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the internal flavour index.
    #[must_use]
    pub const fn flavour(&self) -> Flavour {
        self.flavour
    }

    /// Returns the PDG id.
    #[must_use]
    pub const fn pdg_id(&self) -> i32 {
        self.pdg_id
    }

    /// Returns the flavour of the anti-particle, which is the particle
    /// itself for self-conjugate species.
    #[must_use]
    pub const fn anti_flavour(&self) -> Flavour {
        self.anti
    }

    /// Returns the mass, zero if no mass slot is attached.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass.unwrap_or(0.0)
    }

    /// Returns the width, zero if no width slot is attached.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.width.unwrap_or(0.0)
    }

    /// Returns whether the particle is a fermion.
    #[must_use]
    pub const fn is_fermion(&self) -> bool {
        self.spin2 % 2 == 1
    }

    /// Returns whether the particle is its own anti-particle fermion.
    #[must_use]
    pub const fn is_majorana(&self) -> bool {
        self.majorana
    }

    /// Returns the colour representation.
    #[must_use]
    pub const fn colour_rep(&self) -> ColourRep {
        self.colour
    }

    /// Returns whether the particle takes part in any coupled vertex.
    #[must_use]
    pub const fn is_coupled(&self) -> bool {
        self.coupled
    }

    /// Colour orientation of the `i`-th colour index, see
    /// [`ColourRep::colour_type`].
    #[must_use]
    pub const fn colour_type(&self, i: usize) -> i8 {
        self.colour.colour_type(i)
    }

    /// Number of physical helicity states.
    #[must_use]
    pub fn spin_dof(&self) -> usize {
        match self.spin2 {
            0 => 1,
            1 => 2,
            _ => {
                if self.mass() > 0.0 {
                    3
                } else {
                    2
                }
            }
        }
    }

    /// Number of colour states.
    #[must_use]
    pub fn colour_dof(&self, nc: usize) -> usize {
        self.colour.dof(nc)
    }

    /// Tensor index ranges of the Lorentz and Dirac indices.
    #[must_use]
    pub fn spin_ranges(&self) -> Vec<usize> {
        match self.spin2 {
            0 => vec![],
            _ => vec![4],
        }
    }

    /// Full tensor index ranges, Lorentz and Dirac indices first, colour
    /// indices last.
    #[must_use]
    pub fn index_ranges(&self, nc: usize) -> Vec<usize> {
        let mut ranges = self.spin_ranges();
        ranges.extend(self.colour.ranges(nc));
        ranges
    }

    /// Resizes `tensor` to the particle's amplitude shape.
    pub fn make_amplitude(&self, tensor: &mut Tensor, nc: usize) {
        tensor.resize(&self.index_ranges(nc));
        tensor.reset();
    }

    /// Maps a helicity degree-of-freedom index to a helicity label.
    #[must_use]
    pub fn helicity_label(&self, index: usize) -> i8 {
        match (self.spin_dof(), index) {
            (1, _) => 0,
            (2, 0) | (3, 0) => -1,
            (2, _) => 1,
            (3, 1) => 0,
            _ => 1,
        }
    }

    /// Returns whether the external wave function is a row spinor.
    ///
    /// Row spinors are carried by currents whose equivalent incoming
    /// particle has negative fermion number, and by outgoing Majorana legs.
    #[must_use]
    pub fn is_row_spinor(&self, outgoing: bool) -> bool {
        if !self.is_fermion() {
            return false;
        }
        if self.majorana {
            return outgoing;
        }
        (self.fermion_number > 0) == outgoing
    }

    /// Fills the Lorentz/Dirac block of an external wave function.
    ///
    /// `helicity` is the degree-of-freedom index. The result has length one
    /// for scalars and four for spinors and vectors.
    #[must_use]
    pub fn wave_function(&self, p: &FourVector, helicity: usize, outgoing: bool) -> Vec<Amplitude> {
        match self.spin2 {
            0 => vec![Amplitude::new(1.0, 0.0)],
            1 => {
                let label = self.helicity_label(helicity);
                let mass = self.mass();
                let particle_like = self.majorana || self.fermion_number > 0;
                let spinor = match (particle_like, outgoing) {
                    (true, false) => dirac::u_spinor(p, mass, label),
                    (true, true) => dirac::bar(&dirac::u_spinor(p, mass, label)),
                    (false, false) => dirac::bar(&dirac::v_spinor(p, mass, label)),
                    (false, true) => dirac::v_spinor(p, mass, label),
                };
                spinor.to_vec()
            }
            _ => {
                let label = self.helicity_label(helicity);
                lorentz::polarisation(p, self.mass(), label, outgoing).to_vec()
            }
        }
    }

    /// Complex propagator denominator `q² − m² + imΓ`.
    #[must_use]
    pub fn propagator_denominator(&self, q2: f64) -> Amplitude {
        Amplitude::new(q2 - self.mass() * self.mass(), self.mass() * self.width())
    }

    /// Applies the propagator to an off-shell current tensor in place.
    ///
    /// `momentum` is the signed channel momentum stored on the current; row
    /// spinor currents use the reversed momentum in the numerator, matching
    /// the fermion-flow direction. For colour-flow gluons the colour index
    /// pair is transposed, which pairs each end's colour index with the
    /// other end's anti-colour index.
    pub fn propagate(&self, tensor: &mut Tensor, momentum: &FourVector, row: bool, nc: usize) {
        let q2 = momentum.squared();
        let denominator = self.propagator_denominator(q2);
        let colour_dof = self.colour_dof(nc);
        match self.spin2 {
            0 => {
                *tensor *= Amplitude::new(0.0, 1.0) / denominator;
            }
            1 => {
                let factor = Amplitude::new(0.0, 1.0) / denominator;
                let flow_momentum = if row { -*momentum } else { *momentum };
                let mut kernel = dirac::slash(&flow_momentum);
                for (i, kernel_row) in kernel.iter_mut().enumerate() {
                    kernel_row[i] += self.mass();
                }
                for c in 0..colour_dof {
                    let mut block = [Amplitude::new(0.0, 0.0); 4];
                    for (mu, entry) in block.iter_mut().enumerate() {
                        *entry = tensor[mu * colour_dof + c];
                    }
                    let moved = if row {
                        dirac::apply_row(&block, &kernel)
                    } else {
                        dirac::apply_column(&kernel, &block)
                    };
                    for (mu, entry) in moved.iter().enumerate() {
                        tensor[mu * colour_dof + c] = factor * entry;
                    }
                }
            }
            _ => {
                let factor = Amplitude::new(0.0, -1.0) / denominator;
                let mass = self.mass();
                for c in 0..colour_dof {
                    if mass > 0.0 {
                        // unitary-gauge numerator −g^{μν} + q^μq^ν/m²
                        let mut kdot = Amplitude::new(0.0, 0.0);
                        for mu in 0..4 {
                            let sign = if mu == 0 { 1.0 } else { -1.0 };
                            kdot += sign * momentum[mu] * tensor[mu * colour_dof + c];
                        }
                        for mu in 0..4 {
                            let entry = tensor[mu * colour_dof + c];
                            tensor[mu * colour_dof + c] =
                                factor * (entry - momentum[mu] / (mass * mass) * kdot);
                        }
                    } else {
                        for mu in 0..4 {
                            tensor[mu * colour_dof + c] =
                                factor * tensor[mu * colour_dof + c];
                        }
                    }
                }
                if self.colour == ColourRep::FlowAdjoint {
                    transpose_flow_pair(tensor, nc);
                }
            }
        }
    }

    /// Contracts the final external wave function with the last internal
    /// current, including the Lorentz metric and the colour-line pairing.
    #[must_use]
    pub fn contract(&self, wave: &Tensor, current: &Tensor, nc: usize) -> Amplitude {
        let colour_dof = self.colour_dof(nc);
        let spin_dim = if self.spin2 == 0 { 1 } else { 4 };
        let mut result = Amplitude::new(0.0, 0.0);
        for mu in 0..spin_dim {
            let metric = if self.spin2 == 2 && mu > 0 { -1.0 } else { 1.0 };
            for c in 0..colour_dof {
                let paired = if self.colour == ColourRep::FlowAdjoint {
                    // cross the colour pair along the external line
                    (c % nc) * nc + c / nc
                } else {
                    c
                };
                result += metric * wave[mu * colour_dof + c] * current[mu * colour_dof + paired];
            }
        }
        result
    }
}

/// Transposes the trailing (fundamental, anti-fundamental) index pair.
fn transpose_flow_pair(tensor: &mut Tensor, nc: usize) {
    let colour_dof = nc * nc;
    let blocks = tensor.size() / colour_dof;
    for b in 0..blocks {
        for i in 0..nc {
            for j in 0..i {
                let x = b * colour_dof + i * nc + j;
                let y = b * colour_dof + j * nc + i;
                let tmp = tensor[x];
                tensor[x] = tensor[y];
                tensor[y] = tmp;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_particle(spin2: u8, colour: ColourRep) -> Particle {
        Particle {
            name: "x".to_string(),
            flavour: 0,
            pdg_id: 1,
            spin2,
            mass: None,
            width: None,
            fermion_number: i8::from(spin2 % 2 == 1),
            majorana: false,
            colour,
            anti: 0,
            coupled: true,
            erased: false,
        }
    }

    #[test]
    fn index_ranges_follow_spin_and_colour() {
        let quark = test_particle(1, ColourRep::Fundamental);
        assert_eq!(quark.index_ranges(3), vec![4, 3]);
        let gluon = test_particle(2, ColourRep::Adjoint);
        assert_eq!(gluon.index_ranges(3), vec![4, 8]);
        let flow_gluon = test_particle(2, ColourRep::FlowAdjoint);
        assert_eq!(flow_gluon.index_ranges(3), vec![4, 3, 3]);
        let scalar = test_particle(0, ColourRep::Singlet);
        assert!(scalar.index_ranges(3).is_empty());
        assert_eq!(Tensor::new(&scalar.index_ranges(3)).size(), 1);
    }

    #[test]
    fn helicity_labels() {
        let gluon = test_particle(2, ColourRep::Adjoint);
        assert_eq!(gluon.spin_dof(), 2);
        assert_eq!(gluon.helicity_label(0), -1);
        assert_eq!(gluon.helicity_label(1), 1);
        let mut massive = test_particle(2, ColourRep::Singlet);
        massive.mass = Some(80.0);
        assert_eq!(massive.spin_dof(), 3);
        assert_eq!(massive.helicity_label(1), 0);
    }

    #[test]
    fn scalar_propagator() {
        let mut scalar = test_particle(0, ColourRep::Singlet);
        scalar.mass = Some(2.0);
        scalar.width = Some(0.5);
        let mut t = Tensor::scalar();
        t[0] = Amplitude::new(1.0, 0.0);
        let q = FourVector::new(3.0, 0.0, 0.0, 0.0);
        scalar.propagate(&mut t, &q, false, 3);
        let expected = Amplitude::new(0.0, 1.0) / Amplitude::new(9.0 - 4.0, 1.0);
        assert!((t[0] - expected).norm() < 1e-14);
    }

    #[test]
    fn flow_transpose_is_an_involution() {
        let mut t = Tensor::new(&[4, 3, 3]);
        for i in 0..t.size() {
            t[i] = Amplitude::new(i as f64, 0.0);
        }
        let copy = t.clone();
        transpose_flow_pair(&mut t, 3);
        assert_ne!(t, copy);
        transpose_flow_pair(&mut t, 3);
        assert_eq!(t, copy);
    }
}
