//! Off-shell currents.
//!
//! A current is a tensor-valued partial amplitude: the sum of all
//! sub-diagrams connecting a subset of external legs (the bitstring) to one
//! internal line of a definite particle type. Currents live in an arena
//! owned by the process tree and reference each other by index.

use crate::bits::BitString;
use crate::model::Model;
use crate::momentum::FourVector;
use crate::particle::Flavour;
use crate::tensor::Tensor;

/// Arena index of a current within its tree.
pub type CurrentId = usize;

/// Tensor-valued partial amplitude of a momentum channel.
#[derive(Clone, Debug)]
pub struct Current {
    /// Momentum channel: the set of external legs flowing into the current.
    pub bitstring: BitString,
    /// For external currents the actual external particle; for internal
    /// currents the produced (equivalent incoming) particle.
    pub flavour: Flavour,
    /// Momentum direction, meaningful for external currents only.
    pub outgoing: bool,
    /// Whether a fermionic current is a row spinor.
    pub row: bool,
    /// Signed channel momentum: incoming legs contribute their momentum,
    /// outgoing legs the negated one.
    pub momentum: FourVector,
    /// The subamplitude tensor.
    pub amplitude: Tensor,
    /// Number of Feynman diagrams flowing through this current.
    pub multiplicity: u64,
    /// Whether any coupled chain of interactions feeds this current.
    pub coupled: bool,
    /// Reachability marker used while cleaning the tree.
    pub marked: bool,
    /// Sorted non-zero colour block offsets, maintained in colour-flow mode.
    pub flow_offsets: Vec<u32>,
}

impl Current {
    /// Creates an external current for leg `leg` of a process.
    #[must_use]
    pub fn external(
        model: &Model,
        flavour: Flavour,
        leg: usize,
        width: usize,
        outgoing: bool,
    ) -> Self {
        let particle = model.particle(flavour);
        Self {
            bitstring: BitString::single(leg, width),
            flavour,
            outgoing,
            row: particle.is_row_spinor(outgoing),
            momentum: FourVector::ZERO,
            amplitude: Tensor::default(),
            multiplicity: 1,
            coupled: particle.is_coupled(),
            marked: false,
            flow_offsets: Vec::new(),
        }
    }

    /// Creates an internal current carrying `flavour` on channel `bits`.
    #[must_use]
    pub fn internal(bits: BitString, flavour: Flavour, row: bool) -> Self {
        Self {
            bitstring: bits,
            flavour,
            outgoing: false,
            row,
            momentum: FourVector::ZERO,
            amplitude: Tensor::default(),
            multiplicity: 0,
            coupled: false,
            marked: false,
            flow_offsets: Vec::new(),
        }
    }

    /// Returns whether the current belongs to a single external leg.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.bitstring.count() <= 1
    }

    /// The equivalent incoming flavour used for fusion lookups: external
    /// outgoing legs count as their anti-particle.
    #[must_use]
    pub fn produced_flavour(&self, model: &Model) -> Flavour {
        if self.is_external() && self.outgoing {
            model.particle(self.flavour).anti_flavour()
        } else {
            self.flavour
        }
    }

    /// Allocates the amplitude tensor for the current's particle shape.
    pub fn initialise(&mut self, model: &Model) {
        let particle = model.particle(self.produced_flavour(model));
        particle.make_amplitude(&mut self.amplitude, model.nc());
    }

    /// Zeroes the amplitude and forgets colour-flow offsets of internal
    /// currents, preparing for the next phase-space point.
    pub fn reset(&mut self) {
        if !self.is_external() {
            self.amplitude.reset();
            self.coupled = false;
            self.flow_offsets.clear();
        }
    }

    /// Records a non-zero colour block offset, keeping the set sorted.
    pub fn record_flow_offset(&mut self, offset: u32) {
        if let Err(slot) = self.flow_offsets.binary_search(&offset) {
            self.flow_offsets.insert(slot, offset);
        }
    }

    /// Returns whether the colour block at `offset` is known non-zero.
    #[must_use]
    pub fn has_flow_offset(&self, offset: u32) -> bool {
        self.flow_offsets.binary_search(&offset).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    #[test]
    fn external_current_flavour_mapping() {
        let model = models::qcd(1.0, 3, false);
        let u = model.get_particle("u").unwrap().flavour();
        let ubar = model.get_particle("ubar").unwrap().flavour();
        let incoming = Current::external(&model, u, 0, 4, false);
        assert_eq!(incoming.produced_flavour(&model), u);
        assert!(!incoming.row);
        let outgoing = Current::external(&model, u, 2, 4, true);
        assert_eq!(outgoing.produced_flavour(&model), ubar);
        assert!(outgoing.row);
    }

    #[test]
    fn flow_offsets_stay_sorted_and_unique() {
        let mut current = Current::internal(BitString::from_bits(0b11, 4), 0, false);
        current.record_flow_offset(5);
        current.record_flow_offset(2);
        current.record_flow_offset(5);
        current.record_flow_offset(7);
        assert_eq!(current.flow_offsets, vec![2, 5, 7]);
        assert!(current.has_flow_offset(5));
        assert!(!current.has_flow_offset(3));
    }
}
