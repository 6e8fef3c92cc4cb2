//! Bound vertex instances inside a process tree.
//!
//! An [`Interaction`] fixes one vertex, the currents attached to its legs,
//! the produced leg and everything the evaluation step needs to run without
//! further lookups: the dispatched Feynman-rule variant, the Fermi sign and
//! the momentum/propagation policy.

use crate::current::CurrentId;
use crate::vertex::DispatchedRule;
use bitflags::bitflags;

bitflags! {
    /// Momentum and propagation duties of an interaction.
    ///
    /// The first interaction producing a current computes its momentum;
    /// later producers merely assign the already-known value. The last
    /// producer triggers the propagator, once every contribution has been
    /// accumulated.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Policy: u8 {
        /// Compute the produced momentum from the incoming currents.
        const COMPUTES_MOMENTUM = 1;
        /// Copy the produced momentum from the already-computed value.
        const ASSIGNS_MOMENTUM = 1 << 1;
        /// Apply the propagator to the produced current afterwards.
        const PROPAGATES = 1 << 2;
    }
}

/// One vertex application within the recursion.
#[derive(Clone, Debug)]
pub struct Interaction {
    /// Vertex index in the model.
    pub vertex: usize,
    /// Current attached to each vertex slot; `None` at the produced slot.
    pub legs: [Option<CurrentId>; 4],
    /// The produced current.
    pub produced: CurrentId,
    /// Vertex slot of the produced leg.
    pub produced_slot: usize,
    /// Fermi sign from fermion-line crossings.
    pub fermi_sign: i8,
    /// Fermion-flow reversal per vertex slot.
    pub flow: [bool; 4],
    /// Momentum and propagation duties.
    pub policy: Policy,
    /// Feynman-rule variant selected by the vertex dispatch.
    pub rule: DispatchedRule,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_flags_compose() {
        let policy = Policy::COMPUTES_MOMENTUM | Policy::PROPAGATES;
        assert!(policy.contains(Policy::COMPUTES_MOMENTUM));
        assert!(!policy.contains(Policy::ASSIGNS_MOMENTUM));
        assert_eq!(Policy::default(), Policy::empty());
    }
}
