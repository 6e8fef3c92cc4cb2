//! Vertex descriptors and Feynman-rule dispatch.
//!
//! A [`Vertex`] binds an ordered tuple of three or four particle legs to a
//! Lorentz structure, a compiled colour structure and a coupling-constant
//! vector. For vertices with Majorana legs the recursion may need a
//! charge-conjugated or reversed variant of the rule; the selection logic is
//! an enumerated case table that must not be simplified, since every branch
//! encodes a fermion-flow orientation choice.

use crate::colour::{ColourStructure, CompiledColour};
use crate::lorentz::{LorentzStructure, RuleVariant};
use crate::particle::Flavour;
use crate::tensor::Amplitude;
use arrayvec::ArrayVec;

/// Majorana content of a vertex. The fermionic legs, if any, sit at slots 1
/// and 2.
///
/// Value 0 means no Majorana leg, 1 means slot 2 is Majorana, 2 means slot 1
/// is Majorana and 3 means both are.
pub type MajoranaType = u8;

/// Result of the Feynman-rule dispatch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DispatchedRule {
    /// Selected rule variant.
    pub variant: RuleVariant,
    /// Whether the two fermionic input currents must be exchanged before
    /// applying the rule.
    pub swap_fermions: bool,
    /// Effective produced-leg entry point of the rule table.
    pub produced: usize,
}

/// Interaction vertex owned by the model registry.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub(crate) legs: ArrayVec<Flavour, 4>,
    pub(crate) couplings: Vec<Amplitude>,
    pub(crate) lorentz: LorentzStructure,
    pub(crate) colour: ColourStructure,
    pub(crate) compiled: CompiledColour,
    pub(crate) majorana_type: MajoranaType,
    pub(crate) fermionic: bool,
    pub(crate) coupled: bool,
    pub(crate) erased: bool,
}

impl Vertex {
    /// Returns the number of legs.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.legs.len()
    }

    /// Returns the ordered leg flavours.
    #[must_use]
    pub fn legs(&self) -> &[Flavour] {
        &self.legs
    }

    /// Returns the coupling constants.
    #[must_use]
    pub fn couplings(&self) -> &[Amplitude] {
        &self.couplings
    }

    /// Returns the Lorentz structure.
    #[must_use]
    pub const fn lorentz(&self) -> LorentzStructure {
        self.lorentz
    }

    /// Returns the registered colour structure.
    #[must_use]
    pub const fn colour(&self) -> ColourStructure {
        self.colour
    }

    /// Returns the compiled colour terms.
    #[must_use]
    pub const fn compiled_colour(&self) -> &CompiledColour {
        &self.compiled
    }

    /// Returns whether the vertex couples two fermion legs.
    #[must_use]
    pub const fn is_fermionic(&self) -> bool {
        self.fermionic
    }

    /// Returns whether the vertex is coupled.
    #[must_use]
    pub const fn is_coupled(&self) -> bool {
        self.coupled
    }

    /// Returns whether the vertex has been erased from its model.
    #[must_use]
    pub const fn is_erased(&self) -> bool {
        self.erased
    }

    /// Selects the Feynman-rule variant for producing leg `produced`.
    ///
    /// `flow` marks, per leg, whether the attached fermion current has its
    /// flow reversed (an outgoing external fermion, or a current built from
    /// one). The case table is ported verbatim from the original enumerated
    /// dispatch; each branch fixes a fermion-flow orientation and must stay
    /// as it is.
    #[must_use]
    pub fn dispatch_feynman_rule(&self, flow: [bool; 4], produced: usize) -> DispatchedRule {
        let natural = |p: usize| DispatchedRule {
            variant: RuleVariant::Natural,
            swap_fermions: false,
            produced: p,
        };
        let with = |variant: RuleVariant, swap: bool, p: usize| DispatchedRule {
            variant,
            swap_fermions: swap,
            produced: p,
        };
        match self.majorana_type {
            // ordinary vertices, no current reversal
            0 => natural(produced),
            // Dirac fermion at slot 1, Majorana fermion at slot 2
            1 => match produced {
                // boson production: flip the Majorana flow if it is outgoing
                0 => {
                    if flow[2] {
                        with(RuleVariant::RightConjugate, false, 0)
                    } else {
                        natural(0)
                    }
                }
                // Dirac fermion production
                1 => {
                    if flow[2] {
                        with(RuleVariant::RightConjugate, false, 1)
                    } else {
                        natural(1)
                    }
                }
                // Majorana production: the produced fermion carries the flow
                // along its momentum, so the reversed rule is dispatched
                _ => with(RuleVariant::ReversedConjugate, false, 2),
            },
            // Majorana fermion at slot 1, Dirac fermion at slot 2
            2 => match produced {
                0 => {
                    if flow[1] {
                        natural(0)
                    } else {
                        with(RuleVariant::LeftConjugate, false, 0)
                    }
                }
                1 => natural(1),
                _ => {
                    if flow[1] {
                        natural(2)
                    } else {
                        with(RuleVariant::LeftConjugate, false, 2)
                    }
                }
            },
            // two Majorana fermions
            _ => match produced {
                0 => match (flow[1], flow[2]) {
                    (false, false) => with(RuleVariant::LeftConjugate, false, 0),
                    (true, false) => natural(0),
                    (false, true) => with(RuleVariant::Natural, true, 0),
                    (true, true) => with(RuleVariant::RightConjugate, false, 0),
                },
                1 => {
                    if flow[2] {
                        with(RuleVariant::RightConjugate, false, 1)
                    } else {
                        natural(1)
                    }
                }
                // produce the second fermion by swapping and applying the
                // first-fermion rule
                _ => {
                    if flow[1] {
                        with(RuleVariant::RightConjugate, true, 1)
                    } else {
                        with(RuleVariant::Natural, true, 1)
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(majorana_type: MajoranaType) -> Vertex {
        Vertex {
            legs: [0, 1, 2].into_iter().collect(),
            couplings: vec![Amplitude::new(1.0, 0.0)],
            lorentz: LorentzStructure::Yukawa,
            colour: ColourStructure::None,
            compiled: CompiledColour::default(),
            majorana_type,
            fermionic: true,
            coupled: true,
            erased: false,
        }
    }

    #[test]
    fn dirac_vertices_always_dispatch_the_natural_rule() {
        let v = vertex(0);
        for produced in 0..3 {
            for flow in 0..8 {
                let flow = [false, flow & 2 != 0, flow & 4 != 0, false];
                let rule = v.dispatch_feynman_rule(flow, produced);
                assert_eq!(rule.variant, RuleVariant::Natural);
                assert!(!rule.swap_fermions);
                assert_eq!(rule.produced, produced);
            }
        }
    }

    #[test]
    fn outgoing_majorana_flips_to_the_conjugated_rule() {
        let v = vertex(1);
        let outgoing = [false, false, true, false];
        let incoming = [false, false, false, false];
        assert_eq!(
            v.dispatch_feynman_rule(outgoing, 0).variant,
            RuleVariant::RightConjugate
        );
        assert_eq!(
            v.dispatch_feynman_rule(incoming, 0).variant,
            RuleVariant::Natural
        );
        assert_eq!(
            v.dispatch_feynman_rule(incoming, 2).variant,
            RuleVariant::ReversedConjugate
        );
    }

    #[test]
    fn double_majorana_production_swaps_fermions() {
        let v = vertex(3);
        let rule = v.dispatch_feynman_rule([false; 4], 2);
        assert!(rule.swap_fermions);
        assert_eq!(rule.produced, 1);
        assert_eq!(rule.variant, RuleVariant::Natural);
        let rule = v.dispatch_feynman_rule([false, true, false, false], 2);
        assert!(rule.swap_fermions);
        assert_eq!(rule.variant, RuleVariant::RightConjugate);
        // both Majorana legs outgoing reverses the second fermion
        let rule = v.dispatch_feynman_rule([false, true, true, false], 0);
        assert_eq!(rule.variant, RuleVariant::RightConjugate);
        assert!(!rule.swap_fermions);
    }
}
