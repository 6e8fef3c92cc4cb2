//! Phase-space cuts.
//!
//! Cuts are polymorphic predicates on the event record, applied after
//! momentum generation and before the matrix element. Events failing any
//! cut carry weight zero.

use crate::event::Event;

/// A phase-space cut.
pub trait Cut {
    /// Returns whether the event passes.
    fn pass(&self, event: &Event) -> bool;
}

/// Minimum invariant mass of an outgoing pair.
#[derive(Clone, Copy, Debug)]
pub struct MinDimass {
    /// First outgoing leg.
    pub i: usize,
    /// Second outgoing leg.
    pub j: usize,
    /// Threshold in GeV.
    pub min: f64,
}

impl Cut for MinDimass {
    fn pass(&self, event: &Event) -> bool {
        event.dimass(self.i, self.j) >= self.min
    }
}

/// Minimum transverse momentum of an outgoing leg.
#[derive(Clone, Copy, Debug)]
pub struct MinPt {
    /// Outgoing leg.
    pub leg: usize,
    /// Threshold in GeV.
    pub min: f64,
}

impl Cut for MinPt {
    fn pass(&self, event: &Event) -> bool {
        event.p_out[self.leg].pt() >= self.min
    }
}

/// Maximum absolute rapidity of an outgoing leg.
#[derive(Clone, Copy, Debug)]
pub struct MaxRapidity {
    /// Outgoing leg.
    pub leg: usize,
    /// Rapidity bound.
    pub max: f64,
}

impl Cut for MaxRapidity {
    fn pass(&self, event: &Event) -> bool {
        event.p_out[self.leg].rapidity().abs() <= self.max
    }
}

/// Minimum angular separation of two outgoing legs.
#[derive(Clone, Copy, Debug)]
pub struct MinDeltaR {
    /// First outgoing leg.
    pub i: usize,
    /// Second outgoing leg.
    pub j: usize,
    /// Separation bound.
    pub min: f64,
}

impl Cut for MinDeltaR {
    fn pass(&self, event: &Event) -> bool {
        event.p_out[self.i].delta_r(&event.p_out[self.j]) >= self.min
    }
}

/// Conjunction of cuts.
#[derive(Default)]
pub struct CutList {
    cuts: Vec<Box<dyn Cut>>,
}

impl CutList {
    /// Creates an empty list, which passes everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cut.
    pub fn add(&mut self, cut: impl Cut + 'static) -> &mut Self {
        self.cuts.push(Box::new(cut));
        self
    }

    /// Number of registered cuts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Returns whether no cut is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }
}

impl Cut for CutList {
    fn pass(&self, event: &Event) -> bool {
        self.cuts.iter().all(|cut| cut.pass(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::momentum::FourVector;

    fn back_to_back(pt: f64, pz: f64) -> Event {
        let e = (pt * pt + pz * pz).sqrt();
        Event {
            p_in: vec![
                FourVector::new(e, 0.0, 0.0, e),
                FourVector::new(e, 0.0, 0.0, -e),
            ],
            p_out: vec![
                FourVector::new(e, pt, 0.0, pz),
                FourVector::new(e, -pt, 0.0, -pz),
            ],
            ..Event::default()
        }
    }

    #[test]
    fn kinematic_predicates() {
        let event = back_to_back(30.0, 40.0);
        assert!(MinPt { leg: 0, min: 20.0 }.pass(&event));
        assert!(!MinPt { leg: 0, min: 40.0 }.pass(&event));
        assert!(MinDimass {
            i: 0,
            j: 1,
            min: 90.0
        }
        .pass(&event));
        assert!(MinDeltaR {
            i: 0,
            j: 1,
            min: 1.0
        }
        .pass(&event));
        assert!(MaxRapidity { leg: 0, max: 5.0 }.pass(&event));
    }

    #[test]
    fn cut_lists_conjoin() {
        let event = back_to_back(30.0, 40.0);
        let mut cuts = CutList::new();
        assert!(cuts.pass(&event));
        cuts.add(MinPt { leg: 0, min: 20.0 });
        cuts.add(MaxRapidity { leg: 0, max: 0.1 });
        assert_eq!(cuts.len(), 2);
        assert!(!cuts.pass(&event));
    }
}
