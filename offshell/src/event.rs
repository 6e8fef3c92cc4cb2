//! Event records.

use crate::momentum::FourVector;
use serde::{Deserialize, Serialize};

/// First Les-Houches colour-line tag.
pub const FIRST_COLOUR_TAG: i32 = 501;

/// One generated event, as handed to cuts and to the caller's sink.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Event {
    /// Incoming four-momenta.
    pub p_in: Vec<FourVector>,
    /// Outgoing four-momenta.
    pub p_out: Vec<FourVector>,
    /// PDG ids, incoming legs first.
    pub pdg_ids: Vec<i32>,
    /// Helicity labels per leg, incoming first.
    pub helicities: Vec<i8>,
    /// Les-Houches colour tag per leg, starting from [`FIRST_COLOUR_TAG`];
    /// zero for uncoloured legs.
    pub colour_tags: Vec<i32>,
    /// Les-Houches anti-colour tag per leg.
    pub anti_colour_tags: Vec<i32>,
    /// Total event weight in pb.
    pub weight: f64,
    /// Current maximum weight of the generator.
    pub max_weight: f64,
    /// Factorisation scale.
    pub mu_f: f64,
    /// Renormalisation scale.
    pub mu_r: f64,
    /// Strong coupling at the renormalisation scale.
    pub alpha_s: f64,
}

impl Event {
    /// Number of external legs.
    #[must_use]
    pub fn n_external(&self) -> usize {
        self.p_in.len() + self.p_out.len()
    }

    /// Total incoming four-momentum.
    #[must_use]
    pub fn total_incoming(&self) -> FourVector {
        self.p_in
            .iter()
            .fold(FourVector::ZERO, |sum, p| sum + *p)
    }

    /// Total outgoing four-momentum.
    #[must_use]
    pub fn total_outgoing(&self) -> FourVector {
        self.p_out
            .iter()
            .fold(FourVector::ZERO, |sum, p| sum + *p)
    }

    /// Partonic centre-of-mass energy squared.
    #[must_use]
    pub fn s_hat(&self) -> f64 {
        self.total_incoming().squared()
    }

    /// Invariant mass of a pair of outgoing legs.
    #[must_use]
    pub fn dimass(&self, i: usize, j: usize) -> f64 {
        (self.p_out[i] + self.p_out[j]).mass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn momentum_bookkeeping() {
        let event = Event {
            p_in: vec![
                FourVector::new(5.0, 0.0, 0.0, 5.0),
                FourVector::new(5.0, 0.0, 0.0, -5.0),
            ],
            p_out: vec![
                FourVector::new(5.0, 3.0, 0.0, 4.0),
                FourVector::new(5.0, -3.0, 0.0, -4.0),
            ],
            ..Event::default()
        };
        assert_eq!(event.n_external(), 4);
        assert!((event.s_hat() - 100.0).abs() < 1e-12);
        assert!((event.dimass(0, 1) - 10.0).abs() < 1e-12);
        let balance = event.total_incoming() - event.total_outgoing();
        for mu in 0..4 {
            assert!(balance[mu].abs() < 1e-12);
        }
    }
}
