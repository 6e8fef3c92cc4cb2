//! Process selection strings and subprocess bookkeeping.
//!
//! A process is selected with a string of the form
//! `phi1,phi2 > psi1,psi2,psi3`, where each token is a particle or family
//! name registered in the model. Family tokens expand to every member, so a
//! single string may select a whole batch of subprocesses.

use crate::error::{Error, Result};
use crate::model::Model;
use crate::particle::Flavour;

/// External flavour assignment of one subprocess.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Process {
    externals: Vec<Flavour>,
    n_in: usize,
    sorted_flavours: Vec<Flavour>,
    sorted_pdg: Vec<i32>,
}

impl Process {
    /// Creates a process from an external flavour vector, incoming legs
    /// first.
    #[must_use]
    pub fn new(model: &Model, externals: Vec<Flavour>, n_in: usize) -> Self {
        let mut sorted_flavours = externals.clone();
        sorted_flavours[..n_in].sort_unstable();
        sorted_flavours[n_in..].sort_unstable();
        let mut sorted_pdg: Vec<i32> = externals
            .iter()
            .map(|flavour| model.particle(*flavour).pdg_id())
            .collect();
        sorted_pdg[..n_in].sort_unstable();
        sorted_pdg[n_in..].sort_unstable();
        Self {
            externals,
            n_in,
            sorted_flavours,
            sorted_pdg,
        }
    }

    /// Returns the external flavours, incoming legs first.
    #[must_use]
    pub fn externals(&self) -> &[Flavour] {
        &self.externals
    }

    /// Number of incoming legs.
    #[must_use]
    pub const fn n_in(&self) -> usize {
        self.n_in
    }

    /// Number of outgoing legs.
    #[must_use]
    pub fn n_out(&self) -> usize {
        self.externals.len() - self.n_in
    }

    /// The flavour key: sorted within the incoming and outgoing groups.
    #[must_use]
    pub fn sorted_flavours(&self) -> &[Flavour] {
        &self.sorted_flavours
    }

    /// The PDG-id key: sorted within the incoming and outgoing groups.
    #[must_use]
    pub fn sorted_pdg_ids(&self) -> &[i32] {
        &self.sorted_pdg
    }

    /// Flavour of leg `i`.
    #[must_use]
    pub fn flavour(&self, i: usize) -> Flavour {
        self.externals[i]
    }

    /// Returns whether leg `i` is outgoing.
    #[must_use]
    pub const fn is_outgoing(&self, i: usize) -> bool {
        i >= self.n_in
    }

    /// Statistical symmetry factor `∏ 1/n_k!` over identical outgoing
    /// species.
    #[must_use]
    pub fn symmetry_factor(&self) -> f64 {
        let mut factor = 1.0;
        let out = &self.sorted_flavours[self.n_in..];
        let mut run = 1_u64;
        for i in 1..=out.len() {
            if i < out.len() && out[i] == out[i - 1] {
                run += 1;
            } else {
                factor /= factorial(run);
                run = 1;
            }
        }
        factor
    }

    /// Permutation mapping the requested leg order onto this process's
    /// stored order, or `None` if the flavour content differs.
    #[must_use]
    pub fn match_ordering(&self, requested: &[Flavour]) -> Option<Vec<usize>> {
        if requested.len() != self.externals.len() {
            return None;
        }
        let mut used = vec![false; self.externals.len()];
        let mut ordering = Vec::with_capacity(requested.len());
        for (leg, flavour) in requested.iter().enumerate() {
            let range = if leg < self.n_in {
                0..self.n_in
            } else {
                self.n_in..self.externals.len()
            };
            let slot = range
                .clone()
                .find(|slot| !used[*slot] && self.externals[*slot] == *flavour)?;
            used[slot] = true;
            ordering.push(slot);
        }
        Some(ordering)
    }
}

fn factorial(n: u64) -> f64 {
    (2..=n).map(|k| k as f64).product()
}

/// Parses a process string into the flavour vectors it selects, expanding
/// family tokens into every combination.
///
/// # Errors
///
/// Fails with an invalid-process error if the string does not have the
/// `in > out` shape or the multiplicities do not match, and with a
/// model-lookup error for unknown tokens.
pub fn parse_process(
    model: &Model,
    string: &str,
    n_in: usize,
    n_out: usize,
) -> Result<Vec<Vec<Flavour>>> {
    let (left, right) = string
        .split_once('>')
        .ok_or_else(|| Error::InvalidProcess(string.to_string()))?;
    let sides: [Vec<&str>; 2] = [split_tokens(left), split_tokens(right)];
    if sides[0].len() != n_in || sides[1].len() != n_out {
        return Err(Error::InvalidProcess(string.to_string()));
    }
    let mut choices: Vec<Vec<Flavour>> = Vec::with_capacity(n_in + n_out);
    for token in sides[0].iter().chain(&sides[1]) {
        let flavours = model
            .resolve_token(token)
            .ok_or_else(|| Error::ModelLookup((*token).to_string()))?;
        choices.push(flavours);
    }
    // cartesian expansion over family members
    let mut result: Vec<Vec<Flavour>> = vec![Vec::new()];
    for choice in &choices {
        let mut expanded = Vec::with_capacity(result.len() * choice.len());
        for prefix in &result {
            for flavour in choice {
                let mut next = prefix.clone();
                next.push(*flavour);
                expanded.push(next);
            }
        }
        result = expanded;
    }
    Ok(result)
}

fn split_tokens(side: &str) -> Vec<&str> {
    side.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    #[test]
    fn parses_simple_processes() {
        let model = models::qcd(1.0, 3, false);
        let parsed = parse_process(&model, "g,g > g,g", 2, 2).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].len(), 4);
        let parsed = parse_process(&model, " u , ubar  >  g , g ", 2, 2).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn family_tokens_expand() {
        let model = models::qcd(1.0, 3, false);
        let parsed = parse_process(&model, "q,qbar > g,g", 2, 2).unwrap();
        assert_eq!(parsed.len(), 36);
    }

    #[test]
    fn rejects_malformed_strings() {
        let model = models::qcd(1.0, 3, false);
        assert!(matches!(
            parse_process(&model, "g,g g,g", 2, 2),
            Err(Error::InvalidProcess(_))
        ));
        assert!(matches!(
            parse_process(&model, "g > g,g", 2, 2),
            Err(Error::InvalidProcess(_))
        ));
        assert!(matches!(
            parse_process(&model, "g,x > g,g", 2, 2),
            Err(Error::ModelLookup(_))
        ));
    }

    #[test]
    fn symmetry_factor_counts_identical_finals() {
        let model = models::qcd(1.0, 3, false);
        let g = model.get_particle("g").unwrap().flavour();
        let u = model.get_particle("u").unwrap().flavour();
        let process = Process::new(&model, vec![g, g, g, g, g], 2);
        assert!((process.symmetry_factor() - 1.0 / 6.0).abs() < 1e-15);
        let process = Process::new(&model, vec![g, g, u, g], 2);
        assert!((process.symmetry_factor() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn ordering_matches_up_to_permutation() {
        let model = models::qcd(1.0, 3, false);
        let g = model.get_particle("g").unwrap().flavour();
        let u = model.get_particle("u").unwrap().flavour();
        let ubar = model.get_particle("ubar").unwrap().flavour();
        let process = Process::new(&model, vec![u, ubar, g, g], 2);
        let ordering = process.match_ordering(&[ubar, u, g, g]).unwrap();
        assert_eq!(ordering, vec![1, 0, 2, 3]);
        assert!(process.match_ordering(&[u, u, g, g]).is_none());
    }
}
