//! The amplitude-computing facade.
//!
//! An [`Algorithm`] owns a list of subprocesses with their current trees,
//! tracks which one is selected, and maps user-facing leg indices onto the
//! stored leg order. It is the object drivers and generators talk to: set
//! the external momenta, helicities and colours, then ask for the amplitude
//! or one of the summed variants.

use crate::error::Result;
use crate::model::Model;
use crate::momentum::FourVector;
use crate::particle::{Flavour, Particle};
use crate::process::{parse_process, Process};
use crate::tensor::Amplitude;
use crate::tree::{ExternalState, Tree};
use log::warn;

struct ProcessEntry {
    process: Process,
    tree: Tree,
    states: Vec<ExternalState>,
}

/// Amplitude calculator for a fixed external multiplicity.
pub struct Algorithm<'m> {
    model: &'m Model,
    n_in: usize,
    n_out: usize,
    final_leg: usize,
    entries: Vec<ProcessEntry>,
    selected: Option<usize>,
    ordering: Vec<usize>,
    sum_helicity: Vec<bool>,
    sum_colour: Vec<bool>,
}

impl<'m> Algorithm<'m> {
    /// Creates an algorithm for `n_in -> n_out` processes in `model`.
    ///
    /// `final_leg` selects the external current used for the final
    /// contraction; amplitudes must not depend on this choice.
    #[must_use]
    pub fn new(model: &'m Model, n_in: usize, n_out: usize, final_leg: usize) -> Self {
        let n = n_in + n_out;
        if final_leg >= n {
            warn!("invalid final leg {final_leg} for a {n_in} -> {n_out} process, using {}", n - 1);
        }
        Self {
            model,
            n_in,
            n_out,
            final_leg: final_leg.min(n - 1),
            entries: Vec::new(),
            selected: None,
            ordering: (0..n).collect(),
            sum_helicity: vec![false; n],
            sum_colour: vec![false; n],
        }
    }

    /// Returns the model.
    #[must_use]
    pub const fn model(&self) -> &'m Model {
        self.model
    }

    /// Number of incoming legs.
    #[must_use]
    pub const fn n_in(&self) -> usize {
        self.n_in
    }

    /// Number of outgoing legs.
    #[must_use]
    pub const fn n_out(&self) -> usize {
        self.n_out
    }

    /// Total number of external legs.
    #[must_use]
    pub const fn n_external(&self) -> usize {
        self.n_in + self.n_out
    }

    /// Adds every subprocess selected by the process string and selects the
    /// first of them. Identical processes (up to leg reordering within the
    /// incoming and outgoing groups) are stored once.
    ///
    /// # Errors
    ///
    /// Fails if the string does not parse; subprocesses without any diagram
    /// are kept and evaluate to zero.
    pub fn add_process(&mut self, string: &str) -> Result<()> {
        let combinations = parse_process(self.model, string, self.n_in, self.n_out)?;
        let mut first_added = None;
        for externals in combinations {
            let index = self.insert(externals);
            first_added.get_or_insert(index);
        }
        if self.selected.is_none() {
            self.selected = first_added;
        }
        Ok(())
    }

    fn insert(&mut self, externals: Vec<Flavour>) -> usize {
        let process = Process::new(self.model, externals, self.n_in);
        if let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.process.sorted_flavours() == process.sorted_flavours())
        {
            return index;
        }
        let tree_externals: Vec<(Flavour, bool)> = process
            .externals()
            .iter()
            .enumerate()
            .map(|(leg, flavour)| (*flavour, process.is_outgoing(leg)))
            .collect();
        let tree = Tree::build(self.model, &tree_externals, self.final_leg);
        let states = vec![ExternalState::default(); self.n_external()];
        self.entries.push(ProcessEntry {
            process,
            tree,
            states,
        });
        self.entries.len() - 1
    }

    /// Selects a subprocess by string. On failure the selection becomes
    /// invalid and subsequent evaluations return zero.
    pub fn set_process(&mut self, string: &str) -> bool {
        let combinations = match parse_process(self.model, string, self.n_in, self.n_out) {
            Ok(combinations) => combinations,
            Err(error) => {
                warn!("failed to set process `{string}`: {error}");
                self.selected = None;
                return false;
            }
        };
        if combinations.len() != 1 {
            warn!("process `{string}` is not a single subprocess");
            self.selected = None;
            return false;
        }
        self.set_process_flavours(combinations.into_iter().next().unwrap())
    }

    /// Selects a subprocess by flavour vector, inserting it if absent.
    pub fn set_process_flavours(&mut self, externals: Vec<Flavour>) -> bool {
        let index = self.insert(externals.clone());
        let ordering = self.entries[index]
            .process
            .match_ordering(&externals)
            .expect("inserted process must match its own flavours");
        self.selected = Some(index);
        self.ordering = ordering;
        true
    }

    /// Selects a subprocess by PDG-id vector.
    pub fn set_process_pdg_ids(&mut self, ids: &[i32]) -> bool {
        let mut externals = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(particle) = self.model.get_particle_by_pdg(*id) else {
                self.selected = None;
                return false;
            };
            externals.push(particle.flavour());
        }
        self.set_process_flavours(externals)
    }

    /// Selects the entry with the given index. Mostly useful for iterating
    /// over all subprocesses of a batch.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.selected = Some(index);
            self.ordering = (0..self.n_external()).collect();
            true
        } else {
            false
        }
    }

    /// Number of stored subprocesses.
    #[must_use]
    pub fn n_processes(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether a valid subprocess is selected.
    #[must_use]
    pub fn valid_process(&self) -> bool {
        self.selected.is_some()
    }

    /// Returns the selected process, if any.
    #[must_use]
    pub fn process(&self) -> Option<&Process> {
        self.selected.map(|index| &self.entries[index].process)
    }

    /// Removes the selected process.
    pub fn remove_process(&mut self) {
        if let Some(index) = self.selected.take() {
            self.entries.remove(index);
        }
    }

    /// Removes subprocesses without any diagram.
    pub fn remove_empty_processes(&mut self) {
        self.selected = None;
        self.entries.retain(|entry| !entry.tree.is_empty());
    }

    /// Particle descriptor of user leg `i` of the selected process.
    ///
    /// # Panics
    ///
    /// Panics if no process is selected.
    #[must_use]
    pub fn particle(&self, i: usize) -> &'m Particle {
        let entry = &self.entries[self.selected.expect("no process selected")];
        self.model.particle(entry.process.flavour(self.ordering[i]))
    }

    /// PDG id of user leg `i`, or zero when no process is selected.
    #[must_use]
    pub fn pdg_id(&self, i: usize) -> i32 {
        self.selected.map_or(0, |index| {
            self.model
                .particle(self.entries[index].process.flavour(self.ordering[i]))
                .pdg_id()
        })
    }

    /// Sets the momentum of user leg `i`.
    pub fn set_momentum(&mut self, i: usize, momentum: FourVector) {
        let slot = self.ordering[i];
        if let Some(index) = self.selected {
            self.entries[index].states[slot].momentum = momentum;
        }
    }

    /// Returns the momentum of user leg `i`.
    #[must_use]
    pub fn momentum(&self, i: usize) -> FourVector {
        self.selected.map_or(FourVector::ZERO, |index| {
            self.entries[index].states[self.ordering[i]].momentum
        })
    }

    /// Returns the assigned helicity index of user leg `i`.
    #[must_use]
    pub fn helicity(&self, i: usize) -> usize {
        self.selected.map_or(0, |index| {
            self.entries[index].states[self.ordering[i]].helicity
        })
    }

    /// Returns the assigned colour index of user leg `i`.
    #[must_use]
    pub fn colour(&self, i: usize) -> usize {
        self.selected.map_or(0, |index| {
            self.entries[index].states[self.ordering[i]].colour
        })
    }

    /// Sets the helicity degree-of-freedom index of user leg `i`.
    pub fn set_helicity(&mut self, i: usize, helicity: usize) {
        let slot = self.ordering[i];
        self.sum_helicity[slot] = false;
        if let Some(index) = self.selected {
            let state = &mut self.entries[index].states[slot];
            state.helicity = helicity;
            state.spin_wave = None;
        }
    }

    /// Sets the colour degree-of-freedom index of user leg `i`.
    pub fn set_colour(&mut self, i: usize, colour: usize) {
        let slot = self.ordering[i];
        self.sum_colour[slot] = false;
        if let Some(index) = self.selected {
            let state = &mut self.entries[index].states[slot];
            state.colour = colour;
            state.colour_wave = None;
        }
    }

    /// Writes an explicit spin wave function into external leg `i`,
    /// replacing the helicity basis state until the next helicity
    /// assignment. The continuous helicity sampler uses this entry point.
    pub fn set_spin_wave(&mut self, i: usize, values: Vec<Amplitude>) {
        let slot = self.ordering[i];
        self.sum_helicity[slot] = false;
        if let Some(index) = self.selected {
            self.entries[index].states[slot].spin_wave = Some(values);
        }
    }

    /// Writes an explicit colour vector into external leg `i`, replacing
    /// the colour basis state until the next colour assignment. The
    /// continuous colour samplers use this entry point.
    pub fn set_colour_wave(&mut self, i: usize, values: Vec<Amplitude>) {
        let slot = self.ordering[i];
        self.sum_colour[slot] = false;
        if let Some(index) = self.selected {
            self.entries[index].states[slot].colour_wave = Some(values);
        }
    }

    /// Marks user leg `i` for helicity summation.
    pub fn sum_helicity(&mut self, i: usize) {
        let slot = self.ordering[i];
        self.sum_helicity[slot] = true;
    }

    /// Marks user leg `i` for colour summation.
    pub fn sum_colour(&mut self, i: usize) {
        let slot = self.ordering[i];
        self.sum_colour[slot] = true;
    }

    /// Evaluates the amplitude of the selected subprocess for the assigned
    /// external states.
    pub fn evaluate(&mut self) -> Amplitude {
        let Some(index) = self.selected else {
            return Amplitude::new(0.0, 0.0);
        };
        let entry = &mut self.entries[index];
        entry.tree.evaluate(self.model, &entry.states)
    }

    /// Evaluates the squared amplitude.
    pub fn evaluate2(&mut self) -> f64 {
        self.evaluate().norm_sqr()
    }

    /// Evaluates `Σ|M|²` over the helicities of every leg.
    pub fn evaluate_spin_sum(&mut self) -> f64 {
        let n = self.n_external();
        self.evaluate_masked(&vec![true; n], &vec![false; n])
    }

    /// Evaluates `Σ|M|²` over the colours of every leg.
    pub fn evaluate_colour_sum(&mut self) -> f64 {
        let n = self.n_external();
        self.evaluate_masked(&vec![false; n], &vec![true; n])
    }

    /// Evaluates `Σ|M|²` over helicities and colours of every leg.
    pub fn evaluate_spin_colour_sum(&mut self) -> f64 {
        let n = self.n_external();
        self.evaluate_masked(&vec![true; n], &vec![true; n])
    }

    /// Evaluates `Σ|M|²` over the legs marked for summation; the other legs
    /// keep their assigned helicities and colours.
    pub fn evaluate_sum(&mut self) -> f64 {
        let helicity = self.sum_helicity.clone();
        let colour = self.sum_colour.clone();
        self.evaluate_masked(&helicity, &colour)
    }

    fn evaluate_masked(&mut self, helicity: &[bool], colour: &[bool]) -> f64 {
        let Some(index) = self.selected else {
            return 0.0;
        };
        let entry = &mut self.entries[index];
        entry
            .tree
            .evaluate_sum(self.model, &entry.states, helicity, colour)
    }

    /// Counts the Feynman diagrams of the selected subprocess.
    #[must_use]
    pub fn count_diagrams(&self) -> u64 {
        self.selected
            .map_or(0, |index| self.entries[index].tree.count_diagrams())
    }

    /// Counts the Feynman diagrams of every stored subprocess.
    #[must_use]
    pub fn count_all_diagrams(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| entry.tree.count_diagrams())
            .sum()
    }

    /// Counts the current combinations of the selected subprocess.
    #[must_use]
    pub fn count_current_combinations(&self) -> u64 {
        self.selected.map_or(0, |index| {
            self.entries[index].tree.count_current_combinations()
        })
    }

    /// Returns the selected subprocess's tree.
    #[must_use]
    pub fn tree(&self) -> Option<&Tree> {
        self.selected.map(|index| &self.entries[index].tree)
    }

    /// Symmetry factor of the selected process, one when none is selected.
    #[must_use]
    pub fn symmetry_factor(&self) -> f64 {
        self.selected
            .map_or(1.0, |index| self.entries[index].process.symmetry_factor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    #[test]
    fn invalid_process_is_a_no_op() {
        let model = models::qcd(1.0, 3, false);
        let mut algorithm = Algorithm::new(&model, 2, 2, 0);
        assert!(!algorithm.set_process("g,g > g,x"));
        assert!(!algorithm.valid_process());
        assert_eq!(algorithm.evaluate(), Amplitude::new(0.0, 0.0));
        assert_eq!(algorithm.evaluate2(), 0.0);
        assert_eq!(algorithm.count_diagrams(), 0);
    }

    #[test]
    fn family_batches_deduplicate() {
        let model = models::qcd(1.0, 3, false);
        let mut algorithm = Algorithm::new(&model, 2, 2, 0);
        algorithm.add_process("q,qbar > g,g").unwrap();
        // 36 combinations collapse to the 6 distinct flavour pairings
        assert_eq!(algorithm.n_processes(), 6);
        assert!(algorithm.valid_process());
    }

    #[test]
    fn reordered_selection_maps_legs() {
        let model = models::qcd(1.0, 3, false);
        let mut algorithm = Algorithm::new(&model, 2, 2, 0);
        algorithm.add_process("u,ubar > g,g").unwrap();
        assert!(algorithm.set_process("ubar,u > g,g"));
        assert_eq!(algorithm.n_processes(), 1);
        assert_eq!(algorithm.pdg_id(0), -2);
        assert_eq!(algorithm.pdg_id(1), 2);
    }

    #[test]
    fn empty_processes_can_be_dropped() {
        let model = models::qcd(1.0, 3, false);
        let mut algorithm = Algorithm::new(&model, 2, 1, 0);
        algorithm.add_process("u,u > g").unwrap();
        assert_eq!(algorithm.count_all_diagrams(), 0);
        algorithm.remove_empty_processes();
        assert_eq!(algorithm.n_processes(), 0);
    }
}
