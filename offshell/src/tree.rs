//! Process trees: building and evaluating the current recursion.
//!
//! A [`Tree`] holds every off-shell current and interaction contributing to
//! one external flavour configuration. Construction proceeds level by level
//! in the bitstring cardinality, fusing smaller currents through the model's
//! fusion map; one external leg (the final leg) is left out and contracted
//! against the last internal current at evaluation time. Currents and
//! interactions reference each other through arena indices.

use crate::bits::BitString;
use crate::current::{Current, CurrentId};
use crate::dirac;
use crate::interaction::{Interaction, Policy};
use crate::lorentz::{LegView, LegViewMut};
use crate::model::Model;
use crate::momentum::FourVector;
use crate::particle::Flavour;
use crate::tensor::{Amplitude, Tensor};
use rustc_hash::FxHashMap;

/// Kinematic and discrete state of one external leg.
#[derive(Clone, Debug)]
pub struct ExternalState {
    /// Physical four-momentum.
    pub momentum: FourVector,
    /// Helicity degree-of-freedom index.
    pub helicity: usize,
    /// Colour degree-of-freedom index.
    pub colour: usize,
    /// Explicit spin wave function overriding the helicity basis state,
    /// used by the continuous helicity sampler.
    pub spin_wave: Option<Vec<Amplitude>>,
    /// Explicit colour vector overriding the colour basis state, used by
    /// the continuous colour samplers.
    pub colour_wave: Option<Vec<Amplitude>>,
}

impl Default for ExternalState {
    fn default() -> Self {
        Self {
            momentum: FourVector::ZERO,
            helicity: 0,
            colour: 0,
            spin_wave: None,
            colour_wave: None,
        }
    }
}

/// The current/interaction graph of one subprocess.
#[derive(Clone, Debug)]
pub struct Tree {
    n_external: usize,
    final_leg: usize,
    currents: Vec<Current>,
    interactions: Vec<Interaction>,
    externals: Vec<CurrentId>,
    final_current: Option<CurrentId>,
    by_bits: FxHashMap<u64, Vec<CurrentId>>,
}

impl Tree {
    /// Builds, cleans and initialises the tree for the given external legs.
    ///
    /// `externals` lists `(flavour, outgoing)` per leg, incoming legs first.
    /// `final_leg` selects the external current contracted last; amplitudes
    /// must not depend on this choice.
    #[must_use]
    pub fn build(model: &Model, externals: &[(Flavour, bool)], final_leg: usize) -> Self {
        let n = externals.len();
        let final_leg = final_leg.min(n - 1);
        let mut tree = Self {
            n_external: n,
            final_leg,
            currents: Vec::new(),
            interactions: Vec::new(),
            externals: Vec::new(),
            final_current: None,
            by_bits: FxHashMap::default(),
        };
        for (leg, (flavour, outgoing)) in externals.iter().enumerate() {
            let id = tree.currents.len();
            tree.currents
                .push(Current::external(model, *flavour, leg, n, *outgoing));
            tree.externals.push(id);
            tree.by_bits
                .entry(BitString::single(leg, n).bits())
                .or_default()
                .push(id);
        }

        let mask = BitString::full(n).without(BitString::single(final_leg, n));
        let mut levels: Vec<Vec<u64>> = vec![Vec::new(); n + 1];
        let mut sub = mask.bits();
        while sub > 0 {
            let count = sub.count_ones() as usize;
            if count >= 2 {
                levels[count].push(sub);
            }
            sub = (sub - 1) & mask.bits();
        }
        for level in &mut levels {
            level.sort_unstable();
        }

        let fermion_mask = fermion_mask(model, externals);
        for level in 2..n {
            for bits in std::mem::take(&mut levels[level]) {
                let channel = BitString::from_bits(bits, n);
                for (first, second) in channel.partitions_two() {
                    tree.fuse(model, channel, &[first, second], fermion_mask);
                }
                for (first, second, third) in channel.partitions_three() {
                    tree.fuse(model, channel, &[first, second, third], fermion_mask);
                }
            }
        }

        let final_flavour = model
            .particle(tree.currents[tree.externals[final_leg]].produced_flavour(model))
            .anti_flavour();
        tree.final_current = tree
            .by_bits
            .get(&mask.bits())
            .and_then(|ids| {
                ids.iter()
                    .find(|id| tree.currents[**id].flavour == final_flavour)
            })
            .copied();

        tree.clean();
        tree.assign_policies();
        tree.count_multiplicities();
        for current in &mut tree.currents {
            current.initialise(model);
        }
        tree
    }

    /// Fuses the currents of the given channel partition through every
    /// matching entry of the fusion map.
    fn fuse(&mut self, model: &Model, channel: BitString, parts: &[BitString], fermions: u64) {
        let rank = parts.len() + 1;
        let part_ids: Vec<Vec<CurrentId>> = parts
            .iter()
            .map(|part| {
                self.by_bits
                    .get(&part.bits())
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        if part_ids.iter().any(Vec::is_empty) {
            return;
        }
        // Cartesian product over the currents available in each part
        let mut selection = vec![0_usize; parts.len()];
        loop {
            let ids: Vec<CurrentId> = selection
                .iter()
                .enumerate()
                .map(|(part, choice)| part_ids[part][*choice])
                .collect();
            self.fuse_selection(model, channel, parts, &ids, rank, fermions);
            // odometer step
            let mut slot = 0;
            loop {
                if slot == selection.len() {
                    return;
                }
                selection[slot] += 1;
                if selection[slot] < part_ids[slot].len() {
                    break;
                }
                selection[slot] = 0;
                slot += 1;
            }
        }
    }

    fn fuse_selection(
        &mut self,
        model: &Model,
        channel: BitString,
        parts: &[BitString],
        ids: &[CurrentId],
        rank: usize,
        fermions: u64,
    ) {
        let flavours: Vec<Flavour> = ids
            .iter()
            .map(|id| self.currents[*id].produced_flavour(model))
            .collect();
        let entries: Vec<_> = model.fusions(&flavours).to_vec();
        for entry in entries {
            let vertex = model.vertex(entry.vertex);
            if vertex.rank() != rank || vertex.is_erased() {
                continue;
            }
            let Some(legs) = assign_slots(vertex.legs(), entry.leg, ids, &flavours) else {
                continue;
            };
            // dispatch the rule from the fermion-flow pattern of the legs
            let mut flow = [false; 4];
            if vertex.is_fermionic() {
                for slot in [1, 2] {
                    if slot != entry.leg {
                        if let Some(id) = legs[slot] {
                            flow[slot] = self.currents[id].row != (slot == 1);
                        }
                    }
                }
            }
            let rule = vertex.dispatch_feynman_rule(flow, entry.leg);
            let produced_particle = model.particle(entry.produced);
            let row = if produced_particle.is_fermion() {
                if produced_particle.is_majorana() {
                    false
                } else {
                    produced_particle.fermion_number < 0
                }
            } else {
                false
            };
            let produced = self.find_or_create(channel, entry.produced, row);
            let fermi_sign = crossing_sign(&legs, entry.leg, &self.currents, fermions);
            self.interactions.push(Interaction {
                vertex: entry.vertex,
                legs,
                produced,
                produced_slot: entry.leg,
                fermi_sign,
                flow,
                policy: Policy::empty(),
                rule,
            });
        }
    }

    fn find_or_create(&mut self, bits: BitString, flavour: Flavour, row: bool) -> CurrentId {
        let ids = self.by_bits.entry(bits.bits()).or_default();
        if let Some(id) = ids
            .iter()
            .find(|id| self.currents[**id].flavour == flavour)
        {
            return *id;
        }
        let id = self.currents.len();
        self.currents.push(Current::internal(bits, flavour, row));
        ids.push(id);
        id
    }

    /// Removes every branch that cannot reach the final current.
    fn clean(&mut self) {
        for current in &mut self.currents {
            current.marked = false;
        }
        if let Some(final_current) = self.final_current {
            self.currents[final_current].marked = true;
        }
        for index in (0..self.interactions.len()).rev() {
            let produced = self.interactions[index].produced;
            if self.currents[produced].marked {
                for id in self.interactions[index].legs.iter().flatten() {
                    self.currents[*id].marked = true;
                }
            }
        }
        for id in &self.externals {
            self.currents[*id].marked = true;
        }

        let mut remap: Vec<Option<CurrentId>> = vec![None; self.currents.len()];
        let mut kept = Vec::with_capacity(self.currents.len());
        for (id, current) in self.currents.drain(..).enumerate() {
            if current.marked {
                remap[id] = Some(kept.len());
                kept.push(current);
            }
        }
        self.currents = kept;
        self.interactions.retain_mut(|interaction| {
            if remap[interaction.produced].is_none() {
                return false;
            }
            interaction.produced = remap[interaction.produced].unwrap();
            for slot in &mut interaction.legs {
                *slot = slot.map(|id| remap[id].expect("kept interaction with dropped leg"));
            }
            true
        });
        for id in &mut self.externals {
            *id = remap[*id].expect("external currents are never dropped");
        }
        self.final_current = self.final_current.and_then(|id| remap[id]);
        self.by_bits.clear();
        for (id, current) in self.currents.iter().enumerate() {
            self.by_bits
                .entry(current.bitstring.bits())
                .or_default()
                .push(id);
        }
    }

    /// Assigns momentum computation and propagation duties.
    fn assign_policies(&mut self) {
        let mask = BitString::full(self.n_external)
            .without(BitString::single(self.final_leg, self.n_external));
        let mut first_producer: FxHashMap<CurrentId, usize> = FxHashMap::default();
        let mut last_producer: FxHashMap<CurrentId, usize> = FxHashMap::default();
        for (index, interaction) in self.interactions.iter().enumerate() {
            first_producer.entry(interaction.produced).or_insert(index);
            last_producer.insert(interaction.produced, index);
        }
        for (index, interaction) in self.interactions.iter_mut().enumerate() {
            let produced = interaction.produced;
            if first_producer.get(&produced) == Some(&index) {
                interaction.policy |= Policy::COMPUTES_MOMENTUM;
            } else {
                interaction.policy |= Policy::ASSIGNS_MOMENTUM;
            }
            let is_final = self.currents[produced].bitstring.bits() == mask.bits();
            if last_producer.get(&produced) == Some(&index) && !is_final {
                interaction.policy |= Policy::PROPAGATES;
            }
        }
    }

    /// Propagates diagram multiplicities from the external legs upward.
    fn count_multiplicities(&mut self) {
        for current in &mut self.currents {
            current.multiplicity = u64::from(current.is_external());
        }
        for index in 0..self.interactions.len() {
            let interaction = &self.interactions[index];
            let mut product = 1_u64;
            for id in interaction.legs.iter().flatten() {
                product = product.saturating_mul(self.currents[*id].multiplicity);
            }
            self.currents[interaction.produced].multiplicity += product;
        }
    }

    /// Number of Feynman diagrams summed by the recursion.
    #[must_use]
    pub fn count_diagrams(&self) -> u64 {
        self.final_current
            .map_or(0, |id| self.currents[id].multiplicity)
    }

    /// Number of current combinations, the recursive complexity measure.
    #[must_use]
    pub fn count_current_combinations(&self) -> u64 {
        self.interactions.len() as u64
    }

    /// Returns whether no diagram survives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.final_current.is_none()
    }

    /// Returns the number of external legs.
    #[must_use]
    pub const fn n_external(&self) -> usize {
        self.n_external
    }

    /// Returns the final leg index.
    #[must_use]
    pub const fn final_leg(&self) -> usize {
        self.final_leg
    }

    /// Returns the currents.
    #[must_use]
    pub fn currents(&self) -> &[Current] {
        &self.currents
    }

    /// Returns the internal momentum channels of the tree, one bitstring per
    /// current class, with the flavours carried on each.
    #[must_use]
    pub fn momentum_channels(&self) -> Vec<(BitString, Vec<Flavour>)> {
        let mut channels: Vec<(BitString, Vec<Flavour>)> = Vec::new();
        for current in &self.currents {
            if current.is_external() {
                continue;
            }
            if let Some(entry) = channels
                .iter_mut()
                .find(|(bits, _)| bits.bits() == current.bitstring.bits())
            {
                entry.1.push(current.flavour);
            } else {
                channels.push((current.bitstring, vec![current.flavour]));
            }
        }
        channels
    }

    /// Returns the interactions in evaluation order.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Evaluates the amplitude for concrete external states.
    pub fn evaluate(&mut self, model: &Model, states: &[ExternalState]) -> Amplitude {
        let zero = Amplitude::new(0.0, 0.0);
        let Some(final_current) = self.final_current else {
            return zero;
        };
        self.fill_externals(model, states);
        for current in &mut self.currents {
            current.reset();
        }
        for index in 0..self.interactions.len() {
            self.evaluate_interaction(model, index);
        }
        if !self.currents[final_current].coupled
            || !self.currents[self.externals[self.final_leg]].coupled
        {
            return zero;
        }
        let external = &self.currents[self.externals[self.final_leg]];
        let particle = model.particle(external.flavour);
        particle.contract(
            &external.amplitude,
            &self.currents[final_current].amplitude,
            model.nc(),
        )
    }

    fn fill_externals(&mut self, model: &Model, states: &[ExternalState]) {
        for (leg, id) in self.externals.iter().enumerate() {
            let state = &states[leg];
            let current = &mut self.currents[*id];
            let particle = model.particle(current.flavour);
            let colour_dof = particle.colour_dof(model.nc());
            current.amplitude.reset();
            current.flow_offsets.clear();
            let spin_block = state.spin_wave.clone().unwrap_or_else(|| {
                particle.wave_function(&state.momentum, state.helicity, current.outgoing)
            });
            if let Some(colour_wave) = &state.colour_wave {
                for (mu, spin) in spin_block.iter().enumerate() {
                    for (c, colour) in colour_wave.iter().enumerate().take(colour_dof) {
                        current.amplitude[mu * colour_dof + c] = spin * colour;
                    }
                }
                for colour in 0..colour_dof {
                    current.record_flow_offset(colour as u32);
                }
            } else {
                for (mu, spin) in spin_block.iter().enumerate() {
                    current.amplitude[mu * colour_dof + state.colour] = *spin;
                }
                current.record_flow_offset(state.colour as u32);
            }
            current.momentum = if current.outgoing {
                -state.momentum
            } else {
                state.momentum
            };
            current.coupled = particle.is_coupled();
        }
    }

    fn evaluate_interaction(&mut self, model: &Model, index: usize) {
        let interaction = self.interactions[index].clone();
        let vertex = model.vertex(interaction.vertex);

        if interaction.policy.contains(Policy::COMPUTES_MOMENTUM) {
            let mut momentum = FourVector::ZERO;
            for id in interaction.legs.iter().flatten() {
                momentum += self.currents[*id].momentum;
            }
            self.currents[interaction.produced].momentum = momentum;
        }

        let inputs_coupled = interaction
            .legs
            .iter()
            .flatten()
            .all(|id| self.currents[*id].coupled);
        if inputs_coupled && vertex.is_coupled() && !vertex.is_erased() {
            self.apply_rule(model, &interaction);
            self.currents[interaction.produced].coupled = true;
        }

        if interaction.policy.contains(Policy::PROPAGATES)
            && self.currents[interaction.produced].coupled
        {
            let current = &mut self.currents[interaction.produced];
            let particle = model.particle(current.flavour);
            let momentum = current.momentum;
            let row = current.row;
            particle.propagate(&mut current.amplitude, &momentum, row, model.nc());
            if particle.colour_rep() == crate::colour::ColourRep::FlowAdjoint {
                let nc = model.nc() as u32;
                let mut transposed: Vec<u32> = current
                    .flow_offsets
                    .iter()
                    .map(|offset| (offset % nc) * nc + offset / nc)
                    .collect();
                transposed.sort_unstable();
                current.flow_offsets = transposed;
            }
        }
    }

    fn apply_rule(&mut self, model: &Model, interaction: &Interaction) {
        let vertex = model.vertex(interaction.vertex);
        let coupling = vertex.couplings()[0];
        let sign = f64::from(interaction.fermi_sign);
        let produced_slot = interaction.rule.produced;

        let mut slots = interaction.legs;
        if interaction.rule.swap_fermions {
            slots.swap(1, 2);
        }

        // strides and momenta per vertex slot
        let mut strides = [1_usize; 4];
        let mut momenta = [FourVector::ZERO; 4];
        for (slot, id) in slots.iter().enumerate() {
            if let Some(id) = id {
                let particle = model.particle(self.currents[*id].produced_flavour(model));
                strides[slot] = particle.colour_dof(model.nc());
                momenta[slot] = self.currents[*id].momentum;
            }
        }
        let produced_particle = model.particle(self.currents[interaction.produced].flavour);
        let produced_stride = produced_particle.colour_dof(model.nc());
        strides[produced_slot] = produced_stride;
        momenta[produced_slot] = -self.currents[interaction.produced].momentum;

        // the produced current is written through a detached tensor so the
        // input currents can be viewed immutably
        let majorana_flip =
            produced_particle.is_majorana() && interaction.rule.produced == 2;
        let mut out_tensor = if majorana_flip {
            let mut scratch = Tensor::default();
            produced_particle.make_amplitude(&mut scratch, model.nc());
            scratch
        } else {
            std::mem::take(&mut self.currents[interaction.produced].amplitude)
        };
        let mut new_offsets: Vec<u32> = Vec::new();
        {
            let currents = &self.currents;
            for term in &vertex.compiled_colour().terms {
                // colour blocks known to vanish cannot contribute
                let supported = slots.iter().enumerate().all(|(slot, id)| {
                    id.map_or(true, |id| {
                        currents[id].has_flow_offset(term.offsets[slot])
                    })
                });
                if !supported {
                    continue;
                }
                let factor = sign * coupling * term.coeff;
                let mut ins: [Option<LegView<'_>>; 4] = [None, None, None, None];
                for (slot, id) in slots.iter().enumerate() {
                    if let Some(id) = id {
                        ins[slot] = Some(LegView::new(
                            currents[*id].amplitude.as_slice(),
                            term.offsets[slot] as usize,
                            strides[slot],
                        ));
                    }
                }
                let mut out = LegViewMut::new(
                    out_tensor.as_mut_slice(),
                    term.offsets[produced_slot] as usize,
                    produced_stride,
                );
                vertex.lorentz().apply(
                    interaction.rule.variant,
                    produced_slot,
                    factor,
                    &mut out,
                    &ins,
                    &momenta,
                    term.pairing,
                );
                new_offsets.push(term.offsets[produced_slot]);
            }
        }
        if majorana_flip {
            // re-orient the row output into the canonical column form
            let conjugation = dirac::conjugation_matrix();
            let produced = &mut self.currents[interaction.produced];
            for c in 0..produced_stride {
                for i in 0..4 {
                    let mut value = Amplitude::new(0.0, 0.0);
                    for j in 0..4 {
                        value += conjugation[i][j] * out_tensor[j * produced_stride + c];
                    }
                    produced.amplitude[i * produced_stride + c] += value;
                }
            }
        } else {
            self.currents[interaction.produced].amplitude = out_tensor;
        }
        for offset in new_offsets {
            self.currents[interaction.produced].record_flow_offset(offset);
        }
    }

    /// Evaluates `Σ|M|²` with the flagged legs summed over their helicity
    /// and colour ranges; unflagged legs keep their assigned state.
    pub fn evaluate_sum(
        &mut self,
        model: &Model,
        states: &[ExternalState],
        sum_helicity: &[bool],
        sum_colour: &[bool],
    ) -> f64 {
        let mut working: Vec<ExternalState> = states.to_vec();
        let mut dims = Vec::new();
        for (leg, id) in self.externals.iter().enumerate() {
            let particle = model.particle(self.currents[*id].flavour);
            if sum_helicity[leg] {
                dims.push((leg, true, particle.spin_dof()));
                working[leg].helicity = 0;
                working[leg].spin_wave = None;
            }
            if sum_colour[leg] {
                dims.push((leg, false, particle.colour_dof(model.nc())));
                working[leg].colour = 0;
                working[leg].colour_wave = None;
            }
        }
        let mut total = 0.0;
        loop {
            total += self.evaluate(model, &working).norm_sqr();
            // odometer over the summed degrees of freedom
            let mut slot = 0;
            loop {
                if slot == dims.len() {
                    return total;
                }
                let (leg, is_helicity, dim) = dims[slot];
                let value = if is_helicity {
                    &mut working[leg].helicity
                } else {
                    &mut working[leg].colour
                };
                *value += 1;
                if *value < dim {
                    break;
                }
                *value = 0;
                slot += 1;
            }
        }
    }
}

/// Bit mask of the fermionic external legs.
fn fermion_mask(model: &Model, externals: &[(Flavour, bool)]) -> u64 {
    let mut mask = 0_u64;
    for (leg, (flavour, _)) in externals.iter().enumerate() {
        if model.particle(*flavour).is_fermion() {
            mask |= 1 << leg;
        }
    }
    mask
}

/// Greedily assigns the selected currents to the vertex slots other than the
/// produced one, matching flavours in slot order.
fn assign_slots(
    vertex_legs: &[Flavour],
    produced_slot: usize,
    ids: &[CurrentId],
    flavours: &[Flavour],
) -> Option<[Option<CurrentId>; 4]> {
    let mut result = [None; 4];
    let mut used = [false; 3];
    for (slot, leg_flavour) in vertex_legs.iter().enumerate() {
        if slot == produced_slot {
            continue;
        }
        let position = flavours
            .iter()
            .enumerate()
            .position(|(index, flavour)| !used[index] && flavour == leg_flavour)?;
        used[position] = true;
        result[slot] = Some(ids[position]);
    }
    Some(result)
}

/// Fermi sign of an interaction: parity of the fermion-line crossings when
/// the parts' external fermion labels are concatenated in vertex-slot order.
fn crossing_sign(
    legs: &[Option<CurrentId>; 4],
    _produced_slot: usize,
    currents: &[Current],
    fermions: u64,
) -> i8 {
    let mut labels: Vec<usize> = Vec::new();
    for id in legs.iter().flatten() {
        let bits = currents[*id].bitstring.bits() & fermions;
        for leg in 0..64 {
            if bits >> leg & 1 == 1 {
                labels.push(leg);
            }
        }
    }
    let mut crossings = 0;
    for (i, a) in labels.iter().enumerate() {
        for b in &labels[i + 1..] {
            if a > b {
                crossings += 1;
            }
        }
    }
    if crossings % 2 == 0 {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    fn gluon_process(model: &Model, n_out: usize) -> Vec<(Flavour, bool)> {
        let g = model.get_particle("g").unwrap().flavour();
        let mut externals = vec![(g, false), (g, false)];
        externals.extend(std::iter::repeat((g, true)).take(n_out));
        externals
    }

    #[test]
    fn diagram_counts_match_tabulated_values() {
        let model = models::qcd(0.2, 3, false);
        for (n_out, expected) in [(2, 4), (3, 25), (4, 220)] {
            let tree = Tree::build(&model, &gluon_process(&model, n_out), 0);
            assert_eq!(tree.count_diagrams(), expected, "gg -> {n_out}g");
        }
    }

    #[test]
    fn diagram_counts_are_final_leg_independent() {
        let model = models::qcd(0.2, 3, false);
        let externals = gluon_process(&model, 3);
        let reference = Tree::build(&model, &externals, 0).count_diagrams();
        for final_leg in 1..5 {
            let tree = Tree::build(&model, &externals, final_leg);
            assert_eq!(tree.count_diagrams(), reference);
        }
    }

    #[test]
    fn quark_pair_to_gluons_counts() {
        let model = models::qcd(0.2, 3, false);
        let u = model.get_particle("u").unwrap().flavour();
        let ubar = model.get_particle("ubar").unwrap().flavour();
        let g = model.get_particle("g").unwrap().flavour();
        // u ubar -> g g has the three tree graphs: t, u and s channel
        let tree = Tree::build(&model, &[(u, false), (ubar, false), (g, true), (g, true)], 0);
        assert_eq!(tree.count_diagrams(), 3);
    }

    #[test]
    fn three_leg_process_without_vertex_is_empty() {
        let model = models::qcd(0.2, 3, false);
        let u = model.get_particle("u").unwrap().flavour();
        let g = model.get_particle("g").unwrap().flavour();
        // u u -> g violates fermion number, so no vertex chain exists
        let tree = Tree::build(&model, &[(u, false), (u, false), (g, true)], 0);
        assert!(tree.is_empty());
        assert_eq!(tree.count_diagrams(), 0);
    }

    #[test]
    fn toy_model_majorana_process_builds() {
        let model = models::toy(0.3, 0.5);
        let chi = model.get_particle("chi").unwrap().flavour();
        let phi = model.get_particle("phi").unwrap().flavour();
        let tree = Tree::build(
            &model,
            &[(chi, false), (chi, false), (phi, true), (phi, true)],
            0,
        );
        assert!(!tree.is_empty());
        assert!(tree.count_diagrams() >= 2);
    }

    #[test]
    fn cleaning_keeps_momentum_channels_consistent() {
        let model = models::qcd(0.2, 3, false);
        let tree = Tree::build(&model, &gluon_process(&model, 2), 3);
        for (bits, flavours) in tree.momentum_channels() {
            assert!(bits.count() >= 2);
            assert!(!flavours.is_empty());
        }
        // every interaction's legs partition the produced bitstring
        for interaction in tree.interactions() {
            let produced = tree.currents()[interaction.produced].bitstring;
            let mut union = BitString::empty(produced.width());
            for id in interaction.legs.iter().flatten() {
                let bits = tree.currents()[*id].bitstring;
                assert!(union.disjoint(bits));
                union = union.union(bits);
            }
            assert_eq!(union, produced);
        }
    }
}
