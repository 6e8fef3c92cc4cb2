//! Model registry: particles, vertices and the fusion map.
//!
//! A [`Model`] owns every particle and vertex of a field theory and answers
//! flavour, name and PDG-id lookups. The fusion map inverts the vertex list:
//! for a multiset of incoming particle flavours it lists every vertex that
//! can fuse them, together with the produced particle. Amplitude facades
//! borrow the model immutably; mutation (mass updates, pruning) happens
//! between evaluations.

use crate::colour::{ColourRep, ColourStructure, SuN};
use crate::error::{Error, Result};
use crate::lorentz::LorentzStructure;
use crate::particle::{Flavour, Particle};
use crate::tensor::Amplitude;
use crate::vertex::Vertex;
use arrayvec::ArrayVec;
use log::warn;
use rustc_hash::FxHashMap;

/// Sorted multiset of incoming flavours, the key of the fusion map.
pub type FusionKey = ArrayVec<Flavour, 3>;

/// One possible fusion of a flavour multiset.
#[derive(Clone, Copy, Debug)]
pub struct FusionEntry {
    /// Flavour of the produced off-shell particle.
    pub produced: Flavour,
    /// Index of the mediating vertex in the model.
    pub vertex: usize,
    /// Leg slot of the vertex that is produced.
    pub leg: usize,
}

/// Specification of a particle to be inserted into a model.
#[derive(Clone, Debug)]
pub struct ParticleSpec {
    /// Particle name.
    pub name: String,
    /// PDG id.
    pub pdg_id: i32,
    /// Twice the spin.
    pub spin2: u8,
    /// Mass slot, `None` for massless.
    pub mass: Option<f64>,
    /// Width slot, `None` for stable.
    pub width: Option<f64>,
    /// Colour representation.
    pub colour: ColourRep,
    /// Fermion number.
    pub fermion_number: i8,
    /// Majorana flag.
    pub majorana: bool,
}

impl ParticleSpec {
    /// Starts a specification with the given name and PDG id.
    #[must_use]
    pub fn new(name: &str, pdg_id: i32) -> Self {
        Self {
            name: name.to_string(),
            pdg_id,
            spin2: 0,
            mass: None,
            width: None,
            colour: ColourRep::Singlet,
            fermion_number: 0,
            majorana: false,
        }
    }

    /// Sets twice the spin.
    #[must_use]
    pub fn spin2(mut self, spin2: u8) -> Self {
        self.spin2 = spin2;
        self
    }

    /// Sets the mass.
    #[must_use]
    pub fn mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Sets the width.
    #[must_use]
    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the colour representation.
    #[must_use]
    pub fn colour(mut self, colour: ColourRep) -> Self {
        self.colour = colour;
        self
    }

    /// Marks the particle as a fermion with the given fermion number.
    #[must_use]
    pub fn fermion(mut self, number: i8) -> Self {
        self.spin2 = 1;
        self.fermion_number = number;
        self
    }

    /// Marks the particle as a Majorana fermion.
    #[must_use]
    pub fn majorana(mut self) -> Self {
        self.spin2 = 1;
        self.fermion_number = 0;
        self.majorana = true;
        self
    }
}

/// A field-theory model: the process-wide registry of particles and
/// vertices.
#[derive(Clone, Debug)]
pub struct Model {
    name: String,
    group: SuN,
    colour_flow: bool,
    particles: Vec<Particle>,
    vertices: Vec<Vertex>,
    by_name: FxHashMap<String, Flavour>,
    by_pdg: FxHashMap<i32, Flavour>,
    families: FxHashMap<String, Vec<Flavour>>,
    fusion: FxHashMap<FusionKey, Vec<FusionEntry>>,
}

impl Model {
    /// Creates an empty model.
    ///
    /// `colour_flow` selects the colour-flow decomposition: adjoint indices
    /// are carried as fundamental pairs and vertices compile their colour
    /// structures in the flow basis.
    #[must_use]
    pub fn new(name: &str, nc: usize, colour_flow: bool) -> Self {
        Self {
            name: name.to_string(),
            group: SuN::new(nc),
            colour_flow,
            particles: Vec::new(),
            vertices: Vec::new(),
            by_name: FxHashMap::default(),
            by_pdg: FxHashMap::default(),
            families: FxHashMap::default(),
            fusion: FxHashMap::default(),
        }
    }

    /// Returns the model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of colours.
    #[must_use]
    pub const fn nc(&self) -> usize {
        self.group.nc()
    }

    /// Returns the group data.
    #[must_use]
    pub const fn group(&self) -> &SuN {
        &self.group
    }

    /// Returns whether the model runs in colour-flow decomposition.
    #[must_use]
    pub const fn colour_flow(&self) -> bool {
        self.colour_flow
    }

    /// Returns the adjoint colour representation used by this model.
    #[must_use]
    pub const fn adjoint_rep(&self) -> ColourRep {
        if self.colour_flow {
            ColourRep::FlowAdjoint
        } else {
            ColourRep::Adjoint
        }
    }

    /// Inserts a self-conjugate particle and returns its flavour.
    pub fn add_particle(&mut self, spec: &ParticleSpec) -> Flavour {
        let flavour = self.particles.len();
        self.particles.push(Particle {
            name: spec.name.clone(),
            flavour,
            pdg_id: spec.pdg_id,
            spin2: spec.spin2,
            mass: spec.mass,
            width: spec.width,
            fermion_number: spec.fermion_number,
            majorana: spec.majorana,
            colour: spec.colour,
            anti: flavour,
            coupled: false,
            erased: false,
        });
        self.by_name.insert(spec.name.clone(), flavour);
        self.by_pdg.insert(spec.pdg_id, flavour);
        flavour
    }

    /// Inserts a particle/anti-particle pair and returns both flavours.
    pub fn add_particle_pair(
        &mut self,
        spec: &ParticleSpec,
        anti_name: &str,
    ) -> (Flavour, Flavour) {
        let particle = self.add_particle(spec);
        let mut anti_spec = spec.clone();
        anti_spec.name = anti_name.to_string();
        anti_spec.pdg_id = -spec.pdg_id;
        anti_spec.fermion_number = -spec.fermion_number;
        anti_spec.colour = spec.colour.conjugate();
        let anti = self.add_particle(&anti_spec);
        self.particles[particle].anti = anti;
        self.particles[anti].anti = particle;
        (particle, anti)
    }

    /// Looks up a particle by name, warning on a miss.
    #[must_use]
    pub fn get_particle(&self, name: &str) -> Option<&Particle> {
        let found = self
            .by_name
            .get(name)
            .map(|flavour| &self.particles[*flavour]);
        if found.is_none() {
            warn!("particle `{name}` not found in model `{}`", self.name);
        }
        found
    }

    /// Looks up a particle by internal flavour index.
    ///
    /// # Panics
    ///
    /// Panics if the flavour is out of range.
    #[must_use]
    pub fn particle(&self, flavour: Flavour) -> &Particle {
        &self.particles[flavour]
    }

    /// Looks up a particle by PDG id, warning on a miss.
    #[must_use]
    pub fn get_particle_by_pdg(&self, pdg_id: i32) -> Option<&Particle> {
        let found = self
            .by_pdg
            .get(&pdg_id)
            .map(|flavour| &self.particles[*flavour]);
        if found.is_none() {
            warn!("PDG id {pdg_id} not found in model `{}`", self.name);
        }
        found
    }

    /// Number of particle slots, including erased ones.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Returns the vertices.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Returns vertex `index`.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of range.
    #[must_use]
    pub fn vertex(&self, index: usize) -> &Vertex {
        &self.vertices[index]
    }

    /// Defines a named particle family, used by the process parser as a
    /// shorthand for a set of particles.
    ///
    /// # Errors
    ///
    /// Fails with a model-lookup error if a member name is unknown.
    pub fn construct_family(&mut self, name: &str, members: &[&str]) -> Result<()> {
        let mut flavours = Vec::with_capacity(members.len());
        for member in members {
            let particle = self
                .get_particle(member)
                .ok_or_else(|| Error::ModelLookup((*member).to_string()))?;
            flavours.push(particle.flavour());
        }
        self.families.insert(name.to_string(), flavours);
        Ok(())
    }

    /// Returns the members of a family, if defined.
    #[must_use]
    pub fn family(&self, name: &str) -> Option<&[Flavour]> {
        self.families.get(name).map(Vec::as_slice)
    }

    /// Resolves a process-string token to a set of flavours: either a single
    /// particle name or a family name.
    #[must_use]
    pub fn resolve_token(&self, token: &str) -> Option<Vec<Flavour>> {
        if let Some(flavour) = self.by_name.get(token) {
            return Some(vec![*flavour]);
        }
        self.families.get(token).cloned()
    }

    /// Inserts a vertex given its leg particle names, Lorentz structure,
    /// colour structure and couplings, and populates the fusion map.
    ///
    /// # Errors
    ///
    /// Fails with a model-lookup error for unknown leg names and with a
    /// shape-conflict error if a leg particle's tensor shape does not match
    /// the declared ranges of the Lorentz structure.
    pub fn add_vertex(
        &mut self,
        legs: &[&str],
        lorentz: LorentzStructure,
        colour: ColourStructure,
        couplings: Vec<Amplitude>,
    ) -> Result<()> {
        if legs.len() != lorentz.legs() {
            return Err(Error::ShapeConflict(
                vec![legs.len()],
                vec![lorentz.legs()],
            ));
        }
        let mut flavours: ArrayVec<Flavour, 4> = ArrayVec::new();
        for name in legs {
            let particle = self
                .get_particle(name)
                .ok_or_else(|| Error::ModelLookup((*name).to_string()))?;
            flavours.push(particle.flavour());
        }
        for (slot, flavour) in flavours.iter().enumerate() {
            let expected = lorentz.leg_ranges(slot);
            let actual = self.particles[*flavour].spin_ranges();
            if expected != actual {
                warn!(
                    "rejecting vertex {legs:?}: leg {slot} has ranges {actual:?}, rule wants {expected:?}"
                );
                return Err(Error::ShapeConflict(actual, expected));
            }
        }
        let majorana_type = if lorentz.is_fermionic() {
            2 * u8::from(self.particles[flavours[1]].is_majorana())
                + u8::from(self.particles[flavours[2]].is_majorana())
        } else {
            0
        };
        let fermionic = flavours
            .iter()
            .any(|flavour| self.particles[*flavour].is_fermion());
        let compiled = colour.compile(&self.group, self.colour_flow);
        let index = self.vertices.len();
        self.vertices.push(Vertex {
            legs: flavours.clone(),
            couplings,
            lorentz,
            colour,
            compiled,
            majorana_type,
            fermionic,
            coupled: true,
            erased: false,
        });
        for flavour in &flavours {
            self.particles[*flavour].coupled = true;
        }
        self.insert_fusions(index);
        Ok(())
    }

    /// Adds the fusion entries of vertex `index`. Producing two legs of the
    /// same flavour yields the same symmetrised contribution, so only the
    /// first such slot is entered.
    fn insert_fusions(&mut self, index: usize) {
        let legs = self.vertices[index].legs.clone();
        let mut seen: ArrayVec<Flavour, 4> = ArrayVec::new();
        for produced_leg in 0..legs.len() {
            if seen.contains(&legs[produced_leg]) {
                continue;
            }
            seen.push(legs[produced_leg]);
            let mut key: FusionKey = legs
                .iter()
                .enumerate()
                .filter(|(slot, _)| *slot != produced_leg)
                .map(|(_, flavour)| *flavour)
                .collect();
            key.sort_unstable();
            let produced = self.particles[legs[produced_leg]].anti;
            self.fusion.entry(key).or_default().push(FusionEntry {
                produced,
                vertex: index,
                leg: produced_leg,
            });
        }
    }

    /// Rebuilds the fusion map from the surviving vertices.
    fn rebuild_fusions(&mut self) {
        self.fusion.clear();
        for index in 0..self.vertices.len() {
            if !self.vertices[index].erased {
                self.insert_fusions(index);
            }
        }
    }

    /// Returns all fusions matching a multiset of incoming flavours. The
    /// entries are ordered by insertion, i.e. by vertex registration order.
    #[must_use]
    pub fn fusions(&self, flavours: &[Flavour]) -> &[FusionEntry] {
        let mut key: FusionKey = flavours.iter().copied().collect();
        key.sort_unstable();
        self.fusion.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Sets the mass slot of a particle and of its anti-particle.
    ///
    /// # Errors
    ///
    /// Fails with a model-lookup error if the name is unknown.
    pub fn set_mass(&mut self, name: &str, mass: Option<f64>) -> Result<()> {
        let flavour = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::ModelLookup(name.to_string()))?;
        let anti = self.particles[flavour].anti;
        self.particles[flavour].mass = mass;
        self.particles[anti].mass = mass;
        Ok(())
    }

    /// Sets the width slot of a particle and of its anti-particle.
    ///
    /// # Errors
    ///
    /// Fails with a model-lookup error if the name is unknown.
    pub fn set_width(&mut self, name: &str, width: Option<f64>) -> Result<()> {
        let flavour = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::ModelLookup(name.to_string()))?;
        let anti = self.particles[flavour].anti;
        self.particles[flavour].width = width;
        self.particles[anti].width = width;
        Ok(())
    }

    /// Decouples a particle: it stays in the registry but every vertex with
    /// it on a leg stops contributing.
    ///
    /// # Errors
    ///
    /// Fails with a model-lookup error if the name is unknown.
    pub fn decouple_particle(&mut self, name: &str) -> Result<()> {
        let flavour = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::ModelLookup(name.to_string()))?;
        self.particles[flavour].coupled = false;
        for vertex in &mut self.vertices {
            if vertex.legs.contains(&flavour) {
                vertex.coupled = false;
            }
        }
        Ok(())
    }

    /// Re-couples a particle and every vertex whose legs are all coupled.
    ///
    /// # Errors
    ///
    /// Fails with a model-lookup error if the name is unknown.
    pub fn couple_particle(&mut self, name: &str) -> Result<()> {
        let flavour = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::ModelLookup(name.to_string()))?;
        self.particles[flavour].coupled = true;
        let coupled: Vec<bool> = self.particles.iter().map(|p| p.coupled).collect();
        for vertex in &mut self.vertices {
            if !vertex.erased {
                vertex.coupled = vertex.legs.iter().all(|flavour| coupled[*flavour]);
            }
        }
        Ok(())
    }

    /// Erases a particle together with every vertex depending on it, and
    /// rebuilds the fusion map. The flavour slot stays allocated so that
    /// other flavour indices remain valid.
    ///
    /// # Errors
    ///
    /// Fails with a model-lookup error if the name is unknown.
    pub fn erase_particle(&mut self, name: &str) -> Result<()> {
        let flavour = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::ModelLookup(name.to_string()))?;
        self.particles[flavour].erased = true;
        self.particles[flavour].coupled = false;
        self.by_name.remove(name);
        self.by_pdg.remove(&self.particles[flavour].pdg_id);
        for family in self.families.values_mut() {
            family.retain(|member| *member != flavour);
        }
        for vertex in &mut self.vertices {
            if vertex.legs.contains(&flavour) {
                vertex.erased = true;
                vertex.coupled = false;
            }
        }
        self.rebuild_fusions();
        Ok(())
    }

    /// Decouples vertex `index`.
    pub fn decouple_vertex(&mut self, index: usize) {
        if let Some(vertex) = self.vertices.get_mut(index) {
            vertex.coupled = false;
        }
    }

    /// Erases vertex `index` and rebuilds the fusion map.
    pub fn erase_vertex(&mut self, index: usize) {
        if let Some(vertex) = self.vertices.get_mut(index) {
            vertex.erased = true;
            vertex.coupled = false;
        }
        self.rebuild_fusions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    #[test]
    fn lookups() {
        let model = models::qcd(1.0, 3, false);
        assert_eq!(model.get_particle("g").unwrap().pdg_id(), 21);
        assert_eq!(model.get_particle_by_pdg(-2).unwrap().name(), "ubar");
        assert!(model.get_particle("graviton").is_none());
        let u = model.get_particle("u").unwrap();
        assert_eq!(model.particle(u.anti_flavour()).name(), "ubar");
    }

    #[test]
    fn mass_setting_is_idempotent_and_symmetric() {
        let mut model = models::qcd(1.0, 3, false);
        model.set_mass("b", Some(4.75)).unwrap();
        model.set_mass("b", Some(4.75)).unwrap();
        assert_eq!(model.get_particle("b").unwrap().mass(), 4.75);
        assert_eq!(model.get_particle("bbar").unwrap().mass(), 4.75);
        model.set_mass("b", None).unwrap();
        assert_eq!(model.get_particle("b").unwrap().mass(), 0.0);
        assert!(model.set_mass("unknown", Some(1.0)).is_err());
    }

    #[test]
    fn fusion_map_contains_qcd_fusions() {
        let model = models::qcd(1.0, 3, false);
        let g = model.get_particle("g").unwrap().flavour();
        let u = model.get_particle("u").unwrap().flavour();
        let ubar = model.get_particle("ubar").unwrap().flavour();
        // u and ubar fuse into a gluon (and into nothing else in pure QCD)
        let fusions = model.fusions(&[ubar, u]);
        assert_eq!(fusions.len(), 1);
        assert_eq!(fusions[0].produced, g);
        // two gluons fuse into an off-shell gluon through the triple vertex
        let gg = model.fusions(&[g, g]);
        assert_eq!(gg.len(), 1);
        assert_eq!(gg[0].produced, g);
        // a gluon absorbs a quark into an off-shell quark
        assert!(model.fusions(&[g, u]).iter().any(|e| e.produced == u));
        // three gluons fuse through the quartic vertex
        assert!(!model.fusions(&[g, g, g]).is_empty());
    }

    #[test]
    fn family_expansion() {
        let model = models::qcd(1.0, 3, false);
        let quarks = model.family("q").unwrap();
        assert_eq!(quarks.len(), 6);
        assert!(model.resolve_token("u").unwrap().len() == 1);
        assert!(model.resolve_token("q").unwrap().len() == 6);
        assert!(model.resolve_token("nope").is_none());
    }

    #[test]
    fn decoupling_and_erasure_prune_fusions() {
        let mut model = models::qcd(1.0, 3, false);
        let g = model.get_particle("g").unwrap().flavour();
        let u = model.get_particle("u").unwrap().flavour();
        model.decouple_particle("u").unwrap();
        // the fusion entries survive decoupling but the vertices are off
        assert!(model
            .fusions(&[g, g])
            .iter()
            .filter(|entry| model.vertex(entry.vertex).legs().contains(&u))
            .all(|entry| !model.vertex(entry.vertex).is_coupled()));
        model.couple_particle("u").unwrap();
        assert!(model.vertices().iter().all(Vertex::is_coupled));

        model.erase_particle("u").unwrap();
        assert!(model.get_particle("u").is_none());
        assert!(model
            .fusions(&[g, g])
            .iter()
            .all(|entry| !model.vertex(entry.vertex).is_erased()));
    }
}
