//! Recursive phase-space decomposition.
//!
//! The channel tree decomposes the outgoing phase space into momentum
//! channels (subsets of the outgoing legs), each carrying one particle
//! channel per candidate intermediate particle and a list of binary
//! branchings. Generation walks the tree selecting particle channels and
//! branchings by multichannel weights; the event weight is the exact
//! reciprocal of the full multichannel density with respect to the
//! invariant phase-space measure, so re-evaluating a stored event
//! reproduces its weight.

use crate::bits::BitString;
use crate::config::Settings;
use crate::invariants::InvariantMap;
use crate::model::Model;
use crate::momentum::{two_body_momentum, FourVector};
use crate::parni::Parni;
use crate::tree::Tree;
use rand::Rng;
use rustc_hash::FxHashMap;

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;
const FOUR_PI: f64 = 4.0 * std::f64::consts::PI;

/// Assignment state of a momentum channel during generation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ChannelStatus {
    /// Nothing assigned yet.
    #[default]
    Unset,
    /// Momentum assigned from outside.
    MomentumAssigned,
    /// Momentum generated by a branching.
    MomentumGenerated,
}

/// One binary splitting of a momentum channel.
#[derive(Clone, Debug)]
struct Branching {
    children: (usize, usize),
    /// Spacelike branching of the initial state, sampling the momentum
    /// transfer instead of the polar angle.
    t_channel: bool,
    angle_grid: Option<Parni>,
}

/// A candidate intermediate particle on a momentum channel.
#[derive(Clone, Debug)]
struct ParticleChannel {
    map: InvariantMap,
    grid: Option<Parni>,
    on_shell: bool,
    branchings: Vec<Branching>,
    branch_weights: Vec<f64>,
    branch_accumulators: Vec<f64>,
}

/// A momentum channel: a subset of the outgoing legs.
#[derive(Clone, Debug)]
struct Channel {
    bits: BitString,
    particle_channels: Vec<ParticleChannel>,
    weights: Vec<f64>,
    accumulators: Vec<f64>,
    s_min_cut: f64,
    status: ChannelStatus,
}

#[derive(Clone, Copy, Debug)]
struct GridVisit {
    channel: usize,
    pc: usize,
    branch: Option<usize>,
    point: [f64; 2],
    one_dimensional: bool,
}

#[derive(Clone, Copy, Debug)]
struct WeightVisit {
    channel: usize,
    pc: usize,
    branch: Option<usize>,
    fraction: f64,
}

/// Recursive multichannel phase-space generator for one subprocess.
#[derive(Clone, Debug)]
pub struct PhaseSpaceTree {
    n_out: usize,
    masses: Vec<f64>,
    channels: Vec<Channel>,
    by_bits: FxHashMap<u64, usize>,
    root: usize,
    backward: bool,
    t_exponent: f64,
    sqrt_s: f64,
    grid_visits: Vec<GridVisit>,
    weight_visits: Vec<WeightVisit>,
}

impl PhaseSpaceTree {
    /// Builds the channel tree for a subprocess from its amplitude tree.
    ///
    /// Momentum channels mirror the amplitude tree's channels restricted to
    /// the outgoing legs; channels reached through the initial state enter
    /// as their outgoing complement. Every channel is closed under at least
    /// one branching by inserting auxiliary channels where needed.
    #[must_use]
    pub fn build(model: &Model, tree: &Tree, n_in: usize, settings: &Settings) -> Self {
        let n = tree.n_external();
        let n_out = n - n_in;
        let out_mask = (BitString::full(n).bits() >> n_in) << n_in;
        let masses: Vec<f64> = (0..n_out)
            .map(|leg| {
                let id = tree
                    .currents()
                    .iter()
                    .position(|c| c.is_external() && c.bitstring.get(n_in + leg))
                    .expect("external current");
                model.particle(tree.currents()[id].flavour).mass()
            })
            .collect();

        let mut builder = Self {
            n_out,
            masses,
            channels: Vec::new(),
            by_bits: FxHashMap::default(),
            root: 0,
            backward: false,
            t_exponent: settings.spacelike_exponent,
            sqrt_s: 0.0,
            grid_visits: Vec::new(),
            weight_visits: Vec::new(),
        };

        // singleton channels per outgoing leg
        for leg in 0..n_out {
            builder.insert_channel(BitString::single(leg, n_out));
        }
        // channels from the amplitude tree, with their candidate particles
        let mut candidates: FxHashMap<u64, Vec<(f64, f64, String)>> = FxHashMap::default();
        for (bits, flavours) in tree.momentum_channels() {
            let outgoing = bits.bits() & out_mask;
            let incoming = bits.bits() & !out_mask;
            let mapped = if incoming == 0 {
                outgoing >> n_in
            } else {
                // a line touching the initial state shows up as the
                // complement within the outgoing set
                (out_mask & !outgoing) >> n_in
            };
            let count = mapped.count_ones() as usize;
            if count < 2 || count >= n_out.max(2) {
                continue;
            }
            builder.insert_channel(BitString::from_bits(mapped, n_out));
            for flavour in flavours {
                let particle = model.particle(flavour);
                let entry = (
                    particle.mass(),
                    particle.width(),
                    particle.name().to_string(),
                );
                let list = candidates.entry(mapped).or_default();
                if !list.contains(&entry) {
                    list.push(entry);
                }
            }
        }
        let root = builder.insert_channel(BitString::from_bits(out_mask >> n_in, n_out));
        builder.root = root;

        // closure: every multi-leg channel needs at least one branching into
        // existing channels, falling back to splitting off the lowest leg;
        // fallbacks may create new channels, so iterate to a fixed point
        let mut processed: Vec<u64> = Vec::new();
        loop {
            let mut pending: Vec<u64> = builder
                .channels
                .iter()
                .map(|c| c.bits.bits())
                .filter(|bits| bits.count_ones() >= 2 && !processed.contains(bits))
                .collect();
            if pending.is_empty() {
                break;
            }
            pending.sort_unstable_by_key(|bits| bits.count_ones());
            for bits in pending {
                processed.push(bits);
                let channel = BitString::from_bits(bits, builder.n_out);
                let mut splits: Vec<(u64, u64)> = Vec::new();
                for (first, second) in channel.partitions_two() {
                    if builder.by_bits.contains_key(&first.bits())
                        && builder.by_bits.contains_key(&second.bits())
                    {
                        splits.push((first.bits(), second.bits()));
                    }
                }
                if splits.is_empty() {
                    let lowest = 1 << bits.trailing_zeros();
                    let rest = bits & !lowest;
                    builder.insert_channel(BitString::from_bits(rest, builder.n_out));
                    splits.push((lowest, rest));
                }
                let index = builder.by_bits[&bits];
                let is_root = index == builder.root;
                let pcs = builder.particle_channels_for(
                    bits,
                    candidates.get(&bits).map(Vec::as_slice),
                    settings,
                );
                let channel = &mut builder.channels[index];
                channel.particle_channels = pcs;
                for pc in &mut channel.particle_channels {
                    for (first, second) in &splits {
                        let children = (builder.by_bits[first], builder.by_bits[second]);
                        pc.branchings.push(Branching {
                            children,
                            t_channel: false,
                            angle_grid: angle_grid(settings),
                        });
                        if is_root && n_in == 2 {
                            pc.branchings.push(Branching {
                                children,
                                t_channel: true,
                                angle_grid: None,
                            });
                        }
                    }
                    let count = pc.branchings.len();
                    pc.branch_weights = vec![1.0 / count as f64; count];
                    pc.branch_accumulators = vec![0.0; count];
                }
                let count = channel.particle_channels.len();
                channel.weights = vec![1.0 / count as f64; count];
                channel.accumulators = vec![0.0; count];
            }
        }
        builder.backward = matches!(
            settings.phase_space_generator,
            crate::config::PhaseSpaceGenerators::RecursiveBackwardS
                | crate::config::PhaseSpaceGenerators::RecursiveBackwardShat
        );
        builder
    }

    fn insert_channel(&mut self, bits: BitString) -> usize {
        if let Some(index) = self.by_bits.get(&bits.bits()) {
            return *index;
        }
        let index = self.channels.len();
        self.channels.push(Channel {
            bits,
            particle_channels: Vec::new(),
            weights: Vec::new(),
            accumulators: Vec::new(),
            s_min_cut: 0.0,
            status: ChannelStatus::Unset,
        });
        self.by_bits.insert(bits.bits(), index);
        index
    }

    fn particle_channels_for(
        &self,
        _bits: u64,
        candidates: Option<&[(f64, f64, String)]>,
        settings: &Settings,
    ) -> Vec<ParticleChannel> {
        let make_grid = || {
            settings
                .adaptive_s_sampling
                .then(|| Parni::new_1d(0.0, 1.0, settings.grid_bins, settings.grid_mode))
        };
        let mut channels: Vec<ParticleChannel> = Vec::new();
        if let Some(candidates) = candidates {
            for (mass, width, name) in candidates {
                let map = if *width > 0.0 {
                    InvariantMap::BreitWigner {
                        mass: *mass,
                        width: *width,
                    }
                } else {
                    InvariantMap::PowerLaw {
                        exponent: settings.timelike_exponent_for(name),
                        pole: mass * mass,
                    }
                };
                channels.push(ParticleChannel {
                    map,
                    grid: make_grid(),
                    on_shell: false,
                    branchings: Vec::new(),
                    branch_weights: Vec::new(),
                    branch_accumulators: Vec::new(),
                });
            }
        }
        // the auxiliary channel keeps the mixture supported on the whole
        // invariant range, which candidate maps with a pole above the lower
        // bound do not guarantee on their own
        channels.push(ParticleChannel {
            map: InvariantMap::PowerLaw {
                exponent: settings.auxiliary_exponent,
                pole: 0.0,
            },
            grid: make_grid(),
            on_shell: false,
            branchings: Vec::new(),
            branch_weights: Vec::new(),
            branch_accumulators: Vec::new(),
        });
        channels
    }

    /// Registers a minimum invariant-mass cut on a set of outgoing legs.
    pub fn set_dimass_min(&mut self, legs: &[usize], value: f64) {
        let mut bits = BitString::empty(self.n_out);
        for leg in legs {
            bits.set(*leg);
        }
        if let Some(index) = self.by_bits.get(&bits.bits()) {
            self.channels[*index].s_min_cut = value * value;
        }
    }

    /// Lower bound on the invariant mass of a channel from masses and cuts.
    fn m_min(&self, bits: u64) -> f64 {
        let mass_sum: f64 = (0..self.n_out)
            .filter(|leg| bits >> leg & 1 == 1)
            .map(|leg| self.masses[leg])
            .sum();
        let mut bound: f64 = mass_sum;
        if let Some(index) = self.by_bits.get(&bits) {
            bound = bound.max(self.channels[*index].s_min_cut.max(0.0).sqrt());
        }
        // a cut on a sub-channel raises the bound together with the
        // remaining masses
        for channel in &self.channels {
            let sub = channel.bits.bits();
            if sub != bits && sub & bits == sub && channel.s_min_cut > 0.0 {
                let rest: f64 = (0..self.n_out)
                    .filter(|leg| (bits & !sub) >> leg & 1 == 1)
                    .map(|leg| self.masses[leg])
                    .sum();
                bound = bound.max(channel.s_min_cut.sqrt() + rest);
            }
        }
        bound
    }

    /// Checks that the configured cuts leave room below `sqrt_s`. Returns
    /// `false` when generation cannot succeed.
    #[must_use]
    pub fn refresh_m_min(&mut self, sqrt_s: f64) -> bool {
        self.sqrt_s = sqrt_s;
        self.m_min(self.channels[self.root].bits.bits()) < sqrt_s
    }

    /// Generates outgoing momenta in the centre-of-mass frame.
    ///
    /// `incoming` holds the beam momenta in that frame. Returns the momenta
    /// with the phase-space weight, or `None` for an infeasible
    /// configuration (weight zero).
    pub fn generate<R: Rng>(
        &mut self,
        sqrt_s: f64,
        incoming: &[FourVector],
        rng: &mut R,
    ) -> Option<(Vec<FourVector>, f64)> {
        self.sqrt_s = sqrt_s;
        if !self.refresh_m_min(sqrt_s) {
            return None;
        }
        let mut momenta = vec![FourVector::ZERO; self.n_out];
        let total = FourVector::new(sqrt_s, 0.0, 0.0, 0.0);
        for channel in &mut self.channels {
            channel.status = ChannelStatus::Unset;
        }
        let root = self.root;
        let pc = self.select_particle_channel(root, rng);
        self.channels[root].status = ChannelStatus::MomentumAssigned;
        self.generate_channel(root, pc, sqrt_s * sqrt_s, total, incoming, rng, &mut momenta)?;
        let weight = self.evaluate_weight(sqrt_s, incoming, &momenta)?;
        Some((momenta, weight))
    }

    fn select_particle_channel<R: Rng>(&mut self, channel: usize, rng: &mut R) -> usize {
        select_index(&self.channels[channel].weights, rng)
    }

    #[allow(clippy::too_many_arguments)]
    fn generate_channel<R: Rng>(
        &mut self,
        channel: usize,
        pc: usize,
        s: f64,
        momentum: FourVector,
        incoming: &[FourVector],
        rng: &mut R,
        momenta: &mut Vec<FourVector>,
    ) -> Option<()> {
        let bits = self.channels[channel].bits;
        if bits.count() == 1 {
            let leg = bits.iter().next().expect("singleton channel");
            momenta[leg] = momentum;
            return Some(());
        }
        let branch = {
            let pc_ref = &self.channels[channel].particle_channels[pc];
            select_index(&pc_ref.branch_weights, rng)
        };
        let (first, second, t_channel) = {
            let branching = &self.channels[channel].particle_channels[pc].branchings[branch];
            (
                branching.children.0,
                branching.children.1,
                branching.t_channel,
            )
        };

        // choose the children's particle channels and sample invariants
        let pc1 = self.select_particle_channel(first, rng);
        let pc2 = self.select_particle_channel(second, rng);
        let (r1, _) = self.invariant_range(first, second, s, None)?;
        let s1 = self.sample_invariant(first, pc1, r1, rng)?;
        let (_, r2) = self.invariant_range(first, second, s, Some(s1))?;
        let s2 = self.sample_invariant(second, pc2, r2, rng)?;

        let momentum_star = two_body_momentum(s, s1, s2)?;
        let sqrt_s = s.sqrt();
        // decay angles in the parent rest frame
        let (cos_theta, phi) = if t_channel {
            self.sample_transfer(s, s1, s2, incoming, rng)?
        } else {
            let pc_mut = &mut self.channels[channel].particle_channels[pc];
            if let Some(grid) = pc_mut.branchings[branch].angle_grid.as_mut() {
                let (point, _) = grid.generate(rng);
                (point[0], point[1])
            } else {
                (2.0 * rng.gen::<f64>() - 1.0, TWO_PI * rng.gen::<f64>())
            }
        };
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let e1 = (s1 + momentum_star * momentum_star).sqrt();
        let e2 = (s2 + momentum_star * momentum_star).sqrt();
        let direction = [
            sin_theta * phi.cos(),
            sin_theta * phi.sin(),
            cos_theta,
        ];
        let q1 = FourVector::new(
            e1,
            momentum_star * direction[0],
            momentum_star * direction[1],
            momentum_star * direction[2],
        );
        let q2 = FourVector::new(
            e2,
            -momentum_star * direction[0],
            -momentum_star * direction[1],
            -momentum_star * direction[2],
        );
        let q1 = q1.boosted_from_rest_frame_of(&momentum);
        let q2 = q2.boosted_from_rest_frame_of(&momentum);
        self.channels[first].status = ChannelStatus::MomentumGenerated;
        self.channels[second].status = ChannelStatus::MomentumGenerated;
        self.generate_channel(first, pc1, s1, q1, incoming, rng, momenta)?;
        self.generate_channel(second, pc2, s2, q2, incoming, rng, momenta)
    }

    /// Kinematic ranges of the two child invariants. The first range uses
    /// the sibling's lower bound; the second the actual first invariant.
    fn invariant_range(
        &self,
        first: usize,
        second: usize,
        s: f64,
        s1: Option<f64>,
    ) -> Option<((f64, f64), (f64, f64))> {
        let sqrt_s = s.sqrt();
        let (m1, m2) = (
            self.m_min(self.channels[first].bits.bits()),
            self.m_min(self.channels[second].bits.bits()),
        );
        if self.backward {
            // leaf-first mode: global ranges from the total energy, with
            // infeasible combinations rejected afterwards
            let total = self.sqrt_s;
            let r1 = (m1 * m1, (total - m2).max(0.0).powi(2).max(m1 * m1));
            let r2 = (m2 * m2, (total - m1).max(0.0).powi(2).max(m2 * m2));
            return Some((r1, r2));
        }
        let upper1 = (sqrt_s - m2).max(0.0).powi(2);
        if upper1 <= m1 * m1 && self.channels[first].bits.count() > 1 {
            return None;
        }
        let r1 = (m1 * m1, upper1);
        let r2 = s1.map_or((m2 * m2, (sqrt_s - m1).max(0.0).powi(2)), |s1| {
            (m2 * m2, (sqrt_s - s1.max(0.0).sqrt()).max(0.0).powi(2))
        });
        Some((r1, r2))
    }

    fn sample_invariant<R: Rng>(
        &mut self,
        channel: usize,
        pc: usize,
        range: (f64, f64),
        rng: &mut R,
    ) -> Option<f64> {
        let bits = self.channels[channel].bits;
        if bits.count() == 1 {
            let leg = bits.iter().next().expect("singleton channel");
            let mass = self.masses[leg];
            return Some(mass * mass);
        }
        let pc_ref = &mut self.channels[channel].particle_channels[pc];
        if pc_ref.on_shell {
            if let InvariantMap::BreitWigner { mass, .. } = pc_ref.map {
                return Some(mass * mass);
            }
        }
        let x = if let Some(grid) = pc_ref.grid.as_mut() {
            grid.generate(rng).0[0]
        } else {
            rng.gen()
        };
        pc_ref.map.quantile(x, range.0, range.1)
    }

    /// Samples the momentum transfer of a t-type root branching, returning
    /// the decay angles in the centre-of-mass frame.
    fn sample_transfer<R: Rng>(
        &mut self,
        s: f64,
        s1: f64,
        s2: f64,
        incoming: &[FourVector],
        rng: &mut R,
    ) -> Option<(f64, f64)> {
        let kinematics = TransferKinematics::new(s, s1, s2, incoming)?;
        let map = InvariantMap::PowerLaw {
            exponent: self.t_exponent,
            pole: 0.0,
        };
        let u = map.quantile(rng.gen(), kinematics.u_min, kinematics.u_max)?;
        let cos_theta = kinematics.cos_theta(u);
        let phi = TWO_PI * rng.gen::<f64>();
        Some((cos_theta.clamp(-1.0, 1.0), phi))
    }

    /// Evaluates the reciprocal multichannel density of given momenta; the
    /// result equals the weight of the generate call that produced them.
    pub fn evaluate_weight(
        &mut self,
        sqrt_s: f64,
        incoming: &[FourVector],
        momenta: &[FourVector],
    ) -> Option<f64> {
        self.sqrt_s = sqrt_s;
        self.grid_visits.clear();
        self.weight_visits.clear();
        let root = self.root;
        let total = FourVector::new(sqrt_s, 0.0, 0.0, 0.0);
        let density = self.channel_branch_density(root, sqrt_s * sqrt_s, total, incoming, momenta);
        if !(density > 0.0) || !density.is_finite() {
            return None;
        }
        Some(1.0 / density)
    }

    /// Density of a channel's subtree with respect to its invariant
    /// phase-space measure, marginalised over particle channels and
    /// branchings.
    fn channel_branch_density(
        &mut self,
        channel: usize,
        s: f64,
        momentum: FourVector,
        incoming: &[FourVector],
        momenta: &[FourVector],
    ) -> f64 {
        let n_pcs = self.channels[channel].particle_channels.len();
        let weights = self.channels[channel].weights.clone();
        let mut total = 0.0;
        let mut contributions = Vec::with_capacity(n_pcs);
        for pc in 0..n_pcs {
            let value = weights[pc]
                * self.branch_density(channel, pc, s, momentum, incoming, momenta);
            contributions.push(value);
            total += value;
        }
        if total > 0.0 {
            for (pc, value) in contributions.into_iter().enumerate() {
                self.weight_visits.push(WeightVisit {
                    channel,
                    pc,
                    branch: None,
                    fraction: value / total,
                });
            }
        }
        total
    }

    /// Density of one particle channel's branchings.
    #[allow(clippy::too_many_lines)]
    fn branch_density(
        &mut self,
        channel: usize,
        pc: usize,
        s: f64,
        momentum: FourVector,
        incoming: &[FourVector],
        momenta: &[FourVector],
    ) -> f64 {
        let n_branchings = self.channels[channel].particle_channels[pc].branchings.len();
        let branch_weights = self.channels[channel].particle_channels[pc]
            .branch_weights
            .clone();
        let sqrt_s = s.sqrt();
        let mut total = 0.0;
        let mut contributions = Vec::with_capacity(n_branchings);
        for branch in 0..n_branchings {
            let (first, second, t_channel) = {
                let branching = &self.channels[channel].particle_channels[pc].branchings[branch];
                (
                    branching.children.0,
                    branching.children.1,
                    branching.t_channel,
                )
            };
            let q1 = self.channel_momentum(first, momenta);
            let q2 = self.channel_momentum(second, momenta);
            let s1 = q1.squared().max(0.0);
            let s2 = q2.squared().max(0.0);
            let Some((r1, r2)) = self.invariant_range(first, second, s, Some(s1)) else {
                contributions.push(0.0);
                continue;
            };
            let Some(momentum_star) = two_body_momentum(s, s1, s2) else {
                contributions.push(0.0);
                continue;
            };
            // density of the sampled invariants, marginalised over the
            // children's particle channels and subtrees
            let w1 = self.invariant_density(first, s1, r1, q1, incoming, momenta);
            let w2 = self.invariant_density(second, s2, r2, q2, incoming, momenta);
            if w1 == 0.0 || w2 == 0.0 {
                contributions.push(0.0);
                continue;
            }
            // angular density with respect to the solid angle
            let rest1 = q1.boosted_to_rest_frame_of(&momentum);
            let cos_theta = if rest1.spatial() > 0.0 {
                (rest1[3] / rest1.spatial()).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            let phi_angle = rest1[2].atan2(rest1[1]).rem_euclid(TWO_PI);
            let angle_density = if t_channel {
                let Some(kinematics) = TransferKinematics::new(s, s1, s2, incoming) else {
                    contributions.push(0.0);
                    continue;
                };
                let u = kinematics.transfer(cos_theta);
                let map = InvariantMap::PowerLaw {
                    exponent: self.t_exponent,
                    pole: 0.0,
                };
                let g = map.density(u, kinematics.u_min, kinematics.u_max);
                g * kinematics.jacobian() / TWO_PI
            } else {
                let pc_mut = &mut self.channels[channel].particle_channels[pc];
                if let Some(grid) = pc_mut.branchings[branch].angle_grid.as_mut() {
                    let weight = grid.evaluate_weight(&[cos_theta, phi_angle]);
                    self.grid_visits.push(GridVisit {
                        channel,
                        pc,
                        branch: Some(branch),
                        point: [cos_theta, phi_angle],
                        one_dimensional: false,
                    });
                    1.0 / weight
                } else {
                    1.0 / FOUR_PI
                }
            };
            // two-body jacobian of dΦ₂ with respect to dΩ
            let jacobian = momentum_star / (16.0 * std::f64::consts::PI.powi(2) * sqrt_s);
            let value = angle_density / jacobian * w1 * w2;
            contributions.push(value);
            total += branch_weights[branch] * value;
        }
        for (branch, value) in contributions.iter().enumerate() {
            let weighted = branch_weights[branch] * value;
            if total > 0.0 {
                self.weight_visits.push(WeightVisit {
                    channel,
                    pc,
                    branch: Some(branch),
                    fraction: weighted / total,
                });
            }
        }
        total
    }

    /// Density of one child: its invariant-mass factor times its own
    /// subtree density. External legs contribute unity.
    fn invariant_density(
        &mut self,
        channel: usize,
        s: f64,
        range: (f64, f64),
        momentum: FourVector,
        incoming: &[FourVector],
        momenta: &[FourVector],
    ) -> f64 {
        if self.channels[channel].bits.count() == 1 {
            return 1.0;
        }
        let n_pcs = self.channels[channel].particle_channels.len();
        let weights = self.channels[channel].weights.clone();
        let mut total = 0.0;
        for pc in 0..n_pcs {
            let g = {
                let pc_ref = &mut self.channels[channel].particle_channels[pc];
                let base = pc_ref.map.density(s, range.0, range.1);
                if base > 0.0 {
                    if let Some(grid) = pc_ref.grid.as_mut() {
                        let x = invariant_position(&pc_ref.map, s, range);
                        let weight = grid.evaluate_weight(&[x]);
                        self.grid_visits.push(GridVisit {
                            channel,
                            pc,
                            branch: None,
                            point: [x, 0.0],
                            one_dimensional: true,
                        });
                        base / weight
                    } else {
                        base
                    }
                } else {
                    0.0
                }
            };
            if g == 0.0 {
                continue;
            }
            let subtree = self.branch_density(channel, pc, s, momentum, incoming, momenta);
            total += weights[pc] * TWO_PI * g * subtree;
        }
        total
    }

    fn channel_momentum(&self, channel: usize, momenta: &[FourVector]) -> FourVector {
        self.channels[channel]
            .bits
            .iter()
            .fold(FourVector::ZERO, |sum, leg| sum + momenta[leg])
    }

    /// Feeds the integrand of the last generated or evaluated event into
    /// the multichannel accumulators and the adaptive grids.
    pub fn update(&mut self, integrand: f64) {
        let squared = integrand * integrand;
        let weight_visits = std::mem::take(&mut self.weight_visits);
        for visit in &weight_visits {
            match visit.branch {
                None => {
                    self.channels[visit.channel].accumulators[visit.pc] +=
                        squared * visit.fraction;
                }
                Some(branch) => {
                    self.channels[visit.channel].particle_channels[visit.pc]
                        .branch_accumulators[branch] += squared * visit.fraction;
                }
            }
        }
        self.weight_visits = weight_visits;
        let grid_visits = std::mem::take(&mut self.grid_visits);
        for visit in &grid_visits {
            let pc = &mut self.channels[visit.channel].particle_channels[visit.pc];
            let grid = match visit.branch {
                None => pc.grid.as_mut(),
                Some(branch) => pc.branchings[branch].angle_grid.as_mut(),
            };
            if let Some(grid) = grid {
                let point: &[f64] = if visit.one_dimensional {
                    &visit.point[..1]
                } else {
                    &visit.point
                };
                grid.evaluate_weight(point);
                grid.update(point, integrand.abs());
            }
        }
        self.grid_visits = grid_visits;
    }

    /// Adapts the multichannel weights from the accumulated contributions.
    /// Sibling weights are renormalised to one; weights below the threshold
    /// are pruned.
    pub fn adapt_channels(&mut self, adaptivity: f64, threshold: f64) {
        for channel in &mut self.channels {
            adapt_weights(
                &mut channel.weights,
                &mut channel.accumulators,
                adaptivity,
                threshold,
            );
            for pc in &mut channel.particle_channels {
                adapt_weights(
                    &mut pc.branch_weights,
                    &mut pc.branch_accumulators,
                    adaptivity,
                    threshold,
                );
            }
        }
    }

    /// Adapts every grid in the tree.
    pub fn adapt_grids(&mut self) {
        for channel in &mut self.channels {
            for pc in &mut channel.particle_channels {
                if let Some(grid) = pc.grid.as_mut() {
                    grid.adapt();
                }
                for branching in &mut pc.branchings {
                    if let Some(grid) = branching.angle_grid.as_mut() {
                        grid.adapt();
                    }
                }
            }
        }
    }

    /// Multichannel weights of a channel, for consistency checks.
    #[must_use]
    pub fn channel_weights(&self, bits: u64) -> Option<&[f64]> {
        self.by_bits
            .get(&bits)
            .map(|index| self.channels[*index].weights.as_slice())
    }

    /// Assignment status of a channel after the last generate call.
    #[must_use]
    pub fn channel_status(&self, bits: u64) -> Option<ChannelStatus> {
        self.by_bits
            .get(&bits)
            .map(|index| self.channels[*index].status)
    }

    /// All channel bitstrings.
    #[must_use]
    pub fn channel_bits(&self) -> Vec<u64> {
        self.channels.iter().map(|c| c.bits.bits()).collect()
    }
}

fn angle_grid(settings: &Settings) -> Option<Parni> {
    settings.adaptive_angles.then(|| {
        Parni::new(
            &[-1.0, 0.0],
            &[1.0, TWO_PI],
            settings.grid_bins,
            settings.grid_mode,
        )
    })
}

/// Position of an invariant under its map's quantile, the inverse CDF.
fn invariant_position(map: &InvariantMap, s: f64, range: (f64, f64)) -> f64 {
    // numerically robust bisection of the monotone quantile
    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        match map.quantile(mid, range.0, range.1) {
            Some(value) if value < s => lo = mid,
            _ => hi = mid,
        }
    }
    0.5 * (lo + hi)
}

/// Momentum-transfer kinematics of the initial-state branching.
struct TransferKinematics {
    u_min: f64,
    u_max: f64,
    offset: f64,
    slope: f64,
}

impl TransferKinematics {
    fn new(s: f64, s1: f64, s2: f64, incoming: &[FourVector]) -> Option<Self> {
        if incoming.len() < 2 {
            return None;
        }
        let beam = incoming[0];
        let momentum_star = two_body_momentum(s, s1, s2)?;
        let beam_momentum = beam.spatial();
        if beam_momentum <= 0.0 || momentum_star <= 0.0 {
            return None;
        }
        let e1 = (s1 + momentum_star * momentum_star).sqrt();
        // u = −t = 2(E_b E₁ − |p_b||q₁| cosθ) − m_b² − s₁
        let offset = 2.0 * beam[0] * e1 - beam.squared() - s1;
        let slope = 2.0 * beam_momentum * momentum_star;
        let u_min = (offset - slope).max(1e-12);
        let u_max = offset + slope;
        (u_max > u_min).then_some(Self {
            u_min,
            u_max,
            offset,
            slope,
        })
    }

    fn cos_theta(&self, u: f64) -> f64 {
        (self.offset - u) / self.slope
    }

    fn transfer(&self, cos_theta: f64) -> f64 {
        self.offset - self.slope * cos_theta
    }

    /// `|du/dcosθ|`
    fn jacobian(&self) -> f64 {
        self.slope
    }
}

fn select_index<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    if weights.is_empty() {
        return 0;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    let mut threshold = rng.gen::<f64>() * total;
    for (index, weight) in weights.iter().enumerate() {
        threshold -= weight;
        if threshold <= 0.0 {
            return index;
        }
    }
    weights.len() - 1
}

fn adapt_weights(weights: &mut [f64], accumulators: &mut [f64], adaptivity: f64, threshold: f64) {
    if weights.len() < 2 {
        accumulators.iter_mut().for_each(|a| *a = 0.0);
        return;
    }
    let any = accumulators.iter().any(|a| *a > 0.0);
    if any {
        for (weight, accumulator) in weights.iter_mut().zip(accumulators.iter()) {
            *weight *= accumulator.powf(0.5 * adaptivity).max(f64::MIN_POSITIVE);
        }
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter_mut().for_each(|w| *w /= total);
    }
    // prune and renormalise
    for weight in weights.iter_mut() {
        if *weight < threshold {
            *weight = 0.0;
        }
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter_mut().for_each(|w| *w /= total);
    } else {
        let uniform = 1.0 / weights.len() as f64;
        weights.iter_mut().for_each(|w| *w = uniform);
    }
    accumulators.iter_mut().for_each(|a| *a = 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::models;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn gluon_tree(n_out: usize, settings: &Settings) -> (crate::model::Model, PhaseSpaceTree) {
        let model = models::qcd(1.0, 3, false);
        let mut algorithm = Algorithm::new(&model, 2, n_out, 0);
        let out = std::iter::repeat("g").take(n_out).collect::<Vec<_>>().join(",");
        algorithm.add_process(&format!("g,g > {out}")).unwrap();
        let tree = algorithm.tree().unwrap().clone();
        let ps = PhaseSpaceTree::build(&model, &tree, 2, settings);
        (model, ps)
    }

    fn beams(sqrt_s: f64) -> Vec<FourVector> {
        let e = sqrt_s / 2.0;
        vec![
            FourVector::new(e, 0.0, 0.0, e),
            FourVector::new(e, 0.0, 0.0, -e),
        ]
    }

    #[test]
    fn generated_momenta_conserve_and_sit_on_shell() {
        let settings = Settings::default();
        let (_, mut ps) = gluon_tree(3, &settings);
        let mut rng = Pcg64::seed_from_u64(21);
        let sqrt_s = 200.0;
        let incoming = beams(sqrt_s);
        let mut successes = 0;
        for _ in 0..200 {
            let Some((momenta, weight)) = ps.generate(sqrt_s, &incoming, &mut rng) else {
                continue;
            };
            successes += 1;
            assert!(weight.is_finite() && weight > 0.0);
            let total = momenta.iter().fold(FourVector::ZERO, |sum, p| sum + *p);
            assert!((total[0] - sqrt_s).abs() < 1e-8 * sqrt_s);
            for mu in 1..4 {
                assert!(total[mu].abs() < 1e-8 * sqrt_s);
            }
            for p in &momenta {
                assert!(p.squared().abs() < 1e-8 * sqrt_s * sqrt_s);
            }
        }
        assert!(successes > 150);
    }

    #[test]
    fn stored_events_reproduce_their_weight() {
        let settings = Settings::default();
        let (_, mut ps) = gluon_tree(3, &settings);
        let mut rng = Pcg64::seed_from_u64(23);
        let sqrt_s = 200.0;
        let incoming = beams(sqrt_s);
        for _ in 0..50 {
            let Some((momenta, weight)) = ps.generate(sqrt_s, &incoming, &mut rng) else {
                continue;
            };
            let replayed = ps.evaluate_weight(sqrt_s, &incoming, &momenta).unwrap();
            assert!(
                ((replayed - weight) / weight).abs() < 1e-9,
                "weight changed on re-evaluation: {weight} vs {replayed}"
            );
        }
    }

    #[test]
    fn multichannel_weights_stay_normalised() {
        let settings = Settings::default();
        let (_, mut ps) = gluon_tree(3, &settings);
        let mut rng = Pcg64::seed_from_u64(29);
        let sqrt_s = 200.0;
        let incoming = beams(sqrt_s);
        for _ in 0..500 {
            if let Some((_, weight)) = ps.generate(sqrt_s, &incoming, &mut rng) {
                ps.update(weight);
            }
        }
        ps.adapt_channels(0.5, 1e-4);
        for bits in ps.channel_bits() {
            if let Some(weights) = ps.channel_weights(bits) {
                if weights.is_empty() {
                    continue;
                }
                let sum: f64 = weights.iter().sum();
                assert!((sum - 1.0).abs() < 1e-12, "weights sum to {sum}");
            }
        }
    }

    #[test]
    fn infeasible_cuts_fail_refresh() {
        let settings = Settings::default();
        let (_, mut ps) = gluon_tree(2, &settings);
        ps.set_dimass_min(&[0, 1], 300.0);
        assert!(!ps.refresh_m_min(200.0));
        let mut rng = Pcg64::seed_from_u64(31);
        assert!(ps.generate(200.0, &beams(200.0), &mut rng).is_none());
    }

    #[test]
    fn flat_phase_space_volume_is_reproduced() {
        // the multichannel estimator integrates dΦ₂ = 1/(8π) exactly like
        // the flat generator
        let settings = Settings::default();
        let (_, mut ps) = gluon_tree(2, &settings);
        let mut rng = Pcg64::seed_from_u64(37);
        let sqrt_s = 100.0;
        let incoming = beams(sqrt_s);
        let mut sum = 0.0;
        let n = 20_000;
        let mut accepted = 0;
        for _ in 0..n {
            if let Some((_, weight)) = ps.generate(sqrt_s, &incoming, &mut rng) {
                sum += weight;
                accepted += 1;
            }
        }
        assert!(accepted > n / 2);
        let estimate = sum / f64::from(n);
        let exact = 1.0 / (8.0 * std::f64::consts::PI);
        assert!(
            (estimate / exact - 1.0).abs() < 0.05,
            "estimate {estimate} vs exact {exact}"
        );
    }
}
