//! The event-generator facade.
//!
//! A [`ProcessGenerator`] composes one momentum generator, one helicity
//! sampler and one colour sampler around an [`Algorithm`], tracks the
//! cross-section estimate with compensated sums, schedules channel and grid
//! adaptation, and supports weighted and unweighted event emission.

use crate::algorithm::Algorithm;
use crate::channels::PhaseSpaceTree;
use crate::colours::ColourSampler;
use crate::config::{InitialStates, PhaseSpaceGenerators, Settings};
use crate::cuts::{Cut, CutList};
use crate::error::Result;
use crate::event::Event;
use crate::helicity::HelicitySampler;
use crate::invariants::InvariantMap;
use crate::momentum::{kallen, FourVector};
use crate::rambo::Rambo;
use log::warn;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Conversion from GeV⁻² to picobarn.
pub const GEV2_TO_PB: f64 = 0.389_379_e9;

/// Parton density interface; the LHAPDF binding lives outside the core.
pub trait PartonDensity {
    /// Momentum density `x f(x, Q)` for the given parton.
    fn xfx(&self, pdg_id: i32, x: f64, q: f64) -> f64;
}

/// Compensated floating-point accumulator.
#[derive(Clone, Copy, Debug, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// Adds a value.
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// The accumulated sum.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.sum
    }
}

/// Running cross-section estimate.
#[derive(Clone, Copy, Debug, Default)]
pub struct CrossSection {
    weights: KahanSum,
    squares: KahanSum,
    events: u64,
    rejects: u64,
}

impl CrossSection {
    /// Records an event weight; zero weights count as rejects.
    pub fn add(&mut self, weight: f64) {
        self.weights.add(weight);
        self.squares.add(weight * weight);
        self.events += 1;
        if weight == 0.0 {
            self.rejects += 1;
        }
    }

    /// Number of recorded events.
    #[must_use]
    pub const fn events(&self) -> u64 {
        self.events
    }

    /// Number of zero-weight events.
    #[must_use]
    pub const fn rejects(&self) -> u64 {
        self.rejects
    }

    /// Mean weight and its standard error.
    #[must_use]
    pub fn estimate(&self) -> (f64, f64) {
        if self.events == 0 {
            return (0.0, 0.0);
        }
        let n = self.events as f64;
        let mean = self.weights.value() / n;
        let variance = (self.squares.value() / n - mean * mean).max(0.0);
        (mean, (variance / n).sqrt())
    }
}

/// Histogram of event weights on a logarithmic axis, used for the
/// ε-quantile estimate of the maximum weight.
#[derive(Clone, Debug)]
struct WeightHistogram {
    bins: Vec<u64>,
    log_min: f64,
    log_max: f64,
    entries: u64,
}

impl WeightHistogram {
    fn new(bins: usize) -> Self {
        Self {
            bins: vec![0; bins.max(2)],
            log_min: -30.0,
            log_max: 30.0,
            entries: 0,
        }
    }

    fn record(&mut self, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        let position = (weight.log10() - self.log_min) / (self.log_max - self.log_min);
        let bin = ((position * self.bins.len() as f64) as usize).min(self.bins.len() - 1);
        self.bins[bin] += 1;
        self.entries += 1;
    }

    /// Weight below which a fraction `1 − epsilon` of all entries lies.
    fn quantile(&self, epsilon: f64) -> f64 {
        if self.entries == 0 {
            return 0.0;
        }
        let keep = ((1.0 - epsilon) * self.entries as f64).ceil() as u64;
        let mut seen = 0;
        for (bin, count) in self.bins.iter().enumerate() {
            seen += count;
            if seen >= keep {
                let fraction = (bin + 1) as f64 / self.bins.len() as f64;
                return 10.0_f64.powf(self.log_min + fraction * (self.log_max - self.log_min));
            }
        }
        10.0_f64.powf(self.log_max)
    }
}

/// Momentum generation strategy of one subprocess.
enum MomentumGenerator {
    Flat(Rambo),
    Recursive(Box<PhaseSpaceTree>),
}

struct SubProcess {
    index: usize,
    momentum: MomentumGenerator,
    weight: f64,
    accumulator: f64,
    estimator: CrossSection,
}

/// Weighted and unweighted event generation around one algorithm.
pub struct ProcessGenerator<'m> {
    algorithm: Algorithm<'m>,
    settings: Settings,
    cuts: CutList,
    pdf: Option<Box<dyn PartonDensity>>,
    rng: Pcg64,
    helicity: HelicitySampler,
    colour: ColourSampler,
    subprocesses: Vec<SubProcess>,
    estimator: CrossSection,
    histogram: WeightHistogram,
    max_weight: f64,
    alpha_s: f64,
    events_since_channel_adapt: usize,
    events_since_grid_adapt: usize,
    events_since_subprocess_adapt: usize,
}

impl<'m> ProcessGenerator<'m> {
    /// Builds a generator around an algorithm with loaded subprocesses.
    ///
    /// # Errors
    ///
    /// Fails when the colour sampler cannot be assembled for the model.
    pub fn new(mut algorithm: Algorithm<'m>, settings: Settings, seed: u64) -> Result<Self> {
        let colour = ColourSampler::from_settings(&settings, &algorithm)?;
        let helicity = HelicitySampler::from_settings(settings.helicity_generator);
        let mut subprocesses = Vec::new();
        let n_processes = algorithm.n_processes();
        for index in 0..n_processes {
            algorithm.select(index);
            let model = algorithm.model();
            let masses: Vec<f64> = (algorithm.n_in()..algorithm.n_external())
                .map(|leg| algorithm.particle(leg).mass())
                .collect();
            let momentum = match settings.phase_space_generator {
                PhaseSpaceGenerators::Uniform => {
                    MomentumGenerator::Flat(Rambo::new(masses, settings.newton_iterations))
                }
                _ => {
                    let tree = algorithm.tree().expect("selected subprocess");
                    MomentumGenerator::Recursive(Box::new(PhaseSpaceTree::build(
                        model,
                        tree,
                        algorithm.n_in(),
                        &settings,
                    )))
                }
            };
            subprocesses.push(SubProcess {
                index,
                momentum,
                weight: 1.0 / n_processes.max(1) as f64,
                accumulator: 0.0,
                estimator: CrossSection::default(),
            });
        }
        let histogram = WeightHistogram::new(settings.weight_histogram_bins);
        Ok(Self {
            algorithm,
            settings,
            cuts: CutList::new(),
            pdf: None,
            rng: Pcg64::seed_from_u64(seed),
            helicity,
            colour,
            subprocesses,
            estimator: CrossSection::default(),
            histogram,
            max_weight: 0.0,
            alpha_s: 0.0,
            events_since_channel_adapt: 0,
            events_since_grid_adapt: 0,
            events_since_subprocess_adapt: 0,
        })
    }

    /// Registers a phase-space cut.
    pub fn add_cut(&mut self, cut: impl Cut + 'static) {
        self.cuts.add(cut);
    }

    /// Installs a parton density for hadronic initial states.
    pub fn set_pdf(&mut self, pdf: Box<dyn PartonDensity>) {
        self.pdf = Some(pdf);
    }

    /// Sets the strong coupling reported on event records.
    pub fn set_alpha_s(&mut self, alpha_s: f64) {
        self.alpha_s = alpha_s;
    }

    /// The running cross-section estimate and its error, in pb.
    #[must_use]
    pub fn cross_section(&self) -> (f64, f64) {
        self.estimator.estimate()
    }

    /// The underlying algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> &Algorithm<'m> {
        &self.algorithm
    }

    /// Number of generated events.
    #[must_use]
    pub const fn events(&self) -> u64 {
        self.estimator.events()
    }

    /// Generates one weighted event and updates the estimators.
    pub fn generate(&mut self) -> Event {
        if self.subprocesses.is_empty() {
            self.estimator.add(0.0);
            return Event::default();
        }
        let sub = self.select_subprocess();
        let event = self.generate_in_subprocess(sub);
        self.estimator.add(event.weight);
        self.histogram.record(event.weight);
        self.subprocesses[sub].estimator.add(event.weight);
        self.subprocesses[sub].accumulator += event.weight * event.weight;
        self.schedule_adaptation();
        event
    }

    fn select_subprocess(&mut self) -> usize {
        let total: f64 = self.subprocesses.iter().map(|s| s.weight).sum();
        if total <= 0.0 || self.subprocesses.len() < 2 {
            return 0;
        }
        let mut threshold = self.rng.gen::<f64>() * total;
        for (index, sub) in self.subprocesses.iter().enumerate() {
            threshold -= sub.weight;
            if threshold <= 0.0 {
                return index;
            }
        }
        self.subprocesses.len() - 1
    }

    #[allow(clippy::too_many_lines)]
    fn generate_in_subprocess(&mut self, sub: usize) -> Event {
        let selection_weight = self.subprocesses[sub].weight.max(f64::MIN_POSITIVE);
        self.algorithm.select(self.subprocesses[sub].index);
        let n_in = self.algorithm.n_in();
        let n_out = self.algorithm.n_out();

        let mut event = Event {
            max_weight: self.max_weight,
            alpha_s: self.alpha_s,
            ..Event::default()
        };
        for leg in 0..n_in + n_out {
            event.pdg_ids.push(self.algorithm.pdg_id(leg));
        }

        // initial state
        let (beams, pdf_weight) = match self.generate_initial_state() {
            Some(pair) => pair,
            None => {
                event.weight = 0.0;
                return event;
            }
        };
        let total = beams[0] + beams[1];
        let s_hat = total.squared();
        if s_hat <= 0.0 {
            event.weight = 0.0;
            return event;
        }
        let sqrt_s = s_hat.sqrt();
        let cm_beams: Vec<FourVector> = beams
            .iter()
            .map(|p| p.boosted_to_rest_frame_of(&total))
            .collect();
        event.p_in = beams.to_vec();
        event.mu_f = sqrt_s;
        event.mu_r = sqrt_s;

        // phase space
        let generated = match &mut self.subprocesses[sub].momentum {
            MomentumGenerator::Flat(rambo) => rambo.generate(sqrt_s, &mut self.rng),
            MomentumGenerator::Recursive(tree) => tree.generate(sqrt_s, &cm_beams, &mut self.rng),
        };
        let Some((cm_momenta, ps_weight)) = generated else {
            event.weight = 0.0;
            return event;
        };
        event.p_out = cm_momenta
            .iter()
            .map(|p| p.boosted_from_rest_frame_of(&total))
            .collect();

        // the matrix element is evaluated in the centre-of-mass frame
        for (leg, momentum) in cm_beams.iter().enumerate() {
            self.algorithm.set_momentum(leg, *momentum);
        }
        for (leg, momentum) in cm_momenta.iter().enumerate() {
            self.algorithm.set_momentum(n_in + leg, *momentum);
        }

        let passes_cuts = self.cuts.pass(&event);

        // samplers run even when the matrix element is known to vanish, so
        // adaptation statistics stay unbiased
        let helicity_weight = self.helicity.generate(&mut self.algorithm, &mut self.rng);
        let (colour_weight, tags) = self.colour.generate(&mut self.algorithm, &mut self.rng);
        event.helicities = self.helicity.labels(&self.algorithm);
        event.colour_tags = tags.colour;
        event.anti_colour_tags = tags.anti_colour;

        if !passes_cuts || colour_weight == 0.0 {
            event.weight = 0.0;
            return event;
        }

        let me = self.algorithm.evaluate_sum();
        if !me.is_finite() || me < 0.0 {
            warn!("non-finite or negative squared matrix element, zero weight");
            event.weight = 0.0;
            return event;
        }

        let m1 = self.algorithm.particle(0).mass();
        let m2 = self.algorithm.particle(1).mass();
        let flux = 2.0 * kallen(s_hat, m1 * m1, m2 * m2).max(0.0).sqrt();
        if flux <= 0.0 {
            event.weight = 0.0;
            return event;
        }
        let weight = ps_weight * helicity_weight * colour_weight * me * pdf_weight
            / flux
            * self.algorithm.symmetry_factor()
            * GEV2_TO_PB
            / selection_weight;
        if !weight.is_finite() {
            warn!("non-finite event weight, zeroed");
            event.weight = 0.0;
            return event;
        }
        event.weight = weight;

        if let MomentumGenerator::Recursive(tree) = &mut self.subprocesses[sub].momentum {
            tree.update(weight.abs());
        }
        event
    }

    /// Beam momenta and the parton-density weight factor.
    fn generate_initial_state(&mut self) -> Option<([FourVector; 2], f64)> {
        let [e1, e2] = self.settings.beam_energies;
        let beam1 = FourVector::new(e1, 0.0, 0.0, e1);
        let beam2 = FourVector::new(e2, 0.0, 0.0, -e2);
        match self.settings.initial_state {
            InitialStates::Partonic | InitialStates::EplusEminus => Some(([beam1, beam2], 1.0)),
            InitialStates::ProtonProton => {
                let map = InvariantMap::PowerLaw {
                    exponent: self.settings.shat_exponent,
                    pole: 0.0,
                };
                let x_min = 1e-6;
                let x1 = map.quantile(self.rng.gen(), x_min, 1.0)?;
                let x2 = map.quantile(self.rng.gen(), x_min, 1.0)?;
                let g1 = map.density(x1, x_min, 1.0);
                let g2 = map.density(x2, x_min, 1.0);
                let pdf = self.pdf.as_ref()?;
                let q = self.settings.collider_energy();
                let id1 = self.algorithm.pdg_id(0);
                let id2 = self.algorithm.pdg_id(1);
                let density = pdf.xfx(id1, x1, q) * pdf.xfx(id2, x2, q) / (x1 * x2);
                if density <= 0.0 || g1 <= 0.0 || g2 <= 0.0 {
                    return None;
                }
                Some((
                    [x1 * beam1, x2 * beam2],
                    density / (g1 * g2),
                ))
            }
        }
    }

    fn schedule_adaptation(&mut self) {
        self.events_since_channel_adapt += 1;
        self.events_since_grid_adapt += 1;
        self.events_since_subprocess_adapt += 1;
        if self.settings.auto_channel_adapt > 0
            && self.events_since_channel_adapt >= self.settings.auto_channel_adapt
        {
            self.adapt_channels();
        }
        if self.settings.auto_grid_adapt > 0
            && self.events_since_grid_adapt >= self.settings.auto_grid_adapt
        {
            self.adapt_grids();
        }
        if self.settings.auto_subprocess_adapt > 0
            && self.events_since_subprocess_adapt >= self.settings.auto_subprocess_adapt
        {
            self.adapt_subprocesses();
        }
    }

    /// Adapts every recursive channel tree's multichannel weights.
    pub fn adapt_channels(&mut self) {
        for sub in &mut self.subprocesses {
            if let MomentumGenerator::Recursive(tree) = &mut sub.momentum {
                tree.adapt_channels(
                    self.settings.multichannel_adaptivity,
                    self.settings.multichannel_threshold,
                );
            }
        }
        self.events_since_channel_adapt = 0;
    }

    /// Adapts every adaptive grid.
    pub fn adapt_grids(&mut self) {
        for sub in &mut self.subprocesses {
            if let MomentumGenerator::Recursive(tree) = &mut sub.momentum {
                tree.adapt_grids();
            }
        }
        self.events_since_grid_adapt = 0;
    }

    /// Adapts the subprocess selection weights.
    pub fn adapt_subprocesses(&mut self) {
        if self.subprocesses.len() >= 2 {
            let adaptivity = self.settings.subprocess_adaptivity;
            for sub in &mut self.subprocesses {
                if sub.accumulator > 0.0 {
                    sub.weight *= sub.accumulator.powf(0.5 * adaptivity);
                }
                sub.accumulator = 0.0;
            }
            let total: f64 = self.subprocesses.iter().map(|s| s.weight).sum();
            if total > 0.0 {
                for sub in &mut self.subprocesses {
                    sub.weight /= total;
                    if sub.weight < self.settings.subprocess_threshold {
                        sub.weight = 0.0;
                    }
                }
                let total: f64 = self.subprocesses.iter().map(|s| s.weight).sum();
                if total > 0.0 {
                    for sub in &mut self.subprocesses {
                        sub.weight /= total;
                    }
                }
            }
        }
        self.events_since_subprocess_adapt = 0;
    }

    /// Runs the configured initialisation: channel-adaptation batches first,
    /// then grid-adaptation batches.
    pub fn initialise(&mut self) {
        let (channel_iterations, channel_batch) = self.settings.channel_init;
        for _ in 0..channel_iterations {
            for _ in 0..channel_batch {
                self.generate();
            }
            self.adapt_channels();
            self.adapt_subprocesses();
        }
        let (grid_iterations, grid_batch) = self.settings.grid_init;
        for _ in 0..grid_iterations {
            for _ in 0..grid_batch {
                self.generate();
            }
            self.adapt_grids();
        }
    }

    /// Current maximum-weight estimate used for unweighting.
    #[must_use]
    pub fn max_weight(&self) -> f64 {
        let quantile = self
            .histogram
            .quantile(self.settings.discarded_weight_fraction);
        self.max_weight.max(quantile)
    }

    /// Generates events until one is accepted by the unweighting test.
    /// Returns `None` when the reject budget is exhausted.
    pub fn generate_unweighted(&mut self) -> Option<Event> {
        for _ in 0..self.settings.max_init_rejects.max(1) {
            let mut event = self.generate();
            if event.weight <= 0.0 {
                continue;
            }
            let threshold = self.max_weight().max(event.weight * 1e-12);
            if event.weight > self.max_weight {
                self.max_weight = event.weight;
            }
            if self.rng.gen::<f64>() * threshold < event.weight {
                event.max_weight = self.max_weight;
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kahan_sums_compensate() {
        let mut sum = KahanSum::default();
        for _ in 0..10_000_000 {
            sum.add(0.1);
        }
        assert!((sum.value() - 1_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn estimator_counts_rejects() {
        let mut estimator = CrossSection::default();
        estimator.add(2.0);
        estimator.add(0.0);
        estimator.add(4.0);
        assert_eq!(estimator.events(), 3);
        assert_eq!(estimator.rejects(), 1);
        let (mean, error) = estimator.estimate();
        assert!((mean - 2.0).abs() < 1e-12);
        assert!(error > 0.0);
    }

    #[test]
    fn histogram_quantiles_bracket_the_weights() {
        let mut histogram = WeightHistogram::new(64);
        for i in 1..=1000 {
            histogram.record(f64::from(i));
        }
        let top = histogram.quantile(0.0);
        assert!(top >= 1000.0);
        let reduced = histogram.quantile(0.5);
        assert!(reduced < top);
        assert!(reduced >= 400.0);
    }
}
