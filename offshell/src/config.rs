//! Generator configuration.
//!
//! Every knob of the Monte-Carlo machinery sits in [`Settings`]; the
//! defaults reproduce the behaviour a driver gets without any tuning.

use crate::parni::GridMode;
use serde::{Deserialize, Serialize};

/// Helicity sampling strategies.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum HelicityGenerators {
    /// One uniformly drawn helicity per leg.
    #[default]
    Uniform,
    /// Exact helicity summation per event.
    SpinorSum,
    /// Random wave functions on the complex unit sphere.
    Continuous,
}

/// Colour sampling strategies.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ColourGenerators {
    /// Colour-conserving flow configurations (colour-flow models only).
    #[default]
    FlowSampling,
    /// Uniform discrete colours over fundamental and adjoint ranges.
    Adjoint,
    /// Uniform discrete colours over the full index ranges.
    Uniform,
    /// Exact colour summation per event.
    Summed,
}

/// Initial-state configurations.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum InitialStates {
    /// Fixed-momentum partonic beams.
    #[default]
    Partonic,
    /// Symmetric lepton collider beams.
    EplusEminus,
    /// Hadronic beams with parton densities.
    ProtonProton,
}

/// Phase-space generation strategies.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PhaseSpaceGenerators {
    /// Flat sampling in the RAMBO style.
    Uniform,
    /// Recursive channel decomposition, invariants sampled parent first.
    #[default]
    Recursive,
    /// Recursive decomposition with invariants sampled leaves first.
    RecursiveBackwardS,
    /// Backward invariant sampling including the total invariant mass.
    RecursiveBackwardShat,
}

/// The full configuration surface of a process generator.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Settings {
    /// Helicity generator choice.
    pub helicity_generator: HelicityGenerators,
    /// Colour generator choice.
    pub colour_generator: ColourGenerators,
    /// Continuous instead of discrete colour sampling.
    pub continuous_colours: bool,
    /// Initial-state setup.
    pub initial_state: InitialStates,
    /// Phase-space generator choice.
    pub phase_space_generator: PhaseSpaceGenerators,
    /// Beam energies in GeV.
    pub beam_energies: [f64; 2],
    /// Channel-adaptation initialisation: (iterations, events per batch).
    pub channel_init: (usize, usize),
    /// Grid-adaptation initialisation: (iterations, events per batch).
    pub grid_init: (usize, usize),
    /// Events between automatic channel adaptations, zero disables.
    pub auto_channel_adapt: usize,
    /// Events between automatic grid adaptations, zero disables.
    pub auto_grid_adapt: usize,
    /// Events between automatic subprocess-weight adaptations.
    pub auto_subprocess_adapt: usize,
    /// Adaptive sampling of timelike invariants.
    pub adaptive_s_sampling: bool,
    /// Adaptive sampling of spacelike invariants.
    pub adaptive_t_sampling: bool,
    /// Adaptive sampling of branching angles.
    pub adaptive_angles: bool,
    /// Leaf cap per adaptive grid.
    pub grid_bins: usize,
    /// Grid weight-aggregation mode.
    pub grid_mode: GridMode,
    /// PDF set name, when a hadronic initial state is used.
    pub pdf_name: Option<String>,
    /// PDF member number.
    pub pdf_number: i32,
    /// Multichannel weights below this threshold are pruned.
    pub multichannel_threshold: f64,
    /// Subprocess weights below this threshold are pruned.
    pub subprocess_threshold: f64,
    /// Exponent damping multichannel weight updates.
    pub multichannel_adaptivity: f64,
    /// Exponent damping subprocess weight updates.
    pub subprocess_adaptivity: f64,
    /// Power-law exponent ν_τ for the total invariant mass.
    pub shat_exponent: f64,
    /// Power-law exponent ν_s for timelike propagators.
    pub timelike_exponent: f64,
    /// Power-law exponent ν_t for spacelike propagators.
    pub spacelike_exponent: f64,
    /// Power-law exponent ν_u for auxiliary channels.
    pub auxiliary_exponent: f64,
    /// Per-particle overrides of the timelike exponent.
    pub timelike_overrides: Vec<(String, f64)>,
    /// Fraction ε of the highest weights discarded when estimating the
    /// maximum weight for unweighting.
    pub discarded_weight_fraction: f64,
    /// Number of bins of the event-weight histogram.
    pub weight_histogram_bins: usize,
    /// Newton-Raphson iterations in the massive RAMBO deformation.
    pub newton_iterations: usize,
    /// Maximum rejected events tolerated during initialisation.
    pub max_init_rejects: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            helicity_generator: HelicityGenerators::default(),
            colour_generator: ColourGenerators::default(),
            continuous_colours: false,
            initial_state: InitialStates::default(),
            phase_space_generator: PhaseSpaceGenerators::default(),
            beam_energies: [500.0, 500.0],
            channel_init: (10, 10_000),
            grid_init: (5, 10_000),
            auto_channel_adapt: 0,
            auto_grid_adapt: 0,
            auto_subprocess_adapt: 0,
            adaptive_s_sampling: false,
            adaptive_t_sampling: false,
            adaptive_angles: false,
            grid_bins: 200,
            grid_mode: GridMode::default(),
            pdf_name: None,
            pdf_number: 0,
            multichannel_threshold: 1e-4,
            subprocess_threshold: 1e-5,
            multichannel_adaptivity: 0.5,
            subprocess_adaptivity: 0.5,
            shat_exponent: 0.5,
            timelike_exponent: 0.5,
            spacelike_exponent: 0.9,
            auxiliary_exponent: 0.5,
            timelike_overrides: Vec::new(),
            discarded_weight_fraction: 0.0,
            weight_histogram_bins: 128,
            newton_iterations: 10,
            max_init_rejects: 1_000_000,
        }
    }
}

impl Settings {
    /// Timelike exponent for a particle, honouring per-particle overrides.
    #[must_use]
    pub fn timelike_exponent_for(&self, name: &str) -> f64 {
        self.timelike_overrides
            .iter()
            .find(|(particle, _)| particle == name)
            .map_or(self.timelike_exponent, |(_, nu)| *nu)
    }

    /// Total collider energy.
    #[must_use]
    pub fn collider_energy(&self) -> f64 {
        self.beam_energies[0] + self.beam_energies[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert!(settings.collider_energy() > 0.0);
        assert!(settings.discarded_weight_fraction >= 0.0);
        assert!(settings.discarded_weight_fraction < 1.0);
    }

    #[test]
    fn timelike_overrides_take_precedence() {
        let mut settings = Settings::default();
        settings.timelike_overrides.push(("g".to_string(), 0.99));
        assert_eq!(settings.timelike_exponent_for("g"), 0.99);
        assert_eq!(
            settings.timelike_exponent_for("u"),
            settings.timelike_exponent
        );
    }
}
