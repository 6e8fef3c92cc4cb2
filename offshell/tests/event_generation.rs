//! End-to-end event generation.

use offshell::algorithm::Algorithm;
use offshell::config::{
    ColourGenerators, HelicityGenerators, PhaseSpaceGenerators, Settings,
};
use offshell::cuts::MinPt;
use offshell::generator::ProcessGenerator;
use offshell::models;

fn gg_settings(phase_space: PhaseSpaceGenerators) -> Settings {
    Settings {
        helicity_generator: HelicityGenerators::Uniform,
        colour_generator: ColourGenerators::Uniform,
        phase_space_generator: phase_space,
        beam_energies: [50.0, 50.0],
        ..Settings::default()
    }
}

fn run(settings: Settings, events: usize, seed: u64) -> (f64, f64) {
    let _ = env_logger::builder().is_test(true).try_init();
    let model = models::qcd(1.2, 3, false);
    let mut algorithm = Algorithm::new(&model, 2, 2, 0);
    algorithm.add_process("g,g > g,g").unwrap();
    let mut generator = ProcessGenerator::new(algorithm, settings, seed).unwrap();
    generator.add_cut(MinPt { leg: 0, min: 10.0 });
    for _ in 0..events {
        let event = generator.generate();
        assert!(event.weight.is_finite());
        assert!(event.weight >= 0.0);
        if event.weight > 0.0 {
            // momentum conservation and mass shells at 1e-10 of the energy
            let balance = event.total_incoming() - event.total_outgoing();
            for mu in 0..4 {
                assert!(balance[mu].abs() < 1e-10 * 100.0);
            }
            for p in &event.p_out {
                assert!(p.squared().abs() < 1e-10 * 10_000.0);
            }
        }
    }
    generator.cross_section()
}

#[test]
fn flat_and_recursive_generators_agree() {
    let events = 4000;
    let (flat, flat_error) = run(gg_settings(PhaseSpaceGenerators::Uniform), events, 11);
    let (recursive, recursive_error) =
        run(gg_settings(PhaseSpaceGenerators::Recursive), events, 13);
    assert!(flat > 0.0 && recursive > 0.0);
    let combined = flat_error.hypot(recursive_error);
    assert!(
        (flat - recursive).abs() < 5.0 * combined,
        "flat {flat} ± {flat_error} vs recursive {recursive} ± {recursive_error}"
    );
}

#[test]
fn backward_invariant_sampling_also_agrees() {
    let events = 4000;
    let (forward, forward_error) =
        run(gg_settings(PhaseSpaceGenerators::Recursive), events, 17);
    let (backward, backward_error) = run(
        gg_settings(PhaseSpaceGenerators::RecursiveBackwardS),
        events,
        19,
    );
    let combined = forward_error.hypot(backward_error);
    assert!(
        (forward - backward).abs() < 5.0 * combined,
        "forward {forward} vs backward {backward}"
    );
}

#[test]
fn unweighted_generation_emits_capped_weights() {
    let model = models::qcd(1.2, 3, false);
    let mut algorithm = Algorithm::new(&model, 2, 2, 0);
    algorithm.add_process("g,g > g,g").unwrap();
    let mut generator =
        ProcessGenerator::new(algorithm, gg_settings(PhaseSpaceGenerators::Uniform), 23).unwrap();
    generator.add_cut(MinPt { leg: 0, min: 10.0 });
    // warm up the weight histogram
    for _ in 0..2000 {
        generator.generate();
    }
    for _ in 0..20 {
        let event = generator.generate_unweighted().expect("budget exhausted");
        assert!(event.weight > 0.0);
        assert!(event.max_weight >= event.weight * (1.0 - 1e-12));
        assert_eq!(event.pdg_ids, vec![21, 21, 21, 21]);
    }
}

#[test]
fn resonant_toy_process_generates() {
    let model = models::toy(0.5, 0.4);
    let mut algorithm = Algorithm::new(&model, 2, 2, 0);
    algorithm.add_process("phi,phi > phi,phi").unwrap();
    assert!(algorithm.count_diagrams() >= 3);
    let settings = Settings {
        helicity_generator: HelicityGenerators::SpinorSum,
        colour_generator: ColourGenerators::Uniform,
        phase_space_generator: PhaseSpaceGenerators::Recursive,
        beam_energies: [40.0, 40.0],
        adaptive_s_sampling: true,
        auto_channel_adapt: 500,
        auto_grid_adapt: 500,
        ..Settings::default()
    };
    let mut generator = ProcessGenerator::new(algorithm, settings, 29).unwrap();
    let mut positive = 0;
    for _ in 0..2000 {
        let event = generator.generate();
        if event.weight > 0.0 {
            positive += 1;
        }
    }
    assert!(positive > 1000);
    let (sigma, error) = generator.cross_section();
    assert!(sigma > 0.0 && error.is_finite());
}

#[test]
fn subprocess_batches_share_the_generator() {
    let model = models::qcd(1.2, 3, false);
    let mut algorithm = Algorithm::new(&model, 2, 2, 0);
    algorithm.add_process("q,qbar > g,g").unwrap();
    let settings = Settings {
        auto_subprocess_adapt: 1000,
        ..gg_settings(PhaseSpaceGenerators::Uniform)
    };
    let mut generator = ProcessGenerator::new(algorithm, settings, 31).unwrap();
    generator.add_cut(MinPt { leg: 0, min: 10.0 });
    for _ in 0..3000 {
        generator.generate();
    }
    let (sigma, _) = generator.cross_section();
    assert!(sigma > 0.0);
    assert_eq!(generator.algorithm().n_processes(), 6);
}
