//! Amplitude-level checks against known QCD results.

use offshell::algorithm::Algorithm;
use offshell::colours::ColourSampler;
use offshell::models;
use offshell::momentum::FourVector;

const G_S: f64 = 1.2;

/// Back-to-back 2 → 2 kinematics at the given scattering angle.
fn set_two_to_two(algorithm: &mut Algorithm<'_>, sqrt_s: f64, cos_theta: f64) {
    let e = sqrt_s / 2.0;
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    algorithm.set_momentum(0, FourVector::new(e, 0.0, 0.0, e));
    algorithm.set_momentum(1, FourVector::new(e, 0.0, 0.0, -e));
    algorithm.set_momentum(
        2,
        FourVector::new(e, e * sin_theta, 0.0, e * cos_theta),
    );
    algorithm.set_momentum(
        3,
        FourVector::new(e, -e * sin_theta, 0.0, -e * cos_theta),
    );
}

/// Textbook spin- and colour-averaged |M|² for gg → gg.
fn gg_to_gg_reference(s: f64, cos_theta: f64) -> f64 {
    let t = -0.5 * s * (1.0 - cos_theta);
    let u = -0.5 * s * (1.0 + cos_theta);
    4.5 * G_S.powi(4) * (3.0 - u * t / (s * s) - u * s / (t * t) - s * t / (u * u))
}

#[test]
fn gg_to_gg_matches_the_textbook_value() {
    let model = models::qcd(G_S, 3, false);
    let mut algorithm = Algorithm::new(&model, 2, 2, 0);
    algorithm.add_process("g,g > g,g").unwrap();
    let sqrt_s = 100.0;
    for cos_theta in [0.0, 0.3] {
        set_two_to_two(&mut algorithm, sqrt_s, cos_theta);
        let summed = algorithm.evaluate_spin_colour_sum();
        // average over the 4 helicity and 64 colour configurations
        let averaged = summed / 256.0;
        let reference = gg_to_gg_reference(sqrt_s * sqrt_s, cos_theta);
        assert!(
            ((averaged - reference) / reference).abs() < 1e-3,
            "cosθ = {cos_theta}: {averaged} vs {reference}"
        );
    }
}

#[test]
fn amplitudes_are_final_leg_independent() {
    let model = models::qcd(G_S, 3, false);
    let mut reference = None;
    for final_leg in 0..4 {
        let mut algorithm = Algorithm::new(&model, 2, 2, final_leg);
        algorithm.add_process("g,g > g,g").unwrap();
        set_two_to_two(&mut algorithm, 100.0, 0.4);
        let assignments: [(usize, usize); 4] = [(0, 2), (1, 7), (1, 0), (0, 5)];
        for (leg, (helicity, colour)) in assignments.into_iter().enumerate() {
            algorithm.set_helicity(leg, helicity);
            algorithm.set_colour(leg, colour);
        }
        let fixed = algorithm.evaluate2();
        let summed = algorithm.evaluate_spin_colour_sum();
        match reference {
            None => reference = Some((fixed, summed)),
            Some((fixed_0, summed_0)) => {
                // the summed value bounds every single configuration, which
                // makes a safe scale for the comparison
                assert!(
                    (fixed - fixed_0).abs() <= 1e-9 * summed_0,
                    "final leg {final_leg}: {fixed} vs {fixed_0}"
                );
                assert!(
                    ((summed - summed_0) / summed_0).abs() < 1e-9,
                    "final leg {final_leg}: {summed} vs {summed_0}"
                );
            }
        }
    }
}

#[test]
fn colour_flow_basis_reproduces_the_adjoint_sum() {
    let adjoint_model = models::qcd(G_S, 3, false);
    let mut adjoint = Algorithm::new(&adjoint_model, 2, 2, 0);
    adjoint.add_process("g,g > g,g").unwrap();
    let flow_model = models::qcd(G_S, 3, true);
    let mut flow = Algorithm::new(&flow_model, 2, 2, 0);
    flow.add_process("g,g > g,g").unwrap();

    for helicities in [[0, 0, 0, 0], [0, 1, 1, 0], [1, 0, 1, 1]] {
        for (leg, helicity) in helicities.into_iter().enumerate() {
            adjoint.set_helicity(leg, helicity);
            flow.set_helicity(leg, helicity);
        }
        set_two_to_two(&mut adjoint, 100.0, 0.2);
        set_two_to_two(&mut flow, 100.0, 0.2);
        let adjoint_sum = adjoint.evaluate_colour_sum();
        let flow_sum = flow.evaluate_colour_sum();
        assert!(
            ((flow_sum - adjoint_sum) / adjoint_sum.max(1e-30)).abs() < 1e-9,
            "helicities {helicities:?}: {flow_sum} vs {adjoint_sum}"
        );
    }
}

#[test]
fn colour_flow_sampling_agrees_with_the_exact_sum() {
    use rand::SeedableRng;
    let model = models::qcd(G_S, 3, true);
    let mut algorithm = Algorithm::new(&model, 2, 2, 0);
    algorithm.add_process("g,g > g,g").unwrap();
    set_two_to_two(&mut algorithm, 100.0, 0.5);
    let exact = algorithm.evaluate_spin_colour_sum();

    for leg in 0..4 {
        algorithm.sum_helicity(leg);
    }
    let mut sampler = ColourSampler::Flow { warned: false };
    let mut rng = rand_pcg::Pcg64::seed_from_u64(101);
    let mut sum = 0.0;
    let mut sum2 = 0.0;
    let n = 3000;
    for _ in 0..n {
        let (weight, _) = sampler.generate(&mut algorithm, &mut rng);
        let estimate = weight * algorithm.evaluate_sum();
        sum += estimate;
        sum2 += estimate * estimate;
    }
    let mean = sum / f64::from(n);
    let sigma = ((sum2 / f64::from(n) - mean * mean).max(0.0) / f64::from(n)).sqrt();
    assert!(
        (mean - exact).abs() < 3.0 * sigma.max(1e-6 * exact),
        "MC {mean} ± {sigma} vs exact {exact}"
    );
}

#[test]
fn adjoint_discrete_and_continuous_sampling_agree() {
    use rand::SeedableRng;
    let model = models::qcd(G_S, 3, false);
    let mut algorithm = Algorithm::new(&model, 2, 2, 0);
    algorithm.add_process("u,ubar > g,g").unwrap();
    set_two_to_two(&mut algorithm, 100.0, 0.4);
    let exact = algorithm.evaluate_spin_colour_sum();
    let mut rng = rand_pcg::Pcg64::seed_from_u64(103);

    for (label, mut sampler) in [
        ("discrete", ColourSampler::Adjoint),
        ("continuous", ColourSampler::Continuous),
    ] {
        for leg in 0..4 {
            algorithm.sum_helicity(leg);
        }
        let mut sum = 0.0;
        let mut sum2 = 0.0;
        let n = 3000;
        for _ in 0..n {
            let (weight, _) = sampler.generate(&mut algorithm, &mut rng);
            let estimate = weight * algorithm.evaluate_sum();
            sum += estimate;
            sum2 += estimate * estimate;
        }
        let mean = sum / f64::from(n);
        let sigma = ((sum2 / f64::from(n) - mean * mean).max(0.0) / f64::from(n)).sqrt();
        assert!(
            (mean - exact).abs() < 3.0 * sigma.max(1e-6 * exact),
            "{label}: MC {mean} ± {sigma} vs exact {exact}"
        );
    }
}

#[test]
fn diagram_counts_match_the_tabulated_series() {
    let model = models::qcd(G_S, 3, false);
    for (n_out, expected) in [(2, 4), (3, 25), (4, 220)] {
        let mut algorithm = Algorithm::new(&model, 2, n_out, 0);
        let out = std::iter::repeat("g")
            .take(n_out)
            .collect::<Vec<_>>()
            .join(",");
        algorithm.add_process(&format!("g,g > {out}")).unwrap();
        assert_eq!(algorithm.count_diagrams(), expected);
    }
    // three external legs without a coupling chain
    let mut empty = Algorithm::new(&model, 2, 1, 0);
    empty.add_process("u,u > g").unwrap();
    assert_eq!(empty.count_diagrams(), 0);
}
