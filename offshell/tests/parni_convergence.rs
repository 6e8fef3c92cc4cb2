//! Convergence of the adaptive grids on known densities.

use offshell::parni::{GridMode, Parni};
use rand::SeedableRng;
use rand_pcg::Pcg64;

fn integrate(parni: &mut Parni, rng: &mut Pcg64, events: usize, f: impl Fn(&[f64]) -> f64) -> f64 {
    for event in 0..events {
        let (point, _) = parni.generate(rng);
        parni.update(&point, f(&point));
        if event % 200 == 199 {
            parni.adapt();
        }
    }
    parni.integral_estimate()
}

#[test]
fn cauchy_density_in_one_dimension() {
    let width = 0.75;
    let f = move |x: &[f64]| 1.0 / ((x[0] - 5.0).powi(2) + width * width);
    let exact = 2.0 * (5.0 / width).atan() / width;

    let mut parni = Parni::new_1d(0.0, 10.0, 100, GridMode::MaximumWeights);
    let mut rng = Pcg64::seed_from_u64(271);
    let estimate = integrate(&mut parni, &mut rng, 100_000, f);
    assert!(parni.leaf_count() <= 100);
    assert!(
        ((estimate - exact) / exact).abs() < 0.01,
        "estimate {estimate} vs exact {exact}"
    );
}

#[test]
fn gaussian_density_in_two_dimensions() {
    let sigma = 0.2;
    let f = move |x: &[f64]| (-(x[0] * x[0] + x[1] * x[1]) / (2.0 * sigma * sigma)).exp();
    // separable reference by Simpson integration
    let one_dim = simpson(|x| (-x * x / (2.0 * sigma * sigma)).exp(), -1.0, 1.0, 20_000);
    let exact = one_dim * one_dim;

    let mut parni = Parni::new(&[-1.0, -1.0], &[1.0, 1.0], 500, GridMode::CumulantWeights);
    let mut rng = Pcg64::seed_from_u64(277);
    let estimate = integrate(&mut parni, &mut rng, 100_000, f);
    assert!(parni.leaf_count() <= 500);
    assert!(
        ((estimate - exact) / exact).abs() < 0.01,
        "estimate {estimate} vs exact {exact}"
    );
}

#[test]
fn estimates_tighten_with_statistics() {
    // the error of the integral estimator falls off roughly like 1/√N
    let f = |x: &[f64]| x[0] * x[0];
    let exact = 1.0 / 3.0;
    let mut errors = Vec::new();
    for events in [1_000, 100_000] {
        let mut spread = 0.0;
        for seed in 0..8 {
            let mut parni = Parni::new_1d(0.0, 1.0, 64, GridMode::CumulantWeights);
            let mut rng = Pcg64::seed_from_u64(1000 + seed);
            let estimate = integrate(&mut parni, &mut rng, events, f);
            spread += (estimate - exact).powi(2);
        }
        errors.push((spread / 8.0).sqrt());
    }
    // a factor 100 in events gains close to a factor 10 in accuracy
    assert!(errors[1] < errors[0] / 3.0, "errors {errors:?}");
}

fn simpson(f: impl Fn(f64) -> f64, a: f64, b: f64, n: usize) -> f64 {
    let n = n + n % 2;
    let h = (b - a) / n as f64;
    let mut sum = f(a) + f(b);
    for k in 1..n {
        let weight = if k % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(a + k as f64 * h);
    }
    sum * h / 3.0
}
