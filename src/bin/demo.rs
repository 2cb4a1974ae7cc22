//! Samples a 2D Gaussian kernel with random-walk Metropolis, then estimates
//! its log normalizing constant with every method in the crate.

use marglik::chain::Chain;
use marglik::diagnostics::{chain_summary, separated_partial_means};
use marglik::distributions::Unbounded;
use marglik::estimators::{
    bridge_sampling, chib_jeliazkov, modified_harmonic_mean, moment_match, muller_estimate,
    BridgeConfig, ChibConfig, HarmonicConfig, MullerConfig,
};
use marglik::metropolis::{RandomWalkMetropolis, SamplerConfig};
use marglik::proposal::StepSpec;

use nalgebra as na;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;

/// Main entry point: samples an unnormalized correlated Gaussian, prints the
/// chain summary, and compares all four normalizing-constant estimates
/// against the closed-form truth.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    const N_DRAWS: usize = 20_000;
    const BURNIN: usize = 2_000;
    const SEED: u64 = 42;
    const NW_LAGS: usize = 30;

    // Unnormalized density of N(0, [[2, 1], [1, 2]]); the missing factor is
    // 2 * pi * sqrt(3).
    let kernel = |x: &[f64]| -(2.0 * x[0] * x[0] - 2.0 * x[0] * x[1] + 2.0 * x[1] * x[1]) / 6.0;
    let truth = (2.0 * std::f64::consts::PI).ln() + 0.5 * 3.0_f64.ln();

    let mut sampler = RandomWalkMetropolis::new(
        kernel,
        &[0.0, 0.0],
        StepSpec::Scalar(1.5),
        SamplerConfig {
            n_draws: N_DRAWS,
            burn_in: BURNIN,
            ..SamplerConfig::default()
        },
    )?
    .set_seed(SEED);
    let chain: Chain = sampler.run_progress()?;
    println!("Generated {} draws", chain.len());

    let summary = chain_summary(&chain, NW_LAGS)?;
    println!(
        "Mean: ({:.3}, {:.3}), variance: ({:.3}, {:.3})",
        summary.mean[0], summary.mean[1], summary.variance[0], summary.variance[1]
    );
    println!(
        "NSE: ({:.4}, {:.4}), acceptance rate: {:.3}",
        summary.nse[0], summary.nse[1], summary.acceptance_rate
    );

    let first_coordinate = chain.draws().column(0).to_vec();
    let p_value = separated_partial_means(&first_coordinate, 4, NW_LAGS)?;
    println!("Separated-partial-means p-value (first coordinate): {p_value:.3}");

    // Weighting density and proposal for the estimators.
    let weight = moment_match(&chain)?;
    let step_cov = na::DMatrix::from_diagonal_element(2, 2, 1.5 * 1.5);
    let mut rng = SmallRng::seed_from_u64(SEED);

    println!("True log normalizing constant:  {truth:.4}");
    let harmonic = modified_harmonic_mean(&chain, &kernel, &HarmonicConfig::default())?;
    println!("Modified harmonic mean:         {harmonic:.4}");
    let bridge = bridge_sampling(
        &chain,
        &kernel,
        &Unbounded,
        &weight,
        &BridgeConfig::default(),
        &mut rng,
    )?;
    println!("Bridge sampling:                {bridge:.4}");
    let muller = muller_estimate(
        &chain,
        &kernel,
        &Unbounded,
        &weight,
        &MullerConfig::default(),
        &mut rng,
    )?;
    println!("Muller's method:                {muller:.4}");
    let chib = chib_jeliazkov(
        &chain,
        &kernel,
        &Unbounded,
        &summary.mean,
        step_cov,
        &ChibConfig::default(),
        &mut rng,
    )?;
    println!("Chib-Jeliazkov:                 {chib:.4}");

    Ok(())
}

#[test]
fn test_main() {
    main().expect("Expected main to not return an error.");
}
