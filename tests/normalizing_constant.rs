//! Integration checks of the four normalizing-constant estimators on an
//! unnormalized 1D Gaussian kernel, where the truth is ln sqrt(2 pi).

use marglik::chain::Chain;
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

#[cfg(test)]
mod tests {
    use super::*;

    const TRUTH: f64 = 0.9189385332046727;
    const SEED: u64 = 42;

    fn standard_normal_kernel(x: &[f64]) -> f64 {
        -0.5 * x[0] * x[0]
    }

    fn standard_normal_chain() -> Chain {
        let mut sampler = RandomWalkMetropolis::new(
            standard_normal_kernel,
            &[0.0],
            StepSpec::Scalar(1.0),
            SamplerConfig {
                n_draws: 8_000,
                burn_in: 1_000,
                ..SamplerConfig::default()
            },
        )
        .expect("Failed to configure the sampler")
        .set_seed(SEED);
        sampler.run().expect("Failed to run the sampler")
    }

    #[test]
    fn modified_harmonic_mean_recovers_the_constant() {
        let chain = standard_normal_chain();
        let estimate =
            modified_harmonic_mean(&chain, &standard_normal_kernel, &HarmonicConfig::default())
                .expect("Failed to compute the estimate");
        assert!(
            (estimate - TRUTH).abs() < 0.1,
            "Estimate deviates too far from the truth: {estimate} vs {TRUTH}"
        );
    }

    #[test]
    fn bridge_sampling_recovers_the_constant() {
        let chain = standard_normal_chain();
        let weight = moment_match(&chain).expect("Failed to fit the weighting density");
        let mut rng = SmallRng::seed_from_u64(SEED);
        let estimate = bridge_sampling(
            &chain,
            &standard_normal_kernel,
            &Unbounded,
            &weight,
            &BridgeConfig::default(),
            &mut rng,
        )
        .expect("Failed to compute the estimate");
        assert!(
            (estimate - TRUTH).abs() < 0.1,
            "Estimate deviates too far from the truth: {estimate} vs {TRUTH}"
        );
    }

    #[test]
    fn muller_estimate_recovers_the_constant() {
        let chain = standard_normal_chain();
        let weight = moment_match(&chain).expect("Failed to fit the weighting density");
        let mut rng = SmallRng::seed_from_u64(SEED);
        let estimate = muller_estimate(
            &chain,
            &standard_normal_kernel,
            &Unbounded,
            &weight,
            &MullerConfig::default(),
            &mut rng,
        )
        .expect("Failed to compute the estimate");
        assert!(
            (estimate - TRUTH).abs() < 0.2,
            "Estimate deviates too far from the truth: {estimate} vs {TRUTH}"
        );
    }

    #[test]
    fn chib_jeliazkov_recovers_the_constant() {
        let chain = standard_normal_chain();
        let mut rng = SmallRng::seed_from_u64(SEED);
        let estimate = chib_jeliazkov(
            &chain,
            &standard_normal_kernel,
            &Unbounded,
            &[0.0],
            na::DMatrix::identity(1, 1),
            &ChibConfig::default(),
            &mut rng,
        )
        .expect("Failed to compute the estimate");
        assert!(
            (estimate - TRUTH).abs() < 0.1,
            "Estimate deviates too far from the truth: {estimate} vs {TRUTH}"
        );
    }

    /// Restricting the same kernel to the positive half-line halves the
    /// normalizing constant.
    #[test]
    fn bounds_halve_the_constant() {
        let mut sampler = RandomWalkMetropolis::new(
            standard_normal_kernel,
            &[1.0],
            StepSpec::Scalar(1.0),
            SamplerConfig {
                n_draws: 8_000,
                burn_in: 1_000,
                ..SamplerConfig::default()
            },
        )
        .expect("Failed to configure the sampler")
        .with_bounds(|x: &[f64]| x[0] > 0.0)
        .set_seed(SEED);
        let chain = sampler.run().expect("Failed to run the sampler");

        let weight = moment_match(&chain).expect("Failed to fit the weighting density");
        let mut rng = SmallRng::seed_from_u64(SEED);
        let estimate = bridge_sampling(
            &chain,
            &standard_normal_kernel,
            &|x: &[f64]| x[0] > 0.0,
            &weight,
            &BridgeConfig {
                force_in_bounds: true,
                ..BridgeConfig::default()
            },
            &mut rng,
        )
        .expect("Failed to compute the estimate");

        let halved = TRUTH - 2.0_f64.ln();
        assert!(
            (estimate - halved).abs() < 0.15,
            "Estimate deviates too far from the half-line truth: {estimate} vs {halved}"
        );
    }
}
