/*!
Modified harmonic mean estimator (Gelfand–Dey).

The plain harmonic mean of the kernel values has unbounded variance; the
modified form replaces the importance function by a Gaussian fitted to the
chain's mean and population covariance and truncated to the ellipsoid

```text
(x - m)ᵗ V⁻¹ (x - m) <= chi-square quantile at upper tail p
```

renormalized by `1/(1 - p)` so its mass over the support is one. The estimate
is `1 / mean_i( g(x_i) / f(x_i) )`, accumulated in the log domain.
*/

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::chain::Chain;
use crate::distributions::{LogTarget, MvGaussian};
use crate::error::{Error, Result};
use crate::numeric::log_sum_exp;

use super::chain_moments;

/// Configuration of the truncated-Gaussian test function.
#[derive(Debug, Clone)]
pub struct HarmonicConfig {
    /// Upper-tail probability cut off the chi-square ellipsoid.
    pub tail_prob: f64,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        Self { tail_prob: 0.01 }
    }
}

/**
Estimates the log normalizing constant by the modified harmonic mean.

The kernel values come from the chain's stored log column when present,
otherwise `target` is evaluated on every draw.

# Errors

[`Error::Config`] for a tail probability outside (0, 1) or a chain with
fewer than two draws, [`Error::NotPositiveDefinite`] when the chain's
covariance cannot be factorized, [`Error::DegenerateEstimate`] when no draw
falls inside the truncation ellipsoid.

# Examples

```rust
use marglik::estimators::{modified_harmonic_mean, HarmonicConfig};
use marglik::metropolis::{RandomWalkMetropolis, SamplerConfig};
use marglik::proposal::StepSpec;

let kernel = |x: &[f64]| -0.5 * x[0] * x[0];
let config = SamplerConfig {
    n_draws: 4000,
    burn_in: 500,
    ..SamplerConfig::default()
};
let mut sampler = RandomWalkMetropolis::new(kernel, &[0.0], StepSpec::Scalar(1.0), config)
    .unwrap()
    .set_seed(42);
let chain = sampler.run().unwrap();

let log_c = modified_harmonic_mean(&chain, &kernel, &HarmonicConfig::default()).unwrap();
assert!((log_c - 0.5 * (2.0 * std::f64::consts::PI).ln()).abs() < 0.1);
```
*/
pub fn modified_harmonic_mean<T: LogTarget>(
    chain: &Chain,
    target: &T,
    config: &HarmonicConfig,
) -> Result<f64> {
    if !(config.tail_prob > 0.0 && config.tail_prob < 1.0) {
        return Err(Error::Config(format!(
            "tail probability must lie in (0, 1), got {}",
            config.tail_prob
        )));
    }
    // Population-scaled moments, matching the (n-1)/n rescaling of the
    // sample covariance.
    let (mean, cov) = chain_moments(chain, 0.0)?;
    let weight = MvGaussian::new(&mean, cov)?;

    let chi2 = ChiSquared::new(chain.dim() as f64).map_err(|e| {
        Error::Numerical(format!(
            "chi-square with {} degrees of freedom: {e}",
            chain.dim()
        ))
    })?;
    let radius = chi2.inverse_cdf(1.0 - config.tail_prob);
    let log_truncation = -(1.0 - config.tail_prob).ln();

    let log_values = chain.log_values_or_compute(target);
    let mut terms = Vec::with_capacity(chain.len());
    for (row, &v) in chain.draws().outer_iter().zip(log_values.iter()) {
        let x = row.to_vec();
        if weight.mahalanobis_sq(&x) <= radius {
            terms.push(weight.log_density(&x) + log_truncation - v);
        }
    }
    if terms.is_empty() {
        return Err(Error::DegenerateEstimate(
            "no chain draw fell inside the truncation ellipsoid",
        ));
    }
    // Draws outside the ellipsoid contribute zero to the mean of g/f.
    Ok((chain.len() as f64).ln() - log_sum_exp(&terms))
}
