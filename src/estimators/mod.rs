/*!
# Normalizing-Constant Estimators

Four independent routines estimating the log normalizing constant ln c of an
unnormalized kernel f from a Metropolis chain:

- **Modified harmonic mean** ([`modified_harmonic_mean`]): Gelfand–Dey with
  a truncated-Gaussian test function fitted to the chain's moments.
- **Bridge sampling** ([`bridge_sampling`]): iterated bridge identity between
  the kernel and a Gaussian weighting density, reduced to a 1-D root-finding
  problem; the two-sample form [`bridge_log_ratio`] is exposed directly.
- **Muller's method** ([`muller_estimate`]): balances two sorted tails of
  log-ratio transforms of chain and auxiliary draws.
- **Chib–Jeliazkov** ([`chib_jeliazkov`]): density-at-a-point identity using
  the Metropolis acceptance probability toward a fixed evaluation point.

All four take the chain plus method-specific auxiliary inputs and return a
log-scale estimate. The weighting density is an [`MvGaussian`], typically
fitted with [`moment_match`].

## Example Usage

```rust
use marglik::estimators::{modified_harmonic_mean, HarmonicConfig};
use marglik::metropolis::{RandomWalkMetropolis, SamplerConfig};
use marglik::proposal::StepSpec;

// Kernel of N(0,1) without its 1/sqrt(2*pi) factor.
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
let truth = 0.5 * (2.0 * std::f64::consts::PI).ln();
assert!((log_c - truth).abs() < 0.1);
```
*/

mod bridge;
mod chib;
mod harmonic;
mod muller;

pub use bridge::{bridge_log_ratio, bridge_sampling, BridgeConfig};
pub use chib::{chib_jeliazkov, ChibConfig};
pub use harmonic::{modified_harmonic_mean, HarmonicConfig};
pub use muller::{muller_estimate, MullerConfig};

use nalgebra as na;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use crate::chain::Chain;
use crate::distributions::{symmetrize, Bounds, LogTarget, MvGaussian};
use crate::error::{Error, Result};

/// The kernel at `x`, or negative infinity when `x` leaves the support.
pub(crate) fn log_kernel_or_neg_inf<T: LogTarget, B: Bounds>(
    target: &T,
    bounds: &B,
    x: &[f64],
) -> f64 {
    if bounds.contains(x) {
        target.log_kernel(x)
    } else {
        f64::NEG_INFINITY
    }
}

/// Sample mean and symmetrized covariance of the chain's draws.
///
/// `ddof` is the delta degrees of freedom of the covariance divisor
/// `n - ddof`: `1.0` gives the unbiased sample covariance, `0.0` rescales it
/// by `(n-1)/n`.
pub fn chain_moments(chain: &Chain, ddof: f64) -> Result<(Vec<f64>, na::DMatrix<f64>)> {
    if chain.len() < 2 {
        return Err(Error::Config(
            "moment estimation needs at least two draws".to_string(),
        ));
    }
    let mean = chain
        .draws()
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::Numerical("mean reduction over the chain failed".to_string()))?;
    let cov = chain
        .draws()
        .t()
        .cov(ddof)
        .map_err(|e| Error::Numerical(format!("chain covariance failed: {e}")))?;
    let k = chain.dim();
    let cov = na::DMatrix::from_fn(k, k, |i, j| cov[(i, j)]);
    Ok((mean.to_vec(), symmetrize(&cov)))
}

/**
Fits a Gaussian weighting density to the chain by moment matching.

Uses the unbiased sample covariance. The result is the usual choice of
auxiliary density for [`bridge_sampling`] and [`muller_estimate`].

# Examples

```rust
use marglik::chain::Chain;
use marglik::estimators::moment_match;
use ndarray::arr2;

let chain = Chain::from_draws(arr2(&[[0.0], [1.0], [2.0], [3.0]]));
let weight = moment_match(&chain).unwrap();
assert_eq!(weight.mean(), &[1.5]);
```
*/
pub fn moment_match(chain: &Chain) -> Result<MvGaussian> {
    let (mean, cov) = chain_moments(chain, 1.0)?;
    MvGaussian::new(&mean, cov)
}
