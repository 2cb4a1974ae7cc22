/*!
Convergence diagnostics for Metropolis output.

## Overview

- **Newey-West variance**: long-run variance of a correlated series, the
  basis of the numerical standard error of its mean.
- **Separated partial means**: a chi-square test comparing the means of
  separated blocks of a series; small p-values signal that the chain has
  not reached its stationary regime.
- **Chain summary**: per-coordinate means, variances, and standard errors
  together with the acceptance rate.

## Example Usage

```rust
use marglik::diagnostics::{newey_west, separated_partial_means};

let series: Vec<f64> = (0..100).map(|i| ((i * 37) % 11) as f64).collect();
let long_run_variance = newey_west(&series, 5)?;
assert!(long_run_variance > 0.0);

let p_value = separated_partial_means(&series, 2, 3)?;
assert!((0.0..=1.0).contains(&p_value));
# Ok::<(), marglik::error::Error>(())
```
*/

use nalgebra as na;
use ndarray::Axis;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::chain::Chain;
use crate::error::{Error, Result};

/// Per-coordinate summary of a chain.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    /// Sample mean of each coordinate.
    pub mean: Vec<f64>,
    /// Unbiased sample variance of each coordinate.
    pub variance: Vec<f64>,
    /// Numerical standard error of each coordinate's mean.
    pub nse: Vec<f64>,
    /// Fraction of consecutive draws that differ.
    pub acceptance_rate: f64,
}

/**
Newey-West long-run variance of a series.

Autocovariances of the centered data up to `lags` enter with Bartlett-style
weights `2 (lags - s) / lags`; lag zero has weight one.

# Errors

[`Error::NotComputable`] when the series has at most `lags` observations.
*/
pub fn newey_west(data: &[f64], lags: usize) -> Result<f64> {
    let n = data.len();
    if lags >= n {
        return Err(Error::NotComputable(format!(
            "need more than {lags} observations for {lags} lags, got {n}"
        )));
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = data.iter().map(|x| x - mean).collect();
    let autocov = |s: usize| {
        centered[s..]
            .iter()
            .zip(centered.iter())
            .map(|(late, early)| late * early)
            .sum::<f64>()
            / n as f64
    };
    let mut long_run = autocov(0);
    for s in 1..=lags {
        long_run += 2.0 * (lags - s) as f64 / lags as f64 * autocov(s);
    }
    Ok(long_run)
}

/// Numerical standard error of the series mean, from the Newey-West
/// long-run variance with `lags` lags.
pub fn numerical_standard_error(data: &[f64], lags: usize) -> Result<f64> {
    let long_run = newey_west(data, lags)?;
    Ok((long_run.max(0.0) / data.len() as f64).sqrt())
}

/**
Separated-partial-means convergence test.

Splits the series into `2 * p` contiguous equal groups and keeps every
second one. The consecutive differences of the kept group means are scored
against their tridiagonal covariance, built from each group's own
Newey-West variance with `lags` lags. Returns the chi-square p-value with
`p - 1` degrees of freedom; small values indicate the series is still
drifting.

# Errors

[`Error::NotComputable`] when `p < 2` or the series does not split into
`2 * p` equal groups of at least `lags + 1` observations;
[`Error::NotPositiveDefinite`] when the difference covariance cannot be
factorized.
*/
pub fn separated_partial_means(data: &[f64], p: usize, lags: usize) -> Result<f64> {
    if p < 2 {
        return Err(Error::NotComputable(format!(
            "need at least two partial means, got p = {p}"
        )));
    }
    let n = data.len();
    let group_size = n / (2 * p);
    if group_size == 0 || n % (2 * p) != 0 {
        return Err(Error::NotComputable(format!(
            "series length {n} does not split into {} equal groups",
            2 * p
        )));
    }

    // Means and long-run variances of the 2nd, 4th, ... groups.
    let mut means = Vec::with_capacity(p);
    let mut variances = Vec::with_capacity(p);
    for i in 0..p {
        let group = &data[(2 * i + 1) * group_size..(2 * i + 2) * group_size];
        means.push(group.iter().sum::<f64>() / group_size as f64);
        variances.push(newey_west(group, lags)?);
    }

    let diffs = na::DVector::from_iterator(p - 1, (0..p - 1).map(|i| means[i + 1] - means[i]));
    let mut cov = na::DMatrix::zeros(p - 1, p - 1);
    for i in 0..p - 1 {
        cov[(i, i)] = (variances[i] + variances[i + 1]) / group_size as f64;
        if i + 1 < p - 1 {
            cov[(i, i + 1)] = -variances[i + 1] / group_size as f64;
            cov[(i + 1, i)] = -variances[i + 1] / group_size as f64;
        }
    }
    let chol = na::Cholesky::new(cov).ok_or(Error::NotPositiveDefinite {
        context: "partial-means covariance",
    })?;
    let statistic = diffs.dot(&chol.solve(&diffs));

    let chi_square = ChiSquared::new((p - 1) as f64)
        .map_err(|e| Error::Numerical(format!("chi-square with {} dof: {e}", p - 1)))?;
    Ok(1.0 - chi_square.cdf(statistic))
}

/**
Summarizes a chain coordinate by coordinate.

The numerical standard errors use the Newey-West variance with `lags` lags.

# Errors

[`Error::NotComputable`] when the chain has fewer than two draws or a lag
window that does not fit.
*/
pub fn chain_summary(chain: &Chain, lags: usize) -> Result<ChainSummary> {
    if chain.len() < 2 {
        return Err(Error::NotComputable(format!(
            "need at least two draws to summarize a chain, got {}",
            chain.len()
        )));
    }
    let draws = chain.draws();
    let mean = draws
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::Numerical("chain mean did not reduce".to_string()))?
        .to_vec();
    let variance = draws.var_axis(Axis(0), 1.0).to_vec();
    let mut nse = Vec::with_capacity(chain.dim());
    for column in draws.axis_iter(Axis(1)) {
        nse.push(numerical_standard_error(&column.to_vec(), lags)?);
    }
    Ok(ChainSummary {
        mean,
        variance,
        nse,
        acceptance_rate: chain.acceptance_rate(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn newey_west_matches_hand_computation() {
        let data = [1.0, 2.0, 3.0, 4.0];
        // Autocovariances: 1.25 at lag 0, 0.3125 at lag 1, -0.375 at lag 2.
        assert_abs_diff_eq!(newey_west(&data, 0).unwrap(), 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(newey_west(&data, 1).unwrap(), 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(newey_west(&data, 2).unwrap(), 1.5625, epsilon = 1e-12);
    }

    #[test]
    fn lag_window_must_fit_the_series() {
        assert!(matches!(
            newey_west(&[1.0, 2.0], 2),
            Err(Error::NotComputable(_))
        ));
        assert!(matches!(newey_west(&[], 0), Err(Error::NotComputable(_))));
    }

    #[test]
    fn standard_error_scales_the_long_run_variance() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let nse = numerical_standard_error(&data, 1).unwrap();
        assert_abs_diff_eq!(nse, (1.25_f64 / 4.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn independent_draws_recover_the_plain_variance() {
        use rand::{rngs::SmallRng, Rng, SeedableRng};
        const SEED: u64 = 42;

        let mut rng = SmallRng::seed_from_u64(SEED);
        let data: Vec<f64> = (0..4000).map(|_| rng.gen::<f64>()).collect();
        let long_run = newey_west(&data, 10).unwrap();
        // Uniform(0, 1) draws have variance 1/12; lagged terms should wash out.
        assert_abs_diff_eq!(long_run, 1.0 / 12.0, epsilon = 0.02);
    }

    #[test]
    fn identical_groups_give_a_p_value_of_one() {
        let data = [1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0];
        let p_value = separated_partial_means(&data, 2, 0).unwrap();
        assert_abs_diff_eq!(p_value, 1.0, epsilon = 1e-12);

        // Three kept groups exercise the off-diagonal covariance terms.
        let repeated: Vec<f64> = data.iter().chain(data.iter().take(4)).copied().collect();
        let p_value = separated_partial_means(&repeated, 3, 0).unwrap();
        assert_abs_diff_eq!(p_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn drifting_series_is_flagged() {
        let data: Vec<f64> = (0..80).map(|i| i as f64).collect();
        let p_value = separated_partial_means(&data, 2, 0).unwrap();
        assert!(
            p_value < 1e-6,
            "Expected a drifting series to fail the test, got p = {p_value}"
        );
    }

    #[test]
    fn unusable_partitions_are_reported() {
        let data: Vec<f64> = (0..12).map(|i| i as f64).collect();
        assert!(matches!(
            separated_partial_means(&data, 1, 0),
            Err(Error::NotComputable(_))
        ));
        assert!(matches!(
            separated_partial_means(&data, 5, 0),
            Err(Error::NotComputable(_))
        ));
    }

    #[test]
    fn summary_reports_moments_and_error() {
        let chain = Chain::from_draws(arr2(&[[1.0], [2.0], [3.0], [4.0]]));
        let summary = chain_summary(&chain, 1).unwrap();
        assert_abs_diff_eq!(summary.mean[0], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.variance[0], 5.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.nse[0], (1.25_f64 / 4.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(summary.acceptance_rate, 1.0, epsilon = 1e-12);

        let single = Chain::from_draws(arr2(&[[0.0]]));
        assert!(matches!(
            chain_summary(&single, 0),
            Err(Error::NotComputable(_))
        ));
    }
}
