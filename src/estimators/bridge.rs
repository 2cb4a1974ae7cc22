/*!
Bridge-sampling estimator.

The bridge identity ties the ratio of two normalizing constants to draws from
both distributions: the log ratio is the root of a monotone scalar equation
in the two sets of log-ratio transforms. [`bridge_log_ratio`] solves that
two-sample problem directly; [`bridge_sampling`] reduces the single-kernel
case to it by pairing the kernel with a normalized Gaussian weighting
density, so the solved ratio is the kernel's own constant.
*/

use log::warn;
use rand::rngs::SmallRng;

use crate::chain::Chain;
use crate::distributions::{Bounds, LogTarget, MvGaussian};
use crate::error::{Error, Result};
use crate::numeric::{bisect, expand_bracket, LN_MAX};

/// Candidate draws allowed per requested in-bounds draw in forced mode.
const IN_BOUNDS_ATTEMPT_FACTOR: usize = 1_000;

/// Configuration of the Gaussian-bridge variant.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Number of auxiliary Gaussian draws.
    pub n_aux: usize,
    /// Relative precision ratio of the two draw sets.
    pub psi: f64,
    /// Redraw rejected points until exactly `n_aux` fall inside the support.
    pub force_in_bounds: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            n_aux: 1_000,
            psi: 1.0,
            force_in_bounds: false,
        }
    }
}

/// Difference of the two bridge means at trial value `x`.
///
/// Increasing in `x`, with the root at log(c2/c1). Exponentials that would
/// overflow contribute zero to their running sum.
fn bridge_gap(x: f64, z1: &[f64], z2: &[f64], psi: f64) -> f64 {
    let mut lhs = 0.0;
    for &z in z2 {
        let t = z - x;
        if t < LN_MAX {
            lhs += 1.0 / (psi + t.exp());
        }
    }
    let mut rhs = 0.0;
    for &z in z1 {
        let t = z + x;
        if t < LN_MAX {
            rhs += 1.0 / (1.0 + psi * t.exp());
        }
    }
    lhs / z2.len() as f64 - rhs / z1.len() as f64
}

/// Closed-form power-family estimate used to start the bracket search.
fn initial_guess(z1: &[f64], z2: &[f64]) -> f64 {
    let mean_inv = |zs: &[f64]| {
        let sum: f64 = zs
            .iter()
            .filter(|z| **z < LN_MAX)
            .map(|z| 1.0 / (1.0 + z.exp()))
            .sum();
        sum / zs.len() as f64
    };
    let guess = (mean_inv(z1) / mean_inv(z2)).ln();
    if guess.is_finite() {
        guess
    } else {
        0.0
    }
}

/**
Solves the two-sample bridge equation for `log(c1/c2)`.

`z1` holds `log f1 - log f2` evaluated on draws from the first distribution,
`z2` holds `log f2 - log f1` on draws from the second. `psi` weighs the
relative precision of the two sets; `1.0` treats them symmetrically, and
with that choice the result negates exactly under swapping the two sets.

The root is bracketed around the closed-form power-family guess and polished
by bisection. When the searched range never brackets the root, the endpoint
whose equation residual is nearest zero is returned after a warning.

# Errors

[`Error::Config`] when either draw set is empty or `psi` is not finite and
positive.

# Examples

```rust
use marglik::estimators::bridge_log_ratio;

// First kernel is e times the second everywhere, so every z1 is 1 and
// every z2 is -1, and the log ratio is exactly 1.
let log_ratio = bridge_log_ratio(&[1.0, 1.0, 1.0], &[-1.0, -1.0, -1.0], 1.0).unwrap();
assert!((log_ratio - 1.0).abs() < 1e-9);
```
*/
pub fn bridge_log_ratio(z1: &[f64], z2: &[f64], psi: f64) -> Result<f64> {
    if z1.is_empty() || z2.is_empty() {
        return Err(Error::Config(
            "bridge estimation needs draws from both distributions".to_string(),
        ));
    }
    if !psi.is_finite() || psi <= 0.0 {
        return Err(Error::Config(format!(
            "bridge precision ratio must be finite and positive, got {psi}"
        )));
    }

    let guess = initial_guess(z1, z2);
    let h = |x: f64| bridge_gap(x, z1, z2, psi);
    let step = 0.5 * guess.abs().max(1.0);
    let (lo, hi, h_lo, h_hi) = expand_bracket(&h, guess, step);
    let root = if h_lo == 0.0 {
        lo
    } else if h_hi == 0.0 {
        hi
    } else if (h_lo < 0.0) == (h_hi < 0.0) {
        warn!("bridge root not bracketed in [{lo}, {hi}], returning the nearest endpoint");
        if h_lo.abs() <= h_hi.abs() {
            lo
        } else {
            hi
        }
    } else {
        bisect(h, lo, hi)
    };
    Ok(-root)
}

/// Draws from the weighting density, keeping points inside the support.
fn draw_in_bounds<B: Bounds>(
    weight: &MvGaussian,
    bounds: &B,
    n_aux: usize,
    force: bool,
    rng: &mut SmallRng,
) -> Result<Vec<Vec<f64>>> {
    let mut kept = Vec::with_capacity(n_aux);
    if force {
        let budget = n_aux.saturating_mul(IN_BOUNDS_ATTEMPT_FACTOR);
        let mut attempts = 0;
        while kept.len() < n_aux {
            if attempts >= budget {
                return Err(Error::NoInBoundsDraws("the bridge auxiliary sample"));
            }
            attempts += 1;
            let y = weight.sample(rng);
            if bounds.contains(&y) {
                kept.push(y);
            }
        }
    } else {
        for _ in 0..n_aux {
            let y = weight.sample(rng);
            if bounds.contains(&y) {
                kept.push(y);
            }
        }
        if kept.is_empty() {
            return Err(Error::NoInBoundsDraws("the bridge auxiliary sample"));
        }
        if kept.len() < n_aux {
            warn!(
                "only {} of {n_aux} auxiliary draws fell inside the support",
                kept.len()
            );
        }
    }
    Ok(kept)
}

/**
Estimates the kernel's log normalizing constant with a Gaussian bridge.

Draws `n_aux` points from `weight` and forms the two log-ratio sets

- `z1 = log f(x) - log g(x)` over the chain draws,
- `z2 = log g(y) - log f(y)` over the in-bounds auxiliary draws,

then solves the two-sample equation. The Gaussian is normalized, so the
solved ratio is ln c of the kernel itself.

With [`BridgeConfig::force_in_bounds`] set, rejected auxiliary draws are
replaced until exactly `n_aux` lie inside the support, within an attempt
budget. Otherwise the realized in-bounds count is used after a warning, and
zero in-bounds draws fail the call with [`Error::NoInBoundsDraws`].
*/
pub fn bridge_sampling<T: LogTarget, B: Bounds>(
    chain: &Chain,
    target: &T,
    bounds: &B,
    weight: &MvGaussian,
    config: &BridgeConfig,
    rng: &mut SmallRng,
) -> Result<f64> {
    if weight.dim() != chain.dim() {
        return Err(Error::Config(format!(
            "weighting density has dimension {} but the chain has {}",
            weight.dim(),
            chain.dim()
        )));
    }
    if config.n_aux == 0 {
        return Err(Error::Config(
            "auxiliary draw count must be positive".to_string(),
        ));
    }

    let log_values = chain.log_values_or_compute(target);
    let z1: Vec<f64> = chain
        .draws()
        .outer_iter()
        .zip(log_values.iter())
        .map(|(row, &v)| v - weight.log_density(&row.to_vec()))
        .collect();

    let aux = draw_in_bounds(weight, bounds, config.n_aux, config.force_in_bounds, rng)?;
    let z2: Vec<f64> = aux
        .iter()
        .map(|y| weight.log_density(y) - target.log_kernel(y))
        .collect();

    bridge_log_ratio(&z1, &z2, config.psi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::Unbounded;
    use approx::assert_abs_diff_eq;
    use nalgebra as na;
    use ndarray::arr2;
    use rand::SeedableRng;

    #[test]
    fn constant_kernel_ratio_is_exact() {
        let log_ratio =
            bridge_log_ratio(&[1.0; 4], &[-1.0; 4], 1.0).expect("ratio should compute");
        assert_abs_diff_eq!(log_ratio, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn asymmetric_singletons_solve_exactly() {
        // 1/(1+e^{-x}) = 1/(1+e^{2+x}) has the root x = -1.
        let log_ratio = bridge_log_ratio(&[2.0], &[0.0], 1.0).expect("ratio should compute");
        assert_abs_diff_eq!(log_ratio, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn swapping_draw_sets_negates_the_ratio() {
        let z1 = [0.3, -0.2, 1.1, 0.4];
        let z2 = [0.5, -0.7, 0.1];
        let forward = bridge_log_ratio(&z1, &z2, 1.0).expect("ratio should compute");
        let backward = bridge_log_ratio(&z2, &z1, 1.0).expect("ratio should compute");
        assert_abs_diff_eq!(forward, -backward, epsilon = 1e-9);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(
            bridge_log_ratio(&[], &[0.0], 1.0),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            bridge_log_ratio(&[0.0], &[], 1.0),
            Err(Error::Config(_))
        ));
        for psi in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            assert!(
                matches!(
                    bridge_log_ratio(&[0.0], &[0.0], psi),
                    Err(Error::Config(_))
                ),
                "Expected precision ratio {psi} to be rejected."
            );
        }
    }

    #[test]
    fn no_in_bounds_draws_fail_the_call() {
        const SEED: u64 = 42;

        let chain = Chain::from_draws(arr2(&[[0.5], [1.0]]));
        let target = |x: &[f64]| -0.5 * x[0] * x[0];
        let weight =
            MvGaussian::new(&[0.0], na::DMatrix::identity(1, 1)).expect("weight should build");
        let mut rng = SmallRng::seed_from_u64(SEED);

        for force_in_bounds in [false, true] {
            let config = BridgeConfig {
                n_aux: 10,
                force_in_bounds,
                ..BridgeConfig::default()
            };
            assert!(
                matches!(
                    bridge_sampling(
                        &chain,
                        &target,
                        &|_: &[f64]| false,
                        &weight,
                        &config,
                        &mut rng
                    ),
                    Err(Error::NoInBoundsDraws(_))
                ),
                "Expected an all-rejecting support to fail (force = {force_in_bounds})."
            );
        }
    }

    #[test]
    fn mismatched_weight_dimension_is_rejected() {
        const SEED: u64 = 42;

        let chain = Chain::from_draws(arr2(&[[0.5], [1.0]]));
        let target = |x: &[f64]| -0.5 * x[0] * x[0];
        let weight =
            MvGaussian::new(&[0.0, 0.0], na::DMatrix::identity(2, 2)).expect("weight should build");
        let mut rng = SmallRng::seed_from_u64(SEED);
        assert!(matches!(
            bridge_sampling(
                &chain,
                &target,
                &Unbounded,
                &weight,
                &BridgeConfig::default(),
                &mut rng
            ),
            Err(Error::Config(_))
        ));
    }
}
