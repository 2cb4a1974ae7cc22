/*!
Muller's estimator of the log normalizing constant.

Chain draws and auxiliary Gaussian draws are transformed into two sorted
lists of log ratios, `rf = ln g - ln f` over the chain and `rg = ln f - ln g`
over the auxiliary set. The balance function

```text
M(x) = S(-x, rg) - S(x, rf)
```

with the short-circuited partial mean `S` is increasing in `x` and crosses
zero at ln c, bracketed between the negated maximum of `rf` and the maximum
of `rg`. Draws outside the support enter with a `ln f = -inf` sentinel.
*/

use log::warn;
use rand::rngs::SmallRng;

use crate::chain::Chain;
use crate::distributions::{Bounds, LogTarget, MvGaussian};
use crate::error::{Error, Result};
use crate::numeric::bisect;

use super::log_kernel_or_neg_inf;

/// Configuration of Muller's method.
#[derive(Debug, Clone)]
pub struct MullerConfig {
    /// Number of auxiliary Gaussian draws.
    pub n_aux: usize,
}

impl Default for MullerConfig {
    fn default() -> Self {
        Self { n_aux: 1_000 }
    }
}

/// Mean of `1 - e^(t + shift)` over the ascending list, stopping at the
/// first non-negative exponent. The divisor stays the full list length.
fn partial_sum(shift: f64, sorted: &[f64]) -> f64 {
    let mut acc = 0.0;
    for &t0 in sorted {
        let t = t0 + shift;
        if t >= 0.0 {
            break;
        }
        acc += 1.0 - t.exp();
    }
    acc / sorted.len() as f64
}

fn balance_gap(x: f64, rf: &[f64], rg: &[f64]) -> f64 {
    partial_sum(-x, rg) - partial_sum(x, rf)
}

/// Largest finite entry of an ascending list.
fn finite_max(sorted: &[f64]) -> Option<f64> {
    sorted.iter().rev().find(|t| t.is_finite()).copied()
}

/**
Estimates the log normalizing constant by Muller's method.

Needs a weighting density matching the chain's dimension; `n_aux` points are
drawn from it. Chain draws rejected by `bounds` keep a sentinel kernel value
of negative infinity rather than being dropped.

# Errors

[`Error::Config`] for an empty chain, a zero auxiliary draw count, or a
dimension mismatch; [`Error::NoInBoundsDraws`] when either transformed list
has no finite entry to bracket the root with.
*/
pub fn muller_estimate<T: LogTarget, B: Bounds>(
    chain: &Chain,
    target: &T,
    bounds: &B,
    weight: &MvGaussian,
    config: &MullerConfig,
    rng: &mut SmallRng,
) -> Result<f64> {
    if chain.is_empty() {
        return Err(Error::Config("chain must not be empty".to_string()));
    }
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
    let mut rf: Vec<f64> = chain
        .draws()
        .outer_iter()
        .zip(log_values.iter())
        .map(|(row, &v)| {
            let x = row.to_vec();
            let log_f = if bounds.contains(&x) {
                v
            } else {
                f64::NEG_INFINITY
            };
            weight.log_density(&x) - log_f
        })
        .collect();
    let mut rg: Vec<f64> = (0..config.n_aux)
        .map(|_| {
            let y = weight.sample(rng);
            log_kernel_or_neg_inf(target, bounds, &y) - weight.log_density(&y)
        })
        .collect();
    rf.sort_by(f64::total_cmp);
    rg.sort_by(f64::total_cmp);

    let lo =
        -finite_max(&rf).ok_or(Error::NoInBoundsDraws("the chain side of Muller's method"))?;
    let hi = finite_max(&rg).ok_or(Error::NoInBoundsDraws(
        "the auxiliary side of Muller's method",
    ))?;

    let m = |x: f64| balance_gap(x, &rf, &rg);
    let m_lo = m(lo);
    let m_hi = m(hi);
    let root = if m_lo == 0.0 {
        lo
    } else if m_hi == 0.0 {
        hi
    } else if (m_lo < 0.0) == (m_hi < 0.0) {
        warn!("Muller balance not bracketed in [{lo}, {hi}], returning the nearest endpoint");
        if m_lo.abs() <= m_hi.abs() {
            lo
        } else {
            hi
        }
    } else {
        bisect(m, lo, hi)
    };
    Ok(root)
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
    fn partial_sum_short_circuits_at_zero() {
        let sorted = [-1.0, 0.5];
        let expected = (1.0 - (-1.0_f64).exp()) / 2.0;
        assert_abs_diff_eq!(partial_sum(0.0, &sorted), expected, epsilon = 1e-12);
        // Shifting everything non-negative empties the sum.
        assert_eq!(partial_sum(1.0, &sorted), 0.0);
    }

    #[test]
    fn scaled_weight_kernel_is_recovered_exactly() {
        const SEED: u64 = 42;

        let weight =
            MvGaussian::new(&[0.0], na::DMatrix::identity(1, 1)).expect("weight should build");
        // Kernel equal to 3 times the weighting density itself.
        let target = {
            let g = weight.clone();
            move |x: &[f64]| g.log_density(x) + 3.0_f64.ln()
        };
        let chain = Chain::from_draws(arr2(&[[0.0], [0.5], [-0.3]]));
        let mut rng = SmallRng::seed_from_u64(SEED);

        let log_c = muller_estimate(
            &chain,
            &target,
            &Unbounded,
            &weight,
            &MullerConfig { n_aux: 50 },
            &mut rng,
        )
        .expect("estimate should compute");
        assert_abs_diff_eq!(log_c, 3.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn fully_rejected_chain_cannot_bracket() {
        const SEED: u64 = 42;

        let chain = Chain::from_draws(arr2(&[[0.0], [1.0]]));
        let target = |x: &[f64]| -0.5 * x[0] * x[0];
        let weight =
            MvGaussian::new(&[0.0], na::DMatrix::identity(1, 1)).expect("weight should build");
        let mut rng = SmallRng::seed_from_u64(SEED);
        assert!(matches!(
            muller_estimate(
                &chain,
                &target,
                &|x: &[f64]| x[0] > 10.0,
                &weight,
                &MullerConfig::default(),
                &mut rng
            ),
            Err(Error::NoInBoundsDraws(_))
        ));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        const SEED: u64 = 42;

        let target = |x: &[f64]| -0.5 * x[0] * x[0];
        let weight =
            MvGaussian::new(&[0.0], na::DMatrix::identity(1, 1)).expect("weight should build");
        let mut rng = SmallRng::seed_from_u64(SEED);

        let empty = Chain::from_draws(ndarray::Array2::zeros((0, 1)));
        assert!(matches!(
            muller_estimate(
                &empty,
                &target,
                &Unbounded,
                &weight,
                &MullerConfig::default(),
                &mut rng
            ),
            Err(Error::Config(_))
        ));

        let chain = Chain::from_draws(arr2(&[[0.0], [1.0]]));
        assert!(matches!(
            muller_estimate(
                &chain,
                &target,
                &Unbounded,
                &weight,
                &MullerConfig { n_aux: 0 },
                &mut rng
            ),
            Err(Error::Config(_))
        ));

        let wide =
            MvGaussian::new(&[0.0, 0.0], na::DMatrix::identity(2, 2)).expect("weight should build");
        assert!(matches!(
            muller_estimate(
                &chain,
                &target,
                &Unbounded,
                &wide,
                &MullerConfig::default(),
                &mut rng
            ),
            Err(Error::Config(_))
        ));
    }
}
