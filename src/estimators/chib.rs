/*!
Chib-Jeliazkov estimator of the log normalizing constant.

Works from the Metropolis acceptance identity at a fixed evaluation point:
the posterior ordinate there is the mean acceptance probability of moves
into the point over the chain, divided by the mean acceptance probability
of moves out of it over fresh proposal draws. Subtracting the log ordinate
from the kernel value at the point gives ln c.

The evaluation point is usually a high-density location such as the
posterior mean, with the proposal covariance matching the sampler's step.
*/

use rand::rngs::SmallRng;

use crate::chain::Chain;
use crate::distributions::{Bounds, LogTarget, MvGaussian};
use crate::error::{Error, Result};
use crate::numeric::exp_or_zero;

use super::log_kernel_or_neg_inf;

/// Configuration of the Chib-Jeliazkov estimator.
#[derive(Debug, Clone)]
pub struct ChibConfig {
    /// Number of fresh proposal draws around the evaluation point.
    pub n_aux: usize,
}

impl Default for ChibConfig {
    fn default() -> Self {
        Self { n_aux: 1_000 }
    }
}

/**
Estimates the log normalizing constant by the Chib-Jeliazkov method.

`point` is the evaluation point and `cov` the proposal covariance used for
the draws around it; both must match the chain's dimension.

# Errors

[`Error::Config`] for an empty chain, a zero auxiliary draw count, or a
dimension mismatch; [`Error::NotPositiveDefinite`] when `cov` has no
Cholesky factor; [`Error::DegenerateEstimate`] when the kernel vanishes at
the evaluation point or either acceptance average underflows to zero.
*/
pub fn chib_jeliazkov<T: LogTarget, B: Bounds>(
    chain: &Chain,
    target: &T,
    bounds: &B,
    point: &[f64],
    cov: nalgebra::DMatrix<f64>,
    config: &ChibConfig,
    rng: &mut SmallRng,
) -> Result<f64> {
    if chain.is_empty() {
        return Err(Error::Config("chain must not be empty".to_string()));
    }
    if point.len() != chain.dim() {
        return Err(Error::Config(format!(
            "evaluation point has dimension {} but the chain has {}",
            point.len(),
            chain.dim()
        )));
    }
    if config.n_aux == 0 {
        return Err(Error::Config(
            "auxiliary draw count must be positive".to_string(),
        ));
    }

    let proposal = MvGaussian::new(point, cov)?;
    let f_star = log_kernel_or_neg_inf(target, bounds, point);
    if !f_star.is_finite() {
        return Err(Error::DegenerateEstimate(
            "kernel vanishes at the evaluation point",
        ));
    }

    let log_values = chain.log_values_or_compute(target);
    let numerator = chain
        .draws()
        .outer_iter()
        .zip(log_values.iter())
        .map(|(row, &v)| exp_or_zero((f_star - v).min(0.0) + proposal.log_density(&row.to_vec())))
        .sum::<f64>()
        / chain.len() as f64;
    let denominator = (0..config.n_aux)
        .map(|_| {
            let y = proposal.sample(rng);
            exp_or_zero((log_kernel_or_neg_inf(target, bounds, &y) - f_star).min(0.0))
        })
        .sum::<f64>()
        / config.n_aux as f64;
    if numerator <= 0.0 || denominator <= 0.0 {
        return Err(Error::DegenerateEstimate(
            "acceptance averages vanished around the evaluation point",
        ));
    }
    Ok(f_star - (numerator.ln() - denominator.ln()))
}
