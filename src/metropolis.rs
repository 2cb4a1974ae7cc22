/*!
# Random-Walk Metropolis Sampler

This module implements a random-walk Metropolis sampler over an arbitrary
unnormalized log-kernel. Proposals are the current state plus an innovation
from a [`BlockProposal`], so the acceptance ratio reduces to the kernel
difference: a candidate is accepted iff `v' - v >= ln U` with `U ~ (0,1)`.

## Overview

- **Target**: any [`LogTarget`], typically a closure returning the log-kernel.
- **Support**: an optional [`Bounds`] predicate; proposals that leave the
  support are rejected before the kernel is ever evaluated on them.
- **Blocks**: the parameter vector may be partitioned into contiguous blocks
  that are perturbed in round-robin order; a single-block partition is plain
  full-dimensional sampling and both go through the same code path.
- **Run shape**: `burn_in` discarded steps, then `n_draws` retained states
  taking every `thin`-th step.
- **Reproducibility**: `set_seed` fixes the generator; by default a fresh
  seed is drawn from the thread RNG.

## Example Usage

```rust
use marglik::metropolis::{RandomWalkMetropolis, SamplerConfig};
use marglik::proposal::StepSpec;

let config = SamplerConfig {
    n_draws: 200,
    burn_in: 50,
    ..SamplerConfig::default()
};
let mut sampler = RandomWalkMetropolis::new(
    |x: &[f64]| -0.5 * x[0] * x[0],
    &[0.0],
    StepSpec::Scalar(1.0),
    config,
)
.unwrap()
.set_seed(42);

let chain = sampler.run().unwrap();
assert_eq!(chain.len(), 200);
assert!(chain.log_values().is_some());
```
*/

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{aview1, Array1, Array2};
use rand::prelude::*;
use std::time::{Duration, Instant};

use crate::chain::Chain;
use crate::distributions::{Bounds, LogTarget, Unbounded};
use crate::error::{Error, Result};
use crate::proposal::{BlockProposal, ProposalDf, StepSpec};

/// Run-length and proposal configuration of a sampler.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Number of retained draws.
    pub n_draws: usize,
    /// Keep every `thin`-th state after burn-in.
    pub thin: usize,
    /// Steps discarded before retention starts.
    pub burn_in: usize,
    /// Degrees of freedom of the proposal innovations.
    pub df: ProposalDf,
    /// Store the log-kernel value alongside every retained draw.
    pub retain_log_values: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_draws: 1000,
            thin: 1,
            burn_in: 0,
            df: ProposalDf::Gaussian,
            retain_log_values: true,
        }
    }
}

/**
The random-walk Metropolis sampler.

Holds the target kernel, the support predicate, the block proposal with its
cyclic cursor, and a chain-specific random number generator. Every call to
[`RandomWalkMetropolis::run`] rewinds the cursor and restarts from the start
vector, so one sampler value can produce several runs; concurrent runs need
their own sampler instance.

# Examples

```rust
use marglik::metropolis::{RandomWalkMetropolis, SamplerConfig};
use marglik::proposal::StepSpec;

// Sample a half-normal by bounding the support to x > 0.
let mut sampler = RandomWalkMetropolis::new(
    |x: &[f64]| -0.5 * x[0] * x[0],
    &[1.0],
    StepSpec::Scalar(1.0),
    SamplerConfig::default(),
)
.unwrap()
.with_bounds(|x: &[f64]| x[0] > 0.0)
.set_seed(42);

let chain = sampler.run().unwrap();
assert!(chain.draws().iter().all(|&x| x > 0.0));
```
*/
#[derive(Debug, Clone)]
pub struct RandomWalkMetropolis<T, B = Unbounded> {
    /// The target's unnormalized log-kernel.
    pub target: T,
    /// The support predicate.
    pub bounds: B,
    /// The chain-specific random seed.
    pub seed: u64,
    proposal: BlockProposal,
    start: Vec<f64>,
    config: SamplerConfig,
    rng: SmallRng,
}

impl<T: LogTarget> RandomWalkMetropolis<T, Unbounded> {
    /**
    Constructs a sampler that perturbs the whole parameter vector at once.

    # Arguments

    * `target` - The unnormalized log-kernel to sample from.
    * `start` - The starting state.
    * `step` - Spread of the random-walk innovation.
    * `config` - Run lengths and proposal degrees of freedom.

    # Errors

    All configuration problems are reported here, before any sampling:
    an empty start vector, zero draws, zero thinning, invalid step sizes,
    a step covariance that is not positive definite, or zero Student-t
    degrees of freedom.
    */
    pub fn new(target: T, start: &[f64], step: StepSpec, config: SamplerConfig) -> Result<Self> {
        let blocks = [(start.len(), step)];
        Self::blocked(target, start, &blocks, config)
    }

    /**
    Constructs a sampler over a contiguous partition of the parameter vector.

    `blocks` lists `(block dimension, step)` pairs in coordinate order; the
    dimensions must sum to the length of `start`. Each sampler step perturbs
    one block, cycling through the partition. A one-block partition behaves
    exactly like [`RandomWalkMetropolis::new`].

    # Examples

    ```rust
    use marglik::metropolis::{RandomWalkMetropolis, SamplerConfig};
    use marglik::proposal::StepSpec;

    let blocks = [(1, StepSpec::Scalar(0.8)), (2, StepSpec::Scalar(0.3))];
    let sampler = RandomWalkMetropolis::blocked(
        |x: &[f64]| -0.5 * x.iter().map(|xi| xi * xi).sum::<f64>(),
        &[0.0, 0.0, 0.0],
        &blocks,
        SamplerConfig::default(),
    );
    assert!(sampler.is_ok());
    ```
    */
    pub fn blocked(
        target: T,
        start: &[f64],
        blocks: &[(usize, StepSpec)],
        config: SamplerConfig,
    ) -> Result<Self> {
        if start.is_empty() {
            return Err(Error::Config("start vector must not be empty".to_string()));
        }
        if config.n_draws == 0 {
            return Err(Error::Config(
                "number of retained draws must be positive".to_string(),
            ));
        }
        if config.thin == 0 {
            return Err(Error::Config(
                "thinning interval must be positive".to_string(),
            ));
        }
        let proposal = BlockProposal::new(blocks, config.df)?;
        if proposal.dim() != start.len() {
            return Err(Error::Config(format!(
                "block dimensions sum to {} but the start vector has length {}",
                proposal.dim(),
                start.len()
            )));
        }
        let seed = thread_rng().gen::<u64>();
        Ok(Self {
            target,
            bounds: Unbounded,
            seed,
            proposal,
            start: start.to_vec(),
            config,
            rng: SmallRng::seed_from_u64(seed),
        })
    }
}

impl<T: LogTarget, B: Bounds> RandomWalkMetropolis<T, B> {
    const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

    /// Replaces the support predicate, rejecting proposals outside it.
    ///
    /// The kernel is never evaluated on an out-of-support point.
    pub fn with_bounds<B2: Bounds>(self, bounds: B2) -> RandomWalkMetropolis<T, B2> {
        RandomWalkMetropolis {
            target: self.target,
            bounds,
            seed: self.seed,
            proposal: self.proposal,
            start: self.start,
            config: self.config,
            rng: self.rng,
        }
    }

    /// Sets the random seed, making runs reproducible.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    /// One propose/accept-or-reject update of `(x, v)`.
    ///
    /// Keeps the invariant `v == target.log_kernel(x)`. Returns whether the
    /// proposal was accepted.
    fn step(&mut self, x: &mut Vec<f64>, v: &mut f64) -> bool {
        let eps = self.proposal.draw(&mut self.rng);
        let proposed: Vec<f64> = x.iter().zip(&eps).map(|(xi, e)| xi + e).collect();
        if !self.bounds.contains(&proposed) {
            return false;
        }
        let proposed_v = self.target.log_kernel(&proposed);
        let u: f64 = self.rng.gen();
        if proposed_v - *v >= u.ln() {
            *x = proposed;
            *v = proposed_v;
            true
        } else {
            false
        }
    }

    /// Runs the chain, returning exactly `n_draws` retained states.
    pub fn run(&mut self) -> Result<Chain> {
        self.run_inner(None)
    }

    /// Runs the chain with a progress bar showing the running acceptance
    /// rate over all steps, burn-in and thinning included.
    pub fn run_progress(&mut self) -> Result<Chain> {
        let pb = ProgressBar::new(self.config.n_draws as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        let chain = self.run_inner(Some(&pb))?;
        pb.finish_with_message("Done!");
        Ok(chain)
    }

    fn run_inner(&mut self, pb: Option<&ProgressBar>) -> Result<Chain> {
        let SamplerConfig {
            n_draws,
            thin,
            burn_in,
            retain_log_values,
            ..
        } = self.config;
        let dim = self.start.len();

        self.proposal.reset();
        let mut x = self.start.clone();
        let mut v = self.target.log_kernel(&x);

        let mut accept_count = 0_usize;
        let mut step_count = 0_usize;
        let mut last_update = Instant::now();

        for _ in 0..burn_in {
            accept_count += usize::from(self.step(&mut x, &mut v));
            step_count += 1;
        }

        let mut draws = Array2::zeros((n_draws, dim));
        let mut log_values = retain_log_values.then(|| Array1::zeros(n_draws));

        for i in 0..n_draws {
            for _ in 0..thin {
                accept_count += usize::from(self.step(&mut x, &mut v));
                step_count += 1;
            }
            draws.row_mut(i).assign(&aview1(&x));
            if let Some(values) = log_values.as_mut() {
                values[i] = v;
            }

            if let Some(pb) = pb {
                if last_update.elapsed() >= Self::UPDATE_INTERVAL || i + 1 == n_draws {
                    let accept_rate = accept_count as f64 / step_count as f64;
                    pb.set_position(i as u64 + 1);
                    pb.set_message(format!("AcceptRate={accept_rate:.3}"));
                    last_update = Instant::now();
                }
            }
        }

        match log_values {
            Some(values) => Chain::new(draws, values),
            None => Ok(Chain::from_draws(draws)),
        }
    }
}
