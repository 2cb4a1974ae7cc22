/*!
The immutable record of one sampler run.

A [`Chain`] stores the retained states row by row: an `n`×`k` matrix of
parameter draws and, when the run kept them, the matching column of log-kernel
values. Rows are in draw order. Consumers only ever read from a chain; the
estimators and diagnostics derive their arrays from it and a chain is never
mutated after the run that produced it.

# Example Usage

```rust
use marglik::chain::Chain;
use ndarray::{arr1, arr2};

let draws = arr2(&[[0.0], [1.0], [1.0]]);
let chain = Chain::new(draws, arr1(&[-0.0, -0.5, -0.5])).unwrap();
assert_eq!(chain.len(), 3);
assert_eq!(chain.dim(), 1);
assert_eq!(chain.acceptance_rate(), 0.5);
```
*/

use ndarray::{Array1, Array2};

use crate::distributions::LogTarget;
use crate::error::{Error, Result};

/// Retained states of one sampler run, one row per draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    draws: Array2<f64>,
    log_values: Option<Array1<f64>>,
}

impl Chain {
    /// Builds a chain from draws and their log-kernel values.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the number of log values differs from the number
    /// of draw rows.
    pub fn new(draws: Array2<f64>, log_values: Array1<f64>) -> Result<Self> {
        if log_values.len() != draws.nrows() {
            return Err(Error::Config(format!(
                "chain has {} draws but {} log-kernel values",
                draws.nrows(),
                log_values.len()
            )));
        }
        Ok(Self {
            draws,
            log_values: Some(log_values),
        })
    }

    /// Builds a chain that kept only the parameter draws.
    pub fn from_draws(draws: Array2<f64>) -> Self {
        Self {
            draws,
            log_values: None,
        }
    }

    /// Number of retained draws.
    pub fn len(&self) -> usize {
        self.draws.nrows()
    }

    /// True when the chain holds no draws.
    pub fn is_empty(&self) -> bool {
        self.draws.nrows() == 0
    }

    /// Dimension of the parameter vector.
    pub fn dim(&self) -> usize {
        self.draws.ncols()
    }

    /// The retained parameter draws, one row per state.
    pub fn draws(&self) -> &Array2<f64> {
        &self.draws
    }

    /// The retained log-kernel column, if the run kept one.
    pub fn log_values(&self) -> Option<&Array1<f64>> {
        self.log_values.as_ref()
    }

    /// Consumes the chain, returning the draw matrix.
    pub fn into_draws(self) -> Array2<f64> {
        self.draws
    }

    /// The stored log-kernel values, or a fresh evaluation of `target` on
    /// every draw when the run dropped them.
    pub fn log_values_or_compute<T: LogTarget>(&self, target: &T) -> Vec<f64> {
        match &self.log_values {
            Some(values) => values.to_vec(),
            None => self
                .draws
                .outer_iter()
                .map(|row| target.log_kernel(&row.to_vec()))
                .collect(),
        }
    }

    /// Fraction of consecutive draw pairs whose parameter vectors differ.
    ///
    /// Chains with fewer than two draws report `0.0`.
    pub fn acceptance_rate(&self) -> f64 {
        let n = self.len();
        if n < 2 {
            return 0.0;
        }
        let changed = (1..n)
            .filter(|&i| self.draws.row(i) != self.draws.row(i - 1))
            .count();
        changed as f64 / (n - 1) as f64
    }
}
