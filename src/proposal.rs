/*!
Random-walk proposal kernels built from step-size specifications.

A [`StepSpec`] fixes the spread of the innovation in one of three shapes: a
shared scalar standard deviation, one standard deviation per coordinate, or a
full covariance matrix for correlated moves. The kernel factorizes the implied
covariance once (Cholesky) and every [`ProposalKernel::draw`] transforms fresh
standard-normal deviates through the factor. With [`ProposalDf::StudentT`] the
Gaussian vector is additionally rescaled by sqrt(ν / w·w) for an independent
ν-vector of standard normals w, giving multivariate Student-t innovations.

[`BlockProposal`] covers partitioned sampling: the parameter vector is split
into contiguous blocks, each with its own kernel, and a cyclic cursor decides
which block the next innovation perturbs (all other coordinates stay zero).
The cursor is owned by the proposal value, so concurrent runs need their own
instance.

# Example Usage

```rust
use marglik::proposal::{BlockProposal, ProposalDf, ProposalKernel, StepSpec};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let mut rng = SmallRng::seed_from_u64(42);

let kernel = ProposalKernel::new(&StepSpec::Scalar(0.5), 3, ProposalDf::Gaussian).unwrap();
assert_eq!(kernel.draw(&mut rng).len(), 3);

// Two blocks: coordinate 0, then coordinates 1..3.
let blocks = [(1, StepSpec::Scalar(1.0)), (2, StepSpec::Scalar(0.1))];
let mut proposal = BlockProposal::new(&blocks, ProposalDf::Gaussian).unwrap();
let eps = proposal.draw(&mut rng);
assert_eq!(&eps[1..], &[0.0, 0.0]);
```
*/

use nalgebra as na;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::distributions::{cholesky_lower, symmetrize};
use crate::error::{Error, Result};

/// Spread of the random-walk innovation for one block of coordinates.
#[derive(Debug, Clone)]
pub enum StepSpec {
    /// One standard deviation shared by every coordinate.
    Scalar(f64),
    /// A standard deviation per coordinate.
    Diagonal(Vec<f64>),
    /// A full covariance matrix for correlated innovations.
    Covariance(na::DMatrix<f64>),
}

impl StepSpec {
    /// Expands the specification into a dense `dim`×`dim` covariance,
    /// squaring standard deviations and symmetrizing full matrices.
    fn covariance(&self, dim: usize) -> Result<na::DMatrix<f64>> {
        match self {
            StepSpec::Scalar(s) => {
                if !s.is_finite() || *s <= 0.0 {
                    return Err(Error::Config(format!(
                        "scalar step size must be finite and positive, got {s}"
                    )));
                }
                Ok(na::DMatrix::from_diagonal_element(dim, dim, s * s))
            }
            StepSpec::Diagonal(stds) => {
                if stds.len() != dim {
                    return Err(Error::Config(format!(
                        "step-size vector has length {} but the block has dimension {dim}",
                        stds.len()
                    )));
                }
                if let Some(bad) = stds.iter().find(|s| !s.is_finite() || **s <= 0.0) {
                    return Err(Error::Config(format!(
                        "per-coordinate step sizes must be finite and positive, got {bad}"
                    )));
                }
                let diag = na::DVector::from_iterator(dim, stds.iter().map(|s| s * s));
                Ok(na::DMatrix::from_diagonal(&diag))
            }
            StepSpec::Covariance(m) => {
                if m.nrows() != dim || m.ncols() != dim {
                    return Err(Error::Config(format!(
                        "step covariance is {}x{} but the block has dimension {dim}",
                        m.nrows(),
                        m.ncols()
                    )));
                }
                Ok(symmetrize(m))
            }
        }
    }
}

/// Degrees of freedom of the innovation distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProposalDf {
    /// Gaussian innovations (infinite degrees of freedom).
    #[default]
    Gaussian,
    /// Multivariate Student-t innovations with the given degrees of freedom.
    StudentT(u32),
}

/**
Draws innovations for one block: `L·z` for Gaussian proposals, `L·(scale·z)`
with `scale = sqrt(ν / w·w)` for Student-t.

# Examples

```rust
use marglik::proposal::{ProposalDf, ProposalKernel, StepSpec};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let step = StepSpec::Diagonal(vec![1.0, 0.5]);
let kernel = ProposalKernel::new(&step, 2, ProposalDf::StudentT(5)).unwrap();
let mut rng = SmallRng::seed_from_u64(42);
assert_eq!(kernel.draw(&mut rng).len(), 2);
```
*/
#[derive(Debug, Clone)]
pub struct ProposalKernel {
    lower: na::DMatrix<f64>,
    df: ProposalDf,
}

impl ProposalKernel {
    /// Builds the kernel for a block of dimension `dim`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a zero dimension, zero Student-t degrees of
    /// freedom, or a step specification that does not match `dim`;
    /// [`Error::NotPositiveDefinite`] if the implied covariance has no
    /// Cholesky factorization.
    pub fn new(step: &StepSpec, dim: usize, df: ProposalDf) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Config(
                "proposal block dimension must be positive".to_string(),
            ));
        }
        if df == ProposalDf::StudentT(0) {
            return Err(Error::Config(
                "Student-t degrees of freedom must be positive".to_string(),
            ));
        }
        let lower = cholesky_lower(step.covariance(dim)?, "proposal step covariance")?;
        Ok(Self { lower, df })
    }

    /// Dimension of the block this kernel perturbs.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Draws one innovation vector.
    pub fn draw(&self, rng: &mut SmallRng) -> Vec<f64> {
        let k = self.dim();
        let mut z =
            na::DVector::from_iterator(k, (0..k).map(|_| rng.sample::<f64, _>(StandardNormal)));
        if let ProposalDf::StudentT(nu) = self.df {
            let w_dot_w: f64 = (0..nu)
                .map(|_| {
                    let w: f64 = rng.sample(StandardNormal);
                    w * w
                })
                .sum();
            z *= (f64::from(nu) / w_dot_w).sqrt();
        }
        let eps = &self.lower * z;
        eps.as_slice().to_vec()
    }
}

/**
Cyclic proposal over a contiguous partition of the parameter vector.

Each call to [`BlockProposal::draw`] perturbs exactly one block and advances
the cursor, so `m` consecutive calls touch every block once. A single-block
partition reproduces plain full-dimensional sampling.
*/
#[derive(Debug, Clone)]
pub struct BlockProposal {
    kernels: Vec<ProposalKernel>,
    offsets: Vec<usize>,
    dim: usize,
    cursor: usize,
}

impl BlockProposal {
    /// Builds the proposal from ordered `(block dimension, step)` pairs.
    pub fn new(blocks: &[(usize, StepSpec)], df: ProposalDf) -> Result<Self> {
        if blocks.is_empty() {
            return Err(Error::Config(
                "block partition must contain at least one block".to_string(),
            ));
        }
        let mut kernels = Vec::with_capacity(blocks.len());
        let mut offsets = Vec::with_capacity(blocks.len());
        let mut dim = 0;
        for (block_dim, step) in blocks {
            offsets.push(dim);
            kernels.push(ProposalKernel::new(step, *block_dim, df)?);
            dim += block_dim;
        }
        Ok(Self {
            kernels,
            offsets,
            dim,
            cursor: 0,
        })
    }

    /// Total dimension covered by the partition.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of blocks in the partition.
    pub fn n_blocks(&self) -> usize {
        self.kernels.len()
    }

    /// Rewinds the cursor to the first block.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Draws a full-dimension innovation that is nonzero only on the active
    /// block, then advances the cursor.
    pub fn draw(&mut self, rng: &mut SmallRng) -> Vec<f64> {
        let active = self.cursor;
        self.cursor = (self.cursor + 1) % self.kernels.len();
        let block = self.kernels[active].draw(rng);
        let offset = self.offsets[active];
        let mut eps = vec![0.0; self.dim];
        eps[offset..offset + block.len()].copy_from_slice(&block);
        eps
    }
}
