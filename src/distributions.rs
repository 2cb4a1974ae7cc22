/*!
Target-distribution traits and the multivariate Gaussian weighting density.

A target is anything that evaluates an unnormalized log-kernel ln f(x) through
the [`LogTarget`] trait; plain closures `Fn(&[f64]) -> f64` qualify. Kernels
supplied on the natural (non-log) scale are wrapped by [`PlainTarget`], which
takes the logarithm at the call boundary. Supports are described by [`Bounds`]
predicates (plain `Fn(&[f64]) -> bool` closures qualify too); [`Unbounded`]
accepts every point and is the default.

[`MvGaussian`] is the N(m, V) density the normalizing-constant estimators use
for auxiliary draws and bridge weights; it factorizes V once and reuses the
Cholesky factor for sampling, quadratic forms, and the log-determinant.

# Examples

```rust
use marglik::distributions::{LogTarget, MvGaussian, PlainTarget};
use nalgebra::DMatrix;

// A log-scale standard normal kernel.
let log_kernel = |x: &[f64]| -0.5 * x[0] * x[0];
assert_eq!(log_kernel.log_kernel(&[2.0]), -2.0);

// The same kernel given on the natural scale.
let plain = PlainTarget(|x: &[f64]| (-0.5 * x[0] * x[0]).exp());
assert!((plain.log_kernel(&[2.0]) + 2.0).abs() < 1e-12);

// A standard bivariate Gaussian density.
let g = MvGaussian::new(&[0.0, 0.0], DMatrix::identity(2, 2)).unwrap();
let lp = g.log_density(&[0.0, 0.0]);
assert!((lp + (2.0 * std::f64::consts::PI).ln()).abs() < 1e-12);
```
*/

use nalgebra as na;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{Error, Result};

/// A continuous target distribution given by its unnormalized log-kernel.
pub trait LogTarget {
    /// Returns ln f(x), the log of the unnormalized density at `x`.
    fn log_kernel(&self, x: &[f64]) -> f64;
}

impl<F> LogTarget for F
where
    F: Fn(&[f64]) -> f64,
{
    fn log_kernel(&self, x: &[f64]) -> f64 {
        self(x)
    }
}

/// Adapts a kernel given on the natural (non-log) scale.
///
/// The wrapped function's value is logged at every evaluation; states where
/// the kernel is not strictly positive are never accepted by the sampler.
#[derive(Debug, Clone)]
pub struct PlainTarget<F>(pub F);

impl<F> LogTarget for PlainTarget<F>
where
    F: Fn(&[f64]) -> f64,
{
    fn log_kernel(&self, x: &[f64]) -> f64 {
        self.0(x).ln()
    }
}

/// A support predicate restricting where proposals may land.
pub trait Bounds {
    /// Tests whether `x` lies inside the support.
    fn contains(&self, x: &[f64]) -> bool;
}

impl<F> Bounds for F
where
    F: Fn(&[f64]) -> bool,
{
    fn contains(&self, x: &[f64]) -> bool {
        self(x)
    }
}

/// The default support: all of ℝ^k.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Bounds for Unbounded {
    fn contains(&self, _x: &[f64]) -> bool {
        true
    }
}

/// Symmetrizes a square matrix as (M + Mᵗ)/2.
pub(crate) fn symmetrize(m: &na::DMatrix<f64>) -> na::DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Lower Cholesky factor of a covariance, or a configuration error naming
/// `context` when the matrix is not positive definite.
pub(crate) fn cholesky_lower(
    cov: na::DMatrix<f64>,
    context: &'static str,
) -> Result<na::DMatrix<f64>> {
    na::Cholesky::new(cov)
        .map(|chol| chol.unpack())
        .ok_or(Error::NotPositiveDefinite { context })
}

/**
Multivariate Gaussian N(m, V) with a precomputed Cholesky factorization.

Serves as the weighting/bridge density of the estimators: draws are
`m + L·z` with z a vector of independent standard normals, and
[`MvGaussian::log_density`] reuses the factor for both the quadratic form
and the log-determinant. The covariance is symmetrized as (V + Vᵗ)/2 before
factorization.

# Examples

```rust
use marglik::distributions::MvGaussian;
use nalgebra::DMatrix;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let g = MvGaussian::new(&[1.0, -1.0], DMatrix::identity(2, 2)).unwrap();
let mut rng = SmallRng::seed_from_u64(42);
let y = g.sample(&mut rng);
assert_eq!(y.len(), 2);
```
*/
#[derive(Debug, Clone)]
pub struct MvGaussian {
    mean: na::DVector<f64>,
    chol: na::Cholesky<f64, na::Dyn>,
    lower: na::DMatrix<f64>,
    log_norm: f64,
}

impl MvGaussian {
    /// Builds the density from a mean and covariance.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the covariance shape does not match the mean,
    /// [`Error::NotPositiveDefinite`] if the symmetrized covariance has no
    /// Cholesky factorization.
    pub fn new(mean: &[f64], cov: na::DMatrix<f64>) -> Result<Self> {
        let k = mean.len();
        if cov.nrows() != k || cov.ncols() != k {
            return Err(Error::Config(format!(
                "weighting covariance must be {k}x{k} to match the mean, got {}x{}",
                cov.nrows(),
                cov.ncols()
            )));
        }
        let chol = na::Cholesky::new(symmetrize(&cov)).ok_or(Error::NotPositiveDefinite {
            context: "weighting density",
        })?;
        let lower = chol.l();
        let log_det = 2.0 * lower.diagonal().iter().map(|d| d.ln()).sum::<f64>();
        let ln_2pi = (2.0 * std::f64::consts::PI).ln();
        Ok(Self {
            mean: na::DVector::from_column_slice(mean),
            chol,
            lower,
            log_norm: -0.5 * (k as f64 * ln_2pi + log_det),
        })
    }

    /// Dimension of the density.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// The density's mean.
    pub fn mean(&self) -> &[f64] {
        self.mean.as_slice()
    }

    /// Squared Mahalanobis distance (x-m)ᵗ V⁻¹ (x-m).
    pub fn mahalanobis_sq(&self, x: &[f64]) -> f64 {
        let diff = na::DVector::from_column_slice(x) - &self.mean;
        let solved = self.chol.solve(&diff);
        diff.dot(&solved)
    }

    /// Normalized log-density ln N(x; m, V).
    pub fn log_density(&self, x: &[f64]) -> f64 {
        self.log_norm - 0.5 * self.mahalanobis_sq(x)
    }

    /// Draws one point m + L·z.
    pub fn sample(&self, rng: &mut SmallRng) -> Vec<f64> {
        let k = self.dim();
        let z = na::DVector::from_iterator(k, (0..k).map(|_| rng.sample::<f64, _>(StandardNormal)));
        let x = &self.mean + &self.lower * z;
        x.as_slice().to_vec()
    }
}
