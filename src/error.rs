/*!
Error types shared across the crate.

Configuration problems ([`Error::Config`] and [`Error::NotPositiveDefinite`])
are detected when a sampler or estimator is set up, before any sampling
happens, so a failing call produces no partial output. The remaining variants
describe numerical failure modes of individual estimator or diagnostic calls.
*/

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of sampling, estimation, and diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid sampler or estimator configuration: zero draw count, zero
    /// thinning, invalid degrees of freedom, dimension mismatches between
    /// the start vector, step specifications, and block lengths.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A matrix that must act as a covariance has no Cholesky factorization.
    #[error("{context} covariance is not positive definite")]
    NotPositiveDefinite {
        /// Which covariance failed (step size, weighting density, ...).
        context: &'static str,
    },

    /// No draw satisfied the bounds predicate, or the in-bounds rejection
    /// budget ran out.
    #[error("no in-bounds draws for {0}")]
    NoInBoundsDraws(&'static str),

    /// An estimator's defining mean collapsed to zero, so no finite
    /// log-estimate exists.
    #[error("estimate degenerated: {0}")]
    DegenerateEstimate(&'static str),

    /// A diagnostic's preconditions do not hold for the given data.
    #[error("diagnostic not computable: {0}")]
    NotComputable(String),

    /// An unexpected numerical failure in a dependency computation.
    #[error("numerical failure: {0}")]
    Numerical(String),
}
