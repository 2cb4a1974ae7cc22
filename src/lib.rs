pub mod chain;
pub mod diagnostics;
pub mod distributions;
pub mod error;
pub mod estimators;
pub mod metropolis;
mod numeric;
pub mod proposal;
