/*!
Shared numerical helpers: overflow-guarded exponentials and a bracketing
bisection root-finder used by the bridge and Muller estimators.
*/

use log::debug;

/// Largest argument for which `f64::exp` stays finite.
pub(crate) const LN_MAX: f64 = 709.782712893384;

/// Relative tolerance of the bisection root-finder.
pub(crate) const ROOT_RTOL: f64 = 1e-12;

/// Iteration cap of the bisection root-finder.
pub(crate) const ROOT_MAX_ITER: usize = 200;

/// Maximum number of bracket-widening rounds.
pub(crate) const BRACKET_MAX_EXPAND: usize = 60;

/// `exp(t)` with overflow clamped to a zero contribution.
///
/// Estimator sums treat any term whose exponent exceeds the machine
/// log-range as 0 instead of letting it poison the sum with infinity.
pub(crate) fn exp_or_zero(t: f64) -> f64 {
    if t >= LN_MAX {
        0.0
    } else {
        t.exp()
    }
}

/// Numerically stable `ln Σ exp(t_i)`.
///
/// Returns negative infinity for an empty slice and infinity as soon as one
/// term is infinite.
pub(crate) fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().fold(f64::NEG_INFINITY, |m, &t| m.max(t));
    if !max.is_finite() {
        return max;
    }
    max + terms.iter().map(|&t| (t - max).exp()).sum::<f64>().ln()
}

/// Searches outward from `guess` for an interval on which `f` changes sign.
///
/// The interval starts at `guess ± step` and its half-width doubles each
/// round, up to [`BRACKET_MAX_EXPAND`] times. Returns `(lo, hi, f_lo, f_hi)`;
/// when no sign change exists within the searched range the endpoint values
/// still share a sign and the caller decides how to fall back.
pub(crate) fn expand_bracket<F: Fn(f64) -> f64>(
    f: &F,
    guess: f64,
    step: f64,
) -> (f64, f64, f64, f64) {
    let mut half = step.max(f64::EPSILON);
    let mut lo = guess - half;
    let mut hi = guess + half;
    let mut f_lo = f(lo);
    let mut f_hi = f(hi);
    for round in 0..BRACKET_MAX_EXPAND {
        if f_lo == 0.0 || f_hi == 0.0 || (f_lo < 0.0) != (f_hi < 0.0) {
            debug!("bracket found after {round} widenings: [{lo}, {hi}]");
            break;
        }
        half *= 2.0;
        lo = guess - half;
        hi = guess + half;
        f_lo = f(lo);
        f_hi = f(hi);
    }
    (lo, hi, f_lo, f_hi)
}

/// Bisects `f` on `[lo, hi]`, assuming the endpoint values have opposite
/// signs, until the interval shrinks below [`ROOT_RTOL`] relative to the
/// midpoint or [`ROOT_MAX_ITER`] iterations have run.
pub(crate) fn bisect<F: Fn(f64) -> f64>(f: F, mut lo: f64, mut hi: f64) -> f64 {
    let mut f_lo = f(lo);
    let mut iter = 0;
    loop {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return mid;
        }
        if (f_mid < 0.0) == (f_lo < 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
        let denom = if mid.abs() > 1.0 { mid.abs() } else { 1.0 };
        iter += 1;
        if (hi - lo).abs() / denom < ROOT_RTOL || iter >= ROOT_MAX_ITER {
            return 0.5 * (lo + hi);
        }
    }
}
