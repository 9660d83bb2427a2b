//! Log-domain helpers for drawing from unnormalized categorical distributions.
//!
//! Weights are carried as natural logarithms and exponentiated only after the maximum
//! has been subtracted, so that vectors whose entries are all far below `f64::MIN_POSITIVE`
//! can still be sampled from.

use crate::make_error;
use eyre::Report;
use rand::Rng;

/// Walks the cumulative sum of normalized `probs` and returns the first index whose cumulative
/// mass exceeds `u`. When rounding leaves `u` above the total, the last index with positive probability is
/// returned.
pub fn sample_cumulative(probs: &[f64], u: f64) -> usize {
  let mut cumulative = 0.0;
  for (i, p) in probs.iter().enumerate() {
    cumulative += p;
    if u < cumulative {
      return i;
    }
  }
  probs
    .iter()
    .rposition(|&p| p > 0.0)
    .unwrap_or_else(|| probs.len().saturating_sub(1))
}

/// Converts log-weights in place into probabilities summing to one.
///
/// Fails when every weight is zero (all entries are `-inf`), or when any entry is NaN or `+inf`.
pub fn normalize_log_probs_inplace(log_probs: &mut [f64]) -> Result<(), Report> {
  if let Some(i) = log_probs.iter().position(|x| x.is_nan() || *x == f64::INFINITY) {
    return make_error!(
      "Log-probability of candidate {i} is not a valid number: {}",
      log_probs[i]
    );
  }

  let max = log_probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  if max == f64::NEG_INFINITY {
    return make_error!(
      "All {} candidates have zero probability, the data is impossible under every state",
      log_probs.len()
    );
  }

  let mut total = 0.0;
  for x in log_probs.iter_mut() {
    *x = (*x - max).exp();
    total += *x;
  }
  for x in log_probs.iter_mut() {
    *x /= total;
  }
  Ok(())
}

/// Normalizes `log_probs` in place and draws one index using exactly one uniform value from `rng`.
/// On return `log_probs` holds the normalized probabilities.
pub fn sample_from_log_probs(log_probs: &mut [f64], rng: &mut impl Rng) -> Result<usize, Report> {
  normalize_log_probs_inplace(log_probs)?;
  let u: f64 = rng.gen();
  Ok(sample_cumulative(log_probs, u))
}

/// Numerically stable `ln(sum(exp(x)))`. Returns `-inf` for an empty slice or all-`-inf` input.
pub fn log_sum_exp(values: &[f64]) -> f64 {
  let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  if max == f64::NEG_INFINITY {
    return f64::NEG_INFINITY;
  }
  max + values.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}
