use crate::make_error;
use eyre::Report;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Gamma};

/// Discretized rate heterogeneity across sites: a fixed set of rate categories with prior proportions.
pub trait SiteModel: Send + Sync {
  fn category_count(&self) -> usize;

  /// Rate multiplier of `category` on the branch above `node`.
  fn rate_for_category(&self, category: usize, node: usize) -> f64;

  /// Prior proportions of the categories, summing to 1.
  fn category_proportions(&self, node: usize) -> &[f64];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteRates {
  rates: Vec<f64>,
  proportions: Vec<f64>,
}

impl SiteRates {
  pub fn new(rates: Vec<f64>, proportions: Vec<f64>) -> Result<Self, Report> {
    if rates.is_empty() {
      return make_error!("Site model requires at least one rate category");
    }
    if rates.len() != proportions.len() {
      return make_error!(
        "Site model has {} category rates, but {} category proportions",
        rates.len(),
        proportions.len()
      );
    }
    if let Some(rate) = rates.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
      return make_error!("Site model: expected category rates to be non-negative, but found {rate}");
    }
    Ok(Self { rates, proportions })
  }

  /// Single category with rate 1.
  pub fn constant() -> Self {
    Self {
      rates: vec![1.0],
      proportions: vec![1.0],
    }
  }

  /// Equal-probability discretization of a mean-one gamma distribution with the given `shape`. Each category is
  /// represented by the median of its bin, and the medians are rescaled to have mean 1.
  pub fn discrete_gamma(shape: f64, n_categories: usize) -> Result<Self, Report> {
    if n_categories == 0 {
      return make_error!("Discrete gamma site model requires at least one category");
    }
    if !(shape.is_finite() && shape > 0.0) {
      return make_error!("Discrete gamma site model: expected 'shape' to be positive, but got {shape}");
    }
    if n_categories == 1 {
      return Ok(Self::constant());
    }

    let gamma = Gamma::new(shape, shape)?;
    let n = n_categories as f64;
    let medians = (0..n_categories)
      .map(|i| gamma_quantile(&gamma, (2.0 * i as f64 + 1.0) / (2.0 * n)))
      .collect_vec();
    let mean = medians.iter().sum::<f64>() / n;
    let rates = medians.into_iter().map(|m| m / mean).collect_vec();

    Self::new(rates, vec![1.0 / n; n_categories])
  }

  pub fn rates(&self) -> &[f64] {
    &self.rates
  }
}

/// Quantile by bisection on the CDF, to full double precision. `p` must be in (0, 1).
fn gamma_quantile(gamma: &Gamma, p: f64) -> f64 {
  let mut low = 0.0;
  let mut high = 1.0;
  while gamma.cdf(high) < p {
    low = high;
    high *= 2.0;
  }
  for _ in 0..200 {
    let mid = 0.5 * (low + high);
    if mid <= low || mid >= high {
      break;
    }
    if gamma.cdf(mid) < p {
      low = mid;
    } else {
      high = mid;
    }
  }
  0.5 * (low + high)
}

impl SiteModel for SiteRates {
  fn category_count(&self) -> usize {
    self.rates.len()
  }

  fn rate_for_category(&self, category: usize, _node: usize) -> f64 {
    self.rates[category]
  }

  fn category_proportions(&self, _node: usize) -> &[f64] {
    &self.proportions
  }
}
