use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Per-branch rate multiplier. The branch is identified by its child node.
pub trait BranchRateModel: Send + Sync {
  fn rate_for_branch(&self, node: usize) -> f64;
}

#[derive(Clone, Debug, SmartDefault, Serialize, Deserialize)]
pub struct StrictClock {
  #[default = 1.0]
  pub rate: f64,
}

impl BranchRateModel for StrictClock {
  fn rate_for_branch(&self, _node: usize) -> f64 {
    self.rate
  }
}

/// Relaxed clock with one fixed rate per branch, indexed by child node. Nodes without an entry get a NaN rate, which
/// the sampler rejects when building transition matrices.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PerBranchRates {
  pub rates: Vec<f64>,
}

impl BranchRateModel for PerBranchRates {
  fn rate_for_branch(&self, node: usize) -> f64 {
    self.rates.get(node).copied().unwrap_or(f64::NAN)
  }
}
