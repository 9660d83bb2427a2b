use crate::make_error;
use eyre::Report;
use ndarray::{Array1, Array2};

/// Continuous-time Markov model of state changes along a branch.
///
/// The sampler depends on this capability set only, never on the concrete model.
pub trait SubstitutionModel: Send + Sync {
  fn state_count(&self) -> usize;

  /// Equilibrium distribution, also used as the root prior.
  fn stationary_frequencies(&self) -> &Array1<f64>;

  /// Fills the `n x n` `matrix` with P(child state | parent state) for the branch above `node`: rows are parent states,
  /// columns are child states. The expected number of substitutions is `(parent_age - child_age) * rate`.
  fn transition_matrix(&self, node: usize, parent_age: f64, child_age: f64, rate: f64, matrix: &mut Array2<f64>);
}

/// Two-state model of loss (0 -> 1) with back-mutation at relative rate `lambda`. The rate matrix is normalized to one
/// expected substitution per unit time at equilibrium.
#[derive(Clone, Debug)]
pub struct BinarySubstitutionModel {
  lambda: f64,
  pi: Array1<f64>,
  total_rate: f64,
}

impl BinarySubstitutionModel {
  pub fn new(lambda: f64) -> Result<Self, Report> {
    if !(lambda.is_finite() && lambda > 0.0) {
      return make_error!("Binary substitution model: expected 'lambda' to be positive, but got {lambda}");
    }
    let pi = Array1::from(vec![lambda / (lambda + 1.0), 1.0 / (lambda + 1.0)]);

    // Q = f * [[-1, 1], [lambda, -lambda]] with f = 1 / sum_i(pi_i * q_i)
    let f = 1.0 / (pi[0] + pi[1] * lambda);
    let total_rate = f * (1.0 + lambda);

    Ok(Self { lambda, pi, total_rate })
  }

  pub const fn lambda(&self) -> f64 {
    self.lambda
  }
}

impl SubstitutionModel for BinarySubstitutionModel {
  fn state_count(&self) -> usize {
    2
  }

  fn stationary_frequencies(&self) -> &Array1<f64> {
    &self.pi
  }

  fn transition_matrix(&self, _node: usize, parent_age: f64, child_age: f64, rate: f64, matrix: &mut Array2<f64>) {
    let decay = (-self.total_rate * (parent_age - child_age) * rate).exp();
    let (pi0, pi1) = (self.pi[0], self.pi[1]);
    matrix[[0, 0]] = pi0 + pi1 * decay;
    matrix[[0, 1]] = pi1 * (1.0 - decay);
    matrix[[1, 0]] = pi0 * (1.0 - decay);
    matrix[[1, 1]] = pi1 + pi0 * decay;
  }
}

/// Equal-rates model over `n_states` states with uniform equilibrium frequencies, scaled by `mu` substitutions per unit
/// time. Used for the unphased (10) and phased (16) genotype spaces.
#[derive(Clone, Debug)]
pub struct JukesCantor {
  mu: f64,
  pi: Array1<f64>,
}

impl JukesCantor {
  pub fn new(n_states: usize, mu: f64) -> Result<Self, Report> {
    if n_states < 2 {
      return make_error!("Jukes-Cantor model requires at least 2 states, but got {n_states}");
    }
    if !(mu.is_finite() && mu >= 0.0) {
      return make_error!("Jukes-Cantor model: expected 'mu' to be non-negative, but got {mu}");
    }
    let pi = Array1::from_elem(n_states, 1.0 / n_states as f64);
    Ok(Self { mu, pi })
  }

  pub const fn mu(&self) -> f64 {
    self.mu
  }
}

impl SubstitutionModel for JukesCantor {
  fn state_count(&self) -> usize {
    self.pi.len()
  }

  fn stationary_frequencies(&self) -> &Array1<f64> {
    &self.pi
  }

  fn transition_matrix(&self, _node: usize, parent_age: f64, child_age: f64, rate: f64, matrix: &mut Array2<f64>) {
    let n = self.pi.len() as f64;
    let decay = (-n / (n - 1.0) * self.mu * (parent_age - child_age) * rate).exp();
    let stay = 1.0 / n + (n - 1.0) / n * decay;
    let change = (1.0 - decay) / n;
    matrix.fill(change);
    matrix.diag_mut().fill(stay);
  }
}
