use crate::gibbs::model::GibbsModel;
use crate::tree::traversal::TreeTraversal;
use eyre::{Report, WrapErr};
use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2, ArrayViewMut2};

/// Per-worker buffers for the pruning pass. Each concurrently running category needs its own.
#[derive(Clone, Debug)]
pub struct PropagationScratch {
  pub transition: Array2<f64>,
  pub accumulator: Array1<f64>,
  pub branch: Array1<f64>,
}

impl PropagationScratch {
  pub fn new(n_states: usize) -> Self {
    Self {
      transition: Array2::zeros((n_states, n_states)),
      accumulator: Array1::zeros(n_states),
      branch: Array1::zeros(n_states),
    }
  }
}

/// Felsenstein pruning for one rate category.
///
/// `partials` is the `nodes x states` slice of this category and must already hold the leaf rows. Every internal row
/// is overwritten, in post-order, with
///
/// ```text
/// partial[node][p] = prod_{child c} sum_s P_c(p -> s) * partial[c][s]
/// ```
///
/// With `rescale`, each internal row is divided by its maximum and the logs of the divisors are summed into the
/// return value. If a row is entirely zero, it is left as is and the return value is `-inf`: the whole category then
/// has zero likelihood at this site. Without rescaling the return value is 0.
pub fn propagate_category(
  model: &GibbsModel,
  traversal: &TreeTraversal,
  category: usize,
  rescale: bool,
  scratch: &mut PropagationScratch,
  mut partials: ArrayViewMut2<f64>,
) -> Result<f64, Report> {
  let PropagationScratch {
    transition,
    accumulator,
    branch,
  } = scratch;
  let mut log_scale = 0.0;

  for &node in traversal.post_order() {
    let children = model.tree.children(node);
    if children.is_empty() {
      continue;
    }

    accumulator.fill(1.0);
    for &child in children {
      model
        .branch_transition(child, category, transition)
        .wrap_err_with(|| format!("When propagating partial likelihoods from node {child} to node {node}"))?;

      general_mat_vec_mul(1.0, &*transition, &partials.row(child), 0.0, branch);
      *accumulator *= &*branch;
    }

    if rescale {
      let max = accumulator.iter().copied().fold(0.0, f64::max);
      if max > 0.0 {
        accumulator.mapv_inplace(|x| x / max);
        log_scale += max.ln();
      } else {
        log_scale = f64::NEG_INFINITY;
      }
    }

    partials.row_mut(node).assign(&*accumulator);
  }

  Ok(log_scale)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gibbs::leaf_partials::fill_leaf_partials;
  use crate::gibbs::test_utils::two_state_fixture;
  use crate::tree::rooted_tree::RootedTree;
  use approx::{assert_abs_diff_eq, assert_ulps_eq};
  use ndarray::{s, Array3};
  use rstest::rstest;

  fn run(nwk: &str, rates: &[f64], leaf_lh: &[[f64; 2]], rescale: bool) -> Result<(Array3<f64>, Vec<f64>, usize), Report> {
    let mut fixture = two_state_fixture(nwk, 1, rates)?;
    for (taxon, lh) in leaf_lh.iter().enumerate() {
      fixture.likelihood.log_lh[[taxon, 0, 0]] = lh[0].ln();
      fixture.likelihood.log_lh[[taxon, 0, 1]] = lh[1].ln();
    }
    let model = fixture.model();
    let traversal = TreeTraversal::new(model.tree)?;
    let n_nodes = model.tree.node_count();
    let node_to_observation = fixture.node_to_observation();

    let mut partials = Array3::zeros((rates.len(), n_nodes, 2));
    let leaf_scale = fill_leaf_partials(&model, traversal.leaves(), &node_to_observation, 0, rescale, &mut partials)?;
    let mut scratch = PropagationScratch::new(2);
    let mut log_scales = vec![];
    for category in 0..rates.len() {
      let scale = propagate_category(
        &model,
        &traversal,
        category,
        rescale,
        &mut scratch,
        partials.slice_mut(s![category, .., ..]),
      )?;
      log_scales.push(leaf_scale + scale);
    }
    Ok((partials, log_scales, model.tree.root()))
  }

  #[rstest]
  fn computes_cherry_by_hand() -> Result<(), Report> {
    // P(stay) = 0.9 on both unit branches
    let (partials, _, root) = run("(A:1,B:1);", &[1.0], &[[1.0, 0.0], [0.5, 0.5]], false)?;
    // parent 0: (0.9 * 1 + 0.1 * 0) * (0.9 * 0.5 + 0.1 * 0.5)
    assert_ulps_eq!(partials[[0, root, 0]], 0.9 * 0.5, epsilon = 1e-15);
    // parent 1: (0.1 * 1 + 0.9 * 0) * 0.5
    assert_ulps_eq!(partials[[0, root, 1]], 0.1 * 0.5, epsilon = 1e-15);
    Ok(())
  }

  #[rstest]
  fn category_rate_scales_branches() -> Result<(), Report> {
    // rate 2 on a unit branch equals a branch of length 2: P(stay) = 0.82
    let (partials, _, root) = run("(A:1,B:1);", &[1.0, 2.0], &[[1.0, 0.0], [1.0, 0.0]], false)?;
    assert_ulps_eq!(partials[[0, root, 0]], 0.81, epsilon = 1e-12);
    assert_ulps_eq!(partials[[1, root, 0]], 0.82 * 0.82, epsilon = 1e-12);
    assert_ulps_eq!(partials[[1, root, 1]], 0.18 * 0.18, epsilon = 1e-12);
    Ok(())
  }

  #[rstest]
  fn rescaling_preserves_likelihood() -> Result<(), Report> {
    let nwk = "(((A:0.3,B:0.3):0.7,C:1):0.5,(D:0.2,E:0.2):1.3);";
    let leaf_lh = [[0.2, 0.7], [0.9, 0.1], [0.4, 0.4], [1e-3, 0.5], [0.6, 0.01]];
    let (plain, plain_scales, root) = run(nwk, &[0.4, 1.6], &leaf_lh, false)?;
    let (scaled, scaled_scales, _) = run(nwk, &[0.4, 1.6], &leaf_lh, true)?;

    for category in 0..2 {
      assert_abs_diff_eq!(plain_scales[category], 0.0);
      for state in 0..2 {
        let restored = scaled[[category, root, state]] * scaled_scales[category].exp();
        assert_ulps_eq!(restored, plain[[category, root, state]], epsilon = 1e-15);
      }
      let max = scaled.slice(s![category, root, ..]).iter().copied().fold(0.0, f64::max);
      assert_ulps_eq!(max, 1.0);
    }
    Ok(())
  }

  #[rstest]
  fn reports_vanished_category_when_rescaling() -> Result<(), Report> {
    // zero rate: no change possible, but the leaves disagree
    let (partials, scales, root) = run("(A:1,B:1);", &[0.0, 1.0], &[[1.0, 0.0], [0.0, 1.0]], true)?;
    assert_eq!(scales[0], f64::NEG_INFINITY);
    assert_eq!(partials[[0, root, 0]], 0.0);
    assert!(scales[1].is_finite());
    Ok(())
  }
}
