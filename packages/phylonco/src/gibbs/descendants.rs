use crate::gibbs::model::GibbsModel;
use crate::make_internal_report;
use crate::tree::traversal::TreeTraversal;
use crate::utils::log_probs::sample_from_log_probs;
use eyre::{Report, WrapErr};
use ndarray::{Array2, ArrayView2};
use rand::Rng;

/// Draws the state of every non-root node given its parent's state, top-down.
///
/// `partials` is the `nodes x states` slice of the chosen `category`. For a node with sampled parent state `p`, the
/// state is drawn proportional to `P(p -> g) * partial[node][g]`. The root state must already be in `sampled_states`.
#[allow(clippy::too_many_arguments)]
pub fn sample_descendants(
  model: &GibbsModel,
  traversal: &TreeTraversal,
  category: usize,
  partials: ArrayView2<f64>,
  transition: &mut Array2<f64>,
  log_probs: &mut Vec<f64>,
  sampled_states: &mut [usize],
  rng: &mut impl Rng,
) -> Result<(), Report> {
  let root = model.tree.root();

  // pre-order: the parent's state is always drawn before its children
  for &node in traversal.pre_order() {
    if node == root {
      continue;
    }
    let parent = model
      .tree
      .parent(node)
      .ok_or_else(|| make_internal_report!("Non-root node {node} has no parent"))?;
    let parent_state = sampled_states[parent];

    model.branch_transition(node, category, transition)?;

    log_probs.clear();
    log_probs.extend(
      transition
        .row(parent_state)
        .iter()
        .zip(partials.row(node))
        .map(|(&p, &partial)| p.ln() + partial.ln()),
    );

    sampled_states[node] =
      sample_from_log_probs(log_probs, rng).wrap_err_with(|| format!("When sampling state of node {node}"))?;
  }

  Ok(())
}
