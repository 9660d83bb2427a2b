use crate::gibbs::model::GibbsModel;
use crate::utils::log_probs::sample_from_log_probs;
use eyre::{Report, WrapErr};
use log::warn;
use ndarray::Array3;
use rand::Rng;

/// Jointly draws the rate category and the root state at one site.
///
/// The category is drawn with probability proportional to `proportion[c] * sum_g pi[g] * L_c(root, g)`, where
/// `L_c` is recovered from the (possibly rescaled) `partials` and `category_log_scales`. The root state is then drawn
/// within that category, proportional to `pi[g] * L_c(root, g)`, and stored in `sampled_states`.
///
/// Consumes exactly two uniform draws. Returns the category.
pub fn sample_category_and_root(
  model: &GibbsModel,
  partials: &Array3<f64>,
  category_log_scales: &[f64],
  log_probs: &mut Vec<f64>,
  sampled_states: &mut [usize],
  rng: &mut impl Rng,
) -> Result<usize, Report> {
  let root = model.tree.root();
  let pi = model.substitution_model.stationary_frequencies();
  let proportions = model.site_model.category_proportions(root);

  log_probs.clear();
  for (category, (&proportion, &log_scale)) in proportions.iter().zip(category_log_scales).enumerate() {
    let root_partial = partials.slice(ndarray::s![category, root, ..]);
    let marginal = pi.dot(&root_partial);
    log_probs.push(proportion.ln() + marginal.ln() + log_scale);
  }

  if log_probs.len() > 1 {
    let n_vanished = log_probs.iter().filter(|&&lp| lp == f64::NEG_INFINITY).count();
    if n_vanished > 0 && n_vanished < log_probs.len() {
      warn!("{n_vanished} of {} rate categories have zero likelihood", log_probs.len());
    }
  }

  let category = sample_from_log_probs(log_probs, rng).wrap_err("When sampling rate category")?;

  log_probs.clear();
  log_probs.extend(
    pi.iter()
      .zip(partials.slice(ndarray::s![category, root, ..]))
      .map(|(&freq, &partial)| freq.ln() + partial.ln()),
  );
  sampled_states[root] =
    sample_from_log_probs(log_probs, rng).wrap_err_with(|| format!("When sampling state of root node {root}"))?;

  Ok(category)
}
