use crate::gibbs::model::GibbsModel;
use crate::models::leaf_likelihood::LeafLikelihood;
use crate::{make_error, make_internal_report};
use eyre::{Report, WrapErr};
use ndarray::{s, Array3, ArrayViewMut1, Axis};

/// Writes `out[g] = P(observations of taxon at site | g)` for every genotype `g`.
///
/// With `rescale`, the vector is divided by its largest entry and the natural log of that entry is returned, so that
/// leaves whose likelihoods are all below the smallest representable double still carry their relative weights.
/// Without rescaling the return value is 0.
pub fn compute_leaf_partial(
  leaf_likelihood: &dyn LeafLikelihood,
  taxon: usize,
  site: usize,
  rescale: bool,
  mut out: ArrayViewMut1<f64>,
) -> Result<f64, Report> {
  for (state, x) in out.iter_mut().enumerate() {
    let ll = leaf_likelihood.log_likelihood(state, taxon, site)?;
    if ll.is_nan() || ll == f64::INFINITY {
      return make_error!("Log-likelihood of genotype {state} is not a valid number: {ll}");
    }
    *x = ll;
  }

  if !rescale {
    out.mapv_inplace(f64::exp);
    return Ok(0.0);
  }

  let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  if max == f64::NEG_INFINITY {
    return make_error!("Observations are impossible under every genotype");
  }
  out.mapv_inplace(|ll| (ll - max).exp());
  Ok(max)
}

/// Fills the leaf rows of every category slice of `partials` (shape: categories x nodes x states). Leaf likelihoods do
/// not depend on the rate category, so they are computed once into category 0 and copied.
///
/// Returns the sum of leaf log-scale factors.
pub fn fill_leaf_partials(
  model: &GibbsModel,
  leaves: &[usize],
  node_to_observation: &[Option<usize>],
  site: usize,
  rescale: bool,
  partials: &mut Array3<f64>,
) -> Result<f64, Report> {
  let (mut first, mut rest) = partials.view_mut().split_at(Axis(0), 1);
  let mut log_scale = 0.0;

  for &leaf in leaves {
    let taxon = node_to_observation
      .get(leaf)
      .copied()
      .flatten()
      .ok_or_else(|| make_internal_report!("Leaf node {leaf} has no associated observations"))?;

    log_scale += compute_leaf_partial(
      model.leaf_likelihood,
      taxon,
      site,
      rescale,
      first.slice_mut(s![0, leaf, ..]),
    )
    .wrap_err_with(|| {
      let name = model.tree.name(leaf).unwrap_or_default();
      format!("When computing likelihood of taxon '{name}' (node {leaf}) at site {site}")
    })?;

    let leaf_partial = first.slice(s![0, leaf, ..]);
    for mut category in rest.outer_iter_mut() {
      category.row_mut(leaf).assign(&leaf_partial);
    }
  }

  Ok(log_scale)
}
