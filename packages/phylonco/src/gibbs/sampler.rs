use crate::alignment::mutable_alignment::MutableAlignment;
use crate::gibbs::descendants::sample_descendants;
use crate::gibbs::leaf_partials::fill_leaf_partials;
use crate::gibbs::model::GibbsModel;
use crate::gibbs::propagate::{propagate_category, PropagationScratch};
use crate::gibbs::root_sampler::sample_category_and_root;
use crate::tree::traversal::TreeTraversal;
use crate::utils::random::random_index;
use crate::{make_error, make_internal_error, make_internal_report, make_report};
use eyre::{Report, WrapErr};
use log::{debug, info, trace};
use ndarray::parallel::prelude::*;
use ndarray::{Array3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Returned from every proposal: a Gibbs update draws from the exact conditional and is never rejected.
pub const ALWAYS_ACCEPT: f64 = f64::INFINITY;

const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct GibbsSiteSamplerParams {
  /// Resample every site in one proposal, instead of one uniformly chosen site
  pub sample_all_sites: bool,

  /// Rescale partial likelihoods at every node to avoid underflow on deep trees
  #[default = true]
  pub rescale_partials: bool,

  /// Run the pruning pass of each rate category on the rayon thread pool
  pub parallel_categories: bool,
}

/// Site-wise Gibbs sampler of leaf genotypes.
///
/// For one site, computes partial likelihoods bottom-up under every rate category, draws a category and the root state
/// from their joint posterior, then draws every other node top-down, and finally writes the leaf states into the
/// alignment. All working memory is allocated once, in `new()`, and reused. An instance must not be shared between
/// concurrent proposals.
#[derive(Clone, Debug)]
pub struct GibbsSiteSampler {
  params: GibbsSiteSamplerParams,
  traversal: TreeTraversal,
  node_to_taxon: Vec<Option<usize>>,
  node_to_observation: Vec<Option<usize>>,
  n_sites: usize,
  partials: Array3<f64>,
  category_log_scales: Vec<f64>,
  scratch: Vec<PropagationScratch>,
  sampled_states: Vec<usize>,
  leaf_states: Vec<usize>,
  log_probs: Vec<f64>,
}

impl GibbsSiteSampler {
  pub fn new(
    model: &GibbsModel,
    alignment: &dyn MutableAlignment,
    params: GibbsSiteSamplerParams,
  ) -> Result<Self, Report> {
    Self::new_impl(model, alignment, params).wrap_err("When setting up Gibbs site sampler")
  }

  fn new_impl(
    model: &GibbsModel,
    alignment: &dyn MutableAlignment,
    params: GibbsSiteSamplerParams,
  ) -> Result<Self, Report> {
    let traversal = TreeTraversal::new(model.tree)?;
    let n_nodes = model.tree.node_count();
    let SamplerLayout {
      n_states,
      n_categories,
      n_sites,
      node_to_taxon,
      node_to_observation,
      ..
    } = check_model_and_map_leaves(model, alignment, &traversal)?;
    let n_taxa = alignment.taxon_count();

    info!(
      "Gibbs site sampler: {n_nodes} nodes, {} leaves, {n_states} states, {n_categories} rate categories, {n_sites} sites",
      traversal.leaves().len()
    );

    let n_lanes = if params.parallel_categories { n_categories } else { 1 };

    Ok(Self {
      params,
      traversal,
      node_to_taxon,
      node_to_observation,
      n_sites,
      partials: Array3::zeros((n_categories, n_nodes, n_states)),
      category_log_scales: vec![0.0; n_categories],
      scratch: vec![PropagationScratch::new(n_states); n_lanes],
      sampled_states: vec![0; n_nodes],
      leaf_states: vec![0; n_taxa],
      log_probs: Vec::with_capacity(n_states.max(n_categories)),
    })
  }

  pub const fn params(&self) -> &GibbsSiteSamplerParams {
    &self.params
  }

  /// States of every node drawn at the most recently sampled site, indexed by node.
  pub fn sampled_states(&self) -> &[usize] {
    &self.sampled_states
  }

  /// One proposal: resamples one random site, or every site, depending on `sample_all_sites`. The tree topology is
  /// revalidated first, since it may have been changed by other operators. Always returns `ALWAYS_ACCEPT`.
  pub fn proposal(
    &mut self,
    model: &GibbsModel,
    alignment: &mut dyn MutableAlignment,
    rng: &mut impl Rng,
  ) -> Result<f64, Report> {
    self.traversal.rebuild(model.tree)?;

    if self.params.sample_all_sites {
      debug!("Gibbs proposal: resampling all {} sites", self.n_sites);
      for site in 0..self.n_sites {
        self.sample_site(model, alignment, site, rng)?;
      }
    } else {
      let site = random_index(self.n_sites, rng)?;
      debug!("Gibbs proposal: resampling site {site}");
      self.sample_site(model, alignment, site, rng)?;
    }

    Ok(ALWAYS_ACCEPT)
  }

  /// Resamples the genotypes of all leaves at `site` and writes them into `alignment`.
  pub fn sample_site(
    &mut self,
    model: &GibbsModel,
    alignment: &mut dyn MutableAlignment,
    site: usize,
    rng: &mut impl Rng,
  ) -> Result<(), Report> {
    if site >= self.n_sites {
      return make_internal_error!("Site {site} is out of range: alignment has {} sites", self.n_sites);
    }
    self
      .sample_site_impl(model, alignment, site, rng)
      .wrap_err_with(|| format!("When sampling genotypes at site {site}"))
  }

  fn sample_site_impl(
    &mut self,
    model: &GibbsModel,
    alignment: &mut dyn MutableAlignment,
    site: usize,
    rng: &mut impl Rng,
  ) -> Result<(), Report> {
    let rescale = self.params.rescale_partials;

    let leaf_log_scale = fill_leaf_partials(
      model,
      self.traversal.leaves(),
      &self.node_to_observation,
      site,
      rescale,
      &mut self.partials,
    )?;

    self.propagate(model, leaf_log_scale)?;

    let category = sample_category_and_root(
      model,
      &self.partials,
      &self.category_log_scales,
      &mut self.log_probs,
      &mut self.sampled_states,
      rng,
    )?;
    trace!(
      "Site {site}: rate category {category}, root state {}",
      self.sampled_states[model.tree.root()]
    );

    sample_descendants(
      model,
      &self.traversal,
      category,
      self.partials.index_axis(Axis(0), category),
      &mut self.scratch[0].transition,
      &mut self.log_probs,
      &mut self.sampled_states,
      rng,
    )?;

    for &leaf in self.traversal.leaves() {
      let taxon = self.node_to_taxon[leaf]
        .ok_or_else(|| make_internal_report!("Leaf node {leaf} appeared after setup and has no taxon"))?;
      self.leaf_states[taxon] = self.sampled_states[leaf];
    }
    alignment.set_states_for_site(site, &self.leaf_states)
  }

  /// Pruning pass under every rate category. Categories write disjoint slices of the partials table, so they can run
  /// in parallel, each with its own scratch buffers. No randomness is consumed here.
  fn propagate(&mut self, model: &GibbsModel, leaf_log_scale: f64) -> Result<(), Report> {
    let Self {
      params,
      traversal,
      partials,
      category_log_scales,
      scratch,
      ..
    } = self;
    let traversal: &TreeTraversal = traversal;
    let rescale = params.rescale_partials;

    if params.parallel_categories && scratch.len() > 1 {
      partials
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(category_log_scales.par_iter_mut())
        .zip(scratch.par_iter_mut())
        .enumerate()
        .try_for_each(|(category, ((partials, log_scale), scratch))| -> Result<(), Report> {
          *log_scale = leaf_log_scale + propagate_category(model, traversal, category, rescale, scratch, partials)?;
          Ok(())
        })
    } else {
      let scratch = &mut scratch[0];
      for (category, (partials, log_scale)) in partials
        .axis_iter_mut(Axis(0))
        .zip(category_log_scales.iter_mut())
        .enumerate()
      {
        *log_scale = leaf_log_scale + propagate_category(model, traversal, category, rescale, scratch, partials)?;
      }
      Ok(())
    }
  }
}

/// Sizes and leaf mappings shared by the samplers.
pub(crate) struct SamplerLayout {
  pub n_states: usize,
  pub n_categories: usize,
  pub n_sites: usize,
  /// Alignment row of each leaf node
  pub node_to_taxon: Vec<Option<usize>>,
  /// Observation row of each leaf node
  pub node_to_observation: Vec<Option<usize>>,
  /// Leaf node of each alignment row
  pub taxon_to_node: Vec<usize>,
}

/// Checks that the models, the observations and the alignment agree in their dimensions, and matches every leaf of
/// the tree to exactly one alignment taxon and one observed taxon, by name.
pub(crate) fn check_model_and_map_leaves(
  model: &GibbsModel,
  alignment: &dyn MutableAlignment,
  traversal: &TreeTraversal,
) -> Result<SamplerLayout, Report> {
  let root = model.tree.root();
  let n_states = model.substitution_model.state_count();
  if alignment.state_count() != n_states {
    return make_error!(
      "Alignment has {} states, but the substitution model has {n_states}",
      alignment.state_count()
    );
  }
  if model.leaf_likelihood.state_count() != n_states {
    return make_error!(
      "Leaf likelihood is defined over {} states, but the substitution model has {n_states}",
      model.leaf_likelihood.state_count()
    );
  }

  let pi = model.substitution_model.stationary_frequencies();
  if pi.len() != n_states {
    return make_error!("Expected {n_states} stationary frequencies, but got {}", pi.len());
  }
  if pi.iter().any(|&f| !(f.is_finite() && f >= 0.0)) || (pi.sum() - 1.0).abs() > SUM_TOLERANCE {
    return make_error!("Stationary frequencies must be non-negative and sum to 1, but got {pi}");
  }

  let n_categories = model.site_model.category_count();
  let proportions = model.site_model.category_proportions(root);
  if n_categories == 0 || proportions.len() != n_categories {
    return make_error!(
      "Site model has {n_categories} categories, but {} category proportions",
      proportions.len()
    );
  }
  if proportions.iter().any(|&p| !(p.is_finite() && p > 0.0)) {
    return make_error!("Category proportions must be positive, but got {proportions:?}");
  }
  let proportions_sum: f64 = proportions.iter().sum();
  if (proportions_sum - 1.0).abs() > SUM_TOLERANCE {
    return make_error!("Category proportions must sum to 1, but they sum to {proportions_sum}");
  }

  let n_sites = alignment.site_count();
  if n_sites == 0 {
    return make_error!("Alignment has no sites");
  }
  if model.leaf_likelihood.site_count() != n_sites {
    return make_error!(
      "Alignment has {n_sites} sites, but observations are available for {} sites",
      model.leaf_likelihood.site_count()
    );
  }

  let n_taxa = alignment.taxon_count();
  let n_nodes = model.tree.node_count();
  let mut node_to_taxon = vec![None; n_nodes];
  let mut node_to_observation = vec![None; n_nodes];
  let mut taxon_to_node: Vec<Option<usize>> = vec![None; n_taxa];
  for &leaf in traversal.leaves() {
    let name = model
      .tree
      .name(leaf)
      .ok_or_else(|| make_internal_report!("Leaf node {leaf} has no name"))?;
    let taxon = alignment
      .taxon_index(name)
      .ok_or_else(|| make_report!("Leaf '{name}' (node {leaf}) has no corresponding taxon in the alignment"))?;
    let observation = model
      .leaf_likelihood
      .taxon_index(name)
      .ok_or_else(|| make_report!("Leaf '{name}' (node {leaf}) has no corresponding taxon in the observations"))?;
    if let Some(other) = taxon_to_node[taxon] {
      return make_error!("Leaves {other} and {leaf} both correspond to alignment taxon '{name}'");
    }
    taxon_to_node[taxon] = Some(leaf);
    node_to_taxon[leaf] = Some(taxon);
    node_to_observation[leaf] = Some(observation);
  }
  if let Some(taxon) = taxon_to_node.iter().position(Option::is_none) {
    return make_error!(
      "Alignment taxon {taxon} does not correspond to any leaf of the tree ({} leaves, {n_taxa} taxa)",
      traversal.leaves().len()
    );
  }

  Ok(SamplerLayout {
    n_states,
    n_categories,
    n_sites,
    node_to_taxon,
    node_to_observation,
    taxon_to_node: taxon_to_node.into_iter().flatten().collect(),
  })
}
