use crate::alignment::mutable_alignment::MutableAlignment;
use crate::gibbs::model::GibbsModel;
use crate::gibbs::propagate::{propagate_category, PropagationScratch};
use crate::gibbs::sampler::{check_model_and_map_leaves, SamplerLayout, ALWAYS_ACCEPT};
use crate::tree::traversal::TreeTraversal;
use crate::utils::log_probs::{log_sum_exp, normalize_log_probs_inplace, sample_cumulative};
use crate::utils::random::random_index;
use crate::{make_error, make_internal_report};
use eyre::{Report, WrapErr};
use log::{debug, info};
use ndarray::{s, Array2, Array3, Axis};
use rand::Rng;

/// Gibbs sampler of whole leaf sequences, one taxon at a time.
///
/// Where `GibbsSiteSampler` integrates over the observations of every leaf, this sampler conditions on the genotypes
/// currently held in the alignment. At every site the chosen taxon receives a state drawn from
///
/// ```text
/// P(g | current states of all other leaves) * P(observations of the taxon at the site | g)
/// ```
///
/// Sites are independent given the other leaves, so the whole sequence is drawn in one pass and written at once.
#[derive(Clone, Debug)]
pub struct GibbsSequenceSampler {
  rescale_partials: bool,
  traversal: TreeTraversal,
  node_to_taxon: Vec<Option<usize>>,
  node_to_observation: Vec<Option<usize>>,
  taxon_to_node: Vec<usize>,
  n_states: usize,
  n_sites: usize,
  partials: Array3<f64>,
  category_log_scales: Vec<f64>,
  scratch: PropagationScratch,
  /// sites x states
  conditionals: Array2<f64>,
  sequence: Vec<usize>,
}

impl GibbsSequenceSampler {
  pub fn new(model: &GibbsModel, alignment: &dyn MutableAlignment, rescale_partials: bool) -> Result<Self, Report> {
    Self::new_impl(model, alignment, rescale_partials).wrap_err("When setting up Gibbs sequence sampler")
  }

  fn new_impl(model: &GibbsModel, alignment: &dyn MutableAlignment, rescale_partials: bool) -> Result<Self, Report> {
    let traversal = TreeTraversal::new(model.tree)?;
    let n_nodes = model.tree.node_count();
    let SamplerLayout {
      n_states,
      n_categories,
      n_sites,
      node_to_taxon,
      node_to_observation,
      taxon_to_node,
    } = check_model_and_map_leaves(model, alignment, &traversal)?;

    info!(
      "Gibbs sequence sampler: {} taxa, {n_states} states, {n_categories} rate categories, {n_sites} sites",
      taxon_to_node.len()
    );

    Ok(Self {
      rescale_partials,
      traversal,
      node_to_taxon,
      node_to_observation,
      taxon_to_node,
      n_states,
      n_sites,
      partials: Array3::zeros((n_categories, n_nodes, n_states)),
      category_log_scales: vec![0.0; n_categories],
      scratch: PropagationScratch::new(n_states),
      conditionals: Array2::zeros((n_sites, n_states)),
      sequence: vec![0; n_sites],
    })
  }

  /// One proposal: resamples the whole sequence of one uniformly chosen taxon. Always returns `ALWAYS_ACCEPT`.
  pub fn proposal(
    &mut self,
    model: &GibbsModel,
    alignment: &mut dyn MutableAlignment,
    rng: &mut impl Rng,
  ) -> Result<f64, Report> {
    self.traversal.rebuild(model.tree)?;
    let taxon = random_index(self.taxon_to_node.len(), rng)?;
    debug!("Gibbs sequence proposal: resampling taxon {taxon}");
    self.sample_taxon(model, alignment, taxon, rng)?;
    Ok(ALWAYS_ACCEPT)
  }

  /// Draws a new sequence for alignment row `taxon` and writes it. Consumes one uniform draw per site.
  pub fn sample_taxon(
    &mut self,
    model: &GibbsModel,
    alignment: &mut dyn MutableAlignment,
    taxon: usize,
    rng: &mut impl Rng,
  ) -> Result<(), Report> {
    self.compute_conditionals(model, alignment, taxon)?;
    for (site, probs) in self.conditionals.outer_iter().enumerate() {
      let probs = probs
        .to_slice()
        .ok_or_else(|| make_internal_report!("Conditional probabilities of site {site} are not contiguous"))?;
      self.sequence[site] = sample_cumulative(probs, rng.gen());
    }
    alignment.set_states_for_taxon(taxon, &self.sequence)
  }

  /// Fills and returns the `sites x states` table of normalized conditional probabilities of alignment row `taxon`.
  pub fn compute_conditionals(
    &mut self,
    model: &GibbsModel,
    alignment: &dyn MutableAlignment,
    taxon: usize,
  ) -> Result<&Array2<f64>, Report> {
    let &leaf = self
      .taxon_to_node
      .get(taxon)
      .ok_or_else(|| make_internal_report!("Taxon {taxon} is out of range"))?;
    let name = model.tree.name(leaf).unwrap_or_default().to_owned();
    self
      .compute_conditionals_impl(model, alignment, leaf)
      .wrap_err_with(|| format!("When sampling sequence of taxon '{name}' (node {leaf})"))?;
    Ok(&self.conditionals)
  }

  fn compute_conditionals_impl(
    &mut self,
    model: &GibbsModel,
    alignment: &dyn MutableAlignment,
    leaf: usize,
  ) -> Result<(), Report> {
    let observation = self.node_to_observation[leaf]
      .ok_or_else(|| make_internal_report!("Leaf node {leaf} has no associated observations"))?;

    for site in 0..self.n_sites {
      self
        .tree_log_likelihoods(model, alignment, leaf, site)
        .wrap_err_with(|| format!("When computing tree likelihood at site {site}"))?;
    }

    for state in 0..self.n_states {
      let constant = vec![state; self.n_sites];
      let observed = model.leaf_likelihood.sequence_log_likelihood(observation, &constant)?;
      for (site, ll) in observed.into_iter().enumerate() {
        if ll.is_nan() || ll == f64::INFINITY {
          return make_error!("Log-likelihood of genotype {state} at site {site} is not a valid number: {ll}");
        }
        self.conditionals[[site, state]] += ll;
      }
    }

    for (site, mut row) in self.conditionals.outer_iter_mut().enumerate() {
      let row = row
        .as_slice_mut()
        .ok_or_else(|| make_internal_report!("Conditional probabilities of site {site} are not contiguous"))?;
      normalize_log_probs_inplace(row).wrap_err_with(|| format!("When normalizing genotype weights at site {site}"))?;
    }
    Ok(())
  }

  /// Writes `ln P(leaf = g, all other leaves as in the alignment)` into row `site` of the conditionals, for every `g`.
  /// Every other leaf is fixed to its current state, so its partial is an indicator vector.
  fn tree_log_likelihoods(
    &mut self,
    model: &GibbsModel,
    alignment: &dyn MutableAlignment,
    leaf: usize,
    site: usize,
  ) -> Result<(), Report> {
    let Self {
      rescale_partials,
      traversal,
      node_to_taxon,
      n_states,
      partials,
      category_log_scales,
      scratch,
      conditionals,
      ..
    } = self;
    let traversal: &TreeTraversal = traversal;
    let n_states = *n_states;

    for &other in traversal.leaves() {
      if other == leaf {
        continue;
      }
      let taxon = node_to_taxon[other]
        .ok_or_else(|| make_internal_report!("Leaf node {other} appeared after setup and has no taxon"))?;
      let state = alignment.state_at(taxon, site)?;
      if state >= n_states {
        return make_error!("Alignment holds state {state} for taxon {taxon}, but only {n_states} states are allowed");
      }
      set_indicator(partials, other, state);
    }

    let root = model.tree.root();
    let pi = model.substitution_model.stationary_frequencies();
    let proportions = model.site_model.category_proportions(root);
    let mut log_weights = vec![0.0; proportions.len()];

    for state in 0..n_states {
      set_indicator(partials, leaf, state);

      for (category, (partials, log_scale)) in partials
        .axis_iter_mut(Axis(0))
        .zip(category_log_scales.iter_mut())
        .enumerate()
      {
        *log_scale = propagate_category(model, traversal, category, *rescale_partials, scratch, partials)?;
      }

      for (category, log_weight) in log_weights.iter_mut().enumerate() {
        let marginal = pi.dot(&partials.slice(s![category, root, ..]));
        *log_weight = proportions[category].ln() + marginal.ln() + category_log_scales[category];
      }
      conditionals[[site, state]] = log_sum_exp(&log_weights);
    }
    Ok(())
  }
}

/// Sets the row of `node` to the indicator of `state` in every category slice.
fn set_indicator(partials: &mut Array3<f64>, node: usize, state: usize) {
  let mut rows = partials.slice_mut(s![.., node, ..]);
  rows.fill(0.0);
  rows.column_mut(state).fill(1.0);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gibbs::test_utils::{brute_force_leaf_posterior, two_state_fixture, Fixture};
  use crate::tree::rooted_tree::RootedTree;
  use crate::utils::error::report_to_string;
  use crate::utils::random::get_random_number_generator;
  use approx::assert_abs_diff_eq;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  const TREE_3: &str = "((A:1,B:1):1,C:2);";

  /// Copy of the fixture where every leaf except `target` has all of its likelihood on the state it holds in
  /// `states`. The exact leaf posterior of `target` under this copy is the conditional drawn by the sequence sampler.
  fn pinned(fixture: &Fixture, target: usize, states: &Array2<usize>) -> Fixture {
    let mut pinned = Fixture {
      tree: fixture.tree.clone(),
      site_model: fixture.site_model.clone(),
      substitution_model: fixture.substitution_model.clone(),
      likelihood: fixture.likelihood.clone(),
    };
    for ((taxon, site), &state) in states.indexed_iter() {
      if taxon == target {
        continue;
      }
      for g in 0..2 {
        pinned.likelihood.log_lh[[taxon, site, g]] = if g == state { 0.0 } else { f64::NEG_INFINITY };
      }
    }
    pinned
  }

  fn informative_fixture(rates: &[f64]) -> Result<Fixture, Report> {
    let mut fixture = two_state_fixture(TREE_3, 3, rates)?;
    let log_lh = &mut fixture.likelihood.log_lh;
    log_lh[[0, 0, 0]] = 0.9_f64.ln();
    log_lh[[0, 0, 1]] = 0.1_f64.ln();
    log_lh[[0, 2, 0]] = 0.2_f64.ln();
    log_lh[[0, 2, 1]] = 0.8_f64.ln();
    Ok(fixture)
  }

  #[rstest]
  #[case::single_category_unscaled(&[1.0], false)]
  #[case::single_category_rescaled(&[1.0], true)]
  #[case::two_categories_rescaled(&[0.3, 1.7], true)]
  fn conditionals_match_exact_posterior(#[case] rates: &[f64], #[case] rescale: bool) -> Result<(), Report> {
    let fixture = informative_fixture(rates)?;
    let model = fixture.model();
    let a = fixture.leaf("A");
    let mut alignment = fixture.alignment();
    // B and C per site: (0, 1), (1, 1), (0, 0)
    alignment.states = ndarray::array![[0, 0, 0], [0, 1, 0], [1, 1, 0]];
    let taxon = alignment.taxon_index("A").unwrap();
    let mut sampler = GibbsSequenceSampler::new(&model, &alignment, rescale)?;

    let conditionals = sampler.compute_conditionals(&model, &alignment, taxon)?.clone();

    let exact = pinned(&fixture, taxon, &alignment.states);
    for site in 0..3 {
      let posterior = brute_force_leaf_posterior(&exact.model(), site, &[a])?;
      for state in 0..2 {
        assert_abs_diff_eq!(conditionals[[site, state]], posterior[&vec![state]], epsilon = 1e-12);
      }
    }
    Ok(())
  }

  #[rstest]
  fn draws_follow_conditionals() -> Result<(), Report> {
    let fixture = informative_fixture(&[1.0])?;
    let model = fixture.model();
    let mut alignment = fixture.alignment();
    alignment.states = ndarray::array![[0, 0, 0], [0, 1, 0], [1, 1, 0]];
    let taxon = alignment.taxon_index("A").unwrap();
    let mut sampler = GibbsSequenceSampler::new(&model, &alignment, true)?;
    let expected = sampler.compute_conditionals(&model, &alignment, taxon)?.clone();
    let mut rng = get_random_number_generator(Some(5));

    let n = 40_000;
    let mut ones = [0_usize; 3];
    for _ in 0..n {
      sampler.sample_taxon(&model, &mut alignment, taxon, &mut rng)?;
      for (site, count) in ones.iter_mut().enumerate() {
        *count += alignment.states[[taxon, site]];
      }
    }

    for site in 0..3 {
      assert_abs_diff_eq!(ones[site] as f64 / n as f64, expected[[site, 1]], epsilon = 0.01);
    }
    Ok(())
  }

  #[rstest]
  fn rewrites_only_the_chosen_taxon() -> Result<(), Report> {
    let fixture = two_state_fixture(TREE_3, 4, &[1.0])?;
    let model = fixture.model();
    let mut alignment = fixture.alignment();
    let mut sampler = GibbsSequenceSampler::new(&model, &alignment, true)?;
    let mut rng = get_random_number_generator(Some(3));

    let acceptance = sampler.proposal(&model, &mut alignment, &mut rng)?;

    assert_eq!(acceptance, ALWAYS_ACCEPT);
    let written = alignment.writes.sum_axis(Axis(1)).to_vec();
    assert_eq!(written.iter().filter(|&&w| w == 4).count(), 1);
    assert_eq!(written.iter().filter(|&&w| w == 0).count(), 2);
    Ok(())
  }

  #[rstest]
  fn closer_leaf_is_copied_more_often() -> Result<(), Report> {
    let fixture = two_state_fixture(TREE_3, 1, &[1.0])?;
    let model = fixture.model();
    let mut alignment = fixture.alignment();
    let (a, b, c) = (
      alignment.taxon_index("A").unwrap(),
      alignment.taxon_index("B").unwrap(),
      alignment.taxon_index("C").unwrap(),
    );
    alignment.states[[b, 0]] = 0;
    alignment.states[[c, 0]] = 1;
    let mut sampler = GibbsSequenceSampler::new(&model, &alignment, true)?;

    let conditionals = sampler.compute_conditionals(&model, &alignment, a)?;

    assert!(conditionals[[0, 0]] > conditionals[[0, 1]]);
    assert_abs_diff_eq!(conditionals[[0, 0]] + conditionals[[0, 1]], 1.0, epsilon = 1e-12);
    Ok(())
  }

  #[rstest]
  fn reports_impossible_observations() -> Result<(), Report> {
    let mut fixture = two_state_fixture(TREE_3, 2, &[1.0])?;
    fixture.likelihood.log_lh[[0, 1, 0]] = f64::NEG_INFINITY;
    fixture.likelihood.log_lh[[0, 1, 1]] = f64::NEG_INFINITY;
    let model = fixture.model();
    let mut alignment = fixture.alignment();
    let mut sampler = GibbsSequenceSampler::new(&model, &alignment, true)?;
    let mut rng = get_random_number_generator(Some(1));

    let err = sampler.sample_taxon(&model, &mut alignment, 0, &mut rng).unwrap_err();

    let msg = report_to_string(&err);
    assert!(msg.contains("site 1"), "{msg}");
    assert!(msg.contains("zero probability"), "{msg}");
    assert_eq!(alignment.writes.sum(), 0);
    Ok(())
  }

  #[rstest]
  fn rejects_leaf_missing_from_alignment() -> Result<(), Report> {
    let fixture = two_state_fixture(TREE_3, 1, &[1.0])?;
    let mut alignment = fixture.alignment();
    alignment.taxa[2] = "X".to_owned();
    let err = GibbsSequenceSampler::new(&fixture.model(), &alignment, true).unwrap_err();
    let msg = report_to_string(&err);
    assert!(msg.contains("When setting up Gibbs sequence sampler"), "{msg}");
    assert!(msg.contains("Leaf 'C'"), "{msg}");
    Ok(())
  }
}
