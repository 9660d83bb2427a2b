//! Fixtures shared by the sampler tests: table-driven leaf likelihoods, a write-counting alignment and brute-force
//! enumeration of the exact leaf posterior.

use crate::alignment::mutable_alignment::MutableAlignment;
use crate::gibbs::model::GibbsModel;
use crate::io::nwk::tree_from_nwk_str;
use crate::models::leaf_likelihood::LeafLikelihood;
use crate::models::site_model::{SiteModel, SiteRates};
use crate::models::substitution::{JukesCantor, SubstitutionModel};
use crate::tree::indexed_tree::IndexedTree;
use crate::tree::rooted_tree::RootedTree;
use crate::make_error;
use eyre::Report;
use itertools::Itertools;
use ndarray::{Array2, Array3};
use std::collections::BTreeMap;

/// Log-likelihoods given explicitly per (taxon, site, state).
#[derive(Clone, Debug)]
pub struct TableLikelihood {
  pub taxa: Vec<String>,
  pub log_lh: Array3<f64>,
}

impl TableLikelihood {
  pub fn new(taxa: &[&str], log_lh: Array3<f64>) -> Self {
    Self {
      taxa: taxa.iter().map(|&t| t.to_owned()).collect(),
      log_lh,
    }
  }

  pub fn uninformative(taxa: &[&str], n_sites: usize, n_states: usize) -> Self {
    Self::new(taxa, Array3::zeros((taxa.len(), n_sites, n_states)))
  }
}

impl LeafLikelihood for TableLikelihood {
  fn log_likelihood(&self, state: usize, taxon: usize, site: usize) -> Result<f64, Report> {
    Ok(self.log_lh[[taxon, site, state]])
  }

  fn taxon_index(&self, name: &str) -> Option<usize> {
    self.taxa.iter().position(|t| t == name)
  }

  fn state_count(&self) -> usize {
    self.log_lh.dim().2
  }

  fn site_count(&self) -> usize {
    self.log_lh.dim().1
  }
}

/// Alignment which counts how many times each cell was written.
#[derive(Clone, Debug)]
pub struct RecordingAlignment {
  pub taxa: Vec<String>,
  pub states: Array2<usize>,
  pub writes: Array2<usize>,
  pub n_states: usize,
}

impl RecordingAlignment {
  pub fn new(taxa: &[String], n_sites: usize, n_states: usize) -> Self {
    Self {
      taxa: taxa.to_vec(),
      states: Array2::zeros((taxa.len(), n_sites)),
      writes: Array2::zeros((taxa.len(), n_sites)),
      n_states,
    }
  }
}

impl MutableAlignment for RecordingAlignment {
  fn taxon_count(&self) -> usize {
    self.taxa.len()
  }

  fn site_count(&self) -> usize {
    self.states.ncols()
  }

  fn state_count(&self) -> usize {
    self.n_states
  }

  fn taxon_index(&self, name: &str) -> Option<usize> {
    self.taxa.iter().position(|t| t == name)
  }

  fn state_at(&self, taxon: usize, site: usize) -> Result<usize, Report> {
    Ok(self.states[[taxon, site]])
  }

  fn set_state(&mut self, taxon: usize, site: usize, state: usize) -> Result<(), Report> {
    if state >= self.n_states {
      return make_error!("State {state} out of range");
    }
    self.states[[taxon, site]] = state;
    self.writes[[taxon, site]] += 1;
    Ok(())
  }

  fn set_states_for_site(&mut self, site: usize, states: &[usize]) -> Result<(), Report> {
    for (taxon, &state) in states.iter().enumerate() {
      self.set_state(taxon, site, state)?;
    }
    Ok(())
  }
}

/// Symmetric two-state model which stays in its state with probability 0.9 over one unit of time.
pub fn stay_point_nine() -> JukesCantor {
  JukesCantor::new(2, -(0.8_f64.ln()) / 2.0).unwrap()
}

pub struct Fixture {
  pub tree: IndexedTree,
  pub site_model: SiteRates,
  pub substitution_model: JukesCantor,
  pub likelihood: TableLikelihood,
}

impl Fixture {
  pub fn model(&self) -> GibbsModel<'_> {
    GibbsModel {
      tree: &self.tree,
      site_model: &self.site_model,
      substitution_model: &self.substitution_model,
      branch_rates: None,
      leaf_likelihood: &self.likelihood,
    }
  }

  pub fn taxa(&self) -> Vec<String> {
    self.likelihood.taxa.clone()
  }

  pub fn alignment(&self) -> RecordingAlignment {
    RecordingAlignment::new(&self.likelihood.taxa, self.likelihood.site_count(), 2)
  }

  pub fn node_to_observation(&self) -> Vec<Option<usize>> {
    (0..self.tree.node_count())
      .map(|node| self.tree.name(node).and_then(|name| self.likelihood.taxon_index(name)))
      .collect()
  }

  pub fn leaf(&self, name: &str) -> usize {
    self.tree.find_by_name(name).unwrap()
  }
}

/// Tree from Newick, the 0.9-stay two-state model, equally weighted categories with the given `rates` and
/// uninformative leaves.
pub fn two_state_fixture(nwk: &str, n_sites: usize, rates: &[f64]) -> Result<Fixture, Report> {
  let tree = tree_from_nwk_str(nwk)?;
  let taxa = tree.leaf_names();
  let likelihood = TableLikelihood::uninformative(&taxa, n_sites, 2);
  let n = rates.len();
  let site_model = SiteRates::new(rates.to_vec(), vec![1.0 / n as f64; n])?;
  Ok(Fixture {
    tree,
    site_model,
    substitution_model: stay_point_nine(),
    likelihood,
  })
}

/// Exact posterior of the leaf states at `site`, by summing over every assignment of states to all nodes and every
/// rate category. Keys list the states of `leaves` in the given order.
pub fn brute_force_leaf_posterior(
  model: &GibbsModel,
  site: usize,
  leaves: &[usize],
) -> Result<BTreeMap<Vec<usize>, f64>, Report> {
  let tree = model.tree;
  let n_nodes = tree.node_count();
  let n_states = model.substitution_model.state_count();
  let root = tree.root();
  let pi = model.substitution_model.stationary_frequencies();
  let proportions = model.site_model.category_proportions(root);

  let mut matrices = vec![];
  for category in 0..model.site_model.category_count() {
    let mut per_node = vec![Array2::<f64>::zeros((n_states, n_states)); n_nodes];
    for (node, matrix) in per_node.iter_mut().enumerate() {
      if node != root {
        model.branch_transition(node, category, matrix)?;
      }
    }
    matrices.push(per_node);
  }

  let mut posterior = BTreeMap::new();
  let mut total = 0.0;
  for states in (0..n_nodes).map(|_| 0..n_states).multi_cartesian_product() {
    let mut leaf_lh = 1.0;
    for node in (0..n_nodes).filter(|&node| tree.is_leaf(node)) {
      let taxon = model.leaf_likelihood.taxon_index(tree.name(node).unwrap()).unwrap();
      leaf_lh *= model.leaf_likelihood.log_likelihood(states[node], taxon, site)?.exp();
    }

    let mut weight = 0.0;
    for (category, per_node) in matrices.iter().enumerate() {
      let mut w = proportions[category] * pi[states[root]];
      for node in (0..n_nodes).filter(|&node| node != root) {
        let parent = tree.parent(node).unwrap();
        w *= per_node[node][[states[parent], states[node]]];
      }
      weight += w;
    }
    weight *= leaf_lh;

    let key = leaves.iter().map(|&leaf| states[leaf]).collect_vec();
    *posterior.entry(key).or_insert(0.0) += weight;
    total += weight;
  }

  for p in posterior.values_mut() {
    *p /= total;
  }
  Ok(posterior)
}
