use crate::alignment::mutable_alignment::MutableAlignment;
use crate::{make_error, make_report};
use eyre::Report;
use itertools::Itertools;
use ndarray::{Array2, ArrayView1};

/// Dense genotype matrix with taxon names. Tracks which taxa were modified since the last `clear_dirty()`, so that
/// consumers can recompute per-taxon quantities only where needed.
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeAlignment {
  taxa: Vec<String>,
  states: Array2<usize>,
  n_states: usize,
  dirty: Vec<bool>,
}

impl GenotypeAlignment {
  pub fn new(taxa: Vec<String>, n_sites: usize, n_states: usize) -> Result<Self, Report> {
    if n_states == 0 {
      return make_error!("Genotype alignment requires at least one state");
    }
    if let Some(dup) = taxa.iter().duplicates().next() {
      return make_error!("Taxon name '{dup}' appears more than once in the alignment");
    }
    let n_taxa = taxa.len();
    Ok(Self {
      taxa,
      states: Array2::zeros((n_taxa, n_sites)),
      n_states,
      dirty: vec![false; n_taxa],
    })
  }

  pub fn from_states(taxa: Vec<String>, states: Array2<usize>, n_states: usize) -> Result<Self, Report> {
    let (n_taxa, n_sites) = states.dim();
    if taxa.len() != n_taxa {
      return make_error!("Alignment has {n_taxa} rows, but {} taxon names", taxa.len());
    }
    if let Some(state) = states.iter().find(|&&s| s >= n_states) {
      return make_error!("Alignment contains state {state}, but only {n_states} states are allowed");
    }
    let mut alignment = Self::new(taxa, n_sites, n_states)?;
    alignment.states = states;
    Ok(alignment)
  }

  pub fn taxa(&self) -> &[String] {
    &self.taxa
  }

  pub fn state(&self, taxon: usize, site: usize) -> usize {
    self.states[[taxon, site]]
  }

  pub fn sequence(&self, taxon: usize) -> ArrayView1<usize> {
    self.states.row(taxon)
  }

  pub fn states(&self) -> &Array2<usize> {
    &self.states
  }

  pub fn dirty_taxa(&self) -> Vec<usize> {
    self.dirty.iter().positions(|&d| d).collect_vec()
  }

  pub fn clear_dirty(&mut self) {
    self.dirty.fill(false);
  }

  fn check_bounds(&self, taxon: usize, site: usize, state: usize) -> Result<(), Report> {
    let (n_taxa, n_sites) = self.states.dim();
    if taxon >= n_taxa || site >= n_sites {
      return make_error!("Cell (taxon {taxon}, site {site}) is outside of the {n_taxa} x {n_sites} alignment");
    }
    if state >= self.n_states {
      return make_error!("State {state} is out of range: alignment has {} states", self.n_states);
    }
    Ok(())
  }
}

impl MutableAlignment for GenotypeAlignment {
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
    self
      .states
      .get([taxon, site])
      .copied()
      .ok_or_else(|| make_report!("Cell (taxon {taxon}, site {site}) is outside of the alignment"))
  }

  fn set_state(&mut self, taxon: usize, site: usize, state: usize) -> Result<(), Report> {
    self.check_bounds(taxon, site, state)?;
    if self.states[[taxon, site]] != state {
      self.states[[taxon, site]] = state;
      self.dirty[taxon] = true;
    }
    Ok(())
  }

  fn set_states_for_site(&mut self, site: usize, states: &[usize]) -> Result<(), Report> {
    if states.len() != self.taxa.len() {
      return make_error!(
        "Expected {} states for site {site}, one per taxon, but got {}",
        self.taxa.len(),
        states.len()
      );
    }
    for (taxon, &state) in states.iter().enumerate() {
      self.set_state(taxon, site, state)?;
    }
    Ok(())
  }
}
