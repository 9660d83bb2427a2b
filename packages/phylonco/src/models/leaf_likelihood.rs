use crate::make_error;
use eyre::Report;

/// Observation model at the tips: how likely are the data seen for a taxon at a site, given its genotype.
pub trait LeafLikelihood: Send + Sync {
  /// Natural log of P(observations of `taxon` at `site` | genotype `state`). May be `-inf` for impossible states.
  fn log_likelihood(&self, state: usize, taxon: usize, site: usize) -> Result<f64, Report>;

  /// Index of the taxon with the given name in this data source.
  fn taxon_index(&self, name: &str) -> Option<usize>;

  fn state_count(&self) -> usize;

  fn site_count(&self) -> usize;

  /// Per-site log-likelihoods of a whole genotype sequence of one taxon.
  fn sequence_log_likelihood(&self, taxon: usize, states: &[usize]) -> Result<Vec<f64>, Report> {
    if states.len() != self.site_count() {
      return make_error!(
        "Genotype sequence has {} sites, but observations have {}",
        states.len(),
        self.site_count()
      );
    }
    states
      .iter()
      .enumerate()
      .map(|(site, &state)| self.log_likelihood(state, taxon, site))
      .collect()
  }
}
