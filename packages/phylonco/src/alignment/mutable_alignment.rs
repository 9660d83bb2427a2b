use crate::make_error;
use eyre::Report;

/// Access to a taxa x sites matrix of discrete states, owned by the caller.
pub trait MutableAlignment {
  fn taxon_count(&self) -> usize;

  fn site_count(&self) -> usize;

  fn state_count(&self) -> usize;

  fn taxon_index(&self, name: &str) -> Option<usize>;

  fn state_at(&self, taxon: usize, site: usize) -> Result<usize, Report>;

  fn set_state(&mut self, taxon: usize, site: usize, state: usize) -> Result<(), Report>;

  /// Writes one state per taxon at `site`. `states` is indexed by taxon.
  fn set_states_for_site(&mut self, site: usize, states: &[usize]) -> Result<(), Report>;

  /// Writes one state per site for `taxon`.
  fn set_states_for_taxon(&mut self, taxon: usize, states: &[usize]) -> Result<(), Report> {
    if states.len() != self.site_count() {
      return make_error!(
        "Expected {} states for taxon {taxon}, one per site, but got {}",
        self.site_count(),
        states.len()
      );
    }
    for (site, &state) in states.iter().enumerate() {
      self.set_state(taxon, site, state)?;
    }
    Ok(())
  }
}
