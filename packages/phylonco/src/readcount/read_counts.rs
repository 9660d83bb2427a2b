use crate::make_error;
use eyre::Report;
use ndarray::{Array2, Array3, ArrayView1, Axis};

pub const N_NUCLEOTIDES: usize = 4;

/// Nucleotide read counts (A, C, G, T) for every taxon and site, with per-(taxon, site) coverage precomputed.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadCounts {
  taxa: Vec<String>,
  counts: Array3<u32>,
  coverage: Array2<u32>,
}

impl ReadCounts {
  /// `counts` has shape `(n_taxa, n_sites, 4)`.
  pub fn new(taxa: Vec<String>, counts: Array3<u32>) -> Result<Self, Report> {
    let (n_taxa, _, n_nuc) = counts.dim();
    if n_nuc != N_NUCLEOTIDES {
      return make_error!("Expected {N_NUCLEOTIDES} nucleotide counts per site, but found {n_nuc}");
    }
    if taxa.len() != n_taxa {
      return make_error!(
        "Number of taxon names ({}) does not match the number of taxa in read counts ({n_taxa})",
        taxa.len()
      );
    }
    if let Some(dup) = taxa.iter().enumerate().find(|(i, t)| taxa[..*i].contains(t)) {
      return make_error!("Taxon name '{}' appears more than once in read counts", dup.1);
    }
    let coverage = counts.sum_axis(Axis(2));
    Ok(Self { taxa, counts, coverage })
  }

  pub fn taxa(&self) -> &[String] {
    &self.taxa
  }

  pub fn taxon_index(&self, name: &str) -> Option<usize> {
    self.taxa.iter().position(|t| t == name)
  }

  pub fn n_taxa(&self) -> usize {
    self.counts.dim().0
  }

  pub fn n_sites(&self) -> usize {
    self.counts.dim().1
  }

  pub fn counts(&self, taxon: usize, site: usize) -> ArrayView1<u32> {
    self.counts.slice(ndarray::s![taxon, site, ..])
  }

  pub fn coverage(&self, taxon: usize, site: usize) -> u32 {
    self.coverage[[taxon, site]]
  }

  pub fn max_coverage(&self) -> u32 {
    self.coverage.iter().copied().max().unwrap_or(0)
  }
}
