use crate::make_error;
use clap::ValueEnum;
use eyre::Report;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const NUCLEOTIDES: [char; 4] = ['A', 'C', 'G', 'T'];

const UNPHASED_10: [(usize, usize); 10] = [
  (0, 0),
  (0, 1),
  (0, 2),
  (0, 3),
  (1, 1),
  (1, 2),
  (1, 3),
  (2, 2),
  (2, 3),
  (3, 3),
];

const PHASED_16: [(usize, usize); 16] = [
  (0, 0),
  (0, 1),
  (0, 2),
  (0, 3),
  (1, 0),
  (1, 1),
  (1, 2),
  (1, 3),
  (2, 0),
  (2, 1),
  (2, 2),
  (2, 3),
  (3, 0),
  (3, 1),
  (3, 2),
  (3, 3),
];

/// Diploid genotype state spaces. A state is an index into the list of allele pairs of the coding.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GenotypeCoding {
  /// AA AC AG AT CC CG CT GG GT TT
  #[default]
  #[value(name = "unphased10", alias = "gt10")]
  Unphased10,
  /// AA AC AG AT CA CC CG CT GA GC GG GT TA TC TG TT
  #[value(name = "phased16", alias = "gt16")]
  Phased16,
}

impl GenotypeCoding {
  fn table(self) -> &'static [(usize, usize)] {
    match self {
      Self::Unphased10 => &UNPHASED_10,
      Self::Phased16 => &PHASED_16,
    }
  }

  pub fn state_count(self) -> usize {
    self.table().len()
  }

  /// Allele indices (0=A, 1=C, 2=G, 3=T) of a genotype state.
  pub fn alleles(self, state: usize) -> Result<(usize, usize), Report> {
    match self.table().get(state) {
      Some(&alleles) => Ok(alleles),
      None => make_error!("Genotype state {state} is out of range for {self} coding"),
    }
  }

  pub fn is_homozygous(self, state: usize) -> Result<bool, Report> {
    let (a, b) = self.alleles(state)?;
    Ok(a == b)
  }

  pub fn state_name(self, state: usize) -> Result<String, Report> {
    let (a, b) = self.alleles(state)?;
    Ok([NUCLEOTIDES[a], NUCLEOTIDES[b]].iter().collect())
  }
}

impl Display for GenotypeCoding {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Unphased10 => write!(f, "unphased10"),
      Self::Phased16 => write!(f, "phased16"),
    }
  }
}

impl FromStr for GenotypeCoding {
  type Err = Report;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "unphased10" | "gt10" => Ok(Self::Unphased10),
      "phased16" | "gt16" => Ok(Self::Phased16),
      _ => make_error!("Unknown genotype coding: '{s}'. Possible values: unphased10, phased16"),
    }
  }
}
