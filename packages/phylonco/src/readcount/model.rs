use crate::alignment::genotype_alignment::GenotypeAlignment;
use crate::models::leaf_likelihood::LeafLikelihood;
use crate::{make_error, make_report};
use crate::readcount::genotype::GenotypeCoding;
use crate::readcount::read_counts::{ReadCounts, N_NUCLEOTIDES};
use crate::utils::log_probs::log_sum_exp;
use eyre::{Report, WrapErr};
use itertools::Itertools;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use statrs::function::beta::ln_beta;
use statrs::function::gamma::ln_gamma;

/// Parameters of the read-count error model.
#[derive(Clone, Debug, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadCountParams {
  /// Sequencing error probability
  #[default = 0.01]
  pub epsilon: f64,

  /// Allelic dropout probability
  #[default = 0.2]
  pub delta: f64,

  /// Mean allelic coverage
  #[default = 10.0]
  pub t: f64,

  /// Allelic coverage variance
  #[default = 5.0]
  pub v: f64,

  /// Cell size factors, one per taxon. Empty means 1 for every taxon.
  pub s: Vec<f64>,

  /// Overdispersion of the Dirichlet-multinomial for homozygous (and dropout) genotypes
  #[default = 5.0]
  pub w1: f64,

  /// Overdispersion of the Dirichlet-multinomial for heterozygous genotypes
  #[default = 5.0]
  pub w2: f64,
}

impl ReadCountParams {
  pub fn validate(&self, n_taxa: usize) -> Result<(), Report> {
    let Self {
      epsilon,
      delta,
      t,
      v,
      s,
      w1,
      w2,
    } = self;
    if !(0.0..1.0).contains(epsilon) {
      return make_error!("Expected 'epsilon' to be in [0, 1), but got {epsilon}");
    }
    if !(*delta > 0.0 && *delta < 1.0) {
      return make_error!("Expected 'delta' to be in (0, 1), but got {delta}");
    }
    for (name, value) in [("t", t), ("v", v), ("w1", w1), ("w2", w2)] {
      if !(value.is_finite() && *value > 0.0) {
        return make_error!("Expected '{name}' to be positive, but got {value}");
      }
    }
    if !s.is_empty() && s.len() != n_taxa {
      return make_error!("Expected one size factor 's' per taxon ({n_taxa}), but got {}", s.len());
    }
    if let Some(bad) = s.iter().find(|x| !(x.is_finite() && **x > 0.0)) {
      return make_error!("Expected size factors 's' to be positive, but found {bad}");
    }
    Ok(())
  }
}

/// Negative binomial coverage term for `alpha` amplified alleles, constants precomputed.
#[derive(Clone, Debug)]
struct CoverageTerm {
  r: f64,
  ln_gamma_r: f64,
  ln_p: f64,
  ln_one_minus_p: f64,
}

impl CoverageTerm {
  fn new(alpha: f64, t: f64, v: f64, s: f64) -> Self {
    let mean = alpha * t * s;
    let variance = mean + alpha * alpha * v * s * s;
    let p = mean / variance;
    let r = mean * mean / (variance - mean);
    Self {
      r,
      ln_gamma_r: ln_gamma(r),
      ln_p: p.ln(),
      ln_one_minus_p: (1.0 - p).ln(),
    }
  }

  fn ln_pmf(&self, coverage: u32) -> f64 {
    let c = f64::from(coverage);
    ln_gamma(c + self.r) - self.ln_gamma_r - ln_gamma(c + 1.0) + self.r * self.ln_p + c * self.ln_one_minus_p
  }
}

/// Dirichlet-multinomial propensities of the four nucleotides for an allele pair. A haploid (dropout) genotype with
/// allele `a` uses the homozygous pair `(a, a)`.
fn propensities((a, b): (usize, usize), epsilon: f64, w: f64) -> [f64; N_NUCLEOTIDES] {
  let mut props = [0.0; N_NUCLEOTIDES];
  if a == b {
    props.fill(epsilon / 3.0 * w);
    props[a] = (1.0 - epsilon) * w;
  } else {
    props.fill(epsilon / 6.0 * w);
    props[a] = (0.5 - epsilon / 6.0) * w;
    props[b] = (0.5 - epsilon / 6.0) * w;
  }
  props
}

/// Log-probability of observing `counts` (summing to `coverage`) under a Dirichlet-multinomial with `propensities`.
pub fn dirichlet_multinomial_ln_pmf(counts: ArrayView1<u32>, coverage: u32, propensities: &[f64]) -> f64 {
  if coverage == 0 {
    return 0.0;
  }
  let n = f64::from(coverage);
  let w: f64 = propensities.iter().sum();
  let mut result = n.ln() + ln_beta(w, n);
  for (&count, &alpha) in counts.iter().zip(propensities) {
    if count == 0 {
      continue;
    }
    if alpha <= 0.0 {
      return f64::NEG_INFINITY;
    }
    let c = f64::from(count);
    result -= c.ln() + ln_beta(alpha, c);
  }
  result
}

/// Likelihood of nucleotide read counts given a diploid genotype, mixing a Dirichlet-multinomial read model with a
/// negative binomial coverage model and allelic dropout.
#[derive(Clone, Debug)]
pub struct ReadCountModel {
  params: ReadCountParams,
  coding: GenotypeCoding,
  read_counts: ReadCounts,
  coverage_haploid: Vec<CoverageTerm>,
  coverage_diploid: Vec<CoverageTerm>,
  ln_delta: f64,
  ln_one_minus_delta: f64,
}

impl ReadCountModel {
  pub fn new(params: ReadCountParams, coding: GenotypeCoding, read_counts: ReadCounts) -> Result<Self, Report> {
    params
      .validate(read_counts.n_taxa())
      .wrap_err("When validating read count model parameters")?;

    let size_factor = |taxon: usize| params.s.get(taxon).copied().unwrap_or(1.0);
    let coverage_haploid = (0..read_counts.n_taxa())
      .map(|i| CoverageTerm::new(1.0, params.t, params.v, size_factor(i)))
      .collect_vec();
    let coverage_diploid = (0..read_counts.n_taxa())
      .map(|i| CoverageTerm::new(2.0, params.t, params.v, size_factor(i)))
      .collect_vec();

    Ok(Self {
      ln_delta: params.delta.ln(),
      ln_one_minus_delta: (1.0 - params.delta).ln(),
      params,
      coding,
      read_counts,
      coverage_haploid,
      coverage_diploid,
    })
  }

  pub const fn params(&self) -> &ReadCountParams {
    &self.params
  }

  pub const fn coding(&self) -> GenotypeCoding {
    self.coding
  }

  pub const fn read_counts(&self) -> &ReadCounts {
    &self.read_counts
  }

  /// Log-likelihood of the reads of `taxon` at `site` given genotype `state`.
  pub fn log_likelihood_rc(&self, state: usize, taxon: usize, site: usize) -> Result<f64, Report> {
    if taxon >= self.read_counts.n_taxa() || site >= self.read_counts.n_sites() {
      return make_error!(
        "Read counts requested for taxon {taxon}, site {site}, but data has {} taxa and {} sites",
        self.read_counts.n_taxa(),
        self.read_counts.n_sites()
      );
    }

    let (a, b) = self.coding.alleles(state)?;
    let ReadCountParams { epsilon, w1, w2, .. } = self.params;
    let counts = self.read_counts.counts(taxon, site);
    let coverage = self.read_counts.coverage(taxon, site);
    let diploid_coverage = self.coverage_diploid[taxon].ln_pmf(coverage);
    let haploid_coverage = self.coverage_haploid[taxon].ln_pmf(coverage);
    let dropout = |allele: usize| {
      dirichlet_multinomial_ln_pmf(counts, coverage, &propensities((allele, allele), epsilon, w1))
        + haploid_coverage
        + self.ln_delta
    };

    let ll = if a == b {
      let diploid = dirichlet_multinomial_ln_pmf(counts, coverage, &propensities((a, b), epsilon, w1))
        + diploid_coverage
        + self.ln_one_minus_delta;
      log_sum_exp(&[diploid, dropout(a)])
    } else {
      let diploid = dirichlet_multinomial_ln_pmf(counts, coverage, &propensities((a, b), epsilon, w2))
        + diploid_coverage
        + self.ln_one_minus_delta;
      let ln_half = 0.5_f64.ln();
      log_sum_exp(&[diploid, ln_half + dropout(a), ln_half + dropout(b)])
    };
    Ok(ll)
  }

  /// Total log-likelihood of all reads given the genotypes in `alignment`. Alignment rows are matched to read-count
  /// taxa by name.
  pub fn alignment_log_likelihood(&self, alignment: &GenotypeAlignment) -> Result<f64, Report> {
    alignment
      .taxa()
      .iter()
      .enumerate()
      .map(|(row, name)| -> Result<f64, Report> {
        let taxon = self
          .read_counts
          .taxon_index(name)
          .ok_or_else(|| make_report!("Taxon '{name}' of the alignment is not present in read counts"))?;
        let sequence = alignment.sequence(row).to_vec();
        Ok(self.sequence_log_likelihood(taxon, &sequence)?.iter().sum())
      })
      .sum()
  }

  /// Alignment holding, for every taxon and site, the genotype under which the reads are most likely. Ties go to the
  /// lower state index.
  pub fn most_likely_alignment(&self) -> Result<GenotypeAlignment, Report> {
    let n_states = self.coding.state_count();
    let mut states = Array2::zeros((self.read_counts.n_taxa(), self.read_counts.n_sites()));
    for ((taxon, site), best) in states.indexed_iter_mut() {
      let mut best_ll = f64::NEG_INFINITY;
      for state in 0..n_states {
        let ll = self.log_likelihood_rc(state, taxon, site)?;
        if ll > best_ll {
          best_ll = ll;
          *best = state;
        }
      }
    }
    GenotypeAlignment::from_states(self.read_counts.taxa().to_vec(), states, n_states)
  }
}

impl LeafLikelihood for ReadCountModel {
  fn log_likelihood(&self, state: usize, taxon: usize, site: usize) -> Result<f64, Report> {
    self.log_likelihood_rc(state, taxon, site)
  }

  fn taxon_index(&self, name: &str) -> Option<usize> {
    self.read_counts.taxon_index(name)
  }

  fn state_count(&self) -> usize {
    self.coding.state_count()
  }

  fn site_count(&self) -> usize {
    self.read_counts.n_sites()
  }
}
