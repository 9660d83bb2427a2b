use crate::readcount::genotype::GenotypeCoding;
use clap::{Parser, ValueHint};
use std::fmt::Debug;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct PhyloncoSampleArgs {
  /// Path to the tree in Newick format. Every leaf must be named after a taxon of the read counts.
  #[clap(long, short = 't')]
  #[clap(value_hint = ValueHint::FilePath)]
  #[clap(display_order = 1)]
  pub tree: PathBuf,

  /// Path to the read counts: one taxon per line, sites separated by ',', A:C:G:T counts of a site separated by ':'.
  ///
  /// Example line: `1:0:0:11,0:17:0:12`
  #[clap(long, short = 'r')]
  #[clap(value_hint = ValueHint::FilePath)]
  #[clap(display_order = 2)]
  pub read_counts: PathBuf,

  /// Names of the taxa, in the order of lines of the read counts file. If not provided, taxa are named 0, 1, 2, ...
  #[clap(long, num_args = 1..)]
  pub taxa: Vec<String>,

  /// Genotype state space
  #[clap(long, value_enum, default_value_t = GenotypeCoding::default())]
  pub coding: GenotypeCoding,

  /// Substitution rate of the equal-rates genotype substitution model
  #[clap(long, default_value_t = 1.0)]
  pub mu: f64,

  /// Shape of the discrete gamma distribution of rates across sites. If not provided, all sites evolve at the same rate.
  #[clap(long)]
  pub gamma_shape: Option<f64>,

  /// Number of discrete gamma rate categories. Only used with `--gamma-shape`.
  #[clap(long, default_value_t = 4)]
  pub gamma_categories: usize,

  /// Path to a JSON file with parameters of the read count error model.
  ///
  /// Example: `{ "epsilon": 0.01, "delta": 0.2, "t": 10, "v": 5, "w1": 5, "w2": 5 }`. Missing fields take default
  /// values.
  #[clap(long)]
  #[clap(value_hint = ValueHint::FilePath)]
  pub model_params: Option<PathBuf>,

  /// Number of Gibbs proposals to run
  #[clap(long, short = 'n', default_value_t = 100)]
  pub iterations: usize,

  /// Resample every site in each proposal, instead of one randomly chosen site
  #[clap(long)]
  pub sample_all_sites: bool,

  /// Disable rescaling of partial likelihoods. Faster, but may underflow on large trees or with high coverage.
  #[clap(long)]
  pub no_rescale: bool,

  /// Run the pruning pass of each rate category in parallel
  #[clap(long)]
  pub parallel_categories: bool,

  /// Number of whole-sequence updates of randomly chosen taxa per iteration, run after the site proposal. Each one
  /// redraws a taxon's genotypes given the current genotypes of all other taxa.
  #[clap(long, default_value_t = 0)]
  pub sequence_proposals: usize,

  /// Random seed
  #[clap(long)]
  pub seed: Option<u64>,

  /// Path to the output TSV file with the sampled genotypes: one taxon per line, taxon name followed by the genotype of
  /// every site.
  #[clap(long, short = 'o')]
  #[clap(value_hint = ValueHint::AnyPath)]
  pub output: PathBuf,
}
