use crate::cli::jobs::Jobs;
use crate::cli::verbosity::Verbosity;
use clap::{Parser, Subcommand};
use eyre::Report;
use phylonco::commands::sample::sample_args::PhyloncoSampleArgs;
use phylonco::utils::global_init::setup_logger;
use std::fmt::Debug;

#[derive(Parser, Debug)]
#[clap(name = "phylonco")]
#[clap(author, version)]
#[clap(verbatim_doc_comment)]
/// Bayesian inference of single-cell genotypes on phylogenies from raw read counts
pub struct PhyloncoArgs {
  #[clap(subcommand)]
  pub command: PhyloncoCommands,

  #[clap(flatten)]
  pub jobs: Jobs,

  #[clap(flatten)]
  pub verbosity: Verbosity,
}

#[derive(Subcommand, Debug)]
#[clap(verbatim_doc_comment)]
pub enum PhyloncoCommands {
  /// Samples genotypes of every cell with site-wise Gibbs updates, conditioned on the tree and on the read counts.
  /// Writes the final sampled genotype alignment as TSV.
  Sample(PhyloncoSampleArgs),
}

pub fn phylonco_parse_cli_args() -> Result<PhyloncoArgs, Report> {
  let args = PhyloncoArgs::parse();
  setup_logger(args.verbosity.get_filter_level());
  Ok(args)
}
