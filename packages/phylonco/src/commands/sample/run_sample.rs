use crate::commands::sample::sample_args::PhyloncoSampleArgs;
use crate::gibbs::model::GibbsModel;
use crate::gibbs::sampler::{GibbsSiteSampler, GibbsSiteSamplerParams};
use crate::gibbs::sequence_sampler::GibbsSequenceSampler;
use crate::io::alignment_tsv::write_alignment_tsv_file;
use crate::io::json::{json_read_file, json_write_str};
use crate::io::nwk::tree_from_nwk_file;
use crate::io::read_counts::read_counts_from_file;
use crate::models::site_model::SiteRates;
use crate::models::substitution::JukesCantor;
use crate::readcount::model::{ReadCountModel, ReadCountParams};
use crate::utils::random::get_random_number_generator;
use eyre::{Report, WrapErr};
use log::info;

pub fn run_sample(args: &PhyloncoSampleArgs) -> Result<(), Report> {
  let PhyloncoSampleArgs {
    tree,
    read_counts,
    taxa,
    coding,
    mu,
    gamma_shape,
    gamma_categories,
    model_params,
    iterations,
    sample_all_sites,
    no_rescale,
    parallel_categories,
    sequence_proposals,
    seed,
    output,
  } = args;

  let mut rng = get_random_number_generator(*seed);

  let tree = tree_from_nwk_file(tree)?;

  let taxa = (!taxa.is_empty()).then_some(taxa.as_slice());
  let read_counts = read_counts_from_file(read_counts, taxa)?;
  info!(
    "Read counts: {} taxa, {} sites, maximum coverage {}",
    read_counts.n_taxa(),
    read_counts.n_sites(),
    read_counts.max_coverage()
  );

  let read_count_params: ReadCountParams = match model_params {
    Some(model_params) => json_read_file(model_params)?,
    None => ReadCountParams::default(),
  };
  info!("Read count model parameters: {}", json_write_str(&read_count_params)?);
  let read_count_model = ReadCountModel::new(read_count_params, *coding, read_counts)?;

  let substitution_model = JukesCantor::new(coding.state_count(), *mu)?;

  let site_model = match gamma_shape {
    Some(shape) => SiteRates::discrete_gamma(*shape, *gamma_categories)?,
    None => SiteRates::constant(),
  };
  info!("Site rate categories: {:?}", site_model.rates());

  let model = GibbsModel {
    tree: &tree,
    site_model: &site_model,
    substitution_model: &substitution_model,
    branch_rates: None,
    leaf_likelihood: &read_count_model,
  };

  let mut alignment = read_count_model
    .most_likely_alignment()
    .wrap_err("When computing initial genotypes")?;

  let params = GibbsSiteSamplerParams {
    sample_all_sites: *sample_all_sites,
    rescale_partials: !*no_rescale,
    parallel_categories: *parallel_categories,
  };
  let rescale_partials = params.rescale_partials;
  let mut sampler = GibbsSiteSampler::new(&model, &alignment, params)?;
  let mut sequence_sampler = (*sequence_proposals > 0)
    .then(|| GibbsSequenceSampler::new(&model, &alignment, rescale_partials))
    .transpose()?;

  info!(
    "Iteration 0: read count log-likelihood {}",
    read_count_model.alignment_log_likelihood(&alignment)?
  );
  for iteration in 1..=*iterations {
    sampler
      .proposal(&model, &mut alignment, &mut rng)
      .wrap_err_with(|| format!("When running Gibbs proposal {iteration}"))?;
    if let Some(sequence_sampler) = &mut sequence_sampler {
      for _ in 0..*sequence_proposals {
        sequence_sampler
          .proposal(&model, &mut alignment, &mut rng)
          .wrap_err_with(|| format!("When running Gibbs sequence proposal in iteration {iteration}"))?;
      }
    }

    let n_changed = alignment.dirty_taxa().len();
    alignment.clear_dirty();

    info!(
      "Iteration {iteration}: read count log-likelihood {}, {n_changed} taxa changed",
      read_count_model.alignment_log_likelihood(&alignment)?
    );
  }

  write_alignment_tsv_file(output, &alignment, *coding)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::io::fs::read_file_to_string;
  use crate::readcount::genotype::GenotypeCoding;
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use rstest::rstest;
  use std::fs;

  #[rstest]
  fn samples_genotypes_end_to_end() -> Result<(), Report> {
    let dir = std::env::temp_dir().join(format!("phylonco-run-sample-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    let tree = dir.join("tree.nwk");
    let read_counts = dir.join("reads.txt");
    let output = dir.join("genotypes.tsv");
    fs::write(&tree, "((cell1:0.1,cell2:0.1):0.2,cell3:0.3);")?;
    fs::write(
      &read_counts,
      indoc! {"
        # A:C:G:T
        20:0:0:0,0:0:0:18,9:0:11:0
        19:0:0:1,0:0:0:25,10:0:0:0
        0:0:0:0,0:0:1:16,0:0:21:0
      "},
    )?;

    let args = PhyloncoSampleArgs {
      tree,
      read_counts,
      taxa: vec!["cell1".to_owned(), "cell2".to_owned(), "cell3".to_owned()],
      coding: GenotypeCoding::Unphased10,
      mu: 0.5,
      gamma_shape: Some(0.5),
      gamma_categories: 4,
      model_params: None,
      iterations: 20,
      sample_all_sites: true,
      no_rescale: false,
      parallel_categories: true,
      sequence_proposals: 2,
      seed: Some(42),
      output: output.clone(),
    };
    run_sample(&args)?;

    let result = read_file_to_string(&output)?;
    let rows = result.lines().map(|line| line.split('\t').collect::<Vec<_>>()).collect::<Vec<_>>();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().map(|row| row[0]).collect::<Vec<_>>(), vec!["cell1", "cell2", "cell3"]);
    assert!(rows.iter().all(|row| row.len() == 4));
    // the only allele seen in deep reads must be carried by the genotype
    assert!(rows[0][1].contains('A'));
    assert!(rows[1][2].contains('T'));
    assert!(rows[2][3].contains('G'));

    fs::remove_dir_all(&dir)?;
    Ok(())
  }
}
