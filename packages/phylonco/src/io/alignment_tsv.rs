use crate::alignment::genotype_alignment::GenotypeAlignment;
use crate::io::file::create_file;
use crate::readcount::genotype::GenotypeCoding;
use eyre::{Report, WrapErr};
use itertools::Itertools;
use std::io::Write;
use std::path::Path;

pub fn write_alignment_tsv_file(
  filepath: impl AsRef<Path>,
  alignment: &GenotypeAlignment,
  coding: GenotypeCoding,
) -> Result<(), Report> {
  let filepath = filepath.as_ref();
  let mut f = create_file(filepath)?;
  write_alignment_tsv(&mut f, alignment, coding).wrap_err_with(|| format!("When writing alignment to {filepath:#?}"))
}

/// Writes one row per taxon: the taxon name followed by the genotype name at every site.
pub fn write_alignment_tsv(
  writer: &mut impl Write,
  alignment: &GenotypeAlignment,
  coding: GenotypeCoding,
) -> Result<(), Report> {
  for (taxon, name) in alignment.taxa().iter().enumerate() {
    let genotypes = alignment
      .sequence(taxon)
      .iter()
      .map(|&state| coding.state_name(state))
      .collect::<Result<Vec<_>, Report>>()?;
    writeln!(writer, "{name}\t{}", genotypes.iter().join("\t"))?;
  }
  writer.flush()?;
  Ok(())
}
