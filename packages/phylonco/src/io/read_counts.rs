use crate::io::fs::read_file_to_string;
use crate::make_error;
use crate::readcount::read_counts::{ReadCounts, N_NUCLEOTIDES};
use eyre::{Report, WrapErr};
use itertools::Itertools;
use ndarray::Array3;
use std::path::Path;

pub fn read_counts_from_file(filepath: impl AsRef<Path>, taxa: Option<&[String]>) -> Result<ReadCounts, Report> {
  let filepath = filepath.as_ref();
  let data = read_file_to_string(filepath)?;
  read_counts_from_str(&data, taxa).wrap_err_with(|| format!("When parsing read counts file {filepath:#?}"))
}

/// Parses read counts, one taxon per line, sites separated by `,` and the A, C, G, T counts of a site separated by `:`
///
/// ```text
/// 1:0:0:11,0:17:0:12
/// 7:0:0:26,0:12:0:8
/// ```
///
/// Blank lines and lines starting with `#` are ignored. Without explicit `taxa`, taxa are named `0`, `1`, ...
pub fn read_counts_from_str(data: &str, taxa: Option<&[String]>) -> Result<ReadCounts, Report> {
  let rows = data
    .lines()
    .enumerate()
    .map(|(i, line)| (i + 1, line.trim()))
    .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
    .map(|(line_number, line)| parse_row(line).wrap_err_with(|| format!("When parsing line {line_number}")))
    .collect::<Result<Vec<_>, Report>>()?;

  let n_taxa = rows.len();
  if n_taxa == 0 {
    return make_error!("Read counts contain no taxa");
  }
  let n_sites = rows[0].len();
  if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != n_sites) {
    return make_error!(
      "Taxon {i} has {} sites, but the first taxon has {n_sites}. All taxa must have the same number of sites",
      row.len()
    );
  }

  let mut counts = Array3::<u32>::zeros((n_taxa, n_sites, N_NUCLEOTIDES));
  for (i, row) in rows.iter().enumerate() {
    for (j, site) in row.iter().enumerate() {
      for (k, &count) in site.iter().enumerate() {
        counts[[i, j, k]] = count;
      }
    }
  }

  let taxa = match taxa {
    Some(taxa) => taxa.to_vec(),
    None => (0..n_taxa).map(|i| i.to_string()).collect_vec(),
  };

  ReadCounts::new(taxa, counts)
}

fn parse_row(line: &str) -> Result<Vec<[u32; N_NUCLEOTIDES]>, Report> {
  line
    .split(',')
    .map(str::trim)
    .filter(|site| !site.is_empty())
    .enumerate()
    .map(|(j, site)| parse_site(site).wrap_err_with(|| format!("When parsing site {j}: '{site}'")))
    .collect()
}

fn parse_site(site: &str) -> Result<[u32; N_NUCLEOTIDES], Report> {
  let values = site
    .split(':')
    .map(|x| x.trim().parse::<u32>().wrap_err_with(|| format!("Invalid read count: '{x}'")))
    .collect::<Result<Vec<_>, Report>>()?;
  match <[u32; N_NUCLEOTIDES]>::try_from(values.as_slice()) {
    Ok(counts) => Ok(counts),
    Err(_) => make_error!("Expected {N_NUCLEOTIDES} counts (A:C:G:T), but found {}", values.len()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::o;
  use indoc::indoc;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  #[rstest]
  fn parses_read_counts() -> Result<(), Report> {
    let rc = read_counts_from_str(
      indoc! {"
        # two cells, two sites
        1:0:0:11, 0:17:0:12

        7:0:0:26,0:12:0:8
      "},
      None,
    )?;
    assert_eq!(rc.n_taxa(), 2);
    assert_eq!(rc.n_sites(), 2);
    assert_eq!(rc.counts(1, 0).to_vec(), vec![7, 0, 0, 26]);
    assert_eq!(rc.taxa(), &[o!("0"), o!("1")]);
    Ok(())
  }

  #[rstest]
  fn uses_given_taxon_names() -> Result<(), Report> {
    let taxa = vec![o!("cell_a"), o!("cell_b")];
    let rc = read_counts_from_str("1:0:0:0\n0:1:0:0\n", Some(&taxa))?;
    assert_eq!(rc.taxon_index("cell_b"), Some(1));
    Ok(())
  }

  #[rstest]
  #[case("1:0:0\n")]
  #[case("1:0:0:x\n")]
  #[case("1:0:0:0,1:1:1:1\n1:0:0:0\n")]
  #[case("")]
  fn rejects_malformed_input(#[case] data: &str) {
    assert!(read_counts_from_str(data, None).is_err());
  }
}
