use crate::io::file::open_file_or_stdin;
use eyre::{Report, WrapErr};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

pub fn json_read_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(filepath: P) -> Result<T, Report> {
  let filepath = filepath.as_ref();
  json_read(open_file_or_stdin(&Some(filepath))?)
    .wrap_err_with(|| format!("When reading JSON file: '{}'", filepath.display()))
}

pub fn json_read_str<T: for<'de> Deserialize<'de>>(s: impl AsRef<str>) -> Result<T, Report> {
  json_read(Cursor::new(s.as_ref())).wrap_err("When reading JSON string")
}

pub fn json_read<T: for<'de> Deserialize<'de>>(reader: impl std::io::Read) -> Result<T, Report> {
  serde_json::from_reader(reader).wrap_err("When parsing JSON")
}

pub fn json_write_str<T: Serialize>(obj: &T) -> Result<String, Report> {
  serde_json::to_string_pretty(obj).wrap_err("When writing JSON string")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gibbs::sampler::GibbsSiteSamplerParams;
  use pretty_assertions::assert_eq;
  use rstest::rstest;

  #[rstest]
  fn missing_fields_take_defaults() -> Result<(), Report> {
    let params: GibbsSiteSamplerParams = json_read_str(r#"{ "sample_all_sites": true }"#)?;
    assert!(params.sample_all_sites);
    assert!(params.rescale_partials);
    assert!(!params.parallel_categories);
    Ok(())
  }

  #[rstest]
  fn reports_malformed_input() {
    let err = json_read_str::<GibbsSiteSamplerParams>("{ sample_all_sites: ").unwrap_err();
    assert_eq!(err.to_string(), "When reading JSON string");
  }
}
