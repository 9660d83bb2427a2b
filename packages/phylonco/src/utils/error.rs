#![allow(clippy::pub_use)]

use color_eyre::Report;

pub fn report_to_string(report: &Report) -> String {
  let strings: Vec<String> = report
    .chain()
    .map(std::string::ToString::to_string)
    .collect();
  strings.join(": ")
}

#[macro_export(local_inner_macros)]
macro_rules! make_error {
  ($($arg:tt)*) => {
    {
      Err(eyre::eyre!(std::format!($($arg)*)))
    }
  };
}

pub use make_error;

#[macro_export(local_inner_macros)]
macro_rules! make_report {
  ($($arg:tt)*) => {
    {
      eyre::eyre!($($arg)*)
    }
  };
}

pub use make_report;

#[macro_export(local_inner_macros)]
macro_rules! make_internal_error {
  ($($arg:tt)*) => {
    {
      let msg_external = std::format!($($arg)*);
      let msg = std::format!("{msg_external}. This is an internal error. Please report it to developers.");
      Err(eyre::eyre!(msg))
    }
  };
}

pub use make_internal_error;

#[macro_export(local_inner_macros)]
macro_rules! make_internal_report {
  ($($arg:tt)*) => {
    {
      let msg_external = std::format!($($arg)*);
      let msg = std::format!("{msg_external}. This is an internal error. Please report it to developers.");
      eyre::eyre!(msg)
    }
  };
}

pub use make_internal_report;

#[cfg(test)]
mod tests {
  use super::*;
  use eyre::WrapErr;
  use pretty_assertions::assert_eq;

  #[test]
  fn joins_report_chain_outermost_first() {
    let res: Result<(), Report> = make_error!("Node {} has no children", 3);
    let report = res.wrap_err("When validating tree").unwrap_err();
    assert_eq!(report_to_string(&report), "When validating tree: Node 3 has no children");
  }

  #[test]
  fn internal_report_asks_for_bug_report() {
    let report = make_internal_report!("Buffer has {} rows", 2);
    assert!(report.to_string().ends_with("Please report it to developers."));
  }
}
