use crate::io::fs::filename_maybe;
use color_eyre::config::{HookBuilder, Theme};
use color_eyre::owo_colors::{OwoColorize, Style};
use env_logger::Env;
use log::{Level, LevelFilter, Record};
use std::io::Write;

const HIDDEN_CRATE_NAME_PREFIXES: &[&str] = &[
  "__rust_try",
  "alloc::",
  "color_eyre::",
  "core::",
  "eyre::",
  "ndarray::",
  "rayon::",
  "rayon_core::",
  "rustc::",
  "std::",
];

const HIDDEN_CRATE_PATH_PREFIXES: &[&str] = &["/rustc/"];

fn file_line(record: &Record) -> String {
  match (record.file().and_then(filename_maybe), record.line()) {
    (Some(file), Some(line)) => format!("{file}:{line}:"),
    (Some(file), None) => format!("{file}:"),
    _ => String::new(),
  }
  .dimmed()
  .to_string()
}

fn level_tag(level: Level) -> String {
  let letter = &level.as_str()[..1];
  let letter = match level {
    Level::Error => letter.red().to_string(),
    Level::Warn => letter.yellow().to_string(),
    Level::Info => letter.cyan().dimmed().to_string(),
    Level::Debug => letter.green().dimmed().to_string(),
    Level::Trace => letter.dimmed().to_string(),
  };
  format!("{}{letter}{}", "[".dimmed(), "]".dimmed())
}

/// Messages emitted from inside the rayon pool (e.g. parallel rate categories) are tagged with the worker index.
fn worker_tag() -> String {
  rayon::current_thread_index()
    .map(|i| format!("w{i} ").dimmed().to_string())
    .unwrap_or_default()
}

/// Console logger: `<time> [L] <worker> file:line: message`.
pub fn setup_logger(filter_level: LevelFilter) {
  env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
    .filter_level(filter_level)
    .format(|buf, record| {
      let time = chrono::Local::now().format("%H:%M:%S%.3f").to_string().dimmed().to_string();
      writeln!(
        buf,
        "{time} {} {}{} {}",
        level_tag(record.level()),
        worker_tag(),
        file_line(record),
        record.args()
      )
    })
    .init();
}

fn error_theme() -> Theme {
  Theme::dark()
    .dependency_code(Style::new().dimmed())
    .file(Style::new().green())
    .line_number(Style::new().yellow())
    .panic_file(Style::new().green())
    .panic_line_number(Style::new().yellow())
    .panic_message(Style::new().bright_red().bold())
    .active_line(Style::new().cyan())
    .hidden_frames(Style::new().dimmed())
    .code_hash(Style::new().hidden())
}

/// Installs the `color_eyre` report and panic hooks. Must run once, before any report is created.
pub fn global_init() {
  HookBuilder::default()
    .theme(error_theme())
    .panic_section(format!(
      "If you think it's a bug, consider reporting at: '{}/issues'",
      env!("CARGO_PKG_REPOSITORY"),
    ))
    .add_frame_filter(Box::new(|frames| {
      frames.retain(|frame| {
        let name_visible = frame.name.as_ref().map_or(false, |name| {
          !HIDDEN_CRATE_NAME_PREFIXES
            .iter()
            .any(|&prefix| name.starts_with(prefix) || name.starts_with(&format!("<{prefix}")))
        });
        let file_visible = !frame.filename.as_ref().map_or(false, |filename| {
          HIDDEN_CRATE_PATH_PREFIXES
            .iter()
            .any(|&prefix| filename.starts_with(prefix))
        });
        name_visible && file_visible
      });
    }))
    .install()
    .expect("color_eyre initialization failed");
}
