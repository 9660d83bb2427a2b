use ctor::ctor;
use eyre::Report;
use log::info;
use phylonco::commands::sample::run_sample::run_sample;
use phylonco::utils::global_init::global_init;
use phylonco_cli::cli::phylonco_cli::{phylonco_parse_cli_args, PhyloncoCommands};

#[ctor]
fn init() {
  global_init();
}

fn main() -> Result<(), Report> {
  let args = phylonco_parse_cli_args()?;

  info!("{:#?}", &args);

  if args.jobs.jobs == 1 {
    rayon::ThreadPoolBuilder::new()
      .num_threads(1)
      .use_current_thread()
      .build_global()?;
  } else {
    rayon::ThreadPoolBuilder::new()
      .num_threads(args.jobs.jobs)
      .build_global()?;
  }

  match args.command {
    PhyloncoCommands::Sample(sample_args) => {
      run_sample(&sample_args)?;
    }
  }

  Ok(())
}
