pub mod jobs;
pub mod phylonco_cli;
pub mod verbosity;
