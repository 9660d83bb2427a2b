pub mod run_sample;
pub mod sample_args;
