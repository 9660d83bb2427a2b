pub mod alignment_tsv;
pub mod file;
pub mod fs;
pub mod json;
pub mod nwk;
pub mod read_counts;
