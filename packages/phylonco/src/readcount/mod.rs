pub mod genotype;
pub mod model;
pub mod read_counts;
