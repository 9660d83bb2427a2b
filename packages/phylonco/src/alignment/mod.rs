pub mod genotype_alignment;
pub mod mutable_alignment;
