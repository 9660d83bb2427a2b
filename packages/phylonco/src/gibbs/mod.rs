pub mod descendants;
pub mod leaf_partials;
pub mod model;
pub mod propagate;
pub mod root_sampler;
pub mod sampler;
pub mod sequence_sampler;

#[cfg(test)]
pub mod test_utils;
