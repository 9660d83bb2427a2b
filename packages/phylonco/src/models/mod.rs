pub mod branch_rates;
pub mod leaf_likelihood;
pub mod site_model;
pub mod substitution;
