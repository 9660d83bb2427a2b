pub mod assert;
pub mod error;
pub mod global_init;
pub mod log_probs;
pub mod random;
pub mod string;
