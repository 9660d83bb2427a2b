use crate::make_internal_report;
use eyre::Report;
use rand::{Rng, SeedableRng};
use rand_isaac::Isaac64Rng;

pub fn get_random_number_generator(seed: Option<u64>) -> impl Rng + Send + Sync + Clone {
  match seed {
    None => Isaac64Rng::from_entropy(),
    Some(seed) => Isaac64Rng::seed_from_u64(seed),
  }
}

/// Picks an index uniformly from `0..n`. Consumes exactly one integer draw.
pub fn random_index(n: usize, rng: &mut impl Rng) -> Result<usize, Report> {
  if n == 0 {
    return Err(make_internal_report!("random_index: expected a non-empty range, but got 0 items"));
  }
  Ok(rng.gen_range(0..n))
}
