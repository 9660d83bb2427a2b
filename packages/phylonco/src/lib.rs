pub mod alignment;
pub mod commands;
pub mod gibbs;
pub mod io;
pub mod models;
pub mod readcount;
pub mod tree;
pub mod utils;

#[cfg(test)]
mod tests {
  use crate::utils::global_init::global_init;
  use ctor::ctor;

  #[ctor]
  fn init() {
    global_init();
  }
}
