//! # Traits
//!
//! $$
//! \text{draw } i \;\mapsto\; \omega_i, \qquad i = 0, \dots, m - 1
//! $$
//!
use rayon::prelude::*;

/// Anything that yields one reproducible sample per draw index.
///
/// A draw's output must depend only on the draw index and the sampler's own
/// state, so `sample_par` returns the same sequence for any pool size.
pub trait SamplerExt: Send + Sync {
  type Output: Send;
  type Error: Send;

  fn sample_draw(&self, draw: usize) -> Result<Self::Output, Self::Error>;

  fn sample_par(&self, m: usize) -> Result<Vec<Self::Output>, Self::Error> {
    (0..m).into_par_iter().map(|i| self.sample_draw(i)).collect()
  }
}
