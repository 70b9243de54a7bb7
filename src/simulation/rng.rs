//! Per-draw random streams.
//!
//! Every stream is a [`Pcg64`] seeded from `(seed, draw, stream)` through
//! splitmix64, so a draw's numbers do not depend on which worker runs it.
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// Draw index reserved for the path shared by all draws.
pub const SHARED_DRAW: u64 = u64::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
  /// Random visiting order.
  Path,
  /// Structured component `k` of the coregionalization.
  Structured(usize),
  /// White-noise component `k`.
  Nugget(usize),
}

impl Stream {
  fn id(self) -> u64 {
    match self {
      Self::Path => 0,
      Self::Structured(k) => 1 + 2 * k as u64,
      Self::Nugget(k) => 2 + 2 * k as u64,
    }
  }
}

#[inline(always)]
fn splitmix64_next(state: &mut u64) -> u64 {
  *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
  let mut z = *state;
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
  z ^ (z >> 31)
}

/// 64-bit seed of one stream.
pub fn substream_seed(seed: u64, draw: u64, stream: Stream) -> u64 {
  let mut state = seed ^ draw.wrapping_mul(0x9e37_79b9_7f4a_7c15);
  let mixed = splitmix64_next(&mut state);
  let mut state = mixed ^ stream.id().wrapping_mul(0xd1b5_4a32_d192_ed03);
  splitmix64_next(&mut state)
}

pub fn stream_rng(seed: u64, draw: u64, stream: Stream) -> Pcg64 {
  Pcg64::seed_from_u64(substream_seed(seed, draw, stream))
}
