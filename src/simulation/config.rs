use crate::error::SimulationError;

/// Conditioning neighbours used when the caller does not choose.
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 24;
/// Below this many neighbours the short-range structure is visibly lost.
pub const RECOMMENDED_NEIGHBORS: usize = 8;

/// How the random visiting path is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathMode {
  /// One seeded path and kriging plan, built once and reused by every draw.
  #[default]
  Shared,
  /// A fresh path and plan per draw.
  PerDraw,
}

/// Tunables of the field simulator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
  /// Maximum previously simulated cells conditioning each new cell.
  pub neighbor_limit: usize,
  /// Top-level seed; every draw derives its own streams from it.
  pub seed: u64,
  pub path: PathMode,
  /// Neighbours farther than this (map units) are ignored.
  pub search_radius: Option<f64>,
  /// Dedicated worker pool size; `None` uses the global rayon pool.
  pub threads: Option<usize>,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
      seed: 0,
      path: PathMode::Shared,
      search_radius: None,
      threads: None,
    }
  }
}

impl SimulationConfig {
  pub fn with_neighbor_limit(mut self, neighbor_limit: usize) -> Self {
    self.neighbor_limit = neighbor_limit;
    self
  }

  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = seed;
    self
  }

  pub fn with_path(mut self, path: PathMode) -> Self {
    self.path = path;
    self
  }

  pub fn with_search_radius(mut self, radius: f64) -> Self {
    self.search_radius = Some(radius);
    self
  }

  pub fn with_threads(mut self, threads: usize) -> Self {
    self.threads = Some(threads);
    self
  }

  pub fn validate(&self) -> Result<(), SimulationError> {
    if let Some(r) = self.search_radius {
      if !(r.is_finite() && r > 0.0) {
        return Err(SimulationError::InvalidConfig(format!(
          "search radius must be positive and finite, got {r}"
        )));
      }
    }
    if self.threads == Some(0) {
      return Err(SimulationError::InvalidConfig(
        "thread count must be at least 1".into(),
      ));
    }
    Ok(())
  }

  /// The neighbour-limit warning for a grid of `cells` cells, if any.
  pub fn neighbor_warning(&self, cells: usize) -> Option<SimulationError> {
    let recommended = RECOMMENDED_NEIGHBORS.min(cells.saturating_sub(1));
    (self.neighbor_limit < recommended).then_some(SimulationError::NeighborLimitTooSmall {
      limit: self.neighbor_limit,
      recommended,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_overrides_defaults() {
    let cfg = SimulationConfig::default()
      .with_neighbor_limit(12)
      .with_seed(7)
      .with_path(PathMode::PerDraw)
      .with_search_radius(250.0)
      .with_threads(2);
    assert_eq!(cfg.neighbor_limit, 12);
    assert_eq!(cfg.seed, 7);
    assert_eq!(cfg.path, PathMode::PerDraw);
    assert_eq!(cfg.search_radius, Some(250.0));
    assert_eq!(cfg.threads, Some(2));
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn rejects_bad_radius_and_threads() {
    let cfg = SimulationConfig::default().with_search_radius(-1.0);
    assert!(matches!(cfg.validate(), Err(SimulationError::InvalidConfig(_))));
    let cfg = SimulationConfig::default().with_threads(0);
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn neighbor_warning_scales_with_grid() {
    let cfg = SimulationConfig::default().with_neighbor_limit(4);
    assert_eq!(
      cfg.neighbor_warning(100),
      Some(SimulationError::NeighborLimitTooSmall {
        limit: 4,
        recommended: RECOMMENDED_NEIGHBORS
      })
    );
    assert_eq!(cfg.neighbor_warning(5), None);
    assert_eq!(SimulationConfig::default().neighbor_warning(10_000), None);
  }
}
