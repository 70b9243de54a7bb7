use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray_rand::RandomExt;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use super::neighborhood::NeighborSearch;
use crate::correlation::CorrelationModel;
use crate::error::SimulationError;
use crate::grid::GridGeometry;
use crate::linalg::cholesky_with_jitter;

/// Precomputed sequential-simulation path over one grid.
///
/// Step `s` visits `order[s]` and sets
/// `z = Σ weights[j] · z[neighbors[j]] + sd[s] · ε` over the slice
/// `offsets[s]..offsets[s + 1]`, with `ε` standard normal. Weights are simple
/// kriging weights of the neighbours already visited.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
  order: Vec<usize>,
  offsets: Vec<usize>,
  neighbors: Vec<usize>,
  weights: Vec<f64>,
  sd: Vec<f64>,
}

impl SimulationPlan {
  pub fn build<R: Rng + ?Sized>(
    geometry: &GridGeometry,
    correlogram: &CorrelationModel,
    neighbor_limit: usize,
    search_radius: Option<f64>,
    rng: &mut R,
  ) -> Result<Self, SimulationError> {
    let n = geometry.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut search = NeighborSearch::new(*geometry, neighbor_limit, search_radius);
    let mut offsets = Vec::with_capacity(n + 1);
    let mut neighbors = Vec::with_capacity(n * neighbor_limit.min(n));
    let mut weights = Vec::with_capacity(n * neighbor_limit.min(n));
    let mut sd = Vec::with_capacity(n);
    offsets.push(0);

    for &cell in &order {
      let found = search.find(cell);
      let k = found.len();

      if k == 0 {
        sd.push(1.0);
      } else {
        let positions: Vec<(usize, usize)> = found
          .iter()
          .map(|&(_, idx)| geometry.cell_position(idx))
          .collect();
        let cov = DMatrix::from_fn(k, k, |i, j| {
          if i == j {
            1.0
          } else {
            correlogram.correlation(geometry.cell_distance(positions[i], positions[j]))
          }
        });
        let rhs = DVector::from_iterator(k, found.iter().map(|&(d, _)| correlogram.correlation(d)));

        let chol = cholesky_with_jitter(cov).ok_or(SimulationError::SingularKrigingSystem { cell })?;
        let w = chol.solve(&rhs);
        let explained = w.dot(&rhs);
        sd.push((1.0 - explained).max(0.0).sqrt());

        neighbors.extend(found.iter().map(|&(_, idx)| idx));
        weights.extend(w.iter().copied());
      }

      offsets.push(neighbors.len());
      search.mark_visited(cell);
    }

    let plan = Self {
      order,
      offsets,
      neighbors,
      weights,
      sd,
    };
    debug!(
      cells = n,
      neighbor_limit,
      mean_neighbors = plan.mean_neighbors(),
      "built simulation plan"
    );
    Ok(plan)
  }

  /// Number of cells visited.
  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Visiting order as row-major cell indices.
  pub fn order(&self) -> &[usize] {
    &self.order
  }

  /// Conditioning cells and kriging weights of step `step`.
  pub fn step(&self, step: usize) -> (&[usize], &[f64], f64) {
    let range = self.offsets[step]..self.offsets[step + 1];
    (
      &self.neighbors[range.clone()],
      &self.weights[range],
      self.sd[step],
    )
  }

  pub fn mean_neighbors(&self) -> f64 {
    if self.order.is_empty() {
      0.0
    } else {
      self.neighbors.len() as f64 / self.order.len() as f64
    }
  }

  /// One standard-normal field with the plan's correlation structure, in
  /// row-major cell order.
  pub fn simulate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
    let noise = Array1::<f64>::random_using(self.len(), StandardNormal, rng);
    let mut z = vec![0.0; self.len()];

    for (s, &cell) in self.order.iter().enumerate() {
      let (nbrs, w, sd) = self.step(s);
      let mean: f64 = nbrs.iter().zip(w).map(|(&j, &wj)| wj * z[j]).sum();
      z[cell] = mean + sd * noise[s];
    }
    z
  }
}
