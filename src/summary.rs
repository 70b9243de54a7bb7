//! # Summary
//!
//! $$
//! \bar x(u) = \frac1{n_u}\sum_{i} x_i(u), \qquad
//! s(u) = \sqrt{\frac{1}{n_u - 1}\sum_i \big(x_i(u) - \bar x(u)\big)^2}
//! $$
//!
//! Cell-wise statistics across an ensemble of conformant fields, skipping
//! members that are missing at a cell, and distributions of per-member
//! scalar reductions. Standard deviations use the `n - 1` denominator;
//! quantiles interpolate linearly between order statistics.
use impl_new_derive::ImplNew;
use ndarray::Array2;
use ndarray::Zip;
use rayon::prelude::*;
use statrs::statistics::Statistics;

use crate::error::AggregationError;
use crate::grid::GridField;

/// Cell-wise mean, standard deviation and quantiles of one ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct CellwiseSummary {
  pub mean: GridField,
  pub stddev: GridField,
  /// `(q, field)` pairs in the order requested.
  pub quantiles: Vec<(f64, GridField)>,
}

impl CellwiseSummary {
  pub fn quantile(&self, q: f64) -> Option<&GridField> {
    self
      .quantiles
      .iter()
      .find(|(level, _)| *level == q)
      .map(|(_, field)| field)
  }
}

/// Distribution of one scalar per ensemble member, in draw order.
#[derive(ImplNew, Debug, Clone, PartialEq)]
pub struct ScalarSummary {
  pub values: Vec<f64>,
}

impl ScalarSummary {
  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn mean(&self) -> Result<f64, AggregationError> {
    require_samples(self.values.len(), 1)?;
    Ok(self.values.iter().mean())
  }

  /// Sample standard deviation.
  pub fn stddev(&self) -> Result<f64, AggregationError> {
    require_samples(self.values.len(), 2)?;
    Ok(self.values.iter().std_dev())
  }

  pub fn quantile(&self, q: f64) -> Result<f64, AggregationError> {
    check_quantile(q)?;
    require_samples(self.values.len(), 1)?;
    let mut sorted = self.values.clone();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted_quantile(&sorted, q))
  }

  pub fn min(&self) -> Option<f64> {
    self.values.iter().copied().reduce(f64::min)
  }

  pub fn max(&self) -> Option<f64> {
    self.values.iter().copied().reduce(f64::max)
  }
}

pub fn cellwise_mean(ensemble: &[GridField]) -> Result<GridField, AggregationError> {
  validate(ensemble, 1)?;
  Ok(reduce_cells(ensemble, |values| Some(mean(values))))
}

/// Sample standard deviation per cell; cells with fewer than two valid
/// members are missing.
pub fn cellwise_stddev(ensemble: &[GridField]) -> Result<GridField, AggregationError> {
  validate(ensemble, 2)?;
  Ok(reduce_cells(ensemble, |values| sample_stddev(values)))
}

pub fn cellwise_quantile(ensemble: &[GridField], q: f64) -> Result<GridField, AggregationError> {
  check_quantile(q)?;
  validate(ensemble, 1)?;
  Ok(reduce_cells(ensemble, |values| {
    values.sort_by(f64::total_cmp);
    Some(sorted_quantile(values, q))
  }))
}

/// Fraction of valid members strictly above `threshold` at each cell.
pub fn cellwise_exceedance(ensemble: &[GridField], threshold: f64) -> Result<GridField, AggregationError> {
  validate(ensemble, 1)?;
  Ok(reduce_cells(ensemble, |values| {
    let above = values.iter().filter(|&&v| v > threshold).count();
    Some(above as f64 / values.len() as f64)
  }))
}

/// Mean, standard deviation and every requested quantile in one pass.
pub fn cellwise_summary(ensemble: &[GridField], quantiles: &[f64]) -> Result<CellwiseSummary, AggregationError> {
  for &q in quantiles {
    check_quantile(q)?;
  }
  validate(ensemble, 2)?;

  let first = &ensemble[0];
  let geometry = *first.geometry();
  let nodata = first.nodata();
  let (rows, cols) = geometry.shape();
  let outputs = 2 + quantiles.len();

  let per_cell: Vec<Vec<f64>> = (0..geometry.len())
    .into_par_iter()
    .map_init(Vec::new, |values, idx| {
      let (r, c) = (idx / cols, idx % cols);
      values.clear();
      values.extend(ensemble.iter().filter_map(|f| f.get(r, c)));

      let mut out = vec![nodata; outputs];
      if values.is_empty() {
        return out;
      }
      out[0] = mean(values);
      if let Some(sd) = sample_stddev(values) {
        out[1] = sd;
      }
      values.sort_by(f64::total_cmp);
      for (k, &q) in quantiles.iter().enumerate() {
        out[2 + k] = sorted_quantile(values, q);
      }
      out
    })
    .collect();

  let layer = |k: usize| {
    let data = Array2::from_shape_fn((rows, cols), |(r, c)| per_cell[r * cols + c][k]);
    GridField::from_parts(geometry, data, nodata)
  };

  Ok(CellwiseSummary {
    mean: layer(0),
    stddev: layer(1),
    quantiles: quantiles
      .iter()
      .enumerate()
      .map(|(k, &q)| (q, layer(2 + k)))
      .collect(),
  })
}

/// Applies `reducer` to every member and summarises the resulting values.
pub fn scalar_statistic<F>(ensemble: &[GridField], reducer: F) -> Result<ScalarSummary, AggregationError>
where
  F: Fn(&GridField) -> f64 + Sync + Send,
{
  require_samples(ensemble.len(), 1)?;
  let values = ensemble.par_iter().map(reducer).collect();
  Ok(ScalarSummary::new(values))
}

/// Reducer counting the valid cells strictly above `threshold`.
pub fn count_exceeding(threshold: f64) -> impl Fn(&GridField) -> f64 + Sync + Send + Copy {
  move |field: &GridField| field.count_where(|v| v > threshold) as f64
}

fn validate(ensemble: &[GridField], required: usize) -> Result<(), AggregationError> {
  require_samples(ensemble.len(), required)?;
  let first = &ensemble[0];
  match ensemble.iter().position(|f| !f.is_conformant(first)) {
    Some(index) => Err(AggregationError::GridGeometryMismatch { index }),
    None => Ok(()),
  }
}

fn require_samples(found: usize, required: usize) -> Result<(), AggregationError> {
  if found < required {
    return Err(AggregationError::InsufficientSamples { required, found });
  }
  Ok(())
}

fn check_quantile(q: f64) -> Result<(), AggregationError> {
  if !(0.0..=1.0).contains(&q) {
    return Err(AggregationError::InvalidQuantile(q));
  }
  Ok(())
}

/// Valid values of each cell across the ensemble, reduced in parallel.
/// The output keeps the first member's geometry and sentinel.
fn reduce_cells<F>(ensemble: &[GridField], reduce: F) -> GridField
where
  F: Fn(&mut Vec<f64>) -> Option<f64> + Sync,
{
  let first = &ensemble[0];
  let nodata = first.nodata();
  let mut out = Array2::from_elem(first.shape(), nodata);

  Zip::indexed(&mut out).par_for_each(|(r, c), out| {
    let mut values: Vec<f64> = ensemble.iter().filter_map(|f| f.get(r, c)).collect();
    if values.is_empty() {
      return;
    }
    if let Some(v) = reduce(&mut values) {
      *out = v;
    }
  });

  GridField::from_parts(*first.geometry(), out, nodata)
}

fn mean(values: &[f64]) -> f64 {
  values.iter().sum::<f64>() / values.len() as f64
}

fn sample_stddev(values: &[f64]) -> Option<f64> {
  let n = values.len();
  if n < 2 {
    return None;
  }
  let m = mean(values);
  let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
  Some((ss / (n - 1) as f64).sqrt())
}

/// Linear interpolation between order statistics of a sorted, non-empty slice.
fn sorted_quantile(sorted: &[f64], q: f64) -> f64 {
  let h = (sorted.len() - 1) as f64 * q;
  let lo = h.floor() as usize;
  let hi = h.ceil() as usize;
  sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::grid::GridGeometry;
  use crate::grid::DEFAULT_NODATA;

  fn geometry() -> GridGeometry {
    GridGeometry::square(2, 2, 1.0).unwrap()
  }

  fn field(values: [f64; 4]) -> GridField {
    GridField::from_vec(geometry(), values.to_vec(), DEFAULT_NODATA).unwrap()
  }

  #[test]
  fn constant_ensemble_has_zero_spread() {
    let ensemble = vec![GridField::filled(geometry(), 5.0); 3];
    let mean = cellwise_mean(&ensemble).unwrap();
    let sd = cellwise_stddev(&ensemble).unwrap();
    assert!(mean.valid_values().all(|v| v == 5.0));
    assert!(sd.valid_values().all(|v| v == 0.0));
    assert_eq!(mean.valid_count(), 4);
    assert_eq!(sd.valid_count(), 4);
  }

  #[test]
  fn sample_statistics_per_cell() {
    let ensemble = vec![
      field([1.0, 10.0, 0.0, DEFAULT_NODATA]),
      field([2.0, 20.0, 0.0, DEFAULT_NODATA]),
      field([3.0, 30.0, 6.0, 4.0]),
      field([4.0, 40.0, DEFAULT_NODATA, DEFAULT_NODATA]),
    ];
    let mean = cellwise_mean(&ensemble).unwrap();
    assert_eq!(mean.get(0, 0), Some(2.5));
    assert_eq!(mean.get(1, 0), Some(2.0));
    assert_eq!(mean.get(1, 1), Some(4.0));

    let sd = cellwise_stddev(&ensemble).unwrap();
    assert_abs_diff_eq!(sd.get(0, 0).unwrap(), (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(sd.get(1, 0).unwrap(), 12f64.sqrt(), epsilon = 1e-12);
    assert!(sd.is_nodata(1, 1));
  }

  #[test]
  fn all_missing_cell_stays_missing() {
    let ensemble = vec![field([1.0, DEFAULT_NODATA, 1.0, 1.0]), field([2.0, f64::NAN, 2.0, 2.0])];
    assert!(cellwise_mean(&ensemble).unwrap().is_nodata(0, 1));
    assert!(cellwise_quantile(&ensemble, 0.5).unwrap().is_nodata(0, 1));
  }

  #[test]
  fn quantiles_interpolate_order_statistics() {
    let ensemble: Vec<GridField> = [4.0, 1.0, 3.0, 2.0, 5.0]
      .iter()
      .map(|&v| GridField::filled(geometry(), v))
      .collect();
    assert_eq!(cellwise_quantile(&ensemble, 0.0).unwrap().get(0, 0), Some(1.0));
    assert_eq!(cellwise_quantile(&ensemble, 0.5).unwrap().get(0, 0), Some(3.0));
    assert_eq!(cellwise_quantile(&ensemble, 1.0).unwrap().get(0, 0), Some(5.0));
    assert_abs_diff_eq!(cellwise_quantile(&ensemble, 0.1).unwrap().get(1, 1).unwrap(), 1.4, epsilon = 1e-12);
    assert!(matches!(
      cellwise_quantile(&ensemble, 1.5),
      Err(AggregationError::InvalidQuantile(q)) if q == 1.5
    ));
  }

  #[test]
  fn summary_matches_individual_operations() {
    let ensemble: Vec<GridField> = (0..7)
      .map(|i| GridField::from_fn(geometry(), |(r, c)| ((i * 3 + r * 5 + c) % 7) as f64))
      .collect();
    let summary = cellwise_summary(&ensemble, &[0.05, 0.95]).unwrap();
    assert_eq!(summary.mean, cellwise_mean(&ensemble).unwrap());
    assert_eq!(summary.stddev, cellwise_stddev(&ensemble).unwrap());
    assert_eq!(summary.quantile(0.95), Some(&cellwise_quantile(&ensemble, 0.95).unwrap()));
    assert!(summary.quantile(0.5).is_none());
  }

  #[test]
  fn exceedance_is_a_fraction_of_valid_members() {
    let ensemble = vec![
      field([1.0, 5.0, DEFAULT_NODATA, 0.0]),
      field([3.0, 6.0, 9.0, 0.0]),
      field([4.0, 7.0, 1.0, 0.0]),
      field([0.0, 8.0, 9.0, 0.0]),
    ];
    let p = cellwise_exceedance(&ensemble, 2.0).unwrap();
    assert_eq!(p.get(0, 0), Some(0.5));
    assert_eq!(p.get(0, 1), Some(1.0));
    assert_abs_diff_eq!(p.get(1, 0).unwrap(), 2.0 / 3.0, epsilon = 1e-12);
    assert_eq!(p.get(1, 1), Some(0.0));
  }

  #[test]
  fn rejects_mismatched_and_small_ensembles() {
    let other = GridField::filled(GridGeometry::square(2, 3, 1.0).unwrap(), 1.0);
    let ensemble = vec![GridField::filled(geometry(), 1.0), GridField::filled(geometry(), 1.0), other];
    assert_eq!(
      cellwise_mean(&ensemble).unwrap_err(),
      AggregationError::GridGeometryMismatch { index: 2 }
    );
    assert_eq!(
      cellwise_stddev(&ensemble[..1]).unwrap_err(),
      AggregationError::InsufficientSamples { required: 2, found: 1 }
    );
    assert!(cellwise_mean(&[]).is_err());
  }

  #[test]
  fn scalar_statistic_counts_exceedances() {
    let ensemble = vec![
      field([1.0, 5.0, 9.0, 2.0]),
      field([3.0, 3.0, 3.0, 3.0]),
      field([DEFAULT_NODATA, 0.0, 0.0, 0.0]),
    ];
    let summary = scalar_statistic(&ensemble, count_exceeding(2.5)).unwrap();
    assert_eq!(summary.values, vec![2.0, 4.0, 0.0]);
    assert_abs_diff_eq!(summary.mean().unwrap(), 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(summary.stddev().unwrap(), 2.0, epsilon = 1e-12);
    assert_eq!(summary.quantile(0.5).unwrap(), 2.0);
    assert_eq!(summary.min(), Some(0.0));
    assert_eq!(summary.max(), Some(4.0));
    assert!(ScalarSummary::new(vec![1.0]).stddev().is_err());
  }
}
