use ndarray::Array2;
use ndarray::Zip;

use super::GridGeometry;
use crate::error::ConstructionError;

/// Sentinel used when a caller does not supply one.
pub const DEFAULT_NODATA: f64 = -9999.0;

/// Immutable raster of `f64` values on a [`GridGeometry`].
///
/// A cell is missing when it holds the no-data sentinel or NaN. NaN is never a
/// valid value, so a NaN sentinel behaves the same as any other.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
  geometry: GridGeometry,
  data: Array2<f64>,
  nodata: f64,
}

impl GridField {
  pub fn new(geometry: GridGeometry, data: Array2<f64>, nodata: f64) -> Result<Self, ConstructionError> {
    if data.dim() != geometry.shape() {
      return Err(ConstructionError::GridGeometryMismatch(format!(
        "array shape {:?} does not match grid shape {:?}",
        data.dim(),
        geometry.shape()
      )));
    }
    if nodata.is_infinite() {
      return Err(ConstructionError::invalid(
        "nodata",
        "sentinel must be finite or NaN",
      ));
    }

    Ok(Self {
      geometry,
      data,
      nodata,
    })
  }

  /// Skips validation; callers guarantee the shape and sentinel.
  pub(crate) fn from_parts(geometry: GridGeometry, data: Array2<f64>, nodata: f64) -> Self {
    debug_assert_eq!(data.dim(), geometry.shape());
    Self {
      geometry,
      data,
      nodata,
    }
  }

  /// Row-major values.
  pub fn from_vec(geometry: GridGeometry, values: Vec<f64>, nodata: f64) -> Result<Self, ConstructionError> {
    let data = Array2::from_shape_vec(geometry.shape(), values).map_err(|e| {
      ConstructionError::GridGeometryMismatch(format!(
        "{} values cannot fill grid shape {:?}: {e}",
        geometry.len(),
        geometry.shape()
      ))
    })?;
    Self::new(geometry, data, nodata)
  }

  pub fn filled(geometry: GridGeometry, value: f64) -> Self {
    Self {
      geometry,
      data: Array2::from_elem(geometry.shape(), value),
      nodata: DEFAULT_NODATA,
    }
  }

  pub fn from_fn<F>(geometry: GridGeometry, f: F) -> Self
  where
    F: FnMut((usize, usize)) -> f64,
  {
    Self {
      geometry,
      data: Array2::from_shape_fn(geometry.shape(), f),
      nodata: DEFAULT_NODATA,
    }
  }

  pub fn geometry(&self) -> &GridGeometry {
    &self.geometry
  }

  pub fn data(&self) -> &Array2<f64> {
    &self.data
  }

  pub fn nodata(&self) -> f64 {
    self.nodata
  }

  pub fn shape(&self) -> (usize, usize) {
    self.geometry.shape()
  }

  pub fn is_nodata_value(&self, v: f64) -> bool {
    v.is_nan() || v == self.nodata
  }

  /// Value at `(row, col)`, `None` when outside the grid or missing.
  pub fn get(&self, row: usize, col: usize) -> Option<f64> {
    self
      .data
      .get((row, col))
      .copied()
      .filter(|v| !self.is_nodata_value(*v))
  }

  /// Value at a row-major cell index, `None` when missing.
  pub fn get_index(&self, index: usize) -> Option<f64> {
    if index >= self.geometry.len() {
      return None;
    }
    let (row, col) = self.geometry.cell_position(index);
    self.get(row, col)
  }

  pub fn is_nodata(&self, row: usize, col: usize) -> bool {
    self.get(row, col).is_none()
  }

  pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
    self.data.iter().copied().filter(|v| !self.is_nodata_value(*v))
  }

  pub fn valid_count(&self) -> usize {
    self.valid_values().count()
  }

  pub fn is_conformant(&self, other: &GridField) -> bool {
    self.geometry.is_conformant(&other.geometry)
  }

  /// Applies `f` to every valid cell; missing cells stay missing.
  pub fn map<F>(&self, f: F) -> GridField
  where
    F: Fn(f64) -> f64,
  {
    let nodata = self.nodata;
    let data = self
      .data
      .mapv(|v| if v.is_nan() || v == nodata { nodata } else { f(v) });
    Self {
      geometry: self.geometry,
      data,
      nodata,
    }
  }

  /// Cell-by-cell combination of two conformant fields. A cell missing in
  /// either input is missing in the output, which keeps `self`'s sentinel.
  pub fn zip_map<F>(&self, other: &GridField, f: F) -> Result<GridField, ConstructionError>
  where
    F: Fn(f64, f64) -> f64,
  {
    if !self.is_conformant(other) {
      return Err(ConstructionError::GridGeometryMismatch(format!(
        "{:?} vs {:?}",
        self.geometry, other.geometry
      )));
    }

    let nodata = self.nodata;
    let mut data = Array2::from_elem(self.geometry.shape(), nodata);
    Zip::from(&mut data)
      .and(&self.data)
      .and(&other.data)
      .for_each(|out, &a, &b| {
        if !self.is_nodata_value(a) && !other.is_nodata_value(b) {
          *out = f(a, b);
        }
      });

    Ok(Self {
      geometry: self.geometry,
      data,
      nodata,
    })
  }

  /// Number of valid cells satisfying `pred`.
  pub fn count_where<P>(&self, pred: P) -> usize
  where
    P: Fn(f64) -> bool,
  {
    self.valid_values().filter(|v| pred(*v)).count()
  }

  /// Re-encodes missing cells with a new sentinel.
  pub fn with_nodata(&self, nodata: f64) -> Result<GridField, ConstructionError> {
    let data = self
      .data
      .mapv(|v| if self.is_nodata_value(v) { nodata } else { v });
    Self::new(self.geometry, data, nodata)
  }

  pub fn into_array(self) -> Array2<f64> {
    self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn geometry() -> GridGeometry {
    GridGeometry::square(2, 3, 10.0).unwrap()
  }

  #[test]
  fn rejects_shape_mismatch() {
    let err = GridField::from_vec(geometry(), vec![1.0; 5], DEFAULT_NODATA).unwrap_err();
    assert!(matches!(err, ConstructionError::GridGeometryMismatch(_)));
    let err = GridField::new(geometry(), Array2::zeros((3, 2)), DEFAULT_NODATA).unwrap_err();
    assert!(matches!(err, ConstructionError::GridGeometryMismatch(_)));
  }

  #[test]
  fn sentinel_and_nan_are_missing() {
    let f = GridField::from_vec(
      geometry(),
      vec![1.0, -9999.0, 3.0, f64::NAN, 5.0, 6.0],
      DEFAULT_NODATA,
    )
    .unwrap();
    assert_eq!(f.get(0, 0), Some(1.0));
    assert_eq!(f.get(0, 1), None);
    assert_eq!(f.get(1, 0), None);
    assert_eq!(f.get(5, 5), None);
    assert_eq!(f.valid_count(), 4);
    assert_eq!(f.get_index(5), Some(6.0));
    assert_eq!(f.get_index(6), None);
  }

  #[test]
  fn index_lookup_on_empty_grid_is_missing() {
    let empty = GridField::filled(GridGeometry::square(3, 0, 1.0).unwrap(), 1.0);
    assert_eq!(empty.get_index(0), None);
    assert_eq!(empty.get_index(4), None);
    assert_eq!(empty.valid_count(), 0);
  }

  #[test]
  fn map_preserves_missing_cells() {
    let f = GridField::from_vec(geometry(), vec![1.0, -9999.0, 3.0, 4.0, 5.0, 6.0], DEFAULT_NODATA)
      .unwrap();
    let g = f.map(|v| v * 2.0);
    assert_eq!(g.get(0, 0), Some(2.0));
    assert!(g.is_nodata(0, 1));
    assert_eq!(g.get(1, 2), Some(12.0));
  }

  #[test]
  fn zip_map_propagates_missing_and_checks_conformance() {
    let a = GridField::from_vec(geometry(), vec![2.0, 4.0, -9999.0, 8.0, 10.0, 12.0], DEFAULT_NODATA)
      .unwrap();
    let b = GridField::from_vec(geometry(), vec![1.0, 2.0, 3.0, f64::NAN, 5.0, 6.0], f64::NAN)
      .unwrap();
    let ratio = a.zip_map(&b, |x, y| x / y).unwrap();
    assert_eq!(ratio.get(0, 0), Some(2.0));
    assert!(ratio.is_nodata(0, 2));
    assert!(ratio.is_nodata(1, 0));
    assert_eq!(ratio.get(1, 2), Some(2.0));

    let other = GridField::filled(GridGeometry::square(2, 3, 5.0).unwrap(), 1.0);
    assert!(matches!(
      a.zip_map(&other, |x, _| x),
      Err(ConstructionError::GridGeometryMismatch(_))
    ));
  }

  #[test]
  fn count_where_ignores_missing() {
    let f = GridField::from_vec(geometry(), vec![1.0, 5.0, -9999.0, 7.0, 0.5, 9.0], DEFAULT_NODATA)
      .unwrap();
    assert_eq!(f.count_where(|v| v > 2.0), 3);
  }

  #[test]
  fn with_nodata_rewrites_sentinel() {
    let f = GridField::from_vec(geometry(), vec![1.0, -9999.0, 3.0, 4.0, 5.0, 6.0], DEFAULT_NODATA)
      .unwrap();
    let g = f.with_nodata(-1.0).unwrap();
    assert_eq!(g.data()[[0, 1]], -1.0);
    assert!(g.is_nodata(0, 1));
    assert_eq!(g.get(0, 2), Some(3.0));
  }
}
