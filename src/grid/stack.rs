use ndarray::s;
use ndarray::Array3;
use ndarray::Axis;

use super::GridField;
use super::GridGeometry;
use crate::error::ConstructionError;

/// Layer-major `(layers, rows, cols)` stack of conformant fields.
///
/// This is the exchange format for raster I/O collaborators; inside the
/// crate an ensemble is an ordered `Vec<GridField>`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStack {
  geometry: GridGeometry,
  data: Array3<f64>,
  nodata: f64,
}

impl FieldStack {
  pub fn new(geometry: GridGeometry, data: Array3<f64>, nodata: f64) -> Result<Self, ConstructionError> {
    let (_, rows, cols) = data.dim();
    if (rows, cols) != geometry.shape() {
      return Err(ConstructionError::GridGeometryMismatch(format!(
        "stack layer shape {:?} does not match grid shape {:?}",
        (rows, cols),
        geometry.shape()
      )));
    }
    Ok(Self {
      geometry,
      data,
      nodata,
    })
  }

  /// Stacks conformant fields; missing cells are re-encoded with the first
  /// field's sentinel.
  pub fn from_fields(fields: &[GridField]) -> Result<Self, ConstructionError> {
    let first = fields
      .first()
      .ok_or_else(|| ConstructionError::invalid("fields", "cannot stack an empty sequence"))?;
    let geometry = *first.geometry();
    let nodata = first.nodata();
    let (rows, cols) = geometry.shape();
    let mut data = Array3::from_elem((fields.len(), rows, cols), nodata);

    for (i, field) in fields.iter().enumerate() {
      if !field.geometry().is_conformant(&geometry) {
        return Err(ConstructionError::GridGeometryMismatch(format!(
          "field {i} is not conformant with field 0"
        )));
      }
      let mut layer = data.index_axis_mut(Axis(0), i);
      layer.zip_mut_with(field.data(), |out, &v| {
        if !field.is_nodata_value(v) {
          *out = v;
        }
      });
    }

    Ok(Self {
      geometry,
      data,
      nodata,
    })
  }

  pub fn geometry(&self) -> &GridGeometry {
    &self.geometry
  }

  pub fn data(&self) -> &Array3<f64> {
    &self.data
  }

  pub fn nodata(&self) -> f64 {
    self.nodata
  }

  pub fn len(&self) -> usize {
    self.data.len_of(Axis(0))
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn layer(&self, index: usize) -> Option<GridField> {
    if index >= self.len() {
      return None;
    }
    let data = self.data.slice(s![index, .., ..]).to_owned();
    Some(GridField::from_parts(self.geometry, data, self.nodata))
  }

  pub fn into_fields(self) -> Vec<GridField> {
    let geometry = self.geometry;
    let nodata = self.nodata;
    self
      .data
      .outer_iter()
      .map(|layer| GridField::from_parts(geometry, layer.to_owned(), nodata))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grid::DEFAULT_NODATA;

  fn geometry() -> GridGeometry {
    GridGeometry::square(2, 2, 1.0).unwrap()
  }

  #[test]
  fn stacking_preserves_layer_order_and_values() {
    let fields: Vec<GridField> = (0..3)
      .map(|k| GridField::from_fn(geometry(), |(r, c)| (k * 10 + r * 2 + c) as f64))
      .collect();
    let stack = FieldStack::from_fields(&fields).unwrap();
    assert_eq!(stack.data().dim(), (3, 2, 2));
    assert_eq!(stack.data()[[2, 1, 0]], 22.0);
    assert_eq!(stack.layer(1).unwrap(), fields[1]);
    assert!(stack.layer(3).is_none());
    assert_eq!(stack.into_fields(), fields);
  }

  #[test]
  fn stacking_unifies_nodata_sentinels() {
    let a = GridField::from_vec(geometry(), vec![1.0, DEFAULT_NODATA, 3.0, 4.0], DEFAULT_NODATA).unwrap();
    let b = GridField::from_vec(geometry(), vec![f64::NAN, 6.0, 7.0, 8.0], f64::NAN).unwrap();
    let stack = FieldStack::from_fields(&[a, b]).unwrap();
    assert_eq!(stack.data()[[1, 0, 0]], DEFAULT_NODATA);
    let layers = stack.into_fields();
    assert!(layers[0].is_nodata(0, 1));
    assert!(layers[1].is_nodata(0, 0));
    assert_eq!(layers[1].get(0, 1), Some(6.0));
  }

  #[test]
  fn stacking_rejects_mismatched_or_empty_input() {
    let a = GridField::filled(geometry(), 1.0);
    let b = GridField::filled(GridGeometry::square(2, 3, 1.0).unwrap(), 1.0);
    assert!(matches!(
      FieldStack::from_fields(&[a, b]),
      Err(ConstructionError::GridGeometryMismatch(_))
    ));
    assert!(FieldStack::from_fields(&[]).is_err());
  }

  #[test]
  fn new_checks_layer_shape() {
    assert!(FieldStack::new(geometry(), Array3::zeros((4, 2, 2)), DEFAULT_NODATA).is_ok());
    assert!(FieldStack::new(geometry(), Array3::zeros((4, 3, 2)), DEFAULT_NODATA).is_err());
  }
}
