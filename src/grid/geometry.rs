use crate::error::ConstructionError;

/// North-up affine grid geometry.
///
/// The origin is the upper-left corner of cell `(0, 0)`; rows grow southward
/// and columns eastward. Two geometries are conformant when every parameter
/// is identical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
  rows: usize,
  cols: usize,
  origin: (f64, f64),
  cell_size: (f64, f64),
}

impl GridGeometry {
  pub fn new(
    rows: usize,
    cols: usize,
    origin: (f64, f64),
    cell_size: (f64, f64),
  ) -> Result<Self, ConstructionError> {
    if !origin.0.is_finite() || !origin.1.is_finite() {
      return Err(ConstructionError::invalid(
        "origin",
        format!("must be finite, got {origin:?}"),
      ));
    }
    if !(cell_size.0.is_finite() && cell_size.0 > 0.0 && cell_size.1.is_finite() && cell_size.1 > 0.0)
    {
      return Err(ConstructionError::invalid(
        "cell_size",
        format!("must be positive and finite, got {cell_size:?}"),
      ));
    }

    Ok(Self {
      rows,
      cols,
      origin,
      cell_size,
    })
  }

  /// Square cells anchored at the origin `(0, 0)`.
  pub fn square(rows: usize, cols: usize, cell_size: f64) -> Result<Self, ConstructionError> {
    Self::new(rows, cols, (0.0, 0.0), (cell_size, cell_size))
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn shape(&self) -> (usize, usize) {
    (self.rows, self.cols)
  }

  /// Number of cells.
  pub fn len(&self) -> usize {
    self.rows * self.cols
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn origin(&self) -> (f64, f64) {
    self.origin
  }

  pub fn cell_size(&self) -> (f64, f64) {
    self.cell_size
  }

  /// `(xmin, ymin, xmax, ymax)`
  pub fn extent(&self) -> (f64, f64, f64, f64) {
    let (x0, y0) = self.origin;
    let (dx, dy) = self.cell_size;
    (
      x0,
      y0 - self.rows as f64 * dy,
      x0 + self.cols as f64 * dx,
      y0,
    )
  }

  /// Map coordinates of the centre of cell `(row, col)`.
  pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
    let (x0, y0) = self.origin;
    let (dx, dy) = self.cell_size;
    (
      x0 + (col as f64 + 0.5) * dx,
      y0 - (row as f64 + 0.5) * dy,
    )
  }

  /// Row-major linear index of `(row, col)`.
  pub fn cell_index(&self, row: usize, col: usize) -> Option<usize> {
    (row < self.rows && col < self.cols).then(|| row * self.cols + col)
  }

  /// Inverse of [`GridGeometry::cell_index`].
  pub fn cell_position(&self, index: usize) -> (usize, usize) {
    (index / self.cols, index % self.cols)
  }

  /// Euclidean distance between the centres of two cells.
  pub fn cell_distance(&self, a: (usize, usize), b: (usize, usize)) -> f64 {
    let dr = (a.0 as f64 - b.0 as f64) * self.cell_size.1;
    let dc = (a.1 as f64 - b.1 as f64) * self.cell_size.0;
    (dr * dr + dc * dc).sqrt()
  }

  pub fn is_conformant(&self, other: &GridGeometry) -> bool {
    self == other
  }
}
