//! # Grid
//!
//! $$
//! x_c = x_0 + (c + \tfrac12)\,\Delta x,\qquad y_r = y_0 - (r + \tfrac12)\,\Delta y
//! $$
//!
//! Affine raster geometry, immutable float rasters with a no-data sentinel,
//! and the stacked representation handed to raster I/O collaborators.
pub mod field;
pub mod geometry;
pub mod stack;

pub use field::GridField;
pub use field::DEFAULT_NODATA;
pub use geometry::GridGeometry;
pub use stack::FieldStack;
