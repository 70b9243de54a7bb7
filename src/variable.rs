//! # Uncertain variable
//!
//! $$
//! X(u) = F^{-1}_{m(u), s(u)}\big(\Phi(Z(u))\big), \qquad \operatorname{corr}(Z(u), Z(u + h)) = \rho(|h|)
//! $$
//!
use ndarray::Array2;
use ndarray::Zip;

use crate::correlation::CorrelationModel;
use crate::error::ConstructionError;
use crate::grid::GridField;
use crate::grid::GridGeometry;
use crate::marginal::Marginal;

/// Per-cell standard deviation, either a raster or one value broadcast to
/// every cell.
#[derive(Debug, Clone, PartialEq)]
pub enum StdDev {
  Field(GridField),
  Constant(f64),
}

impl From<f64> for StdDev {
  fn from(value: f64) -> Self {
    Self::Constant(value)
  }
}

impl From<GridField> for StdDev {
  fn from(field: GridField) -> Self {
    Self::Field(field)
  }
}

/// One spatially distributed input known up to its per-cell mean and
/// standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct UncertainVariable {
  id: String,
  is_random: bool,
  marginal: Marginal,
  mean: GridField,
  sd: StdDev,
  correlogram: Option<CorrelationModel>,
}

impl UncertainVariable {
  /// A random variable. `sd` is validated cell by cell against `marginal`.
  pub fn new(
    id: impl Into<String>,
    mean: GridField,
    sd: impl Into<StdDev>,
    correlogram: CorrelationModel,
    marginal: Marginal,
  ) -> Result<Self, ConstructionError> {
    let id = validate_id(id.into())?;
    let sd = sd.into();

    match &sd {
      StdDev::Constant(s) => {
        if !(s.is_finite() && *s >= 0.0) {
          return Err(with_variable(
            &id,
            ConstructionError::invalid("sd", format!("must be finite and non-negative, got {s}")),
          ));
        }
        for m in mean.valid_values() {
          marginal
            .validate(m, *s)
            .map_err(|e| with_variable(&id, e))?;
        }
      }
      StdDev::Field(field) => {
        if !field.is_conformant(&mean) {
          return Err(ConstructionError::GridGeometryMismatch(format!(
            "sd field of `{id}` is not conformant with its mean field"
          )));
        }
        let mut first_err = None;
        Zip::from(mean.data())
          .and(field.data())
          .for_each(|&m, &s| {
            if first_err.is_some() || mean.is_nodata_value(m) || field.is_nodata_value(s) {
              return;
            }
            if let Err(e) = marginal.validate(m, s) {
              first_err = Some(e);
            }
          });
        if let Some(e) = first_err {
          return Err(with_variable(&id, e));
        }
      }
    }

    Ok(Self {
      id,
      is_random: true,
      marginal,
      mean,
      sd,
      correlogram: Some(correlogram),
    })
  }

  /// A variable known exactly; every realization reproduces `mean`.
  pub fn deterministic(id: impl Into<String>, mean: GridField) -> Result<Self, ConstructionError> {
    Ok(Self {
      id: validate_id(id.into())?,
      is_random: false,
      marginal: Marginal::Normal,
      mean,
      sd: StdDev::Constant(0.0),
      correlogram: None,
    })
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn is_random(&self) -> bool {
    self.is_random
  }

  pub fn marginal(&self) -> Marginal {
    self.marginal
  }

  pub fn mean(&self) -> &GridField {
    &self.mean
  }

  pub fn sd(&self) -> &StdDev {
    &self.sd
  }

  /// `None` for deterministic variables.
  pub fn correlogram(&self) -> Option<&CorrelationModel> {
    self.correlogram.as_ref()
  }

  pub fn geometry(&self) -> &GridGeometry {
    self.mean.geometry()
  }

  /// Standard deviation at a cell; `None` when it is missing.
  pub fn sd_at(&self, row: usize, col: usize) -> Option<f64> {
    if !self.is_random {
      return Some(0.0);
    }
    match &self.sd {
      StdDev::Constant(s) => Some(*s),
      StdDev::Field(field) => field.get(row, col),
    }
  }

  /// The standard deviation materialised as a raster on the mean's grid.
  pub fn sd_field(&self) -> GridField {
    match (&self.sd, self.is_random) {
      (StdDev::Field(field), true) => field.clone(),
      (StdDev::Constant(s), true) => GridField::filled(*self.geometry(), *s),
      (_, false) => GridField::filled(*self.geometry(), 0.0),
    }
  }

  /// Turns a raster of standard-normal scores into values of this variable.
  ///
  /// Cells with a missing mean or standard deviation are missing in the
  /// result, which keeps the mean field's sentinel.
  pub(crate) fn transform_scores(&self, scores: &Array2<f64>) -> GridField {
    if !self.is_random {
      return self.mean.clone();
    }

    let nodata = self.mean.nodata();
    let mut out = Array2::from_elem(self.mean.shape(), nodata);
    Zip::indexed(&mut out)
      .and(self.mean.data())
      .and(scores)
      .for_each(|(r, c), out, &m, &z| {
        if self.mean.is_nodata_value(m) {
          return;
        }
        if let Some(s) = self.sd_at(r, c) {
          *out = self.marginal.transform(z, m, s);
        }
      });

    GridField::from_parts(*self.geometry(), out, nodata)
  }
}

fn validate_id(id: String) -> Result<String, ConstructionError> {
  if id.trim().is_empty() {
    return Err(ConstructionError::invalid("id", "variable id must not be empty"));
  }
  Ok(id)
}

fn with_variable(id: &str, err: ConstructionError) -> ConstructionError {
  match err {
    ConstructionError::InvalidParameter { name, reason } => ConstructionError::InvalidParameter {
      name,
      reason: format!("{reason} (variable `{id}`)"),
    },
    other => other,
  }
}
