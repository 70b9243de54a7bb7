//! # Joint uncertainty model
//!
//! $$
//! \mathbf Z(u) = L_1 \mathbf S(u) + L_0 \mathbf E(u), \qquad L_1 L_1^\top = B_1,\; L_0 L_0^\top = B_0,\; B_1 + B_0 = R
//! $$
//!
//! Linear model of coregionalization: the random variables share one
//! nugget-free spatial structure $\rho_s$; $\mathbf S$ are independent fields
//! with that structure, $\mathbf E$ independent white noise. $B_1$ has
//! diagonal $1 - \nu_i$ and $B_0$ diagonal $\nu_i$, both positive
//! semi-definite.
use std::collections::HashSet;

use nalgebra::DMatrix;
use tracing::warn;

use crate::correlation::CorrelationModel;
use crate::error::ConstructionError;
use crate::grid::GridGeometry;
use crate::linalg::is_positive_semi_definite;
use crate::linalg::is_symmetric;
use crate::linalg::min_eigenvalue;
use crate::linalg::psd_factor;
use crate::linalg::PSD_TOLERANCE;
use crate::variable::UncertainVariable;

const MATRIX_TOLERANCE: f64 = 1e-9;
const SPLIT_SCAN_STEPS: usize = 16;
const SPLIT_BISECTIONS: usize = 40;

/// Mixing factors for the random variables of a joint model.
#[derive(Debug, Clone, PartialEq)]
pub struct Coregionalization {
  members: Vec<usize>,
  structure: CorrelationModel,
  structured_factor: DMatrix<f64>,
  nugget_factor: DMatrix<f64>,
  attenuated: bool,
}

impl Coregionalization {
  fn build(
    members: Vec<usize>,
    structure: CorrelationModel,
    correlation: &DMatrix<f64>,
    nuggets: &[f64],
  ) -> Self {
    let (structured, nugget, attenuated) = match exact_split(correlation, nuggets) {
      Some((structured, nugget)) => (structured, nugget, false),
      None => {
        warn!(
          "nugget fractions {:?} cannot honour the zero-lag cross-correlation exactly; nugget components are mixed proportionally",
          nuggets
        );
        let g: Vec<f64> = nuggets.iter().map(|n| n.sqrt()).collect();
        let k = members.len();
        (
          proportional_split(correlation, nuggets),
          DMatrix::from_fn(k, k, |i, j| correlation[(i, j)] * g[i] * g[j]),
          true,
        )
      }
    };

    Self {
      members,
      structure,
      structured_factor: psd_factor(&structured),
      nugget_factor: psd_factor(&nugget),
      attenuated,
    }
  }

  /// Indices, into the model's variables, of the random variables in mixing order.
  pub fn members(&self) -> &[usize] {
    &self.members
  }

  pub fn len(&self) -> usize {
    self.members.len()
  }

  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  /// Shared nugget-free correlogram simulated for every structured component.
  pub fn structure(&self) -> &CorrelationModel {
    &self.structure
  }

  /// `L₁`, mixing the structured components.
  pub fn structured_factor(&self) -> &DMatrix<f64> {
    &self.structured_factor
  }

  /// `L₀`, mixing the white-noise components.
  pub fn nugget_factor(&self) -> &DMatrix<f64> {
    &self.nugget_factor
  }

  /// True when the zero-lag cross-correlation could only be reproduced in part.
  pub fn is_attenuated(&self) -> bool {
    self.attenuated
  }

  /// Zero-lag correlation the mixing actually produces, `L₁L₁ᵀ + L₀L₀ᵀ`.
  pub fn effective_correlation(&self) -> DMatrix<f64> {
    &self.structured_factor * self.structured_factor.transpose()
      + &self.nugget_factor * self.nugget_factor.transpose()
  }
}

/// Validated set of uncertain variables with their zero-lag cross-correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct JointUncertaintyModel {
  variables: Vec<UncertainVariable>,
  cross_correlation: DMatrix<f64>,
  geometry: GridGeometry,
  coregionalization: Option<Coregionalization>,
}

impl JointUncertaintyModel {
  pub fn build(
    variables: Vec<UncertainVariable>,
    cross_correlation: DMatrix<f64>,
  ) -> Result<Self, ConstructionError> {
    let first = variables
      .first()
      .ok_or_else(|| ConstructionError::invalid("variables", "at least one variable is required"))?;
    let geometry = *first.geometry();

    let mut seen = HashSet::new();
    for v in &variables {
      if !seen.insert(v.id()) {
        return Err(ConstructionError::invalid(
          "variables",
          format!("duplicate variable id `{}`", v.id()),
        ));
      }
    }

    validate_correlation_matrix(&cross_correlation, variables.len())?;

    let random: Vec<usize> = (0..variables.len())
      .filter(|&i| variables[i].is_random())
      .collect();
    let reference = random
      .first()
      .and_then(|&i| variables[i].correlogram().copied());
    if let Some(expected) = reference {
      for &i in &random {
        let found = variables[i].correlogram();
        if !found.is_some_and(|c| c.is_coregionalizable_with(&expected)) {
          return Err(ConstructionError::IncompatibleCoregionalizationModel {
            id: variables[i].id().to_string(),
            expected: expected.without_nugget().to_string(),
            found: found.map(|c| c.without_nugget().to_string()).unwrap_or_default(),
          });
        }
      }
    }

    for v in &variables {
      if !v.geometry().is_conformant(&geometry) {
        return Err(ConstructionError::GridGeometryMismatch(format!(
          "variable `{}` is not conformant with variable `{}`",
          v.id(),
          first.id()
        )));
      }
    }

    let coregionalization = reference.map(|expected| {
      let k = random.len();
      let sub = DMatrix::from_fn(k, k, |a, b| cross_correlation[(random[a], random[b])]);
      let nuggets: Vec<f64> = random
        .iter()
        .map(|&i| {
          variables[i]
            .correlogram()
            .map_or(0.0, CorrelationModel::nugget_fraction)
        })
        .collect();
      Coregionalization::build(random.clone(), expected.without_nugget(), &sub, &nuggets)
    });

    Ok(Self {
      variables,
      cross_correlation,
      geometry,
      coregionalization,
    })
  }

  /// Variables with no cross-correlation.
  pub fn independent(variables: Vec<UncertainVariable>) -> Result<Self, ConstructionError> {
    let n = variables.len();
    Self::build(variables, DMatrix::identity(n, n))
  }

  pub fn single(variable: UncertainVariable) -> Result<Self, ConstructionError> {
    Self::independent(vec![variable])
  }

  pub fn variables(&self) -> &[UncertainVariable] {
    &self.variables
  }

  pub fn variable(&self, id: &str) -> Option<&UncertainVariable> {
    self.variables.iter().find(|v| v.id() == id)
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.variables.iter().map(UncertainVariable::id)
  }

  pub fn len(&self) -> usize {
    self.variables.len()
  }

  pub fn is_empty(&self) -> bool {
    self.variables.is_empty()
  }

  pub fn cross_correlation(&self) -> &DMatrix<f64> {
    &self.cross_correlation
  }

  /// Grid shared by every variable's mean and standard deviation.
  pub fn geometry(&self) -> &GridGeometry {
    &self.geometry
  }

  /// `None` when every variable is deterministic.
  pub fn coregionalization(&self) -> Option<&Coregionalization> {
    self.coregionalization.as_ref()
  }
}

/// `R ∘ s sᵀ` with `s_i = sqrt(1 - nugget_i)`.
fn proportional_split(correlation: &DMatrix<f64>, nuggets: &[f64]) -> DMatrix<f64> {
  let s: Vec<f64> = nuggets.iter().map(|n| (1.0 - n).sqrt()).collect();
  let k = s.len();
  DMatrix::from_fn(k, k, |i, j| correlation[(i, j)] * s[i] * s[j])
}

/// Structured and nugget parts `B₁ + B₀ = R`, both PSD, with diagonals
/// `1 - nugget_i` and `nugget_i`.
///
/// Off-diagonals of `B₁` move along `(1 - t) · R ∘ s sᵀ + t · clamp(R, ±s sᵀ)`
/// and the smallest feasible `t` is kept. Both PSD constraints are convex in
/// `t`, so the feasible set is an interval, located by a coarse scan and then
/// refined by bisection. `None` when no `t` works.
fn exact_split(correlation: &DMatrix<f64>, nuggets: &[f64]) -> Option<(DMatrix<f64>, DMatrix<f64>)> {
  let k = nuggets.len();
  let s: Vec<f64> = nuggets.iter().map(|n| (1.0 - n).sqrt()).collect();
  let proportional = proportional_split(correlation, nuggets);
  let clamped = DMatrix::from_fn(k, k, |i, j| {
    if i == j {
      proportional[(i, i)]
    } else {
      let bound = s[i] * s[j];
      correlation[(i, j)].clamp(-bound, bound)
    }
  });

  let split = |t: f64| {
    let structured = &proportional * (1.0 - t) + &clamped * t;
    let nugget = correlation - &structured;
    (is_positive_semi_definite(&structured) && is_positive_semi_definite(&nugget))
      .then_some((structured, nugget))
  };

  if let Some(found) = split(0.0) {
    return Some(found);
  }

  let mut hi = (1..=SPLIT_SCAN_STEPS)
    .map(|i| i as f64 / SPLIT_SCAN_STEPS as f64)
    .find(|&t| split(t).is_some())?;
  let mut lo = hi - 1.0 / SPLIT_SCAN_STEPS as f64;
  for _ in 0..SPLIT_BISECTIONS {
    let mid = 0.5 * (lo + hi);
    if split(mid).is_some() {
      hi = mid;
    } else {
      lo = mid;
    }
  }
  split(hi)
}

fn validate_correlation_matrix(r: &DMatrix<f64>, n: usize) -> Result<(), ConstructionError> {
  if r.shape() != (n, n) {
    return Err(ConstructionError::invalid(
      "cross_correlation",
      format!("expected a {n}x{n} matrix, got {:?}", r.shape()),
    ));
  }
  if r.iter().any(|v| !v.is_finite() || v.abs() > 1.0 + MATRIX_TOLERANCE) {
    return Err(ConstructionError::invalid(
      "cross_correlation",
      "entries must be finite and lie in [-1, 1]",
    ));
  }
  if !is_symmetric(r, MATRIX_TOLERANCE) {
    return Err(ConstructionError::invalid(
      "cross_correlation",
      "matrix must be symmetric",
    ));
  }
  if r.diagonal().iter().any(|d| (d - 1.0).abs() > MATRIX_TOLERANCE) {
    return Err(ConstructionError::invalid(
      "cross_correlation",
      "diagonal entries must be 1",
    ));
  }

  let min_eigenvalue = min_eigenvalue(r);
  if min_eigenvalue < -PSD_TOLERANCE {
    return Err(ConstructionError::NonPositiveSemiDefiniteCorrelation { min_eigenvalue });
  }
  Ok(())
}
