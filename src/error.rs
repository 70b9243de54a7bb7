//! # Errors
//!
//! $$
//! \text{inputs} \xrightarrow{\text{build}} \text{model} \xrightarrow{\text{simulate}} \text{realizations} \xrightarrow{\text{derive}} \text{ensemble} \xrightarrow{\text{aggregate}} \text{summary}
//! $$
//!
//! One error type per stage, so validation failures stay distinguishable from
//! numerical-engine failures.
use thiserror::Error;

/// Invalid inputs rejected while building grids, correlograms, variables or the joint model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
  #[error("invalid parameter `{name}`: {reason}")]
  InvalidParameter { name: &'static str, reason: String },

  #[error("cross-correlation matrix is not positive semi-definite (smallest eigenvalue {min_eigenvalue:.3e})")]
  NonPositiveSemiDefiniteCorrelation { min_eigenvalue: f64 },

  #[error("variable `{id}` has correlogram {found}, coregionalization requires {expected}")]
  IncompatibleCoregionalizationModel {
    id: String,
    expected: String,
    found: String,
  },

  #[error("grid geometry mismatch: {0}")]
  GridGeometryMismatch(String),
}

impl ConstructionError {
  pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidParameter {
      name,
      reason: reason.into(),
    }
  }
}

/// Failures of the field simulator.
///
/// `NeighborLimitTooSmall` is a warning condition: it is recorded by the
/// simulator and logged, never returned as `Err`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
  #[error("invalid grid geometry: {0}")]
  InvalidGridGeometry(String),

  #[error("neighbor limit {limit} is below the recommended {recommended}; spatial structure will be under-represented")]
  NeighborLimitTooSmall { limit: usize, recommended: usize },

  #[error("invalid simulation config: {0}")]
  InvalidConfig(String),

  #[error("kriging system for cell {cell} could not be factorized")]
  SingularKrigingSystem { cell: usize },
}

/// A caller-supplied derived-quantity function failed on one draw.
#[derive(Debug, Error)]
#[error("derivation failed on draw {draw}: {source}")]
pub struct DerivationError {
  pub draw: usize,
  #[source]
  pub source: anyhow::Error,
}

/// Failures of the summary aggregator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
  #[error("ensemble member {index} is not conformant with member 0")]
  GridGeometryMismatch { index: usize },

  #[error("need at least {required} samples, found {found}")]
  InsufficientSamples { required: usize, found: usize },

  #[error("quantile {0} is outside [0, 1]")]
  InvalidQuantile(f64),
}

/// Outcome of an aborted ensemble run.
///
/// `Cancelled` is not a failure, but a cancelled run never yields a summary.
#[derive(Debug, Error)]
pub enum EnsembleError {
  #[error(transparent)]
  Simulation(#[from] SimulationError),

  #[error(transparent)]
  Derivation(#[from] DerivationError),

  #[error("ensemble run cancelled after {completed} of {requested} draws")]
  Cancelled { completed: usize, requested: usize },

  #[error("failed to build worker pool: {0}")]
  ThreadPool(String),
}
