//! # spatial-propagation
//!
//! $$
//! \hat\mu_Y(u) = \frac1n \sum_{i=0}^{n-1} g\big(X^{(i)}\big)(u), \qquad X^{(i)} \sim \text{LMC}(\rho, R)
//! $$
//!
//! Monte-Carlo uncertainty propagation through spatially cross-correlated
//! random fields.
//!
//! - [`grid`]: raster geometry, fields with a no-data sentinel, stacked layers
//! - [`correlation`], [`marginal`], [`variable`]: one uncertain input
//! - [`joint`]: cross-correlated inputs under a linear model of coregionalization
//! - [`simulation`]: neighbour-limited sequential Gaussian simulation
//! - [`ensemble`]: parallel, reproducible, cancellable propagation runs
//! - [`summary`]: cell-wise and scalar statistics of an ensemble
pub mod correlation;
pub mod ensemble;
pub mod error;
pub mod grid;
pub mod joint;
pub mod linalg;
pub mod marginal;
pub mod simulation;
pub mod summary;
pub mod traits;
pub mod variable;

pub use correlation::CorrelationModel;
pub use correlation::CorrelogramFamily;
pub use correlation::MaternSmoothness;
pub use ensemble::CancellationToken;
pub use ensemble::Ensemble;
pub use ensemble::EnsembleDriver;
pub use error::AggregationError;
pub use error::ConstructionError;
pub use error::DerivationError;
pub use error::EnsembleError;
pub use error::SimulationError;
pub use grid::FieldStack;
pub use grid::GridField;
pub use grid::GridGeometry;
pub use joint::JointUncertaintyModel;
pub use marginal::Marginal;
pub use simulation::FieldSimulator;
pub use simulation::PathMode;
pub use simulation::Realization;
pub use simulation::SimulationConfig;
pub use variable::StdDev;
pub use variable::UncertainVariable;
