//! # Simulation
//!
//! $$
//! Z(u_s) = \sum_{j \in \mathcal N_s} \lambda_j Z(u_j) + \sigma_{SK}(u_s)\,\varepsilon_s,
//! \qquad C_{\mathcal N}\lambda = c_0,\quad \sigma^2_{SK} = 1 - \lambda^\top c_0
//! $$
//!
//! Unconditional sequential Gaussian simulation along a random path, each
//! cell conditioned on at most `neighbor_limit` previously simulated cells.
//! With `neighbor_limit >= cells - 1` the simulation is exact.
pub mod config;
pub(crate) mod neighborhood;
pub mod plan;
pub mod rng;
pub mod simulator;

pub use config::PathMode;
pub use config::SimulationConfig;
pub use config::DEFAULT_NEIGHBOR_LIMIT;
pub use config::RECOMMENDED_NEIGHBORS;
pub use plan::SimulationPlan;
pub use simulator::simulate;
pub use simulator::FieldSimulator;
pub use simulator::Realization;
