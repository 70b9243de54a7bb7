//! # Ensemble
//!
//! $$
//! Y_i = g\big(X^{(i)}_1, \dots, X^{(i)}_K\big), \qquad i = 0, \dots, n - 1
//! $$
//!
//! Monte-Carlo propagation: every draw's realization is passed through a
//! caller-supplied derived-quantity function `g`. `g` must be a pure function
//! of its input fields; hidden state invalidates the ensemble statistics.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use indicatif::ProgressBar;
use indicatif::ProgressDrawTarget;
use indicatif::ProgressStyle;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::debug;
use tracing::info;

use crate::error::AggregationError;
use crate::error::DerivationError;
use crate::error::EnsembleError;
use crate::error::SimulationError;
use crate::grid::GridField;
use crate::grid::GridGeometry;
use crate::joint::JointUncertaintyModel;
use crate::simulation::FieldSimulator;
use crate::simulation::Realization;
use crate::simulation::SimulationConfig;
use crate::summary;
use crate::summary::CellwiseSummary;
use crate::summary::ScalarSummary;
use crate::traits::SamplerExt;

/// Cooperative cancellation flag shared between a caller and running ensembles.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Derived-quantity outputs indexed by draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble<R> {
  seed: u64,
  members: Vec<R>,
}

impl<R> Ensemble<R> {
  pub fn new(seed: u64, members: Vec<R>) -> Self {
    Self { seed, members }
  }

  pub fn seed(&self) -> u64 {
    self.seed
  }

  /// Output of draw `draw`.
  pub fn get(&self, draw: usize) -> Option<&R> {
    self.members.get(draw)
  }

  pub fn members(&self) -> &[R] {
    &self.members
  }

  pub fn iter(&self) -> std::slice::Iter<'_, R> {
    self.members.iter()
  }

  pub fn len(&self) -> usize {
    self.members.len()
  }

  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  pub fn into_members(self) -> Vec<R> {
    self.members
  }
}

impl Ensemble<GridField> {
  pub fn mean(&self) -> Result<GridField, AggregationError> {
    summary::cellwise_mean(&self.members)
  }

  pub fn stddev(&self) -> Result<GridField, AggregationError> {
    summary::cellwise_stddev(&self.members)
  }

  pub fn quantile(&self, q: f64) -> Result<GridField, AggregationError> {
    summary::cellwise_quantile(&self.members, q)
  }

  pub fn exceedance_probability(&self, threshold: f64) -> Result<GridField, AggregationError> {
    summary::cellwise_exceedance(&self.members, threshold)
  }

  pub fn summarize(&self, quantiles: &[f64]) -> Result<CellwiseSummary, AggregationError> {
    summary::cellwise_summary(&self.members, quantiles)
  }

  pub fn scalar_statistic<F>(&self, reducer: F) -> Result<ScalarSummary, AggregationError>
  where
    F: Fn(&GridField) -> f64 + Sync + Send,
  {
    summary::scalar_statistic(&self.members, reducer)
  }
}

impl Ensemble<f64> {
  pub fn summarize(&self) -> ScalarSummary {
    ScalarSummary::new(self.members.clone())
  }
}

/// Drives realizations through a derived-quantity function.
///
/// The first failing draw (lowest index) aborts the run; draws with a higher
/// index are skipped once a failure is known. Cancellation is checked at
/// every draw boundary and a cancelled run returns no members.
#[derive(Debug, Clone, Default)]
pub struct EnsembleDriver {
  config: SimulationConfig,
  cancel: CancellationToken,
  progress: bool,
}

impl EnsembleDriver {
  pub fn new(config: SimulationConfig) -> Self {
    Self {
      config,
      ..Self::default()
    }
  }

  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancel = token;
    self
  }

  /// Draws a terminal progress bar while running.
  pub fn with_progress(mut self, progress: bool) -> Self {
    self.progress = progress;
    self
  }

  pub fn config(&self) -> &SimulationConfig {
    &self.config
  }

  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Simulates `n` draws of `model` on `geometry` and derives one output per draw.
  pub fn run<R, F>(
    &self,
    model: &JointUncertaintyModel,
    geometry: &GridGeometry,
    n: usize,
    derive: F,
  ) -> Result<Ensemble<R>, EnsembleError>
  where
    R: Send,
    F: Fn(&Realization) -> anyhow::Result<R> + Sync + Send,
  {
    let simulator = FieldSimulator::new(model, *geometry, self.config)?;
    self.run_with(&simulator, n, derive)
  }

  /// Like [`EnsembleDriver::run`] for any realization sampler.
  pub fn run_with<S, R, F>(&self, sampler: &S, n: usize, derive: F) -> Result<Ensemble<R>, EnsembleError>
  where
    S: SamplerExt<Output = Realization, Error = SimulationError>,
    R: Send,
    F: Fn(&Realization) -> anyhow::Result<R> + Sync + Send,
  {
    info!(draws = n, seed = self.config.seed, threads = ?self.config.threads, "starting ensemble run");
    let run = || self.execute(sampler, n, &derive);
    let members = match self.config.threads {
      Some(threads) => ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| EnsembleError::ThreadPool(e.to_string()))?
        .install(run)?,
      None => run()?,
    };
    info!(draws = members.len(), "ensemble run finished");
    Ok(Ensemble::new(self.config.seed, members))
  }

  fn execute<S, R, F>(&self, sampler: &S, n: usize, derive: &F) -> Result<Vec<R>, EnsembleError>
  where
    S: SamplerExt<Output = Realization, Error = SimulationError>,
    R: Send,
    F: Fn(&Realization) -> anyhow::Result<R> + Sync + Send,
  {
    let failed = AtomicUsize::new(usize::MAX);
    let completed = AtomicUsize::new(0);
    let bar = self.progress_bar(n);

    let outcomes: Vec<Option<Result<R, EnsembleError>>> = (0..n)
      .into_par_iter()
      .map(|draw| {
        if self.cancel.is_cancelled() || draw > failed.load(Ordering::SeqCst) {
          return None;
        }
        let outcome = sampler
          .sample_draw(draw)
          .map_err(EnsembleError::from)
          .and_then(|realization| {
            derive(&realization).map_err(|source| DerivationError { draw, source }.into())
          });
        match &outcome {
          Ok(_) => {
            completed.fetch_add(1, Ordering::SeqCst);
            bar.inc(1);
          }
          Err(e) => {
            debug!(draw, error = %e, "draw failed");
            failed.fetch_min(draw, Ordering::SeqCst);
          }
        }
        Some(outcome)
      })
      .collect();
    bar.finish_and_clear();

    let first_failure = failed.load(Ordering::SeqCst);
    if first_failure != usize::MAX {
      if let Some(Some(Err(e))) = outcomes.into_iter().nth(first_failure) {
        return Err(e);
      }
      return Err(EnsembleError::Cancelled {
        completed: completed.load(Ordering::SeqCst),
        requested: n,
      });
    }
    if self.cancel.is_cancelled() {
      return Err(EnsembleError::Cancelled {
        completed: completed.load(Ordering::SeqCst),
        requested: n,
      });
    }

    let mut members = Vec::with_capacity(n);
    for (draw, outcome) in outcomes.into_iter().enumerate() {
      match outcome {
        Some(Ok(member)) => members.push(member),
        Some(Err(e)) => return Err(e),
        None => {
          return Err(EnsembleError::Cancelled {
            completed: draw,
            requested: n,
          })
        }
      }
    }
    Ok(members)
  }

  fn progress_bar(&self, n: usize) -> ProgressBar {
    if !self.progress {
      return ProgressBar::hidden();
    }
    let bar = ProgressBar::with_draw_target(Some(n as u64), ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} draws ({eta})") {
      bar.set_style(style);
    }
    bar
  }
}
