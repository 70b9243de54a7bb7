use std::borrow::Cow;
use std::collections::BTreeMap;

use anyhow::anyhow;
use ndarray::Array1;
use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::debug;
use tracing::warn;

use super::config::PathMode;
use super::config::SimulationConfig;
use super::plan::SimulationPlan;
use super::rng::stream_rng;
use super::rng::Stream;
use super::rng::SHARED_DRAW;
use crate::error::SimulationError;
use crate::grid::GridField;
use crate::grid::GridGeometry;
use crate::joint::Coregionalization;
use crate::joint::JointUncertaintyModel;
use crate::traits::SamplerExt;

/// One joint draw: a field per variable id.
#[derive(Debug, Clone, PartialEq)]
pub struct Realization {
  draw: usize,
  fields: BTreeMap<String, GridField>,
}

impl Realization {
  pub fn draw(&self) -> usize {
    self.draw
  }

  pub fn get(&self, id: &str) -> Option<&GridField> {
    self.fields.get(id)
  }

  /// Like [`Realization::get`], for use inside derived-quantity functions.
  pub fn require(&self, id: &str) -> anyhow::Result<&GridField> {
    self
      .fields
      .get(id)
      .ok_or_else(|| anyhow!("realization {} has no variable `{id}`", self.draw))
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &GridField)> {
    self.fields.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  pub fn into_fields(self) -> BTreeMap<String, GridField> {
    self.fields
  }
}

/// Neighbour-limited sequential Gaussian simulation of a joint model.
///
/// Every draw simulates one independent structured field per random
/// variable on a shared kriging plan, draws one white-noise field per random
/// variable, mixes both sets with the coregionalization factors and applies
/// each variable's marginal transform.
#[derive(Debug, Clone)]
pub struct FieldSimulator<'a> {
  model: &'a JointUncertaintyModel,
  geometry: GridGeometry,
  config: SimulationConfig,
  shared_plan: Option<SimulationPlan>,
  warnings: Vec<SimulationError>,
}

impl<'a> FieldSimulator<'a> {
  pub fn new(
    model: &'a JointUncertaintyModel,
    geometry: GridGeometry,
    config: SimulationConfig,
  ) -> Result<Self, SimulationError> {
    config.validate()?;
    if geometry.is_empty() {
      return Err(SimulationError::InvalidGridGeometry(format!(
        "grid {:?} has no cells",
        geometry.shape()
      )));
    }
    if !geometry.is_conformant(model.geometry()) {
      return Err(SimulationError::InvalidGridGeometry(format!(
        "target grid {:?} is not conformant with the model grid {:?}",
        geometry,
        model.geometry()
      )));
    }

    let mut warnings = Vec::new();
    let mut shared_plan = None;
    if let Some(coreg) = model.coregionalization() {
      if let Some(w) = config.neighbor_warning(geometry.len()) {
        warn!("{w}");
        warnings.push(w);
      }
      if config.path == PathMode::Shared {
        let mut rng = stream_rng(config.seed, SHARED_DRAW, Stream::Path);
        shared_plan = Some(SimulationPlan::build(
          &geometry,
          coreg.structure(),
          config.neighbor_limit,
          config.search_radius,
          &mut rng,
        )?);
      }
    }

    Ok(Self {
      model,
      geometry,
      config,
      shared_plan,
      warnings,
    })
  }

  pub fn model(&self) -> &JointUncertaintyModel {
    self.model
  }

  pub fn geometry(&self) -> &GridGeometry {
    &self.geometry
  }

  pub fn config(&self) -> &SimulationConfig {
    &self.config
  }

  /// Non-fatal conditions detected at construction.
  pub fn warnings(&self) -> &[SimulationError] {
    &self.warnings
  }

  /// Draw number `draw` of the ensemble seeded by `config.seed`.
  pub fn realize(&self, draw: usize) -> Result<Realization, SimulationError> {
    let mut scores: Vec<Option<Array2<f64>>> = vec![None; self.model.len()];
    if let Some(coreg) = self.model.coregionalization() {
      for (&idx, z) in coreg.members().iter().zip(self.mixed_scores(coreg, draw)?) {
        scores[idx] = Some(z);
      }
    }

    let fields = self
      .model
      .variables()
      .iter()
      .zip(scores)
      .map(|(variable, z)| {
        let field = match z {
          Some(z) => variable.transform_scores(&z),
          None => variable.mean().clone(),
        };
        (variable.id().to_string(), field)
      })
      .collect();

    Ok(Realization { draw, fields })
  }

  /// `n` draws, in draw order, computed in parallel.
  pub fn simulate(&self, n: usize) -> Result<Vec<Realization>, SimulationError> {
    match self.config.threads {
      Some(threads) => {
        let pool = ThreadPoolBuilder::new()
          .num_threads(threads)
          .build()
          .map_err(|e| SimulationError::InvalidConfig(format!("worker pool: {e}")))?;
        pool.install(|| self.sample_par(n))
      }
      None => self.sample_par(n),
    }
  }

  /// Correlated standard-normal scores of the random variables, in
  /// coregionalization order.
  fn mixed_scores(
    &self,
    coreg: &Coregionalization,
    draw: usize,
  ) -> Result<Vec<Array2<f64>>, SimulationError> {
    let seed = self.config.seed;
    let draw_id = draw as u64;
    let plan = match &self.shared_plan {
      Some(plan) => Cow::Borrowed(plan),
      None => {
        let mut rng = stream_rng(seed, draw_id, Stream::Path);
        Cow::Owned(SimulationPlan::build(
          &self.geometry,
          coreg.structure(),
          self.config.neighbor_limit,
          self.config.search_radius,
          &mut rng,
        )?)
      }
    };

    let k = coreg.len();
    let cells = self.geometry.len();
    let structured: Vec<Vec<f64>> = (0..k)
      .into_par_iter()
      .map(|c| plan.simulate(&mut stream_rng(seed, draw_id, Stream::Structured(c))))
      .collect();
    let nugget: Vec<Array1<f64>> = (0..k)
      .map(|c| {
        let mut rng = stream_rng(seed, draw_id, Stream::Nugget(c));
        Array1::random_using(cells, StandardNormal, &mut rng)
      })
      .collect();

    let l1 = coreg.structured_factor();
    let l0 = coreg.nugget_factor();
    let (rows, cols) = self.geometry.shape();
    let scores = (0..k)
      .map(|a| {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
          let cell = r * cols + c;
          (0..k)
            .map(|b| l1[(a, b)] * structured[b][cell] + l0[(a, b)] * nugget[b][cell])
            .sum::<f64>()
        })
      })
      .collect();

    debug!(draw, components = k, "mixed coregionalized scores");
    Ok(scores)
  }
}

impl SamplerExt for FieldSimulator<'_> {
  type Output = Realization;
  type Error = SimulationError;

  fn sample_draw(&self, draw: usize) -> Result<Realization, SimulationError> {
    self.realize(draw)
  }
}

/// `n` realizations of `model` on `geometry`, seeded by `seed`.
pub fn simulate(
  model: &JointUncertaintyModel,
  geometry: &GridGeometry,
  n: usize,
  neighbor_limit: usize,
  seed: u64,
) -> Result<Vec<Realization>, SimulationError> {
  let config = SimulationConfig::default()
    .with_neighbor_limit(neighbor_limit)
    .with_seed(seed);
  FieldSimulator::new(model, *geometry, config)?.simulate(n)
}
