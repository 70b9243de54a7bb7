use nalgebra::DMatrix;
use spatial_propagation::summary::count_exceeding;
use spatial_propagation::CorrelationModel;
use spatial_propagation::EnsembleDriver;
use spatial_propagation::GridField;
use spatial_propagation::GridGeometry;
use spatial_propagation::JointUncertaintyModel;
use spatial_propagation::Marginal;
use spatial_propagation::Realization;
use spatial_propagation::SimulationConfig;
use spatial_propagation::UncertainVariable;

// Soil carbon and nitrogen on a 5x5 grid of 1 km cells; derived quantity is C/N.
fn main() -> anyhow::Result<()> {
  let grid = GridGeometry::new(5, 5, (0.0, 5000.0), (1000.0, 1000.0))?;

  let carbon = UncertainVariable::new(
    "C",
    GridField::filled(grid, 2.0),
    0.3,
    CorrelationModel::spherical(5000.0, 0.4)?,
    Marginal::Normal,
  )?;
  let nitrogen = UncertainVariable::new(
    "N",
    GridField::filled(grid, 0.15),
    0.02,
    CorrelationModel::spherical(5000.0, 0.6)?,
    Marginal::Normal,
  )?;
  let cross = DMatrix::from_row_slice(2, 2, &[1.0, 0.7, 0.7, 1.0]);
  let model = JointUncertaintyModel::build(vec![carbon, nitrogen], cross)?;

  let config = SimulationConfig::default()
    .with_neighbor_limit(20)
    .with_seed(20_240_611);
  let ratio = |r: &Realization| -> anyhow::Result<GridField> {
    let c = r.require("C")?;
    let n = r.require("N")?;
    Ok(c.zip_map(n, |c, n| c / n)?)
  };
  let ensemble = EnsembleDriver::new(config)
    .with_progress(true)
    .run(&model, &grid, 500, ratio)?;

  let summary = ensemble.summarize(&[0.05, 0.5, 0.95])?;
  println!("C/N over {} draws (seed {})", ensemble.len(), ensemble.seed());
  print_field("mean", &summary.mean);
  print_field("sd", &summary.stddev);
  for (q, field) in &summary.quantiles {
    print_field(&format!("q{:02}", (q * 100.0).round()), field);
  }

  let counts = ensemble.scalar_statistic(count_exceeding(14.0))?;
  println!(
    "cells with C/N > 14: mean {:.2}, sd {:.2}, 90% in [{}, {}]",
    counts.mean()?,
    counts.stddev()?,
    counts.quantile(0.05)?,
    counts.quantile(0.95)?
  );

  Ok(())
}

fn print_field(name: &str, field: &GridField) {
  println!("{name}:");
  for row in field.data().rows() {
    let cells: Vec<String> = row.iter().map(|v| format!("{v:7.3}")).collect();
    println!("  {}", cells.join(" "));
  }
}
