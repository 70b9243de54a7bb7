use std::hint::black_box;

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use spatial_propagation::simulation::SimulationPlan;
use spatial_propagation::CorrelationModel;
use spatial_propagation::FieldSimulator;
use spatial_propagation::GridField;
use spatial_propagation::GridGeometry;
use spatial_propagation::JointUncertaintyModel;
use spatial_propagation::Marginal;
use spatial_propagation::SimulationConfig;
use spatial_propagation::UncertainVariable;

fn joint_model(grid: GridGeometry) -> JointUncertaintyModel {
  let a = UncertainVariable::new(
    "a",
    GridField::filled(grid, 2.0),
    0.3,
    CorrelationModel::spherical(20.0, 0.4).unwrap(),
    Marginal::Normal,
  )
  .unwrap();
  let b = UncertainVariable::new(
    "b",
    GridField::filled(grid, 0.15),
    0.02,
    CorrelationModel::spherical(20.0, 0.6).unwrap(),
    Marginal::LogNormal,
  )
  .unwrap();
  let r = DMatrix::from_row_slice(2, 2, &[1.0, 0.7, 0.7, 1.0]);
  JointUncertaintyModel::build(vec![a, b], r).unwrap()
}

fn bench_plan(c: &mut Criterion) {
  let mut group = c.benchmark_group("SimulationPlan::build");
  let model = CorrelationModel::spherical(20.0, 0.0).unwrap();

  for &side in &[32usize, 64] {
    let grid = GridGeometry::square(side, side, 1.0).unwrap();
    for &k in &[8usize, 24] {
      group.bench_with_input(BenchmarkId::new(format!("{side}x{side}"), k), &k, |b, &k| {
        b.iter(|| {
          let mut rng = Pcg64::seed_from_u64(1);
          black_box(SimulationPlan::build(&grid, &model, k, None, &mut rng).unwrap())
        })
      });
    }
  }
  group.finish();
}

fn bench_realize(c: &mut Criterion) {
  let mut group = c.benchmark_group("FieldSimulator::realize");
  let grid = GridGeometry::square(64, 64, 1.0).unwrap();
  let model = joint_model(grid);

  for &k in &[8usize, 24] {
    let sim = FieldSimulator::new(&model, grid, SimulationConfig::default().with_neighbor_limit(k)).unwrap();
    let mut draw = 0;
    group.bench_function(BenchmarkId::new("64x64 two variables", k), |b| {
      b.iter(|| {
        draw += 1;
        black_box(sim.realize(draw).unwrap())
      })
    });
  }
  group.finish();
}

criterion_group!(benches, bench_plan, bench_realize);
criterion_main!(benches);
