//! Criterion benchmarks of the collide-and-stream engines.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lbm_tunnel::d2q9::accelerator::device::DeviceContext;
use lbm_tunnel::d2q9::{self, initialize_grid, Parameters, Session, Q};
use lbm_tunnel::obstacle;
use lbm_tunnel::Grid;
use std::sync::Arc;

const STEPS: usize = 10;

fn initial_grid(height: usize, width: usize, parameters: &Parameters) -> Grid<'static> {
    let mut grid = Grid::new(height, width, Q);
    initialize_grid(&mut grid, parameters);
    grid
}

fn bench_cpu_engines(c: &mut Criterion) {
    let parameters = Parameters::default();
    let mut group = c.benchmark_group("cpu_engines");
    group.sample_size(10);

    for &(height, width) in &[(64, 160), (256, 640)] {
        let obstacle = obstacle::cylinder(height, width);
        let initial = initial_grid(height, width, &parameters);
        group.throughput(Throughput::Elements((height * width * STEPS) as u64));
        let size = format!("{height}x{width}");

        group.bench_with_input(BenchmarkId::new("serial", &size), &initial, |b, initial| {
            let mut grid = initial.clone();
            b.iter(|| {
                d2q9::serial::collide_and_stream(grid.data_handle_mut(), &obstacle, &parameters, STEPS)
            });
        });

        group.bench_with_input(BenchmarkId::new("parallel", &size), &initial, |b, initial| {
            let mut grid = initial.clone();
            b.iter(|| {
                d2q9::parallel::collide_and_stream(
                    grid.data_handle_mut(),
                    &obstacle,
                    &parameters,
                    STEPS,
                )
            });
        });
    }
    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let Ok(context) = DeviceContext::request() else {
        eprintln!("no accelerator adapter, skipping the session benchmark");
        return;
    };
    let context = Arc::new(context);
    let parameters = Parameters::default();
    let (height, width) = (256, 640);
    let obstacle = obstacle::cylinder(height, width);
    let mut grid = initial_grid(height, width, &parameters);

    let mut group = c.benchmark_group("accelerator");
    group.sample_size(10);
    group.throughput(Throughput::Elements((height * width * STEPS) as u64));

    let Ok(mut session) =
        Session::with_context(context, grid.data_handle_mut(), &obstacle, parameters)
    else {
        return;
    };
    group.bench_function("session", |b| {
        b.iter(|| session.step(STEPS).is_ok());
    });
    group.finish();
    let _ = session.terminate();
}

criterion_group!(benches, bench_cpu_engines, bench_session);
criterion_main!(benches);
