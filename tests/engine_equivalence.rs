//! Every engine must reproduce the serial reference.

use approx::assert_abs_diff_eq;
use lbm_tunnel::d2q9::{
    self, initialize_grid, set_velocity, CollideAndStream, ParallelEngine, Parameters,
    SerialEngine, Q,
};
use lbm_tunnel::obstacle::{self, ObstacleMask};
use lbm_tunnel::{Float, Grid, LbmError, GRID_TOLERANCE};

fn uniform_grid(height: usize, width: usize, parameters: &Parameters) -> Grid<'static> {
    let mut grid = Grid::new(height, width, Q);
    initialize_grid(&mut grid, parameters);
    grid
}

fn disturbed_grid(height: usize, width: usize, parameters: &Parameters) -> Grid<'static> {
    let mut grid = uniform_grid(height, width, parameters);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let bump = 0.002 * ((3 * x + 5 * y) % 7) as Float;
            set_velocity(
                grid.data_handle_mut(),
                width,
                y,
                x,
                1.0 + bump,
                [0.08, bump - 0.006],
            );
        }
    }
    grid
}

fn assert_grids_close(expected: &Grid<'_>, actual: &Grid<'_>, tolerance: Float) {
    for (a, b) in expected.data_handle().iter().zip(actual.data_handle()) {
        assert_abs_diff_eq!(*a, *b, epsilon = tolerance);
    }
}

/// `None` when the machine has no adapter able to run compute kernels.
fn run_accelerator(
    grid: &mut Grid<'_>,
    obstacle: &ObstacleMask,
    parameters: &Parameters,
    steps: usize,
) -> Option<()> {
    match d2q9::accelerator::collide_and_stream(grid.data_handle_mut(), obstacle, parameters, steps) {
        Ok(()) => Some(()),
        Err(LbmError::AdapterUnavailable) => {
            eprintln!("no accelerator adapter, skipping");
            None
        }
        Err(e) => panic!("accelerator run failed: {e}"),
    }
}

#[test]
fn parallel_matches_serial_on_a_cylinder() {
    let parameters = Parameters::default();
    let obstacle = obstacle::cylinder(48, 96);
    let mut serial = disturbed_grid(48, 96, &parameters);
    let mut parallel = serial.clone();

    SerialEngine::new(parameters)
        .collide_and_stream(serial.data_handle_mut(), &obstacle, 40)
        .unwrap();
    ParallelEngine::new(parameters)
        .collide_and_stream(parallel.data_handle_mut(), &obstacle, 40)
        .unwrap();

    assert_eq!(serial, parallel);
}

#[test]
fn parallel_matches_serial_with_a_private_pool() {
    let parameters = Parameters::new(0.02).with_inflow([0.05, 0.01]);
    let obstacle = obstacle::naca_airfoil(40, 120, 0.04, 0.4, 0.12, 8.0);
    let mut serial = disturbed_grid(40, 120, &parameters);
    let mut parallel = serial.clone();

    d2q9::serial::collide_and_stream(serial.data_handle_mut(), &obstacle, &parameters, 25);
    ParallelEngine::with_threads(parameters, 2)
        .unwrap()
        .collide_and_stream(parallel.data_handle_mut(), &obstacle, 25)
        .unwrap();

    assert_eq!(serial.max_abs_diff(&parallel), Some(0.0));
}

#[test]
fn populations_stay_non_negative_on_every_cpu_engine() {
    let parameters = Parameters::default();
    let obstacle = obstacle::line(32, 64, 16, 8, 24);
    let mut engines: Vec<Box<dyn CollideAndStream>> = vec![
        Box::new(SerialEngine::new(parameters)),
        Box::new(ParallelEngine::new(parameters)),
    ];
    for engine in engines.iter_mut() {
        let mut grid = disturbed_grid(32, 64, &parameters);
        for _ in 0..5 {
            engine
                .collide_and_stream(grid.data_handle_mut(), &obstacle, 10)
                .unwrap();
            assert!(
                grid.data_handle().iter().all(|f| *f >= 0.0),
                "{} produced a negative population",
                engine.name()
            );
        }
    }
}

#[test]
fn zero_steps_leave_the_buffer_alone() {
    let parameters = Parameters::default();
    let obstacle = obstacle::cylinder(16, 32);
    let mut grid = disturbed_grid(16, 32, &parameters);
    let before = grid.clone();
    d2q9::serial::collide_and_stream(grid.data_handle_mut(), &obstacle, &parameters, 0);
    d2q9::parallel::collide_and_stream(grid.data_handle_mut(), &obstacle, &parameters, 0);
    assert_eq!(grid.max_abs_diff(&before), Some(0.0));
}

#[test]
fn mismatched_buffers_are_rejected() {
    let obstacle = ObstacleMask::new(8, 8);
    let mut short = vec![0.0; 8 * 8 * Q - 1];
    let error = SerialEngine::default()
        .collide_and_stream(&mut short, &obstacle, 1)
        .unwrap_err();
    assert!(matches!(error, LbmError::BufferSize { .. }));
}

#[test]
fn empty_grids_are_rejected_by_every_engine() {
    let parameters = Parameters::default();
    for (height, width) in [(0, 4), (3, 0), (0, 0)] {
        let obstacle = ObstacleMask::new(height, width);
        let mut d2q9: Vec<Float> = Vec::new();
        let mut engines: Vec<Box<dyn CollideAndStream>> = vec![
            Box::new(SerialEngine::new(parameters)),
            Box::new(ParallelEngine::new(parameters)),
        ];
        for engine in engines.iter_mut() {
            let error = engine.collide_and_stream(&mut d2q9, &obstacle, 1).unwrap_err();
            assert!(
                matches!(error, LbmError::EmptyGrid { .. }),
                "{} accepted a {height}x{width} grid",
                engine.name()
            );
        }
        let error =
            d2q9::accelerator::collide_and_stream(&mut d2q9, &obstacle, &parameters, 1)
                .unwrap_err();
        assert!(matches!(error, LbmError::EmptyGrid { .. }));
    }
}

#[test]
fn single_obstacle_scenario_agrees_across_engines() {
    let (height, width) = (32, 64);
    let parameters = Parameters::new(0.005);
    let obstacle = ObstacleMask::from_coords(height, width, [(height / 2, width / 4)]);
    let initial = uniform_grid(height, width, &parameters);

    let mut serial = initial.clone();
    d2q9::serial::collide_and_stream(serial.data_handle_mut(), &obstacle, &parameters, 20);

    let mut parallel = initial.clone();
    d2q9::parallel::collide_and_stream(parallel.data_handle_mut(), &obstacle, &parameters, 20);
    assert_grids_close(&serial, &parallel, GRID_TOLERANCE);

    let mut accelerator = initial.clone();
    if run_accelerator(&mut accelerator, &obstacle, &parameters, 20).is_none() {
        return;
    }
    assert_grids_close(&serial, &accelerator, GRID_TOLERANCE);
}

#[test]
fn accelerator_matches_serial_on_a_cylinder() {
    let parameters = Parameters::default();
    let obstacle = obstacle::cylinder(40, 72);
    let mut serial = disturbed_grid(40, 72, &parameters);
    let mut accelerator = serial.clone();

    d2q9::serial::collide_and_stream(serial.data_handle_mut(), &obstacle, &parameters, 30);
    if run_accelerator(&mut accelerator, &obstacle, &parameters, 30).is_none() {
        return;
    }
    assert_grids_close(&serial, &accelerator, GRID_TOLERANCE);
    assert!(accelerator.data_handle().iter().all(|f| *f >= 0.0));
}

#[test]
fn accelerator_handles_grids_that_do_not_fill_a_workgroup() {
    let parameters = Parameters::default();
    let obstacle = ObstacleMask::from_coords(5, 7, [(2, 3)]);
    let mut serial = disturbed_grid(5, 7, &parameters);
    let mut accelerator = serial.clone();

    d2q9::serial::collide_and_stream(serial.data_handle_mut(), &obstacle, &parameters, 3);
    if run_accelerator(&mut accelerator, &obstacle, &parameters, 3).is_none() {
        return;
    }
    assert_grids_close(&serial, &accelerator, GRID_TOLERANCE);
}
