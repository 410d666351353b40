//! Wind-tunnel runs and engine benchmarks driven by a [`CaseSetup`].

use super::*;
use crate::d2q9::accelerator::device::DeviceContext;
use crate::grid::Grid;
use crate::io::{self, CaseSetup};
use colored::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct Simulation {
    pub setup: CaseSetup,
    pub time_step: usize,
    pub simulation_time: Instant,
}

impl Simulation {
    pub fn new(setup: CaseSetup) -> Self {
        Self {
            setup,
            time_step: 0,
            simulation_time: Instant::now(),
        }
    }

    pub fn next_frame(&mut self) {
        self.time_step += self.setup.steps_per_frame;
    }

    fn print_header(&self) {
        let duration = self.simulation_time.elapsed().as_secs_f64();
        println!("\n{} {:.2} s.", "Elapsed time:".cyan().bold(), duration);
        println!(
            "\n{:>8} {:>16} {:>16} {:>16}\n",
            "step".cyan().bold(),
            "mean_density".cyan().bold(),
            "mean_velocity".cyan().bold(),
            "max_velocity".cyan().bold()
        );
    }

    pub fn print_frame(&self, frame: usize, density: Float, velocity: Float, max_velocity: Float) {
        if frame % 20 == 0 {
            self.print_header();
        }
        println!(
            "{:>8} {:>16.8e} {:>16.8e} {:>16.8e}",
            self.time_step, density, velocity, max_velocity
        );
    }

    /// Writes the summaries for the current step and, when due, the field.
    pub fn write_frame(&self, frame: usize, grid: &Grid<'_>, obstacle: &ObstacleMask) -> Result<()> {
        let density = post::compute_mean_density(grid, obstacle);
        let velocities = post::compute_mean_velocities(grid, obstacle);
        let max_velocity = post::compute_max_velocity(grid, obstacle);
        io::write_post_results(&density, self.time_step, "mean_density.dat")?;
        io::write_post_results(&velocities, self.time_step, "mean_velocities.dat")?;
        io::write_post_results(&max_velocity, self.time_step, "max_velocity.dat")?;

        let write_frequency = self.setup.write_frequency;
        if write_frequency > 0 && frame % write_frequency == 0 {
            let field = post::par_compute_property(grid, self.setup.property);
            io::write_property_field(&field, self.setup.property, self.time_step)?;
        }

        self.print_frame(frame, density[0].value, velocities[0].value, max_velocity[0].value);
        Ok(())
    }
}

/// Opens the accelerator device, or `None` on machines without an adapter.
pub fn request_context() -> Result<Option<Arc<DeviceContext>>> {
    match DeviceContext::request() {
        Ok(context) => Ok(Some(Arc::new(context))),
        Err(e) if e.is_adapter_unavailable() => {
            warn!("{e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Builds a stateless engine. Accelerator kinds run on `context` and fall
/// back to the thread pool without one.
pub fn build_engine(
    kind: EngineKind,
    parameters: Parameters,
    context: Option<&Arc<DeviceContext>>,
) -> Box<dyn CollideAndStream> {
    match (kind, context) {
        (EngineKind::Serial, _) => Box::new(SerialEngine::new(parameters)),
        (EngineKind::Parallel, _) => Box::new(ParallelEngine::new(parameters)),
        (_, Some(context)) => Box::new(AcceleratorEngine::with_context(parameters, context.clone())),
        (_, None) => {
            warn!("no accelerator for the {kind} engine; falling back to the parallel engine");
            Box::new(ParallelEngine::new(parameters))
        }
    }
}

/// Either a device-resident session or a stateless engine over the host buffer.
enum Driver<'a> {
    Resident(Session<'a>),
    Stateless {
        engine: Box<dyn CollideAndStream>,
        d2q9: &'a mut [Float],
    },
}

impl<'a> Driver<'a> {
    fn new(
        kind: EngineKind,
        d2q9: &'a mut [Float],
        obstacle: &ObstacleMask,
        parameters: Parameters,
        context: Option<&Arc<DeviceContext>>,
    ) -> Result<Self> {
        match (kind, context) {
            (EngineKind::Session, Some(context)) => Ok(Driver::Resident(Session::with_context(
                context.clone(),
                d2q9,
                obstacle,
                parameters,
            )?)),
            _ => Ok(Driver::Stateless {
                engine: build_engine(kind, parameters, context),
                d2q9,
            }),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Driver::Resident(_) => "session",
            Driver::Stateless { engine, .. } => engine.name(),
        }
    }

    fn step(&mut self, obstacle: &ObstacleMask, steps: usize) -> Result<()> {
        match self {
            Driver::Resident(session) => session.step(steps),
            Driver::Stateless { engine, d2q9 } => engine.collide_and_stream(d2q9, obstacle, steps),
        }
    }

    fn state(&self) -> &[Float] {
        match self {
            Driver::Resident(session) => session.host_state(),
            Driver::Stateless { d2q9, .. } => d2q9,
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            Driver::Resident(session) => session.terminate(),
            Driver::Stateless { .. } => Ok(()),
        }
    }
}

pub fn run(setup: CaseSetup) -> Result<()> {
    io::create_case_directories()?;
    setup.print();

    let parameters = setup.parameters();
    let obstacle = setup.obstacle.build(setup.height, setup.width);
    io::write_post_results(&post::compute_porosity(&obstacle), 0, "porosity.dat")?;

    let mut grid = Grid::new(setup.height, setup.width, Q);
    initialize_grid(&mut grid, &parameters);
    let mut snapshot = grid.clone();

    let context = if setup.engine.needs_accelerator() {
        request_context()?
    } else {
        None
    };
    let mut simulation = Simulation::new(setup);
    let mut driver = Driver::new(
        simulation.setup.engine,
        grid.data_handle_mut(),
        &obstacle,
        parameters,
        context.as_ref(),
    )?;
    info!("running {} frames on the {} engine", simulation.setup.frames, driver.name());

    simulation.write_frame(0, &snapshot, &obstacle)?;
    for frame in 1..=simulation.setup.frames {
        driver.step(&obstacle, simulation.setup.steps_per_frame)?;
        simulation.next_frame();
        snapshot.data_handle_mut().copy_from_slice(driver.state());
        simulation.write_frame(frame, &snapshot, &obstacle)?;
    }
    driver.finish()?;

    println!(
        "\n{} {:.2} s.",
        "Total time:".cyan().bold(),
        simulation.simulation_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Times `steps` steps on every engine from the same initial state and
/// appends one row to the benchmark table.
pub fn run_benchmark(setup: CaseSetup, steps: usize) -> Result<()> {
    io::create_case_directories()?;
    setup.print();

    let parameters = setup.parameters();
    let obstacle = setup.obstacle.build(setup.height, setup.width);
    let mut initial = Grid::new(setup.height, setup.width, Q);
    initialize_grid(&mut initial, &parameters);

    let context = request_context()?;
    let mut elapsed_times: Vec<(&str, Duration)> = Vec::new();
    for kind in EngineKind::ALL {
        if kind.needs_accelerator() && context.is_none() {
            warn!("skipping the {kind} engine: no accelerator adapter");
            continue;
        }
        let mut grid = initial.clone();
        let time = Instant::now();
        let mut driver = Driver::new(
            kind,
            grid.data_handle_mut(),
            &obstacle,
            parameters,
            context.as_ref(),
        )?;
        driver.step(&obstacle, steps)?;
        driver.finish()?;
        let duration = time.elapsed();
        println!(
            "{:>12} {:>12.4} s {:>12.2} MLUPS",
            kind.name().cyan().bold(),
            duration.as_secs_f64(),
            (setup.height * setup.width * steps) as f64 / duration.as_secs_f64() / 1e6
        );
        elapsed_times.push((kind.name(), duration));
    }

    io::write_inside_loop_elapsed_time(&elapsed_times, &steps)?;
    Ok(())
}
