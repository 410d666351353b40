pub mod accelerator;
pub mod bc;
pub mod parallel;
pub mod post;
pub mod serial;
pub mod simulation;

pub use accelerator::{AcceleratorEngine, Session, Stage};
pub use bc::{bounce_back, initialize_grid, set_boundaries, set_velocity};
pub use parallel::ParallelEngine;
pub use post::Property;
pub use serial::SerialEngine;
pub use simulation::{run, run_benchmark, Simulation};

use crate::error::{LbmError, Result};
use crate::global_variables::*;
use crate::obstacle::ObstacleMask;
use std::fmt;
use std::str::FromStr;

pub const D: usize = 2;

pub const Q: usize = 9;

pub const C: [[i32; D]; Q] = [
    [0, 0],
    [1, 0],
    [0, 1],
    [-1, 0],
    [0, -1],
    [1, 1],
    [-1, 1],
    [-1, -1],
    [1, -1],
];

pub const W: [Float; Q] = [
    4.0 / 9.0,
    1.0 / 9.0,
    1.0 / 9.0,
    1.0 / 9.0,
    1.0 / 9.0,
    1.0 / 36.0,
    1.0 / 36.0,
    1.0 / 36.0,
    1.0 / 36.0,
];

pub const Q_BAR: [usize; Q] = [0, 3, 4, 1, 2, 7, 8, 5, 6];

#[inline]
pub fn equilibrium(q: usize, rho: Float, ux: Float, uy: Float) -> Float {
    let u_dot_c = (C[q][0] as Float) * ux + (C[q][1] as Float) * uy;
    let u_2 = ux * ux + uy * uy;
    W[q] * rho
        * (1.0 + CS_2_INV * u_dot_c + 0.5 * CS_4_INV * u_dot_c * u_dot_c - 0.5 * CS_2_INV * u_2)
}

// Density is floored before it divides the momentum.
#[inline]
pub fn macroscopic(f: &[Float]) -> (Float, Float, Float) {
    let mut rho = 0.0;
    let mut ux = 0.0;
    let mut uy = 0.0;
    for q in 0..Q {
        rho += f[q];
    }
    for q in 0..Q {
        ux += (C[q][0] as Float) * f[q];
        uy += (C[q][1] as Float) * f[q];
    }
    let safe_rho = rho.max(DENSITY_FLOOR);
    (rho, ux / safe_rho, uy / safe_rho)
}

pub fn relaxation_parameter(viscosity: Float) -> Float {
    1.0 / (CS_2_INV * viscosity + 0.5)
}

#[inline]
pub fn collide_cell(f: &mut [Float], omega: Float) {
    let (rho, ux, uy) = macroscopic(f);
    for q in 0..Q {
        let f_eq = equilibrium(q, rho, ux, uy);
        f[q] = (f[q] + omega * (f_eq - f[q])).max(0.0);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parameters {
    pub viscosity: Float,
    pub inflow_velocity: [Float; D],
    pub inflow_density: Float,
}

impl Parameters {
    pub fn new(viscosity: Float) -> Self {
        Self {
            viscosity,
            ..Self::default()
        }
    }

    pub fn with_inflow(mut self, velocity: [Float; D]) -> Self {
        self.inflow_velocity = velocity;
        self
    }

    pub fn omega(&self) -> Float {
        relaxation_parameter(self.viscosity)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            viscosity: VISCOSITY,
            inflow_velocity: INFLOW_VELOCITY,
            inflow_density: LATTICE_DENSITY,
        }
    }
}

/// A collide-and-stream strategy that advances a caller-owned buffer in place.
///
/// Every implementation runs the same step: edge refresh, collision of the
/// whole grid, streaming into a second buffer, bounce-back, swap.
pub trait CollideAndStream {
    fn name(&self) -> &'static str;

    fn collide_and_stream(
        &mut self,
        d2q9: &mut [Float],
        obstacle: &ObstacleMask,
        steps: usize,
    ) -> Result<()>;
}

pub(crate) fn check_shape(d2q9: &[Float], obstacle: &ObstacleMask) -> Result<()> {
    let (height, width) = (obstacle.height(), obstacle.width());
    if height == 0 || width == 0 {
        return Err(LbmError::EmptyGrid { height, width });
    }
    if d2q9.len() != height * width * Q {
        return Err(LbmError::BufferSize {
            height,
            width,
            channels: Q,
            expected: height * width * Q,
            actual: d2q9.len(),
        });
    }
    Ok(())
}

/// Engine selection for runs and benchmarks.
///
/// `Accelerator` re-uploads the lattice on every call; `Session` keeps it
/// on the device for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    Serial,
    Parallel,
    Accelerator,
    Session,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Serial,
        EngineKind::Parallel,
        EngineKind::Accelerator,
        EngineKind::Session,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Serial => "serial",
            EngineKind::Parallel => "parallel",
            EngineKind::Accelerator => "accelerator",
            EngineKind::Session => "session",
        }
    }

    pub fn needs_accelerator(self) -> bool {
        matches!(self, EngineKind::Accelerator | EngineKind::Session)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = LbmError;

    fn from_str(s: &str) -> Result<Self> {
        EngineKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| LbmError::invalid_parameter("engine", s))
    }
}
