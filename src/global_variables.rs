pub const CASE_NAME: &'static str = "Wind Tunnel";

pub type Float = f32;

pub const HEIGHT: usize = 32 * 8;

pub const WIDTH: usize = 32 * 20;

pub const PIXELS_PER_CELL: usize = 2;

pub const WINDOW_WIDTH: usize = PIXELS_PER_CELL * WIDTH;

pub const WINDOW_HEIGHT: usize = PIXELS_PER_CELL * HEIGHT;

pub const STEPS_PER_FRAME: usize = 20;

pub const FRAMES: usize = 100;

pub const VISCOSITY: Float = 0.005;

pub const INFLOW_VELOCITY: [Float; 2] = [0.1, 0.0];

pub const LATTICE_DENSITY: Float = 1.0;

/// Lower bound applied to the local density before it divides the momentum.
pub const DENSITY_FLOOR: Float = 1e-6;

/// Absolute elementwise tolerance used when two grids are compared.
pub const GRID_TOLERANCE: Float = 1e-6;

pub const DELTA_T: Float = 1.0;

pub const DELTA_X: Float = 1.0;

pub const CS_2: Float = 1.0 / 3.0 * DELTA_X * DELTA_X / DELTA_T / DELTA_T;

pub const CS_2_INV: Float = 3.0;

pub const CS_4_INV: Float = 9.0;
