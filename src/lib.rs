//! Two-dimensional D2Q9 lattice Boltzmann wind tunnel.
//!
//! The same collide-and-stream step runs on three interchangeable engines:
//! a single-threaded reference ([`d2q9::serial`]), a rayon thread pool
//! ([`d2q9::parallel`]) and a `wgpu` compute device
//! ([`d2q9::accelerator`]), whose [`d2q9::Session`] keeps the lattice
//! resident on the device between steps.

pub mod d2q9;
pub mod error;
pub mod global_variables;
pub mod grid;
pub mod io;
pub mod obstacle;
pub mod post;

pub use error::{LbmError, Result};
pub use global_variables::*;
pub use grid::Grid;
pub use obstacle::{ObstacleKind, ObstacleMask};
