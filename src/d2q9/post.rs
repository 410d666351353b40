//! Macroscopic fields and scalar summaries of a distribution grid.

use super::*;
use crate::error::LbmError;
use crate::grid::Grid;
use crate::post::PostResult;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    Density,
    VelocityX,
    VelocityY,
    Speed,
    Curl,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Density,
        Property::VelocityX,
        Property::VelocityY,
        Property::Speed,
        Property::Curl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Property::Density => "density",
            Property::VelocityX => "velocity_x",
            Property::VelocityY => "velocity_y",
            Property::Speed => "speed",
            Property::Curl => "curl",
        }
    }

    // Curl needs the neighbours; see curl_field.
    #[inline]
    fn of_cell(self, f: &[Float]) -> Float {
        let (rho, ux, uy) = macroscopic(f);
        match self {
            Property::Density => rho,
            Property::VelocityX => ux,
            Property::VelocityY => uy,
            Property::Speed => (ux * ux + uy * uy).sqrt(),
            Property::Curl => 0.0,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Property {
    type Err = LbmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "density" | "rho" => Ok(Property::Density),
            "velocity_x" | "ux" => Ok(Property::VelocityX),
            "velocity_y" | "uy" => Ok(Property::VelocityY),
            "speed" | "velocity" => Ok(Property::Speed),
            "curl" | "vorticity" => Ok(Property::Curl),
            _ => Err(LbmError::invalid_parameter("property", s)),
        }
    }
}

fn local_field(grid: &Grid<'_>, property: Property) -> Vec<Float> {
    grid.data_handle()
        .chunks_exact(Q)
        .map(|f| property.of_cell(f))
        .collect()
}

// uy(x+1) - uy(x-1) - ux(y+1) + ux(y-1), zero on edges
fn curl_field(ux: &[Float], uy: &[Float], height: usize, width: usize) -> Vec<Float> {
    let mut curl = vec![0.0; height * width];
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let cell = x + y * width;
            curl[cell] = uy[cell + 1] - uy[cell - 1] - ux[cell + width] + ux[cell - width];
        }
    }
    curl
}

fn into_grid(values: Vec<Float>, height: usize, width: usize) -> Grid<'static> {
    let mut field = Grid::new(height, width, 1);
    field.data_handle_mut().copy_from_slice(&values);
    field
}

pub fn compute_property(grid: &Grid<'_>, property: Property) -> Grid<'static> {
    let (height, width) = (grid.height(), grid.width());
    let values = match property {
        Property::Curl => curl_field(
            &local_field(grid, Property::VelocityX),
            &local_field(grid, Property::VelocityY),
            height,
            width,
        ),
        _ => local_field(grid, property),
    };
    into_grid(values, height, width)
}

/// Same as [`compute_property`], plus the largest magnitude in the field.
pub fn compute_property_with_max(grid: &Grid<'_>, property: Property) -> (Float, Grid<'static>) {
    let field = compute_property(grid, property);
    let max = field
        .data_handle()
        .iter()
        .fold(0.0, |max: Float, value| max.max(value.abs()));
    (max, field)
}

pub fn par_compute_property(grid: &Grid<'_>, property: Property) -> Grid<'static> {
    let (height, width) = (grid.height(), grid.width());
    let local = |property: Property| -> Vec<Float> {
        let mut values = vec![0.0; height * width];
        if width == 0 {
            return values;
        }
        values
            .par_chunks_mut(width)
            .zip(grid.data_handle().par_chunks(width * Q))
            .for_each(|(row, cells)| {
                for (value, f) in row.iter_mut().zip(cells.chunks_exact(Q)) {
                    *value = property.of_cell(f);
                }
            });
        values
    };
    let values = match property {
        Property::Curl => curl_field(
            &local(Property::VelocityX),
            &local(Property::VelocityY),
            height,
            width,
        ),
        _ => local(property),
    };
    into_grid(values, height, width)
}

fn fluid_cells<'g>(
    grid: &'g Grid<'_>,
    obstacle: &'g ObstacleMask,
) -> impl ParallelIterator<Item = &'g [Float]> + 'g {
    grid.data_handle()
        .par_chunks(Q)
        .zip(obstacle.as_bytes().par_iter())
        .filter(|(_, &solid)| solid == 0)
        .map(|(f, _)| f)
}

fn fluid_count(obstacle: &ObstacleMask) -> Float {
    (obstacle.height() * obstacle.width() - obstacle.solid_count()).max(1) as Float
}

pub fn compute_mean_density(grid: &Grid<'_>, obstacle: &ObstacleMask) -> Vec<PostResult> {
    let rho_sum = fluid_cells(grid, obstacle)
        .map(|f| macroscopic(f).0)
        .sum::<Float>();
    vec![PostResult::new(
        "mean_density".to_string(),
        "mean density".to_string(),
        rho_sum / fluid_count(obstacle),
        None,
    )]
}

pub fn compute_mean_velocities(grid: &Grid<'_>, obstacle: &ObstacleMask) -> Vec<PostResult> {
    let (u_sum, ux_sum, uy_sum) = fluid_cells(grid, obstacle)
        .map(|f| {
            let (_, ux, uy) = macroscopic(f);
            ((ux * ux + uy * uy).sqrt(), ux, uy)
        })
        .reduce(|| (0.0, 0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2));
    let number_of_fluid_cells = fluid_count(obstacle);
    vec![
        PostResult::new(
            "mean_velocity".to_string(),
            "mean velocity (magnitude)".to_string(),
            u_sum / number_of_fluid_cells,
            None,
        ),
        PostResult::new(
            "mean_velocity_x".to_string(),
            "mean velocity (x)".to_string(),
            ux_sum / number_of_fluid_cells,
            None,
        ),
        PostResult::new(
            "mean_velocity_y".to_string(),
            "mean velocity (y)".to_string(),
            uy_sum / number_of_fluid_cells,
            None,
        ),
    ]
}

pub fn compute_max_velocity(grid: &Grid<'_>, obstacle: &ObstacleMask) -> Vec<PostResult> {
    let max_velocity = fluid_cells(grid, obstacle)
        .map(|f| Property::Speed.of_cell(f))
        .reduce_with(|a, b| a.max(b))
        .unwrap_or(0.0);
    vec![PostResult::new(
        "max_velocity".to_string(),
        "maximum velocity".to_string(),
        max_velocity,
        None,
    )]
}

pub fn compute_porosity(obstacle: &ObstacleMask) -> Vec<PostResult> {
    let number_of_solid_cells = obstacle.solid_count() as Float;
    let number_of_cells = (obstacle.height() * obstacle.width()) as Float;
    let number_of_fluid_cells = number_of_cells - number_of_solid_cells;
    vec![
        PostResult::new(
            "n_solid_cells".to_string(),
            "number of solid cells".to_string(),
            number_of_solid_cells,
            None,
        ),
        PostResult::new(
            "n_fluid_cells".to_string(),
            "number of fluid cells".to_string(),
            number_of_fluid_cells,
            None,
        ),
        PostResult::new(
            "porosity".to_string(),
            "porosity".to_string(),
            number_of_fluid_cells / number_of_cells.max(1.0),
            None,
        ),
    ]
}
