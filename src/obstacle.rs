//! Solid-cell masks and the shapes placed in the tunnel.

use crate::error::{LbmError, Result};
use std::f64::consts::PI;
use std::str::FromStr;

/// One byte per cell, non-zero where the cell is solid.
///
/// The mask is read-only once handed to an engine or a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObstacleMask {
    height: usize,
    width: usize,
    cells: Vec<u8>,
}

impl ObstacleMask {
    /// All-fluid mask.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            cells: vec![0; height * width],
        }
    }

    pub fn from_cells(cells: Vec<u8>, height: usize, width: usize) -> Result<Self> {
        if cells.len() != height * width {
            return Err(LbmError::BufferSize {
                height,
                width,
                channels: 1,
                expected: height * width,
                actual: cells.len(),
            });
        }
        Ok(Self {
            height,
            width,
            cells,
        })
    }

    /// Marks every `(row, column)` pair; pairs outside the grid are ignored.
    pub fn from_coords<I>(height: usize, width: usize, coords: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut mask = Self::new(height, width);
        for (y, x) in coords {
            if y < height && x < width {
                mask.set(y, x, true);
            }
        }
        mask
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set(&mut self, y: usize, x: usize, solid: bool) {
        self.cells[x + y * self.width] = solid as u8;
    }

    #[inline]
    pub fn is_solid(&self, y: usize, x: usize) -> bool {
        self.cells[x + y * self.width] != 0
    }

    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell != 0).count()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Fails unless the mask covers a `height` x `width` grid.
    pub fn check_dimensions(&self, height: usize, width: usize) -> Result<()> {
        if self.height != height || self.width != width {
            return Err(LbmError::DimensionMismatch {
                height,
                width,
                mask_height: self.height,
                mask_width: self.width,
            });
        }
        Ok(())
    }

    fn clear_border(&mut self) {
        if self.height == 0 || self.width == 0 {
            return;
        }
        for x in 0..self.width {
            self.set(0, x, false);
            self.set(self.height - 1, x, false);
        }
        for y in 0..self.height {
            self.set(y, 0, false);
            self.set(y, self.width - 1, false);
        }
    }
}

/// Filled disk centred at a quarter of the tunnel length, radius `height / 8`.
pub fn cylinder(height: usize, width: usize) -> ObstacleMask {
    let radius = (height / 8) as f64;
    let center_x = (width / 4) as f64;
    let center_y = (height / 2) as f64;
    let mut mask = ObstacleMask::new(height, width);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f64 - center_x;
            let dy = y as f64 - center_y;
            if dx * dx + dy * dy <= radius * radius {
                mask.set(y, x, true);
            }
        }
    }
    mask.clear_border();
    mask
}

/// Four-digit NACA profile with a chord of `width / 4` starting at `width / 8`.
///
/// `max_camber`, `camber_position` and `max_thickness` are chord fractions
/// (0.04, 0.4, 0.12 is a NACA 4412); `angle_of_attack` is in degrees and
/// rotates the profile about `(width / 4, height / 2)`. The region between
/// the surfaces is filled column by column after rotation.
pub fn naca_airfoil(
    height: usize,
    width: usize,
    max_camber: f64,
    camber_position: f64,
    max_thickness: f64,
    angle_of_attack: f64,
) -> ObstacleMask {
    let chord = (width / 4) as f64;
    let start_x = (width / 8) as f64 - 1.0;
    let center_y = (height / 2) as f64;
    let pivot_x = (width / 4) as f64;
    let pivot_y = center_y;
    let (sin_aoa, cos_aoa) = (angle_of_attack * PI / 180.0).sin_cos();

    let rotate = |x: f64, y: f64| -> (f64, f64) {
        let x_rel = x - pivot_x;
        let y_rel = y - pivot_y;
        (
            pivot_x + x_rel * cos_aoa - y_rel * sin_aoa,
            pivot_y + x_rel * sin_aoa + y_rel * cos_aoa,
        )
    };

    // Sampled on a sub-cell step so steep leading edges leave no gaps.
    let samples = (chord as usize).max(1) * 4;
    let mut spans: Vec<Option<(f64, f64)>> = vec![None; width];
    for s in 0..=samples {
        let xn = s as f64 / samples as f64;
        let (camber, slope) = camber_line(xn, max_camber, camber_position);
        let theta = slope.atan();
        let thickness = 5.0
            * max_thickness
            * (0.2969 * xn.sqrt() - 0.1260 * xn - 0.3516 * xn.powi(2) + 0.2843 * xn.powi(3)
                - 0.1015 * xn.powi(4));
        let x = start_x + xn * chord;
        let yc = center_y - camber * chord;
        let half = thickness * chord;
        let upper = rotate(x - half * theta.sin(), yc - half * theta.cos());
        let lower = rotate(x + half * theta.sin(), yc + half * theta.cos());
        // Fill the segment joining the two surface points.
        let steps = ((upper.0 - lower.0).abs().max((upper.1 - lower.1).abs()) * 2.0).ceil() as usize + 1;
        for k in 0..=steps {
            let t = k as f64 / steps as f64;
            let px = upper.0 + t * (lower.0 - upper.0);
            let py = upper.1 + t * (lower.1 - upper.1);
            let column = px.round();
            if column < 0.0 || column >= width as f64 {
                continue;
            }
            let span = &mut spans[column as usize];
            *span = Some(match *span {
                Some((low, high)) => (low.min(py), high.max(py)),
                None => (py, py),
            });
        }
    }

    let mut mask = ObstacleMask::new(height, width);
    for (x, span) in spans.iter().enumerate() {
        if let Some((low, high)) = span {
            let low = low.round().max(0.0) as usize;
            let high = (high.round() as usize).min(height.saturating_sub(1));
            for y in low..=high {
                mask.set(y, x, true);
            }
        }
    }
    mask.clear_border();
    mask
}

fn camber_line(xn: f64, max_camber: f64, camber_position: f64) -> (f64, f64) {
    if max_camber == 0.0 || camber_position <= 0.0 || camber_position >= 1.0 {
        return (0.0, 0.0);
    }
    let (m, p) = (max_camber, camber_position);
    if xn < p {
        (
            m / (p * p) * (2.0 * p * xn - xn * xn),
            2.0 * m / (p * p) * (p - xn),
        )
    } else {
        (
            m / ((1.0 - p) * (1.0 - p)) * (1.0 - 2.0 * p + 2.0 * p * xn - xn * xn),
            2.0 * m / ((1.0 - p) * (1.0 - p)) * (p - xn),
        )
    }
}

/// Vertical barrier at column `x` covering rows `y_start..=y_end`.
pub fn line(height: usize, width: usize, x: usize, y_start: usize, y_end: usize) -> ObstacleMask {
    let mut mask = ObstacleMask::from_coords(height, width, (y_start..=y_end).map(|y| (y, x)));
    mask.clear_border();
    mask
}

/// Named obstacle shapes, as written in case files and on the command line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObstacleKind {
    None,
    Cylinder,
    Airfoil { angle_of_attack: f64 },
    Line,
}

impl ObstacleKind {
    pub fn build(self, height: usize, width: usize) -> ObstacleMask {
        match self {
            ObstacleKind::None => ObstacleMask::new(height, width),
            ObstacleKind::Cylinder => cylinder(height, width),
            ObstacleKind::Airfoil { angle_of_attack } => {
                naca_airfoil(height, width, 0.04, 0.4, 0.12, angle_of_attack)
            }
            ObstacleKind::Line => {
                let barrier = height / 8;
                line(
                    height,
                    width,
                    width / 3,
                    height / 2 - barrier.min(height / 2),
                    height / 2 + barrier,
                )
            }
        }
    }
}

impl FromStr for ObstacleKind {
    type Err = LbmError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        match parts.next() {
            Some("none") => Ok(ObstacleKind::None),
            Some("cylinder") => Ok(ObstacleKind::Cylinder),
            Some("line") => Ok(ObstacleKind::Line),
            Some("airfoil") => {
                let angle_of_attack = match parts.next() {
                    Some(angle) => angle
                        .parse::<f64>()
                        .map_err(|_| LbmError::invalid_parameter("obstacle", s))?,
                    None => 0.0,
                };
                Ok(ObstacleKind::Airfoil { angle_of_attack })
            }
            _ => Err(LbmError::invalid_parameter("obstacle", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_coords_uses_row_column_order() {
        let mask = ObstacleMask::from_coords(5, 6, [(1, 4), (9, 9)]);
        assert!(mask.is_solid(1, 4));
        assert!(!mask.is_solid(4, 1));
        assert_eq!(mask.solid_count(), 1);
        assert_eq!(mask.as_bytes()[4 + 6], 1);
    }

    #[test]
    fn shapes_on_empty_grids_have_no_solid_cells() {
        assert_eq!(cylinder(0, 8).solid_count(), 0);
        assert_eq!(cylinder(8, 0).solid_count(), 0);
    }

    #[test]
    fn cylinder_is_centred_and_off_the_border() {
        let mask = cylinder(64, 160);
        assert!(mask.is_solid(32, 40));
        assert!(!mask.is_solid(32, 60));
        for x in 0..160 {
            assert!(!mask.is_solid(0, x) && !mask.is_solid(63, x));
        }
        assert!(mask.solid_count() > 100);
    }

    #[test]
    fn airfoil_covers_its_chord_and_tilts_with_angle_of_attack() {
        let level = naca_airfoil(64, 160, 0.04, 0.4, 0.12, 0.0);
        assert!(level.solid_count() > 0);
        let chord_mid = 160 / 8 + 160 / 8;
        assert!((0..64).any(|y| level.is_solid(y, chord_mid)));
        let tilted = naca_airfoil(64, 160, 0.04, 0.4, 0.12, 15.0);
        assert_ne!(level, tilted);
    }

    #[test]
    fn mismatched_dimensions_are_reported() {
        let mask = ObstacleMask::new(4, 5);
        assert!(mask.check_dimensions(4, 5).is_ok());
        assert!(matches!(
            mask.check_dimensions(5, 4),
            Err(LbmError::DimensionMismatch { .. })
        ));
        assert!(ObstacleMask::from_cells(vec![0; 3], 2, 2).is_err());
    }

    #[test]
    fn kinds_parse_from_case_files() {
        assert_eq!("cylinder".parse::<ObstacleKind>().unwrap(), ObstacleKind::Cylinder);
        assert_eq!(
            "airfoil 12.5".parse::<ObstacleKind>().unwrap(),
            ObstacleKind::Airfoil {
                angle_of_attack: 12.5
            }
        );
        assert!("triangle".parse::<ObstacleKind>().is_err());
        let line = ObstacleKind::Line.build(32, 48);
        assert!(line.is_solid(16, 16));
    }
}
