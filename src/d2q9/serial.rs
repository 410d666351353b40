//! Single-threaded reference engine.
//!
//! Plain nested loops, one phase after the other. The other engines are
//! checked against this one.

use super::*;

/// Advances `d2q9` by `steps` in place.
///
/// `d2q9` must hold `obstacle.height() * obstacle.width() * Q` values.
pub fn collide_and_stream(
    d2q9: &mut [Float],
    obstacle: &ObstacleMask,
    parameters: &Parameters,
    steps: usize,
) {
    let height = obstacle.height();
    let width = obstacle.width();
    let omega = parameters.omega();
    let mut scratch = d2q9.to_vec();
    let mut current: &mut [Float] = d2q9;
    let mut next: &mut [Float] = &mut scratch;

    for _ in 0..steps {
        set_boundaries(current, height, width, parameters);
        collide(current, omega);
        stream(current, next, height, width);
        bounce_back(next, obstacle);
        std::mem::swap(&mut current, &mut next);
    }

    // An odd number of swaps leaves the result in the scratch buffer.
    if steps % 2 == 1 {
        next.copy_from_slice(current);
    }
}

pub fn collide(d2q9: &mut [Float], omega: Float) {
    let cells = d2q9.len() / Q;
    for cell in 0..cells {
        collide_cell(&mut d2q9[cell * Q..(cell + 1) * Q], omega);
    }
}

// Only interior cells receive pushed values; edges carry over.
pub fn stream(current: &[Float], next: &mut [Float], height: usize, width: usize) {
    for y in 0..height {
        for x in 0..width {
            if y == 0 || x == 0 || y == height - 1 || x == width - 1 {
                let base = (x + y * width) * Q;
                next[base..base + Q].copy_from_slice(&current[base..base + Q]);
            }
        }
    }
    for y in 0..height {
        for x in 0..width {
            let source = (x + y * width) * Q;
            for q in 0..Q {
                let [cx, cy] = C[q];
                let target_x = x as i32 + cx;
                let target_y = y as i32 + cy;
                let interior = target_x > 0
                    && target_y > 0
                    && target_x < width as i32 - 1
                    && target_y < height as i32 - 1;
                if interior {
                    let target = (target_x as usize + target_y as usize * width) * Q;
                    next[target + q] = current[source + q];
                }
            }
        }
    }
}

/// Reference engine behind [`CollideAndStream`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialEngine {
    pub parameters: Parameters,
}

impl SerialEngine {
    pub fn new(parameters: Parameters) -> Self {
        Self { parameters }
    }
}

impl CollideAndStream for SerialEngine {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn collide_and_stream(
        &mut self,
        d2q9: &mut [Float],
        obstacle: &ObstacleMask,
        steps: usize,
    ) -> Result<()> {
        check_shape(d2q9, obstacle)?;
        collide_and_stream(d2q9, obstacle, &self.parameters, steps);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn interior_cells_pull_from_upstream_neighbours() {
        let (height, width) = (4, 5);
        let mut current = vec![0.0; height * width * Q];
        for (i, value) in current.iter_mut().enumerate() {
            *value = i as Float;
        }
        let mut next = vec![-1.0; height * width * Q];
        stream(&current, &mut next, height, width);
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                for q in 0..Q {
                    let [cx, cy] = C[q];
                    let sx = (x as i32 - cx) as usize;
                    let sy = (y as i32 - cy) as usize;
                    assert_eq!(
                        next[(x + y * width) * Q + q],
                        current[(sx + sy * width) * Q + q]
                    );
                }
            }
        }
        // edges are carried over
        assert_eq!(&next[..Q], &current[..Q]);
        assert!(next.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn uniform_flow_without_obstacles_stays_uniform() {
        let parameters = Parameters::default();
        let mut grid = Grid::new(8, 10, Q);
        initialize_grid(&mut grid, &parameters);
        let expected = grid.clone();
        let obstacle = ObstacleMask::new(8, 10);
        collide_and_stream(grid.data_handle_mut(), &obstacle, &parameters, 7);
        assert_eq!(grid, expected);
    }

    #[test]
    fn collision_never_leaves_negative_populations() {
        let parameters = Parameters::new(0.005);
        let mut grid = Grid::new(12, 16, Q);
        initialize_grid(&mut grid, &parameters);
        let obstacle = crate::obstacle::line(12, 16, 5, 3, 8);
        for _ in 0..10 {
            collide_and_stream(grid.data_handle_mut(), &obstacle, &parameters, 3);
            assert!(grid.data_handle().iter().all(|v| *v >= 0.0));
        }
    }

    #[test]
    fn steps_compose() {
        let parameters = Parameters::default();
        let obstacle = ObstacleMask::from_coords(9, 11, [(4, 4), (5, 4)]);
        let mut whole = Grid::new(9, 11, Q);
        initialize_grid(&mut whole, &parameters);
        let mut split = whole.clone();
        collide_and_stream(whole.data_handle_mut(), &obstacle, &parameters, 6);
        for _ in 0..3 {
            collide_and_stream(split.data_handle_mut(), &obstacle, &parameters, 2);
        }
        assert_eq!(whole.max_abs_diff(&split), Some(0.0));
    }

    #[test]
    fn engine_rejects_a_buffer_of_the_wrong_size() {
        let mut engine = SerialEngine::default();
        let mut d2q9 = vec![0.0; 10];
        let obstacle = ObstacleMask::new(2, 2);
        assert!(engine.collide_and_stream(&mut d2q9, &obstacle, 1).is_err());
    }
}
