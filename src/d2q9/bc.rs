use super::*;
use crate::grid::Grid;

#[inline]
pub fn set_velocity(
    d2q9: &mut [Float],
    width: usize,
    y: usize,
    x: usize,
    density: Float,
    velocity: [Float; D],
) {
    let base = (x + y * width) * Q;
    for q in 0..Q {
        d2q9[base + q] = equilibrium(q, density, velocity[0], velocity[1]);
    }
}

pub fn initialize_grid(grid: &mut Grid<'_>, parameters: &Parameters) {
    let width = grid.width();
    let height = grid.height();
    let d2q9 = grid.data_handle_mut();
    for y in 0..height {
        for x in 0..width {
            set_velocity(
                d2q9,
                width,
                y,
                x,
                parameters.inflow_density,
                parameters.inflow_velocity,
            );
        }
    }
}

pub fn set_boundaries(d2q9: &mut [Float], height: usize, width: usize, parameters: &Parameters) {
    if height == 0 || width == 0 {
        return;
    }
    let (density, velocity) = (parameters.inflow_density, parameters.inflow_velocity);
    for y in 0..height {
        // inlet and outlet
        set_velocity(d2q9, width, y, 0, density, velocity);
        set_velocity(d2q9, width, y, width - 1, density, velocity);
    }
    for x in 0..width {
        // top and bottom walls
        set_velocity(d2q9, width, 0, x, density, velocity);
        set_velocity(d2q9, width, height - 1, x, density, velocity);
    }
}

/// No-slip reflection at solid cells, applied to the post-stream buffer.
///
/// Whatever streamed into a solid cell along `q` returns to the fluid cell it
/// came from along `Q_BAR[q]`. The solid cell keeps only its rest component.
/// Reflections that would leave the grid or land in another solid cell are
/// dropped, so the result does not depend on the order cells are visited.
pub fn bounce_back(next: &mut [Float], obstacle: &ObstacleMask) {
    let height = obstacle.height();
    let width = obstacle.width();
    for y in 0..height {
        for x in 0..width {
            if obstacle.is_solid(y, x) {
                reflect_cell(next, obstacle, y, x);
            }
        }
    }
}

#[inline]
fn reflect_cell(next: &mut [Float], obstacle: &ObstacleMask, y: usize, x: usize) {
    let width = obstacle.width() as i32;
    let height = obstacle.height() as i32;
    let base = (x + y * obstacle.width()) * Q;
    for q in 1..Q {
        let [cx, cy] = C[q];
        let mirror_x = x as i32 - cx;
        let mirror_y = y as i32 - cy;
        let inside = mirror_x >= 0 && mirror_y >= 0 && mirror_x < width && mirror_y < height;
        if inside && !obstacle.is_solid(mirror_y as usize, mirror_x as usize) {
            let mirror = (mirror_x as usize + mirror_y as usize * obstacle.width()) * Q;
            next[mirror + Q_BAR[q]] = next[base + q];
        }
        next[base + q] = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_grid(height: usize, width: usize) -> Grid<'static> {
        let mut grid = Grid::new(height, width, Q);
        initialize_grid(&mut grid, &Parameters::default());
        grid
    }

    #[test]
    fn boundary_refresh_is_idempotent() {
        let parameters = Parameters::default();
        let mut grid = uniform_grid(6, 7);
        grid.set(0.9, 0, 3, 2);
        grid.set(0.9, 3, 0, 5);
        let d2q9 = grid.data_handle_mut();
        set_boundaries(d2q9, 6, 7, &parameters);
        let once = d2q9.to_vec();
        set_boundaries(d2q9, 6, 7, &parameters);
        assert_eq!(once, d2q9.to_vec());
        assert_eq!(grid, uniform_grid(6, 7));
    }

    #[test]
    fn boundary_refresh_of_an_empty_grid_is_a_no_op() {
        let mut d2q9: Vec<Float> = Vec::new();
        set_boundaries(&mut d2q9, 0, 4, &Parameters::default());
        set_boundaries(&mut d2q9, 3, 0, &Parameters::default());
        assert!(d2q9.is_empty());
    }

    #[test]
    fn boundaries_leave_the_interior_alone() {
        let mut grid = uniform_grid(5, 5);
        grid.set(0.5, 2, 2, 0);
        set_boundaries(grid.data_handle_mut(), 5, 5, &Parameters::default());
        assert_eq!(grid.get(2, 2, 0), 0.5);
    }

    #[test]
    fn isolated_solid_cell_reflects_incoming_population() {
        let (height, width) = (5, 5);
        let mut next = vec![0.0; height * width * Q];
        let mut obstacle = ObstacleMask::new(height, width);
        obstacle.set(2, 2, true);
        let solid = (2 + 2 * width) * Q;
        next[solid] = 0.4;
        // population moving east, arrived from (2, 1)
        next[solid + 1] = 0.25;

        bounce_back(&mut next, &obstacle);

        let west_neighbour = (1 + 2 * width) * Q;
        assert_eq!(next[west_neighbour + 3], 0.25);
        assert_eq!(next[solid + 1], 0.0);
        assert_eq!(next[solid], 0.4);
        let untouched: Float = next
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != west_neighbour + 3 && *i != solid)
            .map(|(_, v)| *v)
            .sum();
        assert_eq!(untouched, 0.0);
    }

    #[test]
    fn diagonal_reflection_returns_to_the_diagonal_neighbour() {
        let (height, width) = (4, 4);
        let mut next = vec![0.0; height * width * Q];
        let obstacle = ObstacleMask::from_coords(height, width, [(1, 1)]);
        let solid = (1 + width) * Q;
        // north-east mover, came from (0, 0)
        next[solid + 5] = 0.125;
        bounce_back(&mut next, &obstacle);
        assert_eq!(next[7], 0.125);
        assert_eq!(next[solid + 5], 0.0);
    }

    #[test]
    fn adjacent_solids_do_not_exchange_populations() {
        let (height, width) = (4, 6);
        let mut next = vec![0.0; height * width * Q];
        let obstacle = ObstacleMask::from_coords(height, width, [(2, 2), (2, 3)]);
        let left = (2 + 2 * width) * Q;
        let right = (3 + 2 * width) * Q;
        next[left + 3] = 0.5;
        next[right + 1] = 0.75;
        bounce_back(&mut next, &obstacle);
        assert_eq!(next[left + 1], 0.0);
        assert_eq!(next[right + 3], 0.0);
        assert_eq!(next.iter().sum::<Float>(), 0.0);
    }

    #[test]
    fn reflections_leaving_the_grid_are_dropped() {
        let (height, width) = (3, 3);
        let mut next = vec![0.0; height * width * Q];
        let obstacle = ObstacleMask::from_coords(height, width, [(0, 0)]);
        next[1] = 0.3;
        next[5] = 0.2;
        bounce_back(&mut next, &obstacle);
        assert_eq!(next.iter().sum::<Float>(), 0.0);
    }
}
