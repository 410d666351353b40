//! Multi-threaded engine on the rayon pool.
//!
//! Collision splits the grid into blocks of cells and streaming splits it
//! into rows, so no two tasks ever write the same value. Edge refresh and
//! bounce-back touch few cells and stay on the calling thread.

use super::*;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Cells handed to one collision task.
const CELLS_PER_TASK: usize = 1024;

/// Advances `d2q9` by `steps` in place on the current rayon pool.
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

    if steps % 2 == 1 {
        next.copy_from_slice(current);
    }
}

pub fn collide(d2q9: &mut [Float], omega: Float) {
    d2q9.par_chunks_mut(Q * CELLS_PER_TASK).for_each(|block| {
        block
            .chunks_exact_mut(Q)
            .for_each(|f| collide_cell(f, omega));
    });
}

/// Row-parallel streaming; each interior cell pulls from its upstream
/// neighbours, edge cells copy their own values.
pub fn stream(current: &[Float], next: &mut [Float], height: usize, width: usize) {
    next.par_chunks_mut(width * Q)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let base = x * Q;
                if y == 0 || x == 0 || y == height - 1 || x == width - 1 {
                    let source = (x + y * width) * Q;
                    row[base..base + Q].copy_from_slice(&current[source..source + Q]);
                    continue;
                }
                for q in 0..Q {
                    let [cx, cy] = C[q];
                    let source_x = (x as i32 - cx) as usize;
                    let source_y = (y as i32 - cy) as usize;
                    row[base + q] = current[(source_x + source_y * width) * Q + q];
                }
            }
        });
}

/// Thread-pool engine behind [`CollideAndStream`].
///
/// Runs on the global rayon pool unless built with [`ParallelEngine::with_threads`].
#[derive(Debug, Default)]
pub struct ParallelEngine {
    pub parameters: Parameters,
    pool: Option<ThreadPool>,
}

impl ParallelEngine {
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            pool: None,
        }
    }

    /// Engine with a private pool of `number_of_threads` workers.
    pub fn with_threads(parameters: Parameters, number_of_threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(number_of_threads)
            .build()?;
        Ok(Self {
            parameters,
            pool: Some(pool),
        })
    }

    pub fn number_of_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl CollideAndStream for ParallelEngine {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn collide_and_stream(
        &mut self,
        d2q9: &mut [Float],
        obstacle: &ObstacleMask,
        steps: usize,
    ) -> Result<()> {
        check_shape(d2q9, obstacle)?;
        let parameters = self.parameters;
        match &self.pool {
            Some(pool) => pool.install(|| collide_and_stream(d2q9, obstacle, &parameters, steps)),
            None => collide_and_stream(d2q9, obstacle, &parameters, steps),
        }
        Ok(())
    }
}
