//! Cell storage indexed by (row, column, channel).
//!
//! A [`Grid`] either owns its values or is a view over a slice that
//! belongs to somebody else. Every engine reads the same flat layout:
//! `((j + i * width) * channels + q)` for row `i`, column `j` and
//! channel `q`.

use crate::error::{LbmError, Result};
use crate::global_variables::*;

/// Backing store of a [`Grid`].
#[derive(Debug)]
pub enum Storage<'a> {
    /// Values managed by the grid.
    Owned(Vec<Float>),

    /// Values managed by the caller; the grid never frees them.
    Borrowed(&'a mut [Float]),
}

impl Storage<'_> {
    fn as_slice(&self) -> &[Float] {
        match self {
            Storage::Owned(values) => values,
            Storage::Borrowed(values) => values,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [Float] {
        match self {
            Storage::Owned(values) => values,
            Storage::Borrowed(values) => values,
        }
    }
}

#[derive(Debug)]
pub struct Grid<'a> {
    storage: Storage<'a>,
    height: usize,
    width: usize,
    channels: usize,
}

impl Grid<'static> {
    /// Zero-filled grid owning its storage.
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            storage: Storage::Owned(vec![0.0; height * width * channels]),
            height,
            width,
            channels,
        }
    }

    /// Takes ownership of `values`.
    pub fn from_vec(values: Vec<Float>, height: usize, width: usize, channels: usize) -> Result<Self> {
        check_len(values.len(), height, width, channels)?;
        Ok(Self {
            storage: Storage::Owned(values),
            height,
            width,
            channels,
        })
    }
}

impl<'a> Grid<'a> {
    /// Non-owning view over `values`; nothing is copied.
    pub fn from_slice(
        values: &'a mut [Float],
        height: usize,
        width: usize,
        channels: usize,
    ) -> Result<Self> {
        check_len(values.len(), height, width, channels)?;
        Ok(Self {
            storage: Storage::Borrowed(values),
            height,
            width,
            channels,
        })
    }

    #[inline]
    fn index(&self, i: usize, j: usize, q: usize) -> usize {
        debug_assert!(
            i < self.height && j < self.width && q < self.channels,
            "({i}, {j}, {q}) outside a {}x{}x{} grid",
            self.height,
            self.width,
            self.channels
        );
        (j + i * self.width) * self.channels + q
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, q: usize) -> Float {
        self.storage.as_slice()[self.index(i, j, q)]
    }

    #[inline]
    pub fn set(&mut self, value: Float, i: usize, j: usize, q: usize) {
        let index = self.index(i, j, q);
        self.storage.as_mut_slice()[index] = value;
    }

    /// All channels of the cell at row `i`, column `j`.
    pub fn cell(&self, i: usize, j: usize) -> &[Float] {
        let start = self.index(i, j, 0);
        &self.storage.as_slice()[start..start + self.channels]
    }

    pub fn data_handle(&self) -> &[Float] {
        self.storage.as_slice()
    }

    pub fn data_handle_mut(&mut self) -> &mut [Float] {
        self.storage.as_mut_slice()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Copies a borrowed view into owned storage.
    pub fn into_owned(self) -> Grid<'static> {
        let values = match self.storage {
            Storage::Owned(values) => values,
            Storage::Borrowed(values) => values.to_vec(),
        };
        Grid {
            storage: Storage::Owned(values),
            height: self.height,
            width: self.width,
            channels: self.channels,
        }
    }

    /// Elementwise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &Grid<'_>, tolerance: Float) -> bool {
        self.height == other.height
            && self.width == other.width
            && self.channels == other.channels
            && self
                .data_handle()
                .iter()
                .zip(other.data_handle())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// Largest absolute elementwise difference, `None` on a shape mismatch.
    pub fn max_abs_diff(&self, other: &Grid<'_>) -> Option<Float> {
        if (self.height, self.width, self.channels) != (other.height, other.width, other.channels) {
            return None;
        }
        Some(
            self.data_handle()
                .iter()
                .zip(other.data_handle())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, Float::max),
        )
    }
}

impl Clone for Grid<'_> {
    fn clone(&self) -> Self {
        Grid {
            storage: Storage::Owned(self.data_handle().to_vec()),
            height: self.height,
            width: self.width,
            channels: self.channels,
        }
    }
}

impl PartialEq<Grid<'_>> for Grid<'_> {
    fn eq(&self, other: &Grid<'_>) -> bool {
        self.approx_eq(other, GRID_TOLERANCE)
    }
}

fn check_len(actual: usize, height: usize, width: usize, channels: usize) -> Result<()> {
    let expected = height * width * channels;
    if actual != expected {
        return Err(LbmError::BufferSize {
            height,
            width,
            channels,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_index_is_row_major_channel_minor() {
        let mut grid = Grid::new(3, 4, 9);
        grid.set(7.0, 2, 1, 5);
        assert_eq!(grid.data_handle()[(1 + 2 * 4) * 9 + 5], 7.0);
        assert_eq!(grid.get(2, 1, 5), 7.0);
        assert_eq!(grid.cell(2, 1)[5], 7.0);
    }

    #[test]
    fn borrowed_view_writes_through_to_the_caller() {
        let mut values = vec![0.0; 2 * 2 * 9];
        {
            let mut view = Grid::from_slice(&mut values, 2, 2, 9).unwrap();
            assert!(!view.is_owned());
            view.set(1.5, 1, 1, 8);
        }
        assert_eq!(values[35], 1.5);
    }

    #[test]
    fn owned_grid_takes_the_vector() {
        let grid = Grid::from_vec(vec![2.0; 12], 2, 2, 3).unwrap();
        assert!(grid.is_owned());
        assert_eq!(grid.get(1, 0, 2), 2.0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let error = Grid::from_vec(vec![0.0; 10], 2, 2, 3).unwrap_err();
        assert!(matches!(
            error,
            LbmError::BufferSize {
                expected: 12,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn equality_uses_the_grid_tolerance() {
        let a = Grid::from_vec(vec![0.25; 9], 1, 1, 9).unwrap();
        let mut b = a.clone();
        b.set(0.25 + 5e-7, 0, 0, 3);
        assert_eq!(a, b);
        b.set(0.25 + 1e-4, 0, 0, 3);
        assert_ne!(a, b);
        assert!(a.approx_eq(&b, 1e-3));
    }

    #[test]
    fn into_owned_detaches_from_the_borrowed_slice() {
        let mut values = vec![1.0; 9];
        let owned = Grid::from_slice(&mut values, 1, 1, 9).unwrap().into_owned();
        values[0] = 3.0;
        assert!(owned.is_owned());
        assert_eq!(owned.get(0, 0, 0), 1.0);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn out_of_range_access_is_checked_in_debug_builds() {
        let grid = Grid::new(2, 2, 9);
        grid.get(0, 2, 0);
    }
}
