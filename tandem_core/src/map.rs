use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Grid has no cells")]
    Empty,
    #[error("Row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Cells are addressed by [`Position`], `x` being the column and `y` the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a grid from a list of rows, top row first.
    ///
    /// Every row must have the same, non-zero, length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(GridError::Ragged {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            cells.extend(values);
        }

        Ok(Grid {
            width,
            height,
            cells,
        })
    }

    /// Returns the width of the grid.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the grid.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts a position to a flat vector index.
    ///
    /// Returns `None` if the position is out of bounds.
    #[inline]
    fn index_of(&self, position: Position) -> Option<usize> {
        if self.contains(position) {
            Some(position.y * self.width + position.x)
        } else {
            None
        }
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }

    /// Gets an immutable reference to the cell at the given position.
    ///
    /// Returns `None` if the position is out of bounds.
    pub fn get(&self, position: Position) -> Option<&T> {
        self.index_of(position).and_then(|index| self.cells.get(index))
    }

    /// Returns an iterator over every position of the grid in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let width = self.width;
        (0..self.cells.len()).map(move |index| Position {
            x: index % width,
            y: index / width,
        })
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            (
                Position {
                    x: index % width,
                    y: index / width,
                },
                cell,
            )
        })
    }
}

/// Indexing using Position coordinates for access
impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Position) -> &Self::Output {
        self.get(index).unwrap_or_else(|| {
            panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                index, self.width, self.height
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Grid<u8> {
        Grid::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap()
    }

    #[test]
    fn from_rows_is_row_major() {
        let grid = sample();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid[Position::new(0, 0)], 1);
        assert_eq!(grid[Position::new(2, 0)], 3);
        assert_eq!(grid[Position::new(0, 1)], 4);
        assert_eq!(grid.get(Position::new(3, 0)), None);
        assert_eq!(grid.get(Position::new(0, 2)), None);
    }

    #[test]
    fn from_rows_rejects_bad_shapes() {
        assert_eq!(Grid::<u8>::from_rows(vec![]), Err(GridError::Empty));
        assert_eq!(Grid::<u8>::from_rows(vec![vec![]]), Err(GridError::Empty));
        assert_eq!(
            Grid::from_rows(vec![vec![1, 2], vec![3]]),
            Err(GridError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn positions_cover_every_cell_once() {
        let grid = sample();
        let positions: Vec<Position> = grid.positions().collect();
        assert_eq!(positions.len(), 6);
        assert_eq!(positions[0], Position::new(0, 0));
        assert_eq!(positions[3], Position::new(0, 1));
        let values: Vec<u8> = grid.enumerate().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_panics_outside() {
        let grid = sample();
        let _ = grid[Position::new(9, 9)];
    }
}
