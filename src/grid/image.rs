//! Row-major image buffer with a border ring.

use std::ops::{Index, IndexMut};

use crate::error::AnnealError;

/// How border cells are filled when an image is padded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderMode<T> {
    /// Every border cell holds the same value.
    Constant(T),
    /// Border cells mirror the interior across the edge (edge not repeated).
    Mirrored,
}

/// A 2-D row-major buffer surrounded by a border of fixed width.
///
/// `rows()`/`columns()` report the full extent including the border, and
/// `columns()` is the stride. Neighbors of an interior pixel are reached by
/// `index ± 1` and `index ± columns()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    rows: usize,
    columns: usize,
    border: usize,
    data: Vec<T>,
}

impl<T: Copy> Image<T> {
    /// Creates an image with `rows x columns` interior pixels and a border of
    /// width `border`, every cell set to `fill`.
    pub fn new(rows: usize, columns: usize, border: usize, fill: T) -> Self {
        let full_rows = rows + 2 * border;
        let full_columns = columns + 2 * border;
        Self {
            rows: full_rows,
            columns: full_columns,
            border,
            data: vec![fill; full_rows * full_columns],
        }
    }

    /// Pads row-major interior `values` with a border.
    pub fn from_interior(
        rows: usize,
        columns: usize,
        values: &[T],
        border: usize,
        mode: BorderMode<T>,
    ) -> Result<Self, AnnealError> {
        if values.len() != rows * columns {
            return Err(AnnealError::ExtentMismatch {
                what: "interior data",
                expected: (rows, columns),
                found: (values.len(), 1),
            });
        }
        if rows == 0 || columns == 0 {
            return Err(AnnealError::InvalidConfig("image must not be empty".into()));
        }

        let fill = match mode {
            BorderMode::Constant(v) => v,
            BorderMode::Mirrored => values[0],
        };
        let mut image = Self::new(rows, columns, border, fill);

        for r in 0..image.rows {
            for c in 0..image.columns {
                let ir = r as isize - border as isize;
                let ic = c as isize - border as isize;
                let inside = ir >= 0 && ic >= 0 && (ir as usize) < rows && (ic as usize) < columns;
                let value = if inside {
                    values[ir as usize * columns + ic as usize]
                } else {
                    match mode {
                        BorderMode::Constant(v) => v,
                        BorderMode::Mirrored => {
                            values[reflect(ir, rows) * columns + reflect(ic, columns)]
                        }
                    }
                };
                let idx = r * image.columns + c;
                image.data[idx] = value;
            }
        }
        Ok(image)
    }

    /// Full row count including the border.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Full column count including the border; also the row stride.
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn border(&self) -> usize {
        self.border
    }

    /// `(rows, columns)` including the border.
    pub fn extent(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    pub fn interior_rows(&self) -> usize {
        self.rows - 2 * self.border
    }

    pub fn interior_columns(&self) -> usize {
        self.columns - 2 * self.border
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major index of full-extent coordinates.
    pub fn index_of(&self, row: usize, column: usize) -> usize {
        row * self.columns + column
    }

    /// Row-major index of interior coordinates.
    pub fn interior_index(&self, row: usize, column: usize) -> usize {
        self.index_of(row + self.border, column + self.border)
    }

    /// Full-extent `(row, column)` of an index.
    pub fn row_col(&self, index: usize) -> (usize, usize) {
        (index / self.columns, index % self.columns)
    }

    /// Whether `index` lies in the border ring.
    pub fn is_border(&self, index: usize) -> bool {
        let (r, c) = self.row_col(index);
        r < self.border
            || c < self.border
            || r >= self.rows - self.border
            || c >= self.columns - self.border
    }

    /// Whether `index` lies on the outermost ring, where stride arithmetic
    /// would leave the buffer.
    pub fn is_edge(&self, index: usize) -> bool {
        let (r, c) = self.row_col(index);
        r == 0 || c == 0 || r + 1 == self.rows || c + 1 == self.columns
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Copies the interior (border stripped) in row-major order.
    pub fn interior(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.interior_rows() * self.interior_columns());
        for r in self.border..self.rows - self.border {
            let start = r * self.columns + self.border;
            out.extend_from_slice(&self.data[start..start + self.interior_columns()]);
        }
        out
    }

    /// Same extent and border, values transformed by `f`.
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Image<U> {
        Image {
            rows: self.rows,
            columns: self.columns,
            border: self.border,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Whether both images share the full extent.
    pub fn same_extent<U>(&self, other: &Image<U>) -> bool {
        self.rows == other.rows && self.columns == other.columns
    }
}

impl<T> Index<usize> for Image<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for Image<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

/// Mirror coordinate `i` into `[0, n)` without repeating the edge sample.
fn reflect(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}
