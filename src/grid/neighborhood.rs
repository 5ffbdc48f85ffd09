//! Neighbor offsets derived from the row stride.

use std::f64::consts::PI;

/// Pixel adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connectivity {
    /// Up, down, left, right.
    Four,
    /// [`Four`](Connectivity::Four) plus the diagonals.
    Eight,
}

/// Fixed set of index offsets for one stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighborhood {
    offsets: [isize; 8],
    len: usize,
}

impl Neighborhood {
    pub fn new(connectivity: Connectivity, stride: usize) -> Self {
        let s = stride as isize;
        let offsets = [-s, s, -1, 1, -s - 1, -s + 1, s - 1, s + 1];
        let len = match connectivity {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        };
        Self { offsets, len }
    }

    pub fn offsets(&self) -> &[isize] {
        &self.offsets[..self.len]
    }

    /// Neighbor indices of `index`.
    ///
    /// `index` must not lie on the outermost ring of the grid.
    pub fn around(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.offsets()
            .iter()
            .map(move |&off| index.wrapping_add_signed(off))
    }
}

/// Local structure orientation, quantized to four axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Angle in `[0, π/8)` or `[7π/8, π)`.
    Horizontal,
    /// Angle in `[π/8, 3π/8)`.
    Diagonal,
    /// Angle in `[3π/8, 5π/8)`.
    Vertical,
    /// Angle in `[5π/8, 7π/8)`.
    AntiDiagonal,
}

impl Orientation {
    /// Quantizes an angle in radians; any real is folded into `[0, π)`.
    pub fn from_angle(theta: f64) -> Self {
        let t = theta.rem_euclid(PI);
        let eighth = PI / 8.0;
        if t < eighth || t >= 7.0 * eighth {
            Orientation::Horizontal
        } else if t < 3.0 * eighth {
            Orientation::Diagonal
        } else if t < 5.0 * eighth {
            Orientation::Vertical
        } else {
            Orientation::AntiDiagonal
        }
    }

    /// The two neighbor offsets lying along this axis.
    pub fn pair(self, stride: usize) -> [isize; 2] {
        let s = stride as isize;
        match self {
            Orientation::Horizontal => [-1, 1],
            Orientation::Diagonal => [-s + 1, s - 1],
            Orientation::Vertical => [-s, s],
            Orientation::AntiDiagonal => [-s - 1, s + 1],
        }
    }
}
