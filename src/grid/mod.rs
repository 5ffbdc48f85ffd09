//! Grid storage and neighborhood arithmetic.
//!
//! Images are row-major buffers with a border ring, so every pixel of
//! interest can reach its neighbors through `index ± 1` and
//! `index ± stride` without bounds checks against the grid edge.

mod image;
mod neighborhood;

pub use image::{BorderMode, Image};
pub use neighborhood::{Connectivity, Neighborhood, Orientation};
