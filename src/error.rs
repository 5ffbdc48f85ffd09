//! Error type shared by the engine and the energy models.

use thiserror::Error;

/// Errors raised while configuring or running an annealing search.
///
/// The engine itself never fails on its own: every variant here is
/// produced either by configuration validation or by an energy model hook.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnealError {
    /// A numeric parameter is outside its admissible range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two grids that must share an extent do not.
    #[error("{what} extent mismatch: expected {expected:?}, found {found:?}")]
    ExtentMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// The foreground mask selects no pixel.
    #[error("region of interest is empty")]
    EmptyRoi,

    /// A foreground pixel lies on the outermost ring, so its neighbors
    /// cannot be addressed by stride arithmetic.
    #[error("region of interest touches the image edge at index {index}; add a border")]
    RoiOnImageEdge { index: usize },

    /// `gamma > 0` was requested without an orientation field.
    #[error("orientation term enabled but no orientation field supplied")]
    MissingOrientation,

    /// The classifier cannot serve the labeling problem.
    #[error("invalid classifier: {0}")]
    InvalidClassifier(String),

    /// Failure reported by a user-defined energy model.
    #[error("energy model failure: {0}")]
    Model(String),
}
