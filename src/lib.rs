//! Stochastic relaxation optimization for pixel labeling.
//!
//! - **Annealing engine**: a generic simulated-annealing loop driving any
//!   [`EnergyModel`](anneal::EnergyModel) through `init`/`sample`/
//!   `evaluate`/`revert` hooks, with single-slot undo of rejected moves.
//! - **MRF segmentation**: a Markov-Random-Field energy that labels the
//!   foreground of a mask from per-pixel classifier probabilities,
//!   neighbor agreement and, optionally, local orientation.
//! - **Grid**: bordered row-major images and stride-based neighborhoods.
//! - **Random**: injectable random sources, so runs can be replayed.
//!
//! # Architecture
//!
//! The engine knows nothing about images; the MRF model is one consumer of
//! it. Classifiers plug in through the narrow
//! [`Classifier`](mrf::Classifier) trait, and feature extraction happens
//! upstream.

pub mod anneal;
pub mod error;
pub mod grid;
pub mod mrf;
pub mod random;

pub use error::AnnealError;
