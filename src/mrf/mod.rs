//! Markov-Random-Field pixel labeling.
//!
//! Segments the foreground of a mask by annealing a label field. Each
//! pixel's score combines classifier evidence for its label with penalties
//! for disagreeing with its neighbors, optionally steered by a local
//! orientation field.
//!
//! # Examples
//!
//! ```
//! use u_anneal::anneal::AnnealConfig;
//! use u_anneal::grid::{BorderMode, Image};
//! use u_anneal::mrf::{MrfConfig, MrfSegmentation, ProbabilityFeatures};
//!
//! let pad = BorderMode::Constant(0.0);
//! let background = Image::from_interior(2, 2, &[0.2f32; 4], 1, pad).unwrap();
//! let foreground = Image::from_interior(2, 2, &[0.8f32; 4], 1, pad).unwrap();
//! let features = vec![background, foreground];
//! let mask = Image::from_interior(2, 2, &[1u8; 4], 1, BorderMode::Constant(0)).unwrap();
//!
//! let classifier = ProbabilityFeatures::new(2);
//! let config = MrfConfig::default();
//! let mut model = MrfSegmentation::new(&classifier, &features, &mask, config).unwrap();
//! let anneal = AnnealConfig::default().with_max_iterations(200).with_seed(1);
//! let result = model.segment(0.5, &anneal).unwrap();
//! assert!(result.iterations <= 200);
//! ```
//!
//! # References
//!
//! - Geman & Geman (1984), "Stochastic Relaxation, Gibbs Distributions, and
//!   the Bayesian Restoration of Images"
//! - Besag (1986), "On the Statistical Analysis of Dirty Pictures"

mod classifier;
mod config;
mod energy;

pub use classifier::{Classifier, FeaturePreprocessing, Label, ProbabilityFeatures};
pub use config::{ConnectivityTerm, InitialLabeling, MrfConfig};
pub use energy::MrfSegmentation;
