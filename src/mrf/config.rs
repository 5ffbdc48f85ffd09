//! MRF segmentation parameters.

use super::classifier::{FeaturePreprocessing, Label};
use crate::error::AnnealError;

/// Which pairwise term penalizes neighbor disagreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectivityTerm {
    /// `-beta` per 4-neighbor carrying a different label.
    #[default]
    FourConnected,
    /// `-beta` per 8-neighbor on the other side of the
    /// foreground/background boundary.
    EightConnectedForeground,
}

/// How the label field is seeded in `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitialLabeling {
    /// Uniformly random label per ROI pixel.
    #[default]
    Random,
    /// Most probable label per ROI pixel.
    MaximumLikelihood,
    /// The same label everywhere in the ROI.
    Constant(Label),
}

/// Configuration of the MRF energy.
///
/// # Examples
///
/// ```
/// use u_anneal::mrf::{ConnectivityTerm, MrfConfig};
///
/// let config = MrfConfig::default()
///     .with_beta(0.5)
///     .with_gamma(0.25)
///     .with_connectivity(ConnectivityTerm::EightConnectedForeground);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MrfConfig {
    /// Connectivity weight. `0` disables the pairwise term.
    pub beta: f64,

    /// Orientation weight. `0` disables the directional term; a positive
    /// value requires an orientation field.
    pub gamma: f64,

    pub connectivity: ConnectivityTerm,

    pub initial_labeling: InitialLabeling,

    /// Applied in order to every feature vector before classification.
    pub preprocessing: Vec<FeaturePreprocessing>,

    /// Rescale each pixel's class scores to sum to one.
    pub normalize_probabilities: bool,

    /// Compute probability maps in parallel (requires the `parallel`
    /// feature; ignored otherwise).
    pub parallel: bool,
}

impl Default for MrfConfig {
    fn default() -> Self {
        Self {
            beta: 1.0,
            gamma: 0.0,
            connectivity: ConnectivityTerm::default(),
            initial_labeling: InitialLabeling::default(),
            preprocessing: Vec::new(),
            normalize_probabilities: true,
            parallel: false,
        }
    }
}

impl MrfConfig {
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_connectivity(mut self, connectivity: ConnectivityTerm) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_initial_labeling(mut self, labeling: InitialLabeling) -> Self {
        self.initial_labeling = labeling;
        self
    }

    pub fn with_preprocessing(mut self, step: FeaturePreprocessing) -> Self {
        self.preprocessing.push(step);
        self
    }

    pub fn with_normalize_probabilities(mut self, normalize: bool) -> Self {
        self.normalize_probabilities = normalize;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates the weights.
    pub fn validate(&self) -> Result<(), AnnealError> {
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(AnnealError::InvalidConfig(format!(
                "beta must be finite and non-negative, got {}",
                self.beta
            )));
        }
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(AnnealError::InvalidConfig(format!(
                "gamma must be finite and non-negative, got {}",
                self.gamma
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MrfConfig::default();
        assert!((config.beta - 1.0).abs() < 1e-12);
        assert_eq!(config.gamma, 0.0);
        assert_eq!(config.connectivity, ConnectivityTerm::FourConnected);
        assert_eq!(config.initial_labeling, InitialLabeling::Random);
        assert!(config.normalize_probabilities);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_negative_beta() {
        assert!(MrfConfig::default().with_beta(-0.1).validate().is_err());
    }

    #[test]
    fn test_validate_nan_gamma() {
        assert!(MrfConfig::default().with_gamma(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_preprocessing_order_is_kept() {
        let config = MrfConfig::default()
            .with_preprocessing(FeaturePreprocessing::SortDescending)
            .with_preprocessing(FeaturePreprocessing::RotateToMin);
        assert_eq!(
            config.preprocessing,
            vec![
                FeaturePreprocessing::SortDescending,
                FeaturePreprocessing::RotateToMin
            ]
        );
    }
}
