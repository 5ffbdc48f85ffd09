//! Classifier contract consumed by the MRF energy.

/// Pixel label. Label `0` is the background class.
pub type Label = u8;

/// Per-pixel class evidence.
///
/// The energy model only asks for the probability of a given label; a
/// full classifier can answer through [`predict`](Classifier::predict).
pub trait Classifier: Send + Sync {
    /// Number of labels, `>= 2`.
    fn num_classes(&self) -> usize;

    /// Probability (or unnormalized score) that `label` is correct for a
    /// pixel with the given feature vector.
    fn probability(&self, features: &[f32], label: Label) -> f64;

    /// Score of every label, indexed by label.
    fn predict(&self, features: &[f32]) -> Vec<f64> {
        (0..self.num_classes())
            .map(|l| self.probability(features, l as Label))
            .collect()
    }
}

/// Reads class probabilities straight from the feature vector: plane `l`
/// holds the probability of label `l`.
///
/// Useful when probability maps were produced elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbabilityFeatures {
    classes: usize,
}

impl ProbabilityFeatures {
    pub fn new(classes: usize) -> Self {
        Self { classes }
    }
}

impl Classifier for ProbabilityFeatures {
    fn num_classes(&self) -> usize {
        self.classes
    }

    fn probability(&self, features: &[f32], label: Label) -> f64 {
        features.get(label as usize).map_or(0.0, |&p| p as f64)
    }
}

/// Feature vector rearrangement applied before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeaturePreprocessing {
    /// Sort values in descending order.
    SortDescending,
    /// Cyclic shift so the (first) maximum comes first.
    RotateToMax,
    /// Cyclic shift so the (first) minimum comes first.
    RotateToMin,
    /// Circular smoothing with a normalized 5-tap Gaussian, sigma 1.
    Gauss,
}

/// Half-width of the [`FeaturePreprocessing::Gauss`] kernel.
const GAUSS_RADIUS: isize = 2;

impl FeaturePreprocessing {
    pub fn apply(self, values: &mut [f32]) {
        if values.is_empty() {
            return;
        }
        match self {
            FeaturePreprocessing::SortDescending => {
                values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            }
            FeaturePreprocessing::RotateToMax => {
                let pos = first_extreme(values, |candidate, best| candidate > best);
                values.rotate_left(pos);
            }
            FeaturePreprocessing::RotateToMin => {
                let pos = first_extreme(values, |candidate, best| candidate < best);
                values.rotate_left(pos);
            }
            FeaturePreprocessing::Gauss => gauss_smooth(values),
        }
    }
}

fn gauss_smooth(values: &mut [f32]) {
    let weights: Vec<f32> = (-GAUSS_RADIUS..=GAUSS_RADIUS)
        .map(|x| (-(x * x) as f32 / 2.0).exp())
        .collect();
    let total: f32 = weights.iter().sum();

    let n = values.len() as isize;
    let smoothed: Vec<f32> = (0..n)
        .map(|k| {
            (-GAUSS_RADIUS..=GAUSS_RADIUS)
                .zip(&weights)
                .map(|(offset, w)| values[(k + offset).rem_euclid(n) as usize] * w)
                .sum::<f32>()
                / total
        })
        .collect();
    values.copy_from_slice(&smoothed);
}

fn first_extreme(values: &[f32], replaces: impl Fn(f32, f32) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if replaces(v, values[best]) {
            best = i;
        }
    }
    best
}
