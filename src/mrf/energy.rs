//! MRF pixel-labeling energy.

use super::classifier::{Classifier, FeaturePreprocessing, Label};
use super::config::{ConnectivityTerm, InitialLabeling, MrfConfig};
use crate::anneal::{AnnealConfig, AnnealResult, AnnealingEngine, EnergyModel};
use crate::error::AnnealError;
use crate::grid::{Connectivity, Image, Neighborhood, Orientation};
use crate::random::{RandomSource, StdRandomSource};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The single outstanding mutation.
#[derive(Debug, Clone, Copy)]
struct UndoSlot {
    index: usize,
    previous: Label,
    /// Energy of the affected pixels before the mutation.
    energy_before: f64,
    /// Objective change, known once the candidate has been evaluated.
    delta: Option<f64>,
}

/// Markov-Random-Field segmentation of the foreground of a mask.
///
/// The objective is maximized and sums, over every ROI pixel `i`,
///
/// - [`probability_component`](Self::probability_component): classifier
///   probability of the current label,
/// - half the connectivity term selected by [`ConnectivityTerm`] when
///   `beta > 0`,
/// - half the [`directional_component`](Self::directional_component) when
///   `gamma > 0`.
///
/// The pairwise terms are halved because each pixel of a disagreeing pair
/// sees the same edge, so every edge is scored once. Pixels outside the
/// mask (and border cells, whatever the mask holds there) keep the
/// background label and never contribute to the pairwise terms.
///
/// Evaluation is incremental: only the mutated pixel and its 8-neighbors
/// are rescored. [`full_objective`](Self::full_objective) recomputes the sum
/// from scratch.
pub struct MrfSegmentation<'a, C: Classifier> {
    classifier: &'a C,
    features: &'a [Image<f32>],
    mask: &'a Image<u8>,
    orientation: Option<&'a Image<f32>>,
    config: MrfConfig,
    num_classes: usize,
    roi: Vec<usize>,
    member: Vec<bool>,
    four: Neighborhood,
    eight: Neighborhood,
    labels: Image<Label>,
    probabilities: Vec<Image<f32>>,
    objective: f64,
    undo: Option<UndoSlot>,
    initialized: bool,
}

impl<'a, C: Classifier> MrfSegmentation<'a, C> {
    /// Creates the model over the foreground (`mask > 0`) region.
    ///
    /// `features` holds one plane per feature; every plane and the mask must
    /// share the same extent, and the foreground must keep off the outermost
    /// ring so neighbors stay addressable. Border cells are never part of the
    /// foreground.
    pub fn new(
        classifier: &'a C,
        features: &'a [Image<f32>],
        mask: &'a Image<u8>,
        config: MrfConfig,
    ) -> Result<Self, AnnealError> {
        config.validate()?;

        let num_classes = classifier.num_classes();
        if !(2..=Label::MAX as usize + 1).contains(&num_classes) {
            return Err(AnnealError::InvalidClassifier(format!(
                "number of classes must be in [2, 256], got {num_classes}"
            )));
        }
        if features.is_empty() {
            return Err(AnnealError::InvalidConfig("at least one feature plane is required".into()));
        }
        for plane in features {
            if !plane.same_extent(mask) {
                return Err(AnnealError::ExtentMismatch {
                    what: "feature plane",
                    expected: mask.extent(),
                    found: plane.extent(),
                });
            }
        }

        let mut roi = Vec::new();
        let mut member = vec![false; mask.len()];
        for i in 0..mask.len() {
            if mask[i] == 0 || mask.is_border(i) {
                continue;
            }
            if mask.is_edge(i) {
                return Err(AnnealError::RoiOnImageEdge { index: i });
            }
            roi.push(i);
            member[i] = true;
        }
        if roi.is_empty() {
            return Err(AnnealError::EmptyRoi);
        }

        let stride = mask.columns();
        Ok(Self {
            classifier,
            features,
            mask,
            orientation: None,
            config,
            num_classes,
            roi,
            member,
            four: Neighborhood::new(Connectivity::Four, stride),
            eight: Neighborhood::new(Connectivity::Eight, stride),
            labels: mask.map(|_| 0),
            probabilities: Vec::new(),
            objective: 0.0,
            undo: None,
            initialized: false,
        })
    }

    /// Attaches a local orientation field (radians) for the directional term.
    pub fn with_orientation(mut self, orientation: &'a Image<f32>) -> Result<Self, AnnealError> {
        if !orientation.same_extent(self.mask) {
            return Err(AnnealError::ExtentMismatch {
                what: "orientation field",
                expected: self.mask.extent(),
                found: orientation.extent(),
            });
        }
        self.orientation = Some(orientation);
        Ok(self)
    }

    /// Runs the annealing search with connectivity weight `beta`.
    ///
    /// The random source is seeded from `anneal.seed` (entropy when unset).
    pub fn segment(
        &mut self,
        beta: f64,
        anneal: &AnnealConfig,
    ) -> Result<AnnealResult, AnnealError> {
        let source = StdRandomSource::from_seed_option(anneal.seed);
        self.segment_with_source(beta, anneal, source)
    }

    /// Like [`segment`](Self::segment) with a caller-supplied random source.
    pub fn segment_with_source<S: RandomSource>(
        &mut self,
        beta: f64,
        anneal: &AnnealConfig,
        source: S,
    ) -> Result<AnnealResult, AnnealError> {
        let config = self.config.clone().with_beta(beta);
        config.validate()?;
        self.config = config;

        log::info!(
            "beta: {} gamma: {} temperature: {} epsilon: {} decay: {} max_iterations: {} check: {}",
            self.config.beta,
            self.config.gamma,
            anneal.temperature,
            anneal.epsilon,
            anneal.decay,
            anneal.max_iterations,
            anneal.check_interval
        );

        let mut engine = AnnealingEngine::with_source(anneal.clone(), source)?;
        engine.solve(self)
    }

    pub fn config(&self) -> &MrfConfig {
        &self.config
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Row-major indices of the foreground pixels.
    pub fn roi(&self) -> &[usize] {
        &self.roi
    }

    /// Current label field (same extent as the mask).
    pub fn labels(&self) -> &Image<Label> {
        &self.labels
    }

    pub fn into_labels(self) -> Image<Label> {
        self.labels
    }

    /// Precomputed probability map of `label`, available after `init`.
    pub fn probability_map(&self, label: Label) -> Option<&Image<f32>> {
        self.probabilities.get(label as usize)
    }

    /// Running objective of the current label field.
    pub fn objective(&self) -> f64 {
        self.objective
    }

    fn in_roi(&self, index: usize) -> bool {
        self.member[index]
    }

    /// Probability that the current label of pixel `i` is correct.
    pub fn probability_component(&self, i: usize) -> f64 {
        self.probabilities[self.labels[i] as usize][i] as f64
    }

    /// `-beta` for each 4-neighbor in the ROI whose label differs.
    pub fn connectivity_component(&self, i: usize) -> f64 {
        let label = self.labels[i];
        let differing = self
            .four
            .around(i)
            .filter(|&j| self.in_roi(j) && self.labels[j] != label)
            .count();
        -self.config.beta * differing as f64
    }

    /// `-beta` for each 8-neighbor in the ROI on the other side of the
    /// foreground/background boundary.
    pub fn connectivity_component2(&self, i: usize) -> f64 {
        let foreground = self.labels[i] != 0;
        let differing = self
            .eight
            .around(i)
            .filter(|&j| self.in_roi(j) && (self.labels[j] != 0) != foreground)
            .count();
        -self.config.beta * differing as f64
    }

    /// `-gamma` for each of the two neighbors along the local orientation
    /// whose foreground status differs. Zero without an orientation field.
    pub fn directional_component(&self, i: usize) -> f64 {
        let Some(orientation) = self.orientation else {
            return 0.0;
        };
        let foreground = self.labels[i] != 0;
        let axis = Orientation::from_angle(orientation[i] as f64);
        let differing = axis
            .pair(self.labels.columns())
            .iter()
            .map(|&off| i.wrapping_add_signed(off))
            .filter(|&j| self.in_roi(j) && (self.labels[j] != 0) != foreground)
            .count();
        -self.config.gamma * differing as f64
    }

    /// Total energy contribution of pixel `i`, with its share of the
    /// pairwise terms.
    pub fn pixel_energy(&self, i: usize) -> f64 {
        let mut pairwise = 0.0;
        if self.config.beta > 0.0 {
            pairwise += match self.config.connectivity {
                ConnectivityTerm::FourConnected => self.connectivity_component(i),
                ConnectivityTerm::EightConnectedForeground => self.connectivity_component2(i),
            };
        }
        if self.config.gamma > 0.0 {
            pairwise += self.directional_component(i);
        }
        self.probability_component(i) + 0.5 * pairwise
    }

    /// Objective recomputed over the whole ROI.
    pub fn full_objective(&self) -> f64 {
        self.roi.iter().map(|&i| self.pixel_energy(i)).sum()
    }

    /// Energy of every pixel whose score can change when `i` changes.
    fn local_energy(&self, i: usize) -> f64 {
        self.pixel_energy(i)
            + self
                .eight
                .around(i)
                .filter(|&j| self.in_roi(j))
                .map(|j| self.pixel_energy(j))
                .sum::<f64>()
    }

    /// Folds the delta of a sampled but not yet evaluated mutation into the
    /// running objective.
    fn settle_pending(&mut self) {
        let Some(slot) = self.undo else {
            return;
        };
        if slot.delta.is_some() {
            return;
        }
        let delta = self.local_energy(slot.index) - slot.energy_before;
        self.objective += delta;
        self.undo = Some(UndoSlot {
            delta: Some(delta),
            ..slot
        });
    }

    fn compute_probability_maps(&mut self) -> Result<(), AnnealError> {
        log::debug!(
            "computing {} probability maps over {} pixels",
            self.num_classes,
            self.roi.len()
        );

        let query = PixelQuery {
            classifier: self.classifier,
            features: self.features,
            preprocessing: &self.config.preprocessing,
            normalize: self.config.normalize_probabilities,
            num_classes: self.num_classes,
        };

        #[cfg(feature = "parallel")]
        let distributions: Vec<Vec<f64>> = if self.config.parallel {
            self.roi
                .par_iter()
                .map(|&i| query.distribution(i))
                .collect::<Result<_, _>>()?
        } else {
            self.roi
                .iter()
                .map(|&i| query.distribution(i))
                .collect::<Result<_, _>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let distributions: Vec<Vec<f64>> = self
            .roi
            .iter()
            .map(|&i| query.distribution(i))
            .collect::<Result<_, _>>()?;

        let mut maps = vec![self.mask.map(|_| 0.0f32); self.num_classes];
        for (&i, distribution) in self.roi.iter().zip(&distributions) {
            for (map, &p) in maps.iter_mut().zip(distribution) {
                map[i] = p as f32;
            }
        }
        self.probabilities = maps;
        log::debug!("probability maps computed");
        Ok(())
    }

    fn initial_label<R: RandomSource + ?Sized>(&self, i: usize, rng: &mut R) -> Label {
        match self.config.initial_labeling {
            InitialLabeling::Random => rng.uniform_int(self.num_classes) as Label,
            InitialLabeling::MaximumLikelihood => {
                let mut best = 0usize;
                for l in 1..self.num_classes {
                    if self.probabilities[l][i] > self.probabilities[best][i] {
                        best = l;
                    }
                }
                best as Label
            }
            InitialLabeling::Constant(label) => label,
        }
    }
}

impl<C: Classifier> EnergyModel for MrfSegmentation<'_, C> {
    fn init<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<(), AnnealError> {
        if self.config.gamma > 0.0 && self.orientation.is_none() {
            return Err(AnnealError::MissingOrientation);
        }
        if let InitialLabeling::Constant(label) = self.config.initial_labeling {
            if label as usize >= self.num_classes {
                return Err(AnnealError::InvalidConfig(format!(
                    "initial label {label} exceeds the {} classes",
                    self.num_classes
                )));
            }
        }

        if self.probabilities.is_empty() {
            self.compute_probability_maps()?;
        }

        let initial: Vec<Label> = self
            .roi
            .iter()
            .map(|&i| self.initial_label(i, rng))
            .collect();
        self.labels.fill(0);
        for (&i, label) in self.roi.iter().zip(initial) {
            self.labels[i] = label;
        }

        self.undo = None;
        self.objective = self.full_objective();
        self.initialized = true;
        Ok(())
    }

    /// Relabels one uniformly chosen ROI pixel with a different label.
    fn sample<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<(), AnnealError> {
        if !self.initialized {
            return Err(AnnealError::Model("sample called before init".into()));
        }
        // A pending slot here means the previous candidate was accepted.
        self.settle_pending();

        let index = self.roi[rng.uniform_int(self.roi.len())];
        let previous = self.labels[index];
        let pick = rng.uniform_int(self.num_classes - 1) as Label;
        let label = if pick >= previous { pick + 1 } else { pick };

        let energy_before = self.local_energy(index);
        self.labels[index] = label;
        self.undo = Some(UndoSlot {
            index,
            previous,
            energy_before,
            delta: None,
        });
        Ok(())
    }

    fn evaluate(&mut self) -> Result<f64, AnnealError> {
        if !self.initialized {
            return Err(AnnealError::Model("evaluate called before init".into()));
        }
        self.settle_pending();
        Ok(self.objective)
    }

    fn revert(&mut self) {
        if let Some(slot) = self.undo.take() {
            self.labels[slot.index] = slot.previous;
            if let Some(delta) = slot.delta {
                self.objective -= delta;
            }
        }
    }
}

/// Read-only view used to classify pixels, shareable across threads.
struct PixelQuery<'q, C: Classifier> {
    classifier: &'q C,
    features: &'q [Image<f32>],
    preprocessing: &'q [FeaturePreprocessing],
    normalize: bool,
    num_classes: usize,
}

impl<C: Classifier> PixelQuery<'_, C> {
    fn distribution(&self, i: usize) -> Result<Vec<f64>, AnnealError> {
        let mut vector: Vec<f32> = self.features.iter().map(|plane| plane[i]).collect();
        for step in self.preprocessing {
            step.apply(&mut vector);
        }

        let mut scores = self.classifier.predict(&vector);
        if scores.len() != self.num_classes {
            return Err(AnnealError::InvalidClassifier(format!(
                "expected {} class scores, got {}",
                self.num_classes,
                scores.len()
            )));
        }
        if scores.iter().any(|p| !p.is_finite()) {
            return Err(AnnealError::InvalidClassifier(format!(
                "non-finite class score at index {i}"
            )));
        }

        if self.normalize {
            let total: f64 = scores.iter().sum();
            if total <= 0.0 {
                return Err(AnnealError::InvalidClassifier(format!(
                    "class scores at index {i} do not sum to a positive value"
                )));
            }
            scores.iter_mut().for_each(|p| *p /= total);
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anneal::StopReason;
    use crate::grid::BorderMode;
    use crate::mrf::ProbabilityFeatures;
    use proptest::prelude::*;

    const A: Label = 1;
    const B: Label = 0;

    fn padded<T: Copy>(rows: usize, cols: usize, values: &[T], fill: T) -> Image<T> {
        Image::from_interior(rows, cols, values, 1, BorderMode::Constant(fill)).unwrap()
    }

    /// Two probability planes: plane `l` is p(label l).
    fn probability_planes(rows: usize, cols: usize, p_a: &[f32]) -> Vec<Image<f32>> {
        let p_b: Vec<f32> = p_a.iter().map(|p| 1.0 - p).collect();
        vec![padded(rows, cols, &p_b, 0.0), padded(rows, cols, p_a, 0.0)]
    }

    fn full_mask(rows: usize, cols: usize) -> Image<u8> {
        padded(rows, cols, &vec![1u8; rows * cols], 0)
    }

    #[test]
    fn test_end_to_end_converges_to_all_a() {
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(4, 4, &[1.0; 16]);
        let mask = full_mask(4, 4);
        let anneal = AnnealConfig::default()
            .with_temperature(4.0)
            .with_epsilon(0.0001)
            .with_decay(0.99)
            .with_max_iterations(1000)
            .with_check_interval(0);

        for seed in 0..20u64 {
            let mut model =
                MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
            let result = model.segment(1.0, &anneal.clone().with_seed(seed)).unwrap();
            assert!(result.iterations <= 1000);
            assert!(
                model.labels().interior().iter().all(|&l| l == A),
                "seed {seed} did not reach all-A: {:?}",
                model.labels().interior()
            );
            assert!((result.objective - 16.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_objective_scores_each_edge_once() {
        // 3x3 interior of B with an A center: four disagreeing 4-edges.
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(3, 3, &[0.25; 9]);
        let mask = full_mask(3, 3);
        let config = MrfConfig::default()
            .with_beta(0.5)
            .with_initial_labeling(InitialLabeling::Constant(B));
        let mut model = MrfSegmentation::new(&classifier, &features, &mask, config).unwrap();
        model.init(&mut StdRandomSource::seeded(0)).unwrap();
        assert!((model.evaluate().unwrap() - 9.0 * 0.75).abs() < 1e-6);

        let center = mask.interior_index(1, 1);
        let probability_before = model.probability_component(center);
        let connectivity_before = model.connectivity_component(center);
        model.labels[center] = A;
        let expected = 8.0 * 0.75 + 0.25 - 4.0 * 0.5;
        assert!((model.full_objective() - expected).abs() < 1e-6);

        // The change equals the flipped pixel's own terms.
        let own_delta = model.probability_component(center) - probability_before
            + model.connectivity_component(center)
            - connectivity_before;
        assert!((model.full_objective() - 9.0 * 0.75 - own_delta).abs() < 1e-6);
    }

    #[test]
    fn test_revert_restores_field() {
        let classifier = ProbabilityFeatures::new(2);
        let p: Vec<f32> = (0..25).map(|k| (k as f32) / 25.0).collect();
        let features = probability_planes(5, 5, &p);
        let mask = full_mask(5, 5);
        let mut model =
            MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
        let mut rng = StdRandomSource::seeded(3);
        model.init(&mut rng).unwrap();

        for _ in 0..200 {
            let before = model.labels().clone();
            let objective_before = model.evaluate().unwrap();
            model.sample(&mut rng).unwrap();
            let changed = before
                .as_slice()
                .iter()
                .zip(model.labels().as_slice())
                .filter(|(a, b)| a != b)
                .count();
            assert_eq!(changed, 1, "sample must mutate exactly one pixel");
            model.evaluate().unwrap();
            model.revert();
            assert_eq!(model.labels(), &before);
            assert!((model.evaluate().unwrap() - objective_before).abs() < 1e-9);
        }
    }

    #[test]
    fn test_component_values() {
        // 3x3 interior, center pixel foreground, everything else background.
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(3, 3, &[0.25; 9]);
        let mask = full_mask(3, 3);
        let config = MrfConfig::default()
            .with_beta(0.5)
            .with_initial_labeling(InitialLabeling::Constant(B));
        let mut model = MrfSegmentation::new(&classifier, &features, &mask, config).unwrap();
        model.init(&mut StdRandomSource::seeded(0)).unwrap();

        let center = mask.interior_index(1, 1);
        let corner = mask.interior_index(0, 0);
        let edge = mask.interior_index(0, 1);
        model.labels[center] = A;

        assert!((model.probability_component(center) - 0.25).abs() < 1e-6);
        assert!((model.probability_component(corner) - 0.75).abs() < 1e-6);
        assert!((model.connectivity_component(center) + 2.0).abs() < 1e-12);
        assert!((model.connectivity_component2(center) + 4.0).abs() < 1e-12);
        // border cells are outside the ROI and never penalize
        assert!((model.connectivity_component(corner)).abs() < 1e-12);
        assert!((model.connectivity_component(edge) + 0.5).abs() < 1e-12);
        assert!((model.connectivity_component2(corner) + 0.5).abs() < 1e-12);
        assert_eq!(model.directional_component(center), 0.0);
    }

    #[test]
    fn test_directional_component_follows_orientation() {
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(3, 3, &[0.5; 9]);
        let mask = full_mask(3, 3);
        let vertical = padded(3, 3, &[std::f32::consts::FRAC_PI_2; 9], 0.0);
        let config = MrfConfig::default()
            .with_gamma(2.0)
            .with_initial_labeling(InitialLabeling::Constant(B));
        let mut model = MrfSegmentation::new(&classifier, &features, &mask, config)
            .unwrap()
            .with_orientation(&vertical)
            .unwrap();
        model.init(&mut StdRandomSource::seeded(0)).unwrap();

        let center = mask.interior_index(1, 1);
        let above = mask.interior_index(0, 1);
        let left = mask.interior_index(1, 0);

        model.labels[center] = A;
        assert!((model.directional_component(center) + 4.0).abs() < 1e-12);

        model.labels[above] = A;
        model.labels[left] = A;
        // only the vertical neighbors count: above agrees, below differs
        assert!((model.directional_component(center) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_always_changes_label() {
        let classifier = ProbabilityFeatures::new(3);
        let plane = padded(4, 4, &[1.0f32 / 3.0; 16], 0.0);
        let features = vec![plane.clone(), plane.clone(), plane];
        let mask = full_mask(4, 4);
        let mut model =
            MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
        let mut rng = StdRandomSource::seeded(11);
        model.init(&mut rng).unwrap();

        for _ in 0..300 {
            model.sample(&mut rng).unwrap();
            let slot = model.undo.expect("sample records an undo slot");
            let current = model.labels()[slot.index];
            assert_ne!(current, slot.previous);
            assert!((current as usize) < 3);
            assert!(model.in_roi(slot.index));
            model.evaluate().unwrap();
        }
    }

    #[test]
    fn test_non_roi_cells_never_change() {
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(4, 4, &[0.8; 16]);
        #[rustfmt::skip]
        let mask = padded(4, 4, &[
            0, 1, 1, 0,
            0, 1, 1, 0,
            0, 1, 1, 0,
            0, 0, 0, 0,
        ], 0u8);
        let mut model =
            MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
        let anneal = AnnealConfig::default()
            .with_max_iterations(500)
            .with_decay(0.99)
            .with_check_interval(0)
            .with_seed(5);
        model.segment(1.0, &anneal).unwrap();

        assert_eq!(model.roi().len(), 6);
        for i in 0..mask.len() {
            if mask[i] == 0 {
                assert_eq!(model.labels()[i], 0);
            }
        }
    }

    #[test]
    fn test_maximum_likelihood_initialization() {
        let classifier = ProbabilityFeatures::new(2);
        let p_a = [0.9, 0.1, 0.7, 0.2];
        let features = probability_planes(2, 2, &p_a);
        let mask = full_mask(2, 2);
        let config = MrfConfig::default().with_initial_labeling(InitialLabeling::MaximumLikelihood);
        let mut model = MrfSegmentation::new(&classifier, &features, &mask, config).unwrap();
        model.init(&mut StdRandomSource::seeded(1)).unwrap();
        assert_eq!(model.labels().interior(), vec![A, B, A, B]);
    }

    #[test]
    fn test_probability_maps_are_normalized() {
        struct Scores;
        impl Classifier for Scores {
            fn num_classes(&self) -> usize {
                2
            }
            fn probability(&self, features: &[f32], label: Label) -> f64 {
                if label == 0 {
                    features[0] as f64
                } else {
                    3.0 * features[0] as f64
                }
            }
        }

        let features = vec![padded(2, 2, &[2.0f32; 4], 0.0)];
        let mask = full_mask(2, 2);
        let mut model =
            MrfSegmentation::new(&Scores, &features, &mask, MrfConfig::default()).unwrap();
        model.init(&mut StdRandomSource::seeded(1)).unwrap();

        let i = mask.interior_index(0, 0);
        assert!((model.probability_map(0).unwrap()[i] - 0.25).abs() < 1e-6);
        assert!((model.probability_map(1).unwrap()[i] - 0.75).abs() < 1e-6);
        assert!(model.probability_map(2).is_none());
    }

    #[test]
    fn test_preprocessing_reaches_classifier() {
        // After RotateToMax the first feature is the largest one.
        struct FirstFeature;
        impl Classifier for FirstFeature {
            fn num_classes(&self) -> usize {
                2
            }
            fn probability(&self, features: &[f32], label: Label) -> f64 {
                if label == 1 {
                    features[0] as f64
                } else {
                    1.0 - features[0] as f64
                }
            }
        }

        let features = vec![
            padded(1, 1, &[0.1f32], 0.0),
            padded(1, 1, &[0.6f32], 0.0),
            padded(1, 1, &[0.3f32], 0.0),
        ];
        let mask = full_mask(1, 1);
        let config = MrfConfig::default().with_preprocessing(FeaturePreprocessing::RotateToMax);
        let mut model = MrfSegmentation::new(&FirstFeature, &features, &mask, config).unwrap();
        model.init(&mut StdRandomSource::seeded(1)).unwrap();

        let i = mask.interior_index(0, 0);
        assert!((model.probability_map(1).unwrap()[i] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_empty_roi() {
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(3, 3, &[0.5; 9]);
        let mask = padded(3, 3, &[0u8; 9], 0);
        let err = MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default());
        assert!(matches!(err, Err(AnnealError::EmptyRoi)));
    }

    #[test]
    fn test_rejects_roi_on_edge() {
        let classifier = ProbabilityFeatures::new(2);
        let features = vec![Image::new(3, 3, 0, 0.5f32), Image::new(3, 3, 0, 0.5f32)];
        let mask = Image::new(3, 3, 0, 1u8);
        let err = MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default());
        assert!(matches!(err, Err(AnnealError::RoiOnImageEdge { index: 0 })));
    }

    #[test]
    fn test_border_cells_are_not_foreground() {
        let classifier = ProbabilityFeatures::new(2);
        let features = vec![Image::new(3, 3, 2, 0.5f32), Image::new(3, 3, 2, 0.5f32)];
        let mut mask = Image::new(3, 3, 2, 0u8);
        for i in 0..mask.len() {
            if !mask.is_edge(i) {
                mask[i] = 1;
            }
        }
        let mut model =
            MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
        assert_eq!(model.roi().len(), 9);
        assert!(model.roi().iter().all(|&i| !mask.is_border(i)));

        let mut rng = StdRandomSource::seeded(2);
        model.init(&mut rng).unwrap();
        for _ in 0..200 {
            model.sample(&mut rng).unwrap();
            let slot = model.undo.expect("sample records an undo slot");
            assert!(!mask.is_border(slot.index));
            model.evaluate().unwrap();
            assert!((model.objective() - model.full_objective()).abs() < 1e-9);
        }
        for i in 0..mask.len() {
            if mask.is_border(i) {
                assert_eq!(model.labels()[i], 0);
            }
        }
    }

    #[test]
    fn test_rejects_extent_mismatch() {
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(3, 3, &[0.5; 9]);
        let mask = full_mask(4, 3);
        let err = MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default());
        assert!(matches!(err, Err(AnnealError::ExtentMismatch { .. })));
    }

    #[test]
    fn test_rejects_single_class() {
        let classifier = ProbabilityFeatures::new(1);
        let features = probability_planes(3, 3, &[0.5; 9]);
        let mask = full_mask(3, 3);
        let err = MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default());
        assert!(matches!(err, Err(AnnealError::InvalidClassifier(_))));
    }

    #[test]
    fn test_gamma_requires_orientation() {
        let classifier = ProbabilityFeatures::new(2);
        let features = probability_planes(3, 3, &[0.5; 9]);
        let mask = full_mask(3, 3);
        let config = MrfConfig::default().with_gamma(1.0);
        let mut model = MrfSegmentation::new(&classifier, &features, &mask, config).unwrap();
        let anneal = AnnealConfig::default().with_max_iterations(10).with_seed(1);
        assert_eq!(
            model.segment(1.0, &anneal).unwrap_err(),
            AnnealError::MissingOrientation
        );
    }

    #[test]
    fn test_rejects_degenerate_probabilities() {
        let classifier = ProbabilityFeatures::new(2);
        let zeros = padded(2, 2, &[0.0f32; 4], 0.0);
        let features = vec![zeros.clone(), zeros];
        let mask = full_mask(2, 2);
        let mut model =
            MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
        let err = model.init(&mut StdRandomSource::seeded(1)).unwrap_err();
        assert!(matches!(err, AnnealError::InvalidClassifier(_)));
    }

    #[test]
    fn test_zero_beta_follows_probabilities() {
        let classifier = ProbabilityFeatures::new(2);
        let p_a: Vec<f32> = (0..16).map(|k| if k % 3 == 0 { 0.9 } else { 0.1 }).collect();
        let features = probability_planes(4, 4, &p_a);
        let mask = full_mask(4, 4);
        let mut model =
            MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
        let anneal = AnnealConfig::default()
            .with_temperature(0.05)
            .with_epsilon(1e-9)
            .with_decay(0.995)
            .with_max_iterations(3000)
            .with_check_interval(0)
            .with_seed(9);

        let result = model.segment(0.0, &anneal).unwrap();

        assert_eq!(result.stop_reason, StopReason::MaxIterations);
        let expected: Vec<Label> = p_a.iter().map(|&p| if p > 0.5 { A } else { B }).collect();
        assert_eq!(model.labels().interior(), expected);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_probability_maps_match_sequential() {
        let classifier = ProbabilityFeatures::new(2);
        let p: Vec<f32> = (0..64).map(|k| (k % 7) as f32 / 7.0 + 0.01).collect();
        let features = probability_planes(8, 8, &p);
        let mask = full_mask(8, 8);

        let mut sequential =
            MrfSegmentation::new(&classifier, &features, &mask, MrfConfig::default()).unwrap();
        sequential.init(&mut StdRandomSource::seeded(4)).unwrap();
        let mut parallel = MrfSegmentation::new(
            &classifier,
            &features,
            &mask,
            MrfConfig::default().with_parallel(true),
        )
        .unwrap();
        parallel.init(&mut StdRandomSource::seeded(4)).unwrap();

        for l in 0..2 {
            assert_eq!(sequential.probability_map(l), parallel.probability_map(l));
        }
    }

    /// Random walk of sample/accept/reject steps comparing the incremental
    /// objective with a full recompute after every step.
    fn random_walk_matches_full(config: MrfConfig, seed: u64, orientation: bool) {
        let classifier = ProbabilityFeatures::new(3);
        let (rows, cols) = (6, 7);
        let n = rows * cols;
        let planes: Vec<Image<f32>> = (0..3)
            .map(|c| {
                let v: Vec<f32> = (0..n)
                    .map(|k| ((k * (c + 2) + c) % 11) as f32 / 10.0 + 0.05)
                    .collect();
                padded(rows, cols, &v, 0.0)
            })
            .collect();
        let roi: Vec<u8> = (0..n).map(|k| u8::from((k * 5 + 1) % 9 != 0)).collect();
        let mask = padded(rows, cols, &roi, 0);
        let angles: Vec<f32> = (0..n).map(|k| (k as f32) * 0.37).collect();
        let field = padded(rows, cols, &angles, 0.0);

        let mut model = MrfSegmentation::new(&classifier, &planes, &mask, config).unwrap();
        if orientation {
            model = model.with_orientation(&field).unwrap();
        }
        let mut rng = StdRandomSource::seeded(seed);
        model.init(&mut rng).unwrap();

        for _ in 0..1000 {
            model.sample(&mut rng).unwrap();
            let incremental = model.evaluate().unwrap();
            let full = model.full_objective();
            assert!(
                (incremental - full).abs() < 1e-6,
                "incremental {incremental} != full {full}"
            );
            if rng.uniform() < 0.5 {
                model.revert();
                let reverted = model.evaluate().unwrap();
                assert!((reverted - model.full_objective()).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_incremental_matches_full_four_connected() {
        random_walk_matches_full(MrfConfig::default().with_beta(0.7), 17, false);
    }

    #[test]
    fn test_incremental_matches_full_eight_connected_with_orientation() {
        let config = MrfConfig::default()
            .with_beta(1.3)
            .with_gamma(0.4)
            .with_connectivity(ConnectivityTerm::EightConnectedForeground);
        random_walk_matches_full(config, 23, true);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_incremental_matches_full(
            seed in any::<u64>(),
            beta in 0.0f64..3.0,
            gamma in 0.0f64..3.0,
            eight in any::<bool>(),
        ) {
            let connectivity = if eight {
                ConnectivityTerm::EightConnectedForeground
            } else {
                ConnectivityTerm::FourConnected
            };
            let config = MrfConfig::default()
                .with_beta(beta)
                .with_gamma(gamma)
                .with_connectivity(connectivity);
            random_walk_matches_full(config, seed, true);
        }
    }
}
