//! Isolation Forest
//!
//! An ensemble of isolation trees, each grown on its own random subsample of
//! the training set. Fitting also fixes the `offset` that separates inliers
//! from outliers: the `contamination` quantile of the training scores, so that
//! roughly that fraction of the training window would itself be labelled
//! anomalous.

use serde::{Deserialize, Serialize};

use crate::{
    percentile, score_from_path_length, AnomalyScore, IsolationTree, MLError, MLResult, Rng,
    Sample, TreeConfig, DEFAULT_CONTAMINATION, DEFAULT_NUM_TREES, DEFAULT_SAMPLE_SIZE,
    DEFAULT_SEED,
};

/// Configuration for Isolation Forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub num_trees: usize,
    /// Upper bound on the per-tree subsample
    pub max_samples: usize,
    /// Expected outlier fraction of the training set, in (0, 0.5]
    pub contamination: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: DEFAULT_NUM_TREES,
            max_samples: DEFAULT_SAMPLE_SIZE,
            contamination: DEFAULT_CONTAMINATION,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForestConfig {
    /// Reject parameters the forest cannot be grown with
    pub fn validate(&self) -> MLResult<()> {
        if self.num_trees == 0 {
            return Err(MLError::InvalidConfig("num_trees must be at least 1"));
        }
        if self.max_samples < 2 {
            return Err(MLError::InvalidConfig("max_samples must be at least 2"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(MLError::InvalidConfig("contamination must be in (0, 0.5]"));
        }
        Ok(())
    }
}

/// Isolation Forest for anomaly detection
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    config: ForestConfig,
    subsample_size: usize,
    num_samples: usize,
    offset: f64,
}

impl IsolationForest {
    /// Create an unfitted forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            trees: Vec::new(),
            config,
            subsample_size: 0,
            num_samples: 0,
            offset: 0.0,
        }
    }

    /// Grow the forest on `samples` and fix the decision offset
    ///
    /// On error the forest is left unfitted.
    pub fn fit(&mut self, samples: &[Sample]) -> MLResult<()> {
        self.config.validate()?;
        self.trees.clear();

        if samples.len() < 2 {
            return Err(MLError::InsufficientData);
        }
        if let Some(bad) = samples.iter().position(|s| !s.is_finite()) {
            return Err(MLError::DegenerateModel {
                reason: format!("training sample {bad} is not finite"),
            });
        }

        let subsample_size = self.config.max_samples.min(samples.len());
        let max_depth = (subsample_size as f64).log2().ceil() as usize;
        let mut rng = Rng::new(self.config.seed);

        let mut trees = Vec::with_capacity(self.config.num_trees);
        for _ in 0..self.config.num_trees {
            let subset = sample_subset(&mut rng, samples, subsample_size);
            let mut tree = IsolationTree::new(TreeConfig {
                max_depth,
                seed: rng.next_u64(),
            });
            tree.fit(&subset)?;
            trees.push(tree);
        }

        self.trees = trees;
        self.subsample_size = subsample_size;
        self.num_samples = samples.len();

        let training_scores: Vec<f64> = samples.iter().map(|s| self.score_samples(s)).collect();
        match percentile(&training_scores, self.config.contamination * 100.0) {
            Some(offset) => {
                self.offset = offset;
                Ok(())
            }
            None => {
                self.trees.clear();
                Err(MLError::DegenerateModel {
                    reason: "training scores are not finite".to_string(),
                })
            }
        }
    }

    /// Whether [`fit`](Self::fit) has succeeded
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Mean path length of `sample` across the trees
    pub fn average_path_length(&self, sample: &Sample) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }

        let total: f64 = self.trees.iter().map(|tree| tree.path_length(sample)).sum();
        total / self.trees.len() as f64
    }

    /// Raw score in `[-1, 0)`; lower is more anomalous
    pub fn score_samples(&self, sample: &Sample) -> f64 {
        score_from_path_length(self.average_path_length(sample), self.subsample_size)
    }

    /// `score_samples - offset`; negative means outlier
    pub fn decision_function(&self, sample: &Sample) -> f64 {
        self.score_samples(sample) - self.offset
    }

    /// Full score for one sample
    pub fn score(&self, sample: &Sample) -> AnomalyScore {
        let avg_path_length = self.average_path_length(sample);
        let score = score_from_path_length(avg_path_length, self.subsample_size);

        AnomalyScore {
            score,
            decision: score - self.offset,
            avg_path_length,
            num_trees: self.trees.len(),
        }
    }

    /// Outlier label for one sample
    pub fn is_anomaly(&self, sample: &Sample) -> bool {
        self.decision_function(sample) < 0.0
    }

    /// Score a batch
    pub fn predict(&self, samples: &[Sample]) -> Vec<AnomalyScore> {
        samples.iter().map(|sample| self.score(sample)).collect()
    }

    /// Decision threshold fixed at fit time
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Configuration in use
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Forest statistics
    pub fn stats(&self) -> ForestStats {
        ForestStats {
            num_trees: self.trees.len(),
            total_nodes: self.trees.iter().map(IsolationTree::node_count).sum(),
            max_depth: self.trees.iter().map(IsolationTree::depth).max().unwrap_or(0),
            num_samples: self.num_samples,
            subsample_size: self.subsample_size,
            offset: self.offset,
        }
    }
}

/// Draw `size` distinct samples (partial Fisher-Yates)
fn sample_subset(rng: &mut Rng, samples: &[Sample], size: usize) -> Vec<Sample> {
    if size >= samples.len() {
        return samples.to_vec();
    }

    let mut indices: Vec<usize> = (0..samples.len()).collect();
    for i in 0..size {
        let j = i + rng.next_range(samples.len() - i);
        indices.swap(i, j);
    }

    indices[..size].iter().map(|&i| samples[i]).collect()
}

/// Forest statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForestStats {
    /// Number of trees
    pub num_trees: usize,
    /// Total nodes across all trees
    pub total_nodes: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Number of training samples
    pub num_samples: usize,
    /// Per-tree subsample size
    pub subsample_size: usize,
    /// Decision offset
    pub offset: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data() -> Vec<Sample> {
        let mut samples = Vec::new();

        // Normal cluster on a small grid
        for i in 0..10 {
            for j in 0..4 {
                let temp = 20.0 + i as f64 * 0.2;
                let humidity = 50.0 + j as f64 * 0.5;
                samples.push(Sample::new(&[temp, humidity]).unwrap());
            }
        }

        // Anomalies
        samples.push(Sample::new(&[35.0, 90.0]).unwrap());
        samples.push(Sample::new(&[5.0, 20.0]).unwrap());

        samples
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            num_trees: 50,
            seed: 123,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn forest_creation() {
        let forest = IsolationForest::new(small_config());
        assert!(!forest.is_fitted());
        assert_eq!(forest.stats().num_trees, 0);
    }

    #[test]
    fn forest_fit() {
        let mut forest = IsolationForest::new(small_config());
        let samples = create_test_data();
        forest.fit(&samples).unwrap();

        let stats = forest.stats();
        assert_eq!(stats.num_trees, 50);
        assert_eq!(stats.num_samples, samples.len());
        assert_eq!(stats.subsample_size, samples.len());
        // ceil(log2(42)) = 6
        assert!(stats.max_depth <= 6);
        assert!(stats.total_nodes > 50);
    }

    #[test]
    fn separates_outliers_from_cluster() {
        let mut forest = IsolationForest::new(small_config());
        forest.fit(&create_test_data()).unwrap();

        let center = Sample::new(&[21.0, 51.0]).unwrap();
        let far = Sample::new(&[35.0, 90.0]).unwrap();

        assert!(forest.score_samples(&far) < forest.score_samples(&center));
        assert!(forest.is_anomaly(&far));
        assert!(!forest.is_anomaly(&center));
        assert!(forest.score(&far).is_outlier());
    }

    #[test]
    fn offset_is_contamination_quantile() {
        let mut forest = IsolationForest::new(small_config());
        let samples = create_test_data();
        forest.fit(&samples).unwrap();

        let scores: Vec<f64> = samples.iter().map(|s| forest.score_samples(s)).collect();
        assert_eq!(Some(forest.offset()), percentile(&scores, 10.0));

        // At most the contamination share of the training set is labelled outlier
        let outliers = samples.iter().filter(|s| forest.is_anomaly(s)).count();
        assert!(outliers <= samples.len() / 10 + 1);
        assert!(outliers >= 2);
    }

    #[test]
    fn same_seed_same_forest() {
        let samples = create_test_data();
        let probe = Sample::new(&[23.0, 49.0]).unwrap();

        let mut a = IsolationForest::new(small_config());
        let mut b = IsolationForest::new(small_config());
        a.fit(&samples).unwrap();
        b.fit(&samples).unwrap();

        assert_eq!(a.score(&probe), b.score(&probe));
        assert_eq!(a.offset(), b.offset());
    }

    #[test]
    fn subsample_is_capped() {
        let samples: Vec<Sample> = (0..300)
            .map(|i| Sample::new(&[i as f64, (i % 7) as f64]).unwrap())
            .collect();

        let mut forest = IsolationForest::new(ForestConfig {
            num_trees: 5,
            ..ForestConfig::default()
        });
        forest.fit(&samples).unwrap();

        assert_eq!(forest.stats().subsample_size, DEFAULT_SAMPLE_SIZE);
        assert!(forest.stats().max_depth <= 8);
    }

    #[test]
    fn constant_training_set_labels_nothing() {
        let samples = vec![Sample::new(&[1.0, 1.0, 1.0]).unwrap(); 20];
        let mut forest = IsolationForest::new(small_config());
        forest.fit(&samples).unwrap();

        // Every tree is a single leaf, every score is -0.5, offset too
        assert!((forest.offset() + 0.5).abs() < 1e-12);
        assert!(!forest.is_anomaly(&samples[0]));
    }

    #[test]
    fn non_finite_training_data_is_degenerate() {
        let mut samples = create_test_data();
        samples[3] = Sample::new(&[f64::NAN, 50.0]).unwrap();

        let mut forest = IsolationForest::new(small_config());
        assert!(matches!(
            forest.fit(&samples),
            Err(MLError::DegenerateModel { .. })
        ));
        assert!(!forest.is_fitted());
    }

    #[test]
    fn config_validation() {
        assert!(ForestConfig::default().validate().is_ok());

        for bad in [
            ForestConfig { num_trees: 0, ..ForestConfig::default() },
            ForestConfig { max_samples: 1, ..ForestConfig::default() },
            ForestConfig { contamination: 0.0, ..ForestConfig::default() },
            ForestConfig { contamination: 0.6, ..ForestConfig::default() },
        ] {
            assert!(matches!(bad.validate(), Err(MLError::InvalidConfig(_))));
        }
    }

    #[test]
    fn too_few_samples() {
        let mut forest = IsolationForest::new(small_config());
        let one = [Sample::new(&[1.0]).unwrap()];
        assert_eq!(forest.fit(&one), Err(MLError::InsufficientData));
    }
}
