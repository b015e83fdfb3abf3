//! Isolation-Forest Anomaly Detection for Fire Monitoring
//!
//! ## Overview
//!
//! A fire does not only push single channels past fixed thresholds. It also
//! produces *combinations* the room has never shown before: warm air that is
//! suddenly dry, or gas rising while the temperature is still ordinary. This
//! crate learns what "ordinary" looks like for one device and flags samples
//! that do not fit.
//!
//! ## Why Isolation Forest?
//!
//! 1. **Unsupervised**: no labelled fire data needed
//! 2. **Small baselines**: works from a few dozen samples
//! 3. **Cheap inference**: one root-to-leaf walk per tree
//!
//! ## How It Works
//!
//! Points are isolated by random axis-aligned cuts. Outliers need few cuts:
//!
//! ```text
//! Normal points: need many partitions to isolate
//! Anomalies:     isolated with few partitions
//!
//! s(x)     = -2^(-E[h(x)] / c(ψ))        ψ = per-tree subsample size
//! offset   = contamination-quantile of s over the training window
//! decision = s(x) - offset               outlier iff decision < 0
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! add_sample ×(min_samples - 1)  →  TRAINING
//! add_sample #min_samples        →  fit scaler + forest once, frozen forever
//! predict                        →  NORMAL / ALERT with a decision score
//! ```
//!
//! The window keeps filling after training so statistics stay current, but
//! the model never changes. See [`AnomalyDetector`].
//!
//! ## Usage
//!
//! ```rust
//! use firewatch_core::{AnomalyScorer, ChannelSample, DetectorStatus};
//! use firewatch_ml::AnomalyDetector;
//!
//! let mut detector = AnomalyDetector::default();
//! for i in 0..20 {
//!     let (t, h, g) = ((i % 7) as f64, (i % 5) as f64, (i % 3) as f64);
//!     detector.add_sample(ChannelSample::new(22.0 + 0.2 * t, 50.0 + 0.5 * h, 100.0 + 2.0 * g));
//! }
//! assert!(detector.is_trained());
//!
//! let verdict = detector.predict(ChannelSample::new(68.0, 9.0, 480.0));
//! assert_eq!(verdict.status, DetectorStatus::Alert);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use thiserror::Error;

pub mod detector;
pub mod forest;
pub mod node;
pub mod pipeline;
pub mod scaler;
pub mod scoring;
pub mod tree;

pub use detector::{AnomalyDetector, DetectorConfig};
pub use forest::{ForestConfig, ForestStats, IsolationForest};
pub use node::{Node, NodeType};
pub use pipeline::{FireMonitor, MonitorConfig};
pub use scaler::{ChannelScaler, StandardScaler};
pub use scoring::{percentile, score_from_path_length, AnomalyScore};
pub use tree::{IsolationTree, TreeConfig};

/// Maximum features per sample
pub const MAX_FEATURES: usize = 8;

/// Features used by the fire detector: temperature, humidity, gas
pub const NUM_CHANNELS: usize = 3;

/// Default per-tree subsample size
pub const DEFAULT_SAMPLE_SIZE: usize = 256;

/// Default number of trees
pub const DEFAULT_NUM_TREES: usize = 100;

/// Default expected outlier fraction of the training window
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Default random seed
pub const DEFAULT_SEED: u64 = 42;

/// Euler–Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// ML errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MLError {
    /// Not enough samples to fit
    #[error("Insufficient data for training")]
    InsufficientData,

    /// Feature index out of range or feature count mismatch
    #[error("Invalid feature index or count")]
    InvalidFeature,

    /// Fit produced non-finite parameters
    #[error("Degenerate model: {reason}")]
    DegenerateModel {
        /// What went wrong
        reason: String,
    },

    /// Parameter combination the model cannot run with
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result type for ML operations
pub type MLResult<T> = Result<T, MLError>;

/// Feature vector with a fixed maximum width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Feature values; only the first `num_features` are meaningful
    pub features: [f64; MAX_FEATURES],
    /// Number of features
    pub num_features: usize,
}

impl Sample {
    /// Create a sample from a slice of at most [`MAX_FEATURES`] values
    pub fn new(values: &[f64]) -> MLResult<Self> {
        if values.is_empty() || values.len() > MAX_FEATURES {
            return Err(MLError::InvalidFeature);
        }

        let mut features = [0.0; MAX_FEATURES];
        features[..values.len()].copy_from_slice(values);

        Ok(Self {
            features,
            num_features: values.len(),
        })
    }

    /// Feature value by index
    pub fn get_feature(&self, index: usize) -> Option<f64> {
        if index < self.num_features {
            Some(self.features[index])
        } else {
            None
        }
    }

    /// The meaningful features
    pub fn as_slice(&self) -> &[f64] {
        &self.features[..self.num_features]
    }

    /// True when every feature is finite
    pub fn is_finite(&self) -> bool {
        self.as_slice().iter().all(|v| v.is_finite())
    }
}

impl From<firewatch_core::ChannelSample> for Sample {
    fn from(sample: firewatch_core::ChannelSample) -> Self {
        let mut features = [0.0; MAX_FEATURES];
        features[..NUM_CHANNELS].copy_from_slice(&sample.to_array());
        Self {
            features,
            num_features: NUM_CHANNELS,
        }
    }
}

/// Small deterministic generator (xorshift64*, splitmix64-seeded)
///
/// The same seed always grows the same forest.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Seeded generator
    pub fn new(seed: u64) -> Self {
        // splitmix64 scramble; xorshift state must be non-zero
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;

        Self {
            state: if z == 0 { 0x2545_F491_4F6C_DD1D } else { z },
        }
    }

    /// Next raw value
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform in `0..n`; `n` must be non-zero
    pub fn next_range(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n.max(1)
    }

    /// Uniform in `[low, high)`
    pub fn next_f64_range(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }
}

/// Average path length of an unsuccessful binary-search-tree lookup, `c(n)`
///
/// Normalizes isolation depths: `c(n) = 2·H(n-1) - 2(n-1)/n`, with `H(i)`
/// approximated as `ln(i) + γ`. `c(2) = 1` and `c(n) = 0` for `n ≤ 1`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
