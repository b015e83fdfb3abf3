//! Per-feature standardization
//!
//! Temperature (tens of °C), humidity (tens of %) and gas (hundreds of ppm)
//! live on very different scales. The forest cuts uniformly inside each
//! feature's range, so features are centred and scaled to unit variance
//! before fitting and before every prediction.

use firewatch_core::ChannelSample;

use crate::{MLError, MLResult, Sample, MAX_FEATURES};

/// Zero-mean, unit-variance scaler fitted once on a training set
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: [f64; MAX_FEATURES],
    scale: [f64; MAX_FEATURES],
    num_features: usize,
}

impl StandardScaler {
    /// Fit mean and population standard deviation per feature
    ///
    /// A feature with zero variance gets a scale of 1, so it maps to 0 rather
    /// than dividing by zero. Non-finite statistics are rejected as degenerate.
    pub fn fit(samples: &[Sample]) -> MLResult<Self> {
        let Some(first) = samples.first() else {
            return Err(MLError::InsufficientData);
        };
        let num_features = first.num_features;
        if samples.iter().any(|s| s.num_features != num_features) {
            return Err(MLError::InvalidFeature);
        }

        let n = samples.len() as f64;
        let mut mean = [0.0; MAX_FEATURES];
        let mut scale = [1.0; MAX_FEATURES];

        for feature in 0..num_features {
            let mu = samples.iter().map(|s| s.features[feature]).sum::<f64>() / n;
            let variance = samples
                .iter()
                .map(|s| (s.features[feature] - mu).powi(2))
                .sum::<f64>()
                / n;
            let std_dev = variance.sqrt();

            if !mu.is_finite() || !std_dev.is_finite() {
                return Err(MLError::DegenerateModel {
                    reason: format!("feature {feature} has non-finite statistics"),
                });
            }

            mean[feature] = mu;
            if std_dev > 0.0 {
                scale[feature] = std_dev;
            }
        }

        Ok(Self {
            mean,
            scale,
            num_features,
        })
    }

    /// Standardize one sample
    pub fn transform(&self, sample: &Sample) -> MLResult<Sample> {
        if sample.num_features != self.num_features {
            return Err(MLError::InvalidFeature);
        }

        Ok(self.apply(sample))
    }

    /// Standardize without the width check; caller guarantees matching widths
    fn apply(&self, sample: &Sample) -> Sample {
        let mut scaled = *sample;
        for feature in 0..self.num_features {
            scaled.features[feature] = (sample.features[feature] - self.mean[feature]) / self.scale[feature];
        }
        scaled
    }

    /// Standardize a batch
    pub fn transform_all(&self, samples: &[Sample]) -> MLResult<Vec<Sample>> {
        samples.iter().map(|s| self.transform(s)).collect()
    }

    /// Fitted means
    pub fn mean(&self) -> &[f64] {
        &self.mean[..self.num_features]
    }

    /// Fitted scales (standard deviations, 1 for constant features)
    pub fn scale(&self) -> &[f64] {
        &self.scale[..self.num_features]
    }
}

/// Scaler fitted on channel triples
///
/// Fit and transform inputs both come from [`ChannelSample`], so widths always
/// match and transforming cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelScaler {
    inner: StandardScaler,
}

impl ChannelScaler {
    /// Fit on a window of channel samples
    pub fn fit<'a>(samples: impl IntoIterator<Item = &'a ChannelSample>) -> MLResult<Self> {
        let samples: Vec<Sample> = samples.into_iter().map(|&s| Sample::from(s)).collect();
        Ok(Self {
            inner: StandardScaler::fit(&samples)?,
        })
    }

    /// Standardize one channel sample
    pub fn transform(&self, sample: ChannelSample) -> Sample {
        self.inner.apply(&Sample::from(sample))
    }

    /// The underlying per-feature scaler
    pub fn scaler(&self) -> &StandardScaler {
        &self.inner
    }
}
