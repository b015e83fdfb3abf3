//! Shared fixtures for the integration tests
//!
//! - a deterministic reading generator for calm and fire-like scenarios
//! - a small threshold scorer standing in for the isolation forest

#![allow(dead_code)]

use firewatch_core::{
    AnomalyScorer, ChannelSample, RawReading, Timestamp, Verdict, WindowStatistics,
};

/// Deterministic generator of device readings
pub struct ReadingGenerator {
    seed: u32,
    clock: Timestamp,
    interval_ms: u64,
}

impl ReadingGenerator {
    /// Generator starting at `start` with a 2 s sampling interval
    pub fn new(start: Timestamp) -> Self {
        Self {
            seed: 42,
            clock: start,
            interval_ms: 2_000,
        }
    }

    /// Current clock value
    pub fn now(&self) -> Timestamp {
        self.clock
    }

    /// Advance the clock without producing a reading
    pub fn skip(&mut self, ms: u64) {
        self.clock += ms;
    }

    /// Indoor room at rest: ~22 °C, ~50 %, ~100 ppm, nothing in range
    pub fn calm(&mut self) -> RawReading {
        let reading = RawReading::new(self.clock)
            .with_temperature(22.0 + self.noise(0.4))
            .with_humidity(50.0 + self.noise(1.5))
            .with_gas(100.0 + self.noise(4.0))
            .with_proximity(0.0);
        self.clock += self.interval_ms;
        reading
    }

    /// Fire developing next to the sensor
    pub fn fire(&mut self) -> RawReading {
        let reading = RawReading::new(self.clock)
            .with_temperature(55.0 + self.noise(1.0))
            .with_humidity(12.0 + self.noise(1.0))
            .with_gas(420.0 + self.noise(10.0))
            .with_proximity(0.0);
        self.clock += self.interval_ms;
        reading
    }

    /// Uniform noise in `[-amplitude, amplitude]`
    fn noise(&mut self, amplitude: f64) -> f64 {
        // Simple LCG
        self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let unit = (self.seed >> 16) as f64 / 65_535.0;
        (unit * 2.0 - 1.0) * amplitude
    }
}

/// Trains after `min_samples`, flags temperatures above `limit`
pub struct ThresholdScorer {
    samples: Vec<ChannelSample>,
    min_samples: usize,
    limit: f64,
}

impl ThresholdScorer {
    pub fn new(min_samples: usize, limit: f64) -> Self {
        Self {
            samples: Vec::new(),
            min_samples,
            limit,
        }
    }
}

impl AnomalyScorer for ThresholdScorer {
    fn add_sample(&mut self, sample: ChannelSample) {
        self.samples.push(sample);
    }

    fn predict(&self, sample: ChannelSample) -> Verdict {
        if !self.is_trained() {
            return Verdict::training(self.samples.len(), self.min_samples);
        }
        let outlier = sample.temperature > self.limit;
        Verdict::scored(if outlier { -0.15 } else { 0.05 }, outlier)
    }

    fn statistics(&self) -> Option<WindowStatistics> {
        WindowStatistics::compute(&self.samples)
    }

    fn is_trained(&self) -> bool {
        self.samples.len() >= self.min_samples
    }
}
