//! Signal Filtering and Risk Scoring Example
//!
//! This example feeds a short recorded sequence through the signal filter
//! and the rule-based risk evaluator, without any anomaly detector.
//!
//! ## What You'll Learn
//!
//! - How the slow channels are smoothed over a 3-sample window
//! - How out-of-range ultrasonic echoes are replaced by the last valid distance
//! - How the additive risk score maps to NORMAL / WARNING / CRITICAL
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_signal_filter
//! ```

use firewatch_core::{RiskEvaluator, SignalFilter, Verdict};

fn main() {
    println!("Firewatch Signal Filter Example");
    println!("===============================\n");

    let mut filter = SignalFilter::default();
    let evaluator = RiskEvaluator::default();

    // (temp °C, humidity %, gas ppm, distance cm)
    // Tick 3 has a spurious 840 cm echo, tick 5 has a person walking up.
    let recording = [
        (24.0, 48.0, 110.0, Some(180.0)),
        (24.4, 47.0, 115.0, Some(178.0)),
        (25.1, 46.5, 118.0, Some(840.0)),
        (31.0, 38.0, 170.0, Some(175.0)),
        (38.5, 31.0, 240.0, Some(8.0)),
        (47.0, 18.0, 330.0, None),
    ];

    // No detector here; every verdict is "still training"
    let verdict = Verdict::training(0, 20);

    println!(
        "{:>4}  {:>7} {:>7} {:>7} {:>8}  {:>5}  {:<9} factors",
        "tick", "temp", "hum", "gas", "dist", "score", "level"
    );
    for (tick, &(temp, hum, gas, dist)) in recording.iter().enumerate() {
        let filtered = filter.process(Some(temp), Some(hum), Some(gas), dist, tick as u64 * 2_000);
        let sample = filtered.sample();

        let risk = evaluator.evaluate(
            sample.temperature,
            sample.gas,
            sample.humidity,
            filtered.proximity,
            &verdict,
        );

        println!(
            "{:>4}  {:>7.1} {:>7.1} {:>7.1} {:>8.1}  {:>5}  {:<9} {}",
            tick,
            sample.temperature,
            sample.humidity,
            sample.gas,
            filtered.proximity,
            risk.score,
            risk.level.to_string(),
            risk.factor_labels().join(", ")
        );
        println!("      proximity: {:?}", filtered.proximity_source);
        println!("      {}", risk.message);
    }

    let status = filter.status();
    println!("\nFilter state after the run:");
    println!("  window size:          {}", status.window_size);
    println!("  last valid proximity: {} cm", status.last_valid_proximity);
}
