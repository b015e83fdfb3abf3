//! Fire Monitor with Isolation-Forest Anomaly Detection
//!
//! This example runs a complete fire monitor over a simulated recording:
//! a calm room while the detector learns its baseline, then a fire starting
//! next to the sensor.
//!
//! ## What You'll Learn
//!
//! - How the detector reports TRAINING until it has seen 20 samples
//! - How the verdict feeds the rule-based risk score
//! - How a display polls the monitor and notices the device going silent
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 11_ml_anomaly_detection
//! ```

use firewatch_core::{PipelineView, RawReading};
use firewatch_ml::MonitorConfig;

fn main() {
    println!("Firewatch Anomaly Detection Example");
    println!("===================================\n");

    let mut monitor = MonitorConfig::default().build();
    let mut clock = 0u64;

    // Deterministic wobble so the baseline is not a single point
    let calm = |i: u64| {
        RawReading::new(i * 2_000)
            .with_temperature(22.0 + (i % 7) as f64 * 0.15)
            .with_humidity(48.0 + (i % 5) as f64 * 0.6)
            .with_gas(105.0 + (i % 3) as f64 * 3.0)
            .with_proximity(180.0)
    };

    println!("Phase 1: learning the room");
    for i in 0..30 {
        let bundle = match monitor.on_reading(calm(i)) {
            Ok(bundle) => bundle,
            Err(e) => {
                println!("  rejected: {e}");
                continue;
            }
        };
        clock = i * 2_000;

        if i % 5 == 4 {
            println!(
                "  t={:>6}ms  detector={:<9} {:<28} risk={} ({})",
                clock,
                format!("{:?}", bundle.verdict.status),
                bundle.verdict.message,
                bundle.risk.level,
                bundle.risk.score
            );
        }
    }

    if let Some(stats) = monitor.detector_statistics() {
        println!("\nWindow statistics ({} samples):", stats.sample_count);
        println!("  temperature {:.1} ± {:.2}", stats.temperature.mean, stats.temperature.std_dev);
        println!("  humidity    {:.1} ± {:.2}", stats.humidity.mean, stats.humidity.std_dev);
        println!("  gas         {:.1} ± {:.2}", stats.gas.mean, stats.gas.std_dev);
    }

    println!("\nPhase 2: fire next to the sensor");
    let fire = [(31.0, 40.0, 180.0), (39.0, 30.0, 260.0), (52.0, 18.0, 380.0), (61.0, 12.0, 460.0)];
    for (temp, hum, gas) in fire {
        clock += 2_000;
        let reading = RawReading::new(clock)
            .with_temperature(temp)
            .with_humidity(hum)
            .with_gas(gas)
            .with_proximity(6.0);

        match monitor.on_reading(reading) {
            Ok(bundle) => println!(
                "  t={:>6}ms  anomaly={:<5} confidence={:>3}%  risk={:<8} score={:>3}  {}",
                clock,
                bundle.verdict.is_anomalous,
                bundle.verdict.confidence,
                bundle.risk.level.to_string(),
                bundle.risk.score,
                bundle.risk.message
            ),
            Err(e) => println!("  rejected: {e}"),
        }
    }

    println!("\nPhase 3: device goes silent");
    for wait in [5_000u64, 12_000] {
        match monitor.poll(clock + wait) {
            PipelineView::Waiting => println!("  +{wait}ms: waiting for data"),
            PipelineView::Online { age_ms, bundle } => {
                println!("  +{wait}ms: online, last reading {age_ms}ms old ({})", bundle.risk.level)
            }
            PipelineView::Offline { silent_for_ms, last } => println!(
                "  +{wait}ms: OFFLINE for {silent_for_ms}ms, last level was {}",
                last.risk.level
            ),
        }
    }

    let stats = monitor.stats();
    println!(
        "\nProcessed {} readings, rejected {}, proximity artifacts {}",
        stats.processed, stats.rejected, stats.proximity_artifacts
    );
}
