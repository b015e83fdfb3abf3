//! Integration tests for the telemetry pipeline
//!
//! Drives whole scenarios through decode → filter → detector → risk and
//! checks what a display polling the pipeline would see.

mod common;

use firewatch_core::{
    DetectorStatus, LinkStatus, PipelineConfig, PipelineView, ProximitySource, RiskFactor,
    RiskLevel, TelemetryPipeline,
};

use common::{ReadingGenerator, ThresholdScorer};

fn pipeline() -> TelemetryPipeline<ThresholdScorer> {
    TelemetryPipeline::new(PipelineConfig::default(), ThresholdScorer::new(20, 40.0))
}

#[test]
fn calm_room_stays_normal() {
    let mut pipeline = pipeline();
    let mut gen = ReadingGenerator::new(0);

    for _ in 0..60 {
        let bundle = pipeline.on_reading(gen.calm()).unwrap();
        assert_eq!(bundle.risk.level, RiskLevel::Normal);
        assert!(!bundle.verdict.is_anomalous);
    }

    let latest = pipeline.latest().unwrap();
    assert_eq!(latest.verdict.status, DetectorStatus::Normal);
    assert_eq!(pipeline.stats().processed, 60);
}

#[test]
fn fire_escalates_through_smoothing() {
    let mut pipeline = pipeline();
    let mut gen = ReadingGenerator::new(0);

    for _ in 0..30 {
        pipeline.on_reading(gen.calm()).unwrap();
    }

    // The 3-sample window delays the escalation by a tick or two
    let levels: Vec<RiskLevel> = (0..4)
        .map(|_| pipeline.on_reading(gen.fire()).unwrap().risk.level)
        .collect();

    assert_ne!(levels[0], RiskLevel::Critical);
    assert_eq!(levels[3], RiskLevel::Critical);

    let latest = pipeline.latest().unwrap();
    assert!(latest.risk.contributing_factors.contains(&RiskFactor::CriticalTemperature));
    assert!(latest.risk.contributing_factors.contains(&RiskFactor::DangerousGas));
    assert!(latest.risk.contributing_factors.contains(&RiskFactor::AnomalyDetected));
    assert_eq!(latest.risk.message, "FIRE ALERT!");
}

#[test]
fn wire_payloads_end_to_end() {
    let mut pipeline = pipeline();

    let payloads: [&[u8]; 4] = [
        br#"{"temp": 23.0, "hum": 45.0, "gas": 120, "distancia": 150, "hardware": {"fw": "1.2"}}"#,
        br#"{"temp": 23.4, "hum": 44.0, "gas": 118, "distancia": 900}"#,
        br#"{"temp": 23.2, "hum": null, "gas": 121, "distancia": 6}"#,
        br#"{"temp": "n/a"}"#,
    ];

    let first = pipeline.ingest(payloads[0], 1_000).unwrap();
    assert_eq!(first.metadata.hardware().and_then(|h| h.get("fw")), Some(&"1.2".into()));

    let second = pipeline.ingest(payloads[1], 3_000).unwrap();
    assert_eq!(second.filtered.proximity, 150.0);
    assert_eq!(
        second.filtered.proximity_source,
        ProximitySource::HeldAfterArtifact { rejected: 900.0 }
    );

    let third = pipeline.ingest(payloads[2], 5_000).unwrap();
    assert_eq!(third.filtered.humidity, None);
    assert!(third.risk.movement_detected());
    assert!(third.risk.message.ends_with("| MOVEMENT DETECTED"));

    assert!(pipeline.ingest(payloads[3], 7_000).is_err());

    let stats = pipeline.stats();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.proximity_artifacts, 1);

    // Rejected payload does not refresh the link
    assert_eq!(pipeline.link_status(7_000), LinkStatus::Online { age_ms: 2_000 });
}

#[test]
fn display_sees_device_go_offline_and_recover() {
    let config = PipelineConfig {
        offline_timeout_ms: 5_000,
        ..PipelineConfig::default()
    };
    let mut pipeline = TelemetryPipeline::new(config, ThresholdScorer::new(20, 40.0));
    let mut gen = ReadingGenerator::new(10_000);

    assert_eq!(pipeline.poll(gen.now()), PipelineView::Waiting);

    pipeline.on_reading(gen.calm()).unwrap();
    assert!(matches!(pipeline.poll(gen.now()), PipelineView::Online { .. }));

    gen.skip(8_000);
    match pipeline.poll(gen.now()) {
        PipelineView::Offline { silent_for_ms, last } => {
            assert_eq!(silent_for_ms, 10_000);
            assert_eq!(last.filtered.timestamp, 10_000);
        }
        other => panic!("expected offline, got {other:?}"),
    }

    let reading = gen.calm();
    let received_at = reading.timestamp;
    pipeline.on_reading(reading).unwrap();
    assert!(matches!(
        pipeline.poll(received_at),
        PipelineView::Online { age_ms: 0, .. }
    ));
}

#[test]
fn history_and_detector_window_agree() {
    let mut pipeline = pipeline();
    let mut gen = ReadingGenerator::new(0);

    for _ in 0..25 {
        pipeline.on_reading(gen.calm()).unwrap();
    }

    let history: Vec<_> = pipeline.history().collect();
    assert_eq!(history.len(), 25);

    let mean_temp = history.iter().map(|p| p.temperature).sum::<f64>() / history.len() as f64;
    let stats = pipeline.detector_statistics().unwrap();
    assert_eq!(stats.sample_count, 25);
    assert!((stats.temperature.mean - mean_temp).abs() < 1e-9);
}
