//! End-to-end tests for the conditioning pipeline

use livescribe_config::{EchoStrategy, PipelineConfig};
use livescribe_pipeline::AudioPipeline;

/// 100 ms of 440 Hz tone at 16 kHz
fn synthetic_frame() -> Vec<f32> {
    (0..1600)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin() * 0.4)
        .collect()
}

#[test]
fn full_pipeline_preserves_frame_shape() {
    let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
    let input = synthetic_frame();

    let out = pipeline.process(&input, None);
    assert_eq!(out.samples.len(), 1600);
    assert!(out.degradations.is_empty());
    for &s in &out.samples {
        assert!((-1.0..=1.0).contains(&s), "sample {} out of range", s);
    }
}

#[test]
fn full_pipeline_with_reference_preserves_frame_shape() {
    let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
    let input = synthetic_frame();
    // Reference longer than the 1024-tap filter engages the LMS path.
    let reference: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.01).cos() * 0.2).collect();

    let out = pipeline.process(&input, Some(&reference));
    assert_eq!(out.samples.len(), 1600);
    for &s in &out.samples {
        assert!((-1.0..=1.0).contains(&s));
    }
    assert_eq!(pipeline.stats().echo.adaptations, 1);
}

#[test]
fn empty_frame_passes_through_without_error() {
    let mut pipeline = AudioPipeline::new(&PipelineConfig::default());
    let out = pipeline.process(&[], None);
    assert!(out.samples.is_empty());
    assert!(out.degradations.is_empty());
}

#[test]
fn suppressor_strategy_runs_without_reference() {
    let mut config = PipelineConfig::default();
    config.echo.strategy = EchoStrategy::Suppressor;
    config.echo.filter_taps = 512;
    let mut pipeline = AudioPipeline::new(&config);

    let out = pipeline.process(&synthetic_frame(), None);
    assert_eq!(out.samples.len(), 1600);
    assert_eq!(pipeline.stats().echo.strategy, "suppressor");
}

#[test]
fn sequential_chunks_keep_filter_state() {
    let mut pipeline = AudioPipeline::new(&PipelineConfig::default());

    // Several consecutive chunks from the same session must process cleanly
    // and keep accumulating the lookback buffer.
    for _ in 0..10 {
        let out = pipeline.process(&synthetic_frame(), None);
        assert_eq!(out.samples.len(), 1600);
    }
    let stats = pipeline.stats();
    assert!(stats.lookback_seconds >= 0.99);
}

#[test]
fn stats_snapshot_serializes() {
    let pipeline = AudioPipeline::new(&PipelineConfig::default());
    let json = serde_json::to_string(&pipeline.stats()).unwrap();
    assert!(json.contains("\"echo_enabled\":true"));
    assert!(json.contains("\"filter_taps\":1024"));
}
