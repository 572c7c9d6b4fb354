//! End-to-end engine tests: dependency evaluation, memoization,
//! incremental catch-up, invalidation propagation and memory pressure.

use std::sync::{Arc, Mutex};

use vega_engine::{EngineError, EngineEvent, EvalMode, IndicatorEngine};
use vega_indicators::{Indicator, IndicatorError, IndicatorParams, IndicatorRegistry};
use vega_memory::PressureLevel;
use vega_types::{DataWindow, EngineConfig, InvalidationStrategy, MemoryConfig, Sample};

fn window(values: &[f64]) -> DataWindow {
    DataWindow::from_values(0, 10, values).unwrap()
}

fn default_engine() -> IndicatorEngine {
    IndicatorEngine::new(EngineConfig::default()).unwrap()
}

fn capture_events(engine: &IndicatorEngine) -> Arc<Mutex<Vec<EngineEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    engine.subscribe(Box::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

#[test]
fn test_cold_then_warm_evaluation_with_dependencies() {
    let engine = default_engine();
    engine
        .register_indicator("sma5", "SMA", &IndicatorParams::Period(5), &[])
        .unwrap();
    engine
        .register_indicator(
            "cross",
            "SMA_CROSS",
            &IndicatorParams::Crossover { fast: 2, slow: 5 },
            &["sma5".to_string()],
        )
        .unwrap();

    let w = window(&[10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0]);
    let cold = engine.evaluate("cross", &w).unwrap();
    assert_eq!(cold.value.len(), 7);
    assert_eq!(cold.mode, EvalMode::Full);
    assert!(!cold.from_cache);
    assert_eq!(cold.dependencies, vec!["sma5".to_string()]);

    // Evaluating the dependent evaluated the dependency too.
    let m = engine.metrics();
    assert_eq!(m.nodes["sma5"].full_evals, 1);
    assert_eq!(m.nodes["cross"].full_evals, 1);

    // Warm repeat: both nodes served from cache, payloads identical.
    let warm = engine.evaluate("cross", &w).unwrap();
    assert!(Arc::ptr_eq(&cold.value, &warm.value));
    assert!(warm.from_cache);
    let m = engine.metrics();
    assert_eq!(m.nodes["sma5"].cache_hits, 1);
    assert_eq!(m.nodes["cross"].cache_hits, 1);
    assert!(m.cache_hits >= 2);
}

#[test]
fn test_changed_interior_value_recomputes() {
    let engine = default_engine();
    engine
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();

    let a = engine
        .evaluate("sma3", &window(&[1.0, 2.0, 3.0, 4.0, 5.0]))
        .unwrap();
    // Same shape, one interior value rewritten: must not be served stale.
    let b = engine
        .evaluate("sma3", &window(&[1.0, 9.0, 3.0, 4.0, 5.0]))
        .unwrap();

    assert!(!Arc::ptr_eq(&a.value, &b.value));
    assert_ne!(a.value.points()[2], b.value.points()[2]);
    assert_eq!(engine.metrics().nodes["sma3"].cache_hits, 0);
}

#[test]
fn test_incremental_matches_full_recompute() {
    let engine = default_engine();
    engine
        .register_indicator("sma5", "SMA", &IndicatorParams::Period(5), &[])
        .unwrap();

    let seed = [10.0, 12.0, 11.0, 13.0, 15.0];
    engine.evaluate("sma5", &window(&seed)).unwrap();

    // One appended sample: continued incrementally from retained state.
    let extended = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0];
    let incremental = engine.evaluate("sma5", &window(&extended)).unwrap();
    assert_eq!(incremental.mode, EvalMode::Incremental { new_samples: 1 });
    assert_eq!(engine.metrics().nodes["sma5"].incremental_evals, 1);

    // Reference: a fresh engine recomputes the extended window fully.
    let reference = default_engine();
    reference
        .register_indicator("sma5", "SMA", &IndicatorParams::Period(5), &[])
        .unwrap();
    let full = reference.evaluate("sma5", &window(&extended)).unwrap();

    let inc_last = incremental.value.last().unwrap();
    let full_last = full.value.last().unwrap();
    assert!((inc_last - full_last).abs() < 1e-9);
    assert!((inc_last - 13.0).abs() < 1e-12); // mean of [12,11,13,15,14]
}

#[test]
fn test_incremental_append_equals_fresh_tail_mean() {
    let engine = default_engine();
    engine
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();

    engine
        .evaluate("sma3", &window(&[10.0, 12.0, 11.0, 13.0, 15.0]))
        .unwrap();
    let outcome = engine.process_incremental_all(Sample::new(50, 14.0));

    // Mean of the trailing [13, 15, 14].
    let point = outcome.results["sma3"].value.last().unwrap();
    assert!((point - 14.0).abs() < 1e-12);
}

#[test]
fn test_gap_in_window_falls_back_to_full() {
    let engine = default_engine();
    engine
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();

    engine
        .evaluate("sma3", &window(&[1.0, 2.0, 3.0, 4.0]))
        .unwrap();
    // Disjoint window far in the future: no continuity with retained state.
    let later = DataWindow::from_values(10_000, 10, &[5.0, 6.0, 7.0]).unwrap();
    let out = engine.evaluate("sma3", &later).unwrap();
    assert_eq!(out.mode, EvalMode::Full);

    let m = engine.metrics();
    assert_eq!(m.nodes["sma3"].full_evals, 2);
    assert_eq!(m.nodes["sma3"].incremental_evals, 0);
}

#[test]
fn test_process_incremental_streams_and_rejects_out_of_order() {
    let engine = default_engine();
    engine
        .register_indicator("sma5", "SMA", &IndicatorParams::Period(5), &[])
        .unwrap();

    // Seed state with a full evaluation over timestamps 0..40.
    engine
        .evaluate("sma5", &window(&[10.0, 12.0, 11.0, 13.0, 15.0]))
        .unwrap();

    let outcome = engine.process_incremental_all(Sample::new(50, 14.0));
    assert!(outcome.failures.is_empty());
    let envelope = &outcome.results["sma5"];
    assert!((envelope.value.last().unwrap() - 13.0).abs() < 1e-12);
    assert!(!envelope.from_cache);
    assert_eq!(envelope.mode, EvalMode::Incremental { new_samples: 1 });

    // Not newer than the processed position: rejected, state invalidated.
    let outcome = engine.process_incremental_all(Sample::new(50, 9.0));
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(
        outcome.failures[0].1,
        EngineError::OutOfOrderSample { timestamp_ns: 50, .. }
    ));

    // Invalidated state no longer advances until reseeded.
    let outcome = engine.process_incremental_all(Sample::new(60, 15.0));
    assert!(outcome.results.is_empty());
    assert!(outcome.failures.is_empty());
}

#[test]
fn test_process_incremental_scoped_to_requested_ids() {
    let engine = default_engine();
    engine
        .register_indicator("sma2", "SMA", &IndicatorParams::Period(2), &[])
        .unwrap();
    engine
        .register_indicator("ema2", "EMA", &IndicatorParams::Period(2), &[])
        .unwrap();

    let w = window(&[1.0, 2.0, 3.0]);
    engine.evaluate("sma2", &w).unwrap();
    engine.evaluate("ema2", &w).unwrap();

    let outcome = engine.process_incremental(Sample::new(30, 4.0), &["sma2".to_string()]);
    assert!(outcome.results.contains_key("sma2"));
    assert!(!outcome.results.contains_key("ema2"));

    // The unrequested node's position did not advance.
    let outcome = engine.process_incremental(Sample::new(30, 4.0), &["ema2".to_string()]);
    assert!(outcome.results.contains_key("ema2"));
    assert!(outcome.failures.is_empty());
}

#[test]
fn test_process_incremental_reports_requested_unknown_ids() {
    let engine = default_engine();
    engine
        .register_indicator("sma2", "SMA", &IndicatorParams::Period(2), &[])
        .unwrap();
    engine
        .evaluate("sma2", &window(&[1.0, 2.0, 3.0]))
        .unwrap();

    let outcome = engine.process_incremental(
        Sample::new(30, 4.0),
        &["sma2".to_string(), "ghost".to_string()],
    );

    // The known node still advances; the unknown id is a recorded failure.
    assert!(outcome.results.contains_key("sma2"));
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, "ghost");
    assert!(matches!(
        outcome.failures[0].1,
        EngineError::NotRegistered(ref id) if id == "ghost"
    ));
}

#[test]
fn test_multi_sample_catch_up_matches_full_recompute() {
    let engine = default_engine();
    engine
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();

    let seed = [10.0, 12.0, 11.0, 13.0, 15.0];
    engine.evaluate("sma3", &window(&seed)).unwrap();

    // Three appended samples: caught up in one incremental pass.
    let extended = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0, 13.0];
    let caught_up = engine.evaluate("sma3", &window(&extended)).unwrap();
    assert_eq!(caught_up.mode, EvalMode::Incremental { new_samples: 3 });

    let reference = default_engine();
    reference
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();
    let full = reference.evaluate("sma3", &window(&extended)).unwrap();

    // The retained tail matches the fresh full series point for point.
    let tail = caught_up.value.points();
    let full_tail = &full.value.points()[full.value.len() - tail.len()..];
    for (got, want) in tail.iter().zip(full_tail) {
        assert!((got - want).abs() < 1e-9);
    }
    assert!((caught_up.value.last().unwrap() - (14.0 + 16.0 + 13.0) / 3.0).abs() < 1e-12);
}

#[test]
fn test_process_incremental_skips_unseeded_nodes() {
    let engine = default_engine();
    engine
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();

    // Never fully evaluated: streaming has nothing to continue.
    let outcome = engine.process_incremental_all(Sample::new(10, 1.0));
    assert!(outcome.results.is_empty());
    assert!(outcome.failures.is_empty());
}

/// Unit that fails its streaming update on negative values.
struct Brittle;

impl Indicator for Brittle {
    fn compute(&self, samples: &[Sample]) -> Result<Vec<f64>, IndicatorError> {
        Ok(samples.iter().map(|s| s.value).collect())
    }

    fn update(&self, _prev: Option<f64>, buffer: &[Sample]) -> Result<f64, IndicatorError> {
        let newest = buffer
            .last()
            .ok_or_else(|| IndicatorError::computation("empty buffer"))?;
        if newest.value < 0.0 {
            return Err(IndicatorError::computation("negative input"));
        }
        Ok(newest.value)
    }

    fn name(&self) -> &str {
        "BRITTLE"
    }

    fn min_lookback(&self) -> usize {
        1
    }
}

#[test]
fn test_batch_partial_failure_leaves_other_nodes_advancing() {
    let mut registry = IndicatorRegistry::with_defaults();
    registry.register("BRITTLE", |_| Ok(Arc::new(Brittle)));
    let engine = IndicatorEngine::with_registry(EngineConfig::default(), registry).unwrap();

    engine
        .register_indicator("sma2", "SMA", &IndicatorParams::Period(2), &[])
        .unwrap();
    engine
        .register_indicator("brittle", "BRITTLE", &IndicatorParams::Period(1), &[])
        .unwrap();

    let w = window(&[1.0, 2.0, 3.0]);
    engine.evaluate("sma2", &w).unwrap();
    engine.evaluate("brittle", &w).unwrap();

    let outcome = engine.process_incremental_all(Sample::new(30, -4.0));
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].0, "brittle");
    assert!(matches!(
        outcome.failures[0].1,
        EngineError::Evaluation { .. }
    ));
    // The healthy node still advanced over the same sample.
    let point = outcome.results["sma2"].value.last().unwrap();
    assert!((point - (3.0 + -4.0) / 2.0).abs() < 1e-12);
}

#[test]
fn test_invalidation_propagates_to_transitive_dependents() {
    let engine = default_engine(); // Hybrid strategy by default
    engine
        .register_indicator("a", "SMA", &IndicatorParams::Period(2), &[])
        .unwrap();
    engine
        .register_indicator("b", "EMA", &IndicatorParams::Period(2), &["a".to_string()])
        .unwrap();
    engine
        .register_indicator("c", "ROC", &IndicatorParams::Period(2), &["b".to_string()])
        .unwrap();

    let events = capture_events(&engine);
    engine.invalidate("a", "data revised").unwrap();

    let m = engine.metrics();
    assert_eq!(m.nodes["a"].invalidations, 1);
    assert_eq!(m.nodes["b"].invalidations, 1);
    assert_eq!(m.nodes["c"].invalidations, 1);

    let events = events.lock().unwrap();
    let reasons: Vec<(String, String)> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::IndicatorInvalidated { id, reason } => Some((id.clone(), reason.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(reasons.len(), 3);
    assert_eq!(reasons[0], ("a".to_string(), "data revised".to_string()));
    assert!(reasons
        .iter()
        .any(|(id, r)| id == "b" && r == "dependency: data revised"));
    assert!(reasons
        .iter()
        .any(|(id, r)| id == "c" && r == "dependency: data revised"));
}

#[test]
fn test_data_strategy_does_not_propagate() {
    let cfg = EngineConfig {
        invalidation_strategy: InvalidationStrategy::Data,
        ..EngineConfig::default()
    };
    let engine = IndicatorEngine::new(cfg).unwrap();
    engine
        .register_indicator("a", "SMA", &IndicatorParams::Period(2), &[])
        .unwrap();
    engine
        .register_indicator("b", "EMA", &IndicatorParams::Period(2), &["a".to_string()])
        .unwrap();

    engine.invalidate("a", "data revised").unwrap();
    let m = engine.metrics();
    assert_eq!(m.nodes["a"].invalidations, 1);
    assert_eq!(m.nodes["b"].invalidations, 0);
}

#[test]
fn test_invalidated_node_recomputes_on_next_evaluation() {
    let engine = default_engine();
    engine
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();

    let w = window(&[1.0, 2.0, 3.0, 4.0]);
    engine.evaluate("sma3", &w).unwrap();
    engine.invalidate("sma3", "source rewind").unwrap();

    let out = engine.evaluate("sma3", &w).unwrap();
    assert!(!out.from_cache);
    let m = engine.metrics();
    assert_eq!(m.nodes["sma3"].cache_hits, 0);
    assert_eq!(m.nodes["sma3"].full_evals, 2);
}

#[test]
fn test_memory_pressure_alerts_and_sheds() {
    let cfg = EngineConfig {
        memory: MemoryConfig {
            soft_limit_bytes: 256,
            hard_limit_bytes: 512,
            emergency_limit_bytes: 1_024,
            ..MemoryConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = IndicatorEngine::new(cfg).unwrap();
    engine
        .register_indicator("sma5", "SMA", &IndicatorParams::Period(5), &[])
        .unwrap();
    let events = capture_events(&engine);

    // A few hundred cached points push usage past the emergency threshold.
    let values: Vec<f64> = (0..400).map(f64::from).collect();
    engine.evaluate("sma5", &window(&values)).unwrap();
    engine.run_maintenance();

    assert_eq!(engine.status().pressure, PressureLevel::Emergency);

    let events = events.lock().unwrap();
    let alerts: Vec<PressureLevel> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::MemoryAlert { level, .. } => Some(*level),
            _ => None,
        })
        .collect();
    assert_eq!(alerts, vec![PressureLevel::Emergency]);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::MaintenanceCompleted { .. })));
}

#[test]
fn test_status_reports_counts() {
    let engine = default_engine();
    engine
        .register_indicator("sma3", "SMA", &IndicatorParams::Period(3), &[])
        .unwrap();
    engine
        .evaluate("sma3", &window(&[1.0, 2.0, 3.0, 4.0]))
        .unwrap();

    let status = engine.status();
    assert_eq!(status.node_count, 1);
    assert_eq!(status.cache_entries, 1);
    assert!(status.estimated_bytes > 0);
    assert_eq!(status.pressure, PressureLevel::Normal);
    assert!(!status.maintenance_running);
}
