//! Engine core and its thread-safe public handle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use vega_graph::{DependencyGraph, GraphError};
use vega_indicators::{Indicator, IndicatorParams, IndicatorRegistry, IndicatorValue};
use vega_memory::{MemoryGovernor, ReclaimAction};
use vega_types::{DataWindow, EngineConfig, Fingerprint, Sample};

use crate::cache::MemoCache;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus, EventListener};
use crate::metrics::{EngineMetrics, EngineStatus, NodeMetrics};
use crate::planner::{choose_mode, EvalMode};
use crate::state::{IncrementalState, StateStore};

/// Outcome of one evaluation request.
#[derive(Debug, Clone)]
pub struct ResultEnvelope {
    /// The evaluated series. Full evaluations cover the whole window;
    /// incremental continuations (and cached repeats of them) cover only
    /// the retained lookback buffer, so the series may be shorter than the
    /// window. The latest point is equivalent either way.
    pub value: Arc<IndicatorValue>,
    /// How the target node was satisfied.
    pub mode: EvalMode,
    /// True when the target was served from the memoization cache.
    pub from_cache: bool,
    /// Wall time of the whole request, dependencies included.
    pub elapsed: Duration,
    /// Declared dependency ids of the target node.
    pub dependencies: Vec<String>,
}

/// Result of streaming one sample through a set of nodes.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Envelope per node that advanced.
    pub results: HashMap<String, ResultEnvelope>,
    /// Nodes that rejected the sample, with the cause. Their state is
    /// invalidated; the next full evaluation reseeds them.
    pub failures: Vec<(String, EngineError)>,
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
}

fn elapsed_us(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

struct NodeRecord {
    unit: Arc<dyn Indicator>,
    dirty: bool,
    last_evaluated_ns: Option<i64>,
}

struct EngineCore {
    config: EngineConfig,
    registry: IndicatorRegistry,
    graph: DependencyGraph,
    nodes: HashMap<String, NodeRecord>,
    cache: MemoCache,
    states: StateStore,
    governor: MemoryGovernor,
    bus: EventBus,
    node_metrics: HashMap<String, NodeMetrics>,
}

impl EngineCore {
    fn new(config: EngineConfig, registry: IndicatorRegistry) -> Self {
        let cache = MemoCache::new(config.max_memoized_results);
        let governor = MemoryGovernor::new(config.memory.clone());
        Self {
            config,
            registry,
            graph: DependencyGraph::new(),
            nodes: HashMap::new(),
            cache,
            states: StateStore::new(),
            governor,
            bus: EventBus::new(),
            node_metrics: HashMap::new(),
        }
    }

    fn register(
        &mut self,
        id: &str,
        name: &str,
        params: &IndicatorParams,
        dependencies: &[String],
    ) -> Result<(), EngineError> {
        let unit = self.registry.create(name, params)?;
        self.graph.register(id, dependencies)?;
        self.nodes.insert(
            id.to_string(),
            NodeRecord {
                unit,
                dirty: false,
                last_evaluated_ns: None,
            },
        );
        self.node_metrics
            .insert(id.to_string(), NodeMetrics::default());
        self.cache.set_live_nodes(self.nodes.len());
        info!(id, name, deps = dependencies.len(), "node registered");
        self.bus
            .emit(&EngineEvent::IndicatorRegistered { id: id.to_string() });
        Ok(())
    }

    fn unregister(&mut self, id: &str) -> Result<(), EngineError> {
        self.graph.unregister(id)?;
        self.nodes.remove(id);
        self.node_metrics.remove(id);
        self.cache.invalidate_node(id);
        self.cache.set_live_nodes(self.nodes.len());
        self.states.remove(id);
        info!(id, "node unregistered");
        self.bus.emit(&EngineEvent::IndicatorUnregistered {
            id: id.to_string(),
        });
        Ok(())
    }

    fn evaluate(
        &mut self,
        id: &str,
        window: &DataWindow,
        now: i64,
    ) -> Result<ResultEnvelope, EngineError> {
        if !self.nodes.contains_key(id) {
            return Err(EngineError::NotRegistered(id.to_string()));
        }
        let order = self.graph.topological_order(&[id]).map_err(|e| match e {
            GraphError::NotRegistered(missing) => EngineError::NotRegistered(missing),
            other => EngineError::Graph(other),
        })?;

        let started = Instant::now();
        let mut target = None;
        for node in &order {
            target = Some(self.evaluate_node(node, window, now)?);
        }
        // The requested id closes its own post-order.
        let (value, mode) =
            target.ok_or_else(|| EngineError::NotRegistered(id.to_string()))?;
        Ok(ResultEnvelope {
            value,
            from_cache: mode == EvalMode::Cached,
            mode,
            elapsed: started.elapsed(),
            dependencies: self
                .graph
                .dependencies_of(id)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        })
    }

    fn evaluate_node(
        &mut self,
        id: &str,
        window: &DataWindow,
        now: i64,
    ) -> Result<(Arc<IndicatorValue>, EvalMode), EngineError> {
        let started = Instant::now();
        let record = self
            .nodes
            .get(id)
            .ok_or_else(|| EngineError::NotRegistered(id.to_string()))?;
        let unit = Arc::clone(&record.unit);
        let dirty = record.dirty;
        let fingerprint = Fingerprint::of_window(window);

        if self.config.memoization_enabled && !dirty {
            if let Some(hit) = self.cache.get(id, &fingerprint, now) {
                self.finish_node(id, EvalMode::Cached, now, started);
                return Ok((hit, EvalMode::Cached));
            }
        }

        let mode = choose_mode(
            &self.config,
            unit.min_lookback(),
            self.states.get(id),
            window,
        );
        let value = match mode {
            EvalMode::Incremental { .. } => self.run_incremental(id, &unit, window)?,
            EvalMode::Cached | EvalMode::Full => self.run_full(id, &unit, window)?,
        };

        if self.config.memoization_enabled {
            self.cache
                .insert(id, fingerprint, Arc::clone(&value), now);
        }
        self.finish_node(id, mode, now, started);
        debug!(id, mode = mode.label(), len = window.len(), "evaluated");
        Ok((value, mode))
    }

    fn finish_node(&mut self, id: &str, mode: EvalMode, now: i64, started: Instant) {
        if let Some(record) = self.nodes.get_mut(id) {
            record.dirty = false;
            record.last_evaluated_ns = Some(now);
        }
        let m = self.node_metrics.entry(id.to_string()).or_default();
        m.evaluations += 1;
        m.total_eval_time_us += elapsed_us(started);
        match mode {
            EvalMode::Cached => m.cache_hits += 1,
            EvalMode::Incremental { .. } => m.incremental_evals += 1,
            EvalMode::Full => m.full_evals += 1,
        }
        self.bus.emit(&EngineEvent::IndicatorCalculated {
            id: id.to_string(),
            mode: mode.label(),
        });
    }

    fn run_incremental(
        &mut self,
        id: &str,
        unit: &Arc<dyn Indicator>,
        window: &DataWindow,
    ) -> Result<Arc<IndicatorValue>, EngineError> {
        let last = self
            .states
            .get(id)
            .map_or(i64::MIN, IncrementalState::last_processed_ns);
        let new: Vec<Sample> = window.samples_after(last).to_vec();

        for sample in new {
            let state = self
                .states
                .get_mut(id)
                .ok_or_else(|| EngineError::NotRegistered(id.to_string()))?;
            let prev = state.last_point();
            state.push_sample(sample);
            match unit.update(prev, state.buffer()) {
                Ok(point) => state.push_point(point),
                Err(source) => {
                    state.invalidate();
                    self.node_metrics.entry(id.to_string()).or_default().failures += 1;
                    warn!(id, %source, "incremental update failed; state invalidated");
                    return Err(EngineError::Evaluation {
                        node: id.to_string(),
                        source,
                    });
                }
            }
        }
        let state = self
            .states
            .get(id)
            .ok_or_else(|| EngineError::NotRegistered(id.to_string()))?;
        Ok(Arc::new(state.value()))
    }

    fn run_full(
        &mut self,
        id: &str,
        unit: &Arc<dyn Indicator>,
        window: &DataWindow,
    ) -> Result<Arc<IndicatorValue>, EngineError> {
        let points = match unit.compute(window.samples()) {
            Ok(points) => points,
            Err(source) => {
                self.node_metrics.entry(id.to_string()).or_default().failures += 1;
                return Err(EngineError::Evaluation {
                    node: id.to_string(),
                    source,
                });
            }
        };
        if self.config.incremental_enabled && !window.is_empty() {
            let capacity = unit.min_lookback().clamp(1, self.config.max_lookback);
            self.states.insert(
                id,
                IncrementalState::seed(capacity, window.samples(), &points),
            );
        }
        Ok(Arc::new(IndicatorValue::new(points)))
    }

    fn process_incremental(&mut self, sample: Sample, ids: Option<&[String]>) -> BatchOutcome {
        let requested: Option<HashSet<&str>> =
            ids.map(|ids| ids.iter().map(String::as_str).collect());
        let mut all: Vec<String> = match ids {
            Some(ids) => ids.to_vec(),
            None => self.nodes.keys().cloned().collect(),
        };
        all.sort();
        all.dedup();
        let refs: Vec<&str> = all.iter().map(String::as_str).collect();
        // Dependency-first where the graph resolves; dangling dependencies
        // fall back to sorted id order.
        let order = self.graph.topological_order(&refs).unwrap_or(all);

        let mut outcome = BatchOutcome::default();
        for id in &order {
            if let Some(requested) = &requested {
                if !requested.contains(id.as_str()) {
                    continue;
                }
            }
            let started = Instant::now();
            let Some(unit) = self.nodes.get(id).map(|r| Arc::clone(&r.unit)) else {
                // Explicitly requested but unknown: a reportable failure.
                // The catch-all pass only covers registered nodes.
                if requested.is_some() {
                    outcome
                        .failures
                        .push((id.clone(), EngineError::NotRegistered(id.clone())));
                }
                continue;
            };
            let Some(state) = self.states.get_mut(id) else {
                continue;
            };
            if !state.is_valid() {
                continue;
            }
            if sample.timestamp_ns <= state.last_processed_ns() {
                state.invalidate();
                self.node_metrics.entry(id.clone()).or_default().failures += 1;
                warn!(id, ts = sample.timestamp_ns, "out-of-order sample");
                outcome.failures.push((
                    id.clone(),
                    EngineError::OutOfOrderSample {
                        node: id.clone(),
                        timestamp_ns: sample.timestamp_ns,
                    },
                ));
                continue;
            }

            let prev = state.last_point();
            state.push_sample(sample);
            match unit.update(prev, state.buffer()) {
                Ok(point) => {
                    state.push_point(point);
                    let value = Arc::new(state.value());
                    let now = now_ns();
                    if let Some(record) = self.nodes.get_mut(id) {
                        record.last_evaluated_ns = Some(now);
                    }
                    let m = self.node_metrics.entry(id.clone()).or_default();
                    m.evaluations += 1;
                    m.incremental_evals += 1;
                    m.total_eval_time_us += elapsed_us(started);
                    self.bus.emit(&EngineEvent::IndicatorCalculated {
                        id: id.clone(),
                        mode: EvalMode::Incremental { new_samples: 1 }.label(),
                    });
                    outcome.results.insert(
                        id.clone(),
                        ResultEnvelope {
                            value,
                            mode: EvalMode::Incremental { new_samples: 1 },
                            from_cache: false,
                            elapsed: started.elapsed(),
                            dependencies: self
                                .graph
                                .dependencies_of(id)
                                .map(<[String]>::to_vec)
                                .unwrap_or_default(),
                        },
                    );
                }
                Err(source) => {
                    state.invalidate();
                    self.node_metrics.entry(id.clone()).or_default().failures += 1;
                    outcome.failures.push((
                        id.clone(),
                        EngineError::Evaluation {
                            node: id.clone(),
                            source,
                        },
                    ));
                }
            }
        }
        outcome
    }

    fn invalidate(&mut self, id: &str, reason: &str) -> Result<(), EngineError> {
        if !self.nodes.contains_key(id) {
            return Err(EngineError::NotRegistered(id.to_string()));
        }
        self.invalidate_one(id, reason);
        if self.config.invalidation_strategy.propagates_to_dependents() {
            for dependent in self.graph.transitive_dependents(id) {
                self.invalidate_one(&dependent, &format!("dependency: {reason}"));
            }
        }
        Ok(())
    }

    fn invalidate_all(&mut self, reason: &str) {
        let mut ids: Vec<String> = self.nodes.keys().cloned().collect();
        ids.sort();
        for id in ids {
            self.invalidate_one(&id, reason);
        }
    }

    fn invalidate_one(&mut self, id: &str, reason: &str) {
        if let Some(record) = self.nodes.get_mut(id) {
            record.dirty = true;
        }
        self.cache.invalidate_node(id);
        self.states.invalidate(id);
        self.node_metrics.entry(id.to_string()).or_default().invalidations += 1;
        debug!(id, reason, "node invalidated");
        self.bus.emit(&EngineEvent::IndicatorInvalidated {
            id: id.to_string(),
            reason: reason.to_string(),
        });
    }

    fn maintenance_tick(&mut self, now: i64) {
        let evicted = self.cache.sweep(now, self.config.cache_retention_ns);

        let cache_bytes = self.cache.estimated_bytes();
        let state_bytes = self.states.estimated_bytes();
        self.governor.observe("memo_cache", cache_bytes, now);
        self.governor.observe("incremental_state", state_bytes, now);
        let outcome = self.governor.step(cache_bytes + state_bytes, now);

        let mut reclaimed = 0;
        for action in &outcome.actions {
            if let ReclaimAction::ShedCold { keep_per_node } = action {
                reclaimed += self.cache.shed(*keep_per_node);
            }
        }

        for alert in outcome.alerts {
            self.bus.emit(&EngineEvent::MemoryAlert {
                level: alert.level,
                message: alert.message,
            });
        }
        for report in outcome.leaks {
            self.bus.emit(&EngineEvent::LeakDetected { report });
        }
        self.bus.emit(&EngineEvent::MaintenanceCompleted {
            evicted_entries: evicted,
            reclaimed_bytes: reclaimed,
        });
    }

    fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            nodes: self.node_metrics.clone(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            cache_entries: self.cache.len(),
            estimated_bytes: self.cache.estimated_bytes() + self.states.estimated_bytes(),
        }
    }

    fn status(&self, maintenance_running: bool) -> EngineStatus {
        EngineStatus {
            node_count: self.nodes.len(),
            cache_entries: self.cache.len(),
            estimated_bytes: self.cache.estimated_bytes() + self.states.estimated_bytes(),
            pressure: self.governor.level(),
            leak_suspects: self.governor.suspects().len(),
            maintenance_running,
        }
    }
}

struct MaintenanceRunner {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Thread-safe indicator computation engine.
///
/// Owns the dependency graph, memoization cache, incremental state and
/// memory governor behind one lock; a background maintenance thread drives
/// cache sweeps and governor sampling while running.
pub struct IndicatorEngine {
    core: Arc<Mutex<EngineCore>>,
    interval: Duration,
    runner: Option<MaintenanceRunner>,
}

impl IndicatorEngine {
    /// Creates an engine with the bundled indicator registry.
    ///
    /// # Errors
    /// Returns [`EngineError::Core`] if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_registry(config, IndicatorRegistry::with_defaults())
    }

    /// Creates an engine with a caller-provided registry.
    ///
    /// # Errors
    /// Returns [`EngineError::Core`] if the configuration is invalid.
    pub fn with_registry(
        config: EngineConfig,
        registry: IndicatorRegistry,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let interval = Duration::from_millis(config.memory.sampling_interval_ms);
        Ok(Self {
            core: Arc::new(Mutex::new(EngineCore::new(config, registry))),
            interval,
            runner: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, EngineCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a node: a named unit with parameters and dependency ids.
    ///
    /// Dependency ids may be registered later; evaluation fails until they
    /// all resolve.
    ///
    /// # Errors
    /// Returns [`EngineError::Indicator`] when the unit cannot be created,
    /// or [`EngineError::Graph`] on a duplicate id or dependency cycle.
    pub fn register_indicator(
        &self,
        id: &str,
        name: &str,
        params: &IndicatorParams,
        dependencies: &[String],
    ) -> Result<(), EngineError> {
        self.lock().register(id, name, params, dependencies)
    }

    /// Unregisters a node and drops its cached results and state.
    ///
    /// # Errors
    /// Returns [`EngineError::Graph`] while other nodes depend on it, or if
    /// the id is unknown.
    pub fn unregister_indicator(&self, id: &str) -> Result<(), EngineError> {
        self.lock().unregister(id)
    }

    /// Evaluates a node over a window, dependencies first.
    ///
    /// Each node in the dependency closure is served from the memoization
    /// cache when its input fingerprint matches, continued incrementally
    /// when retained state lines up with the window, and fully recomputed
    /// otherwise. Sibling results computed before a failure stay cached.
    ///
    /// # Errors
    /// Returns [`EngineError::NotRegistered`] for unknown ids or unresolved
    /// dependencies, and [`EngineError::Evaluation`] when a unit fails.
    pub fn evaluate(&self, id: &str, window: &DataWindow) -> Result<ResultEnvelope, EngineError> {
        self.lock().evaluate(id, window, now_ns())
    }

    /// Streams one sample through the given nodes, dependency order first.
    ///
    /// Nodes without valid seeded state are skipped. A failing node is
    /// recorded in the outcome and its state invalidated; the other nodes
    /// still advance.
    #[must_use]
    pub fn process_incremental(&self, sample: Sample, ids: &[String]) -> BatchOutcome {
        self.lock().process_incremental(sample, Some(ids))
    }

    /// Streams one sample through every node with valid seeded state.
    #[must_use]
    pub fn process_incremental_all(&self, sample: Sample) -> BatchOutcome {
        self.lock().process_incremental(sample, None)
    }

    /// Invalidates a node's cached results and incremental state.
    ///
    /// Under a propagating strategy the invalidation extends to all
    /// transitive dependents.
    ///
    /// # Errors
    /// Returns [`EngineError::NotRegistered`] for unknown ids.
    pub fn invalidate(&self, id: &str, reason: &str) -> Result<(), EngineError> {
        self.lock().invalidate(id, reason)
    }

    /// Invalidates every registered node.
    pub fn invalidate_all(&self, reason: &str) {
        self.lock().invalidate_all(reason);
    }

    /// Subscribes a listener to engine events.
    pub fn subscribe(&self, listener: EventListener) {
        self.lock().bus.subscribe(listener);
    }

    /// Snapshot of per-node and cache counters.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        self.lock().metrics()
    }

    /// Point-in-time status including memory pressure.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let running = self.runner.is_some();
        self.lock().status(running)
    }

    /// Runs one maintenance pass synchronously.
    pub fn run_maintenance(&self) {
        self.lock().maintenance_tick(now_ns());
    }

    /// Starts the background maintenance loop. Idempotent.
    ///
    /// # Errors
    /// Returns [`EngineError::Core`] if the thread cannot be spawned.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.runner.is_some() {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));
        let core = Arc::clone(&self.core);
        let interval = self.interval;
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("vega-maintenance".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    if thread_stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let mut core = core.lock().unwrap_or_else(PoisonError::into_inner);
                    core.maintenance_tick(now_ns());
                }
            })
            .map_err(vega_types::CoreError::Io)?;
        info!(interval_ms = self.interval.as_millis() as u64, "maintenance started");
        self.runner = Some(MaintenanceRunner { stop, handle });
        Ok(())
    }

    /// Stops the maintenance loop and joins the thread. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(runner) = self.runner.take() {
            runner.stop.store(true, Ordering::Relaxed);
            if runner.handle.join().is_err() {
                warn!("maintenance thread panicked");
            }
            info!("maintenance stopped");
        }
    }
}

impl Drop for IndicatorEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
