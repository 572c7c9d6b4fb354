//! Pressure state machine and reclamation planner.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};
use vega_types::MemoryConfig;

use crate::leak::{classify, growth_rate, LeakReport, LeakSuspect};

/// Optional host hook requesting a forced collection / compaction pass.
pub type CollectHook = Box<dyn Fn() + Send>;

/// Memory pressure level of a governed engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    /// Usage below the soft threshold.
    Normal,
    /// Usage above the soft threshold.
    Warning,
    /// Usage above the hard threshold; reclamation runs.
    Critical,
    /// Usage above the emergency threshold (or reclamation exhausted);
    /// cold cache/state is shed aggressively.
    Emergency,
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PressureLevel::Normal => "normal",
            PressureLevel::Warning => "warning",
            PressureLevel::Critical => "critical",
            PressureLevel::Emergency => "emergency",
        };
        f.write_str(s)
    }
}

/// A timestamped component-size measurement.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemorySample {
    /// Epoch nanoseconds of the measurement.
    pub timestamp_ns: i64,
    /// Estimated component size in bytes.
    pub bytes: usize,
}

/// Alert emitted on a pressure-level transition.
#[derive(Debug, Clone, Serialize)]
pub struct PressureAlert {
    /// Level entered by the transition.
    pub level: PressureLevel,
    /// Human-readable description.
    pub message: String,
    /// Epoch nanoseconds of the transition.
    pub timestamp_ns: i64,
}

/// Reclamation directive for the owning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimAction {
    /// Trim governor sample/alert history.
    TrimHistory,
    /// The host's forced-collection hook was requested.
    ForceCollect,
    /// Shed all but the most recent entries per node.
    ShedCold {
        /// Memoized results to keep per node.
        keep_per_node: usize,
    },
}

/// Result of one sampling step.
#[derive(Debug, Default)]
pub struct GovernorOutcome {
    /// Pressure transition, if the level changed.
    pub transition: Option<(PressureLevel, PressureLevel)>,
    /// Alerts raised this step (at most one; transitions only).
    pub alerts: Vec<PressureAlert>,
    /// Leak findings surfaced this step.
    pub leaks: Vec<LeakReport>,
    /// Reclamation directives for the engine to apply.
    pub actions: Vec<ReclaimAction>,
}

/// Samples usage, drives the pressure state machine, and flags leak
/// suspects.
///
/// The governor is purely step-driven: the owner feeds it component sizes
/// via [`MemoryGovernor::observe`] and calls [`MemoryGovernor::step`] on its
/// sampling interval. Individual cache operations never touch it.
pub struct MemoryGovernor {
    config: MemoryConfig,
    level: PressureLevel,
    samples: HashMap<String, VecDeque<MemorySample>>,
    suspects: HashMap<String, LeakSuspect>,
    alert_history: VecDeque<PressureAlert>,
    reclaim_attempts: usize,
    collect_hook: Option<CollectHook>,
}

impl fmt::Debug for MemoryGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryGovernor")
            .field("level", &self.level)
            .field("components", &self.samples.len())
            .field("suspects", &self.suspects.len())
            .field("reclaim_attempts", &self.reclaim_attempts)
            .finish()
    }
}

impl MemoryGovernor {
    /// Creates a governor with the given configuration.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            level: PressureLevel::Normal,
            samples: HashMap::new(),
            suspects: HashMap::new(),
            alert_history: VecDeque::new(),
            reclaim_attempts: 0,
            collect_hook: None,
        }
    }

    /// Attaches an optional host forced-collection hook.
    #[must_use]
    pub fn with_collect_hook(mut self, hook: CollectHook) -> Self {
        self.collect_hook = Some(hook);
        self
    }

    /// Records a component-size measurement.
    pub fn observe(&mut self, component: &str, bytes: usize, now_ns: i64) {
        let series = self.samples.entry(component.to_string()).or_default();
        series.push_back(MemorySample {
            timestamp_ns: now_ns,
            bytes,
        });
        while series.len() > self.config.sample_horizon {
            series.pop_front();
        }
    }

    /// Runs one sampling step against total usage in bytes.
    ///
    /// Returns the transition (if any), at most one alert, leak findings,
    /// and reclamation directives the owner should apply.
    pub fn step(&mut self, total_bytes: usize, now_ns: i64) -> GovernorOutcome {
        let mut outcome = GovernorOutcome::default();

        let mut next = self.classify_usage(total_bytes);

        if next == PressureLevel::Critical {
            if self.level == PressureLevel::Emergency {
                // Emergency holds until usage falls below the hard
                // threshold; re-classifying it as Critical each step would
                // ping-pong the level and storm alerts.
                next = PressureLevel::Emergency;
            } else if self.level == PressureLevel::Critical
                && self.reclaim_attempts >= self.config.max_reclaim_attempts
            {
                // Bounded reclamation: staying Critical past the attempt
                // budget escalates to Emergency shedding even below the
                // emergency threshold.
                next = PressureLevel::Emergency;
            }
        }

        if next != self.level {
            let alert = PressureAlert {
                level: next,
                message: format!(
                    "memory pressure {} -> {} at {} bytes",
                    self.level, next, total_bytes
                ),
                timestamp_ns: now_ns,
            };
            warn!(from = %self.level, to = %next, total_bytes, "memory pressure transition");
            self.push_alert(alert.clone());
            outcome.alerts.push(alert);
            outcome.transition = Some((self.level, next));
            self.level = next;
        }

        match self.level {
            PressureLevel::Normal | PressureLevel::Warning => {
                self.reclaim_attempts = 0;
            }
            PressureLevel::Critical => {
                self.reclaim_attempts += 1;
                outcome.actions.push(ReclaimAction::TrimHistory);
                self.trim_history();
                if let Some(hook) = &self.collect_hook {
                    hook();
                    outcome.actions.push(ReclaimAction::ForceCollect);
                }
            }
            PressureLevel::Emergency => {
                outcome.actions.push(ReclaimAction::TrimHistory);
                self.trim_history();
                if let Some(hook) = &self.collect_hook {
                    hook();
                    outcome.actions.push(ReclaimAction::ForceCollect);
                }
                outcome.actions.push(ReclaimAction::ShedCold {
                    keep_per_node: self.config.emergency_keep_recent,
                });
            }
        }

        if self.config.leak_detection_enabled {
            outcome.leaks = self.detect_leaks(now_ns);
        }

        debug!(level = %self.level, total_bytes, leaks = outcome.leaks.len(), "governor step");
        outcome
    }

    /// Returns the current pressure level.
    #[must_use]
    pub fn level(&self) -> PressureLevel {
        self.level
    }

    /// Returns the current leak suspects.
    #[must_use]
    pub fn suspects(&self) -> Vec<&LeakSuspect> {
        self.suspects.values().collect()
    }

    /// Returns the retained alert history, oldest first.
    #[must_use]
    pub fn alert_history(&self) -> impl Iterator<Item = &PressureAlert> {
        self.alert_history.iter()
    }

    /// Drops the oldest half of the retained samples and alerts.
    pub fn trim_history(&mut self) {
        for series in self.samples.values_mut() {
            while series.len() > self.config.leak_window {
                series.pop_front();
            }
        }
        let keep = self.config.alert_history / 2;
        while self.alert_history.len() > keep {
            self.alert_history.pop_front();
        }
    }

    fn classify_usage(&self, total_bytes: usize) -> PressureLevel {
        if total_bytes > self.config.emergency_limit_bytes {
            PressureLevel::Emergency
        } else if total_bytes > self.config.hard_limit_bytes {
            PressureLevel::Critical
        } else if total_bytes > self.config.soft_limit_bytes {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }

    fn push_alert(&mut self, alert: PressureAlert) {
        self.alert_history.push_back(alert);
        while self.alert_history.len() > self.config.alert_history {
            self.alert_history.pop_front();
        }
    }

    fn detect_leaks(&mut self, now_ns: i64) -> Vec<LeakReport> {
        let mut reports = Vec::new();

        for (component, series) in &self.samples {
            let window_start = series.len().saturating_sub(self.config.leak_window);
            let window: VecDeque<MemorySample> =
                series.iter().skip(window_start).copied().collect();
            let Some(rate) = growth_rate(&window) else {
                continue;
            };
            let Some(suspicion) = classify(rate, &self.config) else {
                continue;
            };

            let surfaced = match self.suspects.get_mut(component) {
                // Update in place; only re-surface on a level change.
                Some(existing) => {
                    let changed = existing.suspicion != suspicion;
                    existing.growth_bytes_per_sec = rate;
                    existing.suspicion = suspicion;
                    existing.last_seen_ns = now_ns;
                    existing.observations += 1;
                    changed
                }
                None => {
                    self.suspects.insert(
                        component.clone(),
                        LeakSuspect {
                            component: component.clone(),
                            growth_bytes_per_sec: rate,
                            suspicion,
                            first_seen_ns: now_ns,
                            last_seen_ns: now_ns,
                            observations: 1,
                        },
                    );
                    true
                }
            };

            if surfaced {
                warn!(component, rate, ?suspicion, "leak suspect");
                reports.push(LeakReport {
                    component: component.clone(),
                    growth_bytes_per_sec: rate,
                    suspicion,
                });
            }
        }
        reports
    }
}
