//! Evaluation-mode selection: cached, incremental catch-up, or full.

use vega_types::{DataWindow, EngineConfig};

use crate::state::IncrementalState;

/// How one node evaluation will be satisfied.
///
/// The cache is consulted before planning, so `Cached` is decided by the
/// caller; the planner chooses between continuing retained state and a full
/// recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Result served from the memoization cache.
    Cached,
    /// Retained state continued over the window's new samples.
    Incremental {
        /// Samples past the state's processed position.
        new_samples: usize,
    },
    /// Full recompute over the whole window.
    Full,
}

impl EvalMode {
    /// Short label for logging and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            EvalMode::Cached => "cached",
            EvalMode::Incremental { .. } => "incremental",
            EvalMode::Full => "full",
        }
    }
}

/// Picks incremental catch-up or full recompute for one node.
///
/// Incremental requires all of: the feature enabled, valid seeded state,
/// continuity between the window and the retained buffer (no gap, no
/// rewritten overlap), a catch-up of at most `incremental_batch_size` new
/// samples, and enough buffered lookback for the unit. Anything else falls
/// back to `Full`.
#[must_use]
pub fn choose_mode(
    config: &EngineConfig,
    min_lookback: usize,
    state: Option<&IncrementalState>,
    window: &DataWindow,
) -> EvalMode {
    if !config.incremental_enabled {
        return EvalMode::Full;
    }
    let Some(state) = state else {
        return EvalMode::Full;
    };
    if !state.is_valid() {
        return EvalMode::Full;
    }

    let last = state.last_processed_ns();
    let overlap = window.samples_until(last);
    let new = window.samples_after(last);

    // Continuity: the window must reach the state's processed position and
    // agree with the retained buffer where they overlap.
    match overlap.last() {
        Some(s) if s.timestamp_ns == last => {}
        _ => return EvalMode::Full,
    }
    let compare = overlap.len().min(state.buffer_len());
    let overlap_tail = &overlap[overlap.len() - compare..];
    let buffer_tail = state.buffer_iter().skip(state.buffer_len() - compare);
    for (w, b) in overlap_tail.iter().zip(buffer_tail) {
        if w.timestamp_ns != b.timestamp_ns || w.value.to_bits() != b.value.to_bits() {
            return EvalMode::Full;
        }
    }

    if new.is_empty() || new.len() > config.incremental_batch_size {
        return EvalMode::Full;
    }
    if state.buffer_len() + 1 < min_lookback {
        return EvalMode::Full;
    }

    EvalMode::Incremental {
        new_samples: new.len(),
    }
}
