//! Per-node incremental state: bounded sample buffer plus output tail.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::mem;

use vega_indicators::IndicatorValue;
use vega_types::Sample;

/// Retained streaming state for one node.
///
/// The buffer holds the trailing input samples, the points deque the output
/// values aligned to them. Both are trimmed together to the node's lookback
/// capacity, so a seeded node can continue a series without re-reading the
/// full window.
#[derive(Debug)]
pub struct IncrementalState {
    capacity: usize,
    last_processed_ns: i64,
    buffer: VecDeque<Sample>,
    points: VecDeque<f64>,
    valid: bool,
    updates: u64,
}

impl IncrementalState {
    /// Seeds state from a full evaluation, keeping the trailing `capacity`
    /// samples and their aligned output points.
    #[must_use]
    pub fn seed(capacity: usize, samples: &[Sample], points: &[f64]) -> Self {
        let capacity = capacity.max(1);
        debug_assert_eq!(samples.len(), points.len());
        let start = samples.len().saturating_sub(capacity);
        Self {
            capacity,
            last_processed_ns: samples.last().map_or(i64::MIN, |s| s.timestamp_ns),
            buffer: samples[start..].iter().copied().collect(),
            points: points[start..].iter().copied().collect(),
            valid: true,
            updates: 0,
        }
    }

    /// Appends an input sample ahead of its output point.
    ///
    /// Call [`IncrementalState::push_point`] with the computed value
    /// afterwards, or [`IncrementalState::invalidate`] on failure.
    pub fn push_sample(&mut self, sample: Sample) {
        self.buffer.push_back(sample);
        self.last_processed_ns = sample.timestamp_ns;
    }

    /// Records the output point for the most recently pushed sample and
    /// trims both deques to capacity.
    pub fn push_point(&mut self, point: f64) {
        self.points.push_back(point);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
            self.points.pop_front();
        }
        self.updates += 1;
    }

    /// Marks the state unusable until the next full evaluation reseeds it.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Returns true while the state can continue a series.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Timestamp of the newest processed sample, epoch nanoseconds.
    #[must_use]
    pub fn last_processed_ns(&self) -> i64 {
        self.last_processed_ns
    }

    /// Latest output point, if any.
    #[must_use]
    pub fn last_point(&self) -> Option<f64> {
        self.points.back().copied()
    }

    /// Number of buffered samples.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Buffered samples as one contiguous slice, newest last.
    pub fn buffer(&mut self) -> &[Sample] {
        self.buffer.make_contiguous()
    }

    /// Iterates the buffered samples, oldest first.
    pub fn buffer_iter(&self) -> impl Iterator<Item = &Sample> {
        self.buffer.iter()
    }

    /// Streaming updates applied since seeding.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Snapshot of the retained output tail.
    #[must_use]
    pub fn value(&self) -> IndicatorValue {
        IndicatorValue::new(self.points.iter().copied().collect())
    }

    /// Estimated resident size of the state.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self.buffer.len() * mem::size_of::<Sample>()
            + self.points.len() * mem::size_of::<f64>()
    }
}

/// Incremental state per node id.
#[derive(Debug, Default)]
pub struct StateStore {
    states: HashMap<String, IncrementalState>,
}

impl StateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for a node, if seeded.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&IncrementalState> {
        self.states.get(id)
    }

    /// Returns mutable state for a node, if seeded.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut IncrementalState> {
        self.states.get_mut(id)
    }

    /// Replaces the state for a node.
    pub fn insert(&mut self, id: &str, state: IncrementalState) {
        self.states.insert(id.to_string(), state);
    }

    /// Drops the state for a node.
    pub fn remove(&mut self, id: &str) {
        self.states.remove(id);
    }

    /// Marks a node's state invalid. Returns true if state existed.
    pub fn invalidate(&mut self, id: &str) -> bool {
        match self.states.get_mut(id) {
            Some(state) => {
                state.invalidate();
                true
            }
            None => false,
        }
    }

    /// Node ids with seeded state, in arbitrary order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.states.keys().cloned().collect()
    }

    /// Number of seeded nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true when no node has seeded state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Estimated resident size across all nodes.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        self.states
            .values()
            .map(IncrementalState::estimated_bytes)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(i as i64 * 10, v))
            .collect()
    }

    #[test]
    fn test_seed_keeps_trailing_capacity() {
        let s = samples(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let p = [f64::NAN, f64::NAN, 2.0, 3.0, 4.0];
        let state = IncrementalState::seed(3, &s, &p);

        assert_eq!(state.buffer_len(), 3);
        assert_eq!(state.last_processed_ns(), 40);
        assert_eq!(state.last_point(), Some(4.0));
        assert!(state.is_valid());
    }

    #[test]
    fn test_push_sample_then_point_trims_aligned() {
        let s = samples(&[1.0, 2.0, 3.0]);
        let p = [1.0, 2.0, 3.0];
        let mut state = IncrementalState::seed(3, &s, &p);

        state.push_sample(Sample::new(30, 4.0));
        assert_eq!(state.buffer_len(), 4);
        state.push_point(4.0);

        assert_eq!(state.buffer_len(), 3);
        assert_eq!(state.buffer()[0].value, 2.0);
        assert_eq!(state.last_point(), Some(4.0));
        assert_eq!(state.updates(), 1);
    }

    #[test]
    fn test_invalidate_flags_state() {
        let mut state = IncrementalState::seed(2, &samples(&[1.0]), &[1.0]);
        state.invalidate();
        assert!(!state.is_valid());
    }

    #[test]
    fn test_store_invalidate_and_remove() {
        let mut store = StateStore::new();
        store.insert("a", IncrementalState::seed(2, &samples(&[1.0]), &[1.0]));

        assert!(store.invalidate("a"));
        assert!(!store.get("a").unwrap().is_valid());
        assert!(!store.invalidate("missing"));

        store.remove("a");
        assert!(store.is_empty());
    }

    #[test]
    fn test_estimated_bytes_grows_with_buffer() {
        let small = IncrementalState::seed(4, &samples(&[1.0]), &[1.0]);
        let s = samples(&[1.0; 64]);
        let p = vec![1.0; 64];
        let large = IncrementalState::seed(64, &s, &p);
        assert!(large.estimated_bytes() > small.estimated_bytes());
    }
}
