//! Fingerprint-keyed memoization cache for evaluation results.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use tracing::trace;
use vega_indicators::IndicatorValue;
use vega_types::Fingerprint;

/// One memoized result with access metadata.
#[derive(Debug, Clone)]
struct MemoEntry {
    value: Arc<IndicatorValue>,
    created_ns: i64,
    last_access_ns: i64,
    access_count: u64,
}

/// Memoization cache keyed by `(node id, input fingerprint)`.
///
/// Results are stored behind `Arc` and never mutated, so a cached repeat of
/// an evaluation hands back the identical payload. Capacity is a global
/// entry budget shared evenly across the registered nodes (see
/// [`MemoCache::set_live_nodes`]); within a node the oldest-accessed entry
/// is evicted first.
#[derive(Debug)]
pub struct MemoCache {
    per_node: HashMap<String, HashMap<Fingerprint, MemoEntry>>,
    capacity: usize,
    live_nodes: usize,
    hits: u64,
    misses: u64,
}

impl MemoCache {
    /// Creates a cache with a global entry capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            per_node: HashMap::new(),
            capacity: capacity.max(1),
            live_nodes: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Updates the registered-node count the per-node budget divides by.
    ///
    /// The owner calls this on register/unregister so the budget shrinks
    /// as nodes are added, whether or not they have cached results yet.
    pub fn set_live_nodes(&mut self, nodes: usize) {
        self.live_nodes = nodes;
    }

    /// Looks up a memoized result, bumping its access metadata.
    pub fn get(
        &mut self,
        node: &str,
        fingerprint: &Fingerprint,
        now_ns: i64,
    ) -> Option<Arc<IndicatorValue>> {
        let entry = self
            .per_node
            .get_mut(node)
            .and_then(|m| m.get_mut(fingerprint));
        match entry {
            Some(entry) => {
                entry.last_access_ns = now_ns;
                entry.access_count += 1;
                self.hits += 1;
                trace!(node, fp = %fingerprint.short_hex(), "cache hit");
                Some(Arc::clone(&entry.value))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a result, evicting oldest-accessed entries past capacity.
    pub fn insert(
        &mut self,
        node: &str,
        fingerprint: Fingerprint,
        value: Arc<IndicatorValue>,
        now_ns: i64,
    ) {
        self.per_node.entry(node.to_string()).or_default().insert(
            fingerprint,
            MemoEntry {
                value,
                created_ns: now_ns,
                last_access_ns: now_ns,
                access_count: 0,
            },
        );

        // Per-node budget: the global capacity shared evenly across every
        // registered node (falling back to nodes present in the cache when
        // the owner has not reported a count).
        let nodes = self.live_nodes.max(self.per_node.len()).max(1);
        let budget = (self.capacity / nodes).max(1);
        if let Some(entries) = self.per_node.get_mut(node) {
            while entries.len() > budget {
                Self::evict_oldest(entries);
            }
        }
        while self.len() > self.capacity {
            self.evict_globally_oldest();
        }
    }

    /// Drops every entry for a node. Returns the number removed.
    pub fn invalidate_node(&mut self, node: &str) -> usize {
        self.per_node.remove(node).map_or(0, |m| m.len())
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.per_node.clear();
    }

    /// Removes never-reused entries older than the retention horizon.
    /// Returns the number removed.
    pub fn sweep(&mut self, now_ns: i64, retention_ns: i64) -> usize {
        let mut removed = 0;
        for entries in self.per_node.values_mut() {
            let before = entries.len();
            entries.retain(|_, e| e.access_count > 0 || now_ns - e.created_ns <= retention_ns);
            removed += before - entries.len();
        }
        self.per_node.retain(|_, m| !m.is_empty());
        removed
    }

    /// Emergency shedding: keeps only the most recently accessed entries
    /// per node. Returns the estimated bytes reclaimed.
    pub fn shed(&mut self, keep_per_node: usize) -> usize {
        let mut reclaimed = 0;
        for entries in self.per_node.values_mut() {
            while entries.len() > keep_per_node {
                reclaimed += Self::evict_oldest(entries);
            }
        }
        self.per_node.retain(|_, m| !m.is_empty());
        reclaimed
    }

    /// Total entry count across all nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.per_node.values().map(HashMap::len).sum()
    }

    /// Returns true when no entries are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.per_node.values().all(HashMap::is_empty)
    }

    /// Cache hits since creation.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Cache misses since creation.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Estimated resident size of cached payloads plus entry overhead.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        self.per_node
            .values()
            .flat_map(HashMap::values)
            .map(|e| e.value.estimated_bytes() + mem::size_of::<MemoEntry>() + 32)
            .sum()
    }

    fn evict_oldest(entries: &mut HashMap<Fingerprint, MemoEntry>) -> usize {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| e.last_access_ns)
            .map(|(fp, _)| *fp);
        match oldest {
            Some(fp) => entries
                .remove(&fp)
                .map_or(0, |e| e.value.estimated_bytes()),
            None => 0,
        }
    }

    fn evict_globally_oldest(&mut self) {
        let victim = self
            .per_node
            .iter()
            .flat_map(|(node, m)| m.iter().map(move |(fp, e)| (node, fp, e.last_access_ns)))
            .min_by_key(|(_, _, last)| *last)
            .map(|(node, fp, _)| (node.clone(), *fp));
        if let Some((node, fp)) = victim {
            if let Some(entries) = self.per_node.get_mut(&node) {
                entries.remove(&fp);
            }
        }
    }
}
