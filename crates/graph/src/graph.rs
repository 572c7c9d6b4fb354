//! Identifier-keyed dependency graph with forward/reverse adjacency.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::GraphError;

/// Directed acyclic graph over indicator identifiers.
///
/// The dependency relation is held as two plain id-keyed maps (forward and
/// reverse) rather than back-references inside node objects, so the graph
/// never forms reference cycles. Dependency ids may be dangling at
/// registration time; they resolve when (if) the dependency registers.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// id -> declared dependencies, in registration order.
    forward: HashMap<String, Vec<String>>,
    /// id -> registered dependents (sorted for deterministic iteration).
    reverse: HashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node with its dependency ids.
    ///
    /// The new edge set is walked before committing; a would-be cycle fails
    /// with [`GraphError::CycleDetected`] and leaves the graph unchanged.
    ///
    /// # Errors
    /// Returns [`GraphError::DuplicateNode`] if `id` already exists, or
    /// [`GraphError::CycleDetected`] if any declared dependency can reach
    /// `id` through existing dependency edges.
    pub fn register(&mut self, id: &str, dependencies: &[String]) -> Result<(), GraphError> {
        if self.forward.contains_key(id) {
            return Err(GraphError::DuplicateNode(id.to_string()));
        }

        for dep in dependencies {
            if dep == id || self.reaches(dep, id) {
                return Err(GraphError::CycleDetected {
                    id: id.to_string(),
                    via: dep.clone(),
                });
            }
        }

        self.forward.insert(id.to_string(), dependencies.to_vec());
        self.reverse.entry(id.to_string()).or_default();
        for dep in dependencies {
            self.reverse
                .entry(dep.clone())
                .or_default()
                .insert(id.to_string());
        }
        Ok(())
    }

    /// Removes a node and all of its adjacency entries.
    ///
    /// # Errors
    /// Returns [`GraphError::NotRegistered`] if `id` is unknown, or
    /// [`GraphError::HasDependents`] while other nodes still depend on it.
    pub fn unregister(&mut self, id: &str) -> Result<(), GraphError> {
        let deps = self
            .forward
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::NotRegistered(id.to_string()))?;

        if let Some(dependents) = self.reverse.get(id) {
            if !dependents.is_empty() {
                return Err(GraphError::HasDependents {
                    id: id.to_string(),
                    dependents: dependents.iter().cloned().collect(),
                });
            }
        }

        self.forward.remove(id);
        self.reverse.remove(id);
        for dep in deps {
            if let Some(set) = self.reverse.get_mut(&dep) {
                set.remove(id);
                // Drop the slot for dangling ids nobody references anymore.
                if set.is_empty() && !self.forward.contains_key(&dep) {
                    self.reverse.remove(&dep);
                }
            }
        }
        Ok(())
    }

    /// Checks if a node is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.forward.contains_key(id)
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns true when no nodes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Returns the declared dependencies of a node.
    #[must_use]
    pub fn dependencies_of(&self, id: &str) -> Option<&[String]> {
        self.forward.get(id).map(Vec::as_slice)
    }

    /// Returns the registered dependents of a node, sorted.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.reverse
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns all transitive dependents of a node (excluding the node),
    /// breadth-first.
    #[must_use]
    pub fn transitive_dependents(&self, id: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<String> = self.dependents_of(id).into();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(self.dependents_of(&next));
            order.push(next);
        }
        order
    }

    /// Produces a dependency-first visitation order for the requested ids.
    ///
    /// Depth-first post-order over the induced subgraph: every dependency
    /// appears strictly before any of its dependents.
    ///
    /// # Errors
    /// Returns [`GraphError::NotRegistered`] if a requested id or any
    /// reachable dependency is not registered.
    pub fn topological_order(&self, ids: &[&str]) -> Result<Vec<String>, GraphError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut order = Vec::new();

        for id in ids {
            self.visit(id, &mut visited, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        id: &str,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        if visited.contains(id) {
            return Ok(());
        }
        let deps = self
            .forward
            .get(id)
            .ok_or_else(|| GraphError::NotRegistered(id.to_string()))?;

        visited.insert(id.to_string());
        for dep in deps {
            self.visit(dep, visited, order)?;
        }
        order.push(id.to_string());
        Ok(())
    }

    /// Returns true when `from` can reach `to` via dependency edges.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from.to_string()];
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(deps) = self.forward.get(&current) {
                stack.extend(deps.iter().cloned());
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn deps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_register_and_contains() {
        let mut g = DependencyGraph::new();
        g.register("a", &[]).unwrap();
        g.register("b", &deps(&["a"])).unwrap();

        assert!(g.contains("a"));
        assert!(g.contains("b"));
        assert_eq!(g.len(), 2);
        assert_eq!(g.dependencies_of("b").unwrap(), &["a".to_string()]);
        assert_eq!(g.dependents_of("a"), vec!["b".to_string()]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut g = DependencyGraph::new();
        g.register("a", &[]).unwrap();
        assert_eq!(
            g.register("a", &[]),
            Err(GraphError::DuplicateNode("a".to_string()))
        );
    }

    #[test]
    fn test_self_cycle_rejected() {
        let mut g = DependencyGraph::new();
        let err = g.register("a", &deps(&["a"])).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
        assert!(g.is_empty());
    }

    #[test]
    fn test_cycle_via_dangling_dependency_rejected() {
        let mut g = DependencyGraph::new();
        // "a" depends on not-yet-registered "b".
        g.register("a", &deps(&["b"])).unwrap();
        // Registering "b" depending on "a" would close the cycle.
        let err = g.register("b", &deps(&["a"])).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));

        // Graph unchanged: no partial edge insertion.
        assert!(!g.contains("b"));
        assert_eq!(g.dependents_of("a"), Vec::<String>::new());
    }

    #[test]
    fn test_longer_cycle_rejected() {
        let mut g = DependencyGraph::new();
        g.register("a", &[]).unwrap();
        g.register("b", &deps(&["a"])).unwrap();
        g.register("c", &deps(&["b"])).unwrap();
        // a -> c would close a <- b <- c.
        let mut g2 = DependencyGraph::new();
        g2.register("a", &deps(&["c"])).unwrap();
        g2.register("b", &deps(&["a"])).unwrap();
        let err = g2.register("c", &deps(&["b"])).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }

    #[test]
    fn test_unregister_guard() {
        let mut g = DependencyGraph::new();
        g.register("a", &[]).unwrap();
        g.register("b", &deps(&["a"])).unwrap();

        let err = g.unregister("a").unwrap_err();
        assert!(matches!(err, GraphError::HasDependents { .. }));

        g.unregister("b").unwrap();
        g.unregister("a").unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn test_unregister_unknown() {
        let mut g = DependencyGraph::new();
        assert_eq!(
            g.unregister("x"),
            Err(GraphError::NotRegistered("x".to_string()))
        );
    }

    #[test]
    fn test_topological_order_deps_first() {
        let mut g = DependencyGraph::new();
        g.register("a", &[]).unwrap();
        g.register("b", &deps(&["a"])).unwrap();
        g.register("c", &deps(&["a", "b"])).unwrap();

        let order = g.topological_order(&["c"]).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_topological_order_diamond() {
        let mut g = DependencyGraph::new();
        g.register("base", &[]).unwrap();
        g.register("left", &deps(&["base"])).unwrap();
        g.register("right", &deps(&["base"])).unwrap();
        g.register("top", &deps(&["left", "right"])).unwrap();

        let order = g.topological_order(&["top"]).unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("base") < pos("left"));
        assert!(pos("base") < pos("right"));
        assert!(pos("left") < pos("top"));
        assert!(pos("right") < pos("top"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_topological_order_dangling_dependency_fails() {
        let mut g = DependencyGraph::new();
        g.register("a", &deps(&["missing"])).unwrap();
        assert_eq!(
            g.topological_order(&["a"]),
            Err(GraphError::NotRegistered("missing".to_string()))
        );
    }

    #[test]
    fn test_transitive_dependents() {
        let mut g = DependencyGraph::new();
        g.register("a", &[]).unwrap();
        g.register("b", &deps(&["a"])).unwrap();
        g.register("c", &deps(&["b"])).unwrap();

        let mut all = g.transitive_dependents("a");
        all.sort();
        assert_eq!(all, vec!["b".to_string(), "c".to_string()]);
        assert!(g.transitive_dependents("c").is_empty());
    }

    proptest! {
        /// Registering nodes that only depend on already-registered nodes can
        /// never fail with a cycle, and the full topological order always
        /// places dependencies before dependents.
        #[test]
        fn prop_layered_registration_is_acyclic(edges in proptest::collection::vec(
            (0usize..24, 0usize..24), 0..60
        )) {
            let mut g = DependencyGraph::new();
            for i in 0..24usize {
                // Only allow edges to lower-numbered (already registered) nodes.
                let node_deps: Vec<String> = edges
                    .iter()
                    .filter(|(from, to)| *from == i && *to < i)
                    .map(|(_, to)| format!("n{to}"))
                    .collect();
                let name = format!("n{i}");
                prop_assert!(g.register(&name, &node_deps).is_ok());
            }

            let ids: Vec<String> = (0..24).map(|i| format!("n{i}")).collect();
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let order = g.topological_order(&id_refs).unwrap();
            prop_assert_eq!(order.len(), 24);

            for id in &ids {
                let pos = order.iter().position(|x| x == id).unwrap();
                for dep in g.dependencies_of(id).unwrap() {
                    let dep_pos = order.iter().position(|x| x == dep).unwrap();
                    prop_assert!(dep_pos < pos);
                }
            }
        }
    }
}
