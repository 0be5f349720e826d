//! Package dependency graph with cycle detection and ordering.
//!
//! Edges point from dependent to dependency: if A depends on B, the edge is
//! `A -> B`.
//!
//! # Example
//!
//! ```
//! use depsync_resolve::graph::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("app");
//! graph.add_node("log");
//! graph.add_edge("app", "log");
//!
//! assert_eq!(graph.topological_order().unwrap(), vec!["log", "app"]);
//! assert!(graph.find_cycle().is_none());
//! ```

use std::collections::{BTreeMap, BTreeSet};

/// Directed graph of package names.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Adjacency list: key depends on each value.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<String>) {
        self.edges.entry(id.into()).or_default();
    }

    /// Declare that `from` depends on `to`. Missing nodes are created.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges.entry(to.to_string()).or_default();
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Direct dependencies of a node, sorted.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every node reachable from `id`, including `id` itself.
    pub fn reachable_from(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for dep in self.dependencies_of(&current) {
                if !seen.contains(dep) {
                    stack.push(dep.to_string());
                }
            }
        }
        seen
    }

    /// Find a cycle by depth-first search from each node in sorted order.
    ///
    /// The returned path starts and ends with the same node, e.g.
    /// `["a", "b", "a"]`.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Active,
            Done,
        }

        fn visit<'g>(
            graph: &'g DependencyGraph,
            node: &'g str,
            marks: &mut BTreeMap<&'g str, Mark>,
            stack: &mut Vec<&'g str>,
        ) -> Option<Vec<String>> {
            match marks.get(node) {
                Some(Mark::Done) => return None,
                Some(Mark::Active) => {
                    let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|n| (*n).to_string()).collect();
                    path.push(node.to_string());
                    return Some(path);
                }
                None => {}
            }

            marks.insert(node, Mark::Active);
            stack.push(node);
            for dep in graph.dependencies_of(node) {
                if let Some(path) = visit(graph, dep, marks, stack) {
                    return Some(path);
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        self.edges
            .keys()
            .find_map(|node| visit(self, node, &mut marks, &mut stack))
    }

    /// Kahn's algorithm, dependencies first. Among ready nodes the
    /// alphabetically smallest goes first.
    ///
    /// Returns the cycle from [`find_cycle`](Self::find_cycle) as the error.
    pub fn topological_order(&self) -> Result<Vec<&str>, Vec<String>> {
        let mut remaining: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.len()))
            .collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, deps) in &self.edges {
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(from.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.edges.len());

        while let Some(current) = ready.pop_first() {
            order.push(current);
            for from in dependents.get(current).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(from) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*from);
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            return Err(self.find_cycle().unwrap_or_default());
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.find_cycle().is_none());
        assert!(graph.topological_order().unwrap().is_empty());
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("top", "a");
        graph.add_edge("top", "b");
        graph.add_edge("a", "base");
        graph.add_edge("b", "base");

        assert!(graph.find_cycle().is_none());
        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec!["base", "a", "b", "top"]);
    }

    #[test]
    fn test_cycle_path() {
        let mut graph = DependencyGraph::new();
        graph.add_node("root");
        graph.add_edge("root", "x");
        graph.add_edge("x", "y");
        graph.add_edge("y", "x");

        assert_eq!(
            graph.find_cycle().unwrap(),
            vec!["x".to_string(), "y".to_string(), "x".to_string()]
        );
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn test_self_loop() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "a");
        assert_eq!(graph.find_cycle().unwrap(), vec!["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_dependencies_and_reachability() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("multi", "b");
        graph.add_edge("multi", "a");
        graph.add_edge("a", "c");
        graph.add_node("lonely");

        assert_eq!(graph.dependencies_of("multi"), vec!["a", "b"]);
        assert!(graph.dependencies_of("c").is_empty());
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(
            graph.reachable_from("multi"),
            ["a", "b", "c", "multi"].iter().map(|s| s.to_string()).collect()
        );
        assert!(!graph.reachable_from("multi").contains("lonely"));
    }
}
