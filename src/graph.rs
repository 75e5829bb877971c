//! Class reference graph and reachability.
//!
//! Nodes are binary class names and edges run from a referencing class to each class it
//! names, including the owners of referenced methods and fields. Reachability is computed
//! once, with a breadth-first search from every class of the entry-point entries.

use crate::classpath::ClasspathEntry;
use crate::error::CheckerError;
use crate::symbols::SymbolReferences;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ClassReferenceGraph {
    edges: HashMap<String, HashSet<String>>,
    reachable: HashSet<String>,
}

impl ClassReferenceGraph {
    pub fn build(
        references: &SymbolReferences,
        entry_points: &[Arc<ClasspathEntry>],
    ) -> Result<Self, CheckerError> {
        let edges = references.iter().flat_map(|(source, symbols)| {
            symbols
                .iter()
                .map(move |symbol| (source.binary_name(), symbol.class_name()))
        });
        let mut seeds = Vec::new();
        for entry in entry_points {
            seeds.extend(entry.class_names()?.iter().cloned());
        }
        let graph = Self::from_edges(edges, seeds);
        info!(
            nodes = graph.edges.len(),
            reachable = graph.reachable.len(),
            "Built class reference graph"
        );
        Ok(graph)
    }

    /// Builds the graph from raw edges and computes reachability from `seeds`.
    pub fn from_edges<'a>(
        edges: impl IntoIterator<Item = (&'a str, &'a str)>,
        seeds: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut graph = ClassReferenceGraph::default();
        for (source, target) in edges {
            graph.edges.entry(target.to_string()).or_default();
            let targets = graph.edges.entry(source.to_string()).or_default();
            if source != target {
                targets.insert(target.to_string());
            }
        }
        let seeds: Vec<String> = seeds.into_iter().collect();
        for seed in &seeds {
            graph.edges.entry(seed.clone()).or_default();
        }
        graph.reachable = graph.compute_reachable(seeds);
        graph
    }

    fn compute_reachable(&self, seeds: Vec<String>) -> HashSet<String> {
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::new();

        for seed in seeds {
            if reachable.insert(seed.clone()) {
                queue.push_back(seed);
            }
        }

        while let Some(current) = queue.pop_front() {
            let Some(targets) = self.edges.get(&current) else {
                continue;
            };
            for target in targets {
                if reachable.insert(target.clone()) {
                    queue.push_back(target.clone());
                }
            }
        }
        reachable
    }

    pub fn is_reachable(&self, class_name: &str) -> bool {
        self.reachable.contains(class_name)
    }

    pub fn reachable_classes(&self) -> &HashSet<String> {
        &self.reachable
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.edges.contains_key(class_name)
    }

    pub fn targets(&self, class_name: &str) -> Option<&HashSet<String>> {
        self.edges.get(class_name)
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)], seeds: &[&str]) -> ClassReferenceGraph {
        ClassReferenceGraph::from_edges(
            edges.iter().copied(),
            seeds.iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn reachability_follows_edges() {
        let g = graph(&[("a.A", "b.B"), ("b.B", "c.C"), ("d.D", "a.A")], &["a.A"]);
        assert!(g.is_reachable("a.A"));
        assert!(g.is_reachable("b.B"));
        assert!(g.is_reachable("c.C"));
        assert!(!g.is_reachable("d.D"));
    }

    #[test]
    fn self_loops_are_dropped() {
        let g = graph(&[("a.A", "a.A")], &[]);
        assert!(g.targets("a.A").unwrap().is_empty());
    }

    #[test]
    fn isolated_seeds_become_nodes() {
        let g = graph(&[], &["lonely.Class"]);
        assert!(g.contains("lonely.Class"));
        assert!(g.is_reachable("lonely.Class"));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn cycles_terminate() {
        let g = graph(&[("a.A", "b.B"), ("b.B", "a.A")], &["b.B"]);
        assert_eq!(g.reachable_classes().len(), 2);
    }
}
