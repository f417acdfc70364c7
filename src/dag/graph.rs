// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::model::TaskId;

/// Adjacency of the "on success, trigger" relation between tasks.
///
/// Edge direction: parent -> dependent. Cycles are allowed (nothing stops
/// them at runtime), so unlike a build DAG this graph is only used for
/// diagnostics: listing dependents and warning about loops.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// parent -> dependents, restricted to known tasks.
    edges: BTreeMap<TaskId, BTreeSet<TaskId>>,
    /// (parent, dependent) pairs naming a task that does not exist.
    unknown: Vec<(TaskId, TaskId)>,
}

impl DependencyGraph {
    /// Build from `(task id, dependent ids)` pairs.
    pub fn from_edges<'a, I, D>(tasks: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let tasks: Vec<(&str, Vec<&str>)> = tasks
            .into_iter()
            .map(|(id, deps)| (id, deps.into_iter().collect()))
            .collect();

        let mut edges: BTreeMap<TaskId, BTreeSet<TaskId>> = tasks
            .iter()
            .map(|(id, _)| (id.to_string(), BTreeSet::new()))
            .collect();
        let mut unknown = Vec::new();

        for (id, deps) in tasks.iter() {
            for dep in deps {
                if edges.contains_key(*dep) {
                    if let Some(out) = edges.get_mut(*id) {
                        out.insert(dep.to_string());
                    }
                } else {
                    unknown.push((id.to_string(), dep.to_string()));
                }
            }
        }

        Self { edges, unknown }
    }

    /// Immediate dependents of a task (known tasks only).
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Dependent references that name no known task.
    pub fn unknown_dependents(&self) -> &[(TaskId, TaskId)] {
        &self.unknown
    }

    /// Groups of tasks that trigger each other in a loop, each sorted, plus
    /// any task listing itself as a dependent.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (parent, deps) in self.edges.iter() {
            graph.add_node(parent.as_str());
            for dep in deps {
                graph.add_edge(parent.as_str(), dep.as_str(), ());
            }
        }

        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut ids: Vec<TaskId> = scc.into_iter().map(str::to_string).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&'static str, &[&'static str])]) -> DependencyGraph {
        DependencyGraph::from_edges(edges.iter().map(|(id, deps)| (*id, deps.iter().copied())))
    }

    #[test]
    fn dependents_are_sorted_and_known_only() {
        let g = graph(&[("A", &["B", "C"]), ("B", &["C"]), ("C", &[])]);
        assert_eq!(g.dependents_of("A"), vec!["B", "C"]);
        assert_eq!(g.dependents_of("B"), vec!["C"]);
        assert!(g.dependents_of("missing").is_empty());
        assert!(g.cycles().is_empty());
    }

    #[test]
    fn unknown_dependents_are_reported_not_linked() {
        let g = graph(&[("A", &["B", "nope"]), ("B", &[])]);
        assert_eq!(g.dependents_of("A"), vec!["B"]);
        assert_eq!(
            g.unknown_dependents(),
            &[("A".to_string(), "nope".to_string())]
        );
    }

    #[test]
    fn finds_loops_and_self_dependency() {
        let g = graph(&[
            ("A", &["B"]),
            ("B", &["C"]),
            ("C", &["A"]),
            ("D", &["D"]),
            ("E", &[]),
        ]);
        assert_eq!(
            g.cycles(),
            vec![
                vec!["A".to_string(), "B".to_string(), "C".to_string()],
                vec!["D".to_string()],
            ]
        );
    }
}
