// src/dag/levels.rs

//! Level assignment by iterative source stripping.
//!
//! Level 1 holds the graph's sources. Removing them exposes a new set of
//! sources, which become level 2, and so on until nothing is left. The
//! graph itself is never touched: stripping happens on a private arena of
//! task indices and in-degree counters built from an immutable borrow.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::dag::graph::DependencyGraph;
use crate::task::Task;

/// Scheduling tier of a task, starting at 1.
pub type Level = u32;

/// Assign every task in `graph` a level.
///
/// A task's level is one more than the highest level among its direct
/// dependencies, or 1 if it has none.
pub fn compute_levels(graph: &DependencyGraph) -> BTreeMap<Task, Level> {
    let nodes: Vec<&Task> = graph.tasks().collect();
    let index: HashMap<&Task, usize> = nodes.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];

    for (i, task) in nodes.iter().enumerate() {
        for dependent in graph.dependents_of(task) {
            if let Some(&j) = index.get(dependent) {
                dependents[i].push(j);
                in_degree[j] += 1;
            }
        }
    }

    let mut levels = BTreeMap::new();
    let mut sources: Vec<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut level: Level = 1;

    while !sources.is_empty() {
        debug!(level, tasks = sources.len(), "level assigned");

        let mut next = Vec::new();
        for &i in &sources {
            levels.insert(nodes[i].clone(), level);
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }

        sources = next;
        level += 1;
    }

    levels
}

/// Group a task → level assignment by level.
pub fn group_by_level(levels: &BTreeMap<Task, Level>) -> BTreeMap<Level, BTreeSet<Task>> {
    let mut grouped: BTreeMap<Level, BTreeSet<Task>> = BTreeMap::new();
    for (task, &level) in levels {
        grouped.entry(level).or_default().insert(task.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(loc: &str) -> Task {
        Task::with_environment(loc, "test-env").unwrap()
    }

    #[test]
    fn empty_graph_has_no_levels() {
        assert!(compute_levels(&DependencyGraph::new()).is_empty());
    }

    #[test]
    fn diamond_takes_the_longest_path() {
        // a -> b -> d, a -> c, c -> d, plus a shortcut a -> d
        let (a, b, c, d) = (task("a.py"), task("b.py"), task("c.py"), task("d.py"));
        let graph = DependencyGraph::from_dependencies([
            (b.clone(), vec![a.clone()]),
            (c.clone(), vec![a.clone()]),
            (d.clone(), vec![a.clone(), b.clone(), c.clone()]),
        ])
        .unwrap();

        let levels = compute_levels(&graph);
        assert_eq!(levels[&a], 1);
        assert_eq!(levels[&b], 2);
        assert_eq!(levels[&c], 2);
        assert_eq!(levels[&d], 3);
    }

    #[test]
    fn grouping_collects_tasks_per_level() {
        let (a, b, z) = (task("a.py"), task("b.py"), task("z.py"));
        let graph = DependencyGraph::from_parts([z.clone()], [(b.clone(), a.clone())]).unwrap();

        let grouped = group_by_level(&compute_levels(&graph));
        assert_eq!(
            grouped,
            BTreeMap::from([(1, BTreeSet::from([a, z])), (2, BTreeSet::from([b]))])
        );
    }

    #[test]
    fn graph_is_not_consumed() {
        let (a, b) = (task("a.py"), task("b.py"));
        let graph = DependencyGraph::from_dependencies([(b, a)]).unwrap();
        let before = graph.clone();
        let _ = compute_levels(&graph);
        assert_eq!(graph, before);
    }
}
