#![allow(dead_code)]

use rundag::{DependencyGraph, DependsOn, Task};

/// Task with the `test-env` environment, the way most tests spell them.
pub fn task(loc: &str) -> Task {
    Task::with_environment(loc, "test-env").expect("valid test task")
}

/// Builder for `DependencyGraph` to simplify test setup.
///
/// Panics on cycles; tests that expect a cycle should call
/// `DependencyGraph::add_dependency` directly.
pub struct GraphBuilder {
    graph: DependencyGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: DependencyGraph::new(),
        }
    }

    pub fn with_task(mut self, loc: &str) -> Self {
        self.graph.add_task(task(loc));
        self
    }

    /// `loc` runs after every entry of `after`.
    pub fn with_deps(mut self, loc: &str, after: &[&str]) -> Self {
        let deps: Vec<Task> = after.iter().map(|d| task(d)).collect();
        self.graph
            .add_dependencies([(task(loc), DependsOn::from(deps))])
            .expect("builder dependencies must be acyclic");
        self
    }

    pub fn build(self) -> DependencyGraph {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
