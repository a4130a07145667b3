// src/dag/graph.rs

use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use tracing::debug;

use crate::errors::{Result, RundagError};
use crate::task::Task;

static NO_TASKS: BTreeSet<Task> = BTreeSet::new();

/// Right-hand side of a dependency declaration: one task or a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependsOn {
    One(Task),
    Many(BTreeSet<Task>),
}

impl DependsOn {
    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            DependsOn::One(task) => vec![task],
            DependsOn::Many(tasks) => tasks.into_iter().collect(),
        }
    }
}

impl From<Task> for DependsOn {
    fn from(task: Task) -> Self {
        DependsOn::One(task)
    }
}

impl From<BTreeSet<Task>> for DependsOn {
    fn from(tasks: BTreeSet<Task>) -> Self {
        DependsOn::Many(tasks)
    }
}

impl From<Vec<Task>> for DependsOn {
    fn from(tasks: Vec<Task>) -> Self {
        DependsOn::Many(tasks.into_iter().collect())
    }
}

impl<const N: usize> From<[Task; N]> for DependsOn {
    fn from(tasks: [Task; N]) -> Self {
        DependsOn::Many(tasks.into_iter().collect())
    }
}

/// DFS colouring used by [`DependencyGraph::is_cyclic`]. Unvisited tasks have
/// no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

/// A set of tasks plus "must run after" edges between them.
///
/// `edges[u]` holds the tasks that directly depend on `u`, i.e. that may only
/// start once `u` has completed. The graph is acyclic at all times: every
/// mutation that would introduce a cycle is rejected and rolled back.
///
/// Edge sets are never left empty; a task with no dependents has no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    tasks: BTreeSet<Task>,
    edges: BTreeMap<Task, BTreeSet<Task>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk construction: equivalent to `add_tasks` followed by
    /// `add_dependencies`.
    pub fn from_parts<T, D, I>(tasks: T, dependencies: I) -> Result<Self>
    where
        T: IntoIterator<Item = Task>,
        D: Into<DependsOn>,
        I: IntoIterator<Item = (Task, D)>,
    {
        let mut graph = Self::new();
        graph.add_tasks(tasks);
        graph.add_dependencies(dependencies)?;
        Ok(graph)
    }

    /// Graph holding exactly the tasks named by `dependencies`.
    pub fn from_dependencies<D, I>(dependencies: I) -> Result<Self>
    where
        D: Into<DependsOn>,
        I: IntoIterator<Item = (Task, D)>,
    {
        let mut graph = Self::new();
        graph.add_dependencies(dependencies)?;
        Ok(graph)
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Add a task. Adding a known task is a no-op.
    pub fn add_task(&mut self, task: Task) {
        if self.tasks.insert(task) {
            debug!(tasks = self.tasks.len(), "task added to graph");
        }
    }

    pub fn add_tasks(&mut self, tasks: impl IntoIterator<Item = Task>) {
        for task in tasks {
            self.add_task(task);
        }
    }

    /// Remove a task together with every edge that mentions it.
    pub fn remove_task(&mut self, task: &Task) -> Result<()> {
        if !self.tasks.remove(task) {
            return Err(RundagError::Membership(task.command_line()));
        }

        self.edges.remove(task);
        self.edges.retain(|_, dependents| {
            dependents.remove(task);
            !dependents.is_empty()
        });

        debug!(task = %task, "task removed from graph");
        Ok(())
    }

    pub fn contains(&self, task: &Task) -> bool {
        self.tasks.contains(task)
    }

    /// All tasks, sorted by location.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    /// Declare that `task` must run after `depends_on`.
    ///
    /// Both tasks are added to the graph if needed. If the new edge closes a
    /// cycle, the edge and any task it added are removed again and
    /// [`RundagError::CyclicDependency`] is returned.
    pub fn add_dependency(&mut self, task: Task, depends_on: Task) -> Result<()> {
        let task_added = self.tasks.insert(task.clone());
        let dep_added = self.tasks.insert(depends_on.clone());
        let edge_added = self
            .edges
            .entry(depends_on.clone())
            .or_default()
            .insert(task.clone());

        if self.is_cyclic() {
            if edge_added {
                if let Some(dependents) = self.edges.get_mut(&depends_on) {
                    dependents.remove(&task);
                    if dependents.is_empty() {
                        self.edges.remove(&depends_on);
                    }
                }
            }
            if task_added {
                self.tasks.remove(&task);
            }
            if dep_added {
                self.tasks.remove(&depends_on);
            }

            return Err(RundagError::CyclicDependency {
                task: task.command_line(),
                depends_on: depends_on.command_line(),
            });
        }

        debug!(task = %task, depends_on = %depends_on, "dependency added");
        Ok(())
    }

    /// Apply a batch of dependency declarations.
    ///
    /// Each pair is checked as it is inserted, but the batch is all or
    /// nothing: the pairs are applied to a trial copy, and the graph is only
    /// replaced once every pair succeeded.
    pub fn add_dependencies<D, I>(&mut self, dependencies: I) -> Result<()>
    where
        D: Into<DependsOn>,
        I: IntoIterator<Item = (Task, D)>,
    {
        let mut trial = self.clone();
        for (task, depends_on) in dependencies {
            for dep in depends_on.into().into_tasks() {
                trial.add_dependency(task.clone(), dep)?;
            }
        }
        *self = trial;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Adjacency of tasks that have at least one dependent.
    pub fn downstream(&self) -> BTreeMap<Task, BTreeSet<Task>> {
        self.edges
            .iter()
            .filter(|(_, dependents)| !dependents.is_empty())
            .map(|(task, dependents)| (task.clone(), dependents.clone()))
            .collect()
    }

    /// Inverse of [`downstream`](Self::downstream): each task that has
    /// dependencies, mapped to those dependencies.
    pub fn upstream(&self) -> BTreeMap<Task, BTreeSet<Task>> {
        let mut upstream: BTreeMap<Task, BTreeSet<Task>> = BTreeMap::new();
        for (task, dependents) in self.downstream() {
            for dependent in dependents {
                upstream.entry(dependent).or_default().insert(task.clone());
            }
        }
        upstream
    }

    /// Tasks with no dependencies.
    pub fn sources(&self) -> BTreeSet<Task> {
        let has_upstream: BTreeSet<&Task> = self.edges.values().flatten().collect();
        self.tasks
            .iter()
            .filter(|t| !has_upstream.contains(t))
            .cloned()
            .collect()
    }

    /// Tasks nothing depends on.
    pub fn sinks(&self) -> BTreeSet<Task> {
        self.tasks
            .iter()
            .filter(|t| self.dependents_of(t).next().is_none())
            .cloned()
            .collect()
    }

    /// Tasks that directly depend on `task`.
    pub fn dependents_of(&self, task: &Task) -> btree_set::Iter<'_, Task> {
        self.edges.get(task).unwrap_or(&NO_TASKS).iter()
    }

    /// Tasks `task` directly depends on.
    pub fn dependencies_of(&self, task: &Task) -> BTreeSet<&Task> {
        self.edges
            .iter()
            .filter(|(_, dependents)| dependents.contains(task))
            .map(|(dep, _)| dep)
            .collect()
    }

    /// Depth-first search with three-colour marking. Returns `true` as soon
    /// as an edge back to a task on the current path is found.
    pub fn is_cyclic(&self) -> bool {
        let mut marks: HashMap<&Task, Mark> = HashMap::with_capacity(self.tasks.len());

        for root in &self.tasks {
            if marks.contains_key(root) {
                continue;
            }

            marks.insert(root, Mark::OnStack);
            let mut stack = vec![(root, self.dependents_of(root))];

            loop {
                let Some((node, children)) = stack.last_mut() else {
                    break;
                };
                let node: &Task = *node;

                match children.next() {
                    Some(child) => match marks.get(child) {
                        Some(Mark::OnStack) => return true,
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child, Mark::OnStack);
                            stack.push((child, self.dependents_of(child)));
                        }
                    },
                    None => {
                        marks.insert(node, Mark::Done);
                        stack.pop();
                    }
                }
            }
        }

        false
    }

    /// Render the graph in Graphviz DOT format. Edges point from a task to
    /// the tasks that depend on it.
    pub fn to_dot(&self) -> String {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index = HashMap::with_capacity(self.tasks.len());

        for task in &self.tasks {
            index.insert(task, graph.add_node(task.location()));
        }
        for (task, dependents) in &self.edges {
            for dependent in dependents {
                if let (Some(&from), Some(&to)) = (index.get(task), index.get(dependent)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.tasks.iter().map(Task::to_string).collect();
        write!(f, "DependencyGraph({{{}}})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(loc: &str) -> Task {
        Task::with_environment(loc, "test-env").unwrap()
    }

    fn abc() -> (Task, Task, Task) {
        (task("A.py"), task("B.py"), task("C.py"))
    }

    #[test]
    fn add_and_remove_tasks() {
        let (a, b, _) = abc();
        let mut g = DependencyGraph::new();
        g.add_tasks([a.clone(), b.clone()]);
        g.add_task(a.clone());
        assert_eq!(g.len(), 2);

        g.remove_task(&a).unwrap();
        assert_eq!(g.tasks().collect::<Vec<_>>(), vec![&b]);
    }

    #[test]
    fn removing_unknown_task_is_membership_error() {
        let (a, _, _) = abc();
        let mut g = DependencyGraph::new();
        assert!(matches!(g.remove_task(&a), Err(RundagError::Membership(_))));
    }

    #[test]
    fn add_dependency_records_downstream_edge() {
        let (a, b, _) = abc();
        let mut g = DependencyGraph::new();
        g.add_dependency(b.clone(), a.clone()).unwrap();

        assert!(g.contains(&a) && g.contains(&b));
        assert_eq!(g.downstream(), BTreeMap::from([(a.clone(), BTreeSet::from([b.clone()]))]));
        assert_eq!(g.upstream(), BTreeMap::from([(b.clone(), BTreeSet::from([a.clone()]))]));
        assert_eq!(g.sources(), BTreeSet::from([a.clone()]));
        assert_eq!(g.sinks(), BTreeSet::from([b.clone()]));
    }

    #[test]
    fn two_task_cycle_is_rejected_and_rolled_back() {
        let (a, b, _) = abc();
        let mut g = DependencyGraph::new();
        g.add_dependency(b.clone(), a.clone()).unwrap();
        let before = g.clone();

        let err = g.add_dependency(a.clone(), b.clone()).unwrap_err();
        assert!(matches!(err, RundagError::CyclicDependency { .. }));
        assert_eq!(g, before);
        assert!(!g.is_cyclic());
    }

    #[test]
    fn self_dependency_is_rejected_without_adding_the_task() {
        let (a, _, _) = abc();
        let mut g = DependencyGraph::new();
        assert!(g.add_dependency(a.clone(), a.clone()).is_err());
        assert!(g.is_empty());
    }

    #[test]
    fn three_task_cycle_fails_on_the_closing_edge() {
        let (a, b, c) = abc();
        let mut g = DependencyGraph::new();
        g.add_dependency(a.clone(), c.clone()).unwrap();
        g.add_dependency(b.clone(), a.clone()).unwrap();

        match g.add_dependency(c.clone(), b.clone()) {
            Err(RundagError::CyclicDependency { task, depends_on }) => {
                assert_eq!(task, "test-env C.py");
                assert_eq!(depends_on, "test-env B.py");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn add_dependencies_accepts_single_tasks_and_sets() {
        let (a, b, c) = abc();
        let mut g = DependencyGraph::new();
        g.add_dependencies([(b.clone(), DependsOn::from(a.clone()))]).unwrap();
        assert_eq!(g.dependents_of(&a).collect::<Vec<_>>(), vec![&b]);

        let mut g = DependencyGraph::new();
        g.add_dependencies([(c.clone(), [a.clone(), b.clone()])]).unwrap();
        assert_eq!(g.dependents_of(&a).collect::<Vec<_>>(), vec![&c]);
        assert_eq!(g.dependents_of(&b).collect::<Vec<_>>(), vec![&c]);
        assert_eq!(g.dependencies_of(&c), BTreeSet::from([&a, &b]));
    }

    #[test]
    fn cyclic_batch_leaves_graph_untouched() {
        let (a, b, c) = abc();
        let z = task("Z.py");
        let mut g = DependencyGraph::new();
        g.add_task(z.clone());
        let before = g.clone();

        let err = g
            .add_dependencies([
                (a.clone(), c.clone()),
                (b.clone(), a.clone()),
                (c.clone(), b.clone()),
            ])
            .unwrap_err();
        assert!(matches!(err, RundagError::CyclicDependency { .. }));
        assert_eq!(g, before);
    }

    #[test]
    fn remove_task_cascades_through_edges() {
        let (a, b, c) = abc();
        let mut g =
            DependencyGraph::from_dependencies([(b.clone(), a.clone()), (c.clone(), b.clone())])
                .unwrap();

        g.remove_task(&b).unwrap();
        assert!(g.downstream().is_empty());
        assert_eq!(g.sources(), BTreeSet::from([a.clone(), c.clone()]));
        assert_eq!(g.sinks(), BTreeSet::from([a, c]));
    }

    #[test]
    fn errors_name_tasks_by_full_command_line() {
        let etl = task("etl/run.py");
        let report = task("report/run.py");
        let mut g = DependencyGraph::new();
        g.add_dependency(report.clone(), etl.clone()).unwrap();

        let err = g.add_dependency(etl.clone(), report.clone()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Adding the dependency `test-env report/run.py` -> `test-env etl/run.py` introduced a cycle"
        );

        let other_env = Task::with_environment("etl/run.py", "python3").unwrap();
        let err = g.remove_task(&other_env).unwrap_err();
        assert_eq!(err.to_string(), "`python3 etl/run.py` is not in the graph");
    }

    #[test]
    fn display_lists_tasks_in_order() {
        let (a, b, _) = abc();
        let g = DependencyGraph::from_parts([b, a], Vec::<(Task, Task)>::new()).unwrap();
        assert_eq!(g.to_string(), "DependencyGraph({Task(A.py), Task(B.py)})");
        assert_eq!(DependencyGraph::new().to_string(), "DependencyGraph({})");
    }

    #[test]
    fn dot_output_contains_edges() {
        let (a, b, _) = abc();
        let g = DependencyGraph::from_dependencies([(b, a)]).unwrap();
        let dot = g.to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("A.py"));
        assert!(dot.contains("0 -> 1"));
    }
}
