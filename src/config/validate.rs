// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::graph::DependencyGraph;
use crate::errors::{Result, RundagError};
use crate::task::{CommonTask, Task, DEFAULT_ENVIRONMENT};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RundagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        validate_global_config(&raw)?;
        validate_task_dependencies(&raw)?;
        let tasks = resolve_tasks(&raw)?;
        let graph = build_graph(&raw, &tasks)?;
        Ok(ConfigFile::new_validated(raw, tasks, graph))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(RundagError::Config(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    // policy / in_flight are strongly typed and checked during
    // deserialization.
    if cfg.config.max_parallel == Some(0) {
        return Err(RundagError::Config(
            "[config].max_parallel must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(RundagError::Config(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(RundagError::Config(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Turn every `[task.<name>]` into a [`Task`], applying `[default]`.
fn resolve_tasks(cfg: &RawConfigFile) -> Result<BTreeMap<String, Task>> {
    let default_env = cfg.default.env.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
    let mut resolved: BTreeMap<String, Task> = BTreeMap::new();

    for (name, tc) in cfg.task.iter() {
        let env = tc.env.as_deref().unwrap_or(default_env);
        let task = match cfg.default.loc_template.as_deref() {
            Some(template) => {
                CommonTask::new(template, env).and_then(|common| common.task(&tc.loc))
            }
            None => Task::with_environment(tc.loc.as_str(), env),
        }
        .map_err(|e| RundagError::Config(format!("task '{name}': {e}")))?;

        if let Some((other, _)) = resolved.iter().find(|(_, t)| **t == task) {
            return Err(RundagError::Config(format!(
                "tasks '{other}' and '{name}' both resolve to `{}`",
                task.command_line()
            )));
        }
        resolved.insert(name.clone(), task);
    }

    Ok(resolved)
}

/// Build the graph through `add_dependency` so cycles are reported with the
/// offending pair.
fn build_graph(cfg: &RawConfigFile, tasks: &BTreeMap<String, Task>) -> Result<DependencyGraph> {
    let mut graph = DependencyGraph::new();
    graph.add_tasks(tasks.values().cloned());

    for (name, tc) in cfg.task.iter() {
        let task = lookup(tasks, name)?;
        for dep in tc.after.iter() {
            graph.add_dependency(task.clone(), lookup(tasks, dep)?.clone())?;
        }
    }

    Ok(graph)
}

fn lookup<'a>(tasks: &'a BTreeMap<String, Task>, name: &str) -> Result<&'a Task> {
    tasks
        .get(name)
        .ok_or_else(|| RundagError::Config(format!("unknown task '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{ConfigSection, DefaultSection, TaskConfig};

    fn tc(loc: &str, after: &[&str]) -> TaskConfig {
        TaskConfig {
            loc: loc.to_string(),
            env: None,
            after: after.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn raw(tasks: Vec<(&str, TaskConfig)>) -> RawConfigFile {
        RawConfigFile {
            config: ConfigSection::default(),
            default: DefaultSection::default(),
            task: tasks
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
        }
    }

    #[test]
    fn empty_config_is_rejected() {
        let err = ConfigFile::try_from(raw(vec![])).unwrap_err();
        assert!(matches!(err, RundagError::Config(_)));
    }

    #[test]
    fn zero_max_parallel_is_rejected() {
        let mut cfg = raw(vec![("a", tc("a.py", &[]))]);
        cfg.config.max_parallel = Some(0);
        assert!(matches!(ConfigFile::try_from(cfg), Err(RundagError::Config(_))));
    }

    #[test]
    fn defaults_apply_to_tasks() {
        let mut cfg = raw(vec![("a", tc("a.py", &[])), ("b", tc("b.py", &["a"]))]);
        cfg.default.env = Some("python3".to_string());
        cfg.default.loc_template = Some("tasks/{}".to_string());
        cfg.task.get_mut("b").unwrap().env = Some("pypy".to_string());

        let cfg = ConfigFile::try_from(cfg).unwrap();
        let a = cfg.task_named("a").unwrap();
        let b = cfg.task_named("b").unwrap();
        assert_eq!(a.location(), "tasks/a.py");
        assert_eq!(a.environment(), "python3");
        assert_eq!(b.environment(), "pypy");
        assert_eq!(cfg.graph().dependencies_of(b).into_iter().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let mut cfg = raw(vec![("a", tc("a.py", &[]))]);
        cfg.default.loc_template = Some("tasks/".to_string());
        assert!(matches!(ConfigFile::try_from(cfg), Err(RundagError::Config(_))));
    }

    #[test]
    fn duplicate_resolved_tasks_are_rejected() {
        let cfg = raw(vec![("a", tc("same.py", &[])), ("b", tc("same.py", &[]))]);
        let err = ConfigFile::try_from(cfg).unwrap_err();
        assert!(err.to_string().contains("both resolve to"));
    }

    #[test]
    fn cycles_surface_as_cyclic_dependency() {
        let cfg = raw(vec![("a", tc("a.py", &["b"])), ("b", tc("b.py", &["a"]))]);
        assert!(matches!(
            ConfigFile::try_from(cfg),
            Err(RundagError::CyclicDependency { .. })
        ));
    }
}
