//! Dependency executor
//!
//! Runs every task of a [`ResourceGraph`] once, in dependency order, with a
//! bounded number of tasks in flight. A task only starts after all of its
//! dependencies finished successfully; when a task fails, everything that
//! depends on it (directly or not) fails without starting while independent
//! parts of the graph carry on.

use crate::action::{ActionType, RunReport, TaskOutcome};
use crate::config::ExecutorConfig;
use crate::context::RunContext;
use crate::error::{CloudError, Result};
use crate::task::{Task, TaskKey, TaskNode, TaskRef};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Tasks of one run, keyed by kind and name
pub struct ResourceGraph<C> {
    tasks: BTreeMap<TaskKey, Arc<dyn TaskNode<C>>>,
}

impl<C: Send + Sync + 'static> ResourceGraph<C> {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Register a task and get the handle other tasks reference it by
    pub fn add<T: Task<C>>(&mut self, task: T) -> Result<TaskRef<T>> {
        let task = TaskRef::new(task);
        self.add_ref(task.clone())?;
        Ok(task)
    }

    pub fn add_ref<T: Task<C>>(&mut self, task: TaskRef<T>) -> Result<()> {
        let key = task.key();
        if self.tasks.contains_key(&key) {
            return Err(CloudError::DuplicateTask(key));
        }
        self.tasks.insert(key, Arc::new(task));
        Ok(())
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Dependency sets, rejecting references to unregistered tasks
    fn dependencies(&self) -> Result<BTreeMap<TaskKey, BTreeSet<TaskKey>>> {
        let mut deps = BTreeMap::new();
        for (key, node) in &self.tasks {
            let set: BTreeSet<TaskKey> = node.dependencies().into_iter().collect();
            if let Some(missing) = set.iter().find(|d| !self.tasks.contains_key(*d)) {
                return Err(CloudError::UnknownDependency {
                    task: key.clone(),
                    dependency: missing.clone(),
                });
            }
            deps.insert(key.clone(), set);
        }
        Ok(deps)
    }

    /// Kahn order; ties broken by key so the order is stable
    pub fn topological_order(&self) -> Result<Vec<TaskKey>> {
        let deps = self.dependencies()?;
        let dependents = dependents(&deps);

        let mut indegree: BTreeMap<&TaskKey, usize> =
            deps.iter().map(|(key, set)| (key, set.len())).collect();
        let mut ready: BTreeSet<&TaskKey> = indegree
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(key, _)| *key)
            .collect();

        let mut order = Vec::with_capacity(deps.len());
        while let Some(key) = ready.pop_first() {
            order.push(key.clone());
            for dependent in dependents.get(key).into_iter().flatten() {
                if let Some(n) = indegree.get_mut(dependent) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() < deps.len() {
            let stuck = indegree
                .into_iter()
                .find(|(_, n)| *n > 0)
                .map(|(key, _)| key.clone());
            if let Some(key) = stuck {
                return Err(CloudError::DependencyCycle(key));
            }
        }
        Ok(order)
    }
}

impl<C: Send + Sync + 'static> Default for ResourceGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn dependents(deps: &BTreeMap<TaskKey, BTreeSet<TaskKey>>) -> BTreeMap<&TaskKey, Vec<&TaskKey>> {
    let mut out: BTreeMap<&TaskKey, Vec<&TaskKey>> = BTreeMap::new();
    for (key, set) in deps {
        for dep in set {
            out.entry(dep).or_default().push(key);
        }
    }
    out
}

/// Runs a resource graph against one render target
#[derive(Debug, Clone)]
pub struct Executor {
    max_concurrency: usize,
}

impl Executor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self::with_max_concurrency(config.max_concurrency)
    }

    pub fn with_max_concurrency(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run every task once
    ///
    /// Returns `Err` only when the graph itself is invalid (cycle or unknown
    /// dependency), before any task started. Task failures are reported per
    /// task in the [`RunReport`].
    pub async fn run<C>(&self, graph: &ResourceGraph<C>, ctx: RunContext<C>) -> Result<RunReport>
    where
        C: Send + Sync + 'static,
    {
        let order = graph.topological_order()?;
        let deps = graph.dependencies()?;
        let dependents = dependents(&deps);

        let mut report = RunReport::new();
        let started = Instant::now();
        tracing::info!(
            "Running {} tasks (max concurrency {})",
            order.len(),
            self.max_concurrency
        );

        let mut pending: BTreeMap<&TaskKey, usize> =
            deps.iter().map(|(key, set)| (key, set.len())).collect();
        let mut ready: VecDeque<&TaskKey> =
            order.iter().filter(|key| pending[key] == 0).collect();
        let mut in_flight: JoinSet<(TaskKey, Result<Option<ActionType>>)> = JoinSet::new();

        loop {
            while in_flight.len() < self.max_concurrency {
                let Some(key) = ready.pop_front() else {
                    break;
                };
                if ctx.cancel.is_cancelled() {
                    tracing::debug!("{} not started: run cancelled", key);
                    report.outcomes.insert(key.clone(), TaskOutcome::Cancelled);
                    continue;
                }
                let Some(node) = graph.tasks.get(key) else {
                    continue;
                };

                tracing::debug!("Starting {}", key);
                let node = Arc::clone(node);
                let ctx = ctx.clone();
                let key = key.clone();
                in_flight.spawn(async move {
                    let result = AssertUnwindSafe(node.run(&ctx))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| {
                            Err(CloudError::TaskPanicked {
                                task: key.clone(),
                                message: panic_message(payload.as_ref()),
                            })
                        });
                    (key, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let (key, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!("Task join failed: {}", e);
                    continue;
                }
            };

            match result {
                Ok(None) => {
                    tracing::debug!("{} cancelled during discovery", key);
                    report.outcomes.insert(key, TaskOutcome::Cancelled);
                }
                Ok(Some(action)) => {
                    tracing::info!("{} finished: {}", key, action);
                    for dependent in dependents.get(&key).into_iter().flatten() {
                        if report.outcomes.contains_key(*dependent) {
                            continue;
                        }
                        if let Some(n) = pending.get_mut(dependent) {
                            *n -= 1;
                            if *n == 0 {
                                ready.push_back(*dependent);
                            }
                        }
                    }
                    report.outcomes.insert(key, TaskOutcome::Done(action));
                }
                Err(err) => {
                    tracing::error!("{} failed: {}", key, err);
                    fail_dependents(&key, &dependents, &mut report);
                    report.outcomes.insert(key, TaskOutcome::Failed(Arc::new(err)));
                }
            }
        }

        for key in order {
            report.outcomes.entry(key).or_insert(TaskOutcome::Cancelled);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Run finished in {}ms: {}", report.duration_ms, report.summary());
        Ok(report)
    }
}

/// Mark everything downstream of `failed` as failed through its dependency
fn fail_dependents(
    failed: &TaskKey,
    dependents: &BTreeMap<&TaskKey, Vec<&TaskKey>>,
    report: &mut RunReport,
) {
    let mut queue = VecDeque::from([failed.clone()]);
    while let Some(parent) = queue.pop_front() {
        for dependent in dependents.get(&parent).into_iter().flatten() {
            if report.outcomes.contains_key(*dependent) {
                continue;
            }
            tracing::warn!("{} not started: dependency {} failed", dependent, parent);
            report.outcomes.insert(
                (*dependent).clone(),
                TaskOutcome::Failed(Arc::new(CloudError::DependencyFailed {
                    task: (*dependent).clone(),
                    dependency: parent.clone(),
                })),
            );
            queue.push_back((*dependent).clone());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
