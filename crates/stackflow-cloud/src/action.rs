//! Action and run result types

use crate::error::CloudError;
use crate::task::TaskKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a task did (or would do) to its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Resource did not exist and was created
    Create,
    /// Resource existed and differed from the desired state
    Update,
    /// Resource already matched
    NoOp,
    /// Shared resource; read only
    Skip,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::NoOp => write!(f, "no-op"),
            ActionType::Skip => write!(f, "skip"),
        }
    }
}

/// A planned change recorded by a dry run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub task: TaskKey,
    pub action_type: ActionType,
    /// Names of the fields in the changes record
    pub changed_fields: Vec<String>,
}

/// Plan produced by a dry run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Actions ordered by task key
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(mut actions: Vec<Action>) -> Self {
        actions.sort_by(|a, b| a.task.cmp(&b.task));
        let has_changes = actions
            .iter()
            .any(|a| matches!(a.action_type, ActionType::Create | ActionType::Update));
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }
}

/// Terminal state of a task after a run
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Done(ActionType),
    Failed(Arc<CloudError>),
    /// Run cancelled before the task started or while it was discovering
    Cancelled,
}

impl TaskOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn error(&self) -> Option<&CloudError> {
        match self {
            Self::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    pub fn action(&self) -> Option<ActionType> {
        match self {
            Self::Done(action) => Some(*action),
            _ => None,
        }
    }
}

/// Result of an executor run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Outcome of every task in the graph
    pub outcomes: BTreeMap<TaskKey, TaskOutcome>,

    pub started_at: DateTime<Utc>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            outcomes: BTreeMap::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(TaskOutcome::is_done)
    }

    pub fn outcome(&self, key: &TaskKey) -> Option<&TaskOutcome> {
        self.outcomes.get(key)
    }

    /// Aggregate failure list, including tasks failed through a dependency
    pub fn failures(&self) -> Vec<(&TaskKey, &CloudError)> {
        self.outcomes
            .iter()
            .filter_map(|(key, outcome)| outcome.error().map(|err| (key, err)))
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for outcome in self.outcomes.values() {
            match outcome {
                TaskOutcome::Done(ActionType::Create) => summary.create += 1,
                TaskOutcome::Done(ActionType::Update) => summary.update += 1,
                TaskOutcome::Done(ActionType::NoOp) => summary.no_change += 1,
                TaskOutcome::Done(ActionType::Skip) => summary.skipped += 1,
                TaskOutcome::Failed(_) => summary.failed += 1,
                TaskOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts per outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub create: usize,
    pub update: usize,
    pub no_change: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} shared, {} failed, {} cancelled",
            self.create, self.update, self.no_change, self.skipped, self.failed, self.cancelled
        )
    }
}
