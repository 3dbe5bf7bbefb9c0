//! Task contract
//!
//! A task represents one infrastructure resource: its desired fields, how to
//! discover the actual resource, how to diff and validate the two, and how to
//! render the changes either through the cloud API or as declarative config.
//!
//! Tasks live behind a [`TaskRef`], which is shared between the resource
//! graph and every task that references it. A run works on a snapshot of
//! the task and writes it back only after every step succeeded.

use crate::action::{Action, ActionType};
use crate::context::RunContext;
use crate::error::Result;
use crate::target::{ConfigTarget, Target};
use crate::value::Literal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// Identity of a task in the resource graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub kind: String,
    pub name: String,
}

impl TaskKey {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Identity shared by every resource kind
pub trait Resource: Clone + Send + Sync + 'static {
    /// Task kind, e.g. "ClassicLoadBalancer"
    const KIND: &'static str;

    /// Stable logical name, used to find pre-existing resources
    fn name(&self) -> &str;

    /// Provider-assigned identifier, once known
    fn id(&self) -> Option<String> {
        None
    }

    /// Deferred value other resources use to refer to this one
    fn config_link(&self, attribute: &str) -> Result<Literal>;

    fn key(&self) -> TaskKey {
        TaskKey::new(Self::KIND, self.name())
    }
}

/// Changes record: unset fields mean "no change"
pub trait Changes: Default + Send + Sync {
    /// Names of the populated fields
    fn changed_fields(&self) -> Vec<&'static str>;

    fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

/// Reconciliation operations of a resource kind against cloud `C`
#[async_trait]
pub trait Task<C: Send + Sync + 'static>: Resource {
    type Changes: Changes;

    /// Keys of the tasks this one references
    fn dependencies(&self) -> Vec<TaskKey> {
        Vec::new()
    }

    /// Discover the actual resource
    ///
    /// Returns `Ok(None)` when it does not exist. May backfill unset identity
    /// fields of `self` from what was found.
    async fn find(&mut self, cloud: &C) -> Result<Option<Self>>;

    /// Canonicalize order-insensitive collections; must be idempotent
    fn normalize(&mut self) {}

    /// Build the changes record between actual and desired
    fn diff(actual: Option<&Self>, desired: &Self) -> Self::Changes;

    /// Whether the resource may be created or modified at all
    fn should_create(_actual: Option<&Self>, _desired: &Self, _changes: &Self::Changes) -> bool {
        true
    }

    /// Validate the changes before anything is rendered
    fn check_changes(actual: Option<&Self>, desired: &Self, changes: &Self::Changes)
    -> Result<()>;

    /// Apply the changes through the cloud API
    async fn render_api(
        cloud: &C,
        actual: Option<&Self>,
        desired: &mut Self,
        changes: &Self::Changes,
    ) -> Result<()>;

    /// Emit a declarative resource block
    fn render_config(
        cloud: &C,
        target: &ConfigTarget,
        actual: Option<&Self>,
        desired: &Self,
        changes: &Self::Changes,
    ) -> Result<()>;
}

/// Shared, non-owning handle to a task
pub struct TaskRef<T>(Arc<RwLock<T>>);

impl<T> Clone for TaskRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Resource> TaskRef<T> {
    pub fn new(task: T) -> Self {
        Self(Arc::new(RwLock::new(task)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> T {
        self.read().clone()
    }

    pub fn key(&self) -> TaskKey {
        self.read().key()
    }

    pub fn name(&self) -> String {
        self.read().name().to_string()
    }

    pub fn id(&self) -> Option<String> {
        self.read().id()
    }

    /// Reference to this task's `id` attribute
    pub fn config_link(&self) -> Result<Literal> {
        self.read().config_link("id")
    }

    fn commit(&self, task: T) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = task;
    }
}

/// Same handle, same resolved id, or both unresolved with the same key
impl<T: Resource> PartialEq for TaskRef<T> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.key() == other.key(),
            _ => false,
        }
    }
}

impl<T: Resource> fmt::Debug for TaskRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let task = self.read();
        f.debug_struct("TaskRef")
            .field("key", &task.key())
            .field("id", &task.id())
            .finish()
    }
}

/// Sort references by resolved id, unresolved ones last by name
pub fn sort_refs<T: Resource>(refs: &mut [TaskRef<T>]) {
    refs.sort_by_cached_key(|r| {
        let task = r.read();
        let id = task.id();
        (id.is_none(), id, task.name().to_string())
    });
}

/// Keys of a reference list
pub fn ref_keys<T: Resource>(refs: &[TaskRef<T>]) -> impl Iterator<Item = TaskKey> + '_ {
    refs.iter().map(TaskRef::key)
}

/// Type-erased task as stored in the resource graph
#[async_trait]
pub trait TaskNode<C>: Send + Sync {
    fn key(&self) -> TaskKey;

    fn dependencies(&self) -> Vec<TaskKey>;

    /// Run the task to completion against the run's target
    ///
    /// `Ok(None)` when the run was cancelled while the task was still
    /// discovering; nothing was rendered and nothing is committed.
    async fn run(&self, ctx: &RunContext<C>) -> Result<Option<ActionType>>;
}

#[async_trait]
impl<C, T> TaskNode<C> for TaskRef<T>
where
    C: Send + Sync + 'static,
    T: Task<C>,
{
    fn key(&self) -> TaskKey {
        TaskRef::key(self)
    }

    fn dependencies(&self) -> Vec<TaskKey> {
        self.read().dependencies()
    }

    async fn run(&self, ctx: &RunContext<C>) -> Result<Option<ActionType>> {
        let mut desired = self.snapshot();
        let Some(action) = reconcile(&mut desired, ctx).await? else {
            return Ok(None);
        };
        self.commit(desired);
        Ok(Some(action))
    }
}

/// discover → normalize → diff → should_create → validate → render
///
/// Discovery races the run's cancellation token; once it returns, the
/// render runs to completion.
async fn reconcile<C, T>(desired: &mut T, ctx: &RunContext<C>) -> Result<Option<ActionType>>
where
    C: Send + Sync + 'static,
    T: Task<C>,
{
    let key = desired.key();
    let cloud = ctx.cloud.as_ref();

    let found = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => None,
        found = desired.find(cloud) => Some(found),
    };
    let Some(found) = found else {
        tracing::debug!("{} stopped during discovery: run cancelled", key);
        return Ok(None);
    };

    let mut actual = found?;
    if let Some(actual) = actual.as_mut() {
        actual.normalize();
    }
    desired.normalize();

    let changes = T::diff(actual.as_ref(), desired);
    let action = match (&actual, changes.is_empty()) {
        (None, _) => ActionType::Create,
        (Some(_), true) => ActionType::NoOp,
        (Some(_), false) => ActionType::Update,
    };

    if !T::should_create(actual.as_ref(), desired, &changes) {
        tracing::debug!("{} is shared; not rendering", key);
        return Ok(Some(ActionType::Skip));
    }

    // Declarative output must describe every resource, changed or not
    if action == ActionType::NoOp && !matches!(ctx.target, Target::Config(_)) {
        tracing::debug!("{} is up to date", key);
        return Ok(Some(action));
    }

    T::check_changes(actual.as_ref(), desired, &changes)?;

    match &ctx.target {
        Target::Api => {
            tracing::info!("Applying {} to {}", action, key);
            T::render_api(cloud, actual.as_ref(), desired, &changes).await?;
        }
        Target::Config(target) => {
            T::render_config(cloud, target, actual.as_ref(), desired, &changes)?;
        }
        Target::DryRun(target) => target.record(Action {
            task: key,
            action_type: action,
            changed_fields: changes
                .changed_fields()
                .into_iter()
                .map(String::from)
                .collect(),
        }),
    }

    Ok(Some(action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Group {
        name: String,
        id: Option<String>,
    }

    impl Resource for Group {
        const KIND: &'static str = "Group";

        fn name(&self) -> &str {
            &self.name
        }

        fn id(&self) -> Option<String> {
            self.id.clone()
        }

        fn config_link(&self, attribute: &str) -> Result<Literal> {
            Ok(Literal::property("group", &self.name, attribute))
        }
    }

    fn group(name: &str, id: Option<&str>) -> TaskRef<Group> {
        TaskRef::new(Group {
            name: name.to_string(),
            id: id.map(String::from),
        })
    }

    #[test]
    fn test_task_key_display() {
        assert_eq!(TaskKey::new("Subnet", "a.example.com").to_string(), "Subnet/a.example.com");
    }

    #[test]
    fn test_ref_equality() {
        let a = group("a", Some("g-1"));
        assert_eq!(a, a.clone());
        assert_eq!(a, group("other", Some("g-1")));
        assert_ne!(a, group("a", Some("g-2")));
        assert_ne!(a, group("a", None));
        assert_eq!(group("a", None), group("a", None));
    }

    #[test]
    fn test_sort_refs_puts_unresolved_last() {
        let mut refs = vec![
            group("z", None),
            group("b", Some("g-2")),
            group("y", None),
            group("a", Some("g-1")),
        ];
        sort_refs(&mut refs);
        let names: Vec<String> = refs.iter().map(TaskRef::name).collect();
        assert_eq!(names, vec!["a", "b", "y", "z"]);
    }

    #[test]
    fn test_commit_replaces_task() {
        let a = group("a", None);
        let seen_by_dependent = a.clone();
        let mut resolved = a.snapshot();
        resolved.id = Some("g-9".to_string());
        a.commit(resolved);

        assert_eq!(seen_by_dependent.id().as_deref(), Some("g-9"));
        assert_eq!(seen_by_dependent.config_link().unwrap().token(), "group.a.id");
    }
}
