//! Reconciliation error types

use crate::task::TaskKey;
use thiserror::Error;

/// Boxed error returned by cloud API collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reconciliation errors
///
/// Every error is scoped to the task that produced it. Absence of a remote
/// resource is not an error: lookups return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Found multiple {kind} resources matching {identity:?}")]
    AmbiguousMatch { kind: String, identity: String },

    #[error("Field is required: {0}")]
    RequiredField(String),

    #[error("Field cannot be changed: {0}")]
    ImmutableField(String),

    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("Error parsing {field}: {value:?}")]
    Parse { field: String, value: String },

    #[error("Dependency cycle detected at {0}")]
    DependencyCycle(TaskKey),

    #[error("{task} depends on unknown task {dependency}")]
    UnknownDependency { task: TaskKey, dependency: TaskKey },

    #[error("Task already registered: {0}")]
    DuplicateTask(TaskKey),

    #[error("{task} not started: dependency {dependency} failed")]
    DependencyFailed { task: TaskKey, dependency: TaskKey },

    #[error("Config block already rendered: {kind} {name:?}")]
    DuplicateBlock { kind: String, name: String },

    #[error("Task {task} panicked: {message}")]
    TaskPanicked { task: TaskKey, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    /// Wrap a collaborator error with resource context
    pub fn provider(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Provider {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::RequiredField(field.into())
    }

    pub fn parse(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ambiguous(kind: impl Into<String>, identity: impl Into<String>) -> Self {
        Self::AmbiguousMatch {
            kind: kind.into(),
            identity: identity.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
