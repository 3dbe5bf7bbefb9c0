//! StackFlow task reconciliation engine
//!
//! This crate converges cloud infrastructure to a declared desired state.
//! Each resource is a [`Task`] that knows how to discover its actual
//! counterpart, diff the two and render the changes, either imperatively
//! through a cloud API or as declarative configuration blocks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    Executor                      │
//! │   ResourceGraph → topological order → JoinSet    │
//! └─────────────────┬───────────────────────────────┘
//!                   │ per task
//! ┌─────────────────▼───────────────────────────────┐
//! │                trait Task<C>                     │
//! │  find → normalize → diff → check → render        │
//! └───────┬─────────────────┬─────────────────┬─────┘
//!         │                 │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐ ┌───────▼───────┐
//! │  Target::Api  │ │Target::Config │ │Target::DryRun │
//! │  cloud calls  │ │ Value writer  │ │     Plan      │
//! └───────────────┘ └───────────────┘ └───────────────┘
//! ```
//!
//! Provider crates (such as `stackflow-cloud-aws`) implement [`Task`] for
//! their resource kinds against their own cloud context type.

pub mod action;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod output;
pub mod target;
pub mod task;
pub mod value;
pub mod writer;

// Re-exports
pub use action::{Action, ActionType, Plan, RunReport, RunSummary, TaskOutcome};
pub use config::{ExecutorConfig, RunMode};
pub use context::RunContext;
pub use diff::{Field, diff_field, diff_map, diff_refs, difference};
pub use error::{BoxError, CloudError, Result};
pub use executor::{Executor, ResourceGraph};
pub use output::OutputWriter;
pub use target::{ConfigTarget, DryRunTarget, Target};
pub use task::{Changes, Resource, Task, TaskKey, TaskNode, TaskRef, sort_refs};
pub use value::{Literal, sort_literals};
pub use writer::{Body, Value};
