//! Per-run context handed to every task

use crate::target::Target;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state for one executor run
pub struct RunContext<C> {
    /// Cloud collaborator
    pub cloud: Arc<C>,

    /// Render target selected for this run
    pub target: Target,

    /// Run-wide cancellation signal
    ///
    /// The executor checks it before starting each task, and a task still
    /// discovering its actual resource stops at its next await point.
    /// Renders are never interrupted.
    pub cancel: CancellationToken,
}

impl<C> RunContext<C> {
    pub fn new(cloud: Arc<C>, target: Target) -> Self {
        Self {
            cloud,
            target,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl<C> Clone for RunContext<C> {
    fn clone(&self) -> Self {
        Self {
            cloud: Arc::clone(&self.cloud),
            target: self.target.clone(),
            cancel: self.cancel.clone(),
        }
    }
}
