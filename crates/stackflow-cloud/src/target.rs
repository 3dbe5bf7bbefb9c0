//! Render targets
//!
//! The executor picks one [`Target`] per run. `Api` applies changes through
//! the cloud collaborator, `Config` accumulates declarative resource blocks,
//! `DryRun` only records what would change.

use crate::action::{Action, Plan};
use crate::error::{CloudError, Result};
use crate::value::{Literal, sanitize_name};
use crate::writer::{Body, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where a run sends its rendered changes
#[derive(Debug, Clone)]
pub enum Target {
    Api,
    Config(Arc<ConfigTarget>),
    DryRun(Arc<DryRunTarget>),
}

impl Target {
    pub fn config() -> Self {
        Self::Config(Arc::new(ConfigTarget::new()))
    }

    pub fn dry_run() -> Self {
        Self::DryRun(Arc::new(DryRunTarget::new()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Accumulating declarative output
///
/// Tasks may render concurrently; every structural write goes through the
/// mutex so only one block is inserted at a time.
#[derive(Debug, Default)]
pub struct ConfigTarget {
    blocks: Mutex<Blocks>,
}

#[derive(Debug, Default)]
struct Blocks {
    /// (kind, name) -> rendered block
    resources: BTreeMap<(String, String), String>,
    outputs: BTreeMap<String, Vec<Literal>>,
}

impl ConfigTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `resource "<kind>" "<name>"` block
    ///
    /// `value` must be a [`Value::Object`]. Each (kind, name) pair may only be
    /// rendered once.
    pub fn render_resource(&self, kind: &str, name: &str, value: &Value) -> Result<()> {
        let Value::Object(fields) = value else {
            return Err(CloudError::InvalidConfig(format!(
                "resource {} {:?} must be an object",
                kind, name
            )));
        };

        let label = sanitize_name(name);
        value.validate(&format!("{}.{}", kind, label))?;
        let key = (kind.to_string(), label.clone());

        let mut blocks = lock(&self.blocks);
        if blocks.resources.contains_key(&key) {
            return Err(CloudError::DuplicateBlock {
                kind: kind.to_string(),
                name: label,
            });
        }

        let mut body = Body::new();
        body.write_block("resource", &[kind, label.as_str()], fields);
        blocks.resources.insert(key, body.into_string());
        tracing::debug!("Rendered config block {} {}", kind, label);
        Ok(())
    }

    /// Add values to an `output` block, keeping them sorted and unique
    pub fn add_output(&self, name: &str, value: Literal) {
        let mut blocks = lock(&self.blocks);
        let values = blocks.outputs.entry(name.to_string()).or_default();
        if !values.contains(&value) {
            values.push(value);
            values.sort();
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.blocks).resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The complete file: resources by kind then name, then outputs
    pub fn finish(&self) -> String {
        let blocks = lock(&self.blocks);
        let mut sections: Vec<String> = blocks.resources.values().cloned().collect();

        for (name, values) in &blocks.outputs {
            let mut body = Body::new();
            let fields = HashMap::from([("value".to_string(), Value::literals(values.clone()))]);
            body.write_block("output", &[name.as_str()], &fields);
            sections.push(body.into_string());
        }

        sections.join("\n")
    }
}

/// Records the actions a run would take
#[derive(Debug, Default)]
pub struct DryRunTarget {
    actions: Mutex<Vec<Action>>,
}

impl DryRunTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: Action) {
        tracing::debug!(
            "Would {} {}: {:?}",
            action.action_type,
            action.task,
            action.changed_fields
        );
        lock(&self.actions).push(action);
    }

    pub fn plan(&self) -> Plan {
        Plan::new(lock(&self.actions).clone())
    }
}
