//! Run configuration

use crate::error::{CloudError, Result};
use crate::target::Target;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_MAX_CONCURRENCY: &str = "STACKFLOW_MAX_CONCURRENCY";
pub const ENV_MODE: &str = "STACKFLOW_MODE";
pub const ENV_OUTPUT_DIR: &str = "STACKFLOW_OUTPUT_DIR";

const DEFAULT_MAX_CONCURRENCY: usize = 10;
const DEFAULT_OUTPUT_DIR: &str = "out/terraform";

/// How rendered changes are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Mutate resources through the cloud API
    #[default]
    Apply,
    /// Emit declarative configuration
    Config,
    /// Record the plan without mutating anything
    DryRun,
}

impl RunMode {
    /// Fresh render target for this mode
    pub fn target(self) -> Target {
        match self {
            RunMode::Apply => Target::Api,
            RunMode::Config => Target::config(),
            RunMode::DryRun => Target::dry_run(),
        }
    }
}

impl FromStr for RunMode {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apply" => Ok(RunMode::Apply),
            "config" | "terraform" => Ok(RunMode::Config),
            "dry-run" | "dryrun" => Ok(RunMode::DryRun),
            other => Err(CloudError::InvalidConfig(format!(
                "unknown run mode {:?} (expected apply, config or dry-run)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Apply => write!(f, "apply"),
            RunMode::Config => write!(f, "config"),
            RunMode::DryRun => write!(f, "dry-run"),
        }
    }
}

/// Executor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on tasks running at once
    pub max_concurrency: usize,

    pub mode: RunMode,

    /// Directory the declarative output is written to
    pub output_dir: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            mode: RunMode::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl ExecutorConfig {
    /// Defaults overridden by `STACKFLOW_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_MAX_CONCURRENCY) {
            config.max_concurrency = value.trim().parse().map_err(|_| {
                CloudError::InvalidConfig(format!("{} must be a number: {:?}", ENV_MAX_CONCURRENCY, value))
            })?;
        }
        if let Ok(value) = std::env::var(ENV_MODE) {
            config.mode = value.parse()?;
        }
        if let Ok(value) = std::env::var(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(value);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(CloudError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        temp_env::with_vars_unset([ENV_MAX_CONCURRENCY, ENV_MODE, ENV_OUTPUT_DIR], || {
            let config = ExecutorConfig::from_env().unwrap();
            assert_eq!(config, ExecutorConfig::default());
        });
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                (ENV_MAX_CONCURRENCY, Some("3")),
                (ENV_MODE, Some("dry-run")),
                (ENV_OUTPUT_DIR, Some("/tmp/out")),
            ],
            || {
                let config = ExecutorConfig::from_env().unwrap();
                assert_eq!(config.max_concurrency, 3);
                assert_eq!(config.mode, RunMode::DryRun);
                assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_values() {
        temp_env::with_var(ENV_MAX_CONCURRENCY, Some("many"), || {
            assert!(matches!(
                ExecutorConfig::from_env(),
                Err(CloudError::InvalidConfig(_))
            ));
        });
        temp_env::with_var(ENV_MAX_CONCURRENCY, Some("0"), || {
            assert!(ExecutorConfig::from_env().is_err());
        });
        temp_env::with_var(ENV_MODE, Some("destroy"), || {
            assert!(ExecutorConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExecutorConfig =
            serde_json::from_str(r#"{"mode": "config", "max_concurrency": 4}"#).unwrap();
        assert_eq!(config.mode, RunMode::Config);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_mode_target() {
        assert!(matches!(RunMode::Apply.target(), Target::Api));
        assert!(matches!(RunMode::Config.target(), Target::Config(_)));
        assert!(matches!(RunMode::DryRun.target(), Target::DryRun(_)));
    }
}
