//! Output files
//!
//! Writes the declarative configuration of a config run to `main.tf` and the
//! plan of a dry run to `plan.json` inside the output directory. The
//! previous file is kept next to the new one with a `.backup` suffix.

use crate::action::Plan;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

const CONFIG_FILE: &str = "main.tf";
const PLAN_FILE: &str = "plan.json";
const BACKUP_SUFFIX: &str = "backup";

/// Writer for run output files
pub struct OutputWriter {
    /// Output directory
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn plan_path(&self) -> PathBuf {
        self.dir.join(PLAN_FILE)
    }

    /// Ensure the output directory exists
    async fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
            tracing::debug!("Created output directory: {}", self.dir.display());
        }
        Ok(())
    }

    /// Write the rendered configuration, returning the file path
    pub async fn write_config(&self, content: &str) -> Result<PathBuf> {
        let path = self.config_path();
        self.replace(&path, content.as_bytes()).await?;
        tracing::info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Previously written configuration, if any
    pub async fn read_config(&self) -> Result<Option<String>> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path).await?))
    }

    /// Write a dry-run plan as JSON, returning the file path
    pub async fn write_plan(&self, plan: &Plan) -> Result<PathBuf> {
        let path = self.plan_path();
        let content = serde_json::to_string_pretty(plan)?;
        self.replace(&path, content.as_bytes()).await?;
        tracing::info!("Wrote plan with {} actions to {}", plan.actions.len(), path.display());
        Ok(path)
    }

    async fn replace(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        if path.exists() {
            let backup = path.with_extension(match path.extension() {
                Some(ext) => format!("{}.{}", ext.to_string_lossy(), BACKUP_SUFFIX),
                None => BACKUP_SUFFIX.to_string(),
            });
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(path, &backup).await?;
            tracing::debug!("Created backup {}", backup.display());
        }

        fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionType};
    use crate::task::TaskKey;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_creates_directory() {
        let temp_dir = tempdir().unwrap();
        let writer = OutputWriter::new(temp_dir.path().join("out/terraform"));

        let path = writer.write_config("resource \"aws_elb\" \"api\" {\n}\n").await.unwrap();

        assert!(path.ends_with("out/terraform/main.tf"));
        assert_eq!(
            writer.read_config().await.unwrap().as_deref(),
            Some("resource \"aws_elb\" \"api\" {\n}\n")
        );
    }

    #[tokio::test]
    async fn test_previous_config_is_backed_up() {
        let temp_dir = tempdir().unwrap();
        let writer = OutputWriter::new(temp_dir.path());

        writer.write_config("first\n").await.unwrap();
        writer.write_config("second\n").await.unwrap();
        writer.write_config("third\n").await.unwrap();

        let backup = std::fs::read_to_string(temp_dir.path().join("main.tf.backup")).unwrap();
        assert_eq!(backup, "second\n");
        assert_eq!(writer.read_config().await.unwrap().as_deref(), Some("third\n"));
    }

    #[tokio::test]
    async fn test_missing_config() {
        let temp_dir = tempdir().unwrap();
        let writer = OutputWriter::new(temp_dir.path());
        assert!(writer.read_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_plan() {
        let temp_dir = tempdir().unwrap();
        let writer = OutputWriter::new(temp_dir.path());
        let plan = Plan::new(vec![Action {
            task: TaskKey::new("Subnet", "a"),
            action_type: ActionType::Create,
            changed_fields: vec!["cidr_block".to_string()],
        }]);

        let path = writer.write_plan(&plan).await.unwrap();

        let loaded: Plan = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(loaded.has_changes);
        assert_eq!(loaded.actions[0].action_type, ActionType::Create);
    }
}
