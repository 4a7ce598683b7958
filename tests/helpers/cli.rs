use anyhow::Result;
use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// CLI test helper: a throwaway project directory and a command running
/// the real binary inside it.
pub struct CliTestHelper {
    pub temp_dir: TempDir,
    pub project_root: PathBuf,
}

impl CliTestHelper {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let project_root = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            project_root,
        }
    }

    /// Writes `grainsql.yaml` at the project root.
    pub fn write_config(&self, content: &str) -> Result<()> {
        fs::write(self.project_root.join("grainsql.yaml"), content)?;
        Ok(())
    }

    /// Writes a model file under `schema/`, the default model directory.
    pub fn write_model_file(&self, filename: &str, content: &str) -> Result<()> {
        let dir = self.project_root.join("schema");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(filename), content)?;
        Ok(())
    }

    /// Copies the shared fixture models into `schema/`.
    pub fn copy_fixture_models(&self) -> Result<()> {
        for name in ["shop.yaml", "billing.yaml"] {
            let content = fs::read_to_string(super::fixture_models().join(name))?;
            self.write_model_file(name, &content)?;
        }
        Ok(())
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("grainsql").expect("Failed to find grainsql binary");
        cmd.current_dir(&self.project_root);
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

impl Default for CliTestHelper {
    fn default() -> Self {
        Self::new()
    }
}
