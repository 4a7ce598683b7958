pub mod builder;
pub mod defaults;
pub mod merge;
pub mod types;


pub use builder::ConfigBuilder;
pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Main configuration loading function
pub fn load_config(config_file: &str) -> Result<(ConfigInput, PathBuf)> {
    let config_dir = Path::new(config_file)
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let config_input = if Path::new(config_file).exists() {
        let contents = std::fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {}", config_file))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", config_file))?
    } else {
        ConfigInput::default()
    };

    Ok((config_input, config_dir))
}

impl ConfigInput {
    /// Resolves relative paths against the directory holding the config file.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        let root_path = |p: PathBuf| if p.is_relative() { root.join(p) } else { p };
        if let Some(model) = self.model.as_mut() {
            model.path = model.path.take().map(root_path);
        }
        if let Some(output) = self.output.as_mut() {
            output.file = output.file.take().map(root_path);
        }
        self.observed = self.observed.map(root_path);
        self
    }
}
