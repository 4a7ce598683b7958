use super::{Grain, Score};
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A model file holds either a single grain or a whole score.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ModelFile {
    Score(Score),
    Grain(Grain),
}

/// Loads a model from a YAML file, or from every `*.yaml` file in a
/// directory (sorted by path), and validates it.
pub fn load_score(path: &Path) -> Result<Score> {
    let files = discover_model_files(path)?;
    if files.is_empty() {
        return Err(anyhow!("No model files found at {}", path.display()));
    }

    let mut grains = Vec::new();
    for file in files {
        debug!("Loading model file {}", file.display());
        let contents = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read model file: {}", file.display()))?;
        let parsed: ModelFile = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse model file: {}", file.display()))?;
        match parsed {
            ModelFile::Score(score) => grains.extend(score.grains),
            ModelFile::Grain(grain) => grains.push(grain),
        }
    }

    let score = Score::new(grains);
    score
        .validate()
        .with_context(|| format!("Invalid model at {}", path.display()))?;
    Ok(score)
}

fn discover_model_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(anyhow!("Model path does not exist: {}", path.display()));
    }

    let pattern = path.join("*.yaml");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| anyhow!("Model path is not valid UTF-8: {}", path.display()))?;
    let mut files = glob::glob(pattern)
        .with_context(|| format!("Invalid model path pattern: {}", pattern))?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to list model files")?;
    files.sort();
    Ok(files)
}

impl Score {
    /// Resolves and type checks every view, then checks keys, indices,
    /// foreign keys, sequences and cross-grain references.
    pub fn validate(&self) -> Result<(), crate::error::ModelError> {
        super::validate::validate_score(self)
    }
}
