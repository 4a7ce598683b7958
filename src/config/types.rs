use crate::ddl::DdlSettings;
use crate::dialect::Dialect;
use crate::migrate::OutputFormat;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration input - all fields Optional for merging
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigInput {
    pub dialect: Option<Dialect>,
    pub model: Option<ModelInput>,
    pub output: Option<OutputInput>,
    pub system_schema: Option<String>,
    pub h2: Option<H2Input>,
    /// Observed-schema snapshot consulted instead of a live database
    pub observed: Option<PathBuf>,
}

/// Resolved configuration with all defaults applied
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub dialect: Dialect,
    pub model: Model,
    pub output: Output,
    pub ddl: DdlSettings,
    pub observed: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelInput {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// A model file, or a directory of `*.yaml` model files
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputInput {
    pub format: Option<OutputFormat>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub format: OutputFormat,
    /// Standard output when absent
    pub file: Option<PathBuf>,
}

/// Handler classes of the embedded engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct H2Input {
    pub version_check: Option<String>,
    pub mv_insert: Option<String>,
    pub mv_update: Option<String>,
    pub mv_delete: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ModelArgs {
    #[arg(long, help = "Model file or directory of model files")]
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    #[arg(long, value_enum, help = "Target dialect")]
    pub dialect: Option<Dialect>,

    #[arg(long, help = "Schema holding the framework helper objects")]
    pub system_schema: Option<String>,

    #[arg(long, help = "Observed-schema snapshot (YAML) to diff against")]
    pub observed: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct OutputArgs {
    #[arg(long, value_enum, help = "Output format")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'o', help = "Write the script to this file")]
    pub output: Option<PathBuf>,
}

impl From<ModelArgs> for ModelInput {
    fn from(args: ModelArgs) -> Self {
        Self {
            path: args.model_path,
        }
    }
}

impl From<OutputArgs> for OutputInput {
    fn from(args: OutputArgs) -> Self {
        Self {
            format: args.format,
            file: args.output,
        }
    }
}

impl ConfigInput {
    /// CLI layer built from the flattened argument groups.
    pub fn from_args(model: ModelArgs, target: TargetArgs, output: Option<OutputArgs>) -> Self {
        Self {
            dialect: target.dialect,
            model: Some(model.into()),
            output: output.map(Into::into),
            system_schema: target.system_schema,
            h2: None,
            observed: target.observed,
        }
    }
}
