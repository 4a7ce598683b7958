use crate::config::{merge::Merge, types::*};
use crate::ddl::{DdlSettings, H2Handlers};
use anyhow::{Result, anyhow};

pub struct ConfigBuilder {
    config_input: ConfigInput,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config_input: ConfigInput::default(),
        }
    }

    pub fn with_file(mut self, file_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(file_input);
        self
    }

    pub fn with_cli_args(mut self, cli_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(cli_input);
        self
    }

    pub fn resolve(self) -> Result<Config> {
        let defaults = Config::default();

        Ok(Config {
            dialect: self.config_input.dialect.unwrap_or(defaults.dialect),
            model: self.resolve_model(&defaults.model),
            output: self.resolve_output(&defaults.output),
            ddl: self.resolve_ddl(&defaults.ddl)?,
            observed: self.config_input.observed.clone().or(defaults.observed),
        })
    }

    fn resolve_model(&self, defaults: &Model) -> Model {
        let model_input = self.config_input.model.as_ref();

        Model {
            path: model_input
                .and_then(|m| m.path.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.path.clone()),
        }
    }

    fn resolve_output(&self, defaults: &Output) -> Output {
        let output_input = self.config_input.output.as_ref();

        Output {
            format: output_input
                .and_then(|o| o.format)
                .unwrap_or(defaults.format),
            file: output_input
                .and_then(|o| o.file.as_ref())
                .cloned()
                .or_else(|| defaults.file.clone()),
        }
    }

    fn resolve_ddl(&self, defaults: &DdlSettings) -> Result<DdlSettings> {
        let system_schema = self
            .config_input
            .system_schema
            .as_ref()
            .cloned()
            .unwrap_or_else(|| defaults.system_schema.clone());
        if system_schema.trim().is_empty() {
            return Err(anyhow!("system_schema must not be empty"));
        }

        let h2_input = self.config_input.h2.as_ref();
        let pick = |value: Option<&String>, default: &String| value.cloned().unwrap_or_else(|| default.clone());
        let h2 = H2Handlers {
            version_check: pick(h2_input.and_then(|h| h.version_check.as_ref()), &defaults.h2.version_check),
            mv_insert: pick(h2_input.and_then(|h| h.mv_insert.as_ref()), &defaults.h2.mv_insert),
            mv_update: pick(h2_input.and_then(|h| h.mv_update.as_ref()), &defaults.h2.mv_update),
            mv_delete: pick(h2_input.and_then(|h| h.mv_delete.as_ref()), &defaults.h2.mv_delete),
        };

        Ok(DdlSettings { system_schema, h2 })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
