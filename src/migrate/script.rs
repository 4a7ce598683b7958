use crate::render::RenderedSql;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain script, one terminated statement per block
    #[default]
    Sql,
    /// Array of `{safety, sql}` objects
    Json,
}

/// Renders statements as a script in the given format.
pub fn render_script(statements: &[RenderedSql], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Sql => {
            if statements.is_empty() {
                return Ok("-- No statements generated\n".to_string());
            }
            let blocks: Vec<String> = statements
                .iter()
                .map(|s| {
                    let sql = s.sql.trim_end();
                    if sql.ends_with(';') {
                        sql.to_string()
                    } else {
                        format!("{};", sql)
                    }
                })
                .collect();
            Ok(format!("{}\n", blocks.join("\n\n")))
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(statements).context("Failed to serialize statements")
        }
    }
}
