use crate::catalog::SnapshotProbe;
use crate::config::Config;
use crate::ddl::DdlGenerator;
use crate::migrate::{Migrator, RecordingSink, render_script};
use crate::model::loader::load_score;
use crate::render::Safety;
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Prints (or writes) the creation script of the whole model.
pub fn cmd_generate(config: &Config) -> Result<()> {
    info!("Loading model from {}", config.model.path.display());
    let score = load_score(&config.model.path)?;

    let probe = match &config.observed {
        Some(path) => {
            debug!("Using observed schema {}", path.display());
            SnapshotProbe::load(path)?
        }
        None => SnapshotProbe::empty(),
    };
    let generator = DdlGenerator::new(config.dialect, config.ddl.clone(), Box::new(probe));

    let mut migrator = Migrator::new(generator, RecordingSink::new());
    migrator
        .create_score(&score)
        .with_context(|| format!("Failed to generate {} script", config.dialect))?;
    let statements = migrator.into_sink().into_statements();

    let destructive = statements
        .iter()
        .filter(|s| s.safety == Safety::Destructive)
        .count();
    info!(
        "✅ Generated {} statements ({} destructive)",
        statements.len(),
        destructive
    );

    let script = render_script(&statements, config.output.format)?;
    match &config.output.file {
        Some(path) => {
            std::fs::write(path, &script)
                .with_context(|| format!("Failed to write script: {}", path.display()))?;
            info!("📝 Script written to {}", path.display());
        }
        None => print!("{}", script),
    }
    Ok(())
}
