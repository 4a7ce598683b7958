use crate::config::Config;
use crate::model::loader::load_score;
use anyhow::Result;

/// One `grain.view checksum` line per materialized view.
pub fn cmd_checksum(config: &Config) -> Result<()> {
    let score = load_score(&config.model.path)?;
    for grain in &score.grains {
        for view in &grain.materialized_views {
            println!("{}.{} {}", grain.name, view.name, view.checksum());
        }
    }
    Ok(())
}
