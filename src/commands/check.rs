use crate::config::Config;
use crate::model::graph::grain_order;
use crate::model::loader::load_score;
use anyhow::Result;
use console::style;

pub fn cmd_check(config: &Config) -> Result<()> {
    let score = match load_score(&config.model.path) {
        Ok(score) => score,
        Err(e) => {
            eprintln!("{} Model is invalid", style("✗").red().bold());
            return Err(e);
        }
    };
    let order = grain_order(&score)?;

    let count = |f: fn(&crate::model::Grain) -> usize| score.grains.iter().map(f).sum::<usize>();
    println!(
        "{} Model is valid: {} grain(s), {} table(s), {} view(s), {} materialized view(s), {} parameterized view(s)",
        style("✓").green().bold(),
        score.grains.len(),
        count(|g| g.tables.len()),
        count(|g| g.views.len()),
        count(|g| g.materialized_views.len()),
        count(|g| g.parameterized_views.len()),
    );
    println!("  Grain order: {}", style(order.join(" → ")).dim());
    Ok(())
}
