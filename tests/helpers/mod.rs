pub mod cli;

use grainsql::model::Score;
use grainsql::model::loader::load_score;
use std::path::PathBuf;

/// Directory holding the YAML models shared by the integration tests.
pub fn fixture_models() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/models")
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// The shop and billing grains, loaded and validated.
pub fn fixture_score() -> Score {
    load_score(&fixture_models()).expect("fixture models should load")
}
