use crate::config::types::*;
use crate::dialect::Dialect;
use std::path::PathBuf;

// Config, Output and DdlSettings derive or implement Default themselves

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Postgres
    }
}

impl Default for Model {
    fn default() -> Self {
        Self {
            path: PathBuf::from("schema"),
        }
    }
}
