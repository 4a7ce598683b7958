//! The schema model: grains and the elements they own.

pub mod column;
pub mod graph;
pub mod loader;
pub mod naming;
pub mod sequence;
pub mod table;
pub mod validate;
pub mod view;

pub use column::{Column, ColumnKind, ColumnVariant, DateTimeDefault, StringLength};
pub use sequence::Sequence;
pub use table::{FkRule, ForeignKey, Index, Table, TableKind, TableRef};
pub use view::{
    FromItem, Join, JoinKind, MaterializedView, ParameterizedView, Segment, View, ViewColumn,
    ViewParam,
};

use serde::{Deserialize, Serialize};

/// A named, versioned bundle of schema elements; maps to a database schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grain {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub materialized_views: Vec<MaterializedView>,
    #[serde(default)]
    pub parameterized_views: Vec<ParameterizedView>,
}

impl Grain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            sequences: vec![],
            tables: vec![],
            views: vec![],
            materialized_views: vec![],
            parameterized_views: vec![],
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.name == name)
    }

    /// Materialized views aggregating the given table.
    pub fn materialized_views_on(&self, table: &str) -> Vec<&MaterializedView> {
        self.materialized_views
            .iter()
            .filter(|mv| {
                mv.source()
                    .is_some_and(|s| s.table.table == table && s.table.grain_or(&self.name) == self.name)
            })
            .collect()
    }
}

/// The whole model: every grain known to the application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Score {
    pub grains: Vec<Grain>,
}

impl Score {
    pub fn new(grains: Vec<Grain>) -> Self {
        Self { grains }
    }

    pub fn grain(&self, name: &str) -> Option<&Grain> {
        self.grains.iter().find(|g| g.name == name)
    }

    pub fn table(&self, grain: &str, table: &str) -> Option<&Table> {
        self.grain(grain).and_then(|g| g.table(table))
    }
}
