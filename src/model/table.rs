use super::column::{Column, ColumnKind};
use super::naming::limit_name;
use crate::constants::REC_VERSION;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    ReadWrite {
        #[serde(default = "versioned_by_default")]
        versioned: bool,
    },
    ReadOnly,
}

fn versioned_by_default() -> bool {
    true
}

impl Default for TableKind {
    fn default() -> Self {
        TableKind::ReadWrite { versioned: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub kind: TableKind,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Constraint name; `pk_<table>` when absent
    #[serde(default)]
    pub pk_name: Option<String>,
    #[serde(default)]
    pub indices: Vec<Index>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkRule {
    #[default]
    NoAction,
    Cascade,
    SetNull,
}

impl FkRule {
    /// ` on <action> set null|cascade`, empty for no action.
    pub fn clause(self, action: &str) -> String {
        match self {
            FkRule::NoAction => String::new(),
            FkRule::Cascade => format!(" on {} cascade", action),
            FkRule::SetNull => format!(" on {} set null", action),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Owning grain; the referencing element's grain when absent
    #[serde(default)]
    pub grain: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn grain_or<'a>(&'a self, own: &'a str) -> &'a str {
        self.grain.as_deref().unwrap_or(own)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    /// Referenced table; its primary key supplies the target columns
    pub references: TableRef,
    #[serde(default)]
    pub on_delete: FkRule,
    #[serde(default)]
    pub on_update: FkRule,
}

impl ForeignKey {
    pub fn constraint_name(&self, grain: &str, table: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => limit_name(&format!(
                "fk_{}_{}_{}_{}_{}",
                grain,
                table,
                self.references.grain_or(grain),
                self.references.table,
                self.columns.join("_")
            )),
        }
    }
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>, primary_key: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::default(),
            columns,
            primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
            pk_name: None,
            indices: vec![],
            foreign_keys: vec![],
        }
    }

    pub fn unversioned(mut self) -> Self {
        self.kind = TableKind::ReadWrite { versioned: false };
        self
    }

    pub fn is_versioned(&self) -> bool {
        matches!(self.kind, TableKind::ReadWrite { versioned: true })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk_constraint_name(&self) -> String {
        self.pk_name
            .clone()
            .unwrap_or_else(|| limit_name(&format!("pk_{}", self.name)))
    }

    pub fn pk_columns(&self) -> Vec<&Column> {
        self.primary_key
            .iter()
            .filter_map(|name| self.column(name))
            .collect()
    }

    /// The hidden optimistic-lock column carried by versioned tables.
    pub fn rec_version_column() -> Column {
        Column {
            name: REC_VERSION.to_string(),
            nullable: false,
            kind: ColumnKind::Integer {
                default: Some(1),
                sequence: None,
            },
        }
    }
}
