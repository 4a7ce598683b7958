//! Read model of the live database: what a column, index, trigger or
//! sequence currently looks like. Used only as input to ALTER diffs and
//! existence checks; the generator never writes through it.

mod snapshot;

pub use snapshot::{ObservedColumn, ObservedIndex, ObservedName, ObservedSchema, ObservedTrigger, SnapshotProbe};

use crate::error::ProbeError;
use crate::model::{Column, ColumnKind, ColumnVariant, DateTimeDefault, Index};
use crate::registry::TriggerQuery;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Observed column metadata. `default_value` is the default as the engine
/// reports it, normalized the way [`Column::default_text`] renders one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub variant: ColumnVariant,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: String,
    /// String length, or decimal precision
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub scale: u32,
    #[serde(default)]
    pub is_max: bool,
}

impl DbColumnInfo {
    /// Whether the live column already matches the desired one, so no
    /// ALTER is needed.
    pub fn reflects(&self, column: &Column) -> bool {
        if column.variant() != self.variant {
            return false;
        }
        // empty-string defaults are always nullable on some engines
        let empty_string_default =
            self.variant == ColumnVariant::String && self.default_value == "''";
        if !empty_string_default && column.nullable != self.nullable {
            return false;
        }
        match &column.kind {
            ColumnKind::String { length, .. } => {
                let same = match length.bound() {
                    Some(n) => !self.is_max && self.length == n,
                    None => self.is_max,
                };
                if !same {
                    return false;
                }
            }
            ColumnKind::Decimal {
                precision, scale, ..
            } => {
                if *precision != self.length || *scale != self.scale {
                    return false;
                }
            }
            _ => {}
        }

        if self.default_value.is_empty() {
            return !column.has_default();
        }
        self.default_matches(column)
    }

    fn default_matches(&self, column: &Column) -> bool {
        let observed = self.default_value.trim();
        match &column.kind {
            ColumnKind::Integer { sequence, default } => {
                match (sequence, sequence_in_default(observed)) {
                    (Some(seq), Some(found)) => seq == found,
                    (None, None) => observed.parse::<i64>().ok() == *default,
                    _ => false,
                }
            }
            ColumnKind::Floating { default } => observed.parse::<f64>().ok() == *default,
            ColumnKind::Decimal { default, .. } => match (observed.parse::<f64>(), default) {
                (Ok(a), Some(b)) => b.parse::<f64>().is_ok_and(|b| a == b),
                _ => false,
            },
            ColumnKind::Boolean { default } => parse_sql_bool(observed) == *default,
            ColumnKind::DateTime { default } => match default {
                Some(DateTimeDefault::GetDate) => observed.eq_ignore_ascii_case("GETDATE()"),
                Some(DateTimeDefault::Date(date)) => parse_iso_date(observed) == Some(*date),
                None => false,
            },
            _ => observed == column.default_text(),
        }
    }
}

/// Sequence name from a `NEXTVAL(<name>)` default.
pub(crate) fn sequence_in_default(default: &str) -> Option<&str> {
    let upper = default.to_ascii_uppercase();
    if upper.starts_with("NEXTVAL(") && upper.ends_with(')') {
        Some(&default["NEXTVAL(".len()..default.len() - 1])
    } else {
        None
    }
}

fn parse_sql_bool(value: &str) -> Option<bool> {
    match value.trim_matches('\'').to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim_matches('\'');
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbIndexInfo {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
}

impl DbIndexInfo {
    pub fn reflects(&self, table: &str, index: &Index) -> bool {
        self.table == table && self.name == index.name && self.columns == index.columns
    }
}

/// Questions the generator asks about the live database.
pub trait SchemaProbe {
    fn trigger_exists(&self, query: &TriggerQuery) -> Result<bool, ProbeError>;

    /// Source text of the trigger, when it exists.
    fn trigger_body(&self, query: &TriggerQuery) -> Result<Option<String>, ProbeError>;

    fn table_exists(&self, schema: &str, table: &str) -> Result<bool, ProbeError>;

    fn column_info(&self, schema: &str, table: &str, column: &str) -> Result<Option<DbColumnInfo>, ProbeError>;

    fn index_info(&self, schema: &str, table: &str, index: &str) -> Result<Option<DbIndexInfo>, ProbeError>;

    fn sequence_exists(&self, schema: &str, name: &str) -> Result<bool, ProbeError>;

    /// User-defined types, used for the row types of parameterized views.
    fn type_exists(&self, schema: &str, name: &str) -> Result<bool, ProbeError>;
}
