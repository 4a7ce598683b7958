use super::{DbColumnInfo, DbIndexInfo, SchemaProbe};
use crate::error::ProbeError;
use crate::registry::TriggerQuery;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedTrigger {
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedColumn {
    pub schema: String,
    pub table: String,
    #[serde(flatten)]
    pub info: DbColumnInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedIndex {
    pub schema: String,
    #[serde(flatten)]
    pub info: DbIndexInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedName {
    pub schema: String,
    pub name: String,
}

/// A captured picture of the live database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedSchema {
    #[serde(default)]
    pub triggers: Vec<ObservedTrigger>,
    #[serde(default)]
    pub columns: Vec<ObservedColumn>,
    #[serde(default)]
    pub indices: Vec<ObservedIndex>,
    #[serde(default)]
    pub sequences: Vec<ObservedName>,
    #[serde(default)]
    pub types: Vec<ObservedName>,
}

impl ObservedSchema {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read observed schema: {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse observed schema: {}", path.display()))
    }

    pub fn add_trigger(&mut self, schema: &str, table: &str, name: &str, body: &str) {
        self.triggers.push(ObservedTrigger {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            body: body.into(),
        });
    }

    pub fn add_column(&mut self, schema: &str, table: &str, info: DbColumnInfo) {
        self.columns.push(ObservedColumn {
            schema: schema.into(),
            table: table.into(),
            info,
        });
    }

    pub fn add_index(&mut self, schema: &str, info: DbIndexInfo) {
        self.indices.push(ObservedIndex {
            schema: schema.into(),
            info,
        });
    }

    pub fn add_sequence(&mut self, schema: &str, name: &str) {
        self.sequences.push(ObservedName {
            schema: schema.into(),
            name: name.into(),
        });
    }

    pub fn add_type(&mut self, schema: &str, name: &str) {
        self.types.push(ObservedName {
            schema: schema.into(),
            name: name.into(),
        });
    }

    fn trigger(&self, query: &TriggerQuery) -> Option<&ObservedTrigger> {
        self.triggers.iter().find(|t| {
            t.schema == query.schema && t.table == query.table && t.name == query.name
        })
    }
}

/// Probe answering from an in-memory snapshot; an empty snapshot describes
/// an empty database.
#[derive(Debug, Clone, Default)]
pub struct SnapshotProbe {
    snapshot: ObservedSchema,
}

impl SnapshotProbe {
    pub fn new(snapshot: ObservedSchema) -> Self {
        Self { snapshot }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(ObservedSchema::load(path)?))
    }
}

impl SchemaProbe for SnapshotProbe {
    fn trigger_exists(&self, query: &TriggerQuery) -> Result<bool, ProbeError> {
        Ok(self.snapshot.trigger(query).is_some())
    }

    fn trigger_body(&self, query: &TriggerQuery) -> Result<Option<String>, ProbeError> {
        Ok(self.snapshot.trigger(query).map(|t| t.body.clone()))
    }

    /// A table is known through its observed columns.
    fn table_exists(&self, schema: &str, table: &str) -> Result<bool, ProbeError> {
        Ok(self
            .snapshot
            .columns
            .iter()
            .any(|c| c.schema == schema && c.table == table))
    }

    fn column_info(&self, schema: &str, table: &str, column: &str) -> Result<Option<DbColumnInfo>, ProbeError> {
        Ok(self
            .snapshot
            .columns
            .iter()
            .find(|c| c.schema == schema && c.table == table && c.info.name == column)
            .map(|c| c.info.clone()))
    }

    fn index_info(&self, schema: &str, table: &str, index: &str) -> Result<Option<DbIndexInfo>, ProbeError> {
        Ok(self
            .snapshot
            .indices
            .iter()
            .find(|i| i.schema == schema && i.info.table == table && i.info.name == index)
            .map(|i| i.info.clone()))
    }

    fn sequence_exists(&self, schema: &str, name: &str) -> Result<bool, ProbeError> {
        Ok(self
            .snapshot
            .sequences
            .iter()
            .any(|s| s.schema == schema && s.name == name))
    }

    fn type_exists(&self, schema: &str, name: &str) -> Result<bool, ProbeError> {
        Ok(self.snapshot.types.iter().any(|t| t.schema == schema && t.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnVariant;

    #[test]
    fn test_load_snapshot_yaml() {
        let yaml = r#"
triggers:
  - { schema: shop, table: orders, name: versioncheck }
columns:
  - schema: shop
    table: orders
    name: amount
    type: integer
    nullable: true
    default_value: "0"
sequences:
  - { schema: shop, name: order_seq }
"#;
        let snapshot: ObservedSchema = serde_yaml::from_str(yaml).unwrap();
        let probe = SnapshotProbe::new(snapshot);
        assert!(probe
            .trigger_exists(&TriggerQuery::new("shop", "orders", "versioncheck"))
            .unwrap());
        let column = probe.column_info("shop", "orders", "amount").unwrap().unwrap();
        assert_eq!(column.variant, ColumnVariant::Integer);
        assert_eq!(column.default_value, "0");
        assert!(probe.sequence_exists("shop", "order_seq").unwrap());
        assert!(!probe.type_exists("shop", "order_seq").unwrap());
    }
}
