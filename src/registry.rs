//! Session-scoped cache of triggers known to exist.
//!
//! The registry is a cache, not a source of truth: a miss falls through to
//! the observed-schema probe, and positive answers are remembered. Triggers
//! dropped during the session are remembered as absent, since the probe
//! still describes the database as it was before the session began.

use crate::catalog::SchemaProbe;
use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    PreInsert,
    PreUpdate,
    PreDelete,
    PostInsert,
    PostUpdate,
    PostDelete,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerQuery {
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<TriggerKind>,
}

impl TriggerQuery {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: TriggerKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[derive(Debug, Default)]
pub struct TriggerRegistry {
    known: HashMap<(String, String), BTreeSet<String>>,
    dropped: HashMap<(String, String), BTreeSet<String>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(query: &TriggerQuery) -> (String, String) {
        (query.schema.clone(), query.table.clone())
    }

    pub fn contains(&self, query: &TriggerQuery) -> bool {
        self.known
            .get(&Self::key(query))
            .is_some_and(|names| names.contains(&query.name))
    }

    /// Whether the trigger was dropped earlier in this session.
    pub fn is_dropped(&self, query: &TriggerQuery) -> bool {
        self.dropped
            .get(&Self::key(query))
            .is_some_and(|names| names.contains(&query.name))
    }

    pub fn add(&mut self, query: &TriggerQuery) {
        if let Some(names) = self.dropped.get_mut(&Self::key(query)) {
            names.remove(&query.name);
        }
        self.known
            .entry(Self::key(query))
            .or_default()
            .insert(query.name.clone());
    }

    pub fn remove(&mut self, query: &TriggerQuery) {
        if let Some(names) = self.known.get_mut(&Self::key(query)) {
            names.remove(&query.name);
        }
        self.dropped
            .entry(Self::key(query))
            .or_default()
            .insert(query.name.clone());
    }

    /// Known trigger names of one table.
    pub fn triggers_on(&self, schema: &str, table: &str) -> Vec<&str> {
        self.known
            .get(&(schema.to_string(), table.to_string()))
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Cached answer when the trigger is known or was dropped, otherwise
    /// asks the probe and remembers a positive answer.
    pub fn exists(&mut self, probe: &dyn SchemaProbe, query: &TriggerQuery) -> Result<bool, ProbeError> {
        if self.contains(query) {
            return Ok(true);
        }
        if self.is_dropped(query) {
            return Ok(false);
        }
        let exists = probe.trigger_exists(query)?;
        debug!(
            "Probed trigger {} on {}.{}: {}",
            query.name, query.schema, query.table, exists
        );
        if exists {
            self.add(query);
        }
        Ok(exists)
    }
}
