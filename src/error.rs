//! Error taxonomy: model errors are raised while resolving and checking the
//! schema model, generation errors when a dialect cannot express a construct,
//! and execution errors when the statement sink rejects a statement.

use crate::dialect::Dialect;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Cannot resolve field reference '{0}'")]
    UnresolvedField(String),

    #[error("Ambiguous field reference '{0}'")]
    AmbiguousField(String),

    #[error("Cannot resolve parameter '{0}'")]
    UnresolvedParameter(String),

    #[error("Parameter '{0}' is declared but never used")]
    UnusedParameter(String),

    #[error("Wrong expression type for {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("Duplicate {kind} '{name}' in {owner}")]
    Duplicate {
        kind: &'static str,
        name: String,
        owner: String,
    },

    #[error("Unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },

    #[error("Invalid column {table}.{column}: {reason}")]
    Column {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Invalid primary key on table {table}: {reason}")]
    PrimaryKey { table: String, reason: String },

    #[error("Invalid index {index} on table {table}: {reason}")]
    Index {
        table: String,
        index: String,
        reason: String,
    },

    #[error("Invalid foreign key {fk} on table {table}: {reason}")]
    ForeignKey {
        table: String,
        fk: String,
        reason: String,
    },

    #[error("Invalid sequence {sequence}: {reason}")]
    Sequence { sequence: String, reason: String },

    #[error("Invalid view {view}: {reason}")]
    View { view: String, reason: String },

    #[error("Invalid materialized view {view}: {reason}")]
    MaterializedView { view: String, reason: String },

    #[error("Foreign keys form a cycle between grains: {}", .0.join(" -> "))]
    GrainCycle(Vec<String>),
}

impl ModelError {
    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl std::fmt::Display,
    ) -> Self {
        ModelError::TypeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}

/// Failure reported by the observed-schema probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProbeError {
    pub message: String,
}

impl ProbeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{dialect} cannot represent {construct} for {element}")]
    Unsupported {
        dialect: Dialect,
        construct: String,
        element: String,
    },

    #[error("Could not update {what} on {element}: {source}")]
    Probe {
        what: String,
        element: String,
        #[source]
        source: ProbeError,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl GenerationError {
    pub fn probe(what: impl Into<String>, element: impl Into<String>, source: ProbeError) -> Self {
        GenerationError::Probe {
            what: what.into(),
            element: element.into(),
            source,
        }
    }
}

/// Failure reported by the statement sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SinkError {
    pub message: String,
    /// Engine error code, when the sink knows it
    pub code: Option<String>,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error while trying to {operation} {element}: {source}")]
pub struct ExecutionError {
    pub element: String,
    pub operation: String,
    pub statement: String,
    #[source]
    pub source: SinkError,
}

#[derive(Debug, Error)]
pub enum GrainError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Error while trying to {operation} {element}: {source}")]
    Generation {
        element: String,
        operation: String,
        #[source]
        source: GenerationError,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

pub type GrainResult<T> = std::result::Result<T, GrainError>;
