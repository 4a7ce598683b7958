use serde::{Deserialize, Serialize};
use std::fmt;

/// Inferred type of a scalar expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprType {
    /// Result of comparisons and boolean connectives
    Logic,
    Real,
    Decimal,
    Int,
    Text,
    Date,
    DateWithTimeZone,
    /// Boolean column or literal
    Bit,
    Blob,
}

/// Comparison families: members of one family compare with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Numeric,
    Text,
    Date,
    Other,
}

impl ExprType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ExprType::Int | ExprType::Real | ExprType::Decimal)
    }

    pub fn family(self) -> TypeFamily {
        match self {
            ExprType::Int | ExprType::Real | ExprType::Decimal => TypeFamily::Numeric,
            ExprType::Text => TypeFamily::Text,
            ExprType::Date => TypeFamily::Date,
            _ => TypeFamily::Other,
        }
    }

    /// Arithmetic promotion: decimal wins over real, real over int.
    pub fn promote(self, other: ExprType) -> ExprType {
        match (self, other) {
            (ExprType::Decimal, _) | (_, ExprType::Decimal) => ExprType::Decimal,
            (ExprType::Real, _) | (_, ExprType::Real) => ExprType::Real,
            _ => ExprType::Int,
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExprType::Logic => "LOGIC",
            ExprType::Real => "REAL",
            ExprType::Decimal => "DECIMAL",
            ExprType::Int => "INT",
            ExprType::Text => "TEXT",
            ExprType::Date => "DATE",
            ExprType::DateWithTimeZone => "DATE WITH TIME ZONE",
            ExprType::Bit => "BIT",
            ExprType::Blob => "BLOB",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprMeta {
    pub ty: ExprType,
    pub nullable: bool,
}

impl ExprMeta {
    pub fn new(ty: ExprType, nullable: bool) -> Self {
        Self { ty, nullable }
    }

    pub fn not_null(ty: ExprType) -> Self {
        Self::new(ty, false)
    }
}
