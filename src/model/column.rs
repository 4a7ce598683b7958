use crate::expr::ExprType;
use crate::render::quote_ident;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default = "nullable_by_default")]
    pub nullable: bool,
    #[serde(flatten)]
    pub kind: ColumnKind,
}

fn nullable_by_default() -> bool {
    true
}

/// The eight column variants with their typed defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnKind {
    Integer {
        #[serde(default)]
        default: Option<i64>,
        /// Sequence of the owning grain feeding this column
        #[serde(default)]
        sequence: Option<String>,
    },
    Floating {
        #[serde(default)]
        default: Option<f64>,
    },
    Decimal {
        precision: u32,
        scale: u32,
        /// Kept as written so no precision is lost
        #[serde(default)]
        default: Option<String>,
    },
    Boolean {
        #[serde(default)]
        default: Option<bool>,
    },
    String {
        length: StringLength,
        #[serde(default)]
        default: Option<String>,
    },
    Binary {
        /// `0x`-prefixed hex literal
        #[serde(default)]
        default: Option<String>,
    },
    DateTime {
        #[serde(default)]
        default: Option<DateTimeDefault>,
    },
    ZonedDateTime,
}

/// Key of the column type mapper table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnVariant {
    Integer,
    Floating,
    Decimal,
    Boolean,
    String,
    Binary,
    DateTime,
    ZonedDateTime,
}

impl ColumnVariant {
    pub const ALL: [ColumnVariant; 8] = [
        ColumnVariant::Integer,
        ColumnVariant::Floating,
        ColumnVariant::Decimal,
        ColumnVariant::Boolean,
        ColumnVariant::String,
        ColumnVariant::Binary,
        ColumnVariant::DateTime,
        ColumnVariant::ZonedDateTime,
    ];

    /// Column variant used to declare a value of the given expression type.
    pub fn for_expr_type(ty: ExprType) -> Option<ColumnVariant> {
        match ty {
            ExprType::Int => Some(ColumnVariant::Integer),
            ExprType::Real => Some(ColumnVariant::Floating),
            ExprType::Decimal => Some(ColumnVariant::Decimal),
            ExprType::Bit => Some(ColumnVariant::Boolean),
            ExprType::Text => Some(ColumnVariant::String),
            ExprType::Blob => Some(ColumnVariant::Binary),
            ExprType::Date => Some(ColumnVariant::DateTime),
            ExprType::DateWithTimeZone => Some(ColumnVariant::ZonedDateTime),
            ExprType::Logic => None,
        }
    }
}

impl fmt::Display for ColumnVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnVariant::Integer => "INT",
            ColumnVariant::Floating => "REAL",
            ColumnVariant::Decimal => "DECIMAL",
            ColumnVariant::Boolean => "BIT",
            ColumnVariant::String => "VARCHAR",
            ColumnVariant::Binary => "BLOB",
            ColumnVariant::DateTime => "DATETIME",
            ColumnVariant::ZonedDateTime => "DATETIME WITH TIME ZONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLength {
    Bounded(u32),
    /// Declared as `MAX`: a text blob
    Max,
}

impl StringLength {
    pub fn is_max(self) -> bool {
        matches!(self, StringLength::Max)
    }

    pub fn bound(self) -> Option<u32> {
        match self {
            StringLength::Bounded(n) => Some(n),
            StringLength::Max => None,
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum StringLengthRepr {
    Bounded(u32),
    Word(String),
}

impl Serialize for StringLength {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StringLength::Bounded(n) => StringLengthRepr::Bounded(*n),
            StringLength::Max => StringLengthRepr::Word("max".to_string()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringLength {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StringLengthRepr::deserialize(deserializer)? {
            StringLengthRepr::Bounded(n) => Ok(StringLength::Bounded(n)),
            StringLengthRepr::Word(w) if w.eq_ignore_ascii_case("max") => Ok(StringLength::Max),
            StringLengthRepr::Word(w) => Err(serde::de::Error::custom(format!(
                "string length must be a number or 'max', got '{}'",
                w
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeDefault {
    /// Current timestamp at insertion
    GetDate,
    Date(NaiveDate),
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            kind,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(
            name,
            ColumnKind::Integer {
                default: None,
                sequence: None,
            },
        )
    }

    pub fn string(name: impl Into<String>, length: StringLength) -> Self {
        Self::new(
            name,
            ColumnKind::String {
                length,
                default: None,
            },
        )
    }

    pub fn quoted_name(&self) -> String {
        quote_ident(&self.name)
    }

    pub fn variant(&self) -> ColumnVariant {
        match self.kind {
            ColumnKind::Integer { .. } => ColumnVariant::Integer,
            ColumnKind::Floating { .. } => ColumnVariant::Floating,
            ColumnKind::Decimal { .. } => ColumnVariant::Decimal,
            ColumnKind::Boolean { .. } => ColumnVariant::Boolean,
            ColumnKind::String { .. } => ColumnVariant::String,
            ColumnKind::Binary { .. } => ColumnVariant::Binary,
            ColumnKind::DateTime { .. } => ColumnVariant::DateTime,
            ColumnKind::ZonedDateTime => ColumnVariant::ZonedDateTime,
        }
    }

    pub fn expr_type(&self) -> ExprType {
        match self.kind {
            ColumnKind::Integer { .. } => ExprType::Int,
            ColumnKind::Floating { .. } => ExprType::Real,
            ColumnKind::Decimal { .. } => ExprType::Decimal,
            ColumnKind::Boolean { .. } => ExprType::Bit,
            ColumnKind::String { .. } => ExprType::Text,
            ColumnKind::Binary { .. } => ExprType::Blob,
            ColumnKind::DateTime { .. } => ExprType::Date,
            ColumnKind::ZonedDateTime => ExprType::DateWithTimeZone,
        }
    }

    /// Unbounded text and binary columns cannot take part in keys or indices.
    pub fn is_unbounded(&self) -> bool {
        match &self.kind {
            ColumnKind::String { length, .. } => length.is_max(),
            ColumnKind::Binary { .. } => true,
            _ => false,
        }
    }

    pub fn sequence(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Integer { sequence, .. } => sequence.as_deref(),
            _ => None,
        }
    }

    pub fn has_default(&self) -> bool {
        match &self.kind {
            ColumnKind::Integer { default, sequence } => default.is_some() || sequence.is_some(),
            ColumnKind::Floating { default } => default.is_some(),
            ColumnKind::Decimal { default, .. } => default.is_some(),
            ColumnKind::Boolean { default } => default.is_some(),
            ColumnKind::String { default, .. } => default.is_some(),
            ColumnKind::Binary { default } => default.is_some(),
            ColumnKind::DateTime { default } => default.is_some(),
            ColumnKind::ZonedDateTime => false,
        }
    }

    /// The default rendered the way the observed-schema probe reports it,
    /// used when diffing against the live column.
    pub fn default_text(&self) -> String {
        match &self.kind {
            ColumnKind::Integer { default, .. } => default.map(|d| d.to_string()),
            ColumnKind::Floating { default } => default.map(|d| d.to_string()),
            ColumnKind::Decimal { default, .. } => default.clone(),
            ColumnKind::Boolean { default } => default.map(|d| d.to_string()),
            ColumnKind::String { default, .. } => default.as_ref().map(|d| format!("'{}'", d)),
            ColumnKind::Binary { default } => default.clone(),
            ColumnKind::DateTime { default } => default.map(|d| match d {
                DateTimeDefault::GetDate => "GETDATE()".to_string(),
                DateTimeDefault::Date(date) => format!("'{}'", date.format("%Y%m%d")),
            }),
            ColumnKind::ZonedDateTime => None,
        }
        .unwrap_or_default()
    }
}

/// Hex payload of a `0x`-prefixed binary default.
pub fn binary_hex(default: &str) -> &str {
    default
        .strip_prefix("0x")
        .or_else(|| default.strip_prefix("0X"))
        .unwrap_or(default)
}
