use super::{ColumnContext, ColumnDefiner, DEFAULT};
use crate::model::column::binary_hex;
use crate::model::{Column, ColumnKind, ColumnVariant, DateTimeDefault};
use crate::render::{escape_string, quote_qualified};

pub struct H2Definer(pub ColumnVariant);

impl ColumnDefiner for H2Definer {
    fn db_field_type(&self) -> &'static str {
        match self.0 {
            ColumnVariant::Integer => "integer",
            ColumnVariant::Floating => "double",
            ColumnVariant::Decimal => "DECIMAL",
            ColumnVariant::Boolean => "boolean",
            ColumnVariant::String => "varchar",
            ColumnVariant::Binary => "varbinary",
            ColumnVariant::DateTime => "timestamp",
            ColumnVariant::ZonedDateTime => "timestamp with time zone",
        }
    }

    fn column_type(&self, column: &Column) -> String {
        match &column.kind {
            ColumnKind::Decimal {
                precision, scale, ..
            } => format!("{}({},{})", self.db_field_type(), precision, scale),
            ColumnKind::String { length, .. } => match length.bound() {
                Some(n) => format!("{}({})", self.db_field_type(), n),
                None => "clob".to_string(),
            },
            _ => self.db_field_type().to_string(),
        }
    }

    fn default_definition(&self, ctx: &ColumnContext) -> String {
        let value = match &ctx.column.kind {
            ColumnKind::Integer {
                sequence: Some(seq),
                ..
            } => Some(format!("{}.nextval", quote_qualified(ctx.grain, seq))),
            ColumnKind::Integer { default, .. } => default.map(|d| d.to_string()),
            ColumnKind::Floating { default } => default.map(|d| d.to_string()),
            ColumnKind::Decimal { default, .. } => default.clone(),
            ColumnKind::Boolean { default } => default.map(|d| d.to_string()),
            ColumnKind::String { default, .. } => default.as_deref().map(escape_string),
            ColumnKind::Binary { default } => {
                default.as_deref().map(|d| format!("X'{}'", binary_hex(d)))
            }
            ColumnKind::DateTime { default } => default.map(|d| match d {
                DateTimeDefault::GetDate => "NOW()".to_string(),
                DateTimeDefault::Date(date) => format!("'{}'", date.format("%Y-%m-%d")),
            }),
            ColumnKind::ZonedDateTime => None,
        };
        value.map(|v| format!("{}{}", DEFAULT, v)).unwrap_or_default()
    }
}
