use super::{ColumnContext, ColumnDefiner, DEFAULT};
use crate::model::{Column, ColumnKind, ColumnVariant, DateTimeDefault};
use crate::render::{escape_string, quote_qualified};

pub struct MsSqlDefiner(pub ColumnVariant);

/// Default constraints are named so ALTER can drop them later.
pub fn default_constraint_name(table: &str, column: &str) -> String {
    format!("\"def_{}_{}\"", table, column)
}

impl MsSqlDefiner {
    fn default_value(&self, ctx: &ColumnContext) -> Option<String> {
        match &ctx.column.kind {
            ColumnKind::Integer {
                sequence: Some(seq),
                ..
            } => Some(format!("next value for {}", quote_qualified(ctx.grain, seq))),
            ColumnKind::Integer { default, .. } => default.map(|d| d.to_string()),
            ColumnKind::Floating { default } => default.map(|d| d.to_string()),
            ColumnKind::Decimal { default, .. } => default.clone(),
            ColumnKind::Boolean { default } => default.map(|d| format!("'{}'", d)),
            ColumnKind::String { default, .. } => default.as_deref().map(escape_string),
            ColumnKind::Binary { default } => default.clone(),
            ColumnKind::DateTime { default } => default.map(|d| match d {
                DateTimeDefault::GetDate => "getdate()".to_string(),
                DateTimeDefault::Date(date) => format!("'{}'", date.format("%Y%m%d")),
            }),
            ColumnKind::ZonedDateTime => None,
        }
    }
}

impl ColumnDefiner for MsSqlDefiner {
    fn db_field_type(&self) -> &'static str {
        match self.0 {
            ColumnVariant::Integer => "int",
            ColumnVariant::Floating => "float(53)",
            ColumnVariant::Decimal => "decimal",
            ColumnVariant::Boolean => "bit",
            ColumnVariant::String => "nvarchar",
            ColumnVariant::Binary => "varbinary(max)",
            ColumnVariant::DateTime => "datetime",
            ColumnVariant::ZonedDateTime => "datetimeoffset",
        }
    }

    fn column_type(&self, column: &Column) -> String {
        match &column.kind {
            ColumnKind::Decimal {
                precision, scale, ..
            } => format!("{}({},{})", self.db_field_type(), precision, scale),
            ColumnKind::String { length, .. } => match length.bound() {
                Some(n) => format!("{}({})", self.db_field_type(), n),
                None => format!("{}(max)", self.db_field_type()),
            },
            _ => self.db_field_type().to_string(),
        }
    }

    fn default_definition(&self, ctx: &ColumnContext) -> String {
        self.default_value(ctx)
            .map(|v| {
                format!(
                    "constraint {} {}{}",
                    default_constraint_name(ctx.table, &ctx.column.name),
                    DEFAULT,
                    v
                )
            })
            .unwrap_or_default()
    }

    /// Used inside function and table-type bodies where sequences and
    /// named constraints are not allowed.
    fn light_default_definition(&self, ctx: &ColumnContext) -> String {
        if ctx.column.sequence().is_some() {
            return String::new();
        }
        self.default_value(ctx)
            .map(|v| format!("{}{}", DEFAULT, v))
            .unwrap_or_default()
    }
}
