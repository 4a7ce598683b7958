use super::{ColumnContext, ColumnDefiner, DEFAULT, join};
use crate::model::column::binary_hex;
use crate::model::{Column, ColumnKind, ColumnVariant, DateTimeDefault};
use crate::render::escape_string;

pub struct FirebirdDefiner(pub ColumnVariant);

impl FirebirdDefiner {
    fn internal_definition(&self, ctx: &ColumnContext) -> String {
        join(&[&ctx.column.quoted_name(), &self.column_type(ctx.column)])
    }
}

impl ColumnDefiner for FirebirdDefiner {
    fn db_field_type(&self) -> &'static str {
        match self.0 {
            ColumnVariant::Integer => "integer",
            ColumnVariant::Floating => "FLOAT",
            ColumnVariant::Decimal => "DECIMAL",
            ColumnVariant::Boolean => "SMALLINT",
            ColumnVariant::String => "varchar",
            ColumnVariant::Binary => "blob",
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
                None => "blob sub_type text".to_string(),
            },
            _ => self.db_field_type().to_string(),
        }
    }

    fn default_definition(&self, ctx: &ColumnContext) -> String {
        let value = match &ctx.column.kind {
            ColumnKind::Integer {
                sequence: Some(_), ..
            } => None,
            ColumnKind::Integer { default, .. } => default.map(|d| d.to_string()),
            ColumnKind::Floating { default } => default.map(|d| d.to_string()),
            ColumnKind::Decimal { default, .. } => default.clone(),
            ColumnKind::Boolean { default } => default.map(|d| if d { "1" } else { "0" }.to_string()),
            ColumnKind::String { default, .. } => default.as_deref().map(escape_string),
            ColumnKind::Binary { default } => {
                default.as_deref().map(|d| format!("'{}'", binary_hex(d)))
            }
            ColumnKind::DateTime { default } => default.map(|d| match d {
                DateTimeDefault::GetDate => "CURRENT_TIMESTAMP".to_string(),
                DateTimeDefault::Date(date) => format!("'{}'", date.format("%d.%m.%Y")),
            }),
            ColumnKind::ZonedDateTime => None,
        };
        value.map(|v| format!("{}{}", DEFAULT, v)).unwrap_or_default()
    }

    fn main_definition(&self, ctx: &ColumnContext) -> String {
        join(&[&self.internal_definition(ctx), self.nullable(ctx)])
    }

    fn full_definition(&self, ctx: &ColumnContext) -> String {
        let check = match self.0 {
            ColumnVariant::Boolean => format!("check ({} in (0, 1))", ctx.column.quoted_name()),
            _ => String::new(),
        };
        join(&[
            &self.internal_definition(ctx),
            &self.default_definition(ctx),
            self.nullable(ctx),
            &check,
        ])
    }
}
