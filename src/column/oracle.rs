use super::{ColumnContext, ColumnDefiner, DEFAULT, join};
use crate::model::column::binary_hex;
use crate::model::naming::limit_name;
use crate::model::{Column, ColumnKind, ColumnVariant, DateTimeDefault};
use crate::render::{escape_string, quote_ident};

/// DEFAULT goes before NOT NULL; booleans are numbers with a named check.
pub struct OracleDefiner(pub ColumnVariant);

pub fn boolean_check_name(grain: &str, table: &str, column: &str) -> String {
    quote_ident(&limit_name(&format!("chk_{}_{}_{}", grain, table, column)))
}

impl OracleDefiner {
    fn internal_definition(&self, ctx: &ColumnContext) -> String {
        join(&[&ctx.column.quoted_name(), &self.column_type(ctx.column)])
    }
}

impl ColumnDefiner for OracleDefiner {
    fn db_field_type(&self) -> &'static str {
        match self.0 {
            ColumnVariant::Integer | ColumnVariant::Boolean => "number",
            ColumnVariant::Floating => "real",
            ColumnVariant::Decimal => "NUMBER",
            ColumnVariant::String => "nvarchar2",
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
                None => "nclob".to_string(),
            },
            _ => self.db_field_type().to_string(),
        }
    }

    /// An empty string default reads back as NULL, so such columns stay
    /// nullable.
    fn nullable(&self, ctx: &ColumnContext) -> &'static str {
        match &ctx.column.kind {
            ColumnKind::String {
                default: Some(d), ..
            } if d.is_empty() => "null",
            _ if ctx.column.nullable => "null",
            _ => "not null",
        }
    }

    fn default_definition(&self, ctx: &ColumnContext) -> String {
        let value = match &ctx.column.kind {
            // fed by a before-insert trigger
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
                DateTimeDefault::GetDate => "sysdate".to_string(),
                DateTimeDefault::Date(date) => format!("date '{}'", date.format("%Y-%m-%d")),
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
            ColumnVariant::Boolean => format!(
                "constraint {} check ({} in (0, 1))",
                boolean_check_name(ctx.grain, ctx.table, &ctx.column.name),
                ctx.column.quoted_name()
            ),
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
