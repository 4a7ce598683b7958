//! Forms shared by the two open source engines.

use super::{DdlStrategy, Session};
use crate::catalog::DbColumnInfo;
use crate::column::ColumnContext;
use crate::constants::CONJUGATE_INDEX_POSTFIX;
use crate::error::GenerationError;
use crate::model::{Column, ColumnKind, Grain, Table};
use crate::registry::TriggerQuery;
use crate::render::{RenderedSql, quote_ident, quote_qualified};

pub fn drop_trigger(query: &TriggerQuery) -> RenderedSql {
    RenderedSql::destructive(format!(
        "DROP TRIGGER {} ON {}",
        quote_ident(&query.name),
        quote_qualified(&query.schema, &query.table)
    ))
}

/// Drops the index together with its conjugate; either may be missing.
pub fn drop_index(grain: &str, index: &str) -> Vec<RenderedSql> {
    [index.to_string(), format!("{}{}", index, CONJUGATE_INDEX_POSTFIX)]
        .iter()
        .map(|name| RenderedSql::destructive(format!("DROP INDEX IF EXISTS {}", quote_qualified(grain, name))))
        .collect()
}

pub fn drop_auto_increment(grain: &str, table: &str) -> RenderedSql {
    RenderedSql::destructive(format!(
        "drop sequence if exists {}",
        quote_qualified(grain, &format!("{}_seq", table))
    ))
}

/// Whether the live column needs its type changed: another variant, or
/// another length, precision or scale.
pub fn type_differs(column: &Column, actual: &DbColumnInfo) -> bool {
    if column.variant() != actual.variant {
        return true;
    }
    match &column.kind {
        ColumnKind::String { length, .. } => match length.bound() {
            Some(n) => actual.is_max || actual.length != n,
            None => !actual.is_max,
        },
        ColumnKind::Decimal {
            precision, scale, ..
        } => *precision != actual.length || *scale != actual.scale,
        _ => false,
    }
}

/// Default dropped first, then the type, nullability and default restored
/// in that order.
pub fn update_column(
    strategy: &dyn OpenSourceTypeChange,
    s: &Session,
    grain: &Grain,
    table: &Table,
    column: &Column,
    actual: &DbColumnInfo,
) -> Result<Vec<RenderedSql>, GenerationError> {
    let alter = format!(
        "ALTER TABLE {} ALTER COLUMN {}",
        quote_qualified(&grain.name, &table.name),
        column.quoted_name()
    );
    let mut result = vec![RenderedSql::new(format!("{} DROP DEFAULT", alter))];

    if type_differs(column, actual) {
        let column_type = s.mapper.column_type(column)?;
        result.push(RenderedSql::new(strategy.type_change(&alter, column, actual, &column_type)));
    }

    if column.nullable != actual.nullable {
        let change = if column.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        result.push(RenderedSql::new(format!("{} {}", alter, change)));
    }

    if column.has_default() {
        let ctx = ColumnContext::new(&grain.name, &table.name, column);
        result.push(RenderedSql::new(format!(
            "{} SET {}",
            alter,
            s.mapper.default_definition(&ctx)?
        )));
    }
    Ok(result)
}

/// How an engine spells `ALTER COLUMN` for a new type.
pub trait OpenSourceTypeChange: DdlStrategy {
    fn type_change(&self, alter: &str, column: &Column, actual: &DbColumnInfo, column_type: &str) -> String;
}
