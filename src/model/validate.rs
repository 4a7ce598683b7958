//! Model validation: shape rules for keys, indices, foreign keys and
//! sequences, plus resolution and type checking of every view expression.
//! Runs once after the model is built; generation assumes it passed.

use super::column::ColumnKind;
use super::graph::grain_order;
use super::view::result_columns;
use super::{Grain, MaterializedView, ParameterizedView, Score, Segment, Table};
use crate::constants::{REC_VERSION, SURROGATE_COUNT};
use crate::error::ModelError;
use crate::expr::resolve::{DeclaredParam, FieldResolver, ParameterResolver, SourceTable};
use crate::expr::{ExprKind, ExprType};
use std::collections::BTreeSet;
use tracing::debug;

pub fn validate_score(score: &Score) -> Result<(), ModelError> {
    let mut names = BTreeSet::new();
    for grain in &score.grains {
        if !names.insert(grain.name.as_str()) {
            return Err(duplicate("grain", &grain.name, "score"));
        }
    }
    for grain in &score.grains {
        debug!("Validating grain {}", grain.name);
        validate_grain(score, grain)?;
    }
    grain_order(score)?;
    Ok(())
}

fn duplicate(kind: &'static str, name: &str, owner: &str) -> ModelError {
    ModelError::Duplicate {
        kind,
        name: name.to_string(),
        owner: owner.to_string(),
    }
}

fn validate_grain(score: &Score, grain: &Grain) -> Result<(), ModelError> {
    let mut names = BTreeSet::new();
    let element_names = grain
        .tables
        .iter()
        .map(|t| t.name.as_str())
        .chain(grain.sequences.iter().map(|s| s.name.as_str()))
        .chain(grain.views.iter().map(|v| v.name.as_str()))
        .chain(grain.materialized_views.iter().map(|v| v.name.as_str()))
        .chain(grain.parameterized_views.iter().map(|v| v.name.as_str()));
    for name in element_names {
        if !names.insert(name) {
            return Err(duplicate("element", name, &grain.name));
        }
    }

    for sequence in &grain.sequences {
        sequence.validate()?;
    }
    for table in &grain.tables {
        validate_table(score, grain, table)?;
    }
    for view in &grain.views {
        validate_segments(score, grain, &view.name, &view.segments, |reason| {
            ModelError::View {
                view: view.name.clone(),
                reason,
            }
        })?;
    }
    for pv in &grain.parameterized_views {
        validate_parameterized_view(score, grain, pv)?;
    }
    for mv in &grain.materialized_views {
        validate_materialized_view(score, grain, mv)?;
    }
    Ok(())
}

pub fn validate_table(score: &Score, grain: &Grain, table: &Table) -> Result<(), ModelError> {
    let mut names = BTreeSet::new();
    for column in &table.columns {
        if !names.insert(column.name.as_str()) {
            return Err(duplicate("column", &column.name, &table.name));
        }
        if table.is_versioned() && column.name == REC_VERSION {
            return Err(ModelError::Column {
                table: table.name.clone(),
                column: column.name.clone(),
                reason: format!("'{}' is reserved for versioned tables", REC_VERSION),
            });
        }
        validate_column_default(grain, table, column)?;
    }

    validate_primary_key(table)?;

    let mut index_names = BTreeSet::new();
    let mut column_sets: Vec<&[String]> = Vec::new();
    for index in &table.indices {
        let fail = |reason: String| ModelError::Index {
            table: table.name.clone(),
            index: index.name.clone(),
            reason,
        };
        if !index_names.insert(index.name.as_str()) {
            return Err(duplicate("index", &index.name, &table.name));
        }
        if index.columns.is_empty() {
            return Err(fail("no columns".into()));
        }
        let mut seen = BTreeSet::new();
        for name in &index.columns {
            let column = table
                .column(name)
                .ok_or_else(|| fail(format!("unknown column '{}'", name)))?;
            if !seen.insert(name.as_str()) {
                return Err(fail(format!("column '{}' listed twice", name)));
            }
            if column.is_unbounded() {
                return Err(fail(format!("column '{}' is of an unbounded type", name)));
            }
        }
        if column_sets.contains(&index.columns.as_slice()) {
            return Err(fail("another index already covers the same columns".into()));
        }
        column_sets.push(&index.columns);
    }

    for fk in &table.foreign_keys {
        let fk_name = fk.constraint_name(&grain.name, &table.name);
        let fail = |reason: String| ModelError::ForeignKey {
            table: table.name.clone(),
            fk: fk_name.clone(),
            reason,
        };
        let target_grain = fk.references.grain_or(&grain.name);
        let target = score
            .table(target_grain, &fk.references.table)
            .ok_or_else(|| fail(format!("unknown table {}.{}", target_grain, fk.references.table)))?;
        let target_pk = target.pk_columns();
        if target_pk.is_empty() {
            return Err(fail("referenced table has no primary key".into()));
        }
        if target_pk.len() != fk.columns.len() {
            return Err(fail(format!(
                "{} columns reference a {}-column primary key",
                fk.columns.len(),
                target_pk.len()
            )));
        }
        for (name, referenced) in fk.columns.iter().zip(target_pk) {
            let column = table
                .column(name)
                .ok_or_else(|| fail(format!("unknown column '{}'", name)))?;
            if column.variant() != referenced.variant() {
                return Err(fail(format!(
                    "column '{}' is {} but '{}' is {}",
                    name,
                    column.variant(),
                    referenced.name,
                    referenced.variant()
                )));
            }
            if let (
                ColumnKind::String { length: a, .. },
                ColumnKind::String { length: b, .. },
            ) = (&column.kind, &referenced.kind)
                && a != b
            {
                return Err(fail(format!("column '{}' differs in length", name)));
            }
            let set_null = fk.on_delete == super::FkRule::SetNull || fk.on_update == super::FkRule::SetNull;
            if set_null && !column.nullable {
                return Err(fail(format!(
                    "SET NULL rule requires nullable column '{}'",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_primary_key(table: &Table) -> Result<(), ModelError> {
    let fail = |reason: String| ModelError::PrimaryKey {
        table: table.name.clone(),
        reason,
    };
    if table.primary_key.is_empty() {
        return match table.kind {
            super::TableKind::ReadOnly => Ok(()),
            _ => Err(fail("primary key is required".into())),
        };
    }
    let mut seen = BTreeSet::new();
    for name in &table.primary_key {
        let column = table
            .column(name)
            .ok_or_else(|| fail(format!("unknown column '{}'", name)))?;
        if !seen.insert(name.as_str()) {
            return Err(fail(format!("column '{}' listed twice", name)));
        }
        if column.nullable {
            return Err(fail(format!("column '{}' is nullable", name)));
        }
        if column.is_unbounded() {
            return Err(fail(format!(
                "column '{}' is of an unbounded type ({})",
                name,
                column.variant()
            )));
        }
    }
    Ok(())
}

fn validate_column_default(grain: &Grain, table: &Table, column: &super::Column) -> Result<(), ModelError> {
    let fail = |reason: String| ModelError::Column {
        table: table.name.clone(),
        column: column.name.clone(),
        reason,
    };
    match &column.kind {
        ColumnKind::Integer {
            default: Some(_),
            sequence: Some(_),
        } => Err(fail("a sequence-backed column cannot also declare a default".into())),
        ColumnKind::Integer {
            sequence: Some(seq), ..
        } if grain.sequence(seq).is_none() => Err(fail(format!("unknown sequence '{}'", seq))),
        ColumnKind::Decimal {
            precision,
            scale,
            default,
        } => {
            if *precision == 0 || scale > precision {
                return Err(fail(format!("invalid precision/scale ({},{})", precision, scale)));
            }
            match default {
                Some(d) if d.parse::<f64>().is_err() => {
                    Err(fail(format!("default '{}' is not a number", d)))
                }
                _ => Ok(()),
            }
        }
        ColumnKind::String {
            length: super::StringLength::Bounded(0),
            ..
        } => Err(fail("string length must be positive".into())),
        ColumnKind::Binary { default: Some(d) } => {
            let hex = super::column::binary_hex(d);
            if !d.to_ascii_lowercase().starts_with("0x")
                || hex.is_empty()
                || !hex.chars().all(|c| c.is_ascii_hexdigit())
            {
                Err(fail(format!("default '{}' is not a 0x-prefixed hex literal", d)))
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

/// Resolves and checks every segment; segments of one view must agree on
/// column count and type.
fn validate_segments(
    score: &Score,
    grain: &Grain,
    view: &str,
    segments: &[Segment],
    fail: impl Fn(String) -> ModelError,
) -> Result<(), ModelError> {
    if segments.is_empty() {
        return Err(fail("no select segments".into()));
    }
    for segment in segments {
        let mut aliases = BTreeSet::new();
        let mut sources = Vec::new();
        for item in &segment.from {
            if !aliases.insert(item.alias.as_str()) {
                return Err(duplicate("table alias", &item.alias, view));
            }
            let target_grain = item.table.grain_or(&grain.name);
            let table = score
                .table(target_grain, &item.table.table)
                .ok_or_else(|| ModelError::Unknown {
                    kind: "table",
                    name: format!("{}.{}", target_grain, item.table.table),
                })?;
            sources.push(SourceTable {
                alias: &item.alias,
                grain: target_grain,
                table,
            });
        }
        if sources.is_empty() {
            return Err(fail("empty FROM list".into()));
        }

        let resolver = FieldResolver::new(sources);
        let mut columns = BTreeSet::new();
        for column in &segment.columns {
            if !columns.insert(column.alias.as_str()) {
                return Err(duplicate("column", &column.alias, view));
            }
            resolver.resolve(&column.expr)?;
            let ty = column.expr.expr_type()?;
            if ty == ExprType::Logic {
                return Err(fail(format!("column '{}' is a condition, not a value", column.alias)));
            }
        }
        for item in segment.from.iter().skip(1) {
            if let Some(join) = &item.join {
                resolver.resolve(&join.on)?;
                join.on.check_condition("JOIN ... ON")?;
            }
        }
        if let Some(filter) = &segment.filter {
            resolver.resolve(filter)?;
            filter.check_condition("WHERE")?;
        }

        for alias in &segment.group_by {
            let column = segment
                .column(alias)
                .ok_or_else(|| fail(format!("group by references unknown column '{}'", alias)))?;
            if column.expr.is_aggregate() {
                return Err(fail(format!("cannot group by aggregate column '{}'", alias)));
            }
        }
        let aggregated = segment.columns.iter().any(|c| c.expr.is_aggregate());
        if aggregated || !segment.group_by.is_empty() {
            for column in &segment.columns {
                if !column.expr.is_aggregate() && !segment.is_group_by(&column.alias) {
                    return Err(fail(format!(
                        "column '{}' is neither an aggregate nor part of the group by list",
                        column.alias
                    )));
                }
            }
        }
    }

    let lead = result_columns(segments);
    for segment in &segments[1..] {
        if segment.columns.len() != lead.len() {
            return Err(fail("UNION ALL segments differ in column count".into()));
        }
        for ((alias, expr), column) in lead.iter().zip(&segment.columns) {
            let (a, b) = (expr.expr_type()?, column.expr.expr_type()?);
            if a != b && !(a.is_numeric() && b.is_numeric()) {
                return Err(fail(format!(
                    "column '{}' is {} in one segment and {} in another",
                    alias, a, b
                )));
            }
        }
    }
    Ok(())
}

fn validate_parameterized_view(
    score: &Score,
    grain: &Grain,
    pv: &ParameterizedView,
) -> Result<(), ModelError> {
    let mut declared = Vec::new();
    let mut names = BTreeSet::new();
    for param in &pv.parameters {
        if !names.insert(param.name.as_str()) {
            return Err(duplicate("parameter", &param.name, &pv.name));
        }
        declared.push(DeclaredParam {
            name: &param.name,
            ty: param.ty,
        });
    }

    // parameters are bound before field checks so filters type check
    let mut params = ParameterResolver::new(declared);
    for segment in &pv.segments {
        for column in &segment.columns {
            params.resolve(&column.expr)?;
        }
        for item in &segment.from {
            if let Some(join) = &item.join {
                params.resolve(&join.on)?;
            }
        }
        if let Some(filter) = &segment.filter {
            params.resolve(filter)?;
        }
    }
    if let Some(unused) = params.unused().first() {
        return Err(ModelError::UnusedParameter(unused.to_string()));
    }

    validate_segments(score, grain, &pv.name, &pv.segments, |reason| ModelError::View {
        view: pv.name.clone(),
        reason,
    })
}

fn validate_materialized_view(
    score: &Score,
    grain: &Grain,
    mv: &MaterializedView,
) -> Result<(), ModelError> {
    let fail = |reason: &str| ModelError::MaterializedView {
        view: mv.name.clone(),
        reason: reason.to_string(),
    };
    validate_segments(score, grain, &mv.name, &mv.segments, |reason| {
        ModelError::MaterializedView {
            view: mv.name.clone(),
            reason,
        }
    })?;

    let [segment] = mv.segments.as_slice() else {
        return Err(fail("exactly one select segment is required"));
    };
    let [source] = segment.from.as_slice() else {
        return Err(fail("exactly one source table is required"));
    };
    if source.table.grain_or(&grain.name) != grain.name {
        return Err(fail("the source table must belong to the same grain"));
    }
    if segment.filter.is_some() {
        return Err(fail("a filter condition is not allowed"));
    }
    if segment.distinct {
        return Err(fail("DISTINCT is not allowed"));
    }

    let mut aggregates = 0;
    for column in &segment.columns {
        if column.alias == SURROGATE_COUNT {
            return Err(fail("'surrogate_count' is a reserved column name"));
        }
        match &column.expr.kind {
            ExprKind::Count => aggregates += 1,
            ExprKind::Sum(inner) => {
                if inner.field_binding().is_none() {
                    return Err(fail("SUM must aggregate a plain column"));
                }
                aggregates += 1;
            }
            ExprKind::Max(_) | ExprKind::Min(_) => {
                return Err(fail("only COUNT and SUM aggregates are supported"));
            }
            _ => {
                let binding = column
                    .expr
                    .field_binding()
                    .ok_or_else(|| fail("group columns must be plain column references"))?;
                if binding.column.is_unbounded() {
                    return Err(fail("group columns cannot be of an unbounded type"));
                }
            }
        }
    }
    if aggregates == 0 {
        return Err(fail("at least one aggregate column is required"));
    }
    if segment.group_by.is_empty() {
        return Err(fail("a group by list is required"));
    }
    Ok(())
}
