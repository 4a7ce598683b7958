use super::mv::{MvShape, RowValues};
use super::open_source::type_differs;
use super::{DdlStrategy, SequenceFeed, Session, param_type_name, result_column_type, result_columns, sequence_feed};
use crate::catalog::{DbColumnInfo, sequence_in_default};
use crate::checksum::checksum_comment;
use crate::column::ColumnContext;
use crate::constants::{REC_VERSION, SURROGATE_COUNT};
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::expr::render::{RenderHooks, render_select};
use crate::expr::{Expr, ExprKind, ExprType};
use crate::model::naming::{flat_name, limit_name};
use crate::model::{Column, ColumnVariant, Grain, Index, ParameterizedView, Sequence, Table};
use crate::registry::{TriggerKind, TriggerQuery};
use crate::render::{RenderedSql, quote_ident, quoted_list};
use chrono::NaiveDate;
use std::collections::HashMap;

pub struct FirebirdStrategy;

struct FirebirdHooks;

impl RenderHooks for FirebirdHooks {
    fn bool_literal(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_string()
    }

    fn param_placeholder(&self, name: &str) -> String {
        format!(":{}", name)
    }

    fn current_timestamp(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("'{}'", date.format("%Y-%m-%d"))
    }

    fn view_name(&self, grain: &str, name: &str) -> String {
        flat(grain, name)
    }

    fn preamble(&self, grain: &str, name: &str) -> String {
        format!("create view {} as", self.view_name(grain, name))
    }

    fn table_ref(&self, grain: &str, table: &str, alias: &str) -> String {
        format!("{} {}", flat(grain, table), quote_ident(alias))
    }
}

fn flat(grain: &str, name: &str) -> String {
    quote_ident(&flat_name(grain, name))
}

fn versioning_query(grain: &str, table: &str) -> TriggerQuery {
    TriggerQuery::new(grain, table, limit_name(&format!("{}_{}_version_check", grain, table)))
        .with_kind(TriggerKind::PreUpdate)
}

fn sequence_query(grain: &str, table: &str, column: &str) -> TriggerQuery {
    TriggerQuery::new(
        grain,
        table,
        limit_name(&format!("{}_{}_{}_seq_trigger", grain, table, column)),
    )
    .with_kind(TriggerKind::PreInsert)
}

/// Type changes the engine refuses in place.
fn needs_copy(column: &Column, actual: &DbColumnInfo) -> bool {
    let variant = column.variant();
    if variant != actual.variant {
        return (variant == ColumnVariant::Integer && actual.variant == ColumnVariant::String)
            || variant == ColumnVariant::Boolean;
    }
    match variant {
        ColumnVariant::String => column.is_unbounded() != actual.is_max,
        ColumnVariant::Decimal => type_differs(column, actual),
        _ => false,
    }
}

/// Widest string column each text parameter is compared with; 0 when one of
/// them is unbounded.
fn text_param_lengths(view: &ParameterizedView) -> HashMap<String, u32> {
    let is_text_param = |name: &str| {
        view.parameters
            .iter()
            .any(|p| p.name == name && p.ty == ExprType::Text)
    };
    let mut lengths: HashMap<String, u32> = HashMap::new();
    let mut visit = |expr: &Expr| -> Result<(), ()> {
        if !matches!(
            expr.kind,
            ExprKind::Compare { .. } | ExprKind::Between { .. } | ExprKind::In { .. }
        ) {
            return Ok(());
        }
        let operands = expr.children();
        let bounds: Vec<u32> = operands
            .iter()
            .filter_map(|e| e.field_binding())
            .filter(|b| b.column.variant() == ColumnVariant::String)
            .map(|b| match &b.column.kind {
                crate::model::ColumnKind::String { length, .. } => length.bound().unwrap_or(0),
                _ => 0,
            })
            .collect();
        for operand in &operands {
            let ExprKind::Param(param) = &operand.kind else {
                continue;
            };
            if !is_text_param(&param.name) {
                continue;
            }
            for bound in &bounds {
                lengths
                    .entry(param.name.clone())
                    .and_modify(|current| {
                        *current = if *current == 0 || *bound == 0 { 0 } else { (*current).max(*bound) }
                    })
                    .or_insert(*bound);
            }
        }
        Ok(())
    };
    for segment in &view.segments {
        let joins = segment.from.iter().filter_map(|f| f.join.as_ref().map(|j| &j.on));
        for expr in segment.filter.iter().chain(joins) {
            let _ = expr.walk(&mut visit);
        }
    }
    lengths
}

impl FirebirdStrategy {
    fn drop_existing(&self, s: &mut Session, query: &TriggerQuery) -> Result<Option<RenderedSql>, GenerationError> {
        if s.trigger_exists(query)? {
            s.forget(query);
            Ok(Some(self.drop_trigger(query)))
        } else {
            Ok(None)
        }
    }

    fn sequence_trigger(&self, s: &mut Session, grain: &Grain, table: &str, column: &Column, sequence: &str) -> RenderedSql {
        let query = sequence_query(&grain.name, table, &column.name);
        let increment = grain.sequence(sequence).map(Sequence::increment).unwrap_or(1);
        s.remember(&query);
        RenderedSql::new(format!(
            "CREATE OR ALTER TRIGGER {} for {} BEFORE INSERT AS BEGIN IF (NEW.{c} IS NULL) THEN NEW.{c} = GEN_ID({}, {}); END",
            quote_ident(&query.name),
            flat(&grain.name, table),
            flat(&grain.name, sequence),
            increment,
            c = column.quoted_name()
        ))
    }

    /// Renames the column away, adds it with the new type and copies the
    /// values over. The new column must be committed before it is filled.
    fn replace_via_copy(
        &self,
        s: &Session,
        grain: &str,
        table: &str,
        column: &Column,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let target = flat(grain, table);
        let temp = quote_ident(&limit_name(&format!("{}_temp", column.name)));
        let mut added = column.clone();
        added.nullable = true;
        Ok(vec![
            RenderedSql::new(format!(
                "ALTER TABLE {} ALTER COLUMN {} TO {}",
                target,
                column.quoted_name(),
                temp
            )),
            RenderedSql::new(format!(
                "ALTER TABLE {} ADD {}",
                target,
                s.full_definition(grain, table, &added)?
            )),
            RenderedSql::new("COMMIT"),
            RenderedSql::new(format!("UPDATE {} SET {} = {}", target, column.quoted_name(), temp)),
            RenderedSql::destructive(format!("ALTER TABLE {} DROP {}", target, temp)),
        ])
    }
}

impl DdlStrategy for FirebirdStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::Firebird
    }

    fn hooks(&self) -> &dyn RenderHooks {
        &FirebirdHooks
    }

    fn object_name(&self, grain: &str, name: &str) -> String {
        flat(grain, name)
    }

    fn create_schema(&self, _grain: &str) -> Option<RenderedSql> {
        None
    }

    /// A bare sequence restarted one step below its start, so the first
    /// `GEN_ID` yields the start value.
    fn create_sequence(&self, grain: &str, sequence: &Sequence) -> Vec<RenderedSql> {
        let name = self.object_name(grain, &sequence.name);
        vec![
            RenderedSql::new(format!("CREATE SEQUENCE {}", name)),
            RenderedSql::new(format!(
                "ALTER SEQUENCE {} RESTART WITH {}",
                name,
                sequence.start() - sequence.increment()
            )),
        ]
    }

    fn alter_sequence(&self, _grain: &str, _sequence: &Sequence) -> Vec<RenderedSql> {
        vec![]
    }

    fn after_create_table(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        Ok(table
            .columns
            .iter()
            .filter_map(|c| c.sequence().map(|seq| (c, seq)))
            .map(|(column, seq)| self.sequence_trigger(s, grain, &table.name, column, seq))
            .collect())
    }

    fn drop_column(&self, grain: &str, table: &str, column: &str) -> RenderedSql {
        RenderedSql::destructive(format!(
            "ALTER TABLE {} DROP {}",
            flat(grain, table),
            quote_ident(column)
        ))
    }

    fn update_column(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
        column: &Column,
        actual: &DbColumnInfo,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let target = flat(&grain.name, &table.name);
        let alter = format!("ALTER TABLE {} ALTER COLUMN {}", target, column.quoted_name());
        let mapper = s.mapper;
        let ctx = ColumnContext::new(&grain.name, &table.name, column);
        let mut result = Vec::new();

        result.extend(self.drop_existing(s, &versioning_query(&grain.name, &table.name))?);

        let observed_default = actual.default_value.trim();
        if !observed_default.is_empty() && sequence_in_default(observed_default).is_none() {
            result.push(RenderedSql::new(format!("{} DROP DEFAULT", alter)));
        }

        let copied = needs_copy(column, actual);
        if copied {
            result.extend(self.replace_via_copy(s, &grain.name, &table.name, column)?);
        } else if type_differs(column, actual) {
            result.push(RenderedSql::new(format!("{} TYPE {}", alter, mapper.column_type(column)?)));
        }

        // a copied column starts out nullable
        let was_nullable = copied || actual.nullable;
        if column.nullable != was_nullable {
            let change = if column.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
            result.push(RenderedSql::new(format!("{} {}", alter, change)));
        }

        let default = mapper.default_definition(&ctx)?;
        if !default.is_empty() {
            result.push(RenderedSql::new(format!("{} SET {}", alter, default)));
        }

        match sequence_feed(column, actual) {
            SequenceFeed::Create(sequence) => {
                result.push(self.sequence_trigger(s, grain, &table.name, column, sequence));
            }
            SequenceFeed::Drop => {
                result.extend(self.drop_existing(s, &sequence_query(&grain.name, &table.name, &column.name))?);
            }
            SequenceFeed::Keep => {}
        }
        Ok(result)
    }

    fn drop_pk(&self, grain: &str, table: &str, pk_name: &str) -> RenderedSql {
        RenderedSql::destructive(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            flat(grain, table),
            quote_ident(pk_name)
        ))
    }

    fn create_index(&self, grain: &str, table: &Table, index: &Index) -> Vec<RenderedSql> {
        vec![RenderedSql::new(format!(
            "CREATE INDEX {} ON {} ({})",
            flat(grain, &index.name),
            flat(grain, &table.name),
            quoted_list(&index.columns)
        ))]
    }

    fn drop_index(&self, grain: &str, _table: &str, index: &str) -> Vec<RenderedSql> {
        vec![RenderedSql::destructive(format!("DROP INDEX {}", flat(grain, index)))]
    }

    fn drop_trigger(&self, query: &TriggerQuery) -> RenderedSql {
        RenderedSql::destructive(format!("DROP TRIGGER {}", quote_ident(&query.name)))
    }

    /// Raises the `VERSION_CHECK_ERROR` exception on a stale record version.
    fn update_versioning_trigger(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let query = versioning_query(&grain.name, &table.name);
        let exists = s.trigger_exists(&query)?;
        if table.is_versioned() {
            if exists {
                return Ok(vec![]);
            }
            s.remember(&query);
            Ok(vec![RenderedSql::new(format!(
                "CREATE TRIGGER {} for {} BEFORE UPDATE AS BEGIN IF (OLD.{rv} = NEW.{rv}) THEN NEW.{rv} = NEW.{rv} + 1; ELSE EXCEPTION VERSION_CHECK_ERROR; END",
                quote_ident(&query.name),
                flat(&grain.name, &table.name),
                rv = quote_ident(REC_VERSION)
            ))])
        } else if exists {
            s.forget(&query);
            Ok(vec![self.drop_trigger(&query)])
        } else {
            Ok(vec![])
        }
    }

    fn drop_auto_increment(&self, _s: &Session, _grain: &str, _table: &str) -> Option<RenderedSql> {
        None
    }

    /// A selectable procedure suspending once per row of the select.
    fn create_parameterized_view(
        &self,
        s: &mut Session,
        grain: &Grain,
        view: &ParameterizedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let lengths = text_param_lengths(view);
        let inputs = view
            .parameters
            .iter()
            .map(|p| {
                let ty = if p.ty == ExprType::Text {
                    match lengths.get(&p.name) {
                        Some(n) if *n > 0 => format!("varchar({})", n),
                        _ => "blob sub_type text".to_string(),
                    }
                } else {
                    param_type_name(s, &view.name, p)?.to_string()
                };
                Ok(format!("{} {}", p.name, ty))
            })
            .collect::<Result<Vec<_>, GenerationError>>()?;
        let columns = result_columns(view)?;
        let outputs = columns
            .iter()
            .map(|c| Ok(format!("{} {}", c.alias, result_column_type(s, &view.name, c)?)))
            .collect::<Result<Vec<_>, GenerationError>>()?;
        let into = columns
            .iter()
            .map(|c| format!(":{}", c.alias))
            .collect::<Vec<_>>()
            .join(", ");
        let select = render_select(&view.segments, &grain.name, self.hooks());
        Ok(vec![RenderedSql::new(format!(
            "CREATE PROCEDURE {}({})\n  RETURNS ({})\n  AS\n  BEGIN\n  FOR {}\n  INTO {}\n    DO BEGIN\n      SUSPEND;\n    END\n  END",
            flat(&grain.name, &view.name),
            inputs.join(", "),
            outputs.join(", "),
            select.trim(),
            into
        ))])
    }

    fn drop_parameterized_view(
        &self,
        _s: &mut Session,
        grain: &str,
        name: &str,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        Ok(vec![RenderedSql::destructive(format!("DROP PROCEDURE {}", flat(grain, name)))])
    }

    fn trunc_date(&self, expr: &str) -> String {
        format!("CAST(CAST({} AS DATE) AS TIMESTAMP)", expr)
    }

    fn truncate_table(&self, object: &str) -> RenderedSql {
        RenderedSql::destructive(format!("DELETE FROM {}", object))
    }

    /// Row-level PSQL: the insert adds to the group or creates it when no
    /// row was updated, the delete subtracts and removes emptied groups.
    fn create_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let source = flat(&grain.name, &table.name);
        let new = RowValues::new("NEW", self);
        let old = RowValues::new("OLD", self);
        let mut result = Vec::new();
        for view in grain.materialized_views_on(&table.name) {
            let shape = MvShape::new(grain, view)?;
            let mv = flat(&grain.name, &view.name);
            let insert = format!(
                "  UPDATE {mv} SET {} WHERE {};\n  IF (ROW_COUNT = 0) THEN\n    INSERT INTO {mv} ({}) VALUES ({});",
                shape.set_clause("", "+", |c| new.delta(c), "1"),
                shape.row_condition("", |_, column| new.group(column)),
                shape.insert_columns(),
                shape.insert_values(|_, column| new.group(column), |c| new.delta(c), "1"),
                mv = mv
            );
            let condition = shape.row_condition("", |_, column| old.group(column));
            let delete = format!(
                "  UPDATE {mv} SET {} WHERE {cond};\n  DELETE FROM {mv} WHERE {cond} AND {} = 0;",
                shape.set_clause("", "-", |c| old.delta(c), "1"),
                quote_ident(SURROGATE_COUNT),
                mv = mv,
                cond = condition
            );

            let bodies = [
                (
                    TriggerKind::PostInsert,
                    "INSERT",
                    format!("{}\n{}", checksum_comment(&view.checksum()), insert),
                ),
                (TriggerKind::PostUpdate, "UPDATE", format!("{}\n{}", delete, insert)),
                (TriggerKind::PostDelete, "DELETE", delete),
            ];
            for (kind, event, body) in bodies {
                let query = shape.trigger_query(kind);
                result.push(RenderedSql::new(format!(
                    "CREATE OR ALTER TRIGGER {} for {} AFTER {} AS\nBEGIN\n{}\nEND",
                    quote_ident(&query.name),
                    source,
                    event,
                    body
                )));
                s.remember(&query);
            }
        }
        Ok(result)
    }
}
