use super::mv::{MvColumnKind, MvShape};
use super::{DdlStrategy, Session, param_type_name};
use crate::catalog::DbColumnInfo;
use crate::checksum::checksum_comment;
use crate::column::{ColumnContext, default_constraint_name};
use crate::constants::{REC_VERSION, SURROGATE_COUNT, VERSION_CHECK_FAILURE};
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::expr::render::{RenderHooks, render_select};
use crate::model::{Column, ColumnVariant, Grain, Index, ParameterizedView, Table};
use crate::registry::{TriggerKind, TriggerQuery};
use crate::render::{RenderedSql, quote_ident, quote_qualified, quoted_list};

pub struct MsSqlStrategy;

struct MsSqlHooks;

impl RenderHooks for MsSqlHooks {
    fn bool_literal(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_string()
    }

    fn param_placeholder(&self, name: &str) -> String {
        format!("@{}", name)
    }

    fn concat(&self, operands: &[String]) -> String {
        operands.join(" + ")
    }

    fn substring(&self, operand: &str, start: &str, length: &str) -> String {
        format!("SUBSTRING({}, {}, {})", operand, start, length)
    }

    fn preamble(&self, grain: &str, name: &str) -> String {
        format!("create view {} as", self.view_name(grain, name))
    }
}

/// `<left>."a" = <right>."a"` for every primary key column.
fn pk_join(table: &Table, left: &str, right: &str) -> String {
    table
        .primary_key
        .iter()
        .map(|pk| format!("  {}.{} = {}.{}", left, quote_ident(pk), right, quote_ident(pk)))
        .collect::<Vec<_>>()
        .join(" AND\n")
}

fn update_trigger(grain: &str, table: &str) -> TriggerQuery {
    TriggerQuery::new(grain, table, format!("{}_upd", table)).with_kind(TriggerKind::PostUpdate)
}

impl MsSqlStrategy {
    /// Rejects stale record versions, then bumps the version of every
    /// updated row.
    fn versioning_body(grain: &str, table: &Table) -> String {
        let target = quote_qualified(grain, &table.name);
        let rec_version = quote_ident(REC_VERSION);
        format!(
            "IF exists (select * from inserted inner join deleted on\n{}\nwhere inserted.{rv} <> deleted.{rv}) BEGIN\n  RAISERROR ('{}', 16, 1);\nEND\nupdate {} set {rv} = {rv} + 1 where\nexists (select * from inserted where\n{}\n);",
            pk_join(table, "inserted", "deleted"),
            VERSION_CHECK_FAILURE,
            target,
            pk_join(table, "inserted", &target),
            rv = rec_version,
        )
    }

    fn versioning_trigger(grain: &str, table: &Table) -> String {
        format!(
            "create trigger {} on {} for update as begin\n{}\nend",
            quote_qualified(grain, &format!("{}_upd", table.name)),
            quote_qualified(grain, &table.name),
            Self::versioning_body(grain, table)
        )
    }

    /// Source rows of a MERGE: the changed rows aggregated per group key.
    fn aggregate_source(&self, shape: &MvShape, rows: &str) -> String {
        let group_value = |column: &Column| {
            if column.variant() == ColumnVariant::DateTime {
                self.trunc_date(&column.quoted_name())
            } else {
                column.quoted_name()
            }
        };
        let selected = shape
            .columns
            .iter()
            .map(|c| {
                let value = match c.kind {
                    MvColumnKind::Group(column) => group_value(column),
                    MvColumnKind::Count => "COUNT(*)".to_string(),
                    MvColumnKind::Sum(column) => format!("SUM({})", column.quoted_name()),
                };
                format!("{} as {}", value, c.quoted())
            })
            .chain(std::iter::once(format!("COUNT(*) as {}", quote_ident(SURROGATE_COUNT))))
            .collect::<Vec<_>>()
            .join(", ");
        let groups = shape
            .groups()
            .map(|(_, column)| group_value(column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("(SELECT {} FROM {} GROUP BY {}) AS aggregate", selected, rows, groups)
    }

    fn merge_insert(&self, shape: &MvShape, mv: &str) -> String {
        let aggregate = |alias: &str| format!("aggregate.{}", quote_ident(alias));
        format!(
            "MERGE INTO {} WITH (HOLDLOCK) AS mv\nUSING {} ON {}\nWHEN MATCHED THEN\n  UPDATE SET {}\nWHEN NOT MATCHED THEN\n  INSERT ({}) VALUES ({});",
            mv,
            self.aggregate_source(shape, "inserted"),
            shape.row_condition("mv.", |alias, _| aggregate(alias)),
            shape.set_clause("mv.", "+", |c| aggregate(c.alias), &aggregate(SURROGATE_COUNT)),
            shape.insert_columns(),
            shape.insert_values(|alias, _| aggregate(alias), |c| aggregate(c.alias), &aggregate(SURROGATE_COUNT))
        )
    }

    /// Groups whose every row was removed disappear; the rest shrink.
    fn merge_delete(&self, shape: &MvShape, mv: &str) -> String {
        let aggregate = |alias: &str| format!("aggregate.{}", quote_ident(alias));
        format!(
            "MERGE INTO {} WITH (HOLDLOCK) AS mv\nUSING {} ON {}\nWHEN MATCHED AND mv.{} = {} THEN DELETE\nWHEN MATCHED THEN\n  UPDATE SET {};",
            mv,
            self.aggregate_source(shape, "deleted"),
            shape.row_condition("mv.", |alias, _| aggregate(alias)),
            quote_ident(SURROGATE_COUNT),
            aggregate(SURROGATE_COUNT),
            shape.set_clause("mv.", "-", |c| aggregate(c.alias), &aggregate(SURROGATE_COUNT))
        )
    }
}

impl DdlStrategy for MsSqlStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    fn hooks(&self) -> &dyn RenderHooks {
        &MsSqlHooks
    }

    /// Named default constraints must go before the column can change.
    fn update_column(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
        column: &Column,
        actual: &DbColumnInfo,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let target = quote_qualified(&grain.name, &table.name);
        let ctx = ColumnContext::new(&grain.name, &table.name, column);
        let mut result = Vec::new();
        if !actual.default_value.is_empty() {
            result.push(RenderedSql::new(format!(
                "alter table {} drop constraint {}",
                target,
                default_constraint_name(&table.name, &column.name)
            )));
        }
        result.push(RenderedSql::new(format!(
            "alter table {} alter column {}",
            target,
            s.mapper.main_definition(&ctx)?
        )));
        let default = s.mapper.default_definition(&ctx)?;
        if !default.is_empty() {
            result.push(RenderedSql::new(format!(
                "alter table {} add {} for {}",
                target,
                default,
                column.quoted_name()
            )));
        }
        Ok(result)
    }

    fn drop_pk(&self, grain: &str, table: &str, pk_name: &str) -> RenderedSql {
        RenderedSql::destructive(format!(
            "alter table {} drop constraint {}",
            quote_qualified(grain, table),
            quote_ident(pk_name)
        ))
    }

    fn create_index(&self, grain: &str, table: &Table, index: &Index) -> Vec<RenderedSql> {
        vec![RenderedSql::new(format!(
            "CREATE INDEX {} ON {} ({})",
            quote_ident(&index.name),
            quote_qualified(grain, &table.name),
            quoted_list(&index.columns)
        ))]
    }

    fn drop_index(&self, grain: &str, table: &str, index: &str) -> Vec<RenderedSql> {
        vec![RenderedSql::destructive(format!(
            "DROP INDEX {} ON {}",
            quote_ident(index),
            quote_qualified(grain, table)
        ))]
    }

    fn drop_trigger(&self, query: &TriggerQuery) -> RenderedSql {
        RenderedSql::destructive(format!(
            "drop trigger {}",
            quote_qualified(&query.schema, &query.name)
        ))
    }

    fn update_versioning_trigger(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let query = update_trigger(&grain.name, &table.name);
        let exists = s.trigger_exists(&query)?;
        if table.is_versioned() {
            if exists {
                return Ok(vec![]);
            }
            s.remember(&query);
            Ok(vec![RenderedSql::new(Self::versioning_trigger(&grain.name, table))])
        } else if exists {
            s.forget(&query);
            Ok(vec![self.drop_trigger(&query)])
        } else {
            Ok(vec![])
        }
    }

    fn drop_auto_increment(&self, s: &Session, grain: &str, table: &str) -> Option<RenderedSql> {
        Some(RenderedSql::destructive(format!(
            "delete from {}.sequences where grainid = '{}' and tablename = '{}';",
            quote_ident(&s.settings.system_schema),
            grain,
            table
        )))
    }

    fn create_parameterized_view(
        &self,
        s: &mut Session,
        grain: &Grain,
        view: &ParameterizedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let params = view
            .parameters
            .iter()
            .map(|p| Ok(format!("@{} {}", p.name, param_type_name(s, &view.name, p)?)))
            .collect::<Result<Vec<_>, GenerationError>>()?;
        let select = render_select(&view.segments, &grain.name, self.hooks());
        Ok(vec![RenderedSql::new(format!(
            "CREATE FUNCTION {}({})\n  RETURNS TABLE\n  AS\n  RETURN {}",
            quote_qualified(&grain.name, &view.name),
            params.join(", "),
            select.trim_start()
        ))])
    }

    fn drop_parameterized_view(
        &self,
        _s: &mut Session,
        grain: &str,
        name: &str,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        Ok(vec![RenderedSql::destructive(format!(
            "DROP FUNCTION {}",
            quote_qualified(grain, name)
        ))])
    }

    fn trunc_date(&self, expr: &str) -> String {
        format!("cast(floor(cast({} as float)) as datetime)", expr)
    }

    /// One insert and one delete trigger per view. Every view shares the
    /// table's single update trigger, which also does the versioning.
    fn create_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let source = quote_qualified(&grain.name, &table.name);
        let mut result = Vec::new();
        let mut update_parts = Vec::new();
        if table.is_versioned() {
            update_parts.push(Self::versioning_body(&grain.name, table));
        }

        for view in grain.materialized_views_on(&table.name) {
            let shape = MvShape::new(grain, view)?;
            let mv = quote_qualified(&grain.name, &view.name);
            let insert = self.merge_insert(&shape, &mv);
            let delete = self.merge_delete(&shape, &mv);

            let query = shape.trigger_query(TriggerKind::PostInsert);
            result.push(RenderedSql::new(format!(
                "create trigger {} on {} after insert as begin\n{}\n{}\nEND;",
                quote_qualified(&grain.name, &query.name),
                source,
                checksum_comment(&view.checksum()),
                insert
            )));
            s.remember(&query);

            let query = shape.trigger_query(TriggerKind::PostDelete);
            result.push(RenderedSql::new(format!(
                "create trigger {} on {} after delete as begin\n{}\nEND;",
                quote_qualified(&grain.name, &query.name),
                source,
                delete
            )));
            s.remember(&query);

            update_parts.push(delete);
            update_parts.push(insert);
        }

        let query = update_trigger(&grain.name, &table.name);
        let verb = if table.is_versioned() { "alter" } else { "create" };
        result.push(RenderedSql::new(format!(
            "{} trigger {} on {} for update as begin\n{}\nend",
            verb,
            quote_qualified(&grain.name, &query.name),
            source,
            update_parts.join("\n")
        )));
        s.remember(&query);
        Ok(result)
    }

    fn drop_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let views = grain.materialized_views_on(&table.name);
        let mut result = Vec::new();
        for view in &views {
            let shape = MvShape::new(grain, view)?;
            for kind in [TriggerKind::PostInsert, TriggerKind::PostDelete] {
                let query = shape.trigger_query(kind);
                if s.trigger_exists(&query)? {
                    result.push(self.drop_trigger(&query));
                    s.forget(&query);
                }
            }
        }
        if !views.is_empty() {
            let query = update_trigger(&grain.name, &table.name);
            if s.trigger_exists(&query)? {
                result.push(self.drop_trigger(&query));
                s.forget(&query);
            }
            if table.is_versioned() {
                result.push(RenderedSql::new(Self::versioning_trigger(&grain.name, table)));
                s.remember(&query);
            }
        }
        Ok(result)
    }
}
