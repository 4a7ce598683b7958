use super::mv::{MvColumnKind, MvShape, RowValues};
use super::{DdlStrategy, SequenceFeed, Session, param_type_name, result_column_type, result_columns, sequence_feed};
use crate::catalog::DbColumnInfo;
use crate::checksum::checksum_comment;
use crate::column::{ColumnContext, boolean_check_name, join};
use crate::constants::{REC_VERSION, SURROGATE_COUNT, VERSION_CHECK_FAILURE};
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::expr::render::{RenderHooks, render_select};
use crate::model::naming::{flat_name, limit_name};
use crate::model::{Column, ColumnKind, ColumnVariant, FkRule, ForeignKey, Grain, Index, ParameterizedView, Sequence, Table};
use crate::registry::{TriggerKind, TriggerQuery};
use crate::render::{RenderedSql, quote_ident, quoted_list};
use chrono::NaiveDate;

/// No schemas: grain objects live side by side as `grain_name`. Sequence
/// defaults, versioning and foreign key update rules are all triggers.
pub struct OracleStrategy;

struct OracleHooks;

impl RenderHooks for OracleHooks {
    fn bool_literal(&self, value: bool) -> String {
        if value { "1" } else { "0" }.to_string()
    }

    fn param_placeholder(&self, name: &str) -> String {
        name.to_string()
    }

    fn current_timestamp(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("date '{}'", date.format("%Y-%m-%d"))
    }

    fn substring(&self, operand: &str, start: &str, length: &str) -> String {
        format!("SUBSTR({}, {}, {})", operand, start, length)
    }

    fn view_name(&self, grain: &str, name: &str) -> String {
        flat(grain, name)
    }

    fn table_ref(&self, grain: &str, table: &str, alias: &str) -> String {
        format!("{} {}", flat(grain, table), quote_ident(alias))
    }
}

fn flat(grain: &str, name: &str) -> String {
    quote_ident(&flat_name(grain, name))
}

fn versioning_query(grain: &str, table: &str) -> TriggerQuery {
    TriggerQuery::new(grain, table, limit_name(&format!("{}_{}_upd", grain, table)))
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

/// Trigger on the referenced table emulating an update rule.
fn rule_query(rule: FkRule, fk_name: &str, referenced: (&str, &str)) -> TriggerQuery {
    let prefix = if rule == FkRule::Cascade { "csc" } else { "snl" };
    TriggerQuery::new(referenced.0, referenced.1, limit_name(&format!("{}_{}", prefix, fk_name)))
        .with_kind(TriggerKind::PostUpdate)
}

fn modify(target: &str, definition: &str) -> RenderedSql {
    RenderedSql::new(format!("alter table {} modify ({})", target, definition))
}

/// Switching to or from nclob cannot be done in place.
fn lob_change(column: &Column, actual: &DbColumnInfo) -> bool {
    column.variant() == ColumnVariant::String
        && actual.variant == ColumnVariant::String
        && column.is_unbounded() != actual.is_max
}

/// A smaller scale or integral part is refused while the column holds data.
fn decimal_narrowing(column: &Column, actual: &DbColumnInfo) -> bool {
    match &column.kind {
        ColumnKind::Decimal {
            precision, scale, ..
        } if actual.variant == ColumnVariant::Decimal => {
            let whole = i64::from(*precision) - i64::from(*scale);
            let actual_whole = i64::from(actual.length) - i64::from(actual.scale);
            *scale < actual.scale || whole < actual_whole
        }
        _ => false,
    }
}

impl OracleStrategy {
    fn drop_existing(&self, s: &mut Session, query: &TriggerQuery) -> Result<Option<RenderedSql>, GenerationError> {
        if s.trigger_exists(query)? {
            s.forget(query);
            Ok(Some(self.drop_trigger(query)))
        } else {
            Ok(None)
        }
    }

    fn sequence_trigger(&self, s: &mut Session, grain: &str, table: &str, column: &Column, sequence: &str) -> RenderedSql {
        let query = sequence_query(grain, table, &column.name);
        s.remember(&query);
        RenderedSql::new(format!(
            "CREATE OR REPLACE TRIGGER {} BEFORE INSERT ON {} FOR EACH ROW WHEN (new.{c} is null) BEGIN SELECT {}.NEXTVAL INTO :new.{c} FROM dual; END;",
            quote_ident(&query.name),
            flat(grain, table),
            flat(grain, sequence),
            c = column.quoted_name()
        ))
    }

    /// Swaps the column for a copy of the new type: add, copy, drop, rename.
    fn replace_via_copy(
        &self,
        s: &Session,
        grain: &str,
        table: &str,
        column: &Column,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let target = flat(grain, table);
        let mut copy = column.clone();
        copy.name = limit_name(&format!("{}2", column.name));
        copy.nullable = true;
        let mut result = vec![
            RenderedSql::new(format!(
                "alter table {} add {}",
                target,
                s.full_definition(grain, table, &copy)?
            )),
            RenderedSql::new(format!(
                "update {} set {} = {}",
                target,
                copy.quoted_name(),
                column.quoted_name()
            )),
            RenderedSql::destructive(format!("alter table {} drop column {}", target, column.quoted_name())),
            RenderedSql::new(format!(
                "alter table {} rename column {} to {}",
                target,
                copy.quoted_name(),
                column.quoted_name()
            )),
        ];
        if !column.nullable {
            result.push(modify(&target, &format!("{} not null", column.quoted_name())));
        }
        Ok(result)
    }

    /// Parks the values in a temporary column while the emptied column is
    /// narrowed, then copies them back.
    fn narrow_decimal(target: &str, column: &Column, actual: &DbColumnInfo, definition: &str) -> Vec<RenderedSql> {
        let name = column.quoted_name();
        let temp = quote_ident(&limit_name(&format!("{}_temp", column.name)));
        let mut result = Vec::new();
        if !actual.nullable {
            result.push(modify(target, &format!("{} null", name)));
        }
        result.push(RenderedSql::new(format!(
            "alter table {} add ({} NUMBER({},{}))",
            target, temp, actual.length, actual.scale
        )));
        result.push(RenderedSql::new(format!("update {} set {} = {}", target, temp, name)));
        result.push(RenderedSql::new(format!("update {} set {} = null", target, name)));
        result.push(modify(target, definition));
        result.push(RenderedSql::new(format!("update {} set {} = {}", target, name, temp)));
        if !column.nullable {
            result.push(modify(target, &format!("{} not null", name)));
        }
        result.push(RenderedSql::new(format!("alter table {} drop column {}", target, temp)));
        result
    }

    fn object_type(grain: &str, view: &str, suffix: &str) -> String {
        flat(grain, &format!("{}{}", view, suffix))
    }

    /// `MERGE` of the new row into its group, from `dual`.
    fn merge_new_row(&self, shape: &MvShape, mv: &str) -> String {
        let new = RowValues::new(":new", self);
        let inserted = |alias: &str| format!("\"inserted\".{}", quote_ident(alias));
        let selected = shape
            .columns
            .iter()
            .map(|c| {
                let value = match c.kind {
                    MvColumnKind::Group(column) => new.group(column),
                    _ => new.delta(c),
                };
                format!("{} as {}", value, c.quoted())
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "MERGE INTO {} mv\nUSING (SELECT {} FROM dual) \"inserted\" ON ({})\nWHEN MATCHED THEN\n  UPDATE SET {}\nWHEN NOT MATCHED THEN\n  INSERT ({}) VALUES ({});",
            mv,
            selected,
            shape.row_condition("mv.", |alias, _| inserted(alias)),
            shape.set_clause(
                "mv.",
                "+",
                |c| match c.kind {
                    MvColumnKind::Count => "1".to_string(),
                    _ => inserted(c.alias),
                },
                "1"
            ),
            shape.insert_columns(),
            shape.insert_values(|alias, _| inserted(alias), |c| inserted(c.alias), "1")
        )
    }

    fn subtract_old_row(&self, shape: &MvShape, mv: &str) -> String {
        let old = RowValues::new(":old", self);
        format!(
            "UPDATE {mv} mv SET {} WHERE {};\nDELETE FROM {mv} mv WHERE mv.{} = 0;",
            shape.set_clause("mv.", "-", |c| old.delta(c), "1"),
            shape.row_condition("mv.", |_, column| old.group(column)),
            quote_ident(SURROGATE_COUNT),
            mv = mv
        )
    }
}

impl DdlStrategy for OracleStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::Oracle
    }

    fn hooks(&self) -> &dyn RenderHooks {
        &OracleHooks
    }

    fn object_name(&self, grain: &str, name: &str) -> String {
        flat(grain, name)
    }

    fn create_schema(&self, _grain: &str) -> Option<RenderedSql> {
        None
    }

    /// Cycling sequences must not cache values.
    fn create_sequence(&self, grain: &str, sequence: &Sequence) -> Vec<RenderedSql> {
        let nocache = if sequence.cycle { " NOCACHE" } else { "" };
        vec![RenderedSql::new(format!(
            "CREATE SEQUENCE {} {}{}",
            self.object_name(grain, &sequence.name),
            self.sequence_arguments(sequence, true),
            nocache
        ))]
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
            .map(|(column, seq)| self.sequence_trigger(s, &grain.name, &table.name, column, seq))
            .collect())
    }

    /// `modify` in place where the engine allows it. The versioning trigger
    /// is dropped first and restored by the caller.
    fn update_column(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
        column: &Column,
        actual: &DbColumnInfo,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let target = flat(&grain.name, &table.name);
        let ctx = ColumnContext::new(&grain.name, &table.name, column);
        let mapper = s.mapper;
        let definer = mapper.definer_for(column)?;
        let check = boolean_check_name(&grain.name, &table.name, &column.name);
        let is_boolean = column.variant() == ColumnVariant::Boolean;
        let was_boolean = actual.variant == ColumnVariant::Boolean;
        let mut result = Vec::new();

        result.extend(self.drop_existing(s, &versioning_query(&grain.name, &table.name))?);
        if was_boolean && !is_boolean {
            result.push(RenderedSql::new(format!("alter table {} drop constraint {}", target, check)));
        }

        let mut default = definer.default_definition(&ctx);
        if default.is_empty() && !actual.default_value.is_empty() {
            default = "default null".to_string();
        }
        // a blob column is modified without restating its type
        let name_and_type = if column.variant() == ColumnVariant::Binary && actual.variant == ColumnVariant::Binary {
            column.quoted_name()
        } else {
            join(&[&column.quoted_name(), &definer.column_type(column)])
        };
        let nullability = if column.nullable != actual.nullable {
            definer.nullable(&ctx)
        } else {
            ""
        };

        if lob_change(column, actual) {
            result.extend(self.replace_via_copy(s, &grain.name, &table.name, column)?);
        } else if decimal_narrowing(column, actual) {
            result.extend(Self::narrow_decimal(
                &target,
                column,
                actual,
                &join(&[&name_and_type, &default]),
            ));
        } else {
            result.push(modify(&target, &join(&[&name_and_type, &default, nullability])));
        }

        if is_boolean && !was_boolean {
            result.push(RenderedSql::new(format!(
                "alter table {} add constraint {} check ({} in (0, 1))",
                target,
                check,
                column.quoted_name()
            )));
        }

        match sequence_feed(column, actual) {
            SequenceFeed::Create(sequence) => {
                result.push(self.sequence_trigger(s, &grain.name, &table.name, column, sequence));
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
            "alter table {} drop constraint {}",
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
        RenderedSql::destructive(format!("drop trigger {}", quote_ident(&query.name)))
    }

    fn update_rule_clause(&self, _fk: &ForeignKey) -> String {
        String::new()
    }

    /// Cascade and set-null on update become after-update triggers on the
    /// referenced table. Only one of the two may exist at a time.
    fn create_update_rule(
        &self,
        s: &mut Session,
        grain: &str,
        table: &str,
        fk: &ForeignKey,
        referenced: (&str, &Table),
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let (ref_grain, ref_table) = referenced;
        let fk_name = fk.constraint_name(grain, table);
        let target = (ref_grain, ref_table.name.as_str());
        let cascade = rule_query(FkRule::Cascade, &fk_name, target);
        let set_null = rule_query(FkRule::SetNull, &fk_name, target);

        let (query, other) = match fk.on_update {
            FkRule::NoAction => {
                let mut result = Vec::new();
                for query in [&cascade, &set_null] {
                    result.extend(self.drop_existing(s, query)?);
                }
                return Ok(result);
            }
            FkRule::Cascade => (cascade, set_null),
            FkRule::SetNull => (set_null, cascade),
        };
        let mut result: Vec<RenderedSql> = self.drop_existing(s, &other)?.into_iter().collect();

        let pairs: Vec<(&String, &String)> = fk.columns.iter().zip(ref_table.primary_key.iter()).collect();
        let sets = pairs
            .iter()
            .map(|(c, p)| match fk.on_update {
                FkRule::Cascade => format!("{} = :new.{}", quote_ident(c), quote_ident(p)),
                _ => format!("{} = null", quote_ident(c)),
            })
            .collect::<Vec<_>>()
            .join(",\n    ");
        let conditions = pairs
            .iter()
            .map(|(c, p)| format!("{} = :old.{}", quote_ident(c), quote_ident(p)))
            .collect::<Vec<_>>()
            .join(" AND ");
        result.push(RenderedSql::new(format!(
            "create or replace trigger {} after update of {} on {} for each row begin\n  update {} set\n    {}\n  where {};\nend;",
            quote_ident(&query.name),
            quoted_list(&ref_table.primary_key),
            flat(ref_grain, &ref_table.name),
            flat(grain, table),
            sets,
            conditions
        )));
        s.remember(&query);
        Ok(result)
    }

    fn drop_update_rule(
        &self,
        s: &mut Session,
        fk_name: &str,
        referenced: (&str, &str),
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let mut result = Vec::new();
        for rule in [FkRule::Cascade, FkRule::SetNull] {
            result.extend(self.drop_existing(s, &rule_query(rule, fk_name, referenced))?);
        }
        Ok(result)
    }

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
            let rv = quote_ident(REC_VERSION);
            Ok(vec![RenderedSql::new(format!(
                "CREATE OR REPLACE TRIGGER {} BEFORE UPDATE ON {} FOR EACH ROW\nBEGIN\n  IF :new.{rv} <> :old.{rv} THEN\n    raise_application_error( -20001, '{}' );\n  END IF;\n  :new.{rv} := :new.{rv} + 1;\nEND;",
                quote_ident(&query.name),
                flat(&grain.name, &table.name),
                VERSION_CHECK_FAILURE,
                rv = rv
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

    /// An object type for the rows, a table type of it, and a pipelined
    /// function streaming the select into it.
    fn create_parameterized_view(
        &self,
        s: &mut Session,
        grain: &Grain,
        view: &ParameterizedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let row_type = Self::object_type(&grain.name, &view.name, "_o");
        let table_type = Self::object_type(&grain.name, &view.name, "_t");
        let columns = result_columns(view)?;

        let fields = columns
            .iter()
            .map(|c| Ok(format!("{} {}", quote_ident(c.alias), result_column_type(s, &view.name, c)?)))
            .collect::<Result<Vec<_>, GenerationError>>()?;
        let params = view
            .parameters
            .iter()
            .map(|p| Ok(format!("{} IN {}", p.name, param_type_name(s, &view.name, p)?)))
            .collect::<Result<Vec<_>, GenerationError>>()?;
        let row = columns
            .iter()
            .map(|c| format!("curr.{}", quote_ident(c.alias)))
            .collect::<Vec<_>>()
            .join(", ");
        let select = render_select(&view.segments, &grain.name, self.hooks());

        Ok(vec![
            RenderedSql::new(format!("create type {} as object\n({})", row_type, fields.join(",\n"))),
            RenderedSql::new(format!("create type {} as TABLE OF {}", table_type, row_type)),
            RenderedSql::new(format!(
                "create or replace function {}({}) return {} PIPELINED IS\nBEGIN\nfor curr in ({}) loop\npipe row ({}({}));\nend loop;\nEND;",
                flat(&grain.name, &view.name),
                params.join(", "),
                table_type,
                select.trim(),
                row_type,
                row
            )),
        ])
    }

    fn drop_parameterized_view(
        &self,
        s: &mut Session,
        grain: &str,
        name: &str,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let mut result = vec![RenderedSql::destructive(format!("DROP FUNCTION {}", flat(grain, name)))];
        // the table type depends on the row type
        for suffix in ["_t", "_o"] {
            let type_name = format!("{}{}", name, suffix);
            let exists = s.probe.type_exists(grain, &type_name).map_err(|e| {
                GenerationError::probe(format!("type {}", type_name), format!("{}.{}", grain, name), e)
            })?;
            if exists {
                result.push(RenderedSql::destructive(format!("DROP TYPE {}", flat(grain, &type_name))));
            }
        }
        Ok(result)
    }

    fn trunc_date(&self, expr: &str) -> String {
        format!("TRUNC({}, 'DD')", expr)
    }

    fn create_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let source = flat(&grain.name, &table.name);
        let mut result = Vec::new();
        for view in grain.materialized_views_on(&table.name) {
            let shape = MvShape::new(grain, view)?;
            let mv = flat(&grain.name, &view.name);
            let lock = format!("LOCK TABLE {} IN EXCLUSIVE MODE;", mv);
            let insert = self.merge_new_row(&shape, &mv);
            let delete = self.subtract_old_row(&shape, &mv);

            let bodies = [
                (
                    TriggerKind::PostInsert,
                    "insert",
                    format!("{}\n{}\n{}", checksum_comment(&view.checksum()), lock, insert),
                ),
                (TriggerKind::PostUpdate, "update", format!("{}\n{}\n{}", lock, delete, insert)),
                (TriggerKind::PostDelete, "delete", format!("{}\n{}", lock, delete)),
            ];
            for (kind, event, body) in bodies {
                let query = shape.trigger_query(kind);
                result.push(RenderedSql::new(format!(
                    "create or replace trigger {} after {} on {} for each row\nbegin\n{}\nEND;",
                    quote_ident(&query.name),
                    event,
                    source,
                    body
                )));
                s.remember(&query);
            }
        }
        Ok(result)
    }
}
