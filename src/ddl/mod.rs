//! DDL generation for every dialect.
//!
//! [`DdlGenerator`] is the single entry point. It owns the column type
//! mapper, the trigger registry and the observed-schema probe of one session
//! and delegates everything dialect specific to a [`DdlStrategy`].

mod firebird;
mod h2;
mod mssql;
pub mod mv;
mod open_source;
mod oracle;
mod postgres;

pub use mv::{MvColumn, MvColumnKind, MvShape};

use crate::catalog::{DbColumnInfo, SchemaProbe, SnapshotProbe};
use crate::checksum::extract_checksum;
use crate::column::{ColumnContext, ColumnTypeMapper};
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::expr::render::{RenderHooks, render_view};
use crate::expr::resolve::{DeclaredParam, ParameterResolver};
use crate::expr::{Expr, ExprType};
use crate::model::{
    Column, ColumnVariant, ForeignKey, Grain, Index, MaterializedView, ParameterizedView,
    Score, Sequence, Table, View, ViewParam,
};
use crate::registry::{TriggerKind, TriggerQuery, TriggerRegistry};
use crate::render::{RenderedSql, quote_ident, quote_qualified, quoted_list};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Handler classes the embedded engine calls from its triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct H2Handlers {
    pub version_check: String,
    pub mv_insert: String,
    pub mv_update: String,
    pub mv_delete: String,
}

impl Default for H2Handlers {
    fn default() -> Self {
        Self {
            version_check: "org.grainsql.h2.RecVersionCheckTrigger".to_string(),
            mv_insert: "org.grainsql.h2.MaterializedViewInsertTrigger".to_string(),
            mv_update: "org.grainsql.h2.MaterializedViewUpdateTrigger".to_string(),
            mv_delete: "org.grainsql.h2.MaterializedViewDeleteTrigger".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlSettings {
    /// Schema holding the framework's helper tables and functions
    pub system_schema: String,
    pub h2: H2Handlers,
}

impl Default for DdlSettings {
    fn default() -> Self {
        Self {
            system_schema: "grainsys".to_string(),
            h2: H2Handlers::default(),
        }
    }
}

/// Everything a strategy may consult or update while generating.
pub struct Session<'a> {
    pub mapper: &'a ColumnTypeMapper,
    pub settings: &'a DdlSettings,
    pub registry: &'a mut TriggerRegistry,
    pub probe: &'a dyn SchemaProbe,
}

impl Session<'_> {
    pub fn trigger_exists(&mut self, query: &TriggerQuery) -> Result<bool, GenerationError> {
        self.registry.exists(self.probe, query).map_err(|e| {
            GenerationError::probe(
                format!("trigger {}", query.name),
                format!("{}.{}", query.schema, query.table),
                e,
            )
        })
    }

    pub fn remember(&mut self, query: &TriggerQuery) {
        self.registry.add(query);
    }

    pub fn forget(&mut self, query: &TriggerQuery) {
        self.registry.remove(query);
    }

    pub fn full_definition(&self, grain: &str, table: &str, column: &Column) -> Result<String, GenerationError> {
        self.mapper
            .full_definition(&ColumnContext::new(grain, table, column))
    }
}

/// Dialect-specific half of the generator. Defaults are the forms most
/// engines share; each dialect overrides what it spells differently.
pub trait DdlStrategy: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Hooks used to render views and parameterized views.
    fn hooks(&self) -> &dyn RenderHooks;

    /// Quoted name of a grain-owned object.
    fn object_name(&self, grain: &str, name: &str) -> String {
        quote_qualified(grain, name)
    }

    fn create_schema(&self, grain: &str) -> Option<RenderedSql> {
        Some(RenderedSql::new(format!("create schema {}", quote_ident(grain))))
    }

    /// `START WITH .. INCREMENT BY .. MINVALUE .. MAXVALUE ..[ CYCLE]`.
    fn sequence_arguments(&self, sequence: &Sequence, with_start: bool) -> String {
        let mut args = Vec::new();
        if with_start {
            args.push(format!("START WITH {}", sequence.start()));
        }
        args.push(format!("INCREMENT BY {}", sequence.increment()));
        args.push(format!("MINVALUE {}", sequence.min()));
        args.push(format!("MAXVALUE {}", sequence.max()));
        if sequence.cycle {
            args.push("CYCLE".to_string());
        }
        args.join(" ")
    }

    fn create_sequence(&self, grain: &str, sequence: &Sequence) -> Vec<RenderedSql> {
        vec![RenderedSql::new(format!(
            "CREATE SEQUENCE {} {}",
            self.object_name(grain, &sequence.name),
            self.sequence_arguments(sequence, true)
        ))]
    }

    fn alter_sequence(&self, grain: &str, sequence: &Sequence) -> Vec<RenderedSql> {
        vec![RenderedSql::new(format!(
            "ALTER SEQUENCE {} {}",
            self.object_name(grain, &sequence.name),
            self.sequence_arguments(sequence, false)
        ))]
    }

    /// Statements run right after CREATE TABLE, such as sequence feeding
    /// triggers on engines without sequence defaults.
    fn after_create_table(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let _ = (s, grain, table);
        Ok(vec![])
    }

    fn drop_column(&self, grain: &str, table: &str, column: &str) -> RenderedSql {
        RenderedSql::destructive(format!(
            "alter table {} drop column {}",
            self.object_name(grain, table),
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
    ) -> Result<Vec<RenderedSql>, GenerationError>;

    fn drop_pk(&self, grain: &str, table: &str, pk_name: &str) -> RenderedSql;

    fn create_index(&self, grain: &str, table: &Table, index: &Index) -> Vec<RenderedSql>;

    fn drop_index(&self, grain: &str, table: &str, index: &str) -> Vec<RenderedSql>;

    fn drop_trigger(&self, query: &TriggerQuery) -> RenderedSql;

    /// ` on update ...` clause of a foreign key; empty where the rule is
    /// emulated with triggers.
    fn update_rule_clause(&self, fk: &ForeignKey) -> String {
        fk.on_update.clause("update")
    }

    fn create_update_rule(
        &self,
        s: &mut Session,
        grain: &str,
        table: &str,
        fk: &ForeignKey,
        referenced: (&str, &Table),
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let _ = (s, grain, table, fk, referenced);
        Ok(vec![])
    }

    fn drop_update_rule(
        &self,
        s: &mut Session,
        fk_name: &str,
        referenced: (&str, &str),
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let _ = (s, fk_name, referenced);
        Ok(vec![])
    }

    fn update_versioning_trigger(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError>;

    fn drop_auto_increment(&self, s: &Session, grain: &str, table: &str) -> Option<RenderedSql>;

    fn create_parameterized_view(
        &self,
        s: &mut Session,
        grain: &Grain,
        view: &ParameterizedView,
    ) -> Result<Vec<RenderedSql>, GenerationError>;

    fn drop_parameterized_view(
        &self,
        s: &mut Session,
        grain: &str,
        name: &str,
    ) -> Result<Vec<RenderedSql>, GenerationError>;

    /// Day truncation of a date expression, used for date group keys.
    fn trunc_date(&self, expr: &str) -> String;

    fn truncate_table(&self, object: &str) -> RenderedSql {
        RenderedSql::destructive(format!("TRUNCATE TABLE {}", object))
    }

    fn create_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError>;

    /// Drops the post insert/update/delete triggers of every materialized
    /// view fed by the table.
    fn drop_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let mut result = Vec::new();
        for view in grain.materialized_views_on(&table.name) {
            let shape = MvShape::new(grain, view)?;
            for kind in [TriggerKind::PostInsert, TriggerKind::PostUpdate, TriggerKind::PostDelete] {
                let query =
                    TriggerQuery::new(&grain.name, &table.name, shape.trigger_name(kind)).with_kind(kind);
                if s.trigger_exists(&query)? {
                    result.push(self.drop_trigger(&query));
                    s.forget(&query);
                }
            }
        }
        Ok(result)
    }
}

pub fn strategy_for(dialect: Dialect) -> Box<dyn DdlStrategy> {
    match dialect {
        Dialect::H2 => Box::new(h2::H2Strategy),
        Dialect::Postgres => Box::new(postgres::PostgresStrategy),
        Dialect::MsSql => Box::new(mssql::MsSqlStrategy),
        Dialect::Oracle => Box::new(oracle::OracleStrategy),
        Dialect::Firebird => Box::new(firebird::FirebirdStrategy),
    }
}

/// Result column of a view: alias, type and the column it projects when it
/// is a plain field.
pub(crate) struct ResultColumn<'a> {
    pub alias: &'a str,
    pub ty: ExprType,
    pub column: Option<&'a Column>,
    pub aggregate: bool,
}

pub(crate) fn result_columns<'a>(
    view: &'a ParameterizedView,
) -> Result<Vec<ResultColumn<'a>>, GenerationError> {
    let Some(segment) = view.segments.first() else {
        return Ok(vec![]);
    };
    segment
        .columns
        .iter()
        .map(|c| {
            Ok(ResultColumn {
                alias: &c.alias,
                ty: c.expr.expr_type()?,
                column: c.expr.field_binding().map(|b| &b.column),
                aggregate: c.expr.is_aggregate(),
            })
        })
        .collect()
}

/// Native type of a view result column: the projected column's own type
/// when there is one, otherwise the bare type of its expression type.
pub(crate) fn result_column_type(
    s: &Session,
    view: &str,
    column: &ResultColumn,
) -> Result<String, GenerationError> {
    match column.column {
        Some(c) => s.mapper.column_type(c),
        None => Ok(expr_type_name(s, view, column.ty)?.to_string()),
    }
}

pub(crate) fn expr_type_name(
    s: &Session,
    element: &str,
    ty: ExprType,
) -> Result<&'static str, GenerationError> {
    let variant = ColumnVariant::for_expr_type(ty).ok_or_else(|| GenerationError::Unsupported {
        dialect: s.mapper.dialect(),
        construct: format!("a {} value in a result set", ty),
        element: element.to_string(),
    })?;
    s.mapper.db_field_type(variant)
}

pub(crate) fn param_type_name(s: &Session, view: &str, param: &ViewParam) -> Result<&'static str, GenerationError> {
    expr_type_name(s, view, param.ty)
}

/// What to do with the before-insert trigger feeding a column from its
/// sequence, on engines without sequence defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequenceFeed<'a> {
    Keep,
    Create(&'a str),
    Drop,
}

/// Compares the sequence the live default names with the one the column
/// wants.
pub(crate) fn sequence_feed<'a>(column: &'a Column, actual: &DbColumnInfo) -> SequenceFeed<'a> {
    if column.variant() != ColumnVariant::Integer {
        return SequenceFeed::Keep;
    }
    let observed = crate::catalog::sequence_in_default(actual.default_value.trim());
    match (observed, column.sequence()) {
        (Some(old), Some(new)) if old == new => SequenceFeed::Keep,
        (_, Some(new)) => SequenceFeed::Create(new),
        (Some(_), None) => SequenceFeed::Drop,
        (None, None) => SequenceFeed::Keep,
    }
}

/// Every parameter occurrence of the view in rendering order.
pub(crate) fn parameter_usage(view: &ParameterizedView) -> Result<Vec<String>, GenerationError> {
    let declared = view
        .parameters
        .iter()
        .map(|p| DeclaredParam {
            name: &p.name,
            ty: p.ty,
        })
        .collect();
    let mut resolver = ParameterResolver::new(declared);
    for segment in &view.segments {
        let joins = segment.from.iter().filter_map(|f| f.join.as_ref().map(|j| &j.on));
        let exprs: Vec<&Expr> = segment
            .columns
            .iter()
            .map(|c| &c.expr)
            .chain(joins)
            .chain(segment.filter.iter())
            .collect();
        for expr in exprs {
            resolver.resolve(expr)?;
        }
    }
    Ok(resolver.usage_order().to_vec())
}

pub struct DdlGenerator {
    strategy: Box<dyn DdlStrategy>,
    mapper: ColumnTypeMapper,
    settings: DdlSettings,
    registry: TriggerRegistry,
    probe: Box<dyn SchemaProbe>,
}

impl DdlGenerator {
    pub fn new(dialect: Dialect, settings: DdlSettings, probe: Box<dyn SchemaProbe>) -> Self {
        Self {
            strategy: strategy_for(dialect),
            mapper: ColumnTypeMapper::new(dialect),
            settings,
            registry: TriggerRegistry::new(),
            probe,
        }
    }

    /// Generator over an empty database with default settings.
    pub fn offline(dialect: Dialect) -> Self {
        Self::new(dialect, DdlSettings::default(), Box::new(SnapshotProbe::empty()))
    }

    pub fn dialect(&self) -> Dialect {
        self.strategy.dialect()
    }

    pub fn settings(&self) -> &DdlSettings {
        &self.settings
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn mapper(&self) -> &ColumnTypeMapper {
        &self.mapper
    }

    pub fn probe(&self) -> &dyn SchemaProbe {
        self.probe.as_ref()
    }

    pub fn object_name(&self, grain: &str, name: &str) -> String {
        self.strategy.object_name(grain, name)
    }

    fn split(&mut self) -> (&dyn DdlStrategy, Session<'_>) {
        (
            self.strategy.as_ref(),
            Session {
                mapper: &self.mapper,
                settings: &self.settings,
                registry: &mut self.registry,
                probe: self.probe.as_ref(),
            },
        )
    }

    pub fn create_schema(&self, grain: &str) -> Vec<RenderedSql> {
        self.strategy.create_schema(grain).into_iter().collect()
    }

    pub fn create_sequence(&self, grain: &str, sequence: &Sequence) -> Vec<RenderedSql> {
        debug!("Generating create sequence {}.{}", grain, sequence.name);
        self.strategy.create_sequence(grain, sequence)
    }

    pub fn alter_sequence(&self, grain: &str, sequence: &Sequence) -> Vec<RenderedSql> {
        self.strategy.alter_sequence(grain, sequence)
    }

    pub fn drop_sequence(&self, grain: &str, name: &str) -> RenderedSql {
        RenderedSql::destructive(format!("DROP SEQUENCE {}", self.object_name(grain, name)))
    }

    pub fn create_table(&mut self, grain: &Grain, table: &Table) -> Result<Vec<RenderedSql>, GenerationError> {
        debug!("Generating create table {}.{}", grain.name, table.name);
        let (strategy, mut session) = self.split();
        let mut lines = Vec::new();
        for column in &table.columns {
            lines.push(session.full_definition(&grain.name, &table.name, column)?);
        }
        if table.is_versioned() {
            let rec_version = Table::rec_version_column();
            lines.push(session.full_definition(&grain.name, &table.name, &rec_version)?);
        }
        if !table.primary_key.is_empty() {
            lines.push(format!(
                "constraint {} primary key ({})",
                quote_ident(&table.pk_constraint_name()),
                quoted_list(&table.primary_key)
            ));
        }
        let mut result = vec![RenderedSql::new(format!(
            "create table {}(\n  {}\n)",
            strategy.object_name(&grain.name, &table.name),
            lines.join(",\n  ")
        ))];
        result.extend(strategy.after_create_table(&mut session, grain, table)?);
        Ok(result)
    }

    /// DROP TABLE; the table's triggers go with it.
    pub fn drop_table(&mut self, grain: &str, table: &str) -> Vec<RenderedSql> {
        let names: Vec<String> = self
            .registry
            .triggers_on(grain, table)
            .into_iter()
            .map(str::to_string)
            .collect();
        for name in names {
            self.registry.remove(&TriggerQuery::new(grain, table, name));
        }
        vec![RenderedSql::destructive(format!(
            "DROP TABLE {}",
            self.object_name(grain, table)
        ))]
    }

    pub fn drop_auto_increment(&mut self, grain: &str, table: &str) -> Option<RenderedSql> {
        let (strategy, session) = self.split();
        strategy.drop_auto_increment(&session, grain, table)
    }

    pub fn create_column(&self, grain: &str, table: &str, column: &Column) -> Result<RenderedSql, GenerationError> {
        let definition = self
            .mapper
            .full_definition(&ColumnContext::new(grain, table, column))?;
        Ok(RenderedSql::new(format!(
            "alter table {} add {}",
            self.object_name(grain, table),
            definition
        )))
    }

    /// Statements converging the live column to the desired one; empty when
    /// it already matches.
    pub fn update_column(
        &mut self,
        grain: &Grain,
        table: &Table,
        column: &Column,
        actual: &DbColumnInfo,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        if actual.reflects(column) {
            debug!("Column {}.{}.{} is up to date", grain.name, table.name, column.name);
            return Ok(vec![]);
        }
        debug!("Generating update column {}.{}.{}", grain.name, table.name, column.name);
        let (strategy, mut session) = self.split();
        strategy.update_column(&mut session, grain, table, column, actual)
    }

    pub fn drop_column(&self, grain: &str, table: &str, column: &str) -> RenderedSql {
        self.strategy.drop_column(grain, table, column)
    }

    pub fn create_pk(&self, grain: &str, table: &Table) -> RenderedSql {
        RenderedSql::new(format!(
            "alter table {} add constraint {} primary key ({})",
            self.object_name(grain, &table.name),
            quote_ident(&table.pk_constraint_name()),
            quoted_list(&table.primary_key)
        ))
    }

    pub fn drop_pk(&self, grain: &str, table: &str, pk_name: &str) -> RenderedSql {
        self.strategy.drop_pk(grain, table, pk_name)
    }

    pub fn create_index(&self, grain: &str, table: &Table, index: &Index) -> Vec<RenderedSql> {
        debug!("Generating create index {}.{}", grain, index.name);
        self.strategy.create_index(grain, table, index)
    }

    pub fn drop_index(&self, grain: &str, table: &str, index: &str) -> Vec<RenderedSql> {
        self.strategy.drop_index(grain, table, index)
    }

    pub fn create_fk(
        &mut self,
        score: &Score,
        grain: &str,
        table: &str,
        fk: &ForeignKey,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let ref_grain = fk.references.grain_or(grain);
        let referenced = score
            .table(ref_grain, &fk.references.table)
            .ok_or_else(|| crate::error::ModelError::Unknown {
                kind: "table",
                name: format!("{}.{}", ref_grain, fk.references.table),
            })?;
        let (strategy, mut session) = self.split();
        let mut result = vec![RenderedSql::new(format!(
            "alter table {} add constraint {} foreign key ({}) references {}({}){}{}",
            strategy.object_name(grain, table),
            quote_ident(&fk.constraint_name(grain, table)),
            quoted_list(&fk.columns),
            strategy.object_name(ref_grain, &referenced.name),
            quoted_list(&referenced.primary_key),
            fk.on_delete.clause("delete"),
            strategy.update_rule_clause(fk)
        ))];
        result.extend(strategy.create_update_rule(&mut session, grain, table, fk, (ref_grain, referenced))?);
        Ok(result)
    }

    pub fn drop_fk(
        &mut self,
        grain: &str,
        table: &str,
        fk_name: &str,
        referenced: (&str, &str),
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let (strategy, mut session) = self.split();
        let mut result = vec![RenderedSql::destructive(format!(
            "alter table {} drop constraint {}",
            strategy.object_name(grain, table),
            quote_ident(fk_name)
        ))];
        result.extend(strategy.drop_update_rule(&mut session, fk_name, referenced)?);
        Ok(result)
    }

    /// Creates the optimistic-lock trigger of a versioned table, or drops it
    /// from a table that is no longer versioned. Empty when nothing changes.
    pub fn update_versioning_trigger(
        &mut self,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let (strategy, mut session) = self.split();
        strategy.update_versioning_trigger(&mut session, grain, table)
    }

    pub fn create_view(&self, grain: &str, view: &View) -> RenderedSql {
        debug!("Generating create view {}.{}", grain, view.name);
        RenderedSql::new(render_view(grain, &view.name, &view.segments, self.strategy.hooks()))
    }

    pub fn drop_view(&self, grain: &str, name: &str) -> RenderedSql {
        RenderedSql::destructive(format!("DROP VIEW {}", self.object_name(grain, name)))
    }

    pub fn create_parameterized_view(
        &mut self,
        grain: &Grain,
        view: &ParameterizedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        debug!("Generating parameterized view {}.{}", grain.name, view.name);
        let (strategy, mut session) = self.split();
        strategy.create_parameterized_view(&mut session, grain, view)
    }

    pub fn drop_parameterized_view(&mut self, grain: &str, name: &str) -> Result<Vec<RenderedSql>, GenerationError> {
        let (strategy, mut session) = self.split();
        strategy.drop_parameterized_view(&mut session, grain, name)
    }

    /// CREATE TABLE of the aggregate table behind a materialized view.
    pub fn create_materialized_view(
        &mut self,
        grain: &Grain,
        view: &MaterializedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let table = MvShape::new(grain, view)?.table_definition();
        self.create_table(grain, &table)
    }

    /// Empties the aggregate table and fills it from its source table.
    pub fn init_data_for_materialized_view(
        &self,
        grain: &Grain,
        view: &MaterializedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let shape = MvShape::new(grain, view)?;
        let trunc = |column: &Column| {
            let name = column.quoted_name();
            if column.variant() == ColumnVariant::DateTime {
                self.strategy.trunc_date(&name)
            } else {
                name
            }
        };
        let selected = shape
            .columns
            .iter()
            .map(|c| match c.kind {
                MvColumnKind::Group(column) => trunc(column),
                MvColumnKind::Count => "COUNT(*)".to_string(),
                MvColumnKind::Sum(column) => format!("SUM({})", column.quoted_name()),
            })
            .join(", ");
        let group_by = shape
            .groups()
            .map(|(_, column)| trunc(column))
            .join(", ");
        let mv_name = self.object_name(&grain.name, &view.name);
        Ok(vec![
            self.strategy.truncate_table(&mv_name),
            RenderedSql::new(format!(
                "INSERT INTO {} ({}) SELECT {}, COUNT(*) FROM {} GROUP BY {}",
                mv_name,
                shape.insert_columns(),
                selected,
                self.object_name(&grain.name, &shape.table.name),
                group_by
            )),
        ])
    }

    pub fn create_table_triggers_for_materialized_views(
        &mut self,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        if grain.materialized_views_on(&table.name).is_empty() {
            return Ok(vec![]);
        }
        debug!("Generating materialized view triggers on {}.{}", grain.name, table.name);
        let (strategy, mut session) = self.split();
        strategy.create_mv_triggers(&mut session, grain, table)
    }

    pub fn drop_table_triggers_for_materialized_views(
        &mut self,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let (strategy, mut session) = self.split();
        strategy.drop_mv_triggers(&mut session, grain, table)
    }

    /// Whether the insert trigger of every materialized view on the table
    /// carries the view's current checksum.
    pub fn materialized_view_triggers_up_to_date(
        &self,
        grain: &Grain,
        table: &Table,
    ) -> Result<bool, GenerationError> {
        for view in grain.materialized_views_on(&table.name) {
            if !self.materialized_view_up_to_date(grain, view)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether the insert trigger on the view's source table carries the
    /// view's current checksum.
    pub fn materialized_view_up_to_date(
        &self,
        grain: &Grain,
        view: &MaterializedView,
    ) -> Result<bool, GenerationError> {
        let query = MvShape::new(grain, view)?.trigger_query(TriggerKind::PostInsert);
        let body = self.probe.trigger_body(&query).map_err(|e| {
            GenerationError::probe(
                format!("trigger {}", query.name),
                format!("{}.{}", grain.name, query.table),
                e,
            )
        })?;
        let current = body.as_deref().and_then(extract_checksum);
        if current != Some(view.checksum().as_str()) {
            debug!("Materialized view {}.{} triggers are stale", grain.name, view.name);
            return Ok(false);
        }
        Ok(true)
    }

    /// Whether the database has the aggregate table of the view.
    pub fn materialized_view_exists(&self, grain: &Grain, view: &MaterializedView) -> Result<bool, GenerationError> {
        self.probe
            .table_exists(&grain.name, &view.name)
            .map_err(|e| {
                GenerationError::probe(
                    format!("table {}", view.name),
                    format!("{}.{}", grain.name, view.name),
                    e,
                )
            })
    }

    /// Drops the aggregate table when the database has it, creates it anew
    /// and fills it from the source table.
    pub fn rebuild_materialized_view(
        &mut self,
        grain: &Grain,
        view: &MaterializedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let mut result = if self.materialized_view_exists(grain, view)? {
            self.drop_table(&grain.name, &view.name)
        } else {
            vec![]
        };
        result.extend(self.create_materialized_view(grain, view)?);
        result.extend(self.init_data_for_materialized_view(grain, view)?);
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Grain, Score};

    /// Orders with a sequence-fed key and a regional total view over them.
    pub(crate) fn shop() -> Score {
        let yaml = r#"
grains:
  - name: shop
    sequences:
      - name: order_seq
    tables:
      - name: orders
        columns:
          - { name: id, type: integer, nullable: false, sequence: order_seq }
          - { name: region, type: string, length: 10, nullable: false }
          - { name: amount, type: integer }
          - { name: created, type: date_time, default: get_date }
        primary_key: [id]
        indices:
          - { name: idx_region, columns: [region, amount] }
    materialized_views:
      - name: region_totals
        segments:
          - columns:
              - alias: region
                expr: { field: { column: region } }
              - alias: amount_sum
                expr: { sum: { field: { column: amount } } }
            from:
              - alias: o
                table: orders
            group_by: [region]
"#;
        let score: Score = serde_yaml::from_str(yaml).unwrap();
        score.validate().unwrap();
        score
    }

    pub(crate) fn grain(score: &Score) -> &Grain {
        score.grain("shop").unwrap()
    }
}
