//! Migration façade.
//!
//! A [`Migrator`] drives the [`DdlGenerator`] element by element and feeds
//! every statement to a [`StatementSink`], one at a time, in order. Failures
//! of either side come back as a [`GrainError`] naming the element and the
//! operation that was running.

mod script;

pub use script::{OutputFormat, render_script};

use crate::catalog::DbColumnInfo;
use crate::ddl::DdlGenerator;
use crate::error::{ExecutionError, GenerationError, GrainError, GrainResult, SinkError};
use crate::model::graph::grain_order;
use crate::model::{Grain, MaterializedView, Score, Table};
use crate::render::RenderedSql;
use tracing::{debug, info};

/// Whatever runs the generated statements: a live connection, a script
/// writer or a test double.
pub trait StatementSink {
    fn execute(&mut self, statement: &RenderedSql) -> Result<(), SinkError>;
}

/// Keeps every statement it is handed. Optionally rejects statements
/// containing a given fragment, to exercise failure paths.
#[derive(Debug, Default)]
pub struct RecordingSink {
    statements: Vec<RenderedSql>,
    reject: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(fragment: impl Into<String>) -> Self {
        Self {
            statements: vec![],
            reject: Some(fragment.into()),
        }
    }

    pub fn statements(&self) -> &[RenderedSql] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<RenderedSql> {
        self.statements
    }
}

impl StatementSink for RecordingSink {
    fn execute(&mut self, statement: &RenderedSql) -> Result<(), SinkError> {
        if let Some(fragment) = &self.reject
            && statement.sql.contains(fragment.as_str())
        {
            return Err(SinkError::new(format!("statement rejected: {}", fragment)));
        }
        self.statements.push(statement.clone());
        Ok(())
    }
}

fn is_table_ddl(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_lowercase();
    head.starts_with("create table") || head.starts_with("alter table")
}

fn is_trigger_ddl(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_lowercase();
    head.starts_with("create trigger")
        || head.starts_with("create or alter trigger")
        || head.starts_with("create or replace trigger")
}

pub struct Migrator<S: StatementSink> {
    generator: DdlGenerator,
    sink: S,
    /// Table DDL executed since the last COMMIT
    uncommitted_ddl: bool,
}

impl<S: StatementSink> Migrator<S> {
    pub fn new(generator: DdlGenerator, sink: S) -> Self {
        Self {
            generator,
            sink,
            uncommitted_ddl: false,
        }
    }

    pub fn generator(&self) -> &DdlGenerator {
        &self.generator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs one generator operation and executes what it produced.
    pub fn apply<F>(&mut self, element: &str, operation: &str, generate: F) -> GrainResult<usize>
    where
        F: FnOnce(&mut DdlGenerator) -> Result<Vec<RenderedSql>, GenerationError>,
    {
        let statements = generate(&mut self.generator).map_err(|source| GrainError::Generation {
            element: element.to_string(),
            operation: operation.to_string(),
            source,
        })?;
        if statements.is_empty() {
            debug!("Nothing to {} for {}", operation, element);
        }
        for statement in &statements {
            self.execute(element, operation, statement)?;
        }
        Ok(statements.len())
    }

    fn execute(&mut self, element: &str, operation: &str, statement: &RenderedSql) -> GrainResult<()> {
        if self.uncommitted_ddl && is_trigger_ddl(&statement.sql) {
            self.send(element, operation, &RenderedSql::new("COMMIT"))?;
            self.uncommitted_ddl = false;
        }
        self.send(element, operation, statement)?;
        if statement.sql.trim().eq_ignore_ascii_case("COMMIT") {
            self.uncommitted_ddl = false;
        } else if self.generator.dialect().requires_commit_after_ddl() && is_table_ddl(&statement.sql) {
            self.uncommitted_ddl = true;
        }
        Ok(())
    }

    fn send(&mut self, element: &str, operation: &str, statement: &RenderedSql) -> GrainResult<()> {
        debug!("Executing: {}", statement.sql);
        self.sink.execute(statement).map_err(|source| {
            GrainError::Execution(ExecutionError {
                element: element.to_string(),
                operation: operation.to_string(),
                statement: statement.sql.clone(),
                source,
            })
        })
    }

    /// Validates the model and creates every grain, referenced grains first.
    pub fn create_score(&mut self, score: &Score) -> GrainResult<()> {
        score.validate()?;
        let order = grain_order(score)?;
        info!("🚀 Creating {} grain(s) for {}", order.len(), self.generator.dialect());
        for name in order {
            if let Some(grain) = score.grain(name) {
                self.create_grain(score, grain)?;
            }
        }
        Ok(())
    }

    /// Creates every element of one grain on an empty database.
    pub fn create_grain(&mut self, score: &Score, grain: &Grain) -> GrainResult<()> {
        info!("📦 Creating grain {}", grain.name);
        let g = grain.name.as_str();

        self.apply(&format!("schema {}", g), "create", |ddl| Ok(ddl.create_schema(g)))?;

        for sequence in &grain.sequences {
            self.apply(&format!("sequence {}.{}", g, sequence.name), "create", |ddl| {
                Ok(ddl.create_sequence(g, sequence))
            })?;
        }

        for table in &grain.tables {
            let element = format!("table {}.{}", g, table.name);
            self.apply(&element, "create", |ddl| ddl.create_table(grain, table))?;
            self.apply(&element, "create versioning trigger for", |ddl| {
                ddl.update_versioning_trigger(grain, table)
            })?;
        }

        for table in &grain.tables {
            for fk in &table.foreign_keys {
                let element = format!("foreign key {}", fk.constraint_name(g, &table.name));
                self.apply(&element, "create", |ddl| ddl.create_fk(score, g, &table.name, fk))?;
            }
            for index in &table.indices {
                self.apply(&format!("index {}.{}", g, index.name), "create", |ddl| {
                    Ok(ddl.create_index(g, table, index))
                })?;
            }
        }

        for view in &grain.views {
            self.apply(&format!("view {}.{}", g, view.name), "create", |ddl| {
                Ok(vec![ddl.create_view(g, view)])
            })?;
        }

        for view in &grain.parameterized_views {
            self.apply(&format!("parameterized view {}.{}", g, view.name), "create", |ddl| {
                ddl.create_parameterized_view(grain, view)
            })?;
        }

        for view in &grain.materialized_views {
            self.apply(&format!("materialized view {}.{}", g, view.name), "create", |ddl| {
                ddl.create_materialized_view(grain, view)
            })?;
        }
        for table in &grain.tables {
            self.apply(
                &format!("table {}.{}", g, table.name),
                "create materialized view triggers for",
                |ddl| ddl.create_table_triggers_for_materialized_views(grain, table),
            )?;
        }
        for view in &grain.materialized_views {
            self.apply(
                &format!("materialized view {}.{}", g, view.name),
                "fill",
                |ddl| ddl.init_data_for_materialized_view(grain, view),
            )?;
        }
        info!("✅ Grain {} created", grain.name);
        Ok(())
    }

    /// Brings an existing table in line with the model using what the probe
    /// reports about its columns and triggers.
    ///
    /// Materialized views fed by the table are rebuilt and refilled when the
    /// table's columns changed, the aggregate table is missing or the
    /// checksum is stale. Their triggers are then always dropped and created
    /// again; on MSSQL they share the update trigger with versioning.
    pub fn update_table(&mut self, grain: &Grain, table: &Table) -> GrainResult<()> {
        let element = format!("table {}.{}", grain.name, table.name);
        info!("🔄 Updating {}", element);
        let mut modified = false;
        for column in &table.columns {
            let column_element = format!("column {}.{}.{}", grain.name, table.name, column.name);
            let actual = self.observed_column(&column_element, grain, table, &column.name)?;
            let executed = match actual {
                Some(actual) => self.apply(&column_element, "update", |ddl| {
                    ddl.update_column(grain, table, column, &actual)
                })?,
                None => self.apply(&column_element, "create", |ddl| {
                    Ok(vec![ddl.create_column(&grain.name, &table.name, column)?])
                })?,
            };
            modified |= executed > 0;
        }
        self.apply(&element, "update versioning trigger for", |ddl| {
            ddl.update_versioning_trigger(grain, table)
        })?;

        for view in grain.materialized_views_on(&table.name) {
            let view_element = format!("materialized view {}.{}", grain.name, view.name);
            let current = !modified
                && self
                    .materialized_view_current(grain, view)
                    .map_err(|source| GrainError::Generation {
                        element: view_element.clone(),
                        operation: "check".to_string(),
                        source,
                    })?;
            if current {
                debug!("{} is current", view_element);
                continue;
            }
            self.apply(&view_element, "rebuild", |ddl| {
                ddl.rebuild_materialized_view(grain, view)
            })?;
        }
        self.apply(&element, "recreate materialized view triggers for", |ddl| {
            let mut statements = ddl.drop_table_triggers_for_materialized_views(grain, table)?;
            statements.extend(ddl.create_table_triggers_for_materialized_views(grain, table)?);
            Ok(statements)
        })?;
        Ok(())
    }

    fn materialized_view_current(&self, grain: &Grain, view: &MaterializedView) -> Result<bool, GenerationError> {
        Ok(self.generator.materialized_view_exists(grain, view)?
            && self.generator.materialized_view_up_to_date(grain, view)?)
    }

    fn observed_column(
        &self,
        element: &str,
        grain: &Grain,
        table: &Table,
        column: &str,
    ) -> GrainResult<Option<DbColumnInfo>> {
        self.generator
            .probe()
            .column_info(&grain.name, &table.name, column)
            .map_err(|e| GrainError::Generation {
                element: element.to_string(),
                operation: "inspect".to_string(),
                source: GenerationError::probe("column", element, e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ObservedSchema, SnapshotProbe};
    use crate::ddl::DdlSettings;
    use crate::dialect::Dialect;
    use crate::model::ColumnVariant;
    use crate::render::sql_texts;

    fn shop() -> Score {
        let score: Score = serde_yaml::from_str(
            r#"
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
        primary_key: [id]
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
"#,
        )
        .unwrap();
        score
    }

    fn migrate(dialect: Dialect, score: &Score) -> Vec<RenderedSql> {
        let mut migrator = Migrator::new(DdlGenerator::offline(dialect), RecordingSink::new());
        migrator.create_score(score).unwrap();
        migrator.into_sink().into_statements()
    }

    #[test]
    fn test_create_score_orders_statements() {
        let statements = migrate(Dialect::Postgres, &shop());
        let texts = sql_texts(&statements);
        assert_eq!(texts[0], "create schema \"shop\"");
        assert!(texts[1].starts_with("CREATE SEQUENCE \"shop\".\"order_seq\""));
        assert!(texts[2].starts_with("create table \"shop\".\"orders\""));
        let last = texts.last().unwrap();
        assert!(last.starts_with("INSERT INTO \"shop\".\"region_totals\""));
        assert!(!texts.contains(&"COMMIT"));
    }

    #[test]
    fn test_firebird_commits_before_triggers() {
        let statements = migrate(Dialect::Firebird, &shop());
        let texts = sql_texts(&statements);
        for (i, sql) in texts.iter().enumerate() {
            if is_trigger_ddl(sql) && i > 0 && is_table_ddl(texts[i - 1]) {
                panic!("trigger follows uncommitted table DDL: {}", sql);
            }
        }
        assert!(texts[0].starts_with("CREATE SEQUENCE"));
        assert!(texts[2].starts_with("create table \"shop_orders\""));
        assert_eq!(texts[3], "COMMIT");
        assert!(texts[4].contains("_seq_trigger"));
    }

    #[test]
    fn test_sink_failure_names_element() {
        let mut migrator = Migrator::new(
            DdlGenerator::offline(Dialect::Postgres),
            RecordingSink::rejecting("create table \"shop\".\"orders\""),
        );
        let err = migrator.create_score(&shop()).unwrap_err();
        assert!(matches!(err, GrainError::Execution(_)));
        assert!(
            err.to_string()
                .starts_with("Error while trying to create table shop.orders: statement rejected")
        );
        assert_eq!(migrator.sink().statements().len(), 2);
    }

    #[test]
    fn test_invalid_model_is_rejected_before_any_statement() {
        let mut score = shop();
        score.grains[0].tables[0].primary_key = vec!["missing".into()];
        let mut migrator = Migrator::new(DdlGenerator::offline(Dialect::H2), RecordingSink::new());
        let err = migrator.create_score(&score).unwrap_err();
        assert!(matches!(err, GrainError::Model(_)));
        assert!(migrator.sink().statements().is_empty());
    }

    #[test]
    fn test_update_table_adds_missing_columns() {
        let score = shop();
        score.validate().unwrap();
        let grain = score.grain("shop").unwrap();
        let table = grain.table("orders").unwrap();
        let mut snapshot = ObservedSchema::default();
        for (name, variant, length) in [
            ("id", ColumnVariant::Integer, 0),
            ("region", ColumnVariant::String, 10),
        ] {
            snapshot.add_column(
                "shop",
                "orders",
                DbColumnInfo {
                    name: name.into(),
                    variant,
                    nullable: false,
                    default_value: if name == "id" {
                        "NEXTVAL(order_seq)".into()
                    } else {
                        String::new()
                    },
                    length,
                    scale: 0,
                    is_max: false,
                },
            );
        }
        let generator = DdlGenerator::new(
            Dialect::Postgres,
            DdlSettings::default(),
            Box::new(SnapshotProbe::new(snapshot)),
        );
        let mut migrator = Migrator::new(generator, RecordingSink::new());
        migrator.update_table(grain, table).unwrap();
        let texts = sql_texts(migrator.sink().statements());
        assert_eq!(texts[0], "alter table \"shop\".\"orders\" add \"amount\" int4 null");
        assert!(texts[1].ends_with("EXECUTE PROCEDURE \"grainsys\".recversion_check();"));
        assert!(texts.iter().any(|s| s.contains("mvInsertFromshop_order")));
    }

    #[test]
    fn test_oracle_column_change_restores_versioning_trigger() {
        let score = shop();
        score.validate().unwrap();
        let grain = score.grain("shop").unwrap();
        let table = grain.table("orders").unwrap();
        let mut snapshot = ObservedSchema::default();
        for (name, variant, length, nullable) in [
            ("id", ColumnVariant::Integer, 0, false),
            ("region", ColumnVariant::String, 10, false),
            ("amount", ColumnVariant::Integer, 0, false),
        ] {
            snapshot.add_column(
                "shop",
                "orders",
                DbColumnInfo {
                    name: name.into(),
                    variant,
                    nullable,
                    default_value: if name == "id" {
                        "NEXTVAL(order_seq)".into()
                    } else {
                        String::new()
                    },
                    length,
                    scale: 0,
                    is_max: false,
                },
            );
        }
        snapshot.add_trigger("shop", "orders", "shop_orders_upd", "");
        let generator = DdlGenerator::new(
            Dialect::Oracle,
            DdlSettings::default(),
            Box::new(SnapshotProbe::new(snapshot)),
        );
        let mut migrator = Migrator::new(generator, RecordingSink::new());
        migrator.update_table(grain, table).unwrap();
        let texts = sql_texts(migrator.sink().statements());
        assert_eq!(texts[0], "drop trigger \"shop_orders_upd\"");
        assert_eq!(texts[1], "alter table \"shop_orders\" modify (\"amount\" number null)");
        assert!(texts[2].starts_with("CREATE OR REPLACE TRIGGER \"shop_orders_upd\" BEFORE UPDATE"));
    }
}
