use super::mv::MvShape;
use super::open_source::{self, OpenSourceTypeChange};
use super::{DdlStrategy, Session, parameter_usage};
use crate::catalog::DbColumnInfo;
use crate::checksum::checksum_comment;
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::expr::ExprType;
use crate::expr::render::{RenderHooks, render_select};
use crate::model::{Column, Grain, Index, ParameterizedView, Table};
use crate::registry::{TriggerKind, TriggerQuery};
use crate::render::{RenderedSql, quote_ident, quote_qualified, quoted_list};

/// The embedded Java engine. Versioning and materialized views run in
/// handler classes the engine calls; see [`super::H2Handlers`].
pub struct H2Strategy;

struct H2Hooks;

impl RenderHooks for H2Hooks {
    fn param_placeholder(&self, _name: &str) -> String {
        "?".to_string()
    }

    fn current_timestamp(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }
}

fn java_type(ty: ExprType) -> &'static str {
    match ty {
        ExprType::Int => "java.lang.Integer",
        ExprType::Real => "java.lang.Double",
        ExprType::Decimal => "java.math.BigDecimal",
        ExprType::Text => "java.lang.String",
        ExprType::Bit | ExprType::Logic => "java.lang.Boolean",
        ExprType::Date => "java.sql.Timestamp",
        ExprType::DateWithTimeZone => "java.time.OffsetDateTime",
        ExprType::Blob => "byte[]",
    }
}

impl OpenSourceTypeChange for H2Strategy {
    fn type_change(&self, alter: &str, _column: &Column, _actual: &DbColumnInfo, column_type: &str) -> String {
        format!("{} {}", alter, column_type)
    }
}

impl DdlStrategy for H2Strategy {
    fn dialect(&self) -> Dialect {
        Dialect::H2
    }

    fn hooks(&self) -> &dyn RenderHooks {
        &H2Hooks
    }

    fn update_column(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
        column: &Column,
        actual: &DbColumnInfo,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        open_source::update_column(self, s, grain, table, column, actual)
    }

    fn drop_pk(&self, grain: &str, table: &str, _pk_name: &str) -> RenderedSql {
        RenderedSql::destructive(format!(
            "alter table {} drop primary key",
            quote_qualified(grain, table)
        ))
    }

    fn create_index(&self, grain: &str, table: &Table, index: &Index) -> Vec<RenderedSql> {
        vec![RenderedSql::new(format!(
            "CREATE INDEX {} ON {} ({})",
            quote_qualified(grain, &index.name),
            quote_qualified(grain, &table.name),
            quoted_list(&index.columns)
        ))]
    }

    fn drop_index(&self, grain: &str, _table: &str, index: &str) -> Vec<RenderedSql> {
        open_source::drop_index(grain, index)
    }

    fn drop_trigger(&self, query: &TriggerQuery) -> RenderedSql {
        open_source::drop_trigger(query)
    }

    fn update_versioning_trigger(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let name = format!("versioncheck_{}", table.name);
        let query = TriggerQuery::new(&grain.name, &table.name, name).with_kind(TriggerKind::PreUpdate);
        let exists = s.trigger_exists(&query)?;
        if table.is_versioned() {
            if exists {
                return Ok(vec![]);
            }
            s.remember(&query);
            Ok(vec![RenderedSql::new(format!(
                "CREATE TRIGGER {} BEFORE UPDATE ON {} FOR EACH ROW CALL {}",
                quote_ident(&query.name),
                quote_qualified(&grain.name, &table.name),
                quote_ident(&s.settings.h2.version_check)
            ))])
        } else if exists {
            s.forget(&query);
            Ok(vec![self.drop_trigger(&query)])
        } else {
            Ok(vec![])
        }
    }

    fn drop_auto_increment(&self, _s: &Session, grain: &str, table: &str) -> Option<RenderedSql> {
        Some(open_source::drop_auto_increment(grain, table))
    }

    /// A Java alias running the select as a prepared statement; positional
    /// placeholders are bound in usage order.
    fn create_parameterized_view(
        &self,
        _s: &mut Session,
        grain: &Grain,
        view: &ParameterizedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let select = render_select(&view.segments, &grain.name, self.hooks())
            .replace('"', "\\\"")
            .replace(['\r', '\n'], "");
        let inputs = view
            .parameters
            .iter()
            .map(|p| format!("{} {}", java_type(p.ty), p.name))
            .collect::<Vec<_>>()
            .join(", ");
        let bindings: String = parameter_usage(view)?
            .iter()
            .enumerate()
            .map(|(i, name)| format!("ps.setObject({},{});", i + 1, name))
            .collect();
        Ok(vec![RenderedSql::new(format!(
            "CREATE ALIAS {} AS $$ java.sql.ResultSet {}(java.sql.Connection conn, {}) throws java.sql.SQLException {{java.sql.PreparedStatement ps = conn.prepareStatement(\"{}\");{}return ps.executeQuery();}} $$;",
            quote_qualified(&grain.name, &view.name),
            view.name,
            inputs,
            select,
            bindings
        ))])
    }

    fn drop_parameterized_view(
        &self,
        _s: &mut Session,
        grain: &str,
        name: &str,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        Ok(vec![RenderedSql::destructive(format!(
            "DROP ALIAS IF EXISTS {}",
            quote_qualified(grain, name)
        ))])
    }

    fn trunc_date(&self, expr: &str) -> String {
        format!("TRUNC({})", expr)
    }

    fn create_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let source = quote_qualified(&grain.name, &table.name);
        let settings = s.settings;
        let handlers = &settings.h2;
        let mut result = Vec::new();
        let mut created = Vec::new();
        for view in grain.materialized_views_on(&table.name) {
            let shape = MvShape::new(grain, view)?;
            let triggers = [
                (TriggerKind::PostInsert, "INSERT", &handlers.mv_insert),
                (TriggerKind::PostUpdate, "UPDATE", &handlers.mv_update),
                (TriggerKind::PostDelete, "DELETE", &handlers.mv_delete),
            ];
            for (kind, event, handler) in triggers {
                let query = shape.trigger_query(kind);
                // the insert trigger carries the view checksum
                let separator = if kind == TriggerKind::PostInsert {
                    format!("\n{}\n", checksum_comment(&view.checksum()))
                } else {
                    " ".to_string()
                };
                result.push(RenderedSql::new(format!(
                    "CREATE TRIGGER {} AFTER {} ON {} FOR EACH ROW CALL{}{}",
                    quote_ident(&query.name),
                    event,
                    source,
                    separator,
                    quote_ident(handler)
                )));
                created.push(query);
            }
        }
        for query in &created {
            s.remember(query);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::DdlGenerator;
    use super::super::fixtures::{grain, shop};
    use super::*;
    use crate::model::ColumnVariant;
    use crate::render::sql_texts;

    #[test]
    fn test_versioning_trigger_calls_handler() {
        let score = shop();
        let g = grain(&score);
        let mut generator = DdlGenerator::offline(Dialect::H2);
        let sql = generator
            .update_versioning_trigger(g, g.table("orders").unwrap())
            .unwrap();
        assert_eq!(
            sql_texts(&sql),
            vec!["CREATE TRIGGER \"versioncheck_orders\" BEFORE UPDATE ON \"shop\".\"orders\" FOR EACH ROW CALL \"org.grainsql.h2.RecVersionCheckTrigger\""]
        );
    }

    #[test]
    fn test_type_change_and_primary_key() {
        let score = shop();
        let g = grain(&score);
        let table = g.table("orders").unwrap();
        let mut generator = DdlGenerator::offline(Dialect::H2);
        let actual = DbColumnInfo {
            name: "amount".into(),
            variant: ColumnVariant::Floating,
            nullable: true,
            default_value: String::new(),
            length: 0,
            scale: 0,
            is_max: false,
        };
        let sql = generator
            .update_column(g, table, table.column("amount").unwrap(), &actual)
            .unwrap();
        assert_eq!(
            sql_texts(&sql),
            vec![
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"amount\" DROP DEFAULT",
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"amount\" integer"
            ]
        );
        assert_eq!(
            generator.drop_pk("shop", "orders", "pk_orders").sql,
            "alter table \"shop\".\"orders\" drop primary key"
        );
    }

    #[test]
    fn test_materialized_view_triggers_call_handlers() {
        let score = shop();
        let g = grain(&score);
        let table = g.table("orders").unwrap();
        let mut generator = DdlGenerator::offline(Dialect::H2);
        let sql = generator
            .create_table_triggers_for_materialized_views(g, table)
            .unwrap();
        assert_eq!(sql.len(), 3);
        let checksum = g.materialized_views[0].checksum();
        assert!(sql[0].sql.contains(&format!(
            "FOR EACH ROW CALL\n/*CHECKSUM{}CHECKSUM*/\n\"org.grainsql.h2.MaterializedViewInsertTrigger\"",
            checksum
        )));
        assert!(sql[2].sql.ends_with("AFTER DELETE ON \"shop\".\"orders\" FOR EACH ROW CALL \"org.grainsql.h2.MaterializedViewDeleteTrigger\""));
        assert_eq!(generator.registry().triggers_on("shop", "orders").len(), 3);
    }

    #[test]
    fn test_parameterized_view_alias() {
        let mut score = shop();
        let pv: ParameterizedView = serde_yaml::from_str(
            r#"
name: between
parameters:
  - { name: low, type: int }
  - { name: high, type: int }
segments:
  - columns:
      - alias: id
        expr: { field: { column: id } }
    from:
      - alias: o
        table: orders
    filter:
      between:
        operand: { field: { column: amount } }
        low: { param: { name: low } }
        high: { param: { name: high } }
"#,
        )
        .unwrap();
        score.grains[0].parameterized_views.push(pv);
        score.validate().unwrap();
        let g = grain(&score);
        let mut generator = DdlGenerator::offline(Dialect::H2);
        let sql = generator
            .create_parameterized_view(g, &g.parameterized_views[0])
            .unwrap();
        assert_eq!(
            sql[0].sql,
            "CREATE ALIAS \"shop\".\"between\" AS $$ java.sql.ResultSet between(java.sql.Connection conn, java.lang.Integer low, java.lang.Integer high) throws java.sql.SQLException {java.sql.PreparedStatement ps = conn.prepareStatement(\"  select \\\"o\\\".\\\"id\\\" as \\\"id\\\"  from \\\"shop\\\".\\\"orders\\\" as \\\"o\\\"  where \\\"o\\\".\\\"amount\\\" BETWEEN ? AND ?\");ps.setObject(1,low);ps.setObject(2,high);return ps.executeQuery();} $$;"
        );
    }
}
