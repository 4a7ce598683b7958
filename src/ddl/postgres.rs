use super::mv::{MvShape, RowValues};
use super::open_source::{self, OpenSourceTypeChange};
use super::{
    DdlStrategy, Session, param_type_name, result_column_type, result_columns,
};
use crate::catalog::DbColumnInfo;
use crate::checksum::checksum_comment;
use crate::constants::CONJUGATE_INDEX_POSTFIX;
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::expr::ExprType;
use crate::expr::render::{RenderHooks, render_select};
use crate::model::{Column, ColumnKind, ColumnVariant, Grain, Index, ParameterizedView, Table};
use crate::registry::{TriggerKind, TriggerQuery};
use crate::render::{RenderedSql, quote_ident, quote_qualified};

pub struct PostgresStrategy;

struct PostgresHooks;

impl RenderHooks for PostgresHooks {
    fn param_placeholder(&self, name: &str) -> String {
        name.to_string()
    }

    fn current_timestamp(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }
}

const VERSION_CHECK_TRIGGER: &str = "versioncheck";

impl PostgresStrategy {
    fn trigger_function(grain: &str, view: &str, action: &str) -> String {
        format!("{}.{}()", quote_ident(grain), quote_ident(&format!("{}_{}TriggerFunc", view, action)))
    }
}

impl OpenSourceTypeChange for PostgresStrategy {
    fn type_change(&self, alter: &str, column: &Column, actual: &DbColumnInfo, column_type: &str) -> String {
        let mut sql = format!("{} TYPE {}", alter, column_type);
        if column.variant() != actual.variant {
            match column.variant() {
                ColumnVariant::Integer => sql.push_str(&format!(" USING ({}::integer)", column.quoted_name())),
                ColumnVariant::Boolean => sql.push_str(&format!(" USING ({}::boolean)", column.quoted_name())),
                _ => {}
            }
        }
        sql
    }
}

impl DdlStrategy for PostgresStrategy {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn hooks(&self) -> &dyn RenderHooks {
        &PostgresHooks
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

    fn drop_pk(&self, grain: &str, table: &str, pk_name: &str) -> RenderedSql {
        RenderedSql::destructive(format!(
            "alter table {} drop constraint {} cascade",
            quote_qualified(grain, table),
            quote_ident(pk_name)
        ))
    }

    /// Bounded string columns also get a `varchar_pattern_ops` companion
    /// index so LIKE 'prefix%' can use an index.
    fn create_index(&self, grain: &str, table: &Table, index: &Index) -> Vec<RenderedSql> {
        let target = quote_qualified(grain, &table.name);
        let plain: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
        let mut conjugate = false;
        let patterned: Vec<String> = index
            .columns
            .iter()
            .map(|name| {
                let bounded_string = table.column(name).is_some_and(|c| {
                    matches!(&c.kind, ColumnKind::String { length, .. } if !length.is_max())
                });
                if bounded_string {
                    conjugate = true;
                    format!("{} varchar_pattern_ops", quote_ident(name))
                } else {
                    quote_ident(name)
                }
            })
            .collect();

        let mut result = vec![RenderedSql::new(format!(
            "CREATE INDEX {} ON {} ({})",
            quote_ident(&index.name),
            target,
            plain.join(", ")
        ))];
        if conjugate {
            result.push(RenderedSql::new(format!(
                "CREATE INDEX {} ON {} ({})",
                quote_ident(&format!("{}{}", index.name, CONJUGATE_INDEX_POSTFIX)),
                target,
                patterned.join(", ")
            )));
        }
        result
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
        let query = TriggerQuery::new(&grain.name, &table.name, VERSION_CHECK_TRIGGER)
            .with_kind(TriggerKind::PreUpdate);
        let exists = s.trigger_exists(&query)?;
        if table.is_versioned() {
            if exists {
                return Ok(vec![]);
            }
            s.remember(&query);
            Ok(vec![RenderedSql::new(format!(
                "CREATE TRIGGER {} BEFORE UPDATE ON {} FOR EACH ROW EXECUTE PROCEDURE {}.recversion_check();",
                quote_ident(VERSION_CHECK_TRIGGER),
                quote_qualified(&grain.name, &table.name),
                quote_ident(&s.settings.system_schema)
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

    fn create_parameterized_view(
        &self,
        s: &mut Session,
        grain: &Grain,
        view: &ParameterizedView,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let params = view
            .parameters
            .iter()
            .map(|p| Ok(format!("{} {}", p.name, param_type_name(s, &view.name, p)?)))
            .collect::<Result<Vec<_>, GenerationError>>()?;
        let columns = result_columns(view)?
            .iter()
            .map(|c| {
                let ty = if c.aggregate && c.ty != ExprType::Decimal {
                    "bigint".to_string()
                } else {
                    result_column_type(s, &view.name, c)?
                };
                Ok(format!("{} {}", quote_ident(c.alias), ty))
            })
            .collect::<Result<Vec<_>, GenerationError>>()?;
        Ok(vec![RenderedSql::new(format!(
            "create or replace function {}({}) returns TABLE({}) AS\n$$\n{} $$\nlanguage sql;",
            quote_qualified(&grain.name, &view.name),
            params.join(", "),
            columns.join(", "),
            render_select(&view.segments, &grain.name, self.hooks())
        ))])
    }

    fn drop_parameterized_view(
        &self,
        _s: &mut Session,
        grain: &str,
        name: &str,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        Ok(vec![RenderedSql::destructive(format!(
            "DROP FUNCTION IF EXISTS {}",
            quote_qualified(grain, name)
        ))])
    }

    fn trunc_date(&self, expr: &str) -> String {
        format!("date_trunc('DAY', {})", expr)
    }

    fn create_mv_triggers(
        &self,
        s: &mut Session,
        grain: &Grain,
        table: &Table,
    ) -> Result<Vec<RenderedSql>, GenerationError> {
        let source = quote_qualified(&grain.name, &table.name);
        let mut result = Vec::new();
        for view in grain.materialized_views_on(&table.name) {
            let shape = MvShape::new(grain, view)?;
            let mv = quote_qualified(&grain.name, &view.name);
            let new = RowValues::new("NEW", self);
            let old = RowValues::new("OLD", self);

            let insert_part = format!(
                "UPDATE {mv} SET {set}\nWHERE {cond};\nGET DIAGNOSTICS updatedCount = ROW_COUNT;\nIF updatedCount = 0 THEN\n  INSERT INTO {mv} ({columns}) VALUES ({values});\nEND IF;",
                set = shape.set_clause("", "+", |c| new.delta(c), "1"),
                cond = shape.row_condition("", |_, c| new.group(c)),
                columns = shape.insert_columns(),
                values = shape.insert_values(|_, c| new.group(c), |c| new.delta(c), "1"),
            );
            let delete_part = format!(
                "UPDATE {mv} SET {set}\nWHERE {cond};\nDELETE FROM {mv} WHERE {cond} AND {surrogate} = 0;",
                set = shape.set_clause("", "-", |c| old.delta(c), "1"),
                cond = shape.row_condition("", |_, c| old.group(c)),
                surrogate = quote_ident(crate::constants::SURROGATE_COUNT),
            );
            let lock = format!("LOCK TABLE ONLY {} IN EXCLUSIVE MODE;", mv);

            let bodies = [
                (
                    TriggerKind::PostInsert,
                    "insert",
                    "INSERT",
                    format!("{}\n{}\n{}\nRETURN NEW;", checksum_comment(&view.checksum()), lock, insert_part),
                ),
                (
                    TriggerKind::PostUpdate,
                    "update",
                    "UPDATE",
                    format!("{}\n{}\n{}\nRETURN NEW;", lock, delete_part, insert_part),
                ),
                (
                    TriggerKind::PostDelete,
                    "delete",
                    "DELETE",
                    format!("{}\n{}\nRETURN OLD;", lock, delete_part),
                ),
            ];
            for (kind, action, event, body) in bodies {
                let function = Self::trigger_function(&grain.name, &view.name, action);
                result.push(RenderedSql::new(format!(
                    "CREATE OR REPLACE FUNCTION {} RETURNS trigger AS $BODY$\nDECLARE\n  updatedCount int;\nBEGIN\n{}\nEND;\n$BODY$ LANGUAGE plpgsql VOLATILE COST 100;",
                    function, body
                )));
                let query = shape.trigger_query(kind);
                result.push(RenderedSql::new(format!(
                    "CREATE TRIGGER {} AFTER {} ON {} FOR EACH ROW EXECUTE PROCEDURE {};",
                    quote_ident(&query.name),
                    event,
                    source,
                    function
                )));
                s.remember(&query);
            }
        }
        Ok(result)
    }

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
                let query = shape.trigger_query(kind);
                if s.trigger_exists(&query)? {
                    result.push(self.drop_trigger(&query));
                    s.forget(&query);
                }
            }
            for action in ["insert", "update", "delete"] {
                result.push(RenderedSql::destructive(format!(
                    "DROP FUNCTION IF EXISTS {}",
                    Self::trigger_function(&grain.name, &view.name, action)
                )));
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::DdlGenerator;
    use super::super::fixtures::{grain, shop};
    use super::*;
    use crate::catalog::{ObservedSchema, SnapshotProbe};
    use crate::model::StringLength;
    use crate::render::sql_texts;
    use insta::assert_snapshot;

    fn observed(variant: ColumnVariant, nullable: bool) -> DbColumnInfo {
        DbColumnInfo {
            name: "amount".into(),
            variant,
            nullable,
            default_value: String::new(),
            length: 0,
            scale: 0,
            is_max: false,
        }
    }

    #[test]
    fn test_create_index_with_conjugate() {
        let score = shop();
        let g = grain(&score);
        let table = g.table("orders").unwrap();
        let generator = DdlGenerator::offline(Dialect::Postgres);
        assert_eq!(
            sql_texts(&generator.create_index("shop", table, &table.indices[0])),
            vec![
                "CREATE INDEX \"idx_region\" ON \"shop\".\"orders\" (\"region\", \"amount\")",
                "CREATE INDEX \"idx_region__vpo\" ON \"shop\".\"orders\" (\"region\" varchar_pattern_ops, \"amount\")"
            ]
        );
    }

    #[test]
    fn test_update_column_changes_type_with_cast() {
        let score = shop();
        let g = grain(&score);
        let table = g.table("orders").unwrap();
        let mut generator = DdlGenerator::offline(Dialect::Postgres);
        let column = Column::new("amount", ColumnKind::Integer { default: Some(0), sequence: None }).not_null();
        let sql = generator
            .update_column(g, table, &column, &observed(ColumnVariant::String, true))
            .unwrap();
        assert_eq!(
            sql_texts(&sql),
            vec![
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"amount\" DROP DEFAULT",
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"amount\" TYPE int4 USING (\"amount\"::integer)",
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"amount\" SET NOT NULL",
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"amount\" SET default 0"
            ]
        );
    }

    #[test]
    fn test_update_column_widens_string() {
        let score = shop();
        let g = grain(&score);
        let table = g.table("orders").unwrap();
        let mut generator = DdlGenerator::offline(Dialect::Postgres);
        let column = Column::string("region", StringLength::Bounded(20)).not_null();
        let mut actual = observed(ColumnVariant::String, false);
        actual.length = 10;
        let sql = generator.update_column(g, table, &column, &actual).unwrap();
        assert_eq!(
            sql_texts(&sql),
            vec![
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"region\" DROP DEFAULT",
                "ALTER TABLE \"shop\".\"orders\" ALTER COLUMN \"region\" TYPE varchar(20)"
            ]
        );
    }

    #[test]
    fn test_materialized_view_trigger_functions() {
        let score = shop();
        let g = grain(&score);
        let table = g.table("orders").unwrap();
        let mut generator = DdlGenerator::offline(Dialect::Postgres);
        let sql = generator
            .create_table_triggers_for_materialized_views(g, table)
            .unwrap();
        assert_eq!(sql.len(), 6);
        let checksum = checksum_comment(&g.materialized_views[0].checksum());
        assert!(sql[0].sql.contains(&checksum));
        assert!(!sql[2].sql.contains("CHECKSUM"));
        assert_snapshot!(sql[4].sql.replace(&checksum, ""), @r#"
        CREATE OR REPLACE FUNCTION "shop"."region_totals_deleteTriggerFunc"() RETURNS trigger AS $BODY$
        DECLARE
          updatedCount int;
        BEGIN
        LOCK TABLE ONLY "shop"."region_totals" IN EXCLUSIVE MODE;
        UPDATE "shop"."region_totals" SET "amount_sum" = "amount_sum" - OLD."amount", "surrogate_count" = "surrogate_count" - 1
        WHERE "region" = OLD."region";
        DELETE FROM "shop"."region_totals" WHERE "region" = OLD."region" AND "surrogate_count" = 0;
        RETURN OLD;
        END;
        $BODY$ LANGUAGE plpgsql VOLATILE COST 100;
        "#);
        assert!(sql[5].sql.starts_with("CREATE TRIGGER \"mvDeleteFromshop_order"));
        assert!(sql[5].sql.ends_with(
            "AFTER DELETE ON \"shop\".\"orders\" FOR EACH ROW EXECUTE PROCEDURE \"shop\".\"region_totals_deleteTriggerFunc\"();"
        ));
    }

    #[test]
    fn test_drop_materialized_view_triggers() {
        let score = shop();
        let g = grain(&score);
        let table = g.table("orders").unwrap();
        let shape = MvShape::new(g, &g.materialized_views[0]).unwrap();
        let mut snapshot = ObservedSchema::default();
        snapshot.add_trigger("shop", "orders", &shape.trigger_name(TriggerKind::PostInsert), "");
        let mut generator = DdlGenerator::new(
            Dialect::Postgres,
            Default::default(),
            Box::new(SnapshotProbe::new(snapshot)),
        );
        let sql = generator
            .drop_table_triggers_for_materialized_views(g, table)
            .unwrap();
        assert_eq!(sql.len(), 4);
        assert!(sql[0].sql.starts_with("DROP TRIGGER \"mvInsertFromshop_order"));
        assert_eq!(
            sql[3].sql,
            "DROP FUNCTION IF EXISTS \"shop\".\"region_totals_deleteTriggerFunc\"()"
        );
    }

    #[test]
    fn test_parameterized_view_function() {
        let mut score = shop();
        let pv: ParameterizedView = serde_yaml::from_str(
            r#"
name: by_region
parameters:
  - { name: r, type: text }
segments:
  - columns:
      - alias: id
        expr: { field: { column: id } }
      - alias: amount
        expr: { field: { column: amount } }
    from:
      - alias: o
        table: orders
    filter:
      compare:
        op: eq
        left: { field: { column: region } }
        right: { param: { name: r } }
"#,
        )
        .unwrap();
        score.grains[0].parameterized_views.push(pv);
        score.validate().unwrap();
        let g = grain(&score);
        let mut generator = DdlGenerator::offline(Dialect::Postgres);
        let sql = generator
            .create_parameterized_view(g, &g.parameterized_views[0])
            .unwrap();
        assert_snapshot!(sql[0].sql, @r#"
        create or replace function "shop"."by_region"(r varchar) returns TABLE("id" int4, "amount" int4) AS
        $$
          select "o"."id" as "id", "o"."amount" as "amount"
          from "shop"."orders" as "o"
          where "o"."region" = r $$
        language sql;
        "#);
    }
}
