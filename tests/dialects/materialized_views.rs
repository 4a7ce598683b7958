//! Aggregate tables and the triggers keeping them current.

use crate::helpers::fixture_score;
use grainsql::catalog::{ObservedSchema, SnapshotProbe};
use grainsql::checksum::checksum_comment;
use grainsql::ddl::{DdlGenerator, DdlSettings, MvShape};
use grainsql::dialect::Dialect;
use grainsql::registry::TriggerKind;
use grainsql::render::sql_texts;
use insta::assert_snapshot;
use rstest::rstest;

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_triggers_carry_view_checksum(#[case] dialect: Dialect) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let view = &shop.materialized_views[0];
    let mut generator = DdlGenerator::offline(dialect);

    let sql = generator
        .create_table_triggers_for_materialized_views(shop, orders)
        .unwrap();
    let marker = checksum_comment(&view.checksum());
    assert_eq!(
        sql.iter().filter(|s| s.sql.contains(&marker)).count(),
        1,
        "only the insert trigger carries the checksum"
    );

    let insert = MvShape::new(shop, view).unwrap().trigger_name(TriggerKind::PostInsert);
    assert!(generator.registry().triggers_on("shop", "orders").contains(&insert.as_str()));
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_trigger_staleness_follows_checksum(#[case] dialect: Dialect) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let view = &shop.materialized_views[0];
    let insert = MvShape::new(shop, view).unwrap().trigger_name(TriggerKind::PostInsert);

    let probe_with = |body: String| {
        let mut snapshot = ObservedSchema::default();
        snapshot.add_trigger("shop", "orders", &insert, &body);
        DdlGenerator::new(dialect, DdlSettings::default(), Box::new(SnapshotProbe::new(snapshot)))
    };

    let current = probe_with(format!("BEGIN\n{}\nEND;", checksum_comment(&view.checksum())));
    assert!(current.materialized_view_triggers_up_to_date(shop, orders).unwrap());

    let stale = probe_with(format!("BEGIN\n{}\nEND;", checksum_comment("0000")));
    assert!(!stale.materialized_view_triggers_up_to_date(shop, orders).unwrap());

    let missing = DdlGenerator::offline(dialect);
    assert!(!missing.materialized_view_triggers_up_to_date(shop, orders).unwrap());
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_aggregate_table_keys_on_group_columns(#[case] dialect: Dialect) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let view = &shop.materialized_views[0];
    let mut generator = DdlGenerator::offline(dialect);

    let sql = generator.create_materialized_view(shop, view).unwrap();
    let table = &sql[0].sql;
    assert!(table.starts_with(&format!(
        "create table {}(",
        generator.object_name("shop", "region_totals")
    )));
    assert!(table.contains("\"surrogate_count\""));
    assert!(table.contains("primary key (\"region\")"));
    // the aggregate table is never versioned
    assert!(!table.contains("\"recversion\""));

    let definition = MvShape::new(shop, view).unwrap().table_definition();
    assert!(!definition.column("orders_count").unwrap().nullable);
    assert!(!definition.column("surrogate_count").unwrap().nullable);
}

#[rstest]
#[case::h2(
    Dialect::H2,
    "AFTER DELETE ON \"shop\".\"orders\" FOR EACH ROW CALL \"org.grainsql.h2.MaterializedViewDeleteTrigger\""
)]
#[case::postgres(
    Dialect::Postgres,
    "DELETE FROM \"shop\".\"region_totals\" WHERE \"region\" = OLD.\"region\" AND \"surrogate_count\" = 0;"
)]
#[case::mssql(
    Dialect::MsSql,
    "WHEN MATCHED AND mv.\"surrogate_count\" = aggregate.\"surrogate_count\" THEN DELETE"
)]
#[case::oracle(
    Dialect::Oracle,
    "DELETE FROM \"shop_region_totals\" mv WHERE mv.\"surrogate_count\" = 0;"
)]
#[case::firebird(
    Dialect::Firebird,
    "DELETE FROM \"shop_region_totals\" WHERE \"region\" = OLD.\"region\" AND \"surrogate_count\" = 0;"
)]
fn test_emptied_groups_are_removed(#[case] dialect: Dialect, #[case] removal: &str) {
    // inserting a row and deleting it again must leave no group behind:
    // the insert path adds to the row counter, the delete path subtracts
    // from it and removes rows whose counter reached zero
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let mut generator = DdlGenerator::offline(dialect);

    let sql = generator
        .create_table_triggers_for_materialized_views(shop, orders)
        .unwrap();
    let script = sql_texts(&sql).join("\n");
    assert!(script.contains(removal), "{}", script);
    if dialect != Dialect::H2 {
        assert!(script.contains("\"surrogate_count\" + "));
        assert!(script.contains("\"surrogate_count\" - "));
    }
}

#[test]
fn test_postgres_rows_accumulate_per_group() {
    // inserting ('east', 10) then ('east', 5) lands in one row holding 15
    // and a count of 2: the update path adds, the insert path seeds
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let mut generator = DdlGenerator::offline(Dialect::Postgres);

    let sql = generator
        .create_table_triggers_for_materialized_views(shop, orders)
        .unwrap();
    let insert_function = sql_texts(&sql)[0];
    let body = insert_function
        .split_once("IN EXCLUSIVE MODE;\n")
        .map(|(_, rest)| rest)
        .unwrap();
    assert_snapshot!(body, @r#"
    UPDATE "shop"."region_totals" SET "amount_sum" = "amount_sum" + NEW."amount", "orders_count" = "orders_count" + 1, "surrogate_count" = "surrogate_count" + 1
    WHERE "region" = NEW."region";
    GET DIAGNOSTICS updatedCount = ROW_COUNT;
    IF updatedCount = 0 THEN
      INSERT INTO "shop"."region_totals" ("region", "amount_sum", "orders_count", "surrogate_count") VALUES (NEW."region", NEW."amount", 1, 1);
    END IF;
    RETURN NEW;
    END;
    $BODY$ LANGUAGE plpgsql VOLATILE COST 100;
    "#);
}

#[rstest]
#[case::postgres(Dialect::Postgres, "TRUNCATE TABLE \"shop\".\"region_totals\"")]
#[case::firebird(Dialect::Firebird, "DELETE FROM \"shop_region_totals\"")]
fn test_init_data_refills_from_source(#[case] dialect: Dialect, #[case] empty: &str) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let view = &shop.materialized_views[0];
    let generator = DdlGenerator::offline(dialect);

    let sql = generator.init_data_for_materialized_view(shop, view).unwrap();
    assert_eq!(sql.len(), 2);
    assert_eq!(sql[0].sql, empty);
    assert!(sql[1].sql.starts_with("INSERT INTO"));
    assert!(sql[1].sql.contains("SELECT \"region\", SUM(\"amount\"), COUNT(*), COUNT(*) FROM"));
    assert!(sql[1].sql.ends_with("GROUP BY \"region\""));
}
