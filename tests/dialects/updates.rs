//! Converging an existing table, its versioning trigger and the
//! materialized views it feeds.

use crate::helpers::fixture_score;
use grainsql::catalog::{DbColumnInfo, ObservedSchema, SnapshotProbe};
use grainsql::checksum::checksum_comment;
use grainsql::ddl::{DdlGenerator, DdlSettings, MvShape};
use grainsql::dialect::Dialect;
use grainsql::migrate::{Migrator, RecordingSink};
use grainsql::model::{ColumnVariant, Grain, Table};
use grainsql::registry::TriggerKind;
use grainsql::render::{quote_ident, sql_texts};
use rstest::rstest;

fn observed(name: &str, variant: ColumnVariant, nullable: bool, default: &str) -> DbColumnInfo {
    DbColumnInfo {
        name: name.into(),
        variant,
        nullable,
        default_value: default.into(),
        length: 0,
        scale: 0,
        is_max: false,
    }
}

/// `shop.orders` exactly as the fixture model declares it.
fn observed_orders(snapshot: &mut ObservedSchema) {
    let columns = [
        observed("id", ColumnVariant::Integer, false, "NEXTVAL(order_seq)"),
        DbColumnInfo {
            length: 10,
            ..observed("region", ColumnVariant::String, false, "")
        },
        observed("amount", ColumnVariant::Integer, false, "0"),
        DbColumnInfo {
            length: 12,
            scale: 2,
            ..observed("price", ColumnVariant::Decimal, true, "")
        },
        observed("paid", ColumnVariant::Boolean, false, "false"),
        observed("created", ColumnVariant::DateTime, true, "GETDATE()"),
    ];
    for column in columns {
        snapshot.add_column("shop", "orders", column);
    }
    snapshot.add_column(
        "shop",
        "region_totals",
        DbColumnInfo {
            length: 10,
            ..observed("region", ColumnVariant::String, false, "")
        },
    );
}

/// A database where `table` and its triggers were created from the model,
/// with `checksum` embedded in the materialized view's insert trigger.
fn deployed(dialect: Dialect, shop: &Grain, table: &Table, checksum: &str) -> DdlGenerator {
    let mut offline = DdlGenerator::offline(dialect);
    offline.update_versioning_trigger(shop, table).unwrap();
    offline
        .create_table_triggers_for_materialized_views(shop, table)
        .unwrap();
    let insert = MvShape::new(shop, &shop.materialized_views[0])
        .unwrap()
        .trigger_name(TriggerKind::PostInsert);

    let mut snapshot = ObservedSchema::default();
    for name in offline.registry().triggers_on("shop", &table.name) {
        let body = if name == insert {
            format!("BEGIN\n{}\nEND;", checksum_comment(checksum))
        } else {
            String::new()
        };
        snapshot.add_trigger("shop", &table.name, name, &body);
    }
    observed_orders(&mut snapshot);
    DdlGenerator::new(dialect, DdlSettings::default(), Box::new(SnapshotProbe::new(snapshot)))
}

/// Runs `update_table` and returns the statements with the trigger names
/// the session knows on the table afterwards.
fn update(generator: DdlGenerator, shop: &Grain, table: &Table) -> (Vec<String>, Vec<String>) {
    let mut migrator = Migrator::new(generator, RecordingSink::new());
    migrator.update_table(shop, table).unwrap();
    let known = migrator
        .generator()
        .registry()
        .triggers_on("shop", &table.name)
        .into_iter()
        .map(str::to_string)
        .collect();
    let texts = sql_texts(migrator.sink().statements())
        .into_iter()
        .map(str::to_string)
        .collect();
    (texts, known)
}

fn versioning_trigger(dialect: Dialect, shop: &Grain, table: &Table) -> String {
    let mut offline = DdlGenerator::offline(dialect);
    offline.update_versioning_trigger(shop, table).unwrap();
    offline.registry().triggers_on("shop", &table.name)[0].to_string()
}

#[rstest]
#[case::h2(Dialect::H2, false)]
#[case::postgres(Dialect::Postgres, false)]
#[case::mssql(Dialect::MsSql, false)]
#[case::oracle(Dialect::Oracle, true)]
#[case::firebird(Dialect::Firebird, true)]
fn test_column_change_keeps_versioning_trigger(#[case] dialect: Dialect, #[case] dropped_for_alter: bool) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let view = &shop.materialized_views[0];
    let generator = deployed(dialect, shop, orders, &view.checksum());

    let mut changed = orders.clone();
    changed.columns.iter_mut().find(|c| c.name == "amount").unwrap().nullable = true;
    let name = versioning_trigger(dialect, shop, orders);
    let (texts, known) = update(generator, shop, &changed);

    let quoted = quote_ident(&name);
    let mentions: Vec<&String> = texts.iter().filter(|s| s.contains(&quoted)).collect();
    if dropped_for_alter {
        assert!(mentions.first().unwrap().to_lowercase().starts_with("drop trigger"));
        assert!(
            !mentions.last().unwrap().to_lowercase().starts_with("drop trigger"),
            "{} left {} dropped: {:#?}",
            dialect,
            name,
            texts
        );
    } else if let Some(last) = mentions.last() {
        assert!(!last.to_lowercase().starts_with("drop trigger"), "{:#?}", texts);
    }
    assert!(known.contains(&name));
}

#[test]
fn test_mssql_unversioned_update_trigger_keeps_view_current() {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap().clone().unversioned();
    let view = &shop.materialized_views[0];
    let generator = deployed(Dialect::MsSql, shop, &orders, &view.checksum());

    let (texts, known) = update(generator, shop, &orders);

    let last = texts.last().unwrap();
    assert!(
        last.starts_with("create trigger \"shop\".\"orders_upd\" on \"shop\".\"orders\" for update"),
        "{:#?}",
        texts
    );
    assert!(last.contains("MERGE INTO \"shop\".\"region_totals\""));
    assert!(!last.contains("RAISERROR"));
    assert!(known.contains(&"orders_upd".to_string()));
}

#[test]
fn test_mssql_versioned_update_trigger_does_both_jobs() {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let view = &shop.materialized_views[0];
    let generator = deployed(Dialect::MsSql, shop, orders, &view.checksum());

    let (texts, _) = update(generator, shop, orders);

    let last = texts.last().unwrap();
    assert!(last.starts_with("alter trigger \"shop\".\"orders_upd\""), "{:#?}", texts);
    assert!(last.contains("RAISERROR ('record version check failure', 16, 1);"));
    assert!(last.contains("MERGE INTO \"shop\".\"region_totals\""));
    let recreated = texts
        .iter()
        .position(|s| s.starts_with("create trigger \"shop\".\"orders_upd\""))
        .unwrap();
    let dropped = texts
        .iter()
        .position(|s| s == "drop trigger \"shop\".\"orders_upd\"")
        .unwrap();
    assert!(dropped < recreated);
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_stale_materialized_view_is_rebuilt(#[case] dialect: Dialect) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let view = &shop.materialized_views[0];
    let generator = deployed(dialect, shop, orders, "0000");
    let mv = generator.object_name("shop", "region_totals");

    let (texts, _) = update(generator, shop, orders);

    let at = |prefix: &str| {
        texts
            .iter()
            .position(|s| s.starts_with(prefix))
            .unwrap_or_else(|| panic!("no statement starting with {}: {:#?}", prefix, texts))
    };
    let dropped = at(&format!("DROP TABLE {}", mv));
    let created = at(&format!("create table {}(", mv));
    let filled = at(&format!("INSERT INTO {} (", mv));
    let marker = checksum_comment(&view.checksum());
    let trigger = texts.iter().rposition(|s| s.contains(&marker)).unwrap();
    assert!(dropped < created && created < filled && filled < trigger);
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_current_materialized_view_keeps_its_rows(#[case] dialect: Dialect) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let view = &shop.materialized_views[0];
    let generator = deployed(dialect, shop, orders, &view.checksum());
    let mv = generator.object_name("shop", "region_totals");

    let (texts, _) = update(generator, shop, orders);

    assert!(!texts.iter().any(|s| s.starts_with("DROP TABLE")), "{:#?}", texts);
    assert!(!texts.iter().any(|s| s.starts_with(&format!("INSERT INTO {}", mv))));
    // triggers are recreated regardless
    let marker = checksum_comment(&view.checksum());
    assert_eq!(texts.iter().filter(|s| s.contains(&marker)).count(), 1);
}

#[test]
fn test_changed_source_columns_rebuild_view() {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let view = &shop.materialized_views[0];
    let generator = deployed(Dialect::Postgres, shop, orders, &view.checksum());

    let mut changed = orders.clone();
    changed.columns.iter_mut().find(|c| c.name == "price").unwrap().nullable = false;
    let (texts, _) = update(generator, shop, &changed);

    assert!(texts.iter().any(|s| s == "DROP TABLE \"shop\".\"region_totals\""), "{:#?}", texts);
    assert!(texts.iter().any(|s| s == "TRUNCATE TABLE \"shop\".\"region_totals\""));
}
