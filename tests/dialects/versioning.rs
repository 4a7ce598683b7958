use crate::helpers::fixture_score;
use grainsql::catalog::{ObservedSchema, SnapshotProbe};
use grainsql::ddl::{DdlGenerator, DdlSettings};
use grainsql::dialect::Dialect;
use rstest::rstest;

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_versioning_trigger_is_created_once(#[case] dialect: Dialect) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let orders = shop.table("orders").unwrap();
    let mut generator = DdlGenerator::offline(dialect);

    let first = generator.update_versioning_trigger(shop, orders).unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].sql.to_lowercase().contains("trigger"));
    assert!(!generator.registry().triggers_on("shop", "orders").is_empty());

    let second = generator.update_versioning_trigger(shop, orders).unwrap();
    assert!(second.is_empty(), "{} recreated the trigger", dialect);
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_unversioned_table_without_trigger_is_left_alone(#[case] dialect: Dialect) {
    let score = fixture_score();
    let billing = score.grain("billing").unwrap();
    let invoices = billing.table("invoices").unwrap();
    let mut generator = DdlGenerator::offline(dialect);

    assert!(generator.update_versioning_trigger(billing, invoices).unwrap().is_empty());
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_versioning_trigger_dropped_when_table_stops_versioning(#[case] dialect: Dialect) {
    let score = fixture_score();
    let shop = score.grain("shop").unwrap();
    let mut orders = shop.table("orders").unwrap().clone();

    // learn the trigger name from an offline run, then observe it live
    let mut offline = DdlGenerator::offline(dialect);
    offline.update_versioning_trigger(shop, &orders).unwrap();
    let names: Vec<String> = offline
        .registry()
        .triggers_on("shop", "orders")
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut snapshot = ObservedSchema::default();
    for name in &names {
        snapshot.add_trigger("shop", "orders", name, "");
    }

    let mut generator = DdlGenerator::new(
        dialect,
        DdlSettings::default(),
        Box::new(SnapshotProbe::new(snapshot)),
    );
    assert!(generator.update_versioning_trigger(shop, &orders).unwrap().is_empty());

    orders = orders.unversioned();
    let sql = generator.update_versioning_trigger(shop, &orders).unwrap();
    assert_eq!(sql.len(), 1);
    assert!(sql[0].sql.to_lowercase().starts_with("drop trigger"), "{}", sql[0].sql);
    assert!(generator.registry().triggers_on("shop", "orders").is_empty());
}
