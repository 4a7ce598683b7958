//! Whole-model creation scripts, one run per dialect.

use crate::helpers::fixture_score;
use grainsql::ddl::DdlGenerator;
use grainsql::dialect::Dialect;
use grainsql::migrate::{Migrator, RecordingSink};
use grainsql::render::{RenderedSql, Safety};
use rstest::rstest;

fn create_script(dialect: Dialect) -> Vec<RenderedSql> {
    let score = fixture_score();
    let mut migrator = Migrator::new(DdlGenerator::offline(dialect), RecordingSink::new());
    migrator
        .create_score(&score)
        .unwrap_or_else(|e| panic!("{} script failed: {}", dialect, e));
    migrator.into_sink().into_statements()
}

fn position(statements: &[RenderedSql], fragment: &str) -> usize {
    statements
        .iter()
        .position(|s| s.sql.contains(fragment))
        .unwrap_or_else(|| panic!("no statement contains {}", fragment))
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_create_script_is_safe_and_complete(#[case] dialect: Dialect) {
    let statements = create_script(dialect);

    assert!(statements.iter().all(|s| !s.sql.trim().is_empty()));
    // only the refill of the materialized view empties anything
    let destructive: Vec<&str> = statements
        .iter()
        .filter(|s| s.safety == Safety::Destructive)
        .map(|s| s.sql.as_str())
        .collect();
    assert_eq!(destructive.len(), 1, "{:?}", destructive);
    assert!(destructive[0].contains("region_totals"));

    let (orders, invoices) = if dialect.has_schemas() {
        ("\"shop\".\"orders\"", "\"billing\".\"invoices\"")
    } else {
        ("\"shop_orders\"", "\"billing_invoices\"")
    };
    // referenced grains are created first
    assert!(
        position(&statements, &format!("create table {}(", orders))
            < position(&statements, &format!("create table {}(", invoices))
    );
}

#[rstest]
#[case::h2(Dialect::H2)]
#[case::postgres(Dialect::Postgres)]
#[case::mssql(Dialect::MsSql)]
fn test_schema_dialects_create_one_schema_per_grain(#[case] dialect: Dialect) {
    let statements = create_script(dialect);
    let schemas: Vec<&str> = statements
        .iter()
        .map(|s| s.sql.as_str())
        .filter(|sql| sql.starts_with("create schema"))
        .collect();
    assert_eq!(schemas, vec!["create schema \"shop\"", "create schema \"billing\""]);
}

#[rstest]
#[case::oracle(Dialect::Oracle)]
#[case::firebird(Dialect::Firebird)]
fn test_flat_dialects_prefix_names_with_grain(#[case] dialect: Dialect) {
    let statements = create_script(dialect);
    assert!(!statements.iter().any(|s| s.sql.starts_with("create schema")));
    assert!(!statements.iter().any(|s| s.sql.contains("\"shop\".")));
    position(&statements, "\"shop_region_totals\"");
    position(&statements, "\"shop_big_orders\"");
}

#[test]
fn test_firebird_commits_before_triggers() {
    let statements = create_script(Dialect::Firebird);
    for (i, statement) in statements.iter().enumerate() {
        if statement.sql.starts_with("CREATE TRIGGER") || statement.sql.starts_with("CREATE OR ALTER TRIGGER") {
            let last_ddl = statements[..i]
                .iter()
                .rposition(|s| s.sql.starts_with("create table") || s.sql == "COMMIT");
            if let Some(last) = last_ddl {
                assert_eq!(
                    statements[last].sql, "COMMIT",
                    "trigger {} follows uncommitted table DDL",
                    statement.sql
                );
            }
        }
    }
}

#[test]
fn test_postgres_sequence_feeds_column_default() {
    let statements = create_script(Dialect::Postgres);
    let orders = &statements[position(&statements, "create table \"shop\".\"orders\"(")];
    assert!(
        orders
            .sql
            .contains("\"id\" int4 not null default nextval('\"shop\".\"order_seq\"')")
    );
    // the sequence exists before the table using it
    assert!(position(&statements, "CREATE SEQUENCE \"shop\".\"order_seq\"") < position(&statements, "create table \"shop\".\"orders\"("));
}

#[test]
fn test_unversioned_table_gets_no_version_trigger() {
    let statements = create_script(Dialect::Postgres);
    assert!(statements.iter().any(|s| s.sql.contains("ON \"shop\".\"orders\" FOR EACH ROW EXECUTE PROCEDURE \"grainsys\".recversion_check()")));
    assert!(!statements.iter().any(|s| s.sql.contains("ON \"billing\".\"invoices\" FOR EACH ROW EXECUTE PROCEDURE \"grainsys\".recversion_check()")));
}
