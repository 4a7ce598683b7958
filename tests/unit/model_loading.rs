use crate::helpers::{fixture_models, fixture_score};
use grainsql::model::graph::grain_order;
use grainsql::model::loader::load_score;
use grainsql::model::{ColumnKind, StringLength, TableKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_fixture_directory() {
    let score = fixture_score();

    let names: Vec<&str> = score.grains.iter().map(|g| g.name.as_str()).collect();
    // files are read in path order
    assert_eq!(names, vec!["billing", "shop"]);

    let shop = score.grain("shop").unwrap();
    assert_eq!(shop.version.as_deref(), Some("1.2"));
    assert_eq!(shop.tables.len(), 2);
    assert_eq!(shop.views.len(), 1);
    assert_eq!(shop.materialized_views.len(), 1);
    assert_eq!(shop.parameterized_views.len(), 1);

    let invoices = score.table("billing", "invoices").unwrap();
    assert_eq!(invoices.kind, TableKind::ReadWrite { versioned: false });
    assert!(!invoices.is_versioned());
}

#[test]
fn test_grain_order_puts_referenced_grains_first() {
    let score = fixture_score();
    assert_eq!(grain_order(&score).unwrap(), vec!["shop", "billing"]);
}

#[test]
fn test_column_yaml_forms() {
    let score = fixture_score();
    let regions = score.table("shop", "regions").unwrap();

    let title = regions.column("title").unwrap();
    assert!(title.nullable, "columns are nullable unless stated");
    assert!(matches!(
        title.kind,
        ColumnKind::String {
            length: StringLength::Max,
            ..
        }
    ));

    let orders = score.table("shop", "orders").unwrap();
    assert_eq!(orders.column("id").unwrap().sequence(), Some("order_seq"));
    assert!(orders.column("created").unwrap().has_default());
}

#[test]
fn test_load_single_file() {
    let score = load_score(&fixture_models().join("shop.yaml")).unwrap();
    assert_eq!(score.grains.len(), 1);
}

#[test]
fn test_load_score_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("score.yaml");
    fs::write(
        &path,
        r#"
grains:
  - name: a
    tables:
      - name: t
        columns:
          - { name: id, type: integer, nullable: false }
        primary_key: [id]
  - name: b
"#,
    )
    .unwrap();

    let score = load_score(&path).unwrap();
    assert_eq!(score.grains.len(), 2);
    assert!(score.table("a", "t").is_some());
}

#[test]
fn test_load_empty_directory_fails() {
    let dir = TempDir::new().unwrap();
    let err = load_score(dir.path()).unwrap_err();
    assert!(err.to_string().contains("No model files found"));
}

#[test]
fn test_load_missing_path_fails() {
    let dir = TempDir::new().unwrap();
    let err = load_score(&dir.path().join("nowhere")).unwrap_err();
    assert!(err.to_string().contains("Model path does not exist"));
}

#[test]
fn test_load_rejects_bad_string_length() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("g.yaml"),
        r#"
name: g
tables:
  - name: t
    columns:
      - { name: id, type: string, length: huge, nullable: false }
    primary_key: [id]
"#,
    )
    .unwrap();

    let err = load_score(dir.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse model file"));
}
