use anyhow::Result;
use grainsql::error::ModelError;
use grainsql::model::Score;
use rstest::rstest;

fn parse(yaml: &str) -> Score {
    serde_yaml::from_str(yaml).expect("test model should parse")
}

#[rstest]
#[case::text_blob("{ name: k, type: string, length: MAX, nullable: false }", "VARCHAR")]
#[case::binary("{ name: k, type: binary, nullable: false }", "BLOB")]
fn test_unbounded_primary_key_is_rejected(#[case] column: &str, #[case] variant: &str) {
    let score = parse(&format!(
        r#"
grains:
  - name: g
    tables:
      - name: t
        columns:
          - {column}
        primary_key: [k]
"#
    ));

    let err = score.validate().unwrap_err();
    assert!(matches!(err, ModelError::PrimaryKey { .. }));
    assert_eq!(
        err.to_string(),
        format!(
            "Invalid primary key on table t: column 'k' is of an unbounded type ({})",
            variant
        )
    );
}

#[test]
fn test_nullable_primary_key_is_rejected() {
    let score = parse(
        r#"
grains:
  - name: g
    tables:
      - name: t
        columns:
          - { name: k, type: integer }
        primary_key: [k]
"#,
    );
    let err = score.validate().unwrap_err();
    assert!(err.to_string().contains("column 'k' is nullable"));
}

#[test]
fn test_read_only_table_needs_no_primary_key() -> Result<()> {
    let score = parse(
        r#"
grains:
  - name: g
    tables:
      - name: t
        kind: read_only
        columns:
          - { name: k, type: integer }
"#,
    );
    score.validate()?;
    Ok(())
}

#[test]
fn test_grain_cycle_is_rejected() {
    let score = parse(
        r#"
grains:
  - name: a
    tables:
      - name: ta
        columns:
          - { name: id, type: integer, nullable: false }
          - { name: b_id, type: integer }
        primary_key: [id]
        foreign_keys:
          - columns: [b_id]
            references: { grain: b, table: tb }
  - name: b
    tables:
      - name: tb
        columns:
          - { name: id, type: integer, nullable: false }
          - { name: a_id, type: integer }
        primary_key: [id]
        foreign_keys:
          - columns: [a_id]
            references: { grain: a, table: ta }
"#,
    );

    let err = score.validate().unwrap_err();
    assert!(matches!(err, ModelError::GrainCycle(_)));
    assert!(err.to_string().starts_with("Foreign keys form a cycle between grains"));
}

#[test]
fn test_materialized_view_rejects_filter() {
    let score = parse(
        r#"
grains:
  - name: g
    tables:
      - name: t
        columns:
          - { name: id, type: integer, nullable: false }
          - { name: v, type: integer }
        primary_key: [id]
    materialized_views:
      - name: mv
        segments:
          - columns:
              - alias: id
                expr: { field: { column: id } }
              - alias: total
                expr: { sum: { field: { column: v } } }
            from:
              - alias: t
                table: t
            filter:
              compare:
                op: gt
                left: { field: { column: v } }
                right: { literal: { number: "0" } }
            group_by: [id]
"#,
    );

    let err = score.validate().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid materialized view mv: a filter condition is not allowed"
    );
}

#[test]
fn test_unused_parameter_is_rejected() {
    let score = parse(
        r#"
grains:
  - name: g
    tables:
      - name: t
        columns:
          - { name: id, type: integer, nullable: false }
        primary_key: [id]
    parameterized_views:
      - name: pv
        parameters:
          - { name: p, type: int }
        segments:
          - columns:
              - alias: id
                expr: { field: { column: id } }
            from:
              - alias: t
                table: t
"#,
    );

    let err = score.validate().unwrap_err();
    assert!(matches!(err, ModelError::UnusedParameter(ref name) if name == "p"));
}

#[test]
fn test_where_clause_must_be_a_condition() {
    let score = parse(
        r#"
grains:
  - name: g
    tables:
      - name: t
        columns:
          - { name: id, type: integer, nullable: false }
        primary_key: [id]
    views:
      - name: v
        segments:
          - columns:
              - alias: id
                expr: { field: { column: id } }
            from:
              - alias: t
                table: t
            filter: { field: { column: id } }
"#,
    );

    let err = score.validate().unwrap_err();
    assert!(matches!(err, ModelError::TypeMismatch { .. }), "{err}");
}
