use crate::helpers::cli::CliTestHelper;
use crate::helpers::fixture_path;
use anyhow::Result;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_generate_defaults_to_postgres_sql() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;

    helper
        .command()
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("create schema \"shop\";"))
        .stdout(predicate::str::contains("create table \"shop\".\"orders\"("))
        .stdout(predicate::str::contains("EXECUTE PROCEDURE \"grainsys\".recversion_check();"));

    Ok(())
}

#[test]
fn test_generate_for_each_dialect() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;

    for (dialect, expected) in [
        ("h2", "CREATE ALIAS"),
        ("mssql", "next value for \"shop\".\"order_seq\""),
        ("oracle", "create table \"shop_orders\"("),
        ("firebird", "COMMIT;"),
    ] {
        helper
            .command()
            .args(["generate", "--dialect", dialect])
            .assert()
            .success()
            .stdout(predicate::str::contains(expected));
    }

    Ok(())
}

#[test]
fn test_generate_json_to_file() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;

    helper
        .command()
        .args(["generate", "--format", "json", "-o", "script.json"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let script: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(helper.project_root.join("script.json"))?)?;
    let statements = script.as_array().expect("a JSON array of statements");
    assert_eq!(statements[0]["sql"], "create schema \"shop\"");
    assert_eq!(statements[0]["safety"], "safe");
    assert!(statements.iter().any(|s| s["safety"] == "destructive"));

    Ok(())
}

#[test]
fn test_generate_reads_config_file() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;
    helper.write_config("dialect: oracle\nsystem_schema: framework\n")?;

    helper
        .command()
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"shop_orders\""));

    // the command line wins over the file
    helper
        .command()
        .args(["generate", "--dialect", "postgres"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"framework\".recversion_check()"));

    Ok(())
}

#[test]
fn test_generate_skips_observed_triggers() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;
    let observed = fixture_path("observed.yaml");

    helper
        .command()
        .args(["generate", "--observed"])
        .arg(&observed)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "BEFORE UPDATE ON \"shop\".\"regions\" FOR EACH ROW EXECUTE PROCEDURE",
        ))
        .stdout(predicate::str::contains("BEFORE UPDATE ON \"shop\".\"orders\"").not())
        .stdout(predicate::str::contains("AFTER INSERT ON \"shop\".\"orders\""));

    Ok(())
}

#[test]
fn test_generate_with_invalid_model_fails() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.write_model_file(
        "g.yaml",
        "name: g\ntables:\n  - name: t\n    columns:\n      - { name: id, type: integer }\n    primary_key: [id]\n",
    )?;

    helper
        .command()
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid primary key on table t"));

    Ok(())
}

#[test]
fn test_generate_unknown_dialect_fails() {
    let helper = CliTestHelper::new();
    helper
        .command()
        .args(["generate", "--dialect", "sqlite"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'sqlite'"));
}
