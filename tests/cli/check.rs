use crate::helpers::cli::CliTestHelper;
use anyhow::Result;
use predicates::prelude::*;

#[test]
fn test_check_valid_model() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;

    helper
        .command()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Model is valid: 2 grain(s), 3 table(s), 1 view(s), 1 materialized view(s), 1 parameterized view(s)",
        ))
        .stdout(predicate::str::contains("Grain order: shop → billing"));

    Ok(())
}

#[test]
fn test_check_model_path_flag() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;

    helper
        .command()
        .args(["check", "--model-path", "schema/shop.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 grain(s), 2 table(s)"));

    Ok(())
}

#[test]
fn test_check_reports_invalid_model() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.write_model_file(
        "g.yaml",
        r#"
name: g
tables:
  - name: t
    columns:
      - { name: id, type: integer, nullable: false }
      - { name: id, type: integer }
    primary_key: [id]
"#,
    )?;

    helper
        .command()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Model is invalid"))
        .stderr(predicate::str::contains("Duplicate column 'id' in t"));

    Ok(())
}

#[test]
fn test_check_missing_model_directory() {
    let helper = CliTestHelper::new();
    helper
        .command()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Model path does not exist"));
}

#[test]
fn test_check_rejects_malformed_config() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;
    helper.write_config("dialect: [unbalanced")?;

    helper
        .command()
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));

    Ok(())
}
