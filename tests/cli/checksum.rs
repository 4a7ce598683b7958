use crate::helpers::cli::CliTestHelper;
use crate::helpers::fixture_score;
use anyhow::Result;

#[test]
fn test_checksum_lists_materialized_views() -> Result<()> {
    let helper = CliTestHelper::new();
    helper.copy_fixture_models()?;

    let expected = fixture_score()
        .grain("shop")
        .map(|g| g.materialized_views[0].checksum())
        .unwrap();

    helper
        .command()
        .arg("checksum")
        .assert()
        .success()
        .stdout(format!("shop.region_totals {}\n", expected));

    Ok(())
}
