/// CLI integration tests running the real binary with assert_cmd.
///
/// Each test gets its own temporary project via `CliTestHelper`:
/// ```rust
/// helper.command()
///     .args(["generate", "--dialect", "oracle"])
///     .assert()
///     .success()
///     .stdout(predicate::str::contains("CREATE SEQUENCE"));
/// ```
pub mod check;
pub mod checksum;
pub mod generate;
