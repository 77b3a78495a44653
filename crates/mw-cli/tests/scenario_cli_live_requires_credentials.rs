use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// Live runs resolve every source credential up front and never touch the
/// network when one is missing.
#[test]
fn live_check_without_credentials_fails_with_secrets_missing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("mirrorwatch.yaml");
    std::fs::write(
        &config,
        r#"
authoritative:
  name: Gerrit
  base_url: http://127.0.0.1:9
  credentials_env:
    username: MW_TEST_UNSET_GERRIT_USER
    password: MW_TEST_UNSET_GERRIT_PASS
mirrors:
  - name: Github
    kind: github
    base_url: http://127.0.0.1:9
    owner: example
    visibility: public
    token_env: MW_TEST_UNSET_GITHUB_TOKEN
"#,
    )?;

    Command::cargo_bin("mirrorwatch")?
        .current_dir(dir.path())
        .env_remove("MW_CACHE_MODE")
        .env_remove("MW_TEST_UNSET_GERRIT_USER")
        .env_remove("MW_TEST_UNSET_GERRIT_PASS")
        .env_remove("MW_TEST_UNSET_GITHUB_TOKEN")
        .args(["check", "--no-notify", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains("MW_TEST_UNSET_GERRIT_USER"));
    Ok(())
}

#[test]
fn snapshot_without_credentials_fails_with_secrets_missing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("mirrorwatch.yaml");
    std::fs::write(
        &config,
        r#"
authoritative:
  name: Gerrit
  base_url: http://127.0.0.1:9
  credentials_env:
    username: MW_TEST_UNSET_GERRIT_USER
    password: MW_TEST_UNSET_GERRIT_PASS
"#,
    )?;

    Command::cargo_bin("mirrorwatch")?
        .current_dir(dir.path())
        .env_remove("MW_TEST_UNSET_GERRIT_USER")
        .env_remove("MW_TEST_UNSET_GERRIT_PASS")
        .args(["snapshot", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"));
    Ok(())
}
