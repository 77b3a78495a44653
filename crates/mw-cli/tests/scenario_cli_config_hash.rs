use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn config_hash_prints_hash_and_canonical_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("base.yaml");
    let site = dir.path().join("site.yaml");
    std::fs::write(
        &base,
        "authoritative:\n  base_url: https://gerrit.example.org\nrun:\n  grace_minutes: 10\n",
    )?;
    std::fs::write(&site, "run:\n  grace_minutes: 20\n")?;

    let out = Command::cargo_bin("mirrorwatch")?
        .current_dir(dir.path())
        .arg("config-hash")
        .arg(&base)
        .arg(&site)
        .output()?;
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout)?;
    let mut lines = stdout.lines();
    let hash_line = lines.next().unwrap_or_default();
    assert!(hash_line.starts_with("config_hash="));
    assert_eq!(hash_line.len(), "config_hash=".len() + 64);
    // later layer wins
    assert!(stdout.contains("\"grace_minutes\":20"));
    Ok(())
}

#[test]
fn config_hash_rejects_secret_literals() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("base.yaml");
    std::fs::write(
        &base,
        "authoritative:\n  base_url: https://gerrit.example.org\nmirrors:\n  - token_env: ghp_abcdef\n",
    )?;

    Command::cargo_bin("mirrorwatch")?
        .current_dir(dir.path())
        .arg("config-hash")
        .arg(&base)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"));
    Ok(())
}
