//! CLI 集成测试
//!
//! 每个测试在临时目录写入清单，再用 assert_cmd 驱动二进制

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[settings]
lazy = true

[environments.dev]
locations = ["app"]
active_profiles = ["local"]
properties_files = ["dev.properties"]

[environments.dev.properties]
port = 8080
greeting = "hello ${user:anonymous}"

[environments.prod]
locations = ["app"]

[environments.prod.properties]
port = 443
"#;

/// 包含清单及其 properties 文件的临时目录
fn create_test_env() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("dev.properties"), "port=80\nname=dev-app\n").unwrap();
    let manifest = dir.path().join("multienv.toml");
    fs::write(&manifest, MANIFEST).unwrap();
    (dir, manifest)
}

fn multienv(manifest: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("multienv").unwrap();
    cmd.arg("--manifest").arg(manifest);
    cmd
}

mod basic_commands {
    use super::*;

    #[test]
    fn test_help_command() {
        Command::cargo_bin("multienv")
            .unwrap()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("props"));
    }

    #[test]
    fn test_envs_lists_sorted_names() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .arg("envs")
            .assert()
            .success()
            .stdout("dev\nprod\n");
    }

    #[test]
    fn test_check_builds_every_environment() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .arg("check")
            .assert()
            .success()
            .stdout(predicate::str::contains("dev: ok"))
            .stdout(predicate::str::contains("prod: ok"));
    }
}

mod property_commands {
    use super::*;

    #[test]
    fn test_get_inline_overrides_file() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .args(["get", "dev", "port"])
            .assert()
            .success()
            .stdout("8080\n");
    }

    #[test]
    fn test_get_from_properties_file() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .args(["get", "dev", "name"])
            .assert()
            .success()
            .stdout("dev-app\n");
    }

    #[test]
    fn test_get_resolves_placeholder_default() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .args(["get", "dev", "greeting"])
            .assert()
            .success()
            .stdout("hello anonymous\n");
    }

    #[test]
    fn test_environments_are_isolated() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .args(["get", "prod", "name"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("name"));
    }

    #[test]
    fn test_props_env_format() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .args(["props", "prod"])
            .assert()
            .success()
            .stdout("port=443\n");
    }

    #[test]
    fn test_props_json_format() {
        let (_dir, manifest) = create_test_env();

        let output = multienv(&manifest)
            .args(["props", "dev", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["port"], "8080");
        assert_eq!(json["name"], "dev-app");
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn test_unknown_environment() {
        let (_dir, manifest) = create_test_env();

        multienv(&manifest)
            .args(["get", "staging", "port"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("staging"));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();

        multienv(&dir.path().join("absent.toml"))
            .arg("envs")
            .assert()
            .failure()
            .stderr(predicate::str::contains("manifest"));
    }

    #[test]
    fn test_invalid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("multienv.toml");
        fs::write(&manifest, "[environments.dev\n").unwrap();

        multienv(&manifest).arg("envs").assert().failure();
    }

    #[test]
    fn test_check_reports_progress_before_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("multienv.toml");
        fs::write(
            &manifest,
            "[environments.a-ok]\nlocations = [\"app\"]\n\n[environments.b-broken]\n",
        )
        .unwrap();

        multienv(&manifest)
            .arg("check")
            .assert()
            .failure()
            .stdout("a-ok: ok\n")
            .stderr(predicate::str::contains("nothing to register"));
    }

    #[test]
    fn test_check_fails_without_locations() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("multienv.toml");
        fs::write(&manifest, "[environments.dev]\n").unwrap();

        multienv(&manifest)
            .arg("check")
            .assert()
            .failure()
            .stderr(predicate::str::contains("nothing to register"));
    }
}
