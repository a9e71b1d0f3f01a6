//! Integration tests for the overlay-engine CLI
//!
//! These tests run the actual binary against overlay files in a temp dir.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the binary to test
fn engine_cmd() -> Command {
    let mut cmd = Command::cargo_bin("overlay-engine").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("OVERLAY_ENGINE_ROOT")
        .env_remove("OVERLAY_ENGINE_DEFAULTS_DIR");
    cmd
}

const RATINGS: &str = r#"
templates:
  rating:
    default:
      rating<<rating_num>>_image: imdb
    overlay:
      name: text(<<rating<<rating_num>>>>)
      file: <<rating<<rating_num>>_image>>.png
      group: rating<<rating_num>>_group
      weight: <<weight>>
overlays:
  Rating-Rotten:
    variables: {weight: 10}
    template: {name: rating, rating_num: 1}
  Rating-Fresh:
    variables: {weight: 1}
    template: {name: rating, rating_num: 1}
"#;

fn write_ratings(dir: &TempDir) -> String {
    let file = dir.path().join("ratings.yml");
    fs::write(&file, RATINGS).unwrap();
    file.to_str().unwrap().to_string()
}

#[test]
fn test_help_flag() {
    engine_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("expand"))
        .stdout(predicate::str::contains("keys"));
}

#[test]
fn test_expand_prints_json() {
    let dir = TempDir::new().unwrap();
    let file = write_ratings(&dir);

    engine_cmd()
        .args(["expand", &file, "--var", "rating1=critic / rt_tomato"])
        .arg("--defaults-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "text(critic)""#))
        .stdout(predicate::str::contains(r#""file": "rt_tomato.png""#))
        .stdout(predicate::str::contains(r#""_template": "rating""#));
}

#[test]
fn test_expand_vars_json_and_yaml_output() {
    let dir = TempDir::new().unwrap();
    let file = write_ratings(&dir);

    engine_cmd()
        .args(["expand", &file, "--vars", r#"{"rating1": "audience"}"#, "--format", "yaml"])
        .arg("--defaults-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("name: text(audience)"))
        .stdout(predicate::str::contains("file: imdb.png"));
}

#[test]
fn test_expand_preview_keeps_fresh_rating() {
    let dir = TempDir::new().unwrap();
    let file = write_ratings(&dir);

    engine_cmd()
        .args(["expand", &file, "--preview", "--var", "rating1=critic"])
        .arg("--defaults-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Rating-Fresh"))
        .stdout(predicate::str::contains("Rating-Rotten").not());
}

#[test]
fn test_expand_missing_file_is_empty_success() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.yml");

    engine_cmd()
        .arg("expand")
        .arg(&missing)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No overlays found"));
}

#[test]
fn test_expand_rejects_malformed_var() {
    let dir = TempDir::new().unwrap();
    let file = write_ratings(&dir);

    engine_cmd()
        .args(["expand", &file, "--var", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("--var key=value"));
}

#[test]
fn test_keys_lists_declared_overlays() {
    let dir = TempDir::new().unwrap();
    let file = write_ratings(&dir);

    engine_cmd()
        .args(["keys", &file])
        .assert()
        .success()
        .stdout(predicate::str::diff("Rating-Rotten\nRating-Fresh\n"));
}

#[test]
fn test_list_finds_overlay_files() {
    let dir = TempDir::new().unwrap();
    let defaults = dir.path().join("defaults").join("overlays");
    fs::create_dir_all(&defaults).unwrap();
    fs::write(defaults.join("templates.yml"), "templates: {}").unwrap();
    fs::write(defaults.join("resolution.yml"), "overlays: {}").unwrap();

    engine_cmd()
        .arg("list")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("resolution.yml"))
        .stdout(predicate::str::contains("templates.yml").not());
}
