use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const ENV_VARS: [&str; 4] = [
    "EXTRACTORS_REGISTRY_URL",
    "EXTRACTORS_PYTHON",
    "EXTRACTORS_ENV_ROOT",
    "EXTRACTORS_TIMEOUT_SECS",
];

fn extractors_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("extractors"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// A registry entry whose only recipe copies the input to the output.
fn write_copy_entry(dir: &Path) -> PathBuf {
    let path = dir.join("copy.yaml");
    fs::write(
        &path,
        "id: copy\n\
         name: Copy\n\
         supported_filetypes:\n  - id: demo-txt\n\
         usage:\n  - method: cli\n    command: cp {{ input_path }} {{ output_path }}\n",
    )
    .expect("write entry");
    path
}

#[cfg(unix)]
#[test]
fn extract_runs_cli_recipe_from_entry_file() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let entry = write_copy_entry(work.path());
    let input = work.path().join("sample.txt");
    fs::write(&input, "payload").expect("write input");
    let output = work.path().join("copied.out");

    extractors_cmd(home.path())
        .arg("extract")
        .arg(&input)
        .args(["--type", "demo-txt", "--mode", "cli", "--no-isolate", "--no-install"])
        .arg("--entry")
        .arg(&entry)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(contains("wrote").and(contains("copied.out")));

    assert_eq!(fs::read_to_string(&output).expect("output"), "payload");
    assert!(!home.path().join(".extractors/envs").exists());
}

#[test]
fn dry_run_prints_plan_and_writes_nothing() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let entry = write_copy_entry(work.path());
    let input = work.path().join("sample.txt");
    fs::write(&input, "payload").expect("write input");

    extractors_cmd(home.path())
        .arg("extract")
        .arg(&input)
        .args(["--type", "demo-txt", "--mode", "cli", "--dry-run"])
        .arg("--entry")
        .arg(&entry)
        .assert()
        .success()
        .stdout(contains("[dry-run] extractor: copy"))
        .stdout(contains("[dry-run] method:    cli"))
        .stdout(contains("sample.json"))
        .stdout(contains("would create"));

    assert!(!work.path().join("sample.json").exists());
    assert!(!home.path().join(".extractors/envs").exists());
}

#[test]
fn unsupported_type_fails_during_plan() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let entry = write_copy_entry(work.path());
    let input = work.path().join("sample.txt");
    fs::write(&input, "payload").expect("write input");

    extractors_cmd(home.path())
        .arg("extract")
        .arg(&input)
        .args(["--type", "other-type", "--no-install"])
        .arg("--entry")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(contains("extraction failed during plan"))
        .stderr(contains("other-type"));
}

#[test]
fn missing_input_is_reported() {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let entry = write_copy_entry(work.path());

    extractors_cmd(home.path())
        .arg("extract")
        .arg(work.path().join("absent.txt"))
        .args(["--type", "demo-txt"])
        .arg("--entry")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(contains("extraction failed during input"));
}

#[test]
fn unknown_mode_is_rejected_by_argument_parsing() {
    let home = TempDir::new().expect("home");
    extractors_cmd(home.path())
        .args(["extract", "x.txt", "--type", "t", "--mode", "java"])
        .assert()
        .failure()
        .stderr(contains("unknown execution method"));
}

#[test]
fn env_list_without_environments() {
    let home = TempDir::new().expect("home");
    extractors_cmd(home.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(contains("No isolated environments"));
}

#[test]
fn env_path_points_under_home() {
    let home = TempDir::new().expect("home");
    let assert = extractors_cmd(home.path())
        .args(["env", "path", "demo"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let printed = PathBuf::from(stdout.trim());
    assert!(printed.starts_with(home.path().join(".extractors").join("envs")));
    assert!(printed.to_string_lossy().contains("demo"));
}

#[test]
fn env_root_override_is_honoured() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    let assert = extractors_cmd(home.path())
        .env("EXTRACTORS_ENV_ROOT", root.path())
        .args(["env", "path", "demo"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    assert!(PathBuf::from(stdout.trim()).starts_with(root.path()));
}

#[test]
fn env_remove_missing_environment() {
    let home = TempDir::new().expect("home");
    extractors_cmd(home.path())
        .args(["env", "remove", "demo"])
        .assert()
        .success()
        .stdout(contains("No environment for 'demo'"));
}
