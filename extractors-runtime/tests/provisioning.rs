//! Provisioner and installation tests.
//!
//! A fake `python` shell script stands in for the real interpreter:
//! `-m venv DIR` lays out `DIR/bin/python` as a copy of itself and logs DIR
//! to `venv.log` beside the script, and
//! `-m pip install PKG` fails for `nonexistent*` packages and otherwise
//! appends PKG to `pip.log` beside the interpreter.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use extractors_core::{ExtractorId, InstallMethod, InstallRecipe, RegistryEntry, SupportedFiletype};
use extractors_runtime::{ExtractError, Provisioner, RuntimeHandle};
use predicates::prelude::*;

const FAKE_PYTHON: &str = r#"#!/bin/sh
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
  echo "$3" >> "$(dirname "$0")/venv.log"
  sleep 0.2
  mkdir -p "$3/bin"
  cp "$0" "$3/bin/python"
  chmod +x "$3/bin/python"
  exit 0
fi
if [ "$1" = "-m" ] && [ "$2" = "pip" ] && [ "$3" = "install" ]; then
  case "$4" in
    nonexistent*) echo "ERROR: No matching distribution found for $4" >&2; exit 1 ;;
  esac
  echo "$4" >> "$(dirname "$0")/pip.log"
  exit 0
fi
echo "unexpected arguments: $*" >&2
exit 2
"#;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fake_python(dir: &TempDir) -> PathBuf {
    let script = dir.child("python-fake");
    script.write_str(FAKE_PYTHON).expect("write script");
    let mut perms = fs::metadata(script.path()).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(script.path(), perms).expect("chmod");
    script.path().to_path_buf()
}

fn recipe(method: &str, packages: &[&str]) -> InstallRecipe {
    InstallRecipe {
        method: InstallMethod::from(method.to_string()),
        packages: packages.iter().map(|p| p.to_string()).collect(),
    }
}

fn entry(installation: Vec<InstallRecipe>) -> RegistryEntry {
    RegistryEntry {
        id: ExtractorId::from("demo"),
        name: None,
        description: None,
        supported_filetypes: vec![SupportedFiletype::new("x")],
        installation,
        usage: vec![],
    }
}

fn pip_log(runtime: &RuntimeHandle) -> String {
    let log = runtime.interpreter().with_file_name("pip.log");
    fs::read_to_string(log).unwrap_or_default()
}

fn venv_log(dir: &TempDir) -> Vec<String> {
    fs::read_to_string(dir.path().join("venv.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn setup() -> (TempDir, Provisioner) {
    let dir = TempDir::new().expect("tempdir");
    let python = fake_python(&dir);
    let provisioner = Provisioner::new(dir.path().join("envs"), python);
    (dir, provisioner)
}

fn env_root(provisioner: &Provisioner) -> &Path {
    provisioner.env_root()
}

// ---------------------------------------------------------------------------
// 1. Environment lifecycle
// ---------------------------------------------------------------------------

#[test]
fn isolated_runtime_is_created_once_and_reused() {
    let (_dir, provisioner) = setup();

    let first = provisioner.ensure_runtime("demo", true).expect("create");
    let RuntimeHandle::Isolated(env) = &first else {
        panic!("expected isolated runtime, got {first:?}");
    };
    assert_eq!(env.root, env_root(&provisioner).join("env-demo"));
    assert!(env.interpreter().exists());

    let sentinel = env.root.join("sentinel");
    fs::write(&sentinel, "keep").expect("sentinel");

    let second = provisioner.ensure_runtime("demo", true).expect("reuse");
    assert_eq!(first, second);
    assert!(sentinel.exists(), "existing environment must not be recreated");
}

#[test]
fn half_built_environment_is_recreated() {
    let (_dir, provisioner) = setup();
    let env_dir = provisioner.env_dir("demo");
    fs::create_dir_all(&env_dir).expect("mkdir");
    fs::write(env_dir.join("leftover"), "x").expect("leftover");

    provisioner.ensure_runtime("demo", true).expect("create");
    assert!(!env_dir.join("leftover").exists());
    assert!(env_dir.join("extractors-env.json").exists());
}

#[test]
fn environments_are_listed_and_removed() {
    let (_dir, provisioner) = setup();
    provisioner.ensure_runtime("a", true).expect("a");
    provisioner.ensure_runtime("b", true).expect("b");

    let listed = provisioner.list_environments().expect("list");
    let names: Vec<_> = listed.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["env-a", "env-b"]);
    assert_eq!(listed[0].marker.as_ref().map(|m| m.entry_id.as_str()), Some("a"));

    assert!(provisioner.remove_environment("a").expect("remove"));
    assert!(!provisioner.env_dir("a").exists());
    assert_eq!(provisioner.list_environments().expect("list").len(), 1);
}

#[test]
fn venv_failure_is_environment_error() {
    let dir = TempDir::new().expect("tempdir");
    let provisioner = Provisioner::new(dir.path().join("envs"), "/bin/false");
    let err = provisioner.ensure_runtime("demo", true).unwrap_err();
    assert!(matches!(err, ExtractError::Environment { .. }), "got: {err}");
    assert!(err.to_string().contains("'demo'"), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Installation fallback
// ---------------------------------------------------------------------------

#[test]
fn failing_recipe_falls_through_to_next() {
    let (_dir, provisioner) = setup();
    let entry = entry(vec![
        recipe("pip", &["nonexistent-package-xyz"]),
        recipe("pip", &["galvani"]),
    ]);

    let runtime = provisioner.provision(&entry, true, true).expect("provision");
    assert_eq!(pip_log(&runtime).lines().collect::<Vec<_>>(), vec!["galvani"]);

    let RuntimeHandle::Isolated(env) = &runtime else {
        panic!("expected isolated runtime");
    };
    let marker = fs::read_to_string(env.marker_path()).expect("marker");
    assert!(predicate::str::contains("\"galvani\"").eval(&marker));
    assert!(!marker.contains("nonexistent"));
}

#[test]
fn partially_failing_recipe_is_abandoned() {
    let (_dir, provisioner) = setup();
    let entry = entry(vec![
        recipe("pip", &["first-ok", "nonexistent-second", "never-reached"]),
        recipe("pip", &["fallback"]),
    ]);
    let runtime = provisioner.provision(&entry, true, true).expect("provision");
    assert_eq!(
        pip_log(&runtime).lines().collect::<Vec<_>>(),
        vec!["first-ok", "fallback"]
    );
}

#[test]
fn exhausted_recipes_list_every_attempt() {
    let (_dir, provisioner) = setup();
    let entry = entry(vec![
        recipe("pip", &["nonexistent-a"]),
        recipe("conda", &["b"]),
        recipe("pip", &["nonexistent-c"]),
    ]);
    let err = provisioner.provision(&entry, true, true).unwrap_err();
    let ExtractError::InstallationFailed { entry_id, attempts } = &err else {
        panic!("expected InstallationFailed, got {err}");
    };
    assert_eq!(entry_id, "demo");
    assert_eq!(attempts.len(), 3);
    assert!(attempts[0].contains("nonexistent-a"), "{attempts:?}");
    assert!(attempts[1].contains("conda"), "{attempts:?}");
}

#[test]
fn conda_only_is_unsupported_and_runs_nothing() {
    let (_dir, provisioner) = setup();
    let entry = entry(vec![recipe("conda", &["galvani"])]);
    let err = provisioner.provision(&entry, false, true).unwrap_err();
    assert!(
        matches!(err, ExtractError::UnsupportedInstallMethod { ref method, .. } if method == "conda"),
        "got: {err}"
    );
    assert!(!env_root(&provisioner).exists());
}

#[test]
fn no_recipes_is_installation_failure() {
    let (_dir, provisioner) = setup();
    let err = provisioner.provision(&entry(vec![]), false, true).unwrap_err();
    assert!(matches!(err, ExtractError::InstallationFailed { .. }), "got: {err}");
}

#[test]
fn install_disabled_skips_recipes() {
    let (_dir, provisioner) = setup();
    let entry = entry(vec![recipe("conda", &["galvani"])]);
    let runtime = provisioner.provision(&entry, true, false).expect("provision");
    assert!(runtime.is_isolated());
    assert_eq!(pip_log(&runtime), "");
}

// ---------------------------------------------------------------------------
// 3. Provisioning lock
// ---------------------------------------------------------------------------

#[test]
fn ensure_runtime_waits_for_the_entry_lock() {
    let (_dir, provisioner) = setup();
    let held = provisioner.lock("demo").expect("lock");

    let (done_tx, done_rx) = mpsc::channel();
    let worker = provisioner.clone();
    let handle = thread::spawn(move || {
        let result = worker.ensure_runtime("demo", true);
        let _ = done_tx.send(());
        result
    });

    assert!(
        done_rx.recv_timeout(Duration::from_millis(500)).is_err(),
        "ensure_runtime finished while another holder had the lock"
    );
    assert!(!provisioner.env_dir("demo").exists());

    drop(held);
    done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("ensure_runtime should finish once the lock is released");
    let runtime = handle.join().expect("join").expect("ensure_runtime");
    assert!(runtime.is_isolated());
}

#[test]
fn other_entries_are_not_blocked() {
    let (_dir, provisioner) = setup();
    let _held = provisioner.lock("demo").expect("lock");

    let (done_tx, done_rx) = mpsc::channel();
    let worker = provisioner.clone();
    thread::spawn(move || {
        let _ = done_tx.send(worker.ensure_runtime("other", true).is_ok());
    });
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(10)), Ok(true));
}

#[test]
fn concurrent_provisioning_creates_the_environment_once() {
    let (dir, provisioner) = setup();
    let entry = entry(vec![recipe("pip", &["galvani"])]);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let provisioner = provisioner.clone();
            let entry = entry.clone();
            thread::spawn(move || provisioner.provision(&entry, true, true))
        })
        .collect();
    let runtimes: Vec<RuntimeHandle> = handles
        .into_iter()
        .map(|h| h.join().expect("join").expect("provision"))
        .collect();

    assert!(runtimes.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(venv_log(&dir).len(), 1, "venv created more than once");
}
