//! Runtime handles and the isolated-environment provisioner.
//!
//! An isolated runtime is a Python virtual environment at
//! `<env_root>/env-<id>/`, created once per registry entry and reused on
//! every later extraction. Nothing here ever deletes an environment on its
//! own; [`Provisioner::remove_environment`] is an explicit operator action.
//!
//! ## Layout
//!
//! ```text
//! <env_root>/
//!   .locks/env-<id>.lock        fs2 advisory lock, one per entry
//!   env-<id>/
//!     bin/python                (Scripts\python.exe on Windows)
//!     extractors-env.json       EnvMarker, written after creation succeeds
//! ```

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use extractors_core::{RegistryEntry, Settings};

use crate::error::{io_err, ExtractError};
use crate::install;
use crate::paths;
use crate::process::{run_captured, RunError};

// ---------------------------------------------------------------------------
// RuntimeHandle
// ---------------------------------------------------------------------------

/// Where an extractor runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuntimeHandle {
    /// The caller's own interpreter and package set.
    Ambient { interpreter: PathBuf },
    /// A dedicated virtual environment owned by one registry entry.
    Isolated(IsolatedRuntime),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IsolatedRuntime {
    pub entry_id: String,
    pub root: PathBuf,
}

impl IsolatedRuntime {
    pub fn new(entry_id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            entry_id: entry_id.into(),
            root: root.into(),
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        paths::bin_dir(&self.root)
    }

    pub fn interpreter(&self) -> PathBuf {
        paths::interpreter_path(&self.root)
    }

    pub fn marker_path(&self) -> PathBuf {
        paths::marker_path(&self.root)
    }

    /// `PATH` with this environment's bin directory in front.
    pub fn search_path(&self) -> Option<OsString> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = std::iter::once(self.bin_dir()).chain(std::env::split_paths(&inherited));
        std::env::join_paths(dirs).ok()
    }
}

impl RuntimeHandle {
    pub fn interpreter(&self) -> PathBuf {
        match self {
            RuntimeHandle::Ambient { interpreter } => interpreter.clone(),
            RuntimeHandle::Isolated(env) => env.interpreter(),
        }
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self, RuntimeHandle::Isolated(_))
    }

    /// Make binaries installed into an isolated runtime resolve first.
    /// A no-op for the ambient runtime.
    pub fn apply_env(&self, cmd: &mut Command) {
        if let RuntimeHandle::Isolated(env) = self {
            if let Some(path) = env.search_path() {
                cmd.env("PATH", path);
            }
            cmd.env("VIRTUAL_ENV", &env.root);
            cmd.env_remove("PYTHONHOME");
        }
    }
}

impl fmt::Display for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeHandle::Ambient { interpreter } => write!(f, "ambient ({})", interpreter.display()),
            RuntimeHandle::Isolated(env) => write!(f, "isolated ({})", env.root.display()),
        }
    }
}

// ---------------------------------------------------------------------------
// Marker
// ---------------------------------------------------------------------------

/// Written into a finished environment; its absence marks a half-built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvMarker {
    pub entry_id: String,
    pub created_at: DateTime<Utc>,
    /// Interpreter the environment was created from.
    pub interpreter: PathBuf,
    #[serde(default)]
    pub installed: Vec<String>,
}

pub fn read_marker(env_dir: &Path) -> Result<Option<EnvMarker>, ExtractError> {
    let path = paths::marker_path(env_dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    match serde_json::from_str(&contents) {
        Ok(marker) => Ok(Some(marker)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable environment marker");
            Ok(None)
        }
    }
}

/// Writes to `<marker>.tmp` then renames over the marker.
fn write_marker(env_dir: &Path, marker: &EnvMarker) -> Result<(), ExtractError> {
    let path = paths::marker_path(env_dir);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(marker).map_err(|e| io_err(&path, std::io::Error::other(e)))?;
    fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// Exclusive per-entry provisioning lock; released when dropped.
#[derive(Debug)]
pub struct EnvLock {
    file: File,
    path: PathBuf,
}

impl EnvLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EnvLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ---------------------------------------------------------------------------
// Provisioner
// ---------------------------------------------------------------------------

/// One isolated environment found under the environment root.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInfo {
    pub name: String,
    pub path: PathBuf,
    pub marker: Option<EnvMarker>,
}

/// Creates, reuses and installs into runtimes.
#[derive(Debug, Clone)]
pub struct Provisioner {
    env_root: PathBuf,
    python: PathBuf,
}

impl Provisioner {
    /// `python` is the ambient interpreter; new environments are created from it.
    pub fn new(env_root: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        Self {
            env_root: env_root.into(),
            python: python.into(),
        }
    }

    /// Build from settings: configured interpreter, else the first `python3`
    /// or `python` on `PATH`.
    pub fn from_settings(settings: &Settings, home: &Path) -> Self {
        let python = settings
            .python
            .clone()
            .or_else(find_python)
            .unwrap_or_else(|| PathBuf::from("python3"));
        Self::new(settings.env_root_at(home), python)
    }

    pub fn env_root(&self) -> &Path {
        &self.env_root
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn env_dir(&self, entry_id: &str) -> PathBuf {
        paths::env_dir(&self.env_root, entry_id)
    }

    /// Block until this process holds the provisioning lock for `entry_id`.
    pub fn lock(&self, entry_id: &str) -> Result<EnvLock, ExtractError> {
        let dir = paths::locks_dir(&self.env_root);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let path = paths::lock_path(&self.env_root, entry_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        file.lock_exclusive().map_err(|e| io_err(&path, e))?;
        tracing::debug!(lock = %path.display(), "acquired provisioning lock");
        Ok(EnvLock { file, path })
    }

    /// Return the runtime for `entry_id`, creating its environment on first use.
    pub fn ensure_runtime(&self, entry_id: &str, isolate: bool) -> Result<RuntimeHandle, ExtractError> {
        if !isolate {
            return Ok(self.ambient());
        }
        let _lock = self.lock(entry_id)?;
        self.ensure_locked(entry_id)
    }

    /// Ensure the runtime and, when `install` is set, run the entry's
    /// installation recipes, all under one lock.
    pub fn provision(
        &self,
        entry: &RegistryEntry,
        isolate: bool,
        install: bool,
    ) -> Result<RuntimeHandle, ExtractError> {
        let entry_id = entry.id.0.as_str();
        if !isolate {
            let runtime = self.ambient();
            if install {
                install::install(&runtime, entry_id, &entry.installation)?;
            }
            return Ok(runtime);
        }

        let _lock = self.lock(entry_id)?;
        let runtime = self.ensure_locked(entry_id)?;
        if install {
            let packages = install::install(&runtime, entry_id, &entry.installation)?;
            if let RuntimeHandle::Isolated(env) = &runtime {
                record_installed(&env.root, &packages)?;
            }
        }
        Ok(runtime)
    }

    /// Every `env-*` directory under the root, sorted by name.
    pub fn list_environments(&self) -> Result<Vec<EnvironmentInfo>, ExtractError> {
        if !self.env_root.exists() {
            return Ok(Vec::new());
        }
        let read = fs::read_dir(&self.env_root).map_err(|e| io_err(&self.env_root, e))?;
        let mut found = Vec::new();
        for dirent in read {
            let dirent = dirent.map_err(|e| io_err(&self.env_root, e))?;
            let path = dirent.path();
            let name = dirent.file_name().to_string_lossy().into_owned();
            if !name.starts_with(paths::ENV_PREFIX) || !path.is_dir() {
                continue;
            }
            let marker = read_marker(&path)?;
            found.push(EnvironmentInfo { name, path, marker });
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    /// Delete the environment for `entry_id`. Returns `false` if there was none.
    pub fn remove_environment(&self, entry_id: &str) -> Result<bool, ExtractError> {
        let dir = self.env_dir(entry_id);
        if !dir.exists() {
            return Ok(false);
        }
        let _lock = self.lock(entry_id)?;
        fs::remove_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        tracing::info!(entry = %entry_id, path = %dir.display(), "removed isolated runtime");
        Ok(true)
    }

    fn ambient(&self) -> RuntimeHandle {
        RuntimeHandle::Ambient {
            interpreter: self.python.clone(),
        }
    }

    fn ensure_locked(&self, entry_id: &str) -> Result<RuntimeHandle, ExtractError> {
        let env = IsolatedRuntime::new(entry_id, self.env_dir(entry_id));
        if env.marker_path().is_file() && env.interpreter().exists() {
            tracing::debug!(entry = %entry_id, path = %env.root.display(), "reusing isolated runtime");
            return Ok(RuntimeHandle::Isolated(env));
        }

        if env.root.exists() {
            tracing::warn!(path = %env.root.display(), "incomplete environment; recreating");
            fs::remove_dir_all(&env.root).map_err(|e| io_err(&env.root, e))?;
        }
        fs::create_dir_all(&self.env_root).map_err(|e| io_err(&self.env_root, e))?;

        tracing::info!(entry = %entry_id, path = %env.root.display(), "creating isolated runtime");
        let environment_err = |reason: String| ExtractError::Environment {
            entry_id: entry_id.to_string(),
            reason,
        };
        let mut cmd = Command::new(&self.python);
        cmd.args(["-m", "venv"]).arg(&env.root);
        let captured = run_captured(cmd, None, None).map_err(|e| match e {
            RunError::Spawn(source) => ExtractError::Spawn {
                entry_id: entry_id.to_string(),
                program: self.python.display().to_string(),
                source,
            },
            RunError::Wait(e) => io_err(&self.python, e),
            RunError::Timeout(d) => environment_err(format!("venv creation timed out after {}s", d.as_secs())),
        })?;
        if !captured.status.success() {
            return Err(environment_err(format!(
                "`{} -m venv` exited with code {}: {}",
                self.python.display(),
                captured.code(),
                captured.stderr_tail()
            )));
        }
        if !env.interpreter().exists() {
            return Err(environment_err(format!(
                "no interpreter at {} after creating the environment",
                env.interpreter().display()
            )));
        }

        write_marker(
            &env.root,
            &EnvMarker {
                entry_id: entry_id.to_string(),
                created_at: Utc::now(),
                interpreter: self.python.clone(),
                installed: Vec::new(),
            },
        )?;
        Ok(RuntimeHandle::Isolated(env))
    }
}

fn record_installed(env_dir: &Path, packages: &[String]) -> Result<(), ExtractError> {
    let Some(mut marker) = read_marker(env_dir)? else {
        return Ok(());
    };
    for package in packages {
        if !marker.installed.contains(package) {
            marker.installed.push(package.clone());
        }
    }
    write_marker(env_dir, &marker)
}

/// First `python3` or `python` on `PATH`.
pub fn find_python() -> Option<PathBuf> {
    ["python3", "python"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ambient_runtime_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("envs");
        let provisioner = Provisioner::new(&root, "/usr/bin/python3");
        let handle = provisioner.ensure_runtime("demo", false).unwrap();
        assert_eq!(
            handle,
            RuntimeHandle::Ambient {
                interpreter: PathBuf::from("/usr/bin/python3")
            }
        );
        assert!(!root.exists());
    }

    #[test]
    fn marker_roundtrip_and_installed_dedup() {
        let dir = TempDir::new().unwrap();
        let marker = EnvMarker {
            entry_id: "demo".into(),
            created_at: Utc::now(),
            interpreter: PathBuf::from("python3"),
            installed: vec!["a".into()],
        };
        write_marker(dir.path(), &marker).unwrap();
        record_installed(dir.path(), &["a".to_string(), "b".to_string()]).unwrap();
        let read = read_marker(dir.path()).unwrap().unwrap();
        assert_eq!(read.installed, vec!["a", "b"]);
        assert_eq!(read.created_at, marker.created_at);
    }

    #[test]
    fn corrupt_marker_reads_as_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(paths::marker_path(dir.path()), "{not json").unwrap();
        assert!(read_marker(dir.path()).unwrap().is_none());
    }

    #[test]
    fn list_ignores_non_environment_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("env-a")).unwrap();
        fs::create_dir_all(dir.path().join(".locks")).unwrap();
        fs::create_dir_all(dir.path().join("other")).unwrap();
        fs::write(dir.path().join("env-file"), "").unwrap();
        let provisioner = Provisioner::new(dir.path(), "python3");
        let names: Vec<_> = provisioner
            .list_environments()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["env-a"]);
    }

    #[test]
    fn remove_missing_environment_is_false() {
        let dir = TempDir::new().unwrap();
        let provisioner = Provisioner::new(dir.path(), "python3");
        assert!(!provisioner.remove_environment("nope").unwrap());
    }

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let dir = TempDir::new().unwrap();
        let provisioner = Provisioner::new(dir.path(), "python3");
        let lock = provisioner.lock("demo").unwrap();
        assert!(lock.path().ends_with("env-demo.lock"));
        drop(lock);
        provisioner.lock("demo").unwrap();
    }
}
