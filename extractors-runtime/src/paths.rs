use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "env-";
pub const ENV_MARKER: &str = "extractors-env.json";
pub const LOCKS_DIR: &str = ".locks";

#[cfg(windows)]
pub const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
pub const BIN_DIR: &str = "bin";

#[cfg(windows)]
const PYTHON_EXE: &str = "python.exe";
#[cfg(not(windows))]
const PYTHON_EXE: &str = "python";

/// `env-<id>`, with anything outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn env_dir_name(entry_id: &str) -> String {
    let sanitized: String = entry_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{ENV_PREFIX}{sanitized}")
}

pub fn env_dir(env_root: &Path, entry_id: &str) -> PathBuf {
    env_root.join(env_dir_name(entry_id))
}

pub fn locks_dir(env_root: &Path) -> PathBuf {
    env_root.join(LOCKS_DIR)
}

pub fn lock_path(env_root: &Path, entry_id: &str) -> PathBuf {
    locks_dir(env_root).join(format!("{}.lock", env_dir_name(entry_id)))
}

pub fn marker_path(env_dir: &Path) -> PathBuf {
    env_dir.join(ENV_MARKER)
}

pub fn bin_dir(env_dir: &Path) -> PathBuf {
    env_dir.join(BIN_DIR)
}

pub fn interpreter_path(env_dir: &Path) -> PathBuf {
    bin_dir(env_dir).join(PYTHON_EXE)
}
