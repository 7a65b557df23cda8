pub mod env;
pub mod extract;
pub mod lookup;

use std::path::PathBuf;

use anyhow::{Context, Result};

use extractors_core::{config, Settings};

/// Home directory plus settings with `EXTRACTORS_*` overrides applied.
pub(crate) fn load_settings() -> Result<(PathBuf, Settings)> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let settings = config::load_at(&home)
        .with_context(|| format!("failed to read {}", config::config_path_at(&home).display()))?
        .apply_overrides(|name| std::env::var(name).ok());
    Ok((home, settings))
}
