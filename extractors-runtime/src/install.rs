//! Ordered-fallback package installation.
//!
//! Each recipe is attempted in declaration order and produces its own
//! `Result`; the first `Ok` wins and later recipes are never touched. A pip
//! recipe is abandoned at its first failing package, leaving whatever was
//! already installed in place.

use std::process::Command;

use extractors_core::{InstallMethod, InstallRecipe};

use crate::environment::RuntimeHandle;
use crate::error::ExtractError;
use crate::process::{run_captured, RunError};

/// Why a single recipe did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeFailure {
    Unsupported(String),
    Failed(String),
}

/// Install the first recipe that fully succeeds into `runtime`.
///
/// Returns the package specifiers of the winning recipe.
pub fn install(
    runtime: &RuntimeHandle,
    entry_id: &str,
    recipes: &[InstallRecipe],
) -> Result<Vec<String>, ExtractError> {
    if recipes.is_empty() {
        return Err(ExtractError::InstallationFailed {
            entry_id: entry_id.to_string(),
            attempts: vec!["no installation recipes declared".to_string()],
        });
    }

    tracing::info!(entry = %entry_id, runtime = %runtime, "installing extractor");
    let mut failures = Vec::with_capacity(recipes.len());
    for (index, recipe) in recipes.iter().enumerate() {
        match attempt(runtime, recipe) {
            Ok(()) => {
                tracing::info!(entry = %entry_id, recipe = index, "installation succeeded");
                return Ok(recipe.packages.clone());
            }
            Err(failure) => {
                tracing::warn!(entry = %entry_id, recipe = index, ?failure, "installation recipe failed");
                failures.push((index, failure));
            }
        }
    }

    let all_unsupported = failures
        .iter()
        .all(|(_, f)| matches!(f, RecipeFailure::Unsupported(_)));
    if all_unsupported {
        let method = failures
            .first()
            .map(|(_, f)| match f {
                RecipeFailure::Unsupported(m) | RecipeFailure::Failed(m) => m.clone(),
            })
            .unwrap_or_default();
        return Err(ExtractError::UnsupportedInstallMethod {
            entry_id: entry_id.to_string(),
            method,
        });
    }

    Err(ExtractError::InstallationFailed {
        entry_id: entry_id.to_string(),
        attempts: failures
            .into_iter()
            .map(|(index, failure)| match failure {
                RecipeFailure::Unsupported(m) => format!("recipe {index}: method '{m}' not supported"),
                RecipeFailure::Failed(reason) => format!("recipe {index}: {reason}"),
            })
            .collect(),
    })
}

fn attempt(runtime: &RuntimeHandle, recipe: &InstallRecipe) -> Result<(), RecipeFailure> {
    match recipe.method {
        InstallMethod::Pip => {}
        ref other => return Err(RecipeFailure::Unsupported(other.as_str().to_string())),
    }
    if recipe.packages.is_empty() {
        return Err(RecipeFailure::Failed("pip recipe lists no packages".to_string()));
    }
    let interpreter = runtime.interpreter();
    for package in &recipe.packages {
        let mut cmd = Command::new(&interpreter);
        cmd.args(["-m", "pip", "install"]).arg(package);
        runtime.apply_env(&mut cmd);

        tracing::debug!(interpreter = %interpreter.display(), %package, "pip install");
        let captured = run_captured(cmd, None, None).map_err(|e| {
            RecipeFailure::Failed(match e {
                RunError::Spawn(e) | RunError::Wait(e) => {
                    format!("cannot run {}: {e}", interpreter.display())
                }
                RunError::Timeout(d) => format!("pip timed out after {}s", d.as_secs()),
            })
        })?;
        if !captured.status.success() {
            return Err(RecipeFailure::Failed(format!(
                "pip install {package} exited with code {}: {}",
                captured.code(),
                captured.stderr_tail()
            )));
        }
    }
    Ok(())
}
