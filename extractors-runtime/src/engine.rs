//! Execution engine: runs an [`Invocation`] in a [`RuntimeHandle`].
//!
//! | Method | Ambient                                   | Isolated                          |
//! |--------|-------------------------------------------|-----------------------------------|
//! | cli    | `sh -c` in the caller's environment       | same, env bin dir first on `PATH` |
//! | python | [`PluginTable`], else ambient interpreter | environment interpreter + bridge  |
//!
//! CLI policy: a missing output artifact is always [`ExtractError::OutputMissing`],
//! whatever the exit code; an artifact with a non-zero exit is
//! [`ExtractError::ProcessFailed`].

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use extractors_core::config::DEFAULT_MAX_RESULT_BYTES;
use extractors_core::Settings;
use extractors_usage::CallExpr;

use crate::bridge::{self, Job};
use crate::environment::RuntimeHandle;
use crate::error::{io_err, ExtractError};
use crate::plan::{Action, Invocation};
use crate::plugin::{BindError, PluginTable};
use crate::process::{run_captured, shell, RunError};

/// Engine limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Kill the extractor after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Largest value accepted back from a worker.
    pub max_result_bytes: u64,
    /// Working directory for extractor processes. Relative output paths and
    /// worker imports resolve against it.
    pub working_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            working_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: settings.timeout_secs.map(Duration::from_secs),
            max_result_bytes: settings.max_result_bytes,
            working_dir: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    pub fn max_result_bytes(mut self, limit: u64) -> Self {
        self.max_result_bytes = limit;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// What an extraction produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "lowercase")]
pub enum Outcome {
    /// The value returned by a `python` usage.
    Value(Value),
    /// The file written by a `cli` usage.
    Artifact(PathBuf),
}

impl Outcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Value(v) => Some(v),
            Outcome::Artifact(_) => None,
        }
    }

    pub fn artifact(&self) -> Option<&PathBuf> {
        match self {
            Outcome::Artifact(p) => Some(p),
            Outcome::Value(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    plugins: PluginTable,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            plugins: PluginTable::new(),
        }
    }

    pub fn plugins(mut self, plugins: PluginTable) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn plugins_mut(&mut self) -> &mut PluginTable {
        &mut self.plugins
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execute(&self, invocation: &Invocation, runtime: &RuntimeHandle) -> Result<Outcome, ExtractError> {
        match &invocation.action {
            Action::Cli { command } => self.run_cli(invocation, command, runtime),
            Action::Python { module, call } => self
                .run_python(invocation, module, call, runtime)
                .map(Outcome::Value),
        }
    }

    fn run_cli(
        &self,
        invocation: &Invocation,
        command: &str,
        runtime: &RuntimeHandle,
    ) -> Result<Outcome, ExtractError> {
        let entry_id = invocation.entry_id.as_str();
        let output = &match &self.config.working_dir {
            Some(dir) => dir.join(&invocation.output_path),
            None => invocation.output_path.clone(),
        };
        if output.exists() {
            tracing::debug!(path = %output.display(), "output path exists before execution");
        }

        let mut cmd = shell(command);
        self.prepare(&mut cmd, runtime);
        tracing::info!(entry = %entry_id, %command, %runtime, "executing");

        let captured = run_captured(cmd, None, self.config.timeout).map_err(|e| match e {
            RunError::Spawn(source) => ExtractError::Spawn {
                entry_id: entry_id.to_string(),
                program: command.to_string(),
                source,
            },
            RunError::Wait(e) => io_err(output, e),
            RunError::Timeout(d) => ExtractError::Timeout {
                entry_id: entry_id.to_string(),
                timeout_secs: d.as_secs(),
            },
        })?;
        if !captured.stdout.trim().is_empty() {
            tracing::debug!(output = %captured.stdout.trim_end(), "extractor stdout");
        }

        if !output.exists() {
            return Err(ExtractError::OutputMissing {
                entry_id: entry_id.to_string(),
                path: output.clone(),
            });
        }
        if !captured.status.success() {
            return Err(ExtractError::ProcessFailed {
                entry_id: entry_id.to_string(),
                command: command.to_string(),
                code: captured.code(),
                stderr: captured.stderr_tail(),
            });
        }

        tracing::info!(path = %output.display(), "wrote output");
        Ok(Outcome::Artifact(output.clone()))
    }

    fn run_python(
        &self,
        invocation: &Invocation,
        module: &str,
        call: &CallExpr,
        runtime: &RuntimeHandle,
    ) -> Result<Value, ExtractError> {
        let entry_id = invocation.entry_id.as_str();

        if !runtime.is_isolated() {
            if let Some(plugin) = self.plugins.module(module) {
                tracing::info!(entry = %entry_id, symbol = %call.symbol(), "calling in-process extractor");
                let function = plugin.bind(module, &call.path).map_err(|e| match e {
                    BindError::Mismatch => ExtractError::SymbolMismatch {
                        entry_id: entry_id.to_string(),
                        module: module.to_string(),
                        symbol: call.symbol(),
                    },
                    BindError::Unresolved => ExtractError::SymbolResolution {
                        entry_id: entry_id.to_string(),
                        module: module.to_string(),
                        symbol: call.symbol(),
                    },
                })?;
                return function
                    .invoke(&call.args, &call.kwargs)
                    .map_err(|e| ExtractError::CallFailed {
                        entry_id: entry_id.to_string(),
                        symbol: call.symbol(),
                        reason: e.to_string(),
                    });
            }
        }

        tracing::info!(entry = %entry_id, symbol = %call.symbol(), %runtime, "calling extractor through worker");
        let job = Job {
            module,
            path: &call.path,
            args: &call.args,
            kwargs: &call.kwargs,
            max_bytes: self.config.max_result_bytes,
        };
        bridge::call(
            entry_id,
            &runtime.interpreter(),
            &job,
            self.config.timeout,
            |cmd| self.prepare(cmd, runtime),
        )
    }

    fn prepare(&self, cmd: &mut Command, runtime: &RuntimeHandle) {
        runtime.apply_env(cmd);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
    }
}
