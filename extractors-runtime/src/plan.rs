//! Turning a registry entry plus a request into a concrete invocation.
//!
//! Planning has no side effects: it never touches the filesystem, spawns a
//! process or imports anything. Every check that can fail before execution
//! (unsupported input type, no usable recipe, bad setup, unparsable call)
//! fails here.

use std::path::{Path, PathBuf};

use serde::Serialize;

use extractors_core::{RegistryEntry, UsageMethod};
use extractors_usage::{
    parse_call, parse_setup, resolve_template, select_usage, unresolved_fields, CallExpr,
    TemplateFields,
};

use crate::environment::RuntimeHandle;
use crate::error::ExtractError;

/// What the caller wants extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub input_type: String,
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub output_type: Option<String>,
    pub preferred: UsageMethod,
}

/// The executable form of the selected usage recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Action {
    /// A shell command line expected to write `output_path`.
    Cli { command: String },
    /// A call into `module`, returning a value.
    Python { module: String, call: CallExpr },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub entry_id: String,
    pub input_type: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// The command after template substitution.
    pub command: String,
    pub setup: Option<String>,
    pub action: Action,
}

/// An invocation bound to the runtime it will execute in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub invocation: Invocation,
    pub runtime: RuntimeHandle,
}

impl Invocation {
    pub fn resolve(entry: &RegistryEntry, request: &PlanRequest) -> Result<Self, ExtractError> {
        let entry_id = entry.id.0.clone();

        let filetype = entry.filetype(&request.input_type).ok_or_else(|| {
            ExtractError::UnsupportedInputType {
                entry_id: entry_id.clone(),
                input_type: request.input_type.clone(),
            }
        })?;

        let recipe = select_usage(&entry.usage, &request.preferred).ok_or_else(|| {
            ExtractError::NoUsage {
                entry_id: entry_id.clone(),
            }
        })?;

        let output_path = request
            .output_path
            .clone()
            .unwrap_or_else(|| default_output_path(&request.input_path));

        let fields = TemplateFields::new(request.input_type.clone(), &request.input_path)
            .output_type(request.output_type.clone())
            .output_path(Some(&output_path));
        let overrides = filetype.template.as_ref();

        let command = resolve_template(&recipe.command, &recipe.method, &fields, overrides);
        let leftover = unresolved_fields(&command);
        if !leftover.is_empty() {
            tracing::warn!(entry = %entry_id, %command, ?leftover, "command still contains unresolved placeholders");
        }
        // The setup is a module path, never a quoted literal.
        let setup = recipe
            .setup
            .as_deref()
            .map(|s| resolve_template(s, &UsageMethod::Cli, &fields, overrides));

        let usage_err = |source| ExtractError::Usage {
            entry_id: entry_id.clone(),
            source,
        };
        let action = match recipe.method {
            UsageMethod::Cli => Action::Cli {
                command: command.clone(),
            },
            UsageMethod::Python => {
                let call = parse_call(&command).map_err(usage_err)?;
                let module = match setup.as_deref() {
                    Some(setup) => parse_setup(setup).map_err(usage_err)?.to_string(),
                    None => call.path[0].clone(),
                };
                Action::Python { module, call }
            }
            UsageMethod::Other(_) => {
                return Err(ExtractError::NoUsage { entry_id });
            }
        };

        Ok(Self {
            entry_id,
            input_type: request.input_type.clone(),
            input_path: request.input_path.clone(),
            output_path,
            command,
            setup,
            action,
        })
    }

    pub fn method(&self) -> UsageMethod {
        match self.action {
            Action::Cli { .. } => UsageMethod::Cli,
            Action::Python { .. } => UsageMethod::Python,
        }
    }
}

/// `<input>.json`, or `<input stem>.out.json` when the input already is JSON.
pub fn default_output_path(input: &Path) -> PathBuf {
    let candidate = input.with_extension("json");
    if candidate == input {
        input.with_extension("out.json")
    } else {
        candidate
    }
}
