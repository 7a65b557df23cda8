//! # extractors-runtime
//!
//! Provisions runtimes for registry-described extractors and executes them.
//!
//! - [`plan`] — entry + request → [`Invocation`] (no side effects)
//! - [`environment`] — ambient/isolated [`RuntimeHandle`]s and the [`Provisioner`]
//! - [`install`] — ordered-fallback pip installation
//! - [`engine`] — CLI and python execution, returning an [`Outcome`]
//! - [`plugin`] — in-process extractors behind the [`Extractor`] capability
//! - [`extract`](mod@extract) — the orchestrator tying it together
//!
//! ```rust,no_run
//! use extractors_runtime::{extract, ExtractRequest};
//!
//! let outcome = extract(&ExtractRequest::new("data/run.mpr", "biologic-mpr")).unwrap();
//! println!("{:?}", outcome.into_value());
//! ```

mod bridge;
pub mod engine;
pub mod environment;
pub mod error;
pub mod extract;
pub mod install;
pub mod paths;
pub mod plan;
pub mod plugin;
mod process;

pub use engine::{Engine, EngineConfig, Outcome};
pub use environment::{find_python, EnvMarker, EnvironmentInfo, IsolatedRuntime, Provisioner, RuntimeHandle};
pub use error::ExtractError;
pub use extract::{extract, ExtractRequest, ExtractSession, InputSource};
pub use plan::{default_output_path, Action, ExecutionPlan, Invocation, PlanRequest};
pub use plugin::{Extractor, InvokeResult, Module, PluginTable};
