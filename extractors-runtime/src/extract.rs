//! The `extract` orchestrator.
//!
//! ```text
//! local input check -> entry (override | registry) -> validate
//!   -> [remote: plan against the URL, then download]
//!   -> Invocation::resolve -> Provisioner::provision -> Engine::execute
//! ```
//!
//! Everything up to and including planning is free of side effects, so an
//! unsupported input type or a bad usage recipe fails before any environment
//! is created or any process is spawned.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use extractors_core::{config, RegistryClient, RegistryEntry, Settings, UsageMethod};

use crate::engine::{Engine, EngineConfig, Outcome};
use crate::environment::Provisioner;
use crate::error::{io_err, ExtractError};
use crate::plan::{ExecutionPlan, Invocation, PlanRequest};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Parameters of one extraction. Defaults: `python` preferred, install and
/// isolate enabled, registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub input: String,
    pub input_type: String,
    pub output_path: Option<PathBuf>,
    pub output_type: Option<String>,
    pub preferred: UsageMethod,
    pub install: bool,
    pub isolate: bool,
    pub entry: Option<RegistryEntry>,
}

impl ExtractRequest {
    /// `input` is a local path or an `http(s)://` URL.
    pub fn new(input: impl Into<String>, input_type: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            input_type: input_type.into(),
            output_path: None,
            output_type: None,
            preferred: UsageMethod::Python,
            install: true,
            isolate: true,
            entry: None,
        }
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn output_type(mut self, output_type: impl Into<String>) -> Self {
        self.output_type = Some(output_type.into());
        self
    }

    pub fn preferred_mode(mut self, method: UsageMethod) -> Self {
        self.preferred = method;
        self
    }

    pub fn install(mut self, install: bool) -> Self {
        self.install = install;
        self
    }

    pub fn isolate(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    /// Use `entry` instead of asking the registry.
    pub fn entry(mut self, entry: RegistryEntry) -> Self {
        self.entry = Some(entry);
        self
    }

    fn plan_request(&self, input_path: &Path) -> PlanRequest {
        PlanRequest {
            input_type: self.input_type.clone(),
            input_path: input_path.to_path_buf(),
            output_path: self.output_path.clone(),
            output_type: self.output_type.clone(),
            preferred: self.preferred.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A local input file. Remote inputs are downloaded into a temp file that is
/// removed when this value is dropped.
#[derive(Debug)]
pub struct InputSource {
    path: PathBuf,
    _download: Option<NamedTempFile>,
}

impl InputSource {
    pub fn acquire(input: &str) -> Result<Self, ExtractError> {
        if is_remote(input) {
            return download(input);
        }
        let path = PathBuf::from(input);
        if !path.exists() {
            return Err(ExtractError::InputMissing { path });
        }
        Ok(Self {
            path,
            _download: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_remote(&self) -> bool {
        self._download.is_some()
    }
}

fn is_remote(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn download(url: &str) -> Result<InputSource, ExtractError> {
    let download_err = |reason: String| ExtractError::Download {
        url: url.to_string(),
        reason,
    };

    // Keep the remote file's extension; some extractors dispatch on it.
    let name = url
        .split(|c: char| c == '?' || c == '#')
        .next()
        .and_then(|u| u.rsplit('/').next())
        .unwrap_or_default();
    let suffix = Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let mut file = tempfile::Builder::new()
        .prefix("extractors_input_")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| io_err(std::env::temp_dir(), e))?;

    tracing::info!(%url, path = %file.path().display(), "downloading input");
    let response = ureq::get(url).call().map_err(|e| download_err(e.to_string()))?;
    let mut reader = response.into_reader();
    std::io::copy(&mut reader, &mut file).map_err(|e| download_err(e.to_string()))?;
    file.flush().map_err(|e| io_err(file.path(), e))?;

    Ok(InputSource {
        path: file.path().to_path_buf(),
        _download: Some(file),
    })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The collaborators one or more extractions share.
#[derive(Debug, Clone)]
pub struct ExtractSession {
    registry: RegistryClient,
    provisioner: Provisioner,
    engine: Engine,
}

impl ExtractSession {
    pub fn new(registry: RegistryClient, provisioner: Provisioner, engine: Engine) -> Self {
        Self {
            registry,
            provisioner,
            engine,
        }
    }

    pub fn from_settings(settings: &Settings, home: &Path) -> Self {
        Self::new(
            RegistryClient::new(settings.registry_url.clone()),
            Provisioner::from_settings(settings, home),
            Engine::with_config(EngineConfig::from_settings(settings)),
        )
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The registry entry for `request`: its override, else a registry lookup.
    pub fn entry_for(&self, request: &ExtractRequest) -> Result<RegistryEntry, ExtractError> {
        let entry = match &request.entry {
            Some(entry) => entry.clone(),
            None => self.registry.resolve(&request.input_type)?,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Resolve everything short of provisioning. Used for dry runs.
    pub fn plan(&self, request: &ExtractRequest, input_path: &Path) -> Result<Invocation, ExtractError> {
        let entry = self.entry_for(request)?;
        Invocation::resolve(&entry, &request.plan_request(input_path))
    }

    pub fn extract(&self, request: &ExtractRequest) -> Result<Outcome, ExtractError> {
        let local = if is_remote(&request.input) {
            None
        } else {
            Some(InputSource::acquire(&request.input)?)
        };
        let entry = self.entry_for(request)?;
        let input = match local {
            Some(input) => input,
            None => {
                // Plan against the URL so an unusable request fails before the download.
                Invocation::resolve(&entry, &request.plan_request(Path::new(&request.input)))?;
                InputSource::acquire(&request.input)?
            }
        };
        let invocation = Invocation::resolve(&entry, &request.plan_request(input.path()))?;

        let runtime = self
            .provisioner
            .provision(&entry, request.isolate, request.install)?;
        let plan = ExecutionPlan { invocation, runtime };
        tracing::debug!(?plan, "execution plan");

        self.engine.execute(&plan.invocation, &plan.runtime)
    }
}

/// One-shot extraction with settings from `~/.extractors/config.yaml` and
/// `EXTRACTORS_*` environment variables.
pub fn extract(request: &ExtractRequest) -> Result<Outcome, ExtractError> {
    let settings = config::load()?;
    let home = config::home()?;
    ExtractSession::from_settings(&settings, &home).extract(request)
}
