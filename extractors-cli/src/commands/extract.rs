//! `extractors extract` — run one extraction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use extractors_core::{load_entry, UsageMethod};
use extractors_runtime::{Action, ExtractRequest, ExtractSession, Invocation, Outcome};

use super::load_settings;

/// Arguments for `extractors extract`.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Local path or http(s) URL of the file to extract.
    pub input: String,

    /// File type id in the registry (e.g. "biologic-mpr").
    #[arg(long = "type", short = 't', value_name = "ID")]
    pub input_type: String,

    /// Where a CLI extractor should write. Defaults to the input with a .json extension.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Requested output type, passed to the extractor's template.
    #[arg(long, value_name = "TYPE")]
    pub output_type: Option<String>,

    /// Preferred execution method: python | cli.
    #[arg(long, default_value = "python", value_name = "METHOD")]
    pub mode: UsageMethod,

    /// Do not run the extractor's installation recipes.
    #[arg(long)]
    pub no_install: bool,

    /// Run in the current interpreter instead of a per-extractor environment.
    #[arg(long)]
    pub no_isolate: bool,

    /// Use a local YAML/JSON registry entry instead of querying the registry.
    #[arg(long, value_name = "FILE")]
    pub entry: Option<PathBuf>,

    /// Registry base URL.
    #[arg(long, value_name = "URL")]
    pub registry: Option<String>,

    /// Kill the extractor after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the resolved plan without installing or executing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl ExtractArgs {
    pub fn run(self) -> Result<()> {
        let (home, mut settings) = load_settings()?;
        if let Some(url) = self.registry.clone() {
            settings.registry_url = url;
        }
        if let Some(secs) = self.timeout {
            settings.timeout_secs = Some(secs);
        }
        let session = ExtractSession::from_settings(&settings, &home);
        let request = self.request()?;
        tracing::debug!(?request, registry = %settings.registry_url, "extract request");

        if self.dry_run {
            return dry_run(&session, &request);
        }

        let outcome = session.extract(&request).map_err(|e| {
            let stage = e.stage();
            anyhow::Error::new(e).context(format!("extraction failed during {stage}"))
        })?;
        match outcome {
            Outcome::Value(value) => println!(
                "{}",
                serde_json::to_string_pretty(&value).context("failed to serialize result")?
            ),
            Outcome::Artifact(path) => println!("{} {}", "wrote".green(), path.display()),
        }
        Ok(())
    }

    fn request(&self) -> Result<ExtractRequest> {
        let mut request = ExtractRequest::new(self.input.clone(), self.input_type.clone())
            .preferred_mode(self.mode.clone())
            .install(!self.no_install)
            .isolate(!self.no_isolate);
        if let Some(path) = &self.output {
            request = request.output_path(path);
        }
        if let Some(output_type) = &self.output_type {
            request = request.output_type(output_type.clone());
        }
        if let Some(path) = &self.entry {
            let entry = load_entry(path)
                .with_context(|| format!("failed to load registry entry {}", path.display()))?;
            request = request.entry(entry);
        }
        Ok(request)
    }
}

fn dry_run(session: &ExtractSession, request: &ExtractRequest) -> Result<()> {
    let invocation = session
        .plan(request, Path::new(&request.input))
        .context("planning failed")?;
    print_plan(session, request, &invocation);
    Ok(())
}

fn print_plan(session: &ExtractSession, request: &ExtractRequest, invocation: &Invocation) {
    let prefix = "[dry-run]".yellow();
    println!("{prefix} extractor: {}", invocation.entry_id);
    println!("{prefix} method:    {}", invocation.method());
    match &invocation.action {
        Action::Cli { command } => println!("{prefix} command:   {command}"),
        Action::Python { module, call } => {
            println!("{prefix} module:    {module}");
            println!("{prefix} call:      {}", call.symbol());
            println!("{prefix} args:      {:?}", call.args);
            println!("{prefix} kwargs:    {:?}", call.kwargs);
        }
    }
    println!("{prefix} output:    {}", invocation.output_path.display());

    let provisioner = session.provisioner();
    if request.isolate {
        let dir = provisioner.env_dir(&invocation.entry_id);
        let state = if dir.exists() { "reuse" } else { "create" };
        println!("{prefix} runtime:   isolated, would {state} {}", dir.display());
    } else {
        println!("{prefix} runtime:   ambient ({})", provisioner.python().display());
    }
    if request.install {
        println!("{prefix} install:   would run installation recipes");
    }
}
