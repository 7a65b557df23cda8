//! `extractors env list|path|remove` — isolated environment housekeeping.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use extractors_runtime::Provisioner;

use super::load_settings;

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// List isolated environments.
    List {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the environment directory for an extractor id.
    Path { id: String },

    /// Delete the environment for an extractor id.
    Remove { id: String },
}

#[derive(Tabled)]
struct EnvRow {
    #[tabled(rename = "extractor")]
    entry: String,
    #[tabled(rename = "created")]
    created: String,
    #[tabled(rename = "installed")]
    installed: String,
    #[tabled(rename = "path")]
    path: String,
}

pub fn run(cmd: EnvCommand) -> Result<()> {
    let (home, settings) = load_settings()?;
    let provisioner = Provisioner::from_settings(&settings, &home);
    match cmd {
        EnvCommand::List { json } => list(&provisioner, json),
        EnvCommand::Path { id } => {
            println!("{}", provisioner.env_dir(&id).display());
            Ok(())
        }
        EnvCommand::Remove { id } => {
            let removed = provisioner
                .remove_environment(&id)
                .with_context(|| format!("failed to remove environment for '{id}'"))?;
            if removed {
                println!("{} environment for '{id}'", "removed".green());
            } else {
                println!("No environment for '{id}'.");
            }
            Ok(())
        }
    }
}

fn list(provisioner: &Provisioner, json: bool) -> Result<()> {
    let envs = provisioner
        .list_environments()
        .context("failed to list environments")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&envs).context("failed to serialize environments")?
        );
        return Ok(());
    }

    if envs.is_empty() {
        println!(
            "No isolated environments under {}.",
            provisioner.env_root().display()
        );
        return Ok(());
    }

    let rows: Vec<EnvRow> = envs
        .into_iter()
        .map(|env| match env.marker {
            Some(marker) => EnvRow {
                entry: marker.entry_id,
                created: format_age(marker.created_at),
                installed: if marker.installed.is_empty() {
                    "-".to_string()
                } else {
                    marker.installed.join(", ")
                },
                path: env.path.display().to_string(),
            },
            None => EnvRow {
                entry: env.name,
                created: "incomplete".red().to_string(),
                installed: "-".to_string(),
                path: env.path.display().to_string(),
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn format_age(at: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(at);
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}
