//! `extractors lookup <type>` — what the registry offers for a file type.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use extractors_core::{RegistryClient, RegistryEntry};

use super::load_settings;

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// File type id in the registry.
    pub input_type: String,

    /// Registry base URL.
    #[arg(long, value_name = "URL")]
    pub registry: Option<String>,

    /// Emit the full entries as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "extractor")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "usage")]
    usage: String,
    #[tabled(rename = "install")]
    install: String,
}

impl LookupArgs {
    pub fn run(self) -> Result<()> {
        let (_, settings) = load_settings()?;
        let client = RegistryClient::new(self.registry.unwrap_or(settings.registry_url));

        let ids = client
            .extractors_for(&self.input_type)
            .with_context(|| format!("lookup of file type '{}' failed", self.input_type))?;
        let entries = ids
            .iter()
            .map(|id| client.entry(id))
            .collect::<Result<Vec<RegistryEntry>, _>>()
            .context("failed to fetch registry entry")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("failed to serialize entries")?
            );
            return Ok(());
        }

        if entries.is_empty() {
            println!("No extractors registered for '{}'.", self.input_type);
            return Ok(());
        }

        println!("{} {}", "File type:".bold(), self.input_type);
        let rows: Vec<EntryRow> = entries
            .into_iter()
            .map(|entry| EntryRow {
                id: entry.id.0.clone(),
                name: entry.name.clone().unwrap_or_default(),
                usage: join(entry.usage.iter().map(|u| u.method.as_str())),
                install: join(entry.installation.iter().map(|i| i.method.as_str())),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let items: Vec<&str> = items.collect();
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
