//! Extractors core library — registry entry types, registry lookups, settings.
//!
//! - [`types`] — [`RegistryEntry`] and its recipes
//! - [`error`] — [`RegistryError`]
//! - [`registry`] — HTTP registry client and local entry files
//! - [`config`] — `~/.extractors/config.yaml`

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::Settings;
pub use error::RegistryError;
pub use registry::{load_entry, RegistryClient, DEFAULT_REGISTRY_URL};
pub use types::{
    ExtractorId, InstallMethod, InstallRecipe, RegistryEntry, SupportedFiletype, UsageMethod,
    UsageRecipe,
};
