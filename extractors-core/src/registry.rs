//! Registry collaborator: HTTP lookups and local entry documents.
//!
//! # Endpoints
//!
//! ```text
//! GET {base}/filetypes/{input_type}   -> { registered_extractors: [id, ...] }
//! GET {base}/extractors/{id}          -> RegistryEntry
//! ```
//!
//! Ids are percent-encoded as single path segments. The live registry wraps
//! every payload as `{ "data": ... }`; both the wrapped and the bare shape
//! are accepted.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{io_err, RegistryError};
use crate::types::RegistryEntry;

/// Default public registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://marda-registry.fly.dev/api/v0.3.0";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FiletypeDoc {
    #[serde(default)]
    registered_extractors: Vec<String>,
}

// ---------------------------------------------------------------------------
// RegistryClient
// ---------------------------------------------------------------------------

/// Blocking client for the extractor registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    agent: ureq::Agent,
}

impl RegistryClient {
    /// Create a client for `base_url` (a trailing `/` is ignored).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();
        Self { base_url, agent }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ids of every extractor registered for `input_type`, in registry order.
    pub fn extractors_for(&self, input_type: &str) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/filetypes/{}", self.base_url, urlencoding::encode(input_type));
        let doc: FiletypeDoc = self.get_json(&url)?;
        Ok(doc.registered_extractors)
    }

    /// Fetch the full entry for `extractor_id`.
    pub fn entry(&self, extractor_id: &str) -> Result<RegistryEntry, RegistryError> {
        let url = format!("{}/extractors/{}", self.base_url, urlencoding::encode(extractor_id));
        self.get_json(&url)
    }

    /// Resolve `input_type` to the entry of its first registered extractor.
    pub fn resolve(&self, input_type: &str) -> Result<RegistryEntry, RegistryError> {
        let extractors = self.extractors_for(input_type)?;
        let Some(first) = extractors.first() else {
            return Err(RegistryError::NoExtractorFound {
                input_type: input_type.to_string(),
            });
        };
        if extractors.len() > 1 {
            tracing::warn!(
                input_type,
                candidates = ?extractors,
                "multiple extractors registered, using the first ({first})"
            );
        }
        self.entry(first)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RegistryError> {
        tracing::debug!(url, "registry request");
        let response = self.agent.get(url).call().map_err(|err| lookup_err(url, err))?;
        let body = response.into_string().map_err(|e| RegistryError::Lookup {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;
        serde_json::from_str::<Envelope<T>>(&body)
            .map(Envelope::into_inner)
            .map_err(|e| RegistryError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

fn lookup_err(url: &str, err: ureq::Error) -> RegistryError {
    let reason = match err {
        ureq::Error::Status(code, response) => {
            let text = response.status_text().to_string();
            format!("HTTP {code} {text}")
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    };
    RegistryError::Lookup {
        url: url.to_string(),
        reason,
    }
}

// ---------------------------------------------------------------------------
// Local entry documents
// ---------------------------------------------------------------------------

/// Load a registry entry from a YAML or JSON file.
///
/// Returns `RegistryError::Parse` (with path + line context) if malformed and
/// `RegistryError::InvalidEntry` if the document breaks an entry invariant.
pub fn load_entry(path: &Path) -> Result<RegistryEntry, RegistryError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let parse_err = |source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let mut doc: serde_yaml::Value = serde_yaml::from_str(&contents).map_err(parse_err)?;
    // Saved API responses keep their `data` wrapper.
    if doc.get("id").is_none() {
        if let Some(inner) = doc.get("data").cloned() {
            doc = inner;
        }
    }
    let entry: RegistryEntry = serde_yaml::from_value(doc).map_err(parse_err)?;
    entry.validate()?;
    Ok(entry)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
