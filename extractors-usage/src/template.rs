//! Placeholder substitution for usage recipe commands.
//!
//! Markers are written `{{ field }}`; whitespace inside the braces is
//! optional. Recognised fields: `input_type`, `input_path`, `output_type`,
//! `output_path`. Anything else between double braces is left alone, and so
//! is a recognised marker whose value is missing; a visible leftover marker
//! means the caller did not supply a required argument.
//!
//! | Method   | `{{ input_path }}` with `data/a.mpr` |
//! |----------|---------------------------------------|
//! | `cli`    | `data/a.mpr`                          |
//! | `python` | `'data/a.mpr'`                        |

use std::collections::BTreeMap;
use std::path::Path;

use extractors_core::UsageMethod;

/// Field names recognised inside `{{ }}` markers.
pub const TEMPLATE_FIELDS: [&str; 4] = ["input_type", "input_path", "output_type", "output_path"];

/// Values available for substitution. `None` leaves the marker untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFields {
    pub input_type: Option<String>,
    pub input_path: Option<String>,
    pub output_type: Option<String>,
    pub output_path: Option<String>,
}

impl TemplateFields {
    pub fn new(input_type: impl Into<String>, input_path: &Path) -> Self {
        Self {
            input_type: Some(input_type.into()),
            input_path: Some(input_path.display().to_string()),
            ..Self::default()
        }
    }

    pub fn output_type(mut self, output_type: Option<String>) -> Self {
        self.output_type = output_type;
        self
    }

    pub fn output_path(mut self, output_path: Option<&Path>) -> Self {
        self.output_path = output_path.map(|p| p.display().to_string());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            "input_type" => self.input_type.as_deref(),
            "input_path" => self.input_path.as_deref(),
            "output_type" => self.output_type.as_deref(),
            "output_path" => self.output_path.as_deref(),
            _ => None,
        }
    }
}

/// Substitute every recognised marker in `template`.
///
/// A non-empty entry in `overrides` (the file type's template mapping) wins
/// over the supplied field value.
pub fn resolve_template(
    template: &str,
    method: &UsageMethod,
    fields: &TemplateFields,
    overrides: Option<&BTreeMap<String, String>>,
) -> String {
    let lookup = |field: &str| -> Option<String> {
        overrides
            .and_then(|o| o.get(field))
            .filter(|v| !v.is_empty())
            .map(String::as_str)
            .or_else(|| fields.get(field))
            .map(|value| match method {
                UsageMethod::Python => python_literal(value),
                _ => value.to_string(),
            })
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let marker = &rest[start..start + 2 + end + 2];
        let name = after[..end].trim();
        match TEMPLATE_FIELDS.contains(&name).then(|| lookup(name)).flatten() {
            Some(value) => out.push_str(&value),
            None => out.push_str(marker),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

/// Recognised markers still present in `text`, in order of appearance.
pub fn unresolved_fields(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let name = after[..end].trim();
        if TEMPLATE_FIELDS.contains(&name) {
            found.push(name.to_string());
        }
        rest = &after[end + 2..];
    }
    found
}

/// Render `value` as a single-quoted literal that [`crate::parse_call`] reads
/// back verbatim.
pub fn python_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
