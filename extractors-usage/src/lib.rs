//! # extractors-usage
//!
//! Turns a registry usage recipe into something executable:
//!
//! - [`template`] — `{{ field }}` substitution with method-sensitive quoting
//! - [`call`] — the `module.func(arg, key=value)` call-expression parser
//! - [`recipe`] — preferred-method recipe selection
//!
//! ```rust
//! use extractors_core::UsageMethod;
//! use extractors_usage::{parse_call, resolve_template, TemplateFields};
//!
//! let fields = TemplateFields::new("biologic-mpr", std::path::Path::new("a.mpr"));
//! let command = resolve_template("galvani.read({{ input_path }})", &UsageMethod::Python, &fields, None);
//! let call = parse_call(&command).unwrap();
//! assert_eq!(call.path, vec!["galvani", "read"]);
//! assert_eq!(call.args, vec!["a.mpr"]);
//! ```

pub mod call;
pub mod error;
pub mod recipe;
pub mod template;

pub use call::{parse_call, parse_setup, CallExpr};
pub use error::UsageError;
pub use recipe::select_usage;
pub use template::{python_literal, resolve_template, unresolved_fields, TemplateFields, TEMPLATE_FIELDS};
