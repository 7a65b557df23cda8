//! Parser for the call-expression language used by `python` usage recipes.
//!
//! # Grammar
//!
//! ```text
//! call     := path ws* '(' args? ')' ws*
//! path     := ident ('.' ident)*
//! args     := segment (',' segment)* ','?
//! segment  := keyword | value
//! keyword  := value '=' value        -- split on the first unquoted '='
//! value    := quoted | bare          -- quoted: '...' or "..." with \-escapes
//! ```
//!
//! Commas and parentheses inside quotes or inside nested `()`, `[]`, `{}` do
//! not split or close the argument list. Every value comes out as a string:
//! surrounding matching quotes are removed, then whitespace is trimmed.
//!
//! Only an `=` outside quotes and outside nested brackets makes a segment a
//! keyword argument, so `f(dict(a=1))` has one positional argument. The key
//! must be an identifier. A keyword value may not contain `{` or `}` and may
//! not contain a second unquoted `=`, even nested; both are rejected rather
//! than silently mis-parsed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::UsageError;

/// A parsed `a.b.c(arg, key=value)` expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallExpr {
    /// Dotted symbol path, e.g. `["galvani", "read"]`.
    pub path: Vec<String>,
    /// Positional arguments in call order.
    pub args: Vec<String>,
    /// Keyword arguments. A repeated key keeps the last value.
    pub kwargs: BTreeMap<String, String>,
}

impl CallExpr {
    /// The dotted path joined back together.
    pub fn symbol(&self) -> String {
        self.path.join(".")
    }
}

/// Parse a call expression into symbol path, positional and keyword arguments.
pub fn parse_call(command: &str) -> Result<CallExpr, UsageError> {
    let parse_err = |reason: &str| UsageError::Parse {
        command: command.to_string(),
        reason: reason.to_string(),
    };

    let open = command.find('(').ok_or_else(|| parse_err("missing '('"))?;
    let path = parse_path(&command[..open]).map_err(|reason| parse_err(&reason))?;

    let body_start = open + 1;
    let split = split_arguments(&command[body_start..]).map_err(|reason| parse_err(&reason))?;

    let trailing = &command[body_start + split.close + 1..];
    if !trailing.trim().is_empty() {
        return Err(parse_err(&format!(
            "unexpected text after closing ')': '{}'",
            trailing.trim()
        )));
    }

    let mut call = CallExpr {
        path,
        ..CallExpr::default()
    };

    let count = split.segments.len();
    for (index, raw) in split.segments.iter().enumerate() {
        if raw.trim().is_empty() {
            // `f()` and a single trailing comma are fine; `f(a,,b)` is not.
            let only = count == 1;
            let trailing_comma = index + 1 == count && index > 0;
            if only || trailing_comma {
                continue;
            }
            return Err(UsageError::Argument {
                command: command.to_string(),
                segment: raw.clone(),
                reason: "empty argument".to_string(),
            });
        }
        match classify(raw) {
            Ok(Segment::Positional(value)) => call.args.push(value),
            Ok(Segment::Keyword(key, value)) => {
                call.kwargs.insert(key, value);
            }
            Err(reason) => {
                return Err(UsageError::Argument {
                    command: command.to_string(),
                    segment: raw.trim().to_string(),
                    reason,
                })
            }
        }
    }

    Ok(call)
}

/// Validate a `setup` value: a bare, dotted module path and nothing else.
pub fn parse_setup(setup: &str) -> Result<&str, UsageError> {
    let trimmed = setup.trim();
    let valid = !trimmed.is_empty() && trimmed.split('.').all(is_identifier);
    if valid {
        Ok(trimmed)
    } else {
        Err(UsageError::Setup {
            setup: setup.to_string(),
        })
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

fn parse_path(head: &str) -> Result<Vec<String>, String> {
    let head = head.trim();
    if head.is_empty() {
        return Err("missing symbol before '('".to_string());
    }
    head.split('.')
        .map(|segment| {
            let segment = segment.trim();
            if is_identifier(segment) {
                Ok(segment.to_string())
            } else {
                Err(format!("invalid symbol segment '{segment}' in '{head}'"))
            }
        })
        .collect()
}

#[derive(Debug)]
struct SplitArgs {
    segments: Vec<String>,
    /// Byte offset of the closing ')' relative to the argument body.
    close: usize,
}

/// Split the text after the opening '(' into raw argument segments, stopping
/// at the parenthesis that closes the call.
fn split_arguments(body: &str) -> Result<SplitArgs, String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut nesting: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in body.char_indices() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                nesting.push(c);
                current.push(c);
            }
            ')' | ']' | '}' => match nesting.pop() {
                Some(open) if closes(open, c) => current.push(c),
                Some(open) => return Err(format!("'{open}' closed by '{c}'")),
                None if c == ')' => {
                    segments.push(current);
                    return Ok(SplitArgs {
                        segments,
                        close: offset,
                    });
                }
                None => return Err(format!("unbalanced '{c}'")),
            },
            ',' if nesting.is_empty() => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if quote.is_some() {
        Err("unterminated string literal".to_string())
    } else {
        Err("missing closing ')'".to_string())
    }
}

fn closes(open: char, close: char) -> bool {
    matches!((open, close), ('(', ')') | ('[', ']') | ('{', '}'))
}

enum Segment {
    Positional(String),
    Keyword(String, String),
}

fn classify(raw: &str) -> Result<Segment, String> {
    let equals = unquoted_positions(raw, '=');
    let Some(&(first, _)) = equals.iter().find(|(_, depth)| *depth == 0) else {
        return Ok(Segment::Positional(dequote(raw)));
    };

    if equals.len() > 1 {
        return Err("ambiguous '=' in keyword argument".to_string());
    }
    let (key_raw, value_raw) = (&raw[..first], &raw[first + 1..]);
    if value_raw.contains('{') || value_raw.contains('}') {
        return Err("keyword values must not contain '{' or '}'".to_string());
    }
    let key = dequote(key_raw);
    if key.is_empty() {
        return Err("missing keyword name before '='".to_string());
    }
    if !is_identifier(&key) {
        return Err(format!("keyword name '{key}' is not an identifier"));
    }
    Ok(Segment::Keyword(key, dequote(value_raw)))
}

/// Byte offsets of `needle` outside quoted strings, each with the bracket
/// nesting depth it was found at.
fn unquoted_positions(s: &str, needle: char) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;
    for (offset, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == needle => found.push((offset, depth)),
            None if matches!(c, '(' | '[' | '{') => depth += 1,
            None if matches!(c, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            None => {}
        }
    }
    found
}

/// Strip one pair of matching surrounding quotes (resolving escapes inside),
/// then trim whitespace.
pub(crate) fn dequote(raw: &str) -> String {
    let s = raw.trim();
    for q in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return unescape(&s[1..s.len() - 1]).trim().to_string();
        }
    }
    s.to_string()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            // Unknown escapes stay literal, e.g. `C:\data`.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
