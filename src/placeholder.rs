//! `{placeholder}` substitution for template patterns
//!
//! Supported forms:
//! - `{key}` - replaced by the value bound to `key`
//! - `{key:0N}` / `{key:N}` - right-aligned to width `N`, padded with
//!   zeros or spaces (a trailing `d` is accepted, e.g. `{epoch:03d}`)
//! - `{{` / `}}` - literal braces
//!
//! Strings without any `{` are returned unchanged. Otherwise every brace
//! must belong to one of the forms above; `{bad key}`, `{0}` or a lone `}`
//! is a [`PlaceholderError::Malformed`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)(?::(0?)(\d+)d?)?\}").unwrap()
});

/// Substitution failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    /// A placeholder referenced a key with no bound value
    UnknownKey { key: String },
    /// A brace that is not part of a placeholder or an escape
    Malformed { fragment: String },
}

/// Substitute every placeholder in `pattern` from `values`
pub fn substitute(pattern: &str, values: &HashMap<String, String>) -> Result<String, PlaceholderError> {
    if !pattern.contains('{') {
        return Ok(pattern.to_string());
    }

    let mut out = String::with_capacity(pattern.len());
    let mut last_end = 0;

    for caps in PLACEHOLDER_RE.captures_iter(pattern) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(literal(&pattern[last_end..whole.start()])?);
        last_end = whole.end();

        match whole.as_str() {
            "{{" => out.push('{'),
            "}}" => out.push('}'),
            _ => out.push_str(&render_placeholder(&caps, values)?),
        }
    }
    out.push_str(literal(&pattern[last_end..])?);

    Ok(out)
}

/// Text between placeholders must not contain braces
fn literal(text: &str) -> Result<&str, PlaceholderError> {
    match text.find(['{', '}']) {
        None => Ok(text),
        Some(start) => {
            let rest = &text[start..];
            let end = rest[1..].find('}').map_or(rest.len(), |i| i + 2);
            Err(PlaceholderError::Malformed {
                fragment: rest[..end].to_string(),
            })
        }
    }
}

/// Escape `literal` so `substitute` reproduces it unchanged
pub fn escape(literal: &str) -> String {
    if literal.contains('{') {
        literal.replace('{', "{{").replace('}', "}}")
    } else {
        literal.to_string()
    }
}

/// Keys referenced by `pattern`, in order of first appearance
pub fn placeholder_keys(pattern: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(pattern) {
        if let Some(key) = caps.get(1) {
            if !keys.iter().any(|k| k == key.as_str()) {
                keys.push(key.as_str().to_string());
            }
        }
    }
    keys
}

fn render_placeholder(
    caps: &Captures<'_>,
    values: &HashMap<String, String>,
) -> Result<String, PlaceholderError> {
    let key = caps.get(1).map_or("", |m| m.as_str());
    let value = values.get(key).ok_or_else(|| PlaceholderError::UnknownKey {
        key: key.to_string(),
    })?;

    let width = caps
        .get(3)
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .unwrap_or(0);
    let fill = if caps.get(2).is_some_and(|m| !m.as_str().is_empty()) {
        '0'
    } else {
        ' '
    };

    let len = value.chars().count();
    if len >= width {
        return Ok(value.clone());
    }

    let mut padded = String::with_capacity(width);
    // sign stays in front of zero padding
    let digits = match value.strip_prefix('-') {
        Some(rest) if fill == '0' => {
            padded.push('-');
            rest
        }
        _ => value.as_str(),
    };
    padded.extend(std::iter::repeat(fill).take(width - len));
    padded.push_str(digits);
    Ok(padded)
}
