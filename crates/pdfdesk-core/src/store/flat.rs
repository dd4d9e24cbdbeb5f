//! Line-oriented reader for documents the TOML parser rejects.
//!
//! Understands `[section]` headers, `key = value` lines, `#` comments,
//! booleans, double-quoted strings, integers and floats. Anything else on the
//! right-hand side is kept as a literal string. Lines outside a section are
//! dropped. Produces the same value tree as the structured parser so the
//! typed mapping has a single code path.

use toml::{Table, Value};
use tracing::debug;

pub fn parse(text: &str) -> Table {
    let mut root = Table::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            if !root.contains_key(&name) {
                root.insert(name.clone(), Value::Table(Table::new()));
            }
            current = Some(name);
            continue;
        }

        let Some(section) = current.as_deref() else {
            debug!("Skipping line outside any section: {}", line);
            continue;
        };

        let Some((key, value)) = line.split_once('=') else {
            debug!("Skipping line without '=': {}", line);
            continue;
        };

        if let Some(Value::Table(table)) = root.get_mut(section) {
            table.insert(key.trim().to_string(), parse_value(value.trim()));
        }
    }

    root
}

fn parse_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Value::String(unescape(&raw[1..raw.len() - 1]));
    }
    if is_integer(raw)
        && let Ok(n) = raw.parse::<i64>()
    {
        return Value::Integer(n);
    }
    if is_float(raw)
        && let Ok(f) = raw.parse::<f64>()
    {
        return Value::Float(f);
    }
    Value::String(raw.to_string())
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_float(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    digits.contains('.')
        && digits.bytes().any(|b| b.is_ascii_digit())
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Undo the escapes the writer produces (`\\`, `\"`, `\n`, `\t`).
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
