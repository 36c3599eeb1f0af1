//! Dotted-path lookup over nested JSON objects.
//!
//! `get(&traits, "address.city")` resolves `{"address": {"city": ..}}`, but
//! also a literal `{"address.city": ..}` key and loosely-cased variants such
//! as `{"Address": {"City": ..}}`. At each level the longest matching key
//! wins; a missing segment yields `None` rather than an error.

use serde_json::{Map, Value};

/// Resolve `path` against `value`. JSON `null` at the leaf counts as absent,
/// and so does an empty path.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    descend(value, path).filter(|found| !found.is_null())
}

/// Resolve `path` and read the result as a string. Numbers and booleans are
/// rendered; empty strings are treated as absent.
pub fn get_string(value: &Value, path: &str) -> Option<String> {
    match get(value, path)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolve `path` and read the result as a number. Numeric strings are
/// accepted, including currency-formatted ones like `"$1,024.50"`.
pub fn get_number(value: &Value, path: &str) -> Option<f64> {
    match get(value, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn descend<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let object = value.as_object()?;

    let mut end = path.len();
    loop {
        let key = &path[..end];
        if let Some(child) = lookup(object, key) {
            let rest = if end == path.len() { "" } else { &path[end + 1..] };
            if let Some(found) = descend(child, rest) {
                return Some(found);
            }
        }
        end = key.rfind('.')?;
    }
}

fn lookup<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(found) = object.get(key) {
        return Some(found);
    }
    let wanted = normalize(key);
    object
        .iter()
        .find(|(candidate, _)| normalize(candidate) == wanted)
        .map(|(_, found)| found)
}

fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
