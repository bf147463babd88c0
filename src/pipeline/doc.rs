//! Document helpers: dotted-path access and value identity for joins and groups.

use serde_json::{Map, Number, Value};

/// Resolve a dotted path (`orderDetails.salesTerritoryID`) inside a document.
///
/// Returns `None` when any segment is missing or a non-object is traversed.
pub fn resolve_field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set a dotted path, creating intermediate objects as needed.
///
/// A non-object found on the way is replaced by an object.
pub fn set_field(doc: &mut Value, path: &str, value: Value) {
    let mut parts = path.split('.');
    let Some(mut part) = parts.next() else {
        return;
    };
    let mut current = doc;
    for next in parts {
        current = object_entry(current, part);
        part = next;
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(part.to_string(), value);
    }
}

fn object_entry<'a>(value: &'a mut Value, key: &str) -> &'a mut Value {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new())),
        other => other,
    }
}

/// Remove a dotted path if present.
pub fn remove_field(doc: &mut Value, path: &str) {
    match path.rsplit_once('.') {
        Some((parent, last)) => {
            if let Some(Value::Object(map)) = resolve_field_mut(doc, parent) {
                map.remove(last);
            }
        }
        None => {
            if let Value::Object(map) = doc {
                map.remove(path);
            }
        }
    }
}

fn resolve_field_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = current.as_object_mut()?.get_mut(part)?;
    }
    Some(current)
}

/// Identity of a value for equality matching in joins and group keys.
///
/// Null and missing are the same key. Numbers compare by numeric value, so
/// `1` and `1.0` share a key, while `"1"` and `1` do not. Integers keep
/// their exact 64-bit value.
pub fn match_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => format!("b:{b}"),
        Some(Value::Number(n)) => number_key(n),
        Some(Value::String(s)) => format!("s:{s}"),
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items.iter().map(|v| match_key(Some(v))).collect();
            format!("a:[{}]", parts.join(","))
        }
        Some(Value::Object(map)) => {
            let mut parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}={}", match_key(Some(v))))
                .collect();
            parts.sort();
            format!("o:{{{}}}", parts.join(","))
        }
    }
}

fn number_key(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return format!("n:{i}");
    }
    if let Some(u) = n.as_u64() {
        return format!("n:{u}");
    }
    match n.as_f64() {
        // Integral floats share the integer key.
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            format!("n:{}", f as i64)
        }
        Some(f) if f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 => {
            format!("n:{}", f as u64)
        }
        Some(f) => format!("n:{f:?}"),
        None => format!("n:{n}"),
    }
}

/// Wrap an `f64` as a JSON number. Non-finite values become null.
pub fn number_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
