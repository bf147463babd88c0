//! JSON directory source.
//!
//! Each collection lives in `<dir>/<name>.json`, `<dir>/<name>.jsonl` or
//! `<dir>/<name>.ndjson`. A file holds either one JSON array of documents or
//! one document per line (the layout `mongoexport` writes by default).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::info;

use super::{Dataset, LoadError};
use crate::pipeline::doc::number_value;
use crate::pipeline::eval::to_date;

const EXTENSIONS: &[&str] = &["json", "jsonl", "ndjson"];

/// Load the named collections from `dir`.
pub fn load_dir(dir: &Path, collections: &[&str]) -> Result<Dataset, LoadError> {
    let mut dataset = Dataset::new();
    for name in collections {
        let path = find_collection_file(dir, name).ok_or_else(|| LoadError::MissingCollection {
            collection: name.to_string(),
            dir: dir.to_path_buf(),
        })?;
        let content = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let documents = parse_documents(&path, &content)?;
        info!(
            collection = *name,
            documents = documents.len(),
            path = %path.display(),
            "loaded collection"
        );
        dataset.insert(*name, documents);
    }
    Ok(dataset)
}

fn find_collection_file(dir: &Path, name: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
}

/// Parse a JSON array or newline-delimited documents.
pub fn parse_documents(path: &Path, content: &str) -> Result<Vec<Value>, LoadError> {
    if content.trim_start().starts_with('[') {
        let value: Value = serde_json::from_str(content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })?;
        let Value::Array(items) = value else {
            return Err(LoadError::NotADocument {
                path: path.to_path_buf(),
                line: 1,
            });
        };
        return items
            .into_iter()
            .map(|item| into_document(path, 1, item))
            .collect();
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let value: Value = serde_json::from_str(line).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })?;
            into_document(path, idx + 1, value)
        })
        .collect()
}

fn into_document(path: &Path, line: usize, value: Value) -> Result<Value, LoadError> {
    match normalize_extended_json(value) {
        doc @ Value::Object(_) => Ok(doc),
        _ => Err(LoadError::NotADocument {
            path: path.to_path_buf(),
            line,
        }),
    }
}

/// Unwrap MongoDB extended-JSON type wrappers into plain JSON values.
///
/// `{"$numberInt": "3"}` becomes `3`, `{"$oid": "..."}` becomes the hex
/// string and `{"$date": ...}` becomes an RFC 3339 string.
pub fn normalize_extended_json(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            Value::Array(items.into_iter().map(normalize_extended_json).collect())
        }
        Value::Object(map) => match unwrap_wrapper(&map) {
            Some(unwrapped) => unwrapped,
            None => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, normalize_extended_json(v)))
                    .collect(),
            ),
        },
        other => other,
    }
}

fn unwrap_wrapper(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    match (key.as_str(), inner) {
        ("$oid", Value::String(s)) => Some(Value::String(s.clone())),
        ("$numberInt" | "$numberLong", Value::String(s)) => {
            s.parse::<i64>().ok().map(Value::from)
        }
        ("$numberDouble", Value::String(s)) => s.parse::<f64>().ok().map(number_value),
        ("$numberDecimal", Value::String(s)) => Some(
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(number_value)
                .unwrap_or_else(|| Value::String(s.clone())),
        ),
        ("$date", Value::String(s)) => Some(Value::String(s.clone())),
        ("$date", Value::Number(_)) => Some(to_date(inner)),
        ("$date", Value::Object(_)) => {
            let millis = normalize_extended_json(inner.clone());
            Some(to_date(&millis))
        }
        _ => None,
    }
}
