//! PostgreSQL source.
//!
//! Every collection is read from a table (or view) as one JSON object per
//! row. Column names folded to lower case are restored to the canonical
//! field names listed in [`crate::schema`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tokio_postgres::Client;
use tracing::info;

use super::{Dataset, LoadError};
use crate::schema;

/// Load the named collections. `tables` maps a collection to a
/// (possibly schema-qualified) table name; unmapped collections use their
/// own name.
pub async fn load_tables(
    client: &Client,
    collections: &[&str],
    tables: &BTreeMap<String, String>,
) -> Result<Dataset, LoadError> {
    let mut dataset = Dataset::new();
    for name in collections {
        let table = tables.get(*name).map(String::as_str).unwrap_or(*name);
        let sql = format!("SELECT row_to_json(t) FROM {} t", quote_table(table));
        let rows = client
            .query(sql.as_str(), &[])
            .await
            .map_err(|source| LoadError::Postgres {
                collection: name.to_string(),
                table: table.to_string(),
                source,
            })?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            let value: Value = row.try_get(0).map_err(|source| LoadError::Postgres {
                collection: name.to_string(),
                table: table.to_string(),
                source,
            })?;
            let Value::Object(columns) = value else {
                return Err(LoadError::UnexpectedRow {
                    table: table.to_string(),
                });
            };
            documents.push(Value::Object(restore_field_names(name, columns)));
        }

        info!(collection = *name, table, documents = documents.len(), "loaded collection");
        dataset.insert(*name, documents);
    }
    Ok(dataset)
}

/// Rename case-folded columns to the collection's canonical field names.
fn restore_field_names(collection: &str, columns: Map<String, Value>) -> Map<String, Value> {
    columns
        .into_iter()
        .map(|(column, value)| {
            let field = schema::canonical_field(collection, &column)
                .map(str::to_string)
                .unwrap_or(column);
            (field, value)
        })
        .collect()
}

/// Quote a possibly schema-qualified identifier.
fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table("products"), "\"products\"");
        assert_eq!(quote_table("sales.orders"), "\"sales\".\"orders\"");
        assert_eq!(quote_table("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_restore_field_names() {
        let Value::Object(columns) = json!({
            "salesorderid": 1,
            "salesorderdate": "2023-07-15",
            "region_note": "x",
        }) else {
            unreachable!()
        };
        let restored = restore_field_names(schema::SALES_ORDERS, columns);
        assert_eq!(restored["salesOrderID"], json!(1));
        assert_eq!(restored["salesOrderDate"], json!("2023-07-15"));
        assert_eq!(restored["region_note"], json!("x"));
    }
}
