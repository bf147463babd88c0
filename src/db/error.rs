use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while filling a [`super::Dataset`] from a data store.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No data file for collection {collection} in {}", dir.display())]
    MissingCollection { collection: String, dir: PathBuf },

    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {} at line {line}", path.display())]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a JSON object in {} at line {line}", path.display())]
    NotADocument { path: PathBuf, line: usize },

    #[error("Failed to load collection {collection} from table {table}")]
    Postgres {
        collection: String,
        table: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Row of table {table} is not a JSON object")]
    UnexpectedRow { table: String },
}
