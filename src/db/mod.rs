mod connection;
mod dataset;
mod error;
pub mod json;
pub mod postgres;

pub use connection::*;
pub use dataset::*;
pub use error::*;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Where the dataset is read from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A directory of `<collection>.json` / `.jsonl` files.
    JsonDir(PathBuf),
    /// A PostgreSQL database; `tables` maps collections to table names.
    Postgres {
        connection: ConnectionConfig,
        tables: BTreeMap<String, String>,
    },
}

impl DataSource {
    pub fn describe(&self) -> String {
        match self {
            DataSource::JsonDir(dir) => format!("json:{}", dir.display()),
            DataSource::Postgres { connection, .. } => {
                format!("postgres:{}", connection.display_string())
            }
        }
    }

    /// Read the named collections into memory.
    pub async fn load(&self, collections: &[&str]) -> Result<Dataset> {
        match self {
            DataSource::JsonDir(dir) => Ok(json::load_dir(dir, collections)?),
            DataSource::Postgres { connection, tables } => {
                let client = create_client(connection).await?;
                let dataset = postgres::load_tables(&client, collections, tables)
                    .await
                    .with_context(|| format!("Failed to load from {}", connection.name))?;
                Ok(dataset)
            }
        }
    }
}
