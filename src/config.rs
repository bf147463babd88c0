//! `config.toml` handling.
//!
//! ```toml
//! root_limit = 10          # or "none"
//! numeric_policy = "error" # or "null"
//! format = "table"
//! parallel = false
//! data_dir = "/srv/sales"
//!
//! [collections]
//! sales_orders = "sales.orders"
//!
//! [[connections]]
//! name = "warehouse"
//! database = "sales"
//! username = "report"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::db::ConnectionConfig;
use crate::export::ExportFormat;
use crate::pipeline::NumericPolicy;
use crate::queries::DEFAULT_ROOT_LIMIT;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Root documents read per query; `None` reads everything.
    #[serde(deserialize_with = "deserialize_root_limit")]
    pub root_limit: Option<usize>,
    pub numeric_policy: NumericPolicy,
    pub format: ExportFormat,
    pub parallel: bool,
    /// JSON directory used when no source is given on the command line.
    pub data_dir: Option<PathBuf>,
    /// Collection name to PostgreSQL table.
    pub collections: BTreeMap<String, String>,
    pub connections: Vec<ConnectionConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_limit: Some(DEFAULT_ROOT_LIMIT),
            numeric_policy: NumericPolicy::default(),
            format: ExportFormat::default(),
            parallel: false,
            data_dir: None,
            collections: BTreeMap::new(),
            connections: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load `path`, or the default config file if it exists.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = config_path()?;
                if !path.exists() {
                    debug!(path = %path.display(), "no config file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&data)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(data)?;
        config.warn_duplicate_connections();
        Ok(config)
    }

    /// Look up a connection by name, ignoring case.
    pub fn connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn warn_duplicate_connections(&self) {
        for (i, conn) in self.connections.iter().enumerate() {
            if self.connections[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&conn.name))
            {
                warn!(name = %conn.name, "duplicate connection name, the first one wins");
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("salesagg").join("config.toml"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Count(usize),
    Word(String),
}

fn deserialize_root_limit<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawLimit::deserialize(deserializer)? {
        RawLimit::Count(0) => Err(D::Error::custom(
            "root_limit must be at least 1 (use \"none\" to disable it)",
        )),
        RawLimit::Count(n) => Ok(Some(n)),
        RawLimit::Word(word) if word.eq_ignore_ascii_case("none") => Ok(None),
        RawLimit::Word(word) => Err(D::Error::custom(format!(
            "invalid root_limit {word:?}, expected a positive integer or \"none\""
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SslMode;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.root_limit, Some(10));
        assert_eq!(config.numeric_policy, NumericPolicy::Error);
        assert_eq!(config.format, ExportFormat::Table);
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::parse(
            r#"
            root_limit = 25
            numeric_policy = "null"
            format = "csv"
            parallel = true
            data_dir = "/srv/sales"

            [collections]
            sales_orders = "sales.orders"

            [[connections]]
            name = "Warehouse"
            host = "db.internal"
            database = "sales"
            username = "report"
            ssl_mode = "VerifyFull"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_limit, Some(25));
        assert_eq!(config.numeric_policy, NumericPolicy::Null);
        assert_eq!(config.format, ExportFormat::Csv);
        assert!(config.parallel);
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/sales")));
        assert_eq!(config.collections["sales_orders"], "sales.orders");

        let conn = config.connection("warehouse").unwrap();
        assert_eq!(conn.host, "db.internal");
        assert_eq!(conn.port, 5432);
        assert_eq!(conn.ssl_mode, SslMode::VerifyFull);
        assert!(config.connection("missing").is_none());
    }

    #[test]
    fn test_root_limit_none_disables() {
        let config = AppConfig::parse("root_limit = \"none\"").unwrap();
        assert_eq!(config.root_limit, None);
    }

    #[test]
    fn test_root_limit_zero_rejected() {
        let err = AppConfig::parse("root_limit = 0").unwrap_err();
        assert!(format!("{err:#}").contains("at least 1"));
        assert!(AppConfig::parse("root_limit = \"all\"").is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(AppConfig::parse("rootlimit = 5").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/salesagg.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
