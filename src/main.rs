use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use salesagg::config::AppConfig;
use salesagg::db::{ConnectionConfig, DataSource};
use salesagg::explain::render_plan;
use salesagg::export::{self, ExportFormat};
use salesagg::pipeline::ExecOptions;
use salesagg::queries::{run_all, QueryKind, QueryOptions};
use tracing::{info, Level};

/// Sales reports over order lines, orders, territories and products
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (default: <config dir>/salesagg/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read collections from JSON files in this directory
    #[arg(long, conflicts_with = "connect")]
    data_dir: Option<PathBuf>,

    /// Read collections from a PostgreSQL connection named in the config
    #[arg(long)]
    connect: Option<String>,

    /// Query to run; repeat for several (default: all)
    #[arg(short = 'q', long = "query", value_enum)]
    queries: Vec<QueryKind>,

    /// Root documents read per query
    #[arg(long, conflicts_with = "no_limit")]
    limit: Option<usize>,

    /// Read every root document
    #[arg(long)]
    no_limit: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<ExportFormat>,

    /// Run the queries concurrently
    #[arg(long)]
    parallel: bool,

    /// Print each query plan with row counts to stderr
    #[arg(long)]
    explain: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    let source = resolve_source(&cli, &config)?;

    let kinds = selected_queries(&cli.queries);
    let options = QueryOptions {
        root_limit: resolve_limit(&cli, &config)?,
        exec: ExecOptions {
            numeric_policy: config.numeric_policy,
        },
    };

    let collections = needed_collections(&kinds, options.root_limit);
    let names: Vec<&str> = collections.iter().map(String::as_str).collect();
    let dataset = source
        .load(&names)
        .await
        .with_context(|| format!("Failed to load dataset from {}", source.describe()))?;
    info!(
        source = %source.describe(),
        documents = dataset.document_count(),
        "dataset loaded"
    );

    let parallel = cli.parallel || config.parallel;
    let runs = run_all(Arc::new(dataset), &kinds, options, parallel).await?;

    if cli.explain {
        for run in &runs {
            eprintln!("{}:", run.kind.name());
            eprint!("{}", render_plan(&run.pipeline, Some(&run.stats)));
        }
    }

    let format = cli.format.unwrap_or(config.format);
    let reports: Vec<_> = runs.into_iter().map(|run| run.report).collect();
    print!("{}", export::render(format, &reports));
    Ok(())
}

fn resolve_source(cli: &Cli, config: &AppConfig) -> Result<DataSource> {
    if let Some(dir) = &cli.data_dir {
        return Ok(DataSource::JsonDir(dir.clone()));
    }

    if let Some(name) = &cli.connect {
        let Some(connection) = config.connection(name) else {
            let known: Vec<&str> = config.connections.iter().map(|c| c.name.as_str()).collect();
            bail!(
                "no connection named {:?} in the config (known: {})",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            );
        };
        let mut connection = connection.clone();
        resolve_password(&mut connection)?;
        return Ok(DataSource::Postgres {
            connection,
            tables: config.collections.clone(),
        });
    }

    match &config.data_dir {
        Some(dir) => Ok(DataSource::JsonDir(dir.clone())),
        None => bail!("no data source: pass --data-dir or --connect, or set data_dir in the config"),
    }
}

/// Config value first, then `PGPASSWORD`, then an interactive prompt.
fn resolve_password(config: &mut ConnectionConfig) -> Result<()> {
    if !config.password.is_empty() {
        return Ok(());
    }
    if let Ok(pw) = std::env::var("PGPASSWORD") {
        config.password = pw;
    } else {
        let prompt = format!("Password for {}: ", config.display_string());
        config.password = rpassword::read_password_from_tty(Some(&prompt))?;
    }
    Ok(())
}

fn resolve_limit(cli: &Cli, config: &AppConfig) -> Result<Option<usize>> {
    match (cli.no_limit, cli.limit) {
        (true, _) => Ok(None),
        (false, Some(0)) => bail!("--limit must be at least 1 (use --no-limit to read everything)"),
        (false, Some(n)) => Ok(Some(n)),
        (false, None) => Ok(config.root_limit),
    }
}

fn selected_queries(requested: &[QueryKind]) -> Vec<QueryKind> {
    if requested.is_empty() {
        return QueryKind::ALL.to_vec();
    }
    let mut kinds = Vec::with_capacity(requested.len());
    for kind in requested {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }
    kinds
}

fn needed_collections(kinds: &[QueryKind], root_limit: Option<usize>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for kind in kinds {
        for name in kind.pipeline(root_limit).collections() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}
