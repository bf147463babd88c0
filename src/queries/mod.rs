//! The sales queries.
//!
//! Each query is a [`Pipeline`] over the sales collections plus a typed
//! output row. [`QueryKind`] ties the two together for the command line;
//! the free functions re-exported here return typed rows directly.

mod monthly_sales;
mod quantity_by_model;
mod sales_by_city;

pub use monthly_sales::{monthly_sales, MonthlySales};
pub use quantity_by_model::{product_quantity_by_model, ModelQuantity};
pub use sales_by_city::{sales_by_product_and_city, ProductCitySales};

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::db::Dataset;
use crate::pipeline::{ExecOptions, ExecutionStats, Pipeline, PipelineResult};
use crate::report::{ReportRow, ReportTable};

/// Root documents read by each query unless configured otherwise.
pub const DEFAULT_ROOT_LIMIT: usize = 10;

/// Settings shared by every query run.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Cap on root documents; `None` reads the whole root collection.
    pub root_limit: Option<usize>,
    pub exec: ExecOptions,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            root_limit: Some(DEFAULT_ROOT_LIMIT),
            exec: ExecOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum QueryKind {
    /// Quantity and revenue per product and city.
    SalesByCity,
    /// Revenue per product per calendar month.
    MonthlySales,
    /// Quantity sold per product model.
    QuantityByModel,
}

impl QueryKind {
    pub const ALL: [QueryKind; 3] = [
        QueryKind::SalesByCity,
        QueryKind::MonthlySales,
        QueryKind::QuantityByModel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QueryKind::SalesByCity => "sales-by-city",
            QueryKind::MonthlySales => "monthly-sales",
            QueryKind::QuantityByModel => "quantity-by-model",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            QueryKind::SalesByCity => "Sales by product and city",
            QueryKind::MonthlySales => "Monthly sales by product",
            QueryKind::QuantityByModel => "Quantity sold by product model",
        }
    }

    pub fn pipeline(self, root_limit: Option<usize>) -> Pipeline {
        match self {
            QueryKind::SalesByCity => sales_by_city::pipeline(root_limit),
            QueryKind::MonthlySales => monthly_sales::pipeline(root_limit),
            QueryKind::QuantityByModel => quantity_by_model::pipeline(root_limit),
        }
    }

    /// Run the query and lay its rows out as a report.
    pub fn run(self, dataset: &Dataset, options: &QueryOptions) -> PipelineResult<QueryRun> {
        let pipeline = self.pipeline(options.root_limit);
        let started = Instant::now();
        let (report, stats) = match self {
            QueryKind::SalesByCity => {
                self.report::<ProductCitySales>(&pipeline, dataset, options, started)?
            }
            QueryKind::MonthlySales => {
                self.report::<MonthlySales>(&pipeline, dataset, options, started)?
            }
            QueryKind::QuantityByModel => {
                self.report::<ModelQuantity>(&pipeline, dataset, options, started)?
            }
        };

        info!(
            query = self.name(),
            rows = report.row_count,
            elapsed_ms = report.execution_time.as_millis() as u64,
            "query complete"
        );

        Ok(QueryRun {
            kind: self,
            pipeline,
            stats,
            report,
        })
    }

    fn report<R: ReportRow + DeserializeOwned>(
        self,
        pipeline: &Pipeline,
        dataset: &Dataset,
        options: &QueryOptions,
        started: Instant,
    ) -> PipelineResult<(ReportTable, ExecutionStats)> {
        let (rows, stats) = execute_rows::<R>(pipeline, dataset, &options.exec)?;
        let elapsed: Duration = started.elapsed();
        let table = ReportTable::from_rows(self.name(), self.title(), &rows, elapsed);
        Ok((table, stats))
    }
}

/// Outcome of one query run.
#[derive(Debug, Clone)]
pub struct QueryRun {
    pub kind: QueryKind,
    pub pipeline: Pipeline,
    pub stats: ExecutionStats,
    pub report: ReportTable,
}

/// Execute `pipeline` and deserialize every output document into `R`.
pub(crate) fn execute_rows<R: DeserializeOwned>(
    pipeline: &Pipeline,
    dataset: &Dataset,
    options: &ExecOptions,
) -> PipelineResult<(Vec<R>, ExecutionStats)> {
    let output = pipeline.execute(dataset, options)?;
    let rows = output
        .documents
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<R>, _>>()?;
    Ok((rows, output.stats))
}

/// Run the selected queries in order.
///
/// With `parallel` every query runs on its own blocking task; the dataset is
/// shared read-only, so the reports match a sequential run.
pub async fn run_all(
    dataset: Arc<Dataset>,
    kinds: &[QueryKind],
    options: QueryOptions,
    parallel: bool,
) -> Result<Vec<QueryRun>> {
    if !parallel {
        return kinds
            .iter()
            .map(|kind| {
                kind.run(&dataset, &options)
                    .with_context(|| format!("Query {} failed", kind.name()))
            })
            .collect();
    }

    let handles: Vec<_> = kinds
        .iter()
        .map(|&kind| {
            let dataset = Arc::clone(&dataset);
            (
                kind,
                tokio::task::spawn_blocking(move || kind.run(&dataset, &options)),
            )
        })
        .collect();

    let mut runs = Vec::with_capacity(handles.len());
    for (kind, handle) in handles {
        let run = handle
            .await
            .with_context(|| format!("Query {} panicked", kind.name()))?
            .with_context(|| format!("Query {} failed", kind.name()))?;
        runs.push(run);
    }
    Ok(runs)
}
