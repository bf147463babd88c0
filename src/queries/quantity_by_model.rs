use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{execute_rows, QueryOptions};
use crate::db::Dataset;
use crate::pipeline::{Accumulator, Expr, Pipeline, PipelineResult};
use crate::report::{CellValue, ReportRow};
use crate::schema::{PRODUCTS, SALES_ORDER_LINES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelQuantity {
    #[serde(rename = "modelID")]
    pub model_id: Value,
    #[serde(rename = "productName", default)]
    pub product_name: Value,
    #[serde(rename = "totalQuantity")]
    pub total_quantity: f64,
}

impl ReportRow for ModelQuantity {
    const COLUMNS: &'static [&'static str] = &["modelID", "productName", "totalQuantity"];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::from(&self.model_id),
            CellValue::from(&self.product_name),
            self.total_quantity.into(),
        ]
    }
}

/// Products joined to their sales lines; products never sold drop out.
pub fn pipeline(root_limit: Option<usize>) -> Pipeline {
    Pipeline::new(PRODUCTS)
        .limit(root_limit)
        .join(SALES_ORDER_LINES, "productID", "productID", "salesData", false)
        .group_by(
            vec![
                ("modelID", Expr::field("modelID")),
                ("productName", Expr::field("productName")),
            ],
            vec![(
                "totalQuantity",
                Accumulator::Sum(Expr::field("salesData.salesOrderLineQuantity").to_double()),
            )],
        )
        .project(vec![
            ("modelID", Expr::field("_id.modelID")),
            ("productName", Expr::field("_id.productName")),
            ("totalQuantity", Expr::field("totalQuantity")),
        ])
}

pub fn product_quantity_by_model(
    dataset: &Dataset,
    options: &QueryOptions,
) -> PipelineResult<Vec<ModelQuantity>> {
    let (rows, _) = execute_rows(&pipeline(options.root_limit), dataset, &options.exec)?;
    Ok(rows)
}
