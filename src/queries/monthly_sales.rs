use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{execute_rows, QueryOptions};
use crate::db::Dataset;
use crate::pipeline::{Accumulator, Expr, Pipeline, PipelineResult};
use crate::report::{CellValue, ReportRow};
use crate::schema::{SALES_ORDERS, SALES_ORDER_LINES};

const QUANTITY: &str = "orderLines.salesOrderLineQuantity";
const UNIT_PRICE: &str = "orderLines.salesOrderLineUnitPrice";

/// Revenue of one product in one calendar month.
///
/// `year` and `month` are `None` for orders whose date could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySales {
    pub year: Option<i32>,
    pub month: Option<u32>,
    #[serde(rename = "productID")]
    pub product_id: Value,
    #[serde(rename = "totalSales")]
    pub total_sales: f64,
    /// Mean line revenue within the group.
    #[serde(rename = "averageMonthlySales")]
    pub average_monthly_sales: Option<f64>,
}

impl ReportRow for MonthlySales {
    const COLUMNS: &'static [&'static str] = &[
        "year",
        "month",
        "productID",
        "totalSales",
        "averageMonthlySales",
    ];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            self.year.into(),
            self.month.into(),
            CellValue::from(&self.product_id),
            self.total_sales.into(),
            self.average_monthly_sales.into(),
        ]
    }
}

/// Orders joined to their lines (orders without lines drop out), grouped by
/// the UTC year and month of the order date and the line's product.
pub fn pipeline(root_limit: Option<usize>) -> Pipeline {
    let revenue = || Expr::multiply(vec![Expr::field(QUANTITY), Expr::field(UNIT_PRICE)]);
    let order_date = || Expr::field("salesOrderDateParsed");

    Pipeline::new(SALES_ORDERS)
        .limit(root_limit)
        .join(SALES_ORDER_LINES, "salesOrderID", "salesOrderID", "orderLines", false)
        .add_fields(vec![
            ("salesOrderDateParsed", Expr::field("salesOrderDate").to_date()),
            (QUANTITY, Expr::field(QUANTITY).to_double()),
            (UNIT_PRICE, Expr::field(UNIT_PRICE).to_double()),
        ])
        .group_by(
            vec![
                ("year", order_date().year()),
                ("month", order_date().month()),
                ("productID", Expr::field("orderLines.productID")),
            ],
            vec![
                ("totalSales", Accumulator::Sum(revenue())),
                ("averageMonthlySales", Accumulator::Avg(revenue())),
            ],
        )
        .project(vec![
            ("year", Expr::field("_id.year")),
            ("month", Expr::field("_id.month")),
            ("productID", Expr::field("_id.productID")),
            ("totalSales", Expr::field("totalSales")),
            ("averageMonthlySales", Expr::field("averageMonthlySales")),
        ])
}

pub fn monthly_sales(
    dataset: &Dataset,
    options: &QueryOptions,
) -> PipelineResult<Vec<MonthlySales>> {
    let (rows, _) = execute_rows(&pipeline(options.root_limit), dataset, &options.exec)?;
    Ok(rows)
}
