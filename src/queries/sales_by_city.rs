use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{execute_rows, QueryOptions};
use crate::db::Dataset;
use crate::pipeline::{Accumulator, Expr, Pipeline, PipelineResult};
use crate::report::{CellValue, ReportRow};
use crate::schema::{CITIES, SALES_ORDERS, SALES_ORDER_LINES, SALES_TERRITORIES, STATES};

/// Quantity and revenue of one product in one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCitySales {
    #[serde(rename = "productID")]
    pub product_id: Value,
    /// Null when the line could not be traced to a city.
    #[serde(rename = "cityName", default)]
    pub city_name: Value,
    #[serde(rename = "totalQuantity")]
    pub total_quantity: f64,
    #[serde(rename = "totalSales")]
    pub total_sales: f64,
}

impl ReportRow for ProductCitySales {
    const COLUMNS: &'static [&'static str] =
        &["productID", "cityName", "totalQuantity", "totalSales"];

    fn cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::from(&self.product_id),
            CellValue::from(&self.city_name),
            self.total_quantity.into(),
            self.total_sales.into(),
        ]
    }
}

/// Order lines traced to a city through order, territory and state, then
/// summed per (product, city).
///
/// Every join keeps unmatched lines, so a line whose chain breaks still
/// counts under a city of `null`. Territories reach states through
/// `countryID`, which fans a territory out to every state of its country.
pub fn pipeline(root_limit: Option<usize>) -> Pipeline {
    let quantity = || Expr::field("salesOrderLineQuantity").to_double();
    let price = Expr::field("salesOrderLineUnitPrice").to_double();

    Pipeline::new(SALES_ORDER_LINES)
        .limit(root_limit)
        .join(SALES_ORDERS, "salesOrderID", "salesOrderID", "orderDetails", true)
        .join(
            SALES_TERRITORIES,
            "orderDetails.salesTerritoryID",
            "salesTerritoryID",
            "territoryDetails",
            true,
        )
        .join(
            STATES,
            "territoryDetails.countryID",
            "countryID",
            "stateDetails",
            true,
        )
        .join(CITIES, "stateDetails.stateID", "stateID", "cityDetails", true)
        .group_by(
            vec![
                ("productID", Expr::field("productID")),
                ("cityName", Expr::field("cityDetails.cityName")),
            ],
            vec![
                ("totalQuantity", Accumulator::Sum(quantity())),
                (
                    "totalSales",
                    Accumulator::Sum(Expr::multiply(vec![quantity(), price])),
                ),
            ],
        )
        .project(vec![
            ("productID", Expr::field("_id.productID")),
            ("cityName", Expr::field("_id.cityName")),
            ("totalQuantity", Expr::field("totalQuantity")),
            ("totalSales", Expr::field("totalSales")),
        ])
}

pub fn sales_by_product_and_city(
    dataset: &Dataset,
    options: &QueryOptions,
) -> PipelineResult<Vec<ProductCitySales>> {
    let (rows, _) = execute_rows(&pipeline(options.root_limit), dataset, &options.exec)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{NumericPolicy, PipelineError};
    use crate::queries::fixtures::{self, line};
    use serde_json::json;

    fn unlimited() -> QueryOptions {
        QueryOptions {
            root_limit: None,
            ..QueryOptions::default()
        }
    }

    fn row<'a>(rows: &'a [ProductCitySales], product: i64) -> &'a ProductCitySales {
        rows.iter()
            .find(|r| r.product_id == json!(product))
            .unwrap()
    }

    #[test]
    fn test_totals_for_linked_lines() {
        let rows = sales_by_product_and_city(&fixtures::dataset(), &unlimited()).unwrap();
        let porto = row(&rows, 100);
        assert_eq!(porto.city_name, json!("Porto"));
        assert_eq!(porto.total_quantity, 5.0);
        assert_eq!(porto.total_sales, 35.0);
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let rows = sales_by_product_and_city(&fixtures::dataset(), &unlimited()).unwrap();
        let text = row(&rows, 200);
        assert_eq!(text.total_quantity, 4.0);
        assert_eq!(text.total_sales, 10.0);
    }

    #[test]
    fn test_orphan_line_kept_with_null_city() {
        let rows = sales_by_product_and_city(&fixtures::dataset(), &unlimited()).unwrap();
        let orphan = row(&rows, 300);
        assert!(orphan.city_name.is_null());
        assert_eq!(orphan.total_quantity, 1.0);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_territory_fans_out_to_every_state_of_country() {
        let mut dataset = fixtures::dataset();
        dataset.insert(
            STATES,
            vec![
                json!({"stateID": 10, "countryID": 1}),
                json!({"stateID": 11, "countryID": 1}),
            ],
        );
        dataset.insert(
            CITIES,
            vec![
                json!({"cityID": 5, "stateID": 10, "cityName": "Porto"}),
                json!({"cityID": 6, "stateID": 11, "cityName": "Braga"}),
            ],
        );
        let rows = sales_by_product_and_city(&dataset, &unlimited()).unwrap();
        let cities: Vec<_> = rows
            .iter()
            .filter(|r| r.product_id == json!(100))
            .map(|r| r.city_name.clone())
            .collect();
        assert_eq!(cities, vec![json!("Porto"), json!("Braga")]);
    }

    #[test]
    fn test_large_product_ids_group_separately() {
        let mut dataset = fixtures::dataset();
        dataset.insert(
            SALES_ORDER_LINES,
            vec![
                line(1, 9007199254740992, json!(1), json!(1.0)),
                line(1, 9007199254740993, json!(1), json!(1.0)),
            ],
        );
        let rows = sales_by_product_and_city(&dataset, &unlimited()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_id, json!(9007199254740992_i64));
        assert_eq!(rows[1].product_id, json!(9007199254740993_i64));
        assert!(rows.iter().all(|r| r.total_quantity == 1.0));
    }

    #[test]
    fn test_non_text_city_name_passes_through() {
        let mut dataset = fixtures::dataset();
        dataset.insert(
            CITIES,
            vec![json!({"cityID": 5, "stateID": 10, "cityName": 42})],
        );
        let rows = sales_by_product_and_city(&dataset, &unlimited()).unwrap();
        assert_eq!(row(&rows, 100).city_name, json!(42));
        assert_eq!(row(&rows, 100).cells()[1], CellValue::Int(42));
    }

    #[test]
    fn test_root_limit_applies_before_joins() {
        let options = QueryOptions {
            root_limit: Some(1),
            ..QueryOptions::default()
        };
        let rows = sales_by_product_and_city(&fixtures::dataset(), &options).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_quantity, 2.0);
        assert_eq!(rows[0].total_sales, 20.0);
    }

    #[test]
    fn test_invalid_quantity_follows_policy() {
        let mut dataset = fixtures::dataset();
        dataset.insert(
            SALES_ORDER_LINES,
            vec![
                line(1, 100, json!("n/a"), json!(10.0)),
                line(1, 100, json!(3), json!(5.0)),
            ],
        );

        let err = sales_by_product_and_city(&dataset, &unlimited()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidNumber { .. }));

        let mut lenient = unlimited();
        lenient.exec.numeric_policy = NumericPolicy::Null;
        let rows = sales_by_product_and_city(&dataset, &lenient).unwrap();
        assert_eq!(rows[0].total_quantity, 3.0);
        assert_eq!(rows[0].total_sales, 15.0);
    }
}
