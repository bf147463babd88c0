use std::path::PathBuf;
use std::sync::Arc;

use salesagg::db::{json, DataSource, LoadError};
use salesagg::explain::render_plan;
use salesagg::export::{render, ExportFormat};
use salesagg::queries::{
    monthly_sales, product_quantity_by_model, run_all, sales_by_product_and_city, QueryKind,
    QueryOptions,
};
use salesagg::schema;
use serde_json::Value;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sales")
}

fn all_collections() -> Vec<&'static str> {
    schema::COLLECTIONS.iter().map(|c| c.name).collect()
}

fn unlimited() -> QueryOptions {
    QueryOptions {
        root_limit: None,
        ..QueryOptions::default()
    }
}

#[test]
fn loads_every_fixture_layout() {
    let dataset = json::load_dir(&fixture_dir(), &all_collections()).unwrap();
    assert_eq!(dataset.collection(schema::SALES_ORDER_LINES).len(), 4);
    assert_eq!(dataset.collection(schema::CITIES).len(), 1);
    assert_eq!(
        dataset.collection(schema::SALES_ORDER_LINES)[0]["salesOrderLineQuantity"],
        Value::from(2)
    );
}

#[test]
fn missing_collection_is_named() {
    let err = json::load_dir(&fixture_dir(), &["customers"]).unwrap_err();
    match err {
        LoadError::MissingCollection { collection, .. } => assert_eq!(collection, "customers"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn sales_by_city_over_fixtures() {
    let dataset = json::load_dir(&fixture_dir(), &all_collections()).unwrap();
    let rows = sales_by_product_and_city(&dataset, &unlimited()).unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].product_id, Value::from(100));
    assert_eq!(rows[0].city_name, Value::from("Porto"));
    assert_eq!(rows[0].total_quantity, 5.0);
    assert_eq!(rows[0].total_sales, 35.0);
    assert!(rows[2].city_name.is_null());
}

#[test]
fn monthly_sales_over_fixtures() {
    let dataset = json::load_dir(&fixture_dir(), &all_collections()).unwrap();
    let rows = monthly_sales(&dataset, &unlimited()).unwrap();

    let months: Vec<_> = rows.iter().map(|r| (r.year, r.month)).collect();
    assert_eq!(months, vec![(Some(2023), Some(7)), (Some(2023), Some(8))]);
    assert_eq!(rows[0].total_sales, 35.0);
    assert_eq!(rows[1].average_monthly_sales, Some(10.0));
}

#[test]
fn quantity_by_model_over_fixtures() {
    let dataset = json::load_dir(&fixture_dir(), &all_collections()).unwrap();
    let rows = product_quantity_by_model(&dataset, &unlimited()).unwrap();

    let totals: Vec<_> = rows
        .iter()
        .map(|r| (r.product_name.clone(), r.total_quantity))
        .collect();
    assert_eq!(
        totals,
        vec![(Value::from("Road Bike"), 9.0), (Value::from("Helmet"), 1.0)]
    );
}

#[test]
fn root_limit_never_reads_more_than_n_roots() {
    let dataset = json::load_dir(&fixture_dir(), &all_collections()).unwrap();
    for kind in QueryKind::ALL {
        for n in 1..=4 {
            let options = QueryOptions {
                root_limit: Some(n),
                ..QueryOptions::default()
            };
            let run = kind.run(&dataset, &options).unwrap();
            assert!(run.stats.root_documents <= n, "{} with limit {n}", kind.name());
        }
    }
}

#[tokio::test]
async fn end_to_end_json_source() {
    let source = DataSource::JsonDir(fixture_dir());
    let dataset = source.load(&all_collections()).await.unwrap();

    let runs = run_all(Arc::new(dataset), &QueryKind::ALL, QueryOptions::default(), true)
        .await
        .unwrap();
    assert_eq!(runs.len(), 3);

    let plan = render_plan(&runs[0].pipeline, Some(&runs[0].stats));
    assert!(plan.starts_with("Scan sales_order_lines\n  -> Limit 10  (rows=4)\n"));

    let reports: Vec<_> = runs.into_iter().map(|r| r.report).collect();
    let output: Value = serde_json::from_str(&render(ExportFormat::Json, &reports)).unwrap();
    assert_eq!(output["sales-by-city"][0]["totalSales"], Value::from(35.0));
    assert_eq!(output["monthly-sales"][0]["month"], Value::from(7));
    assert_eq!(output["quantity-by-model"][1]["productName"], "Helmet");
}
