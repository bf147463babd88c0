//! Benchmarks for the sales queries over a synthetic dataset.
//!
//! Benchmarks cover:
//! - each query with the default root limit and unlimited
//! - extended-JSON loading of line-delimited documents
//! - report export
//!
//! Run with: `cargo bench`

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use salesagg::db::{json, Dataset};
use salesagg::export::{render, ExportFormat};
use salesagg::queries::{QueryKind, QueryOptions};
use salesagg::schema;
use serde_json::json;

// ---------------------------------------------------------------------------
// Synthetic dataset
// ---------------------------------------------------------------------------

const ORDERS: i64 = 2_000;
const LINES_PER_ORDER: i64 = 4;
const PRODUCTS: i64 = 150;
const TERRITORIES: i64 = 10;
const STATES_PER_COUNTRY: i64 = 3;
const CITIES_PER_STATE: i64 = 2;

fn dataset() -> Dataset {
    let mut dataset = Dataset::new();

    let lines = (0..ORDERS * LINES_PER_ORDER)
        .map(|i| {
            // Every third quantity is numeric text.
            let quantity = if i % 3 == 0 {
                json!((i % 7 + 1).to_string())
            } else {
                json!(i % 7 + 1)
            };
            json!({
                "salesOrderID": i / LINES_PER_ORDER,
                "productID": i % PRODUCTS,
                "salesOrderLineQuantity": quantity,
                "salesOrderLineUnitPrice": (i % 50) as f64 + 0.99,
            })
        })
        .collect();
    dataset.insert(schema::SALES_ORDER_LINES, lines);

    let orders = (0..ORDERS)
        .map(|i| {
            json!({
                "salesOrderID": i,
                "salesOrderDate": format!("2023-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
                "salesTerritoryID": i % TERRITORIES,
            })
        })
        .collect();
    dataset.insert(schema::SALES_ORDERS, orders);

    let territories = (0..TERRITORIES)
        .map(|i| json!({"salesTerritoryID": i, "countryID": i % 4}))
        .collect();
    dataset.insert(schema::SALES_TERRITORIES, territories);

    let states: Vec<_> = (0..4 * STATES_PER_COUNTRY)
        .map(|i| json!({"stateID": i, "countryID": i / STATES_PER_COUNTRY}))
        .collect();
    let cities = (0..states.len() as i64 * CITIES_PER_STATE)
        .map(|i| {
            json!({
                "cityID": i,
                "stateID": i / CITIES_PER_STATE,
                "cityName": format!("City {i}"),
            })
        })
        .collect();
    dataset.insert(schema::STATES, states);
    dataset.insert(schema::CITIES, cities);

    let products = (0..PRODUCTS)
        .map(|i| {
            json!({
                "productID": i,
                "modelID": i % 20,
                "productName": format!("Model {} product", i % 20),
            })
        })
        .collect();
    dataset.insert(schema::PRODUCTS, products);

    dataset
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let dataset = dataset();

    let limits = [("limit_10", Some(10)), ("unlimited", None)];

    for kind in QueryKind::ALL {
        for (label, root_limit) in &limits {
            let options = QueryOptions {
                root_limit: *root_limit,
                ..QueryOptions::default()
            };
            group.bench_with_input(
                BenchmarkId::new(kind.name(), label),
                &options,
                |b, options| {
                    b.iter(|| kind.run(black_box(&dataset), options).unwrap());
                },
            );
        }
    }

    group.finish();
}

fn bench_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("loading");

    let content: String = (0..5_000)
        .map(|i| {
            format!(
                "{{\"_id\":{{\"$oid\":\"64b7f1c2e1a2b3c4d5e6{i:04x}\"}},\"salesOrderID\":{{\"$numberInt\":\"{i}\"}},\"salesOrderLineQuantity\":{{\"$numberDouble\":\"2.0\"}}}}\n"
            )
        })
        .collect();

    group.bench_function("parse_extended_jsonl", |b| {
        b.iter(|| json::parse_documents(Path::new("lines.jsonl"), black_box(&content)).unwrap());
    });

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    let dataset = dataset();
    let options = QueryOptions {
        root_limit: None,
        ..QueryOptions::default()
    };
    let report = QueryKind::SalesByCity.run(&dataset, &options).unwrap().report;
    let reports = [report];

    for format in [ExportFormat::Json, ExportFormat::Csv, ExportFormat::Table] {
        group.bench_with_input(
            BenchmarkId::new("render", format!("{format:?}")),
            &format,
            |b, format| {
                b.iter(|| render(*format, black_box(&reports)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_queries, bench_loading, bench_export);
criterion_main!(benches);
