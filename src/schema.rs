//! Collections of the sales dataset and their canonical field names.

pub const SALES_ORDER_LINES: &str = "sales_order_lines";
pub const SALES_ORDERS: &str = "sales_orders";
pub const SALES_TERRITORIES: &str = "sales_territories";
pub const STATES: &str = "states";
pub const CITIES: &str = "cities";
pub const PRODUCTS: &str = "products";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

pub const COLLECTIONS: &[CollectionSchema] = &[
    CollectionSchema {
        name: SALES_ORDER_LINES,
        fields: &[
            "salesOrderID",
            "productID",
            "salesOrderLineQuantity",
            "salesOrderLineUnitPrice",
        ],
    },
    CollectionSchema {
        name: SALES_ORDERS,
        fields: &["salesOrderID", "salesOrderDate", "salesTerritoryID"],
    },
    CollectionSchema {
        name: SALES_TERRITORIES,
        fields: &["salesTerritoryID", "countryID"],
    },
    CollectionSchema {
        name: STATES,
        fields: &["stateID", "countryID"],
    },
    CollectionSchema {
        name: CITIES,
        fields: &["cityID", "stateID", "cityName"],
    },
    CollectionSchema {
        name: PRODUCTS,
        fields: &["productID", "modelID", "productName"],
    },
];

pub fn collection(name: &str) -> Option<&'static CollectionSchema> {
    COLLECTIONS.iter().find(|c| c.name == name)
}

/// Map a field name whose case was lost (e.g. a folded PostgreSQL column)
/// back to its canonical spelling.
pub fn canonical_field(collection_name: &str, field: &str) -> Option<&'static str> {
    collection(collection_name)?
        .fields
        .iter()
        .find(|f| f.eq_ignore_ascii_case(field))
        .copied()
}
