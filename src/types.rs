use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One untransformed listing as returned by the search API
pub type RawRecord = serde_json::Value;

/// Walk `path` through nested objects. Missing keys, non-object parents and
/// JSON `null` all come back as `None`.
pub fn get_nested<'a>(record: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = record;
    for key in path {
        current = current.as_object()?.get(*key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Textual form of an identifier that upstream may send as a string or a number.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn nested_str(record: &Value, path: &[&str]) -> Option<String> {
    get_nested(record, path).and_then(|v| v.as_str()).map(str::to_string)
}

pub fn nested_i64(record: &Value, path: &[&str]) -> Option<i64> {
    get_nested(record, path).and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    })
}

pub fn nested_f64(record: &Value, path: &[&str]) -> Option<f64> {
    get_nested(record, path).and_then(|v| v.as_f64())
}

pub fn nested_id(record: &Value, path: &[&str]) -> Option<String> {
    get_nested(record, path).and_then(id_text)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub condition: Option<String>,
    pub sold_quantity: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub seller_id: Option<String>,
    pub name: Option<String>,
    pub transaction_count: Option<i64>,
    pub reputation_tier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductCategory {
    pub product_id: String,
    pub category_id: String,
}

/// The four relational tables produced from one raw batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTables {
    pub products: Vec<Product>,
    pub sellers: Vec<Seller>,
    pub categories: Vec<Category>,
    pub product_categories: Vec<ProductCategory>,
}

/// Non-fatal diagnostics from one normalization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub records_in: usize,
    pub products: usize,
    pub sellers: usize,
    pub categories: usize,
    pub categories_dropped_null_id: usize,
    pub product_categories: usize,
    pub associations_dropped_dangling: usize,
}

/// Rows written per table by a sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub products: usize,
    pub sellers: usize,
    pub categories: usize,
    pub product_categories: usize,
}

impl LoadSummary {
    pub fn from_tables(tables: &NormalizedTables) -> Self {
        Self {
            products: tables.products.len(),
            sellers: tables.sellers.len(),
            categories: tables.categories.len(),
            product_categories: tables.product_categories.len(),
        }
    }
}
