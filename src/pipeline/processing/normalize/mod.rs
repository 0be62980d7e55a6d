use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

use crate::constants::NO_REPUTATION;
use crate::error::IntegrityError;
use crate::types::{
    get_nested, nested_f64, nested_i64, nested_id, nested_str, Category, NormalizeReport,
    NormalizedTables, Product, ProductCategory, RawRecord, Seller,
};

/// Tables plus the non-fatal diagnostics gathered while building them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized {
    pub tables: NormalizedTables,
    pub report: NormalizeReport,
}

/// Trait for decomposing a raw batch into the relational tables
pub trait Normalizer {
    fn normalize(&self, records: &[RawRecord]) -> Result<Normalized, IntegrityError>;
}

/// Projects listings into products, sellers, categories and their association.
///
/// With `strict_mode` on, duplicate product ids and missing titles reject the
/// whole batch. A missing `id` or an unparsable `date_created` is rejected in
/// either mode.
#[derive(Debug, Clone)]
pub struct RelationalNormalizer {
    pub strict_mode: bool,
}

impl Default for RelationalNormalizer {
    fn default() -> Self {
        Self { strict_mode: true }
    }
}

impl RelationalNormalizer {
    pub fn new(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    fn extract_products(&self, records: &[RawRecord]) -> Result<Vec<Product>, IntegrityError> {
        let mut products = Vec::with_capacity(records.len());
        let mut first_seen: HashMap<String, usize> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            let id = nested_id(record, &["id"])
                .ok_or(IntegrityError::MissingField { index, field: "id" })?;

            let title = match get_nested(record, &["title"]) {
                Some(Value::String(text)) => Some(text.clone()),
                Some(other) if self.strict_mode => {
                    return Err(IntegrityError::WrongType {
                        index,
                        field: "title",
                        expected: "string",
                        found: other.to_string(),
                    });
                }
                Some(other) => {
                    warn!("Record {} has a non-string title {}", index, other);
                    scalar_text(other)
                }
                None if self.strict_mode => {
                    return Err(IntegrityError::MissingField {
                        index,
                        field: "title",
                    });
                }
                None => None,
            };

            let created_at = match get_nested(record, &["date_created"]) {
                Some(raw) => Some(parse_timestamp(raw).map_err(|reason| {
                    IntegrityError::InvalidTimestamp {
                        id: id.clone(),
                        value: raw.as_str().map(str::to_string).unwrap_or_else(|| raw.to_string()),
                        reason,
                    }
                })?),
                None => None,
            };

            if let Some(&first_index) = first_seen.get(&id) {
                if self.strict_mode {
                    return Err(IntegrityError::DuplicateId {
                        id,
                        first_index,
                        second_index: index,
                    });
                }
                debug!("Duplicate product id {} kept in lenient mode", id);
            } else {
                first_seen.insert(id.clone(), index);
            }

            products.push(Product {
                id,
                title,
                price: nested_f64(record, &["price"]),
                condition: nested_str(record, &["condition"]),
                sold_quantity: nested_i64(record, &["sold_quantity"]),
                created_at,
                permalink: nested_str(record, &["permalink"]),
                thumbnail: nested_str(record, &["thumbnail"]),
            });
        }

        Ok(products)
    }

    fn extract_sellers(&self, records: &[RawRecord]) -> Vec<Seller> {
        records
            .iter()
            .filter_map(|record| get_nested(record, &["seller"]).filter(|s| s.is_object()))
            .map(|seller| Seller {
                seller_id: nested_id(seller, &["id"]),
                name: nested_str(seller, &["nickname"]),
                transaction_count: nested_i64(seller, &["seller_reputation", "transactions", "total"]),
                reputation_tier: nested_str(seller, &["seller_reputation", "power_seller_status"])
                    .unwrap_or_else(|| NO_REPUTATION.to_string()),
            })
            .collect()
    }

    /// Categories with a usable id, and how many were dropped for lacking one.
    fn extract_categories(&self, records: &[RawRecord]) -> (Vec<Category>, usize) {
        let mut categories = Vec::new();
        let mut dropped = 0;
        for category in records
            .iter()
            .filter_map(|record| get_nested(record, &["category"]).filter(|c| c.is_object()))
        {
            match nested_id(category, &["id"]) {
                Some(category_id) => categories.push(Category {
                    category_id,
                    name: nested_str(category, &["name"]),
                }),
                None => dropped += 1,
            }
        }
        (categories, dropped)
    }

    fn extract_associations(&self, records: &[RawRecord]) -> Vec<ProductCategory> {
        records
            .iter()
            .filter_map(|record| {
                Some(ProductCategory {
                    product_id: nested_id(record, &["id"])?,
                    category_id: nested_id(record, &["category", "id"])?,
                })
            })
            .collect()
    }
}

impl Normalizer for RelationalNormalizer {
    #[instrument(skip(self, records), fields(records = records.len(), strict = self.strict_mode))]
    fn normalize(&self, records: &[RawRecord]) -> Result<Normalized, IntegrityError> {
        let products = self.extract_products(records)?;
        let sellers = self.extract_sellers(records);
        let (categories, categories_dropped_null_id) = self.extract_categories(records);
        let (product_categories, associations_dropped_dangling) =
            retain_known_categories(self.extract_associations(records), &categories);

        if associations_dropped_dangling > 0 {
            warn!(
                "{} product-category rows referenced unknown categories and were removed",
                associations_dropped_dangling
            );
        }

        let report = NormalizeReport {
            records_in: records.len(),
            products: products.len(),
            sellers: sellers.len(),
            categories: categories.len(),
            categories_dropped_null_id,
            product_categories: product_categories.len(),
            associations_dropped_dangling,
        };
        info!(
            "Normalized {} records into {} products, {} sellers, {} categories, {} associations",
            report.records_in,
            report.products,
            report.sellers,
            report.categories,
            report.product_categories
        );

        Ok(Normalized {
            tables: NormalizedTables {
                products,
                sellers,
                categories,
                product_categories,
            },
            report,
        })
    }
}

/// Keep only associations whose category exists; returns the kept rows and the drop count.
pub fn retain_known_categories(
    associations: Vec<ProductCategory>,
    categories: &[Category],
) -> (Vec<ProductCategory>, usize) {
    let known: HashSet<&str> = categories.iter().map(|c| c.category_id.as_str()).collect();
    let before = associations.len();
    let kept: Vec<ProductCategory> = associations
        .into_iter()
        .filter(|pc| known.contains(pc.category_id.as_str()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Numbers and booleans as text; anything structured has no textual form.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Parse `date_created`. RFC 3339 is what the search API sends; naive
/// timestamps and bare dates are read as UTC.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {}", value))?
        .trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| "date out of range".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn listing(id: Value, category_id: Value) -> Value {
        json!({
            "id": id,
            "title": "Google Chromecast",
            "price": 45999.5,
            "condition": "new",
            "sold_quantity": 12,
            "date_created": "2023-03-01T14:05:09.000Z",
            "permalink": "https://example.com/item",
            "thumbnail": "https://example.com/thumb.jpg",
            "seller": {
                "id": 1001,
                "nickname": "TECHSTORE",
                "seller_reputation": {
                    "power_seller_status": "platinum",
                    "transactions": { "total": 5000 }
                }
            },
            "category": { "id": category_id, "name": "Streaming" }
        })
    }

    #[test]
    fn projects_all_four_tables() {
        let records = vec![listing(json!("MLA1"), json!("MLA1000")), listing(json!(2), json!(77))];
        let normalized = RelationalNormalizer::default().normalize(&records).unwrap();
        let tables = &normalized.tables;

        assert_eq!(tables.products.len(), 2);
        let first = &tables.products[0];
        assert_eq!(first.id, "MLA1");
        assert_eq!(first.title.as_deref(), Some("Google Chromecast"));
        assert_eq!(first.price, Some(45999.5));
        assert_eq!(first.sold_quantity, Some(12));
        assert_eq!(
            first.created_at,
            Some(Utc.with_ymd_and_hms(2023, 3, 1, 14, 5, 9).unwrap())
        );
        assert_eq!(tables.products[1].id, "2");

        assert_eq!(
            tables.sellers[0],
            Seller {
                seller_id: Some("1001".into()),
                name: Some("TECHSTORE".into()),
                transaction_count: Some(5000),
                reputation_tier: "platinum".into(),
            }
        );
        assert_eq!(tables.categories[1].category_id, "77");
        assert_eq!(
            tables.product_categories,
            vec![
                ProductCategory { product_id: "MLA1".into(), category_id: "MLA1000".into() },
                ProductCategory { product_id: "2".into(), category_id: "77".into() },
            ]
        );
        assert_eq!(normalized.report.associations_dropped_dangling, 0);
    }

    #[test]
    fn duplicate_ids_reject_the_batch_in_strict_mode() {
        let records = vec![
            listing(json!("MLA1"), json!("C1")),
            listing(json!("MLA2"), json!("C1")),
            listing(json!("MLA1"), json!("C2")),
        ];
        let err = RelationalNormalizer::new(true).normalize(&records).unwrap_err();
        assert_eq!(
            err,
            IntegrityError::DuplicateId {
                id: "MLA1".into(),
                first_index: 0,
                second_index: 2
            }
        );

        let lenient = RelationalNormalizer::new(false).normalize(&records).unwrap();
        assert_eq!(lenient.tables.products.len(), 3);
    }

    #[test]
    fn null_title_rejects_the_batch_in_strict_mode() {
        let mut record = listing(json!("MLA1"), json!("C1"));
        record["title"] = Value::Null;
        let records = vec![listing(json!("MLA0"), json!("C1")), record];

        let err = RelationalNormalizer::default().normalize(&records).unwrap_err();
        assert_eq!(err, IntegrityError::MissingField { index: 1, field: "title" });

        let lenient = RelationalNormalizer::new(false).normalize(&records).unwrap();
        assert_eq!(lenient.tables.products[1].title, None);
    }

    #[test]
    fn non_string_title_is_a_type_error_not_a_missing_field() {
        let mut numeric = listing(json!("MLA1"), json!("C1"));
        numeric["title"] = json!(4096);
        let mut nested = listing(json!("MLA2"), json!("C1"));
        nested["title"] = json!({ "es": "Chromecast" });
        let records = vec![numeric, nested];

        let err = RelationalNormalizer::default().normalize(&records).unwrap_err();
        assert_eq!(
            err,
            IntegrityError::WrongType {
                index: 0,
                field: "title",
                expected: "string",
                found: "4096".into(),
            }
        );

        let lenient = RelationalNormalizer::new(false).normalize(&records).unwrap();
        assert_eq!(lenient.tables.products[0].title.as_deref(), Some("4096"));
        assert_eq!(lenient.tables.products[1].title, None);
    }

    #[test]
    fn missing_id_is_fatal_even_when_lenient() {
        let mut record = listing(json!("MLA1"), json!("C1"));
        record.as_object_mut().unwrap().remove("id");
        let err = RelationalNormalizer::new(false).normalize(&[record]).unwrap_err();
        assert_eq!(err, IntegrityError::MissingField { index: 0, field: "id" });
    }

    #[test]
    fn unparsable_timestamp_is_fatal() {
        let mut record = listing(json!("MLA9"), json!("C1"));
        record["date_created"] = json!("last tuesday");
        let err = RelationalNormalizer::new(false).normalize(&[record]).unwrap_err();
        assert!(matches!(
            err,
            IntegrityError::InvalidTimestamp { ref id, ref value, .. } if id == "MLA9" && value == "last tuesday"
        ));
    }

    #[test]
    fn absent_timestamp_is_null() {
        let mut record = listing(json!("MLA9"), json!("C1"));
        record.as_object_mut().unwrap().remove("date_created");
        let normalized = RelationalNormalizer::default().normalize(&[record]).unwrap();
        assert_eq!(normalized.tables.products[0].created_at, None);
    }

    #[test]
    fn missing_reputation_gets_sentinel() {
        let mut record = listing(json!("MLA1"), json!("C1"));
        record["seller"]["seller_reputation"]["power_seller_status"] = Value::Null;
        let mut no_reputation = listing(json!("MLA2"), json!("C1"));
        no_reputation["seller"].as_object_mut().unwrap().remove("seller_reputation");

        let normalized = RelationalNormalizer::default()
            .normalize(&[record, no_reputation])
            .unwrap();
        let sellers = &normalized.tables.sellers;
        assert_eq!(sellers[0].reputation_tier, NO_REPUTATION);
        assert_eq!(sellers[0].transaction_count, Some(5000));
        assert_eq!(sellers[1].reputation_tier, NO_REPUTATION);
        assert_eq!(sellers[1].transaction_count, None);
    }

    #[test]
    fn records_without_seller_or_category_contribute_no_rows() {
        let mut bare = listing(json!("MLA3"), json!("C1"));
        bare["seller"] = Value::Null;
        bare.as_object_mut().unwrap().remove("category");

        let normalized = RelationalNormalizer::default()
            .normalize(&[listing(json!("MLA1"), json!("C1")), bare])
            .unwrap();
        assert_eq!(normalized.report.products, 2);
        assert_eq!(normalized.report.sellers, 1);
        assert_eq!(normalized.report.categories, 1);
        assert_eq!(normalized.report.product_categories, 1);
    }

    #[test]
    fn null_category_id_is_dropped_everywhere() {
        let records = vec![
            listing(json!("MLA1"), Value::Null),
            listing(json!("MLA2"), json!("C2")),
        ];
        let normalized = RelationalNormalizer::default().normalize(&records).unwrap();

        assert_eq!(normalized.tables.categories.len(), 1);
        assert_eq!(normalized.report.categories_dropped_null_id, 1);
        assert_eq!(
            normalized.tables.product_categories,
            vec![ProductCategory { product_id: "MLA2".into(), category_id: "C2".into() }]
        );
    }

    #[test]
    fn sellers_and_categories_are_not_deduplicated() {
        let records = vec![listing(json!("MLA1"), json!("C1")), listing(json!("MLA2"), json!("C1"))];
        let normalized = RelationalNormalizer::default().normalize(&records).unwrap();
        assert_eq!(normalized.tables.sellers.len(), 2);
        assert_eq!(normalized.tables.categories.len(), 2);
    }

    #[test]
    fn retain_known_categories_counts_dangling_rows() {
        let categories = vec![Category { category_id: "C1".into(), name: None }];
        let associations = vec![
            ProductCategory { product_id: "P1".into(), category_id: "C1".into() },
            ProductCategory { product_id: "P2".into(), category_id: "C9".into() },
            ProductCategory { product_id: "P3".into(), category_id: "C8".into() },
        ];
        let (kept, dropped) = retain_known_categories(associations, &categories);
        assert_eq!(dropped, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].product_id, "P1");
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_timestamp(&json!("2024-01-02T03:04:05Z")), Ok(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-02T00:04:05.000-03:00")), Ok(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-02T03:04:05.000+0000")), Ok(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-02 03:04:05")), Ok(expected));
        assert_eq!(
            parse_timestamp(&json!("2024-01-02")),
            Ok(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert!(parse_timestamp(&json!(1704164645)).is_err());
        assert!(parse_timestamp(&json!("2024-13-45")).is_err());
    }
}
