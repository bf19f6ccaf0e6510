//! Row to JSON conversion for results fetched inside a transaction.
//!
//! Covers the scalar column categories unit-of-work code actually reads
//! back (integers, floats, booleans, text, JSON); anything else falls back
//! to a string decode, then null.

use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Json,
    Other,
}

/// Classify a database type name into a logical category.
fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "numeric"
    {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    TypeCategory::Other
}

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
}

macro_rules! impl_row_to_json {
    ($row:ty) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let category = categorize_type(col.type_info().name());
                        let value = match category {
                            // Width fallbacks cover backends with exact-width
                            // decodes (e.g. PostgreSQL INT4).
                            TypeCategory::Integer => self
                                .try_get::<Option<i64>, _>(idx)
                                .ok()
                                .flatten()
                                .map(JsonValue::from)
                                .or_else(|| {
                                    self.try_get::<Option<i32>, _>(idx)
                                        .ok()
                                        .flatten()
                                        .map(JsonValue::from)
                                })
                                .or_else(|| {
                                    self.try_get::<Option<i16>, _>(idx)
                                        .ok()
                                        .flatten()
                                        .map(JsonValue::from)
                                }),
                            TypeCategory::Float => self
                                .try_get::<Option<f64>, _>(idx)
                                .ok()
                                .flatten()
                                .map(JsonValue::from)
                                .or_else(|| {
                                    self.try_get::<Option<f32>, _>(idx)
                                        .ok()
                                        .flatten()
                                        .map(|v| JsonValue::from(f64::from(v)))
                                }),
                            TypeCategory::Boolean => self
                                .try_get::<Option<bool>, _>(idx)
                                .ok()
                                .flatten()
                                .map(JsonValue::from),
                            TypeCategory::Json => self
                                .try_get::<Option<JsonValue>, _>(idx)
                                .ok()
                                .flatten(),
                            TypeCategory::Other => None,
                        };
                        // Fall back to a string decode for text and
                        // anything the typed decode could not handle.
                        let value = value
                            .or_else(|| {
                                self.try_get::<Option<String>, _>(idx)
                                    .ok()
                                    .flatten()
                                    .map(JsonValue::String)
                            })
                            .unwrap_or(JsonValue::Null);
                        (col.name().to_string(), value)
                    })
                    .collect()
            }
        }
    };
}

impl_row_to_json!(SqliteRow);
impl_row_to_json!(PgRow);
impl_row_to_json!(MySqlRow);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_integers() {
        assert_eq!(categorize_type("INTEGER"), TypeCategory::Integer);
        assert_eq!(categorize_type("INT4"), TypeCategory::Integer);
        assert_eq!(categorize_type("bigserial"), TypeCategory::Integer);
        assert_eq!(categorize_type("TINYINT"), TypeCategory::Integer);
    }

    #[test]
    fn test_categorize_floats_and_bools() {
        assert_eq!(categorize_type("REAL"), TypeCategory::Float);
        assert_eq!(categorize_type("DOUBLE"), TypeCategory::Float);
        assert_eq!(categorize_type("BOOLEAN"), TypeCategory::Boolean);
    }

    #[test]
    fn test_categorize_fallback() {
        assert_eq!(categorize_type("TEXT"), TypeCategory::Other);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Other);
        assert_eq!(categorize_type("JSONB"), TypeCategory::Json);
    }
}
