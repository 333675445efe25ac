//! Query parameter and result models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Default row limit for SELECT statements.
pub const DEFAULT_ROW_LIMIT: usize = 1000;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: usize = 10_000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum allowed query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u64 = 300;

/// Clamp a requested row limit into the allowed range.
pub fn effective_row_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_ROW_LIMIT)
}

/// Clamp a requested timeout into the allowed range.
pub fn effective_timeout(requested_secs: Option<u64>, default: Duration) -> Duration {
    match requested_secs {
        Some(secs) => Duration::from_secs(secs.clamp(1, MAX_QUERY_TIMEOUT_SECS)),
        None => default,
    }
}

/// A parameter value bound to a statement placeholder.
///
/// Serialized as a plain JSON value; binary data travels as base64 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SqlParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    #[schemars(with = "String")]
    Bytes(Vec<u8>),
}

impl SqlParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert a JSON value into a bindable parameter.
    ///
    /// Arrays and objects have no scalar binding; they fall back to their
    /// JSON text representation.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// One result row: column name to JSON value, in result-set column order.
pub type RowMap = serde_json::Map<String, JsonValue>;

/// A single result set with its column ordering.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<RowMap>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Result sets and recovered output parameters from a procedure call.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct ProcedureResult {
    pub result_sets: Vec<Vec<RowMap>>,
    /// Best-effort probe values; typically null (see executor docs).
    pub output_parameters: RowMap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_effective_row_limit_clamps() {
        assert_eq!(effective_row_limit(None, DEFAULT_ROW_LIMIT), 1000);
        assert_eq!(effective_row_limit(Some(50), DEFAULT_ROW_LIMIT), 50);
        assert_eq!(effective_row_limit(Some(0), DEFAULT_ROW_LIMIT), 1);
        assert_eq!(
            effective_row_limit(Some(1_000_000), DEFAULT_ROW_LIMIT),
            MAX_ROW_LIMIT
        );
    }

    #[test]
    fn test_effective_timeout_clamps() {
        let default = Duration::from_secs(30);
        assert_eq!(effective_timeout(None, default), default);
        assert_eq!(
            effective_timeout(Some(10), default),
            Duration::from_secs(10)
        );
        assert_eq!(
            effective_timeout(Some(10_000), default),
            Duration::from_secs(MAX_QUERY_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_param_from_json() {
        assert_eq!(SqlParam::from_json(&json!(null)), SqlParam::Null);
        assert_eq!(SqlParam::from_json(&json!(true)), SqlParam::Bool(true));
        assert_eq!(SqlParam::from_json(&json!(42)), SqlParam::Int(42));
        assert_eq!(SqlParam::from_json(&json!(2.5)), SqlParam::Float(2.5));
        assert_eq!(
            SqlParam::from_json(&json!("abc")),
            SqlParam::Text("abc".to_string())
        );
    }

    #[test]
    fn test_param_deserializes_untagged() {
        let p: SqlParam = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(p, SqlParam::Text("hello".to_string()));
        let p: SqlParam = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(p, SqlParam::Int(7));
    }

    #[test]
    fn test_bytes_serialize_to_base64() {
        let p = SqlParam::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let encoded = serde_json::to_string(&p).unwrap();
        assert_eq!(encoded, "\"3q2+7w==\"");
        // Untagged deserialization reads a string back as text; binary
        // values are constructed programmatically, not from JSON.
        let back: SqlParam = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back, SqlParam::Text("3q2+7w==".to_string()));
    }

    #[test]
    fn test_param_schema_models_bytes_as_string() {
        let schema = serde_json::to_value(schemars::schema_for!(SqlParam)).unwrap();
        assert!(schema.to_string().contains("\"string\""));
    }

    #[test]
    fn test_row_map_preserves_insertion_order() {
        let mut row = RowMap::new();
        row.insert("z".to_string(), json!(1));
        row.insert("a".to_string(), json!(2));
        let keys: Vec<_> = row.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
