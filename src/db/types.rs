//! Value mappings between the TDS driver and JSON.
//!
//! Two directions: [`SqlParam`] binds into statement placeholders, and
//! result-set cells decode into JSON values. Decoding is lossy on purpose:
//! anything without a natural JSON shape becomes text (GUIDs, XML,
//! timestamps) or base64 (binary), matching what callers can round-trip.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use tiberius::{ColumnData, FromSql, Row, ToSql};

use crate::models::{ResultSet, RowMap, SqlParam};

impl ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            Self::Null => ColumnData::String(None),
            Self::Bool(b) => ColumnData::Bit(Some(*b)),
            Self::Int(i) => ColumnData::I64(Some(*i)),
            Self::Float(f) => ColumnData::F64(Some(*f)),
            Self::Text(s) => ColumnData::String(Some(s.as_str().into())),
            Self::Bytes(b) => ColumnData::Binary(Some(b.as_slice().into())),
        }
    }
}

/// Borrow a parameter slice as the driver's trait-object form.
pub fn bind_params(params: &[SqlParam]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

fn json_f64(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn decode_with<'a, T: FromSql<'a>>(
    data: &'a ColumnData<'static>,
    render: impl FnOnce(T) -> JsonValue,
) -> JsonValue {
    match T::from_sql(data) {
        Ok(Some(value)) => render(value),
        Ok(None) => JsonValue::Null,
        Err(err) => {
            tracing::warn!(error = %err, "failed to decode column value, emitting null");
            JsonValue::Null
        }
    }
}

/// Convert one result cell to JSON.
pub fn column_data_to_json(data: &ColumnData<'static>) -> JsonValue {
    match data {
        ColumnData::Bit(v) => v.map(JsonValue::Bool).unwrap_or(JsonValue::Null),
        ColumnData::U8(v) => v
            .map(|n| JsonValue::from(n as i64))
            .unwrap_or(JsonValue::Null),
        ColumnData::I16(v) => v
            .map(|n| JsonValue::from(n as i64))
            .unwrap_or(JsonValue::Null),
        ColumnData::I32(v) => v
            .map(|n| JsonValue::from(n as i64))
            .unwrap_or(JsonValue::Null),
        ColumnData::I64(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::F32(v) => v.map(|f| json_f64(f as f64)).unwrap_or(JsonValue::Null),
        ColumnData::F64(v) => v.map(json_f64).unwrap_or(JsonValue::Null),
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| json_f64(numeric_to_f64(n.value(), n.scale())))
            .unwrap_or(JsonValue::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Guid(v) => v
            .map(|g| JsonValue::String(g.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| JsonValue::String(STANDARD.encode(b.as_ref())))
            .unwrap_or(JsonValue::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| JsonValue::String(x.as_ref().to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Date(_) => decode_with::<NaiveDate>(data, |d| {
            JsonValue::String(d.format("%Y-%m-%d").to_string())
        }),
        ColumnData::Time(_) => decode_with::<NaiveTime>(data, |t| {
            JsonValue::String(t.format("%H:%M:%S%.f").to_string())
        }),
        ColumnData::SmallDateTime(_) | ColumnData::DateTime(_) | ColumnData::DateTime2(_) => {
            decode_with::<NaiveDateTime>(data, |dt| {
                JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            })
        }
        ColumnData::DateTimeOffset(_) => {
            decode_with::<DateTime<Utc>>(data, |dt| JsonValue::String(dt.to_rfc3339()))
        }
    }
}

/// Scale an i128 mantissa down by a decimal exponent.
fn numeric_to_f64(value: i128, scale: u8) -> f64 {
    value as f64 / 10f64.powi(scale as i32)
}

/// Convert a driver row to a name-to-value map, preserving column order.
///
/// Duplicate column names keep the last value, as a dictionary-shaped row
/// must.
pub fn row_to_map(row: &Row) -> RowMap {
    let mut map = RowMap::new();
    for (column, data) in row.cells() {
        map.insert(column.name().to_string(), column_data_to_json(data));
    }
    map
}

/// Convert one result set worth of rows, capturing column order from the
/// first row.
pub fn rows_to_result_set(rows: &[Row]) -> ResultSet {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        })
        .unwrap_or_default();
    ResultSet {
        columns,
        rows: rows.iter().map(row_to_map).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_binding_shapes() {
        assert_eq!(SqlParam::Null.to_sql(), ColumnData::String(None));
        assert_eq!(SqlParam::Bool(true).to_sql(), ColumnData::Bit(Some(true)));
        assert_eq!(SqlParam::Int(42).to_sql(), ColumnData::I64(Some(42)));
        assert_eq!(SqlParam::Float(1.5).to_sql(), ColumnData::F64(Some(1.5)));
        assert_eq!(
            SqlParam::Text("x".into()).to_sql(),
            ColumnData::String(Some("x".into()))
        );
        assert_eq!(
            SqlParam::Bytes(vec![1, 2]).to_sql(),
            ColumnData::Binary(Some(vec![1u8, 2].into()))
        );
    }

    #[test]
    fn test_bind_params_length() {
        let params = vec![SqlParam::Int(1), SqlParam::Text("a".into())];
        assert_eq!(bind_params(&params).len(), 2);
    }

    #[test]
    fn test_scalar_decoding() {
        assert_eq!(
            column_data_to_json(&ColumnData::I32(Some(7))),
            JsonValue::from(7)
        );
        assert_eq!(
            column_data_to_json(&ColumnData::Bit(Some(false))),
            JsonValue::Bool(false)
        );
        assert_eq!(
            column_data_to_json(&ColumnData::String(Some("hi".into()))),
            JsonValue::String("hi".into())
        );
        assert_eq!(column_data_to_json(&ColumnData::I64(None)), JsonValue::Null);
    }

    #[test]
    fn test_binary_decodes_to_base64() {
        let value = column_data_to_json(&ColumnData::Binary(Some(vec![0xde, 0xad].into())));
        assert_eq!(value, JsonValue::String("3q0=".into()));
    }

    #[test]
    fn test_numeric_scaling() {
        assert_eq!(numeric_to_f64(1850, 2), 18.5);
        assert_eq!(numeric_to_f64(-5, 1), -0.5);
        assert_eq!(numeric_to_f64(3, 0), 3.0);
    }

    #[test]
    fn test_guid_decodes_to_string() {
        let guid = uuid::Uuid::nil();
        let value = column_data_to_json(&ColumnData::Guid(Some(guid)));
        assert_eq!(
            value,
            JsonValue::String("00000000-0000-0000-0000-000000000000".into())
        );
    }
}
