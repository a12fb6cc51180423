use serde_json::{json, Value};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};

/// Read one column of an `AnyRow` into a `serde_json::Value`, using the
/// `information_schema.data_type` hint to pick the right variant.
///
/// MySQL/MariaDB return every non-native column as BLOB to `sqlx::AnyRow`
/// regardless of any SQL cast, so the runtime type decides whether to read
/// raw bytes or a typed value.
pub fn decode_column(row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value, sqlx::Error> {
    let anyrow_type = row.column(idx).type_info().name();
    if anyrow_type == "BLOB" {
        blob_to_json(row, idx, type_hint)
    } else {
        col_to_json(row, idx, type_hint)
    }
}

/// Read a column as String, handling MySQL's habit of returning catalog and
/// `SHOW` result strings as BLOB to sqlx AnyRow.
pub fn blob_or_string(row: &AnyRow, idx: usize) -> Result<String, sqlx::Error> {
    let type_name = row.column(idx).type_info().name();
    if type_name == "BLOB" {
        let bytes: Vec<u8> = row.try_get(idx)?;
        String::from_utf8(bytes).map_err(sqlx::Error::decode)
    } else {
        row.try_get(idx)
    }
}

/// Decode a BLOB column as UTF-8 text, then reinterpret using the type hint.
/// Everything the typed SELECT routes through CONVERT or HEX arrives this
/// way, so the bytes are expected to be valid UTF-8; anything else is a
/// decode error, never silently dropped.
///
/// DECIMAL/NUMERIC stay strings on purpose: the value is ferried back into a
/// DECIMAL column on the destination, and a float round-trip could alter it.
fn blob_to_json(row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value, sqlx::Error> {
    let bytes: Option<Vec<u8>> = row.try_get(idx)?;
    let Some(b) = bytes else {
        return Ok(Value::Null);
    };
    let s = String::from_utf8(b).map_err(sqlx::Error::decode)?;
    Ok(match type_hint.to_uppercase().as_str() {
        "JSON" => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        _ => Value::String(s),
    })
}

/// Decode a column whose AnyRow type is supported natively.
fn col_to_json(row: &AnyRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let v = match type_name.to_uppercase().as_str() {
        "INT" | "INTEGER" | "MEDIUMINT" | "SMALLINT" => row
            .try_get::<Option<i32>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "BIGINT" => row
            .try_get::<Option<i64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)?
            .map_or(Value::Null, |v| json!(v as f64)),

        "DOUBLE" => row
            .try_get::<Option<f64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(idx)?
            .map_or(Value::Null, Value::Bool),

        // Everything else: TEXT, VARCHAR, DATE, TIMESTAMP …
        _ => row
            .try_get::<Option<String>, _>(idx)?
            .map_or(Value::Null, Value::String),
    };
    Ok(v)
}
