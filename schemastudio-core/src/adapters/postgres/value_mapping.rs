//! JSON to PostgreSQL value mapping.
//!
//! Parameters arrive as JSON and bind by their JSON shape; result columns
//! are decoded by their PostgreSQL type name into JSON values.

use crate::error::StudioError;
use crate::models::Row;
use crate::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Number, Value as JsonValue};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo, PgValueFormat};
use sqlx::query::Query;
use sqlx::types::BigDecimal;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef};

/// A NULL parameter with no declared type, so the server infers one from
/// the surrounding expression.
#[derive(Debug, Clone, Copy)]
pub struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> std::result::Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Binds one JSON value as the next positional parameter.
///
/// | JSON | PostgreSQL |
/// |---|---|
/// | null | untyped NULL |
/// | bool | `bool` |
/// | integer | `int8` |
/// | other number | `float8` |
/// | string | `text` |
/// | array, object | `jsonb` |
pub fn bind_json<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &JsonValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        JsonValue::Null => query.bind(UntypedNull),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        JsonValue::String(s) => query.bind(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => query.bind(sqlx::types::Json(value.clone())),
    }
}

/// Decodes a result row into an ordered JSON map.
///
/// Columns keep the driver's order. When two columns share a name the later
/// value replaces the earlier one in the earlier position.
///
/// # Errors
/// Returns [`StudioError::QueryExecution`] for a column whose type has no
/// JSON mapping or whose value fails to decode.
pub fn row_to_json(row: &PgRow) -> Result<Row> {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name().to_ascii_uppercase();
        let value = decode_column(row, index, &type_name).map_err(|e| match e {
            DecodeFailure::Unsupported => StudioError::query_rejected(format!(
                "Column '{}' has unsupported type {}; cast it in the query (for example {}::text)",
                column.name(),
                type_name,
                column.name()
            )),
            DecodeFailure::Driver(source) => {
                StudioError::query_failed(format!("Failed to decode column '{}'", column.name()), source)
            }
        })?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

enum DecodeFailure {
    Unsupported,
    Driver(sqlx::Error),
}

impl From<sqlx::Error> for DecodeFailure {
    fn from(error: sqlx::Error) -> Self {
        Self::Driver(error)
    }
}

fn decode_column(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> std::result::Result<JsonValue, DecodeFailure> {
    let value = match type_name {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(index)?, JsonValue::Bool),
        "INT2" => opt(row.try_get::<Option<i16>, _>(index)?, JsonValue::from),
        "INT4" => opt(row.try_get::<Option<i32>, _>(index)?, JsonValue::from),
        "INT8" => opt(row.try_get::<Option<i64>, _>(index)?, JsonValue::from),
        "OID" => opt(row.try_get::<Option<Oid>, _>(index)?, |oid| JsonValue::from(oid.0)),
        "FLOAT4" => opt(row.try_get::<Option<f32>, _>(index)?, |f| float(f64::from(f))),
        "FLOAT8" => opt(row.try_get::<Option<f64>, _>(index)?, float),
        "NUMERIC" => numeric(row, index)?,
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => opt(
            row.try_get_unchecked::<Option<String>, _>(index)?,
            JsonValue::String,
        ),
        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)?
            .unwrap_or(JsonValue::Null),
        "UUID" => opt(row.try_get::<Option<uuid::Uuid>, _>(index)?, |u| {
            JsonValue::String(u.to_string())
        }),
        "TIMESTAMPTZ" => opt(
            row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?,
            |ts| JsonValue::String(ts.to_rfc3339()),
        ),
        "TIMESTAMP" => opt(
            row.try_get::<Option<chrono::NaiveDateTime>, _>(index)?,
            |ts| JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        ),
        "DATE" => opt(row.try_get::<Option<chrono::NaiveDate>, _>(index)?, |d| {
            JsonValue::String(d.to_string())
        }),
        "TIME" => opt(row.try_get::<Option<chrono::NaiveTime>, _>(index)?, |t| {
            JsonValue::String(t.to_string())
        }),
        "BYTEA" => opt(row.try_get::<Option<Vec<u8>>, _>(index)?, |bytes| {
            JsonValue::String(format!("base64:{}", BASE64.encode(bytes)))
        }),
        "BOOL[]" => array(row.try_get::<Option<Vec<Option<bool>>>, _>(index)?, JsonValue::Bool),
        "INT2[]" => array(row.try_get::<Option<Vec<Option<i16>>>, _>(index)?, JsonValue::from),
        "INT4[]" => array(row.try_get::<Option<Vec<Option<i32>>>, _>(index)?, JsonValue::from),
        "INT8[]" => array(row.try_get::<Option<Vec<Option<i64>>>, _>(index)?, JsonValue::from),
        "FLOAT4[]" => array(row.try_get::<Option<Vec<Option<f32>>>, _>(index)?, |f| {
            float(f64::from(f))
        }),
        "FLOAT8[]" => array(row.try_get::<Option<Vec<Option<f64>>>, _>(index)?, float),
        "NUMERIC[]" => array(
            row.try_get::<Option<Vec<Option<BigDecimal>>>, _>(index)?,
            |d| JsonValue::String(d.normalized().to_plain_string()),
        ),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "BPCHAR[]" | "NAME[]" => array(
            row.try_get_unchecked::<Option<Vec<Option<String>>>, _>(index)?,
            JsonValue::String,
        ),
        "UUID[]" => array(row.try_get::<Option<Vec<Option<uuid::Uuid>>>, _>(index)?, |u| {
            JsonValue::String(u.to_string())
        }),
        "TIMESTAMPTZ[]" => array(
            row.try_get::<Option<Vec<Option<chrono::DateTime<chrono::Utc>>>>, _>(index)?,
            |ts| JsonValue::String(ts.to_rfc3339()),
        ),
        "DATE[]" => array(row.try_get::<Option<Vec<Option<chrono::NaiveDate>>>, _>(index)?, |d| {
            JsonValue::String(d.to_string())
        }),
        _ => return Err(DecodeFailure::Unsupported),
    };
    Ok(value)
}

/// Exact decimal text for a NUMERIC column at its declared display scale,
/// including the special values the decimal type cannot hold.
fn numeric(row: &PgRow, index: usize) -> std::result::Result<JsonValue, DecodeFailure> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }
    if matches!(raw.format(), PgValueFormat::Text) {
        let text = raw.as_str().map_err(sqlx::Error::Decode)?;
        return Ok(JsonValue::String(text.to_string()));
    }

    let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
    let (sign, dscale) = numeric_header(bytes)
        .ok_or_else(|| sqlx::Error::Decode("truncated numeric value".into()))?;
    if let Some(label) = numeric_sign_label(sign) {
        return Ok(JsonValue::String(label.to_string()));
    }

    let value: BigDecimal = row.try_get(index)?;
    Ok(JsonValue::String(
        value.with_scale(i64::from(dscale)).to_plain_string(),
    ))
}

/// Sign and display scale from a binary NUMERIC header: four big-endian
/// words `ndigits, weight, sign, dscale`.
fn numeric_header(bytes: &[u8]) -> Option<(u16, u16)> {
    match bytes {
        [_, _, _, _, s0, s1, d0, d1, ..] => Some((
            u16::from_be_bytes([*s0, *s1]),
            u16::from_be_bytes([*d0, *d1]),
        )),
        _ => None,
    }
}

fn numeric_sign_label(sign: u16) -> Option<&'static str> {
    match sign {
        0xC000 => Some("NaN"),
        0xD000 => Some("Infinity"),
        0xF000 => Some("-Infinity"),
        _ => None,
    }
}

fn opt<T>(value: Option<T>, to_json: impl FnOnce(T) -> JsonValue) -> JsonValue {
    value.map_or(JsonValue::Null, to_json)
}

fn array<T>(values: Option<Vec<Option<T>>>, to_json: impl Fn(T) -> JsonValue) -> JsonValue {
    match values {
        Some(values) => JsonValue::Array(
            values
                .into_iter()
                .map(|v| v.map_or(JsonValue::Null, &to_json))
                .collect(),
        ),
        None => JsonValue::Null,
    }
}

/// JSON has no NaN or infinities; those become their PostgreSQL spelling.
fn float(value: f64) -> JsonValue {
    match Number::from_f64(value) {
        Some(n) => JsonValue::Number(n),
        None if value.is_nan() => JsonValue::String("NaN".to_string()),
        None if value.is_sign_positive() => JsonValue::String("Infinity".to_string()),
        None => JsonValue::String("-Infinity".to_string()),
    }
}
