//! SQLite row to JSON conversion

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Row as _, TypeInfo, Value, ValueRef};

use crate::{Error, Result};

/// One decoded row, keyed by column name in select order.
pub type Row = IndexMap<String, JsonValue>;

/// Convert one SQLite value by its storage class.
///
/// BLOBs become standard base64 strings.
pub(crate) fn to_json(value: SqliteValueRef<'_>) -> Result<JsonValue> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let type_name = value.type_info().name().to_string();
   let owned = ValueRef::to_owned(&value);

   let json = match type_name.as_str() {
      "INTEGER" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => {
         JsonValue::from(owned.try_decode::<i64>()?)
      }
      "REAL" | "NUMERIC" => {
         let number = owned.try_decode::<f64>()?;
         serde_json::Number::from_f64(number)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
      }
      "TEXT" | "DATE" | "TIME" | "DATETIME" => JsonValue::String(owned.try_decode::<String>()?),
      "BLOB" => JsonValue::String(STANDARD.encode(owned.try_decode::<Vec<u8>>()?)),
      other => return Err(Error::UnsupportedDatatype(other.to_string())),
   };

   Ok(json)
}

/// Decode fetched rows into ordered column maps.
pub(crate) fn decode_rows(rows: Vec<SqliteRow>) -> Result<Vec<Row>> {
   let mut values = Vec::with_capacity(rows.len());
   for row in rows {
      let mut value = IndexMap::with_capacity(row.columns().len());
      for (i, column) in row.columns().iter().enumerate() {
         let v = row.try_get_raw(i)?;
         value.insert(column.name().to_string(), to_json(v)?);
      }
      values.push(value);
   }
   Ok(values)
}
