use serde_json::Value as JsonValue;
use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;

/// Bind a JSON value with its natural SQLite storage class.
pub(crate) fn bind_value<'a>(
   query: Query<'a, Sqlite, SqliteArguments<'a>>,
   value: JsonValue,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
   match value {
      JsonValue::Null => query.bind(None::<i64>),
      JsonValue::Bool(flag) => query.bind(flag),
      JsonValue::String(text) => query.bind(text),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other => query.bind(other),
   }
}

