//! SQLite database handle

use std::path::Path;

use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row as _, Sqlite};
use tracing::{debug, trace};

use crate::Result;
use crate::bind::bind_value;
use crate::config::DatabaseConfig;
use crate::decode::{Row, decode_rows};

/// A pooled SQLite database.
///
/// Cheap to clone; clones share the pool. Every list call takes the handle
/// explicitly, so several databases can be served side by side.
#[derive(Debug, Clone)]
pub struct Database {
   pool: Pool<Sqlite>,
}

impl Database {
   /// Open (creating if missing) the database file at `path`.
   pub async fn connect(path: impl AsRef<Path>, config: Option<DatabaseConfig>) -> Result<Self> {
      let config = config.unwrap_or_default();
      let path = path.as_ref();

      if let Some(parent) = path.parent()
         && !parent.as_os_str().is_empty()
      {
         std::fs::create_dir_all(parent)?;
      }

      let options = SqliteConnectOptions::new()
         .filename(path)
         .create_if_missing(true);

      let pool = SqlitePoolOptions::new()
         .max_connections(config.max_read_connections)
         .idle_timeout(config.idle_timeout)
         .connect_with(options)
         .await?;

      debug!(path = %path.display(), "opened database");
      Ok(Self { pool })
   }

   /// Wrap a pool opened elsewhere.
   pub fn from_pool(pool: Pool<Sqlite>) -> Self {
      Self { pool }
   }

   pub fn pool(&self) -> &Pool<Sqlite> {
      &self.pool
   }

   /// Close every pooled connection. Clones of this handle stop working too.
   pub async fn close(&self) {
      self.pool.close().await;
   }

   pub(crate) async fn fetch_rows(&self, sql: &str, values: Vec<JsonValue>) -> Result<Vec<Row>> {
      trace!(sql, binds = values.len(), "fetching rows");

      let mut q = sqlx::query(sql);
      for value in values {
         q = bind_value(q, value);
      }
      let rows = q.fetch_all(&self.pool).await?;
      decode_rows(rows)
   }

   pub(crate) async fn count_rows(&self, sql: &str, values: Vec<JsonValue>) -> Result<u64> {
      trace!(sql, binds = values.len(), "counting rows");

      let mut q = sqlx::query(sql);
      for value in values {
         q = bind_value(q, value);
      }
      let row = q.fetch_one(&self.pool).await?;
      let count: i64 = row.try_get(0)?;
      Ok(u64::try_from(count).unwrap_or_default())
   }
}
