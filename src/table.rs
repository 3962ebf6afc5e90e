//! Table handles: the column whitelist and key column for one table.

use std::sync::Arc;

use listing_params::{Columns, OrderExpr, quote_identifier, validate_identifier};
use sqlx::Row as _;
use tracing::debug;

use crate::database::Database;
use crate::{Error, Result};

const ROWID: &str = "rowid";

/// A listable table.
///
/// Holds the real column set (the whitelist every client column reference
/// is checked against) and the key column that makes orderings total.
/// Cheap to clone.
#[derive(Debug, Clone)]
pub struct Table {
   inner: Arc<TableDef>,
}

#[derive(Debug)]
struct TableDef {
   name: String,
   columns: Columns,
   // Columns declared NOT NULL, plus the key column.
   not_null: Columns,
   key: String,
}

impl Table {
   /// Build a table from a known column list.
   ///
   /// The key column is `id` when present, otherwise SQLite's `rowid`.
   pub fn new<I, S>(name: impl Into<String>, columns: I) -> Result<Self>
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      let name = name.into();
      validate_identifier(&name)?;

      let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
      let key = if columns.iter().any(|column| column == "id") {
         "id".to_string()
      } else {
         ROWID.to_string()
      };

      Ok(Self::build(name, columns, Vec::new(), key))
   }

   /// Read the column set and primary key from `PRAGMA table_info`.
   ///
   /// The key column is the first primary-key column, or `rowid` for tables
   /// without one.
   pub async fn introspect(db: &Database, name: &str) -> Result<Self> {
      validate_identifier(name)?;

      // PRAGMA table_info returns: cid, name, type, notnull, dflt_value, pk
      let pragma = format!("PRAGMA table_info({})", quote_identifier(name));
      let rows = sqlx::query(&pragma).fetch_all(db.pool()).await?;

      if rows.is_empty() {
         return Err(Error::UnknownTable(name.to_string()));
      }

      let mut columns = Vec::with_capacity(rows.len());
      let mut not_null = Vec::new();
      let mut pk_columns: Vec<(i64, String)> = Vec::new();
      for row in &rows {
         let column: String = row.try_get("name")?;
         let pk: i64 = row.try_get("pk")?;
         let notnull: i64 = row.try_get("notnull")?;
         if pk > 0 {
            pk_columns.push((pk, column.clone()));
         }
         if notnull != 0 {
            not_null.push(column.clone());
         }
         columns.push(column);
      }

      pk_columns.sort_by_key(|(position, _)| *position);
      let key = pk_columns
         .into_iter()
         .next()
         .map(|(_, column)| column)
         .unwrap_or_else(|| ROWID.to_string());

      debug!(table = name, key = %key, columns = columns.len(), "introspected table");
      Ok(Self::build(name.to_string(), columns, not_null, key))
   }

   /// Use `column` as the key column instead.
   ///
   /// The key is the cursor column and the final tie-breaker of every
   /// ordering, so it should be unique and non-null.
   pub fn with_key(self, column: &str) -> Result<Self> {
      if !self.inner.columns.contains(column) && column != ROWID {
         return Err(Error::UnknownKeyColumn {
            table: self.inner.name.clone(),
            column: column.to_string(),
         });
      }

      let columns = self.inner.columns.iter().map(str::to_string).collect();
      let not_null = self.inner.not_null.iter().map(str::to_string).collect();
      Ok(Self::build(
         self.inner.name.clone(),
         columns,
         not_null,
         column.to_string(),
      ))
   }

   pub fn name(&self) -> &str {
      &self.inner.name
   }

   /// The whitelist of columns clients may reference.
   pub fn columns(&self) -> &Columns {
      &self.inner.columns
   }

   pub fn key(&self) -> &str {
      &self.inner.key
   }

   /// Whether `column` can never hold NULL (declared NOT NULL, or the key).
   pub(crate) fn is_not_null(&self, column: &str) -> bool {
      self.inner.not_null.contains(column)
   }

   /// `SELECT` list and `FROM` target. A `rowid` key is selected explicitly
   /// so cursors can be read from the rows.
   pub(crate) fn select_from(&self) -> String {
      if self.inner.key == ROWID {
         format!(
            "SELECT rowid AS {}, * FROM {}",
            quote_identifier(ROWID),
            quote_identifier(&self.inner.name)
         )
      } else {
         format!("SELECT * FROM {}", quote_identifier(&self.inner.name))
      }
   }

   /// Full page query: `conditions` are AND'd, `offset` is only written when non-zero.
   pub(crate) fn select_sql(
      &self,
      conditions: &[String],
      order: &OrderExpr,
      limit: Option<u64>,
      offset: u64,
   ) -> String {
      let mut sql = self.select_from();
      if !conditions.is_empty() {
         sql = format!("{} WHERE {}", sql, conditions.join(" AND "));
      }
      sql = format!("{} {}", sql, order.to_sql());
      if let Some(limit) = limit {
         sql = format!("{} LIMIT {}", sql, limit);
         if offset > 0 {
            sql = format!("{} OFFSET {}", sql, offset);
         }
      }
      sql
   }

   pub(crate) fn count_sql(&self, predicate: Option<&str>) -> String {
      let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.inner.name));
      match predicate {
         Some(predicate) => format!("{} WHERE {}", sql, predicate),
         None => sql,
      }
   }

   fn build(name: String, mut columns: Vec<String>, mut not_null: Vec<String>, key: String) -> Self {
      if key == ROWID && !columns.iter().any(|column| column == ROWID) {
         columns.push(ROWID.to_string());
      }
      not_null.push(key.clone());

      Self {
         inner: Arc::new(TableDef {
            name,
            columns: columns.into_iter().collect(),
            not_null: not_null.into_iter().collect(),
            key,
         }),
      }
   }
}
