//! The list engine: parameters in, `{ items, pagination_meta }` out.

use std::future::Future;

use listing_params::{ListParams, Pagination, QueryBag, ValidationError, sanitize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::EngineConfig;
use crate::cursor::CursorPageBuilder;
use crate::database::Database;
use crate::meta::ListResponse;
use crate::offset::OffsetPageBuilder;
use crate::table::Table;
use crate::{Error, Result};

/// Serves list requests against one database.
///
/// Holds no per-request state: any number of requests may run concurrently
/// on one engine (or on clones of it).
///
/// # Example
///
/// ```no_run
/// use serde_json::json;
/// use sqlx_sqlite_listing::{Database, EngineConfig, ListEngine};
///
/// # async fn example() -> sqlx_sqlite_listing::Result<()> {
/// let db = Database::connect("app.db", None).await?;
/// let engine = ListEngine::new(db, EngineConfig::default());
/// let users = engine.table("users").await?;
///
/// let response = engine
///    .list_json(
///       &users,
///       &json!({
///          "page": 1,
///          "limit": 10,
///          "filters": [{"column": "status", "operator": "eq", "value": "active"}],
///          "sorts": [{"column": "name", "direction": "asc"}],
///       }),
///    )
///    .await?;
///
/// println!("{} of {:?}", response.items.len(), response.pagination_meta.total_records);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ListEngine {
   db: Database,
   config: EngineConfig,
}

impl ListEngine {
   pub fn new(db: Database, config: EngineConfig) -> Self {
      Self { db, config }
   }

   pub fn database(&self) -> &Database {
      &self.db
   }

   pub fn config(&self) -> &EngineConfig {
      &self.config
   }

   /// Introspect `name` into a listable table.
   pub async fn table(&self, name: &str) -> Result<Table> {
      Table::introspect(&self.db, name).await
   }

   /// Strictly parse a JSON request body, then list.
   pub async fn list_json(&self, table: &Table, raw: &JsonValue) -> Result<ListResponse> {
      let params = ListParams::from_json(raw, &self.config.rules)?;
      self.list(table, &params).await
   }

   /// Strictly parse a query-string bag, then list.
   pub async fn list_query(&self, table: &Table, bag: &QueryBag) -> Result<ListResponse> {
      let params = ListParams::from_query(bag, &self.config.rules)?;
      self.list(table, &params).await
   }

   /// Serve one list request.
   ///
   /// Shapes are re-validated (typed params may not have come through a
   /// parser), unknown columns are dropped, and the request is routed to the
   /// offset or cursor engine. Nothing is queried when validation fails.
   pub async fn list(&self, table: &Table, params: &ListParams) -> Result<ListResponse> {
      if let Some(limit) = params.limit
         && limit > self.config.rules.max_limit
      {
         return Err(Error::Params(
            ValidationError::single(
               "limit",
               format!("must not exceed {}", self.config.rules.max_limit),
            )
            .into(),
         ));
      }

      let query = sanitize(
         &params.filters,
         &params.sorts,
         params.search.as_ref(),
         table.columns(),
      )?;
      debug!(
         table = table.name(),
         mode = ?params.pagination.mode(),
         filters = query.filters().len(),
         sorts = query.sorts().len(),
         "listing"
      );

      match &params.pagination {
         Pagination::Offset { page } => {
            OffsetPageBuilder::new(self.db.clone(), table.clone(), query)
               .page(*page)
               .limit(params.limit)
               .row_cap(self.config.unbounded_row_cap)
               .await
         }
         Pagination::Cursor { cursor, direction } => {
            CursorPageBuilder::new(self.db.clone(), table.clone(), query)
               .position(cursor.clone(), *direction)
               .limit(params.limit)
               .include_total(params.include_total)
               .row_cap(self.config.unbounded_row_cap)
               .await
         }
      }
   }

   /// [`list`](Self::list), abandoned with [`Error::Cancelled`] if `signal`
   /// completes first.
   ///
   /// The in-flight query is dropped, which cancels it.
   pub async fn list_until<F>(
      &self,
      table: &Table,
      params: &ListParams,
      signal: F,
   ) -> Result<ListResponse>
   where
      F: Future<Output = ()>,
   {
      tokio::select! {
         result = self.list(table, params) => result,
         () = signal => {
            debug!(table = table.name(), "list request cancelled");
            Err(Error::Cancelled)
         }
      }
   }
}
