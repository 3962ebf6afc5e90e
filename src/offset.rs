//! Offset pagination.
//!
//! Pages are 1-indexed and the page size is the request's `limit`. A
//! `COUNT(*)` under the same predicate backs `totalRecords`, `totalPages`
//! and `hasMore`; the count and the page are separate queries, so under
//! concurrent writes the totals may be slightly stale relative to the items.

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use listing_params::{
   OrderExpr, SanitizedQuery, SortDirection, build_order, build_where, normalize_page,
};
use tracing::warn;

use crate::database::Database;
use crate::error::check_limit;
use crate::meta::{ListResponse, OffsetSummary, PageSummary, assemble};
use crate::table::Table;
use crate::Result;

/// Builder for one offset-paginated page
pub struct OffsetPageBuilder {
   db: Database,
   table: Table,
   query: SanitizedQuery,
   page: i64,
   limit: Option<u32>,
   row_cap: Option<u32>,
}

impl OffsetPageBuilder {
   pub fn new(db: Database, table: Table, query: SanitizedQuery) -> Self {
      Self {
         db,
         table,
         query,
         page: 1,
         limit: None,
         row_cap: None,
      }
   }

   /// 1-indexed page; anything below 1 is page 1.
   pub fn page(mut self, page: i64) -> Self {
      self.page = page;
      self
   }

   /// Page size. `None` returns the whole filtered set as one page.
   pub fn limit(mut self, limit: Option<u32>) -> Self {
      self.limit = limit;
      self
   }

   /// Most rows returned when no `limit` is set.
   pub fn row_cap(mut self, cap: Option<u32>) -> Self {
      self.row_cap = cap;
      self
   }

   /// Execute the page and count queries
   pub async fn execute(self) -> Result<ListResponse> {
      check_limit(self.limit)?;

      let key = self.table.key();
      let order = build_order(&self.query)
         .unwrap_or_else(|| OrderExpr::by_key(key, SortDirection::Asc))
         .with_tiebreaker(key);
      let predicate = build_where(&self.query);
      let (conditions, values) = match &predicate {
         Some(predicate) => (vec![predicate.sql.clone()], predicate.values.clone()),
         None => (Vec::new(), Vec::new()),
      };
      let count_sql = self
         .table
         .count_sql(predicate.as_ref().map(|predicate| predicate.sql.as_str()));

      let (page, items, total) = match self.limit {
         Some(limit) => {
            let page = normalize_page(self.page);
            let offset = (page - 1)
               .saturating_mul(u64::from(limit))
               .min(i64::MAX as u64);
            let sql = self
               .table
               .select_sql(&conditions, &order, Some(u64::from(limit)), offset);

            let items = self.db.fetch_rows(&sql, values.clone()).await?;
            let total = self.db.count_rows(&count_sql, values).await?;
            (page, items, total)
         }
         None => {
            // One implicit page; the requested page number has no meaning here.
            let fetch_limit = self.row_cap.map(|cap| u64::from(cap) + 1);
            let sql = self.table.select_sql(&conditions, &order, fetch_limit, 0);
            let mut items = self.db.fetch_rows(&sql, values.clone()).await?;

            let total = match self.row_cap {
               Some(cap) if items.len() > cap as usize => {
                  items.truncate(cap as usize);
                  warn!(table = self.table.name(), cap, "unbounded list hit the row cap");
                  self.db.count_rows(&count_sql, values).await?
               }
               _ => items.len() as u64,
            };
            (1, items, total)
         }
      };

      let pagination_meta = assemble(PageSummary::Offset(OffsetSummary {
         page,
         limit: self.limit,
         total,
         returned: items.len() as u64,
      }));

      Ok(ListResponse {
         items,
         pagination_meta,
      })
   }
}

impl IntoFuture for OffsetPageBuilder {
   type Output = Result<ListResponse>;
   type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

   fn into_future(self) -> Self::IntoFuture {
      Box::pin(self.execute())
   }
}
