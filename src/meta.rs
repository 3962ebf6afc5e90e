//! One pagination metadata shape for both engines.
//!
//! The engines describe what they fetched as a [`PageSummary`]; [`assemble`]
//! maps that to [`PaginationMeta`] without touching the database.

use listing_params::CursorDirection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::decode::Row;

/// A position: a page number in offset mode, a cursor token in cursor mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
   Page(u64),
   Cursor(String),
}

/// Pagination metadata returned with every list response.
///
/// Fields that don't apply to the mode are omitted. `limit` is always
/// present and `null` when the result set is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub current: Option<PageRef>,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub next: Option<PageRef>,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub previous: Option<PageRef>,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub total_records: Option<u64>,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub total_pages: Option<u64>,
   pub limit: Option<u32>,
   pub has_more: bool,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub direction: Option<CursorDirection>,
}

impl PaginationMeta {
   /// Token for the following page, in cursor mode.
   pub fn next_cursor(&self) -> Option<&str> {
      cursor_token(self.next.as_ref())
   }

   /// Token for the preceding page, in cursor mode.
   pub fn previous_cursor(&self) -> Option<&str> {
      cursor_token(self.previous.as_ref())
   }
}

fn cursor_token(page: Option<&PageRef>) -> Option<&str> {
   match page {
      Some(PageRef::Cursor(token)) => Some(token),
      _ => None,
   }
}

/// What an offset query fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetSummary {
   /// Normalized 1-indexed page
   pub page: u64,
   pub limit: Option<u32>,
   /// Rows matching the predicate
   pub total: u64,
   /// Rows on this page
   pub returned: u64,
}

/// What a cursor query fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSummary {
   /// The incoming token, if any
   pub current: Option<String>,
   pub next: Option<String>,
   pub previous: Option<String>,
   pub limit: Option<u32>,
   /// More rows exist in the scan direction
   pub has_more: bool,
   pub direction: CursorDirection,
   /// Only counted when the request asked for it
   pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSummary {
   Offset(OffsetSummary),
   Cursor(CursorSummary),
}

/// Map an engine's summary to the shared metadata shape.
pub fn assemble(summary: PageSummary) -> PaginationMeta {
   match summary {
      PageSummary::Offset(summary) => assemble_offset(summary),
      PageSummary::Cursor(summary) => assemble_cursor(summary),
   }
}

fn total_pages(total: u64, limit: Option<u32>) -> u64 {
   match limit {
      // Everything fits on one implicit page, even an empty one.
      None => 1,
      Some(limit) => total.div_ceil(u64::from(limit.max(1))),
   }
}

fn assemble_offset(summary: OffsetSummary) -> PaginationMeta {
   let OffsetSummary {
      page,
      limit,
      total,
      returned,
   } = summary;

   let total_pages = total_pages(total, limit);
   let has_more = match limit {
      Some(_) => page < total_pages,
      // Only when a row cap cut the unbounded set short.
      None => returned < total,
   };

   PaginationMeta {
      current: Some(PageRef::Page(page)),
      next: has_more.then(|| PageRef::Page(page + 1)),
      previous: (page > 1).then(|| PageRef::Page(page - 1)),
      total_records: Some(total),
      total_pages: Some(total_pages),
      limit,
      has_more,
      direction: None,
   }
}

fn assemble_cursor(summary: CursorSummary) -> PaginationMeta {
   PaginationMeta {
      current: summary.current.map(PageRef::Cursor),
      next: summary.next.map(PageRef::Cursor),
      previous: summary.previous.map(PageRef::Cursor),
      total_records: summary.total,
      total_pages: summary
         .total
         .map(|total| total_pages(total, summary.limit)),
      limit: summary.limit,
      has_more: summary.has_more,
      direction: Some(summary.direction),
   }
}

/// A page of items with its metadata: `{ items, pagination_meta }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T = Row> {
   pub items: Vec<T>,
   pub pagination_meta: PaginationMeta,
}

impl ListResponse<Row> {
   /// Deserialize every row into `T`.
   pub fn into_typed<T: DeserializeOwned>(self) -> Result<ListResponse<T>> {
      let items = self
         .items
         .into_iter()
         .map(|row| serde_json::to_value(row).and_then(serde_json::from_value))
         .collect::<std::result::Result<Vec<T>, _>>()?;

      Ok(ListResponse {
         items,
         pagination_meta: self.pagination_meta,
      })
   }
}
