//! Keyset (cursor) pagination.
//!
//! Instead of skipping rows with OFFSET, the page is restricted to rows
//! strictly after (or before) the key values of a boundary row. The keyset is
//! the request's sort list with the table's key column appended as the final
//! tie-breaker, so the ordering is total and pages never skip or repeat rows.
//!
//! # Comparators
//!
//! Each key picks its comparator from the scan direction and its own sort
//! direction:
//!
//! | direction | sort | comparator |
//! |-----------|------|------------|
//! | forward   | asc  | `>`        |
//! | forward   | desc | `<`        |
//! | backward  | asc  | `<`        |
//! | backward  | desc | `>`        |
//!
//! NULLs sit where the key's `nulls` placement puts them, or lowest when it
//! has none, and the seek condition honors the same placement.
//!
//! Backward scans run the reversed ordering so the database returns rows
//! nearest the cursor first; the rows are then reversed back into display
//! order.
//!
//! # Cursors
//!
//! One row beyond `limit` is fetched to learn whether more rows exist in the
//! scan direction. Going forward, `next` comes from the last item only when
//! that extra row came back, and `previous` comes from the first item only
//! when the request carried a cursor. Going backward the roles swap.

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use listing_params::{
   Bindings, Cursor, CursorDirection, NullsOrder, OrderExpr, SanitizedQuery, SortConfig,
   SortDirection, build_order, build_where, build_where_into, quote_identifier,
};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::database::Database;
use crate::decode::Row;
use crate::error::check_limit;
use crate::meta::{CursorSummary, ListResponse, PageSummary, assemble};
use crate::table::Table;
use crate::{Error, Result};

/// Where NULLs sit for `key`: the explicit placement, else SQLite's default
/// of NULL as the smallest value.
fn nulls_first(key: &SortConfig) -> bool {
   match key.nulls {
      Some(NullsOrder::First) => true,
      Some(NullsOrder::Last) => false,
      None => key.direction == SortDirection::Asc,
   }
}

/// Build the condition that seeks past `values` in `keys` order.
///
/// `keys` is the ordering actually scanned (already reversed for backward
/// scans). Placeholders continue from wherever `bindings` stands, so the
/// condition can follow the filter predicate. `not_null` reports columns
/// that can never hold NULL.
///
/// When every key runs the same way and no NULL can sort past the cursor, a
/// row-value comparison is enough: `("a", "b") > ($1, $2)`. Otherwise each
/// level pins the keys before it and steps past its own:
/// `("a" > $1) OR ("a" = $2 AND ("b" < $3 OR "b" IS NULL))`.
///
/// A NULL cursor value is pinned with `IS NULL`, and stepping past it only
/// exists when NULLs sort first (`IS NOT NULL`).
pub(crate) fn keyset_condition<F>(
   keys: &[SortConfig],
   values: &[JsonValue],
   not_null: F,
   bindings: &mut Bindings,
) -> String
where
   F: Fn(&str) -> bool,
{
   let Some(first) = keys.first() else {
      return "1".to_string();
   };
   let uniform = keys.iter().all(|k| k.direction == first.direction);
   let null_free = keys
      .iter()
      .zip(values)
      .all(|(key, value)| !value.is_null() && (not_null(key.column.as_str()) || nulls_first(key)));

   if uniform && null_free {
      let cols: Vec<String> = keys.iter().map(|k| quote_identifier(&k.column)).collect();
      let placeholders: Vec<String> = values.iter().map(|v| bindings.push(v.clone())).collect();
      let op = match first.direction {
         SortDirection::Asc => ">",
         SortDirection::Desc => "<",
      };

      return format!("({}) {} ({})", cols.join(", "), op, placeholders.join(", "));
   }

   let mut clauses = Vec::with_capacity(keys.len());
   for (level, (key, value)) in keys.iter().zip(values).enumerate() {
      // Nothing sorts after NULL when NULLs come last.
      if value.is_null() && !nulls_first(key) {
         continue;
      }

      let mut parts = Vec::with_capacity(level + 1);
      for (prior, prior_value) in keys[..level].iter().zip(values) {
         let column = quote_identifier(&prior.column);
         if prior_value.is_null() {
            parts.push(format!("{} IS NULL", column));
         } else {
            parts.push(format!("{} = {}", column, bindings.push(prior_value.clone())));
         }
      }

      let column = quote_identifier(&key.column);
      if value.is_null() {
         parts.push(format!("{} IS NOT NULL", column));
      } else {
         let op = match key.direction {
            SortDirection::Asc => ">",
            SortDirection::Desc => "<",
         };
         let step = format!("{} {} {}", column, op, bindings.push(value.clone()));
         if not_null(key.column.as_str()) || nulls_first(key) {
            parts.push(step);
         } else {
            parts.push(format!("({} OR {} IS NULL)", step, column));
         }
      }

      clauses.push(format!("({})", parts.join(" AND ")));
   }

   if clauses.is_empty() {
      return "0".to_string();
   }
   clauses.join(" OR ")
}

/// Read a row's keyset values as a cursor.
///
/// A single key encodes as a bare scalar, several keys as an array. NULLs in
/// sort columns are kept.
fn cursor_for(row: &Row, keys: &[SortConfig]) -> Result<Cursor> {
   let mut values = Vec::with_capacity(keys.len());
   for key in keys {
      let value = row
         .get(&key.column)
         .ok_or_else(|| Error::CursorColumnNotFound {
            column: key.column.clone(),
         })?;
      values.push(value.clone());
   }

   let value = match <[JsonValue; 1]>::try_from(values) {
      Ok([single]) => single,
      Err(values) => JsonValue::Array(values),
   };
   Ok(Cursor::encode(value)?)
}

/// Builder for one keyset-paginated page
pub struct CursorPageBuilder {
   db: Database,
   table: Table,
   query: SanitizedQuery,
   cursor: Option<Cursor>,
   direction: CursorDirection,
   limit: Option<u32>,
   include_total: bool,
   row_cap: Option<u32>,
}

impl CursorPageBuilder {
   pub fn new(db: Database, table: Table, query: SanitizedQuery) -> Self {
      Self {
         db,
         table,
         query,
         cursor: None,
         direction: CursorDirection::Forward,
         limit: None,
         include_total: false,
         row_cap: None,
      }
   }

   /// Fetch the page following `cursor`.
   pub fn after(mut self, cursor: Cursor) -> Self {
      self.cursor = Some(cursor);
      self.direction = CursorDirection::Forward;
      self
   }

   /// Fetch the page preceding `cursor`. Rows still come back in display order.
   pub fn before(mut self, cursor: Cursor) -> Self {
      self.cursor = Some(cursor);
      self.direction = CursorDirection::Backward;
      self
   }

   /// Set the position directly. Without a cursor, backward starts from the end.
   pub fn position(mut self, cursor: Option<Cursor>, direction: CursorDirection) -> Self {
      self.cursor = cursor;
      self.direction = direction;
      self
   }

   /// Page size. `None` returns every row past the cursor, without cursors.
   pub fn limit(mut self, limit: Option<u32>) -> Self {
      self.limit = limit;
      self
   }

   /// Also run `COUNT(*)` for `totalRecords` and `totalPages`.
   pub fn include_total(mut self, include_total: bool) -> Self {
      self.include_total = include_total;
      self
   }

   /// Most rows returned when no `limit` is set.
   pub fn row_cap(mut self, cap: Option<u32>) -> Self {
      self.row_cap = cap;
      self
   }

   /// Execute the paginated query and return a page of results
   pub async fn execute(self) -> Result<ListResponse> {
      check_limit(self.limit)?;

      let key = self.table.key();
      let display = build_order(&self.query)
         .unwrap_or_else(|| OrderExpr::by_key(key, SortDirection::Asc))
         .with_tiebreaker(key);
      let backward = self.direction == CursorDirection::Backward;
      let scan = if backward {
         display.reversed()
      } else {
         display.clone()
      };

      let mut bindings = Bindings::new();
      let mut conditions = Vec::new();
      if let Some(predicate) = build_where_into(&self.query, &mut bindings) {
         conditions.push(predicate);
      }
      if let Some(cursor) = &self.cursor {
         let values = cursor.key_values(scan.keys().len())?;
         conditions.push(format!(
            "({})",
            keyset_condition(
               scan.keys(),
               &values,
               |column| self.table.is_not_null(column),
               &mut bindings
            )
         ));
      }

      // Over-fetch by one: the extra row only signals that more exist.
      let fetch_limit = match (self.limit, self.row_cap) {
         (Some(limit), _) => Some(u64::from(limit) + 1),
         (None, Some(cap)) => Some(u64::from(cap) + 1),
         (None, None) => None,
      };
      let sql = self.table.select_sql(&conditions, &scan, fetch_limit, 0);
      let mut items = self.db.fetch_rows(&sql, bindings.into_values()).await?;

      let page_size = self.limit.or(self.row_cap).map(|n| n as usize);
      let has_more = match page_size {
         Some(size) if items.len() > size => {
            items.truncate(size);
            true
         }
         _ => false,
      };
      if has_more && self.limit.is_none() {
         warn!(table = self.table.name(), "unbounded list hit the row cap");
      }

      if backward {
         items.reverse();
      }

      let (next, previous) = match (self.limit, self.direction) {
         (None, _) => (None, None),
         (Some(_), CursorDirection::Forward) => (
            self.boundary(has_more, items.last(), display.keys())?,
            self.boundary(self.cursor.is_some(), items.first(), display.keys())?,
         ),
         (Some(_), CursorDirection::Backward) => (
            self.boundary(self.cursor.is_some(), items.last(), display.keys())?,
            self.boundary(has_more, items.first(), display.keys())?,
         ),
      };

      let total = if self.include_total {
         let predicate = build_where(&self.query);
         let (sql, values) = match predicate {
            Some(predicate) => (self.table.count_sql(Some(&predicate.sql)), predicate.values),
            None => (self.table.count_sql(None), Vec::new()),
         };
         Some(self.db.count_rows(&sql, values).await?)
      } else {
         None
      };

      let pagination_meta = assemble(PageSummary::Cursor(CursorSummary {
         current: self.cursor.as_ref().map(|cursor| cursor.token().to_string()),
         next: next.map(|cursor| cursor.token().to_string()),
         previous: previous.map(|cursor| cursor.token().to_string()),
         limit: self.limit,
         has_more,
         direction: self.direction,
         total,
      }));

      Ok(ListResponse {
         items,
         pagination_meta,
      })
   }

   fn boundary(&self, wanted: bool, row: Option<&Row>, keys: &[SortConfig]) -> Result<Option<Cursor>> {
      match row {
         Some(row) if wanted => cursor_for(row, keys).map(Some),
         _ => Ok(None),
      }
   }
}

impl IntoFuture for CursorPageBuilder {
   type Output = Result<ListResponse>;
   type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

   fn into_future(self) -> Self::IntoFuture {
      Box::pin(self.execute())
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   fn condition(keys: &[SortConfig], values: &[JsonValue]) -> (String, Vec<JsonValue>) {
      let mut bindings = Bindings::new();
      let sql = keyset_condition(keys, values, |_| true, &mut bindings);
      (sql, bindings.into_values())
   }

   /// Only `id` is NOT NULL.
   fn nullable_condition(keys: &[SortConfig], values: &[JsonValue]) -> (String, Vec<JsonValue>) {
      let mut bindings = Bindings::new();
      let sql = keyset_condition(keys, values, |column| column == "id", &mut bindings);
      (sql, bindings.into_values())
   }

   // ─── truth table ───

   #[test]
   fn forward_asc_uses_greater_than() {
      let order = OrderExpr::by_key("id", SortDirection::Asc);
      let (sql, values) = condition(order.keys(), &[json!(10)]);
      assert_eq!(sql, r#"("id") > ($1)"#);
      assert_eq!(values, vec![json!(10)]);
   }

   #[test]
   fn forward_desc_uses_less_than() {
      let order = OrderExpr::by_key("id", SortDirection::Desc);
      let (sql, _) = condition(order.keys(), &[json!(10)]);
      assert_eq!(sql, r#"("id") < ($1)"#);
   }

   #[test]
   fn backward_asc_uses_less_than() {
      let order = OrderExpr::by_key("id", SortDirection::Asc).reversed();
      let (sql, _) = condition(order.keys(), &[json!(10)]);
      assert_eq!(sql, r#"("id") < ($1)"#);
   }

   #[test]
   fn backward_desc_uses_greater_than() {
      let order = OrderExpr::by_key("id", SortDirection::Desc).reversed();
      let (sql, _) = condition(order.keys(), &[json!(10)]);
      assert_eq!(sql, r#"("id") > ($1)"#);
   }

   // ─── multi-key ───

   #[test]
   fn uniform_keys_use_row_values() {
      let order = OrderExpr::by_key("category", SortDirection::Asc).with_tiebreaker("id");
      let (sql, values) = condition(order.keys(), &[json!("tech"), json!(4)]);
      assert_eq!(sql, r#"("category", "id") > ($1, $2)"#);
      assert_eq!(values, vec![json!("tech"), json!(4)]);
   }

   #[test]
   fn mixed_keys_expand_to_or_form() {
      let keys = vec![
         SortConfig::asc("category"),
         SortConfig::desc("score"),
         SortConfig::asc("id"),
      ];
      let (sql, values) = condition(&keys, &[json!("tech"), json!(95), json!(42)]);

      assert_eq!(
         sql,
         r#"("category" > $1) OR ("category" = $2 AND "score" < $3) OR ("category" = $4 AND "score" = $5 AND "id" > $6)"#
      );
      assert_eq!(
         values,
         vec![
            json!("tech"),
            json!("tech"),
            json!(95),
            json!("tech"),
            json!(95),
            json!(42),
         ]
      );
   }

   #[test]
   fn mixed_keys_backward_flip_every_comparator() {
      let keys: Vec<SortConfig> = [SortConfig::asc("a"), SortConfig::desc("b")]
         .iter()
         .map(SortConfig::reversed)
         .collect();
      let (sql, _) = condition(&keys, &[json!(1), json!(2)]);
      assert_eq!(sql, r#"("a" < $1) OR ("a" = $2 AND "b" > $3)"#);
   }

   #[test]
   fn condition_numbers_after_filter_bindings() {
      let mut bindings = Bindings::after(2);
      let sql = keyset_condition(
         OrderExpr::by_key("id", SortDirection::Asc).keys(),
         &[json!(7)],
         |_| true,
         &mut bindings,
      );
      assert_eq!(sql, r#"("id") > ($3)"#);
   }

   // ─── nullable keys ───

   #[test]
   fn nulls_first_keeps_row_values() {
      let keys = [SortConfig::asc("nick"), SortConfig::asc("id")];
      let (sql, values) = nullable_condition(&keys, &[json!("b"), json!(4)]);
      assert_eq!(sql, r#"("nick", "id") > ($1, $2)"#);
      assert_eq!(values, vec![json!("b"), json!(4)]);
   }

   #[test]
   fn nulls_last_admits_null_rows_after_a_value() {
      let keys = [
         SortConfig::asc("nick").nulls(NullsOrder::Last),
         SortConfig::asc("id"),
      ];
      let (sql, values) = nullable_condition(&keys, &[json!("b"), json!(4)]);
      assert_eq!(
         sql,
         r#"(("nick" > $1 OR "nick" IS NULL)) OR ("nick" = $2 AND "id" > $3)"#
      );
      assert_eq!(values, vec![json!("b"), json!("b"), json!(4)]);
   }

   #[test]
   fn desc_defaults_to_nulls_last() {
      let keys = [SortConfig::desc("nick"), SortConfig::asc("id")];
      let (sql, _) = nullable_condition(&keys, &[json!("b"), json!(4)]);
      assert_eq!(
         sql,
         r#"(("nick" < $1 OR "nick" IS NULL)) OR ("nick" = $2 AND "id" > $3)"#
      );
   }

   #[test]
   fn null_cursor_with_nulls_first_steps_to_values() {
      let keys = [SortConfig::asc("nick"), SortConfig::asc("id")];
      let (sql, values) = nullable_condition(&keys, &[JsonValue::Null, json!(3)]);
      assert_eq!(
         sql,
         r#"("nick" IS NOT NULL) OR ("nick" IS NULL AND "id" > $1)"#
      );
      assert_eq!(values, vec![json!(3)]);
   }

   #[test]
   fn null_cursor_with_nulls_last_stays_among_nulls() {
      let keys = [SortConfig::desc("nick"), SortConfig::asc("id")];
      let (sql, values) = nullable_condition(&keys, &[JsonValue::Null, json!(3)]);
      assert_eq!(sql, r#"("nick" IS NULL AND "id" > $1)"#);
      assert_eq!(values, vec![json!(3)]);
   }

   // ─── cursor_for ───

   fn row(pairs: &[(&str, JsonValue)]) -> Row {
      pairs
         .iter()
         .map(|(k, v)| (k.to_string(), v.clone()))
         .collect()
   }

   #[test]
   fn single_key_cursor_is_a_scalar() {
      let cursor = cursor_for(&row(&[("id", json!(15))]), &[SortConfig::asc("id")]).unwrap();
      assert_eq!(cursor.value(), &json!(15));
   }

   #[test]
   fn multi_key_cursor_is_an_array() {
      let keys = [SortConfig::desc("score"), SortConfig::asc("id")];
      let cursor = cursor_for(&row(&[("id", json!(3)), ("score", json!(90))]), &keys).unwrap();
      assert_eq!(cursor.value(), &json!([90, 3]));
   }

   #[test]
   fn null_sort_values_stay_in_the_cursor() {
      let keys = [SortConfig::asc("score"), SortConfig::asc("id")];
      let cursor = cursor_for(&row(&[("id", json!(3)), ("score", JsonValue::Null)]), &keys).unwrap();
      assert_eq!(cursor.value(), &json!([null, 3]));
   }

   #[test]
   fn missing_keys_cannot_make_a_cursor() {
      let keys = [SortConfig::asc("score")];
      let err = cursor_for(&row(&[("id", json!(1))]), &keys).unwrap_err();
      assert!(matches!(err, Error::CursorColumnNotFound { .. }));
   }
}
