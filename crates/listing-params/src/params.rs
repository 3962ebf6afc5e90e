//! Typed list-request parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::token::Cursor;

/// The closed set of filter operators a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
   Eq,
   Neq,
   Gt,
   Gte,
   Lt,
   Lte,
   /// Case-sensitive substring match
   Like,
   /// Case-insensitive substring match
   Ilike,
   In,
   NotIn,
   IsNull,
   IsNotNull,
   Between,
   NotBetween,
}

/// The value shape an operator requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
   /// One non-null string, number, or boolean
   Scalar,
   /// One string
   Text,
   /// A scalar or a non-empty array of scalars
   Set,
   /// An array of exactly two scalars `[low, high]`
   Range,
   /// The value is not read
   Ignored,
}

impl FilterOperator {
   pub fn value_shape(self) -> ValueShape {
      match self {
         FilterOperator::Eq
         | FilterOperator::Neq
         | FilterOperator::Gt
         | FilterOperator::Gte
         | FilterOperator::Lt
         | FilterOperator::Lte => ValueShape::Scalar,
         FilterOperator::Like | FilterOperator::Ilike => ValueShape::Text,
         FilterOperator::In | FilterOperator::NotIn => ValueShape::Set,
         FilterOperator::Between | FilterOperator::NotBetween => ValueShape::Range,
         FilterOperator::IsNull | FilterOperator::IsNotNull => ValueShape::Ignored,
      }
   }
}

/// One `column operator value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
   pub column: String,
   pub operator: FilterOperator,
   #[serde(default, skip_serializing_if = "JsonValue::is_null")]
   pub value: JsonValue,
}

impl FilterCondition {
   pub fn new(column: impl Into<String>, operator: FilterOperator, value: JsonValue) -> Self {
      Self {
         column: column.into(),
         operator,
         value,
      }
   }
}

/// Sort direction for an ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
   /// Ascending order (smallest first)
   #[default]
   Asc,
   /// Descending order (largest first)
   Desc,
}

impl SortDirection {
   /// Return the opposite sort direction.
   pub fn reversed(self) -> Self {
      match self {
         SortDirection::Asc => SortDirection::Desc,
         SortDirection::Desc => SortDirection::Asc,
      }
   }
}

/// Where NULLs land relative to other values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NullsOrder {
   First,
   Last,
}

impl NullsOrder {
   pub fn reversed(self) -> Self {
      match self {
         NullsOrder::First => NullsOrder::Last,
         NullsOrder::Last => NullsOrder::First,
      }
   }
}

/// One ordering key. Several compose left to right as tie-breakers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
   pub column: String,
   pub direction: SortDirection,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub nulls: Option<NullsOrder>,
}

impl SortConfig {
   /// Create an ascending sort key.
   pub fn asc(column: impl Into<String>) -> Self {
      Self {
         column: column.into(),
         direction: SortDirection::Asc,
         nulls: None,
      }
   }

   /// Create a descending sort key.
   pub fn desc(column: impl Into<String>) -> Self {
      Self {
         column: column.into(),
         direction: SortDirection::Desc,
         nulls: None,
      }
   }

   pub fn nulls(mut self, nulls: NullsOrder) -> Self {
      self.nulls = Some(nulls);
      self
   }

   /// The same key scanned in the opposite order.
   pub fn reversed(&self) -> Self {
      Self {
         column: self.column.clone(),
         direction: self.direction.reversed(),
         nulls: self.nulls.map(NullsOrder::reversed),
      }
   }
}

/// How a search term is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchMode {
   /// Any whitespace-separated word may match
   #[default]
   Any,
   /// Every word must appear in the same column
   All,
   /// The whole term is one pattern
   Phrase,
}

/// Substring search across several columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
   pub columns: Vec<String>,
   pub term: String,
   #[serde(default)]
   pub mode: SearchMode,
}

impl SearchConfig {
   pub fn new<I, S>(columns: I, term: impl Into<String>, mode: SearchMode) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      Self {
         columns: columns.into_iter().map(Into::into).collect(),
         term: term.into(),
         mode,
      }
   }

   /// The patterns to look for, according to the mode.
   pub fn patterns(&self) -> Vec<&str> {
      match self.mode {
         SearchMode::Phrase => {
            let phrase = self.term.trim();
            if phrase.is_empty() {
               Vec::new()
            } else {
               vec![phrase]
            }
         }
         SearchMode::Any | SearchMode::All => self.term.split_whitespace().collect(),
      }
   }
}

/// Scan direction relative to a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CursorDirection {
   #[default]
   Forward,
   Backward,
}

/// Which pagination engine serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaginationMode {
   #[default]
   Offset,
   Cursor,
}

/// Position within the result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Pagination {
   /// 1-indexed page; values `<= 0` behave as page 1.
   Offset { page: i64 },
   /// Keyset scan from `cursor` (first page when absent).
   Cursor {
      cursor: Option<Cursor>,
      direction: CursorDirection,
   },
}

impl Pagination {
   pub fn first_page(mode: PaginationMode) -> Self {
      match mode {
         PaginationMode::Offset => Pagination::Offset { page: 1 },
         PaginationMode::Cursor => Pagination::Cursor {
            cursor: None,
            direction: CursorDirection::Forward,
         },
      }
   }

   pub fn mode(&self) -> PaginationMode {
      match self {
         Pagination::Offset { .. } => PaginationMode::Offset,
         Pagination::Cursor { .. } => PaginationMode::Cursor,
      }
   }
}

impl Default for Pagination {
   fn default() -> Self {
      Pagination::first_page(PaginationMode::Offset)
   }
}

/// Normalize a client page number: anything below 1 is page 1.
pub fn normalize_page(page: i64) -> u64 {
   if page < 1 { 1 } else { page as u64 }
}

/// Rules shared by strict parsing and the query-string synchronizer.
#[derive(Debug, Clone)]
pub struct ParamRules {
   /// Largest page size a client may ask for.
   ///
   /// Default: 100
   pub max_limit: u32,

   /// Mode used when a request names neither a page nor a cursor.
   ///
   /// Default: offset
   pub default_mode: PaginationMode,
}

impl Default for ParamRules {
   fn default() -> Self {
      Self {
         max_limit: 100,
         default_mode: PaginationMode::Offset,
      }
   }
}

/// A complete, shape-validated list request.
///
/// Column names have not yet been checked against a table; see
/// [`sanitize`](crate::sanitize()).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
   pub pagination: Pagination,
   /// Page size; `None` returns the whole filtered set.
   pub limit: Option<u32>,
   pub filters: Vec<FilterCondition>,
   pub sorts: Vec<SortConfig>,
   pub search: Option<SearchConfig>,
   pub include_total: bool,
}

impl ListParams {
   pub fn offset(page: i64, limit: Option<u32>) -> Self {
      Self {
         pagination: Pagination::Offset { page },
         limit,
         ..Default::default()
      }
   }

   pub fn cursor(cursor: Option<Cursor>, direction: CursorDirection, limit: Option<u32>) -> Self {
      Self {
         pagination: Pagination::Cursor { cursor, direction },
         limit,
         ..Default::default()
      }
   }

   pub fn with_filters(mut self, filters: Vec<FilterCondition>) -> Self {
      self.filters = filters;
      self
   }

   pub fn with_sorts(mut self, sorts: Vec<SortConfig>) -> Self {
      self.sorts = sorts;
      self
   }

   pub fn with_search(mut self, search: SearchConfig) -> Self {
      self.search = Some(search);
      self
   }

   pub fn with_total(mut self) -> Self {
      self.include_total = true;
      self
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   // ─── serde names ───

   #[test]
   fn operators_use_camel_case_names() {
      let names: Vec<JsonValue> = [
         FilterOperator::Ilike,
         FilterOperator::NotIn,
         FilterOperator::IsNull,
         FilterOperator::IsNotNull,
         FilterOperator::NotBetween,
      ]
      .iter()
      .map(|op| serde_json::to_value(op).unwrap())
      .collect();

      assert_eq!(
         names,
         vec![
            json!("ilike"),
            json!("notIn"),
            json!("isNull"),
            json!("isNotNull"),
            json!("notBetween")
         ]
      );
   }

   #[test]
   fn sort_direction_round_trips() {
      let asc: SortDirection = serde_json::from_str("\"asc\"").unwrap();
      let desc: SortDirection = serde_json::from_str("\"desc\"").unwrap();
      assert_eq!(asc, SortDirection::Asc);
      assert_eq!(desc, SortDirection::Desc);
      assert_eq!(asc.reversed(), desc);
   }

   #[test]
   fn reversed_sort_flips_nulls_too() {
      let key = SortConfig::asc("score").nulls(NullsOrder::First);
      let reversed = key.reversed();
      assert_eq!(reversed.direction, SortDirection::Desc);
      assert_eq!(reversed.nulls, Some(NullsOrder::Last));
   }

   // ─── SearchConfig::patterns ───

   #[test]
   fn any_and_all_split_on_whitespace() {
      let search = SearchConfig::new(["name"], "  ab\tcd  ", SearchMode::Any);
      assert_eq!(search.patterns(), vec!["ab", "cd"]);

      let search = SearchConfig::new(["name"], "jo hn", SearchMode::All);
      assert_eq!(search.patterns(), vec!["jo", "hn"]);
   }

   #[test]
   fn phrase_keeps_the_whole_term() {
      let search = SearchConfig::new(["name"], " ab cd ", SearchMode::Phrase);
      assert_eq!(search.patterns(), vec!["ab cd"]);
   }

   // ─── normalize_page ───

   #[test]
   fn non_positive_pages_become_first_page() {
      assert_eq!(normalize_page(-4), 1);
      assert_eq!(normalize_page(0), 1);
      assert_eq!(normalize_page(1), 1);
      assert_eq!(normalize_page(7), 7);
   }
}
