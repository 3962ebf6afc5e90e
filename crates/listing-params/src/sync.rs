//! Address-bar synchronization of list state.
//!
//! Maps between a flat string bag (a query string) and typed [`ListParams`]
//! using the same per-field rules as strict parsing. The difference is the
//! failure policy: a hand-edited or stale link never fails here. Each key
//! that doesn't validate falls back to its default, and malformed filter or
//! sort entries are dropped one by one.
//!
//! Defaults are never written, so shareable links stay minimal and setting
//! a field back to its default removes the key.

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;
use url::form_urlencoded;

use crate::error::Issues;
use crate::params::{
   CursorDirection, FilterCondition, ListParams, Pagination, PaginationMode, ParamRules,
   SearchConfig, SortConfig,
};
use crate::token::Cursor;
use crate::validate::{
   self, CURSOR, CURSOR_DIRECTION, FILTERS, INCLUDE_TOTAL, LIMIT, PAGE, SEARCH, SORTS,
};

/// An ordered, string-keyed parameter bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBag(IndexMap<String, String>);

impl QueryBag {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn from_pairs<I, K, V>(pairs: I) -> Self
   where
      I: IntoIterator<Item = (K, V)>,
      K: Into<String>,
      V: Into<String>,
   {
      Self(
         pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
      )
   }

   /// Parse an `application/x-www-form-urlencoded` string. A leading `?` is ignored.
   ///
   /// Repeated keys keep the last value.
   pub fn parse(query: &str) -> Self {
      let query = query.strip_prefix('?').unwrap_or(query);
      Self(
         form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
      )
   }

   /// Render as an `application/x-www-form-urlencoded` string.
   pub fn to_query_string(&self) -> String {
      form_urlencoded::Serializer::new(String::new())
         .extend_pairs(self.0.iter())
         .finish()
   }

   pub fn get(&self, key: &str) -> Option<&str> {
      self.0.get(key).map(String::as_str)
   }

   pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
      self.0.insert(key.into(), value.into());
   }

   pub fn remove(&mut self, key: &str) -> Option<String> {
      self.0.shift_remove(key)
   }

   pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
      self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
   }

   pub fn len(&self) -> usize {
      self.0.len()
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }
}

/// What the synchronizer treats as "not worth writing down".
#[derive(Debug, Clone, Default)]
pub struct SyncDefaults {
   /// Page size used when the bag names none.
   ///
   /// Default: `None` (unbounded)
   pub limit: Option<u32>,

   /// Limits and default mode shared with the server.
   pub rules: ParamRules,
}

/// Read a bag leniently. Never fails.
pub fn read_params(bag: &QueryBag, defaults: &SyncDefaults) -> ListParams {
   let mut ignored = Issues::default();
   let obj = validate::bag_to_object(bag, &mut ignored);
   report_dropped("bag", ignored);

   let pagination = read_pagination(&obj, &defaults.rules);

   ListParams {
      pagination,
      limit: lenient(&obj, LIMIT, |v, issues| {
         validate::parse_limit(v, &defaults.rules, issues)
      })
      .or(defaults.limit),
      filters: read_entries(&obj, FILTERS, validate::parse_filter),
      sorts: read_entries(&obj, SORTS, validate::parse_sort),
      search: lenient(&obj, SEARCH, validate::parse_search),
      include_total: lenient(&obj, INCLUDE_TOTAL, validate::parse_include_total).unwrap_or(false),
   }
}

/// Write params into a bag, omitting every default.
pub fn write_params(params: &ListParams, defaults: &SyncDefaults) -> QueryBag {
   let mut bag = QueryBag::new();

   match &params.pagination {
      Pagination::Offset { page } => {
         if *page > 1 {
            bag.insert(PAGE, page.to_string());
         } else if defaults.rules.default_mode != PaginationMode::Offset {
            // Nothing else would tell a reader this is an offset listing.
            bag.insert(PAGE, "1");
         }
      }
      Pagination::Cursor { cursor, direction } => {
         if let Some(cursor) = cursor {
            bag.insert(CURSOR, cursor.token());
         }
         let mode_is_implicit = cursor.is_some() || defaults.rules.default_mode == PaginationMode::Cursor;
         if *direction != CursorDirection::Forward || !mode_is_implicit {
            bag.insert(CURSOR_DIRECTION, direction_name(*direction));
         }
      }
   }

   if let Some(limit) = params.limit
      && params.limit != defaults.limit
   {
      bag.insert(LIMIT, limit.to_string());
   }
   if !params.filters.is_empty() {
      bag.insert(FILTERS, to_json_string(&params.filters));
   }
   if !params.sorts.is_empty() {
      bag.insert(SORTS, to_json_string(&params.sorts));
   }
   if let Some(search) = &params.search {
      bag.insert(SEARCH, to_json_string(search));
   }
   if params.include_total {
      bag.insert(INCLUDE_TOTAL, "true");
   }

   bag
}

/// Typed list state kept in step with its serialized form.
///
/// Setters follow list-UI expectations: anything that changes which rows
/// match, or how many fit on a page, returns to the first page.
#[derive(Debug, Clone)]
pub struct ListState {
   params: ListParams,
   defaults: SyncDefaults,
}

impl ListState {
   pub fn new(defaults: SyncDefaults) -> Self {
      Self {
         params: default_params(&defaults),
         defaults,
      }
   }

   pub fn from_bag(bag: &QueryBag, defaults: SyncDefaults) -> Self {
      Self {
         params: read_params(bag, &defaults),
         defaults,
      }
   }

   pub fn from_query_string(query: &str, defaults: SyncDefaults) -> Self {
      Self::from_bag(&QueryBag::parse(query), defaults)
   }

   pub fn params(&self) -> &ListParams {
      &self.params
   }

   pub fn to_bag(&self) -> QueryBag {
      write_params(&self.params, &self.defaults)
   }

   pub fn to_query_string(&self) -> String {
      self.to_bag().to_query_string()
   }

   pub fn set_page(&mut self, page: i64) {
      self.params.pagination = Pagination::Offset { page };
   }

   pub fn set_cursor(&mut self, cursor: Option<Cursor>, direction: CursorDirection) {
      self.params.pagination = Pagination::Cursor { cursor, direction };
   }

   /// `None` restores the default page size.
   pub fn set_limit(&mut self, limit: Option<u32>) {
      self.params.limit = match limit {
         Some(limit) if limit == 0 || limit > self.defaults.rules.max_limit => {
            debug!(limit, "ignoring out-of-range limit");
            self.defaults.limit
         }
         Some(limit) => Some(limit),
         None => self.defaults.limit,
      };
      self.rewind();
   }

   /// Malformed entries are dropped.
   pub fn set_filters(&mut self, filters: Vec<FilterCondition>) {
      self.params.filters = filters
         .into_iter()
         .filter(|filter| validate::validate_shapes(std::slice::from_ref(filter), &[], None).is_ok())
         .collect();
      self.rewind();
   }

   pub fn set_sorts(&mut self, sorts: Vec<SortConfig>) {
      self.params.sorts = sorts
         .into_iter()
         .filter(|sort| validate::validate_shapes(&[], std::slice::from_ref(sort), None).is_ok())
         .collect();
      self.rewind();
   }

   /// A search with an empty term clears the search.
   pub fn set_search(&mut self, search: Option<SearchConfig>) {
      self.params.search =
         search.filter(|search| validate::validate_shapes(&[], &[], Some(search)).is_ok());
      self.rewind();
   }

   pub fn set_include_total(&mut self, include_total: bool) {
      self.params.include_total = include_total;
   }

   /// Back to defaults for everything.
   pub fn reset(&mut self) {
      self.params = default_params(&self.defaults);
   }

   fn rewind(&mut self) {
      self.params.pagination = Pagination::first_page(self.params.pagination.mode());
   }
}

fn default_params(defaults: &SyncDefaults) -> ListParams {
   ListParams {
      pagination: Pagination::first_page(defaults.rules.default_mode),
      limit: defaults.limit,
      ..Default::default()
   }
}

fn direction_name(direction: CursorDirection) -> &'static str {
   match direction {
      CursorDirection::Forward => "forward",
      CursorDirection::Backward => "backward",
   }
}

fn to_json_string<T: serde::Serialize>(value: &T) -> String {
   serde_json::to_string(value).unwrap_or_default()
}

fn report_dropped(key: &str, issues: Issues) {
   for issue in issues.into_vec() {
      debug!(key, path = %issue.path, message = %issue.message, "discarding malformed parameter");
   }
}

/// Run a strict field parser; on any issue, forget the field.
fn lenient<T>(
   obj: &Map<String, JsonValue>,
   key: &str,
   parse: impl FnOnce(&JsonValue, &mut Issues) -> Option<T>,
) -> Option<T> {
   let value = obj.get(key).filter(|v| !v.is_null())?;
   let mut issues = Issues::default();
   let parsed = parse(value, &mut issues);

   if issues.is_empty() {
      parsed
   } else {
      report_dropped(key, issues);
      None
   }
}

/// Parse an array field entry by entry, keeping the entries that validate.
fn read_entries<T>(
   obj: &Map<String, JsonValue>,
   key: &str,
   parse: fn(&JsonValue, &str, &mut Issues) -> Option<T>,
) -> Vec<T> {
   let Some(entries) = obj.get(key).and_then(JsonValue::as_array) else {
      return Vec::new();
   };

   entries
      .iter()
      .enumerate()
      .filter_map(|(i, entry)| {
         let mut issues = Issues::default();
         let parsed = parse(entry, &format!("{}[{}]", key, i), &mut issues);
         if issues.is_empty() {
            parsed
         } else {
            report_dropped(key, issues);
            None
         }
      })
      .collect()
}

fn read_pagination(obj: &Map<String, JsonValue>, rules: &ParamRules) -> Pagination {
   let page = lenient(obj, PAGE, validate::parse_page);
   let cursor = lenient(obj, CURSOR, validate::parse_cursor);
   let direction = lenient(obj, CURSOR_DIRECTION, validate::parse_direction);

   match (page, cursor, direction) {
      (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
         debug!("page and cursor both present; falling back to the first page");
         Pagination::first_page(rules.default_mode)
      }
      (Some(page), None, None) => Pagination::Offset { page },
      (None, cursor, Some(direction)) => Pagination::Cursor { cursor, direction },
      (None, Some(cursor), None) => Pagination::Cursor {
         cursor: Some(cursor),
         direction: CursorDirection::Forward,
      },
      (None, None, None) => Pagination::first_page(rules.default_mode),
   }
}
