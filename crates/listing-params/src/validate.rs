//! Structural validation of list parameters.
//!
//! Shapes are checked against a fixed schema before any column name is
//! looked at. A malformed shape is always reported (fail-closed); whether a
//! column actually exists is decided later by [`sanitize`](crate::sanitize()).
//!
//! The per-field parsers here are shared with the query-string synchronizer,
//! which runs them leniently and falls back to defaults instead of failing.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::Issues;
use crate::params::{
   CursorDirection, FilterCondition, FilterOperator, ListParams, Pagination, ParamRules,
   SearchConfig, SortConfig, ValueShape,
};
use crate::sync::QueryBag;
use crate::token::Cursor;
use crate::{Error, Result};

pub(crate) const PAGE: &str = "page";
pub(crate) const CURSOR: &str = "cursor";
pub(crate) const CURSOR_DIRECTION: &str = "cursorDirection";
pub(crate) const LIMIT: &str = "limit";
pub(crate) const FILTERS: &str = "filters";
pub(crate) const SORTS: &str = "sorts";
pub(crate) const SEARCH: &str = "search";
pub(crate) const INCLUDE_TOTAL: &str = "includeTotal";

impl ListParams {
   /// Strictly parse a JSON request body.
   ///
   /// Every structural issue is collected and returned together. Unknown
   /// top-level keys are ignored so the bag can share space with other
   /// request fields.
   pub fn from_json(raw: &JsonValue, rules: &ParamRules) -> Result<Self> {
      let mut issues = Issues::default();
      let params = match raw.as_object() {
         Some(obj) => parse_object(obj, rules, &mut issues),
         None => {
            issues.push("params", "must be an object");
            ListParams::default()
         }
      };
      issues.finish(params)
   }

   /// Strictly parse a flat string bag such as a decoded query string.
   ///
   /// `filters`, `sorts` and `search` are JSON-encoded inside the bag.
   pub fn from_query(bag: &QueryBag, rules: &ParamRules) -> Result<Self> {
      let mut issues = Issues::default();
      let obj = bag_to_object(bag, &mut issues);
      let params = parse_object(&obj, rules, &mut issues);
      issues.finish(params)
   }
}

/// Re-check the shape of already-typed filters, sorts and search.
///
/// Typed values built in code skip the JSON parsers, so the same rules are
/// applied here before they reach query construction.
pub fn validate_shapes(
   filters: &[FilterCondition],
   sorts: &[SortConfig],
   search: Option<&SearchConfig>,
) -> Result<()> {
   let mut issues = Issues::default();

   for (i, filter) in filters.iter().enumerate() {
      let path = format!("{}[{}]", FILTERS, i);
      check_column(&filter.column, &format!("{}.column", path), &mut issues);
      check_filter_value(
         filter.operator,
         &filter.value,
         &format!("{}.value", path),
         &mut issues,
      );
   }
   for (i, sort) in sorts.iter().enumerate() {
      check_column(
         &sort.column,
         &format!("{}[{}].column", SORTS, i),
         &mut issues,
      );
   }
   if let Some(search) = search {
      check_search(search, &mut issues);
   }

   issues.finish(())
}

fn present<'a>(obj: &'a Map<String, JsonValue>, key: &str) -> Option<&'a JsonValue> {
   obj.get(key).filter(|v| !v.is_null())
}

pub(crate) fn parse_object(
   obj: &Map<String, JsonValue>,
   rules: &ParamRules,
   issues: &mut Issues,
) -> ListParams {
   let page = present(obj, PAGE).and_then(|v| parse_page(v, issues));
   let cursor = present(obj, CURSOR).and_then(|v| parse_cursor(v, issues));
   let direction = present(obj, CURSOR_DIRECTION).and_then(|v| parse_direction(v, issues));

   let wants_page = present(obj, PAGE).is_some();
   let wants_cursor = present(obj, CURSOR).is_some() || present(obj, CURSOR_DIRECTION).is_some();
   if wants_page && wants_cursor {
      issues.push(PAGE, "cannot be combined with cursor or cursorDirection");
   }

   let pagination = if wants_cursor {
      Pagination::Cursor {
         cursor,
         direction: direction.unwrap_or_default(),
      }
   } else if wants_page {
      Pagination::Offset {
         page: page.unwrap_or(1),
      }
   } else {
      Pagination::first_page(rules.default_mode)
   };

   ListParams {
      pagination,
      limit: present(obj, LIMIT).and_then(|v| parse_limit(v, rules, issues)),
      filters: present(obj, FILTERS)
         .map(|v| parse_filters(v, issues))
         .unwrap_or_default(),
      sorts: present(obj, SORTS)
         .map(|v| parse_sorts(v, issues))
         .unwrap_or_default(),
      search: present(obj, SEARCH).and_then(|v| parse_search(v, issues)),
      include_total: present(obj, INCLUDE_TOTAL)
         .and_then(|v| parse_include_total(v, issues))
         .unwrap_or(false),
   }
}

/// Lift a flat string bag into the JSON shape the parsers expect.
///
/// Numbers and booleans that don't parse are kept as strings so the typed
/// checks report them against the right field.
pub(crate) fn bag_to_object(bag: &QueryBag, issues: &mut Issues) -> Map<String, JsonValue> {
   let mut obj = Map::new();

   for (key, raw) in bag.iter() {
      let value = match key {
         PAGE | LIMIT => raw
            .trim()
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(raw.to_string())),
         INCLUDE_TOTAL => match raw.trim() {
            "true" | "1" => JsonValue::Bool(true),
            "false" | "0" => JsonValue::Bool(false),
            other => JsonValue::String(other.to_string()),
         },
         FILTERS | SORTS | SEARCH => match serde_json::from_str::<JsonValue>(raw) {
            Ok(value) => value,
            Err(_) => {
               issues.push(key, "must be valid JSON");
               continue;
            }
         },
         CURSOR | CURSOR_DIRECTION => JsonValue::String(raw.to_string()),
         _ => continue,
      };
      obj.insert(key.to_string(), value);
   }

   obj
}

pub(crate) fn parse_page(value: &JsonValue, issues: &mut Issues) -> Option<i64> {
   match value.as_i64() {
      Some(page) => Some(page),
      None => {
         issues.push(PAGE, "must be an integer");
         None
      }
   }
}

pub(crate) fn parse_limit(value: &JsonValue, rules: &ParamRules, issues: &mut Issues) -> Option<u32> {
   match value.as_i64() {
      Some(limit) if limit <= 0 => {
         issues.push(LIMIT, "must be a positive integer");
         None
      }
      Some(limit) if limit > i64::from(rules.max_limit) => {
         issues.push(LIMIT, format!("must not exceed {}", rules.max_limit));
         None
      }
      Some(limit) => Some(limit as u32),
      None => {
         issues.push(LIMIT, "must be a positive integer");
         None
      }
   }
}

pub(crate) fn parse_cursor(value: &JsonValue, issues: &mut Issues) -> Option<Cursor> {
   let Some(token) = value.as_str() else {
      issues.push(CURSOR, "must be an opaque cursor token string");
      return None;
   };

   match Cursor::decode(token) {
      Ok(cursor) => Some(cursor),
      Err(Error::InvalidCursor(message)) => {
         issues.push(CURSOR, message);
         None
      }
      Err(other) => {
         issues.push(CURSOR, other.to_string());
         None
      }
   }
}

pub(crate) fn parse_direction(value: &JsonValue, issues: &mut Issues) -> Option<CursorDirection> {
   parse_enum(value, CURSOR_DIRECTION, "must be 'forward' or 'backward'", issues)
}

pub(crate) fn parse_include_total(value: &JsonValue, issues: &mut Issues) -> Option<bool> {
   match value.as_bool() {
      Some(flag) => Some(flag),
      None => {
         issues.push(INCLUDE_TOTAL, "must be a boolean");
         None
      }
   }
}

pub(crate) fn parse_filters(value: &JsonValue, issues: &mut Issues) -> Vec<FilterCondition> {
   let Some(entries) = value.as_array() else {
      issues.push(FILTERS, "must be an array");
      return Vec::new();
   };

   entries
      .iter()
      .enumerate()
      .filter_map(|(i, entry)| parse_filter(entry, &format!("{}[{}]", FILTERS, i), issues))
      .collect()
}

pub(crate) fn parse_filter(
   value: &JsonValue,
   path: &str,
   issues: &mut Issues,
) -> Option<FilterCondition> {
   let Some(obj) = value.as_object() else {
      issues.push(path, "must be an object");
      return None;
   };
   let before = issues.len();

   let column = parse_column(obj.get("column"), &format!("{}.column", path), issues);
   let operator = match obj.get("operator") {
      Some(JsonValue::String(name)) => match serde_json::from_value::<FilterOperator>(
         JsonValue::from(name.as_str()),
      ) {
         Ok(operator) => Some(operator),
         Err(_) => {
            issues.push(
               format!("{}.operator", path),
               format!("unsupported operator '{}'", name),
            );
            None
         }
      },
      Some(_) => {
         issues.push(format!("{}.operator", path), "must be a string");
         None
      }
      None => {
         issues.push(format!("{}.operator", path), "is required");
         None
      }
   };

   let value = obj.get("value").cloned().unwrap_or(JsonValue::Null);
   if let Some(operator) = operator {
      check_filter_value(operator, &value, &format!("{}.value", path), issues);
   }

   match (column, operator) {
      (Some(column), Some(operator)) if issues.len() == before => Some(FilterCondition {
         column,
         operator,
         value,
      }),
      _ => None,
   }
}

pub(crate) fn parse_sorts(value: &JsonValue, issues: &mut Issues) -> Vec<SortConfig> {
   let Some(entries) = value.as_array() else {
      issues.push(SORTS, "must be an array");
      return Vec::new();
   };

   entries
      .iter()
      .enumerate()
      .filter_map(|(i, entry)| parse_sort(entry, &format!("{}[{}]", SORTS, i), issues))
      .collect()
}

pub(crate) fn parse_sort(value: &JsonValue, path: &str, issues: &mut Issues) -> Option<SortConfig> {
   let Some(obj) = value.as_object() else {
      issues.push(path, "must be an object");
      return None;
   };
   let before = issues.len();

   let column = parse_column(obj.get("column"), &format!("{}.column", path), issues);
   let direction = match obj.get("direction") {
      Some(direction) => parse_enum(
         direction,
         &format!("{}.direction", path),
         "must be 'asc' or 'desc'",
         issues,
      ),
      None => {
         issues.push(format!("{}.direction", path), "is required");
         None
      }
   };
   let nulls = match obj.get("nulls") {
      Some(JsonValue::Null) | None => None,
      Some(nulls) => parse_enum(
         nulls,
         &format!("{}.nulls", path),
         "must be 'first' or 'last'",
         issues,
      ),
   };

   match (column, direction) {
      (Some(column), Some(direction)) if issues.len() == before => Some(SortConfig {
         column,
         direction,
         nulls,
      }),
      _ => None,
   }
}

pub(crate) fn parse_search(value: &JsonValue, issues: &mut Issues) -> Option<SearchConfig> {
   let Some(obj) = value.as_object() else {
      issues.push(SEARCH, "must be an object");
      return None;
   };
   let before = issues.len();

   let columns = match obj.get("columns") {
      Some(JsonValue::Array(items)) => {
         let mut columns = Vec::with_capacity(items.len());
         for (i, item) in items.iter().enumerate() {
            if let Some(column) =
               parse_column(Some(item), &format!("{}.columns[{}]", SEARCH, i), issues)
            {
               columns.push(column);
            }
         }
         columns
      }
      _ => {
         issues.push(format!("{}.columns", SEARCH), "must be an array of column names");
         Vec::new()
      }
   };
   let term = match obj.get("term") {
      Some(JsonValue::String(term)) => term.clone(),
      _ => {
         issues.push(format!("{}.term", SEARCH), "must be a string");
         String::new()
      }
   };
   let mode = match obj.get("mode") {
      Some(JsonValue::Null) | None => Some(Default::default()),
      Some(mode) => parse_enum(
         mode,
         &format!("{}.mode", SEARCH),
         "must be 'any', 'all' or 'phrase'",
         issues,
      ),
   };

   let search = SearchConfig {
      columns,
      term,
      mode: mode.unwrap_or_default(),
   };
   check_search(&search, issues);

   if issues.len() == before {
      Some(search)
   } else {
      None
   }
}

fn parse_column(value: Option<&JsonValue>, path: &str, issues: &mut Issues) -> Option<String> {
   match value {
      Some(JsonValue::String(column)) => {
         let before = issues.len();
         check_column(column, path, issues);
         (issues.len() == before).then(|| column.clone())
      }
      Some(_) => {
         issues.push(path, "must be a string");
         None
      }
      None => {
         issues.push(path, "is required");
         None
      }
   }
}

fn parse_enum<T: DeserializeOwned>(
   value: &JsonValue,
   path: &str,
   message: &str,
   issues: &mut Issues,
) -> Option<T> {
   match serde_json::from_value(value.clone()) {
      Ok(parsed) => Some(parsed),
      Err(_) => {
         issues.push(path, message);
         None
      }
   }
}

fn check_column(column: &str, path: &str, issues: &mut Issues) {
   if column.trim().is_empty() {
      issues.push(path, "must not be empty");
   }
}

fn check_search(search: &SearchConfig, issues: &mut Issues) {
   if search.term.trim().is_empty() {
      issues.push(format!("{}.term", SEARCH), "must not be empty");
   }
}

fn is_scalar(value: &JsonValue) -> bool {
   matches!(
      value,
      JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_)
   )
}

/// Check a filter value against the shape its operator requires.
pub(crate) fn check_filter_value(
   operator: FilterOperator,
   value: &JsonValue,
   path: &str,
   issues: &mut Issues,
) {
   match operator.value_shape() {
      ValueShape::Scalar => {
         if !is_scalar(value) {
            issues.push(path, "must be a string, number, or boolean");
         }
      }
      ValueShape::Text => {
         if !value.is_string() {
            issues.push(path, "must be a string");
         }
      }
      ValueShape::Set => match value {
         JsonValue::Array(items) if items.is_empty() => {
            issues.push(path, "must contain at least one value");
         }
         JsonValue::Array(items) => {
            if !items.iter().all(is_scalar) {
               issues.push(path, "must only contain strings, numbers, or booleans");
            }
         }
         other => {
            if !is_scalar(other) {
               issues.push(path, "must be a value or an array of values");
            }
         }
      },
      ValueShape::Range => match value {
         JsonValue::Array(items) if items.len() == 2 && items.iter().all(is_scalar) => {}
         _ => issues.push(path, "must be an array of exactly two values [low, high]"),
      },
      ValueShape::Ignored => {}
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::params::{NullsOrder, PaginationMode, SearchMode, SortDirection};
   use crate::token::encode_cursor;
   use serde_json::json;

   fn rules() -> ParamRules {
      ParamRules::default()
   }

   fn issue_paths(err: Error) -> Vec<String> {
      err.issues().into_iter().map(|issue| issue.path).collect()
   }

   // ─── pagination fields ───

   #[test]
   fn empty_body_uses_default_mode() {
      let params = ListParams::from_json(&json!({}), &rules()).unwrap();
      assert_eq!(params, ListParams::default());

      let cursor_rules = ParamRules {
         default_mode: PaginationMode::Cursor,
         ..rules()
      };
      let params = ListParams::from_json(&json!({}), &cursor_rules).unwrap();
      assert_eq!(params.pagination.mode(), PaginationMode::Cursor);
   }

   #[test]
   fn page_and_limit_parse() {
      let params = ListParams::from_json(&json!({"page": 3, "limit": 10}), &rules()).unwrap();
      assert_eq!(params.pagination, Pagination::Offset { page: 3 });
      assert_eq!(params.limit, Some(10));
   }

   #[test]
   fn negative_page_is_accepted_and_left_for_normalizing() {
      let params = ListParams::from_json(&json!({"page": -2}), &rules()).unwrap();
      assert_eq!(params.pagination, Pagination::Offset { page: -2 });
   }

   #[test]
   fn non_positive_limit_is_rejected() {
      for limit in [json!(0), json!(-5), json!(2.5), json!("ten")] {
         let err = ListParams::from_json(&json!({ "limit": limit }), &rules()).unwrap_err();
         assert_eq!(issue_paths(err), vec!["limit"]);
      }
   }

   #[test]
   fn limit_above_maximum_is_rejected() {
      let err = ListParams::from_json(&json!({"limit": 101}), &rules()).unwrap_err();
      assert!(err.to_string().contains("must not exceed 100"));
   }

   #[test]
   fn cursor_fields_select_cursor_mode() {
      let token = encode_cursor(&json!(10)).unwrap();
      let params = ListParams::from_json(
         &json!({"cursor": token, "cursorDirection": "backward", "limit": 5}),
         &rules(),
      )
      .unwrap();

      match params.pagination {
         Pagination::Cursor { cursor, direction } => {
            assert_eq!(cursor.unwrap().value(), &json!(10));
            assert_eq!(direction, CursorDirection::Backward);
         }
         other => panic!("expected cursor pagination, got {other:?}"),
      }
   }

   #[test]
   fn corrupted_cursor_is_a_field_error() {
      let err = ListParams::from_json(&json!({"cursor": "%%%"}), &rules()).unwrap_err();
      assert_eq!(issue_paths(err), vec!["cursor"]);

      let err = ListParams::from_json(&json!({"cursor": 15}), &rules()).unwrap_err();
      assert_eq!(issue_paths(err), vec!["cursor"]);
   }

   #[test]
   fn page_with_cursor_conflicts() {
      let token = encode_cursor(&json!(1)).unwrap();
      let err = ListParams::from_json(&json!({"page": 2, "cursor": token}), &rules()).unwrap_err();
      assert_eq!(issue_paths(err), vec!["page"]);
   }

   // ─── filters ───

   #[test]
   fn valid_filters_parse() {
      let params = ListParams::from_json(
         &json!({"filters": [
            {"column": "status", "operator": "eq", "value": "active"},
            {"column": "age", "operator": "between", "value": [18, 30]},
            {"column": "deleted_at", "operator": "isNull"},
            {"column": "role", "operator": "in", "value": "admin"},
         ]}),
         &rules(),
      )
      .unwrap();

      assert_eq!(params.filters.len(), 4);
      assert_eq!(params.filters[2].operator, FilterOperator::IsNull);
   }

   #[test]
   fn unknown_operator_is_rejected() {
      let err = ListParams::from_json(
         &json!({"filters": [{"column": "name", "operator": "regex", "value": ".*"}]}),
         &rules(),
      )
      .unwrap_err();

      assert_eq!(issue_paths(err), vec!["filters[0].operator"]);
   }

   #[test]
   fn malformed_ranges_are_rejected() {
      for value in [json!([1]), json!([1, 2, 3]), json!(5), json!([1, null])] {
         let err = ListParams::from_json(
            &json!({"filters": [{"column": "age", "operator": "notBetween", "value": value}]}),
            &rules(),
         )
         .unwrap_err();
         assert_eq!(issue_paths(err), vec!["filters[0].value"]);
      }
   }

   #[test]
   fn empty_membership_list_is_rejected() {
      let err = ListParams::from_json(
         &json!({"filters": [{"column": "role", "operator": "notIn", "value": []}]}),
         &rules(),
      )
      .unwrap_err();
      assert_eq!(issue_paths(err), vec!["filters[0].value"]);
   }

   #[test]
   fn like_requires_a_string() {
      let err = ListParams::from_json(
         &json!({"filters": [{"column": "name", "operator": "like", "value": 12}]}),
         &rules(),
      )
      .unwrap_err();
      assert_eq!(issue_paths(err), vec!["filters[0].value"]);
   }

   #[test]
   fn all_issues_are_reported_together() {
      let err = ListParams::from_json(
         &json!({
            "limit": 0,
            "filters": [{"column": 7, "operator": "eq", "value": null}],
            "sorts": "name",
         }),
         &rules(),
      )
      .unwrap_err();

      assert_eq!(
         issue_paths(err),
         vec![
            "limit",
            "filters[0].column",
            "filters[0].value",
            "sorts",
         ]
      );
   }

   #[test]
   fn unknown_columns_pass_shape_validation() {
      let params = ListParams::from_json(
         &json!({"filters": [{"column": "ghost_col", "operator": "eq", "value": "x"}]}),
         &rules(),
      )
      .unwrap();
      assert_eq!(params.filters[0].column, "ghost_col");
   }

   // ─── sorts and search ───

   #[test]
   fn sorts_parse_with_optional_nulls() {
      let params = ListParams::from_json(
         &json!({"sorts": [
            {"column": "score", "direction": "desc", "nulls": "last"},
            {"column": "id", "direction": "asc"},
         ]}),
         &rules(),
      )
      .unwrap();

      assert_eq!(
         params.sorts,
         vec![
            SortConfig::desc("score").nulls(NullsOrder::Last),
            SortConfig::asc("id")
         ]
      );
   }

   #[test]
   fn sort_direction_is_required() {
      let err = ListParams::from_json(&json!({"sorts": [{"column": "id"}]}), &rules()).unwrap_err();
      assert_eq!(issue_paths(err), vec!["sorts[0].direction"]);

      let err = ListParams::from_json(
         &json!({"sorts": [{"column": "id", "direction": "up"}]}),
         &rules(),
      )
      .unwrap_err();
      assert!(err.to_string().contains("'asc' or 'desc'"));
   }

   #[test]
   fn search_parses_with_default_mode() {
      let params = ListParams::from_json(
         &json!({"search": {"columns": ["name", "email"], "term": "ab cd"}}),
         &rules(),
      )
      .unwrap();

      let search = params.search.unwrap();
      assert_eq!(search.columns, vec!["name", "email"]);
      assert_eq!(search.mode, SearchMode::Any);
   }

   #[test]
   fn empty_search_term_is_rejected() {
      let err = ListParams::from_json(
         &json!({"search": {"columns": ["name"], "term": "   "}}),
         &rules(),
      )
      .unwrap_err();
      assert_eq!(issue_paths(err), vec!["search.term"]);
   }

   // ─── query-string bag ───

   #[test]
   fn query_bag_parses_like_json() {
      let bag = QueryBag::from_pairs([
         ("page", "2"),
         ("limit", "10"),
         ("includeTotal", "true"),
         (
            "filters",
            r#"[{"column":"status","operator":"eq","value":"active"}]"#,
         ),
         ("sorts", r#"[{"column":"name","direction":"desc"}]"#),
      ]);

      let params = ListParams::from_query(&bag, &rules()).unwrap();
      assert_eq!(params.pagination, Pagination::Offset { page: 2 });
      assert_eq!(params.limit, Some(10));
      assert!(params.include_total);
      assert_eq!(params.filters.len(), 1);
      assert_eq!(params.sorts[0].direction, SortDirection::Desc);
   }

   #[test]
   fn query_bag_rejects_broken_json_and_numbers() {
      let bag = QueryBag::from_pairs([("limit", "ten"), ("filters", "[{")]);
      let err = ListParams::from_query(&bag, &rules()).unwrap_err();

      let mut paths = issue_paths(err);
      paths.sort();
      assert_eq!(paths, vec!["filters", "limit"]);
   }

   // ─── validate_shapes ───

   #[test]
   fn typed_range_with_wrong_arity_is_rejected() {
      let filters = vec![FilterCondition::new(
         "age",
         FilterOperator::Between,
         json!([18]),
      )];
      let err = validate_shapes(&filters, &[], None).unwrap_err();
      assert_eq!(issue_paths(err), vec!["filters[0].value"]);
   }

   #[test]
   fn typed_empty_search_term_is_rejected() {
      let search = SearchConfig::new(["name"], "", SearchMode::Any);
      assert!(validate_shapes(&[], &[], Some(&search)).is_err());
   }
}
