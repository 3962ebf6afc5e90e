//! Predicate and ordering construction.
//!
//! Builds SQLite `WHERE` and `ORDER BY` fragments from a [`SanitizedQuery`].
//! Values never appear in the SQL text: each one is bound through a numbered
//! `$N` placeholder, and every identifier is double-quoted.
//!
//! # Example
//!
//! ```
//! use listing_params::{Columns, FilterCondition, FilterOperator, build_where, sanitize};
//! use serde_json::json;
//!
//! let columns: Columns = ["id", "status"].into_iter().collect();
//! let filters = vec![FilterCondition::new("status", FilterOperator::Eq, json!("active"))];
//! let query = sanitize(&filters, &[], None, &columns).unwrap();
//!
//! let predicate = build_where(&query).unwrap();
//! assert_eq!(predicate.sql, r#""status" = $1"#);
//! assert_eq!(predicate.values, vec![json!("active")]);
//! ```

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::params::{FilterCondition, FilterOperator, NullsOrder, SearchConfig, SearchMode, SortConfig, SortDirection};
use crate::sanitize::SanitizedQuery;
use crate::{Error, Result};

/// Validate that a name is a plain SQL identifier.
///
/// Accepts names matching `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<()> {
   let mut chars = name.chars();
   let valid = match chars.next() {
      Some(first) => {
         (first.is_ascii_alphabetic() || first == '_')
            && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
      }
      None => false,
   };

   if valid {
      Ok(())
   } else {
      Err(Error::InvalidIdentifier {
         name: name.to_string(),
      })
   }
}

/// Quote an identifier with double quotes.
///
/// Any embedded double quotes are doubled per SQL standard (`"` → `""`).
pub fn quote_identifier(name: &str) -> String {
   format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape `LIKE` wildcards so user text matches literally under `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
   let mut escaped = String::with_capacity(text.len());
   for ch in text.chars() {
      if matches!(ch, '\\' | '%' | '_') {
         escaped.push('\\');
      }
      escaped.push(ch);
   }
   escaped
}

/// Bind values collected while SQL text is generated.
///
/// Placeholders are numbered in push order starting after `offset`, so
/// fragments built later never collide with earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
   offset: usize,
   values: Vec<JsonValue>,
}

impl Bindings {
   pub fn new() -> Self {
      Self::default()
   }

   /// Start numbering after `offset` values that are bound elsewhere.
   pub fn after(offset: usize) -> Self {
      Self {
         offset,
         values: Vec::new(),
      }
   }

   /// Record a value and return its placeholder.
   pub fn push(&mut self, value: JsonValue) -> String {
      self.values.push(value);
      format!("${}", self.offset + self.values.len())
   }

   pub fn len(&self) -> usize {
      self.values.len()
   }

   pub fn is_empty(&self) -> bool {
      self.values.is_empty()
   }

   pub fn into_values(self) -> Vec<JsonValue> {
      self.values
   }
}

/// A boolean SQL expression and the values its placeholders refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
   pub sql: String,
   pub values: Vec<JsonValue>,
}

/// An ordered list of sort keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExpr {
   keys: Vec<SortConfig>,
}

impl OrderExpr {
   /// Order by a single server-chosen key column.
   pub fn by_key(column: impl Into<String>, direction: SortDirection) -> Self {
      Self {
         keys: vec![SortConfig {
            column: column.into(),
            direction,
            nulls: None,
         }],
      }
   }

   pub fn keys(&self) -> &[SortConfig] {
      &self.keys
   }

   /// Append `column` ascending unless it is already one of the keys.
   ///
   /// With a unique tie-breaker last, the ordering is total and pages neither
   /// skip nor repeat rows.
   pub fn with_tiebreaker(mut self, column: &str) -> Self {
      if !self.keys.iter().any(|key| key.column == column) {
         self.keys.push(SortConfig::asc(column));
      }
      self
   }

   /// Every key scanned in the opposite order.
   pub fn reversed(&self) -> Self {
      Self {
         keys: self.keys.iter().map(SortConfig::reversed).collect(),
      }
   }

   /// Render as an `ORDER BY` clause.
   pub fn to_sql(&self) -> String {
      let parts: Vec<String> = self
         .keys
         .iter()
         .map(|key| {
            let dir = match key.direction {
               SortDirection::Asc => "ASC",
               SortDirection::Desc => "DESC",
            };
            match key.nulls {
               Some(NullsOrder::First) => {
                  format!("{} {} NULLS FIRST", quote_identifier(&key.column), dir)
               }
               Some(NullsOrder::Last) => {
                  format!("{} {} NULLS LAST", quote_identifier(&key.column), dir)
               }
               None => format!("{} {}", quote_identifier(&key.column), dir),
            }
         })
         .collect();

      format!("ORDER BY {}", parts.join(", "))
   }
}

/// Combine filters (AND) and search into one predicate.
///
/// Returns `None` when nothing constrains the rows.
pub fn build_where(query: &SanitizedQuery) -> Option<Predicate> {
   let mut bindings = Bindings::new();
   let sql = build_where_into(query, &mut bindings)?;
   Some(Predicate {
      sql,
      values: bindings.into_values(),
   })
}

/// Like [`build_where`], numbering placeholders through `bindings`.
pub fn build_where_into(query: &SanitizedQuery, bindings: &mut Bindings) -> Option<String> {
   let mut parts = Vec::new();

   for filter in query.filters() {
      if let Some(sql) = filter_sql(filter, bindings) {
         parts.push(sql);
      }
   }
   if let Some(sql) = query.search().and_then(|search| search_sql(search, bindings)) {
      parts.push(sql);
   }

   if parts.is_empty() {
      None
   } else {
      Some(parts.join(" AND "))
   }
}

/// Turn the sort list into an ordering, if there is one.
pub fn build_order(query: &SanitizedQuery) -> Option<OrderExpr> {
   if query.sorts().is_empty() {
      None
   } else {
      Some(OrderExpr {
         keys: query.sorts().to_vec(),
      })
   }
}

fn filter_sql(filter: &FilterCondition, bindings: &mut Bindings) -> Option<String> {
   let column = quote_identifier(&filter.column);
   let value = &filter.value;

   match filter.operator {
      FilterOperator::Eq => Some(compare(&column, "=", value, bindings)),
      FilterOperator::Neq => Some(compare(&column, "!=", value, bindings)),
      FilterOperator::Gt => Some(compare(&column, ">", value, bindings)),
      FilterOperator::Gte => Some(compare(&column, ">=", value, bindings)),
      FilterOperator::Lt => Some(compare(&column, "<", value, bindings)),
      FilterOperator::Lte => Some(compare(&column, "<=", value, bindings)),
      FilterOperator::Like => contains(&column, value, bindings),
      FilterOperator::Ilike => contains_ignore_case(&column, value, bindings),
      FilterOperator::In => membership(&column, "IN", value, bindings),
      FilterOperator::NotIn => membership(&column, "NOT IN", value, bindings),
      FilterOperator::IsNull => Some(format!("{} IS NULL", column)),
      FilterOperator::IsNotNull => Some(format!("{} IS NOT NULL", column)),
      FilterOperator::Between => range(&column, "BETWEEN", value, bindings),
      FilterOperator::NotBetween => range(&column, "NOT BETWEEN", value, bindings),
   }
}

fn compare(column: &str, op: &str, value: &JsonValue, bindings: &mut Bindings) -> String {
   format!("{} {} {}", column, op, bindings.push(value.clone()))
}

/// Case-sensitive substring test. `instr` compares bytes exactly.
fn contains(column: &str, value: &JsonValue, bindings: &mut Bindings) -> Option<String> {
   let Some(text) = value.as_str() else {
      debug!(column, "skipping substring filter without a text value");
      return None;
   };
   Some(format!(
      "instr({}, {}) > 0",
      column,
      bindings.push(JsonValue::from(text))
   ))
}

/// Case-insensitive substring test (ASCII case folding, as SQLite's `LIKE`).
fn contains_ignore_case(column: &str, value: &JsonValue, bindings: &mut Bindings) -> Option<String> {
   let Some(text) = value.as_str() else {
      debug!(column, "skipping substring filter without a text value");
      return None;
   };
   Some(like_pattern(column, text, bindings))
}

fn like_pattern(column: &str, text: &str, bindings: &mut Bindings) -> String {
   let pattern = format!("%{}%", escape_like(text));
   format!(
      "{} LIKE {} ESCAPE '\\'",
      column,
      bindings.push(JsonValue::from(pattern))
   )
}

fn membership(column: &str, op: &str, value: &JsonValue, bindings: &mut Bindings) -> Option<String> {
   let items: Vec<JsonValue> = match value {
      JsonValue::Array(items) => items.clone(),
      scalar => vec![scalar.clone()],
   };
   if items.is_empty() {
      debug!(column, "skipping membership filter with no values");
      return None;
   }

   let placeholders: Vec<String> = items.into_iter().map(|item| bindings.push(item)).collect();
   Some(format!("{} {} ({})", column, op, placeholders.join(", ")))
}

fn range(column: &str, op: &str, value: &JsonValue, bindings: &mut Bindings) -> Option<String> {
   match value.as_array().map(Vec::as_slice) {
      Some([low, high]) => Some(format!(
         "{} {} {} AND {}",
         column,
         op,
         bindings.push(low.clone()),
         bindings.push(high.clone())
      )),
      _ => {
         debug!(column, "skipping range filter with insufficient data");
         None
      }
   }
}

fn search_sql(search: &SearchConfig, bindings: &mut Bindings) -> Option<String> {
   let patterns = search.patterns();
   if patterns.is_empty() {
      return None;
   }

   let mut per_column = Vec::with_capacity(search.columns.len());
   for column in &search.columns {
      let column = quote_identifier(column);
      let mut matches = Vec::with_capacity(patterns.len());
      for pattern in &patterns {
         matches.push(like_pattern(&column, pattern, bindings));
      }

      let joined = match search.mode {
         SearchMode::All if matches.len() > 1 => format!("({})", matches.join(" AND ")),
         SearchMode::All | SearchMode::Any | SearchMode::Phrase => matches.join(" OR "),
      };
      per_column.push(joined);
   }

   Some(format!("({})", per_column.join(" OR ")))
}
