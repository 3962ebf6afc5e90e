//! Column whitelisting.
//!
//! Client state can be older than the schema it targets, so references to
//! columns that don't exist are dropped rather than rejected. What survives
//! is wrapped in [`SanitizedQuery`], the only input the query builder
//! accepts: no column name reaches SQL without passing through here.

use indexmap::IndexSet;
use tracing::debug;

use crate::params::{FilterCondition, SearchConfig, SortConfig};
use crate::validate::validate_shapes;
use crate::Result;

/// The real column set of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns(IndexSet<String>);

impl Columns {
   pub fn contains(&self, column: &str) -> bool {
      self.0.contains(column)
   }

   pub fn iter(&self) -> impl Iterator<Item = &str> {
      self.0.iter().map(String::as_str)
   }

   pub fn len(&self) -> usize {
      self.0.len()
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }
}

impl<S: Into<String>> FromIterator<S> for Columns {
   fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
      Self(iter.into_iter().map(Into::into).collect())
   }
}

/// Filters, sorts and search whose every column is known to the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedQuery {
   filters: Vec<FilterCondition>,
   sorts: Vec<SortConfig>,
   search: Option<SearchConfig>,
}

impl SanitizedQuery {
   pub fn filters(&self) -> &[FilterCondition] {
      &self.filters
   }

   pub fn sorts(&self) -> &[SortConfig] {
      &self.sorts
   }

   pub fn search(&self) -> Option<&SearchConfig> {
      self.search.as_ref()
   }

   /// True when nothing constrains or orders the scan.
   pub fn is_empty(&self) -> bool {
      self.filters.is_empty() && self.sorts.is_empty() && self.search.is_none()
   }
}

/// Validate shapes, then keep only references to columns in `known`.
///
/// Malformed shapes are an error. Unknown columns are not: filter and sort
/// entries naming them are dropped, unknown search columns are removed, and
/// a search left with no columns is dropped entirely. Repeated sort keys keep
/// their first occurrence.
pub fn sanitize(
   filters: &[FilterCondition],
   sorts: &[SortConfig],
   search: Option<&SearchConfig>,
   known: &Columns,
) -> Result<SanitizedQuery> {
   validate_shapes(filters, sorts, search)?;

   let filters = filters
      .iter()
      .filter(|filter| {
         let keep = known.contains(&filter.column);
         if !keep {
            debug!(column = %filter.column, "dropping filter on unknown column");
         }
         keep
      })
      .cloned()
      .collect();

   let mut seen = IndexSet::new();
   let sorts = sorts
      .iter()
      .filter(|sort| {
         if !known.contains(&sort.column) {
            debug!(column = %sort.column, "dropping sort on unknown column");
            return false;
         }
         seen.insert(sort.column.clone())
      })
      .cloned()
      .collect();

   let search = search.and_then(|search| {
      let columns: Vec<String> = search
         .columns
         .iter()
         .filter(|column| {
            let keep = known.contains(column);
            if !keep {
               debug!(column = %column, "dropping unknown search column");
            }
            keep
         })
         .cloned()
         .collect();

      if columns.is_empty() {
         debug!("dropping search with no known columns");
         None
      } else {
         Some(SearchConfig {
            columns,
            term: search.term.clone(),
            mode: search.mode,
         })
      }
   });

   Ok(SanitizedQuery {
      filters,
      sorts,
      search,
   })
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::params::{FilterOperator, SearchMode};
   use crate::Error;
   use serde_json::json;

   fn users() -> Columns {
      ["id", "name", "email", "status"].into_iter().collect()
   }

   #[test]
   fn known_columns_pass_through() {
      let filters = vec![FilterCondition::new(
         "status",
         FilterOperator::Eq,
         json!("active"),
      )];
      let sorts = vec![SortConfig::desc("name")];

      let query = sanitize(&filters, &sorts, None, &users()).unwrap();
      assert_eq!(query.filters(), filters.as_slice());
      assert_eq!(query.sorts(), sorts.as_slice());
   }

   #[test]
   fn unknown_filter_columns_are_dropped_not_rejected() {
      let filters = vec![
         FilterCondition::new("ghost_col", FilterOperator::Eq, json!("x")),
         FilterCondition::new("status", FilterOperator::Eq, json!("active")),
      ];

      let query = sanitize(&filters, &[], None, &users()).unwrap();
      assert_eq!(query.filters().len(), 1);
      assert_eq!(query.filters()[0].column, "status");
   }

   #[test]
   fn only_unknown_columns_leaves_an_empty_query() {
      let filters = vec![FilterCondition::new(
         "ghost_col",
         FilterOperator::Eq,
         json!("x"),
      )];
      let sorts = vec![SortConfig::asc("ghost_col")];

      let query = sanitize(&filters, &sorts, None, &users()).unwrap();
      assert!(query.is_empty());
   }

   #[test]
   fn duplicate_sort_keys_keep_the_first() {
      let sorts = vec![
         SortConfig::desc("name"),
         SortConfig::asc("id"),
         SortConfig::asc("name"),
      ];

      let query = sanitize(&[], &sorts, None, &users()).unwrap();
      assert_eq!(
         query.sorts(),
         &[SortConfig::desc("name"), SortConfig::asc("id")]
      );
   }

   #[test]
   fn search_columns_are_filtered() {
      let search = SearchConfig::new(["name", "nickname"], "jo", SearchMode::Any);

      let query = sanitize(&[], &[], Some(&search), &users()).unwrap();
      assert_eq!(query.search().unwrap().columns, vec!["name"]);
   }

   #[test]
   fn search_without_known_columns_is_dropped() {
      let search = SearchConfig::new(["nickname"], "jo", SearchMode::Any);

      let query = sanitize(&[], &[], Some(&search), &users()).unwrap();
      assert!(query.search().is_none());
   }

   #[test]
   fn malformed_shapes_fail_before_whitelisting() {
      // Unknown column AND a bad range: the shape error still wins.
      let filters = vec![FilterCondition::new(
         "ghost_col",
         FilterOperator::Between,
         json!([1]),
      )];

      let err = sanitize(&filters, &[], None, &users()).unwrap_err();
      assert!(matches!(err, Error::Validation(_)));
   }
}
