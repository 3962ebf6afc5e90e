//! # listing-params
//!
//! The list-request contract shared by the server engine and its clients.
//!
//! ## Core Types
//!
//! - **[`ListParams`]**: A shape-validated list request (pagination, limit, filters, sorts, search)
//! - **[`SanitizedQuery`]**: Filters, sorts and search restricted to a table's real columns
//! - **[`Cursor`]**: Opaque keyset position token
//! - **[`ListState`]**: Client-side list state mirrored into a query string
//! - **[`Error`]**: Error type for parameter handling
//!
//! ## Flow
//!
//! - **Validate**: [`ListParams::from_json`] / [`ListParams::from_query`] reject malformed shapes
//! - **Whitelist**: [`sanitize`] drops references to unknown columns
//! - **Build**: [`build_where`] and [`build_order`] produce parameterized SQL fragments
//! - **Sync**: [`read_params`] and [`write_params`] map state to and from a [`QueryBag`]

mod error;
mod params;
mod query;
mod sanitize;
mod sync;
mod token;
mod validate;

pub use error::{Error, FieldIssue, Result, ValidationError};
pub use params::{
   CursorDirection, FilterCondition, FilterOperator, ListParams, NullsOrder, Pagination,
   PaginationMode, ParamRules, SearchConfig, SearchMode, SortConfig, SortDirection, ValueShape,
   normalize_page,
};
pub use query::{
   Bindings, OrderExpr, Predicate, build_order, build_where, build_where_into, quote_identifier,
   validate_identifier,
};
pub use sanitize::{Columns, SanitizedQuery, sanitize};
pub use sync::{ListState, QueryBag, SyncDefaults, read_params, write_params};
pub use token::{Cursor, decode_cursor, encode_cursor};
pub use validate::validate_shapes;
