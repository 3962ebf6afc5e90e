//! # sqlx-sqlite-listing
//!
//! Offset and cursor pagination over SQLite tables, driven by untrusted
//! filter, sort and search parameters.
//!
//! ## Core Types
//!
//! - **[`ListEngine`]**: Parses, sanitizes and serves list requests
//! - **[`Database`]**: Pooled SQLite handle passed explicitly to every call
//! - **[`Table`]**: Column whitelist and key column for one table
//! - **[`ListResponse`]**: `{ items, pagination_meta }` envelope
//! - **[`PaginationMeta`]**: One metadata shape for both modes
//! - **[`Error`]**: Error type for listing operations
//!
//! ## Request flow
//!
//! - **Validate**: malformed shapes are rejected with field-level issues before any query runs
//! - **Whitelist**: references to columns the table doesn't have are dropped
//! - **Build**: filters and search become a parameterized predicate, sorts an ordering
//! - **Execute**: the offset or cursor engine runs the page query (plus a count when needed)
//! - **Assemble**: both engines report through the same metadata shape
//!
//! The parameter contract itself lives in [`listing_params`], re-exported
//! here as [`params`], so clients can apply exactly the same rules.

mod bind;
mod config;
mod cursor;
mod database;
mod decode;
mod engine;
mod error;
mod meta;
mod offset;
mod table;

pub use listing_params as params;

pub use config::{DatabaseConfig, EngineConfig};
pub use cursor::CursorPageBuilder;
pub use database::Database;
pub use decode::Row;
pub use engine::ListEngine;
pub use error::{Error, ErrorBody, Result};
pub use meta::{
   CursorSummary, ListResponse, OffsetSummary, PageRef, PageSummary, PaginationMeta, assemble,
};
pub use offset::OffsetPageBuilder;
pub use table::Table;
