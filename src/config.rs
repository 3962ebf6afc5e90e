//! Configuration for the database handle and the list engine

use std::time::Duration;

use listing_params::ParamRules;

/// Configuration for the [`Database`](crate::Database) connection pool
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_listing::DatabaseConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = DatabaseConfig::default();
///
/// // Override just one field
/// let config = DatabaseConfig {
///     idle_timeout: Duration::from_secs(60),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
   /// Maximum number of concurrent connections
   ///
   /// List requests run fully in parallel; each one holds a connection for
   /// at most two sequential queries.
   ///
   /// Default: 6
   pub max_read_connections: u32,

   /// Idle timeout for pooled connections
   ///
   /// Default: 30 seconds
   pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
   fn default() -> Self {
      Self {
         max_read_connections: 6,
         idle_timeout: Duration::from_secs(30),
      }
   }
}

/// Configuration for [`ListEngine`](crate::ListEngine)
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
   /// Limits and default mode applied when parsing requests.
   pub rules: ParamRules,

   /// Most rows returned when a request sets no `limit`.
   ///
   /// Default: `None` (no cap)
   pub unbounded_row_cap: Option<u32>,
}
