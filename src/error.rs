use listing_params::{FieldIssue, ValidationError};
use serde::Serialize;

/// Result type alias for listing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for listing operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Malformed request parameters or cursor token.
   #[error(transparent)]
   Params(#[from] listing_params::Error),

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// Rows could not be converted into the requested item type.
   #[error("failed to decode row: {0}")]
   Decode(#[from] serde_json::Error),

   /// Table does not exist in the database.
   #[error("unknown table: {0}")]
   UnknownTable(String),

   /// Key column is not one of the table's columns.
   #[error("key column '{column}' is not a column of table '{table}'")]
   UnknownKeyColumn { table: String, column: String },

   /// Keyset column not found in query results.
   #[error("keyset column '{column}' not found in query results")]
   CursorColumnNotFound { column: String },

   /// The caller's cancellation signal fired before the request finished.
   #[error("list request was cancelled")]
   Cancelled,

   /// I/O error when accessing database files.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// Database failures all report `INTERNAL_ERROR`: callers get no partial
   /// results and decide for themselves whether to retry.
   pub fn error_code(&self) -> &'static str {
      match self {
         Error::Params(err) => err.error_code(),
         Error::Sqlx(_) | Error::Io(_) => "INTERNAL_ERROR",
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE",
         Error::Decode(_) => "DECODE_ERROR",
         Error::UnknownTable(_) => "UNKNOWN_TABLE",
         Error::UnknownKeyColumn { .. } => "UNKNOWN_KEY_COLUMN",
         Error::CursorColumnNotFound { .. } => "CURSOR_COLUMN_NOT_FOUND",
         Error::Cancelled => "CANCELLED",
      }
   }

   /// True for failures caused by the request rather than the server.
   pub fn is_client_error(&self) -> bool {
      matches!(self, Error::Params(_) | Error::UnknownTable(_))
   }

   /// Field-level issues for structured error responses.
   pub fn issues(&self) -> Vec<FieldIssue> {
      match self {
         Error::Params(err) => err.issues(),
         _ => Vec::new(),
      }
   }

   /// The payload a transport layer returns for this error.
   ///
   /// Internal failures carry a generic message so database details stay
   /// server-side.
   pub fn to_body(&self) -> ErrorBody {
      let message = if self.error_code() == "INTERNAL_ERROR" {
         "internal error".to_string()
      } else {
         self.to_string()
      };

      ErrorBody {
         code: self.error_code(),
         message,
         issues: self.issues(),
      }
   }
}

/// Rejected before any query runs.
pub(crate) fn check_limit(limit: Option<u32>) -> Result<()> {
   match limit {
      Some(0) => Err(Error::Params(listing_params::Error::from(
         ValidationError::single("limit", "must be a positive integer"),
      ))),
      _ => Ok(()),
   }
}

/// Serializable error payload: `{ code, message, issues }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
   pub code: &'static str,
   pub message: String,
   #[serde(skip_serializing_if = "Vec::is_empty")]
   pub issues: Vec<FieldIssue>,
}
