use std::fmt;

use serde::Serialize;

/// Result type alias for parameter-contract operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single structural problem found in a list request.
///
/// `path` addresses the offending field the way a client would spell it,
/// e.g. `limit`, `filters[2].value`, or `search.term`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
   pub path: String,
   pub message: String,
}

impl FieldIssue {
   pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
      Self {
         path: path.into(),
         message: message.into(),
      }
   }
}

impl fmt::Display for FieldIssue {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}: {}", self.path, self.message)
   }
}

/// Every structural issue found while validating one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationError {
   pub issues: Vec<FieldIssue>,
}

impl ValidationError {
   pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
      Self {
         issues: vec![FieldIssue::new(path, message)],
      }
   }
}

impl fmt::Display for ValidationError {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let parts: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
      f.write_str(&parts.join("; "))
   }
}

impl std::error::Error for ValidationError {}

/// Error types for the list-parameter contract.
///
/// Every variant is a client error: nothing here touches a database.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Malformed parameter shapes (wrong types, unknown operators, bad ranges).
   #[error("invalid list parameters: {0}")]
   Validation(#[from] ValidationError),

   /// Cursor token could not be decoded or does not fit the keyset.
   #[error("invalid cursor token: {0}")]
   InvalidCursor(String),

   /// Table or column name contains characters outside the identifier set.
   #[error("invalid identifier '{name}': must match [a-zA-Z_][a-zA-Z0-9_]*")]
   InvalidIdentifier { name: String },
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> &'static str {
      match self {
         Error::Validation(_) => "VALIDATION_ERROR",
         Error::InvalidCursor(_) => "INVALID_CURSOR",
         Error::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
      }
   }

   /// Field-level issues suitable for a structured error response.
   pub fn issues(&self) -> Vec<FieldIssue> {
      match self {
         Error::Validation(err) => err.issues.clone(),
         Error::InvalidCursor(message) => vec![FieldIssue::new("cursor", message.clone())],
         Error::InvalidIdentifier { name } => {
            vec![FieldIssue::new(name.clone(), "not a valid identifier")]
         }
      }
   }
}

/// Collects issues while a request is walked so all of them are reported at once.
#[derive(Debug, Default)]
pub(crate) struct Issues(Vec<FieldIssue>);

impl Issues {
   pub(crate) fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
      self.0.push(FieldIssue::new(path, message));
   }

   pub(crate) fn is_empty(&self) -> bool {
      self.0.is_empty()
   }

   pub(crate) fn len(&self) -> usize {
      self.0.len()
   }

   pub(crate) fn into_vec(self) -> Vec<FieldIssue> {
      self.0
   }

   pub(crate) fn finish<T>(self, value: T) -> Result<T> {
      if self.0.is_empty() {
         Ok(value)
      } else {
         Err(Error::Validation(ValidationError { issues: self.0 }))
      }
   }
}
