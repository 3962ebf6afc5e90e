//! Opaque cursor tokens.
//!
//! A token is the URL-safe base64 encoding of the JSON form of the cursor
//! value. Encoding the typed JSON value (rather than its display string)
//! keeps the type: a numeric cursor decodes back to a number and a string
//! cursor to a string. Multi-key cursors encode an array with one value per
//! keyset column.
//!
//! Tokens are never stored server-side; they carry everything needed to
//! resume a scan.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

// Bound on untrusted token input before any decoding work happens.
const MAX_TOKEN_LEN: usize = 4 * 1024;

/// A decoded cursor together with the token it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
   token: String,
   value: JsonValue,
}

impl Cursor {
   /// Build a cursor from a keyset value (a scalar, or an array of scalars).
   pub fn encode(value: JsonValue) -> Result<Self> {
      check_cursor_value(&value)?;
      Ok(Self {
         token: encode_value(&value),
         value,
      })
   }

   /// Decode a client-supplied token.
   pub fn decode(token: &str) -> Result<Self> {
      let value = decode_token(token)?;
      Ok(Self {
         token: token.to_string(),
         value,
      })
   }

   pub fn token(&self) -> &str {
      &self.token
   }

   pub fn value(&self) -> &JsonValue {
      &self.value
   }

   /// Split the cursor into one value per keyset column.
   ///
   /// A single-column keyset carries a bare scalar; wider keysets carry an
   /// array whose length must match.
   pub fn key_values(&self, keyset_len: usize) -> Result<Vec<JsonValue>> {
      match (&self.value, keyset_len) {
         (JsonValue::Array(_), 1) => Err(Error::InvalidCursor(
            "cursor holds several values but the ordering has one key".into(),
         )),
         (scalar, 1) => Ok(vec![scalar.clone()]),
         (JsonValue::Array(values), n) if values.len() == n => Ok(values.clone()),
         (JsonValue::Array(values), n) => Err(Error::InvalidCursor(format!(
            "cursor has {} values but the ordering has {} keys",
            values.len(),
            n
         ))),
         (_, n) => Err(Error::InvalidCursor(format!(
            "cursor holds one value but the ordering has {} keys",
            n
         ))),
      }
   }
}

impl fmt::Display for Cursor {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.token)
   }
}

impl Serialize for Cursor {
   fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
      serializer.serialize_str(&self.token)
   }
}

impl<'de> Deserialize<'de> for Cursor {
   fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
      let token = String::deserialize(deserializer)?;
      Cursor::decode(&token).map_err(serde::de::Error::custom)
   }
}

/// Encode a cursor value into an opaque token.
pub fn encode_cursor(value: &JsonValue) -> Result<String> {
   check_cursor_value(value)?;
   Ok(encode_value(value))
}

/// Decode an opaque token back into the value it was built from.
pub fn decode_cursor(token: &str) -> Result<JsonValue> {
   decode_token(token)
}

fn encode_value(value: &JsonValue) -> String {
   URL_SAFE_NO_PAD.encode(value.to_string())
}

fn decode_token(token: &str) -> Result<JsonValue> {
   if token.is_empty() {
      return Err(Error::InvalidCursor("cursor token is empty".into()));
   }
   if token.len() > MAX_TOKEN_LEN {
      return Err(Error::InvalidCursor(format!(
         "cursor token exceeds max length of {} characters",
         MAX_TOKEN_LEN
      )));
   }

   let bytes = URL_SAFE_NO_PAD
      .decode(token)
      .map_err(|_| Error::InvalidCursor("cursor token is not valid base64".into()))?;
   let value: JsonValue = serde_json::from_slice(&bytes)
      .map_err(|_| Error::InvalidCursor("cursor token payload is corrupted".into()))?;

   check_cursor_value(&value)?;
   Ok(value)
}

fn is_key_scalar(value: &JsonValue) -> bool {
   matches!(value, JsonValue::String(_) | JsonValue::Number(_))
}

// Sort columns may hold NULL, so multi-key cursors may carry null entries.
// A bare cursor addresses the key column alone, which is never NULL.
fn check_cursor_value(value: &JsonValue) -> Result<()> {
   let valid = match value {
      JsonValue::Array(values) => {
         !values.is_empty() && values.iter().all(|v| v.is_null() || is_key_scalar(v))
      }
      other => is_key_scalar(other),
   };

   if valid {
      Ok(())
   } else {
      Err(Error::InvalidCursor(
         "cursor values must be strings, numbers, or null inside a multi-key cursor".into(),
      ))
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   // ─── round trips ───

   #[test]
   fn numeric_cursor_stays_numeric() {
      let token = encode_cursor(&json!(15)).unwrap();
      assert_eq!(decode_cursor(&token).unwrap(), json!(15));
   }

   #[test]
   fn string_cursor_stays_string() {
      let token = encode_cursor(&json!("15")).unwrap();
      assert_eq!(decode_cursor(&token).unwrap(), json!("15"));
      assert_ne!(token, encode_cursor(&json!(15)).unwrap());
   }

   #[test]
   fn float_and_negative_cursors_round_trip() {
      for value in [json!(-3), json!(2.5), json!(i64::MAX)] {
         let token = encode_cursor(&value).unwrap();
         assert_eq!(decode_cursor(&token).unwrap(), value);
      }
   }

   #[test]
   fn tokens_are_url_safe() {
      let token = encode_cursor(&json!("a/b+c?d=e&f")).unwrap();
      assert!(
         token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
      );
   }

   // ─── rejection ───

   #[test]
   fn rejects_empty_token() {
      assert!(matches!(decode_cursor(""), Err(Error::InvalidCursor(_))));
   }

   #[test]
   fn rejects_non_base64_token() {
      assert!(matches!(
         decode_cursor("not a token!"),
         Err(Error::InvalidCursor(_))
      ));
   }

   #[test]
   fn rejects_base64_of_garbage() {
      let token = URL_SAFE_NO_PAD.encode("{not json");
      assert!(matches!(decode_cursor(&token), Err(Error::InvalidCursor(_))));
   }

   #[test]
   fn rejects_non_scalar_payloads() {
      for value in [json!(null), json!(true), json!({"id": 1}), json!([])] {
         let token = URL_SAFE_NO_PAD.encode(value.to_string());
         assert!(decode_cursor(&token).is_err(), "{value} should be rejected");
         assert!(encode_cursor(&value).is_err());
      }
   }

   #[test]
   fn multi_key_cursor_may_hold_null() {
      let token = encode_cursor(&json!([null, 7])).unwrap();
      assert_eq!(decode_cursor(&token).unwrap(), json!([null, 7]));

      assert!(encode_cursor(&json!([null, {"a": 1}])).is_err());
   }

   #[test]
   fn rejects_oversized_token() {
      let token = "A".repeat(MAX_TOKEN_LEN + 1);
      assert!(matches!(decode_cursor(&token), Err(Error::InvalidCursor(_))));
   }

   // ─── Cursor::key_values ───

   #[test]
   fn scalar_cursor_fits_single_key() {
      let cursor = Cursor::encode(json!(10)).unwrap();
      assert_eq!(cursor.key_values(1).unwrap(), vec![json!(10)]);
   }

   #[test]
   fn array_cursor_fits_matching_keyset() {
      let cursor = Cursor::encode(json!(["tech", 85, 4])).unwrap();
      assert_eq!(
         cursor.key_values(3).unwrap(),
         vec![json!("tech"), json!(85), json!(4)]
      );
   }

   #[test]
   fn arity_mismatch_is_rejected() {
      let scalar = Cursor::encode(json!(10)).unwrap();
      assert!(scalar.key_values(2).is_err());

      let pair = Cursor::encode(json!([1, 2])).unwrap();
      assert!(pair.key_values(1).is_err());
      assert!(pair.key_values(3).is_err());
   }

   #[test]
   fn cursor_serializes_as_its_token() {
      let cursor = Cursor::encode(json!(7)).unwrap();
      let serialized = serde_json::to_value(&cursor).unwrap();
      assert_eq!(serialized, json!(cursor.token()));

      let back: Cursor = serde_json::from_value(serialized).unwrap();
      assert_eq!(back, cursor);
   }
}
