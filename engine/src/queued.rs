//! Schema for a single client-buffered queue entry.
//!
//! Every recognized field is held as a raw JSON value. Type checks happen
//! in the normalizer, so a wrongly-typed field turns into an
//! [`Error::IncompleteItem`] rejection rather than a decode failure that
//! would take the whole batch down with it.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A queued cart/purchase event as sent by the offline client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedItem {
    /// Owner of the purchase (required, non-empty string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    /// Cart lines (required, non-empty array)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    /// Explicit total; used only when numerically truthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Value>,
    /// Event time as recorded by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    /// Queue insertion time, fallback for `timestamp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    /// Client-generated correlation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Unrecognized keys, kept verbatim
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl QueuedItem {
    /// Decode a raw batch element.
    ///
    /// Only non-object values fail here; field-level problems are left to
    /// [`crate::normalize`].
    pub fn from_value(raw: &Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::IncompleteItem(format!(
                "queued item must be an object, got {}",
                json_type_name(raw)
            )));
        }
        serde_json::from_value(raw.clone()).map_err(|e| Error::IncompleteItem(e.to_string()))
    }

    /// The correlation id as a string, if the client sent one.
    ///
    /// Numeric ids are rendered in their JSON form.
    pub fn queue_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
