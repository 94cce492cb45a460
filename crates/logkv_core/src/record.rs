//! Log record types and their line encoding.
//!
//! Every record is stored as one line of JSON terminated by `\n`:
//!
//! ```text
//! {"operation":"set","key":"a","value":{"kind":"string","str_value":"1","version":3}}
//! {"operation":"delete","key":"a"}
//! ```
//!
//! Values are an explicit tagged union. An unknown `kind` is rejected when
//! the line is decoded; an unknown `operation` tag is kept as
//! [`Operation::Unrecognized`] so replay can report it and move on.

use crate::error::{CoreError, CoreResult};
use serde::de::Deserializer;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Line terminator written after every record.
pub const RECORD_DELIMITER: u8 = b'\n';

/// The operation a record performs on its key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Store the record's value under the key.
    Set,
    /// Remove the key.
    Delete,
    /// A tag this version does not understand. Carries no state change.
    Unrecognized(String),
}

impl Operation {
    /// Returns the on-disk tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Unrecognized(tag) => tag,
        }
    }

    fn from_tag(tag: String) -> Self {
        match tag.as_str() {
            "set" => Self::Set,
            "delete" => Self::Delete,
            _ => Self::Unrecognized(tag),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_tag)
    }
}

/// The typed payload of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// A UTF-8 string.
    Str(String),
    /// A signed 64-bit integer.
    Int(i64),
}

impl Payload {
    /// Returns the kind tag used on disk.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "int",
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// A versioned value stored under a key.
///
/// `ttl` is carried as metadata only; nothing evicts expired keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ValueRepr", into = "ValueRepr")]
pub struct Value {
    /// The typed payload.
    pub payload: Payload,
    /// Per-write counter; later writes carry larger versions.
    pub version: u64,
    /// Optional expiry horizon.
    pub ttl: Option<u64>,
    /// Tombstone marker as written by the producer.
    pub tombstone: bool,
}

impl Value {
    /// Creates a value with the given payload and version.
    #[must_use]
    pub fn new(payload: impl Into<Payload>, version: u64) -> Self {
        Self {
            payload: payload.into(),
            version,
            ttl: None,
            tombstone: false,
        }
    }

    /// Creates a string value.
    #[must_use]
    pub fn string(payload: impl Into<String>, version: u64) -> Self {
        Self::new(Payload::Str(payload.into()), version)
    }

    /// Creates an integer value.
    #[must_use]
    pub fn int(payload: i64, version: u64) -> Self {
        Self::new(Payload::Int(payload), version)
    }

    /// Sets the expiry horizon.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the tombstone marker.
    #[must_use]
    pub fn with_tombstone(mut self, tombstone: bool) -> Self {
        self.tombstone = tombstone;
        self
    }

    /// Returns the string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Str(s) => Some(s),
            Payload::Int(_) => None,
        }
    }

    /// Returns the integer payload, if this is an integer value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self.payload {
            Payload::Int(i) => Some(i),
            Payload::Str(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ValueKind {
    String,
    #[serde(alias = "integer")]
    Int,
}

/// Wire shape of a value. A payload field that is absent for its kind
/// decodes as the zero value, matching producers that omit empty fields.
#[derive(Debug, Serialize, Deserialize)]
struct ValueRepr {
    #[serde(alias = "type")]
    kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    str_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    int_value: Option<i64>,
    #[serde(default)]
    version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    tombstone: bool,
}

impl From<ValueRepr> for Value {
    fn from(repr: ValueRepr) -> Self {
        let payload = match repr.kind {
            ValueKind::String => Payload::Str(repr.str_value.unwrap_or_default()),
            ValueKind::Int => Payload::Int(repr.int_value.unwrap_or_default()),
        };
        Self {
            payload,
            version: repr.version,
            ttl: repr.ttl,
            tombstone: repr.tombstone,
        }
    }
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        let (kind, str_value, int_value) = match value.payload {
            Payload::Str(s) => (ValueKind::String, Some(s), None),
            Payload::Int(i) => (ValueKind::Int, None, Some(i)),
        };
        Self {
            kind,
            str_value,
            int_value,
            version: value.version,
            ttl: value.ttl,
            tombstone: value.tombstone,
        }
    }
}

/// The atomic unit of the log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RecordRepr")]
pub struct Record {
    /// What the record does.
    pub operation: Operation,
    /// The key it applies to.
    pub key: String,
    /// The value for `set`; ignored for other operations.
    pub value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RecordRepr {
    #[serde(alias = "op")]
    operation: Operation,
    key: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

impl TryFrom<RecordRepr> for Record {
    type Error = String;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        if repr.key.is_empty() {
            return Err("record has an empty key".to_string());
        }

        let value = match repr.operation {
            Operation::Set => {
                let raw = repr
                    .value
                    .ok_or_else(|| format!("set record for key {:?} has no value", repr.key))?;
                let value = serde_json::from_value::<Value>(raw)
                    .map_err(|e| format!("bad value for key {:?}: {e}", repr.key))?;
                Some(value)
            }
            // Value fields of other operations are ignored, so a value that
            // does not decode is dropped instead of failing the line.
            Operation::Delete | Operation::Unrecognized(_) => repr
                .value
                .and_then(|raw| serde_json::from_value::<Value>(raw).ok()),
        };

        Ok(Self {
            operation: repr.operation,
            key: repr.key,
            value,
        })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.value.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("Record", fields)?;
        state.serialize_field("operation", &self.operation)?;
        state.serialize_field("key", &self.key)?;
        if let Some(value) = &self.value {
            state.serialize_field("value", value)?;
        }
        state.end()
    }
}

impl Record {
    /// Creates a `set` record.
    #[must_use]
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            operation: Operation::Set,
            key: key.into(),
            value: Some(value),
        }
    }

    /// Creates a `delete` record.
    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            operation: Operation::Delete,
            key: key.into(),
            value: None,
        }
    }

    /// Returns true if this is a `set` record.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.operation == Operation::Set
    }

    /// Returns true if this is a `delete` record.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.operation == Operation::Delete
    }

    /// Returns the value's version, if the record carries a value.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.value.as_ref().map(|v| v.version)
    }

    /// Checks the invariants a record must satisfy before it is logged.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` for an empty key, a `set` without a value, or
    /// an operation tag other than `set`/`delete`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.key.is_empty() {
            return Err(CoreError::invalid_record("key must not be empty"));
        }
        match self.operation {
            Operation::Set if self.value.is_none() => Err(CoreError::invalid_record(format!(
                "set record for key {:?} has no value",
                self.key
            ))),
            Operation::Set | Operation::Delete => Ok(()),
            Operation::Unrecognized(ref tag) => Err(CoreError::invalid_record(format!(
                "unsupported operation {tag:?}"
            ))),
        }
    }

    /// Encodes the record as one delimited line.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if JSON encoding fails.
    pub fn encode_line(&self) -> CoreResult<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(RECORD_DELIMITER);
        Ok(line)
    }

    /// Decodes one line (without its delimiter).
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the line is not a well-formed record.
    pub fn decode_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }
}
