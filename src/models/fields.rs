// src/models/fields.rs

//! Serde helpers for raw store records.
//!
//! Records written by different generations of the admin tooling spell the
//! same field in camelCase or snake_case and sometimes store numbers as
//! strings. The `Raw*` record types in the sibling modules list every
//! spelling with `#[serde(alias)]` and decode loose scalars with the
//! `deserialize_with` functions below. A null or unusable scalar decodes as
//! `None` so one bad field never discards the whole record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::IgnoredAny};
use serde_json::Value;

use crate::models::schedule::parse_timestamp;

/// A scalar as it may appear in a record.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Other(IgnoredAny),
}

impl Loose {
    fn into_i64(self) -> Option<i64> {
        match self {
            Loose::Int(n) => Some(n),
            Loose::Float(f) if f.fract() == 0.0 => Some(f as i64),
            Loose::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn into_bool(self) -> Option<bool> {
        match self {
            Loose::Bool(b) => Some(b),
            Loose::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Loose::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn into_string(self) -> Option<String> {
        match self {
            Loose::Text(s) => Some(s),
            Loose::Int(n) => Some(n.to_string()),
            Loose::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }
}

fn loose<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Loose>, D::Error> {
    Option::<Loose>::deserialize(deserializer)
}

/// Integers may arrive as JSON numbers or as numeric strings.
pub fn loose_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(loose(deserializer)?.and_then(Loose::into_i64))
}

pub fn loose_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(loose_int(deserializer)?.and_then(|n| u32::try_from(n).ok()))
}

pub fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(loose(deserializer)?.and_then(Loose::into_bool))
}

pub fn loose_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(loose(deserializer)?.and_then(Loose::into_string))
}

/// RFC 3339, or a naive timestamp read as UTC.
pub fn flexible_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(loose_string(deserializer)?.and_then(|raw| parse_timestamp(&raw).ok()))
}

/// An array of nested records, kept raw. Anything but an array is `None`.
pub fn loose_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Value>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items),
        _ => None,
    })
}

/// Decodes one raw record, logging and skipping it when it does not fit.
pub fn decode<'a, T: Deserialize<'a>>(record: &'a Value) -> Option<T> {
    T::deserialize(record)
        .inspect_err(|e| tracing::warn!("Skipping malformed record: {}", e))
        .ok()
}

/// Identifier of a question, option or record.
///
/// The store hands identifiers out as JSON numbers or strings; both collapse
/// to the same textual key so `1` and `"1"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// JSON form to write back into a record: numeric keys stay numbers.
    pub fn to_value(&self) -> Value {
        self.0
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(self.0.clone()))
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Loose::deserialize(deserializer)? {
            Loose::Text(s) if !s.is_empty() => Ok(Self(s)),
            Loose::Int(n) => Ok(Self(n.to_string())),
            _ => Err(serde::de::Error::custom("expected a string or numeric identifier")),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for Key {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
