use std::fmt::Formatter;

use base64::prelude::*;
use bytes::Bytes;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{AblyError, Result};


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataKind {
    Bytes,
    Text,
    Structured,
}

/// The payload of a [crate::proto::message::Message]. The variant is fixed once a value is
///  constructed; encoding stages replace the whole value rather than mutating it.
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    Bytes(Bytes),
    Text(String),
    /// always a JSON object or array when constructed through [Data::from_value]
    Structured(Value),
}

impl Data {
    /// Wraps an application value. Only text and aggregates (objects, arrays) are accepted,
    ///  scalars like numbers or booleans are rejected.
    pub fn from_value(value: Value) -> Result<Data> {
        match value {
            Value::String(s) => Ok(Data::Text(s)),
            v @ (Value::Array(_) | Value::Object(_)) => Ok(Data::Structured(v)),
            Value::Null => Err(AblyError::UnsupportedPayloadType("null")),
            Value::Bool(_) => Err(AblyError::UnsupportedPayloadType("bool")),
            Value::Number(_) => Err(AblyError::UnsupportedPayloadType("number")),
        }
    }

    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Data> {
        Data::from_value(serde_json::to_value(value)?)
    }

    pub fn kind(&self) -> DataKind {
        match self {
            Data::Bytes(_) => DataKind::Bytes,
            Data::Text(_) => DataKind::Text,
            Data::Structured(_) => DataKind::Structured,
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Data::Bytes(b) => Ok(&b[..]),
            other => Err(other.mismatch(DataKind::Bytes)),
        }
    }

    /// Binary payloads are reinterpreted as UTF-8 text.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Data::Text(s) => Ok(s.as_str()),
            Data::Bytes(b) => Ok(std::str::from_utf8(b)?),
            other => Err(other.mismatch(DataKind::Text)),
        }
    }

    /// The raw content of a text or binary payload, for stages that work on bytes regardless
    ///  of how they are represented.
    pub fn as_text_bytes(&self) -> Result<&[u8]> {
        match self {
            Data::Text(s) => Ok(s.as_bytes()),
            Data::Bytes(b) => Ok(&b[..]),
            other => Err(other.mismatch(DataKind::Bytes)),
        }
    }

    fn mismatch(&self, expected: DataKind) -> AblyError {
        AblyError::PayloadTypeMismatch { expected, actual: self.kind() }
    }

    /// Parses a JSON scalar or document. If the caller knows the payload is binary, the scalar
    ///  is expected to be base64 text. Without a hint, the shape on the wire decides: strings
    ///  become [Data::Text], `null` becomes empty text, everything else becomes
    ///  [Data::Structured]. This is a best-effort strategy - a numeric-looking string stays a
    ///  string, a number is never turned into text.
    pub fn from_json(json: &[u8], hint: Option<DataKind>) -> Result<Data> {
        match hint {
            Some(DataKind::Bytes) => {
                let encoded: String = serde_json::from_slice(json)?;
                Ok(Data::Bytes(BASE64_STANDARD.decode(encoded)?.into()))
            }
            Some(DataKind::Text) => Ok(Data::Text(serde_json::from_slice(json)?)),
            Some(DataKind::Structured) => Ok(Data::Structured(serde_json::from_slice(json)?)),
            None => Ok(serde_json::from_slice(json)?),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_msgpack(buf: &[u8]) -> Result<Data> {
        Ok(rmp_serde::from_slice(buf)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::Text(value.to_string())
    }
}
impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::Text(value)
    }
}
impl From<&[u8]> for Data {
    fn from(value: &[u8]) -> Self {
        Data::Bytes(Bytes::copy_from_slice(value))
    }
}
impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Data::Bytes(value.into())
    }
}
impl From<Bytes> for Data {
    fn from(value: Bytes) -> Self {
        Data::Bytes(value)
    }
}

/// JSON (human readable) carries binary as base64 text. msgpack carries binary as `bin` and
///  structured values as their JSON text inside a `str`.
impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Data::Bytes(b) if serializer.is_human_readable() => serializer.serialize_str(&BASE64_STANDARD.encode(b)),
            Data::Bytes(b) => serializer.serialize_bytes(b),
            Data::Text(s) => serializer.serialize_str(s),
            Data::Structured(v) if serializer.is_human_readable() => v.serialize(serializer),
            Data::Structured(v) => {
                let json = serde_json::to_string(v).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&json)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Data {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DataVisitor)
    }
}

struct DataVisitor;

impl<'de> Visitor<'de> for DataVisitor {
    type Value = Data;

    fn expecting(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "a string, binary, null, boolean, number, sequence or map")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Data, E> {
        Ok(Data::Text(v.to_string()))
    }
    fn visit_string<E: serde::de::Error>(self, v: String) -> std::result::Result<Data, E> {
        Ok(Data::Text(v))
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> std::result::Result<Data, E> {
        Ok(Data::Bytes(Bytes::copy_from_slice(v)))
    }
    fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> std::result::Result<Data, E> {
        Ok(Data::Bytes(v.into()))
    }

    /// null is read as the empty string
    fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Data, E> {
        Ok(Data::Text(String::new()))
    }
    fn visit_none<E: serde::de::Error>(self) -> std::result::Result<Data, E> {
        Ok(Data::Text(String::new()))
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> std::result::Result<Data, E> {
        Ok(Data::Structured(Value::Bool(v)))
    }
    fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<Data, E> {
        Ok(Data::Structured(v.into()))
    }
    fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<Data, E> {
        Ok(Data::Structured(v.into()))
    }
    fn visit_f64<E: serde::de::Error>(self, v: f64) -> std::result::Result<Data, E> {
        Ok(Data::Structured(v.into()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Data, A::Error> {
        let mut values = Vec::new();
        while let Some(v) = seq.next_element::<Value>()? {
            values.push(v);
        }
        Ok(Data::Structured(Value::Array(values)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Data, A::Error> {
        let mut values = serde_json::Map::new();
        while let Some((k, v)) = map.next_entry::<String, Value>()? {
            values.insert(k, v);
        }
        Ok(Data::Structured(Value::Object(values)))
    }
}
