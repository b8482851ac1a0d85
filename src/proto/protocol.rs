use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::proto::data::Data;
use crate::proto::encoding::{Encoding, EncodingStage};


pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const MSGPACK_CONTENT_TYPE: &str = "application/x-msgpack";

/// The wire format of request and response bodies
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Protocol {
    Json,
    Msgpack,
}

impl Protocol {
    pub fn content_type(&self) -> &'static str {
        match self {
            Protocol::Json => JSON_CONTENT_TYPE,
            Protocol::Msgpack => MSGPACK_CONTENT_TYPE,
        }
    }

    /// the protocol for a response's content type, ignoring parameters like `charset`
    pub fn from_content_type(content_type: &str) -> Option<Protocol> {
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        match mime {
            JSON_CONTENT_TYPE => Some(Protocol::Json),
            MSGPACK_CONTENT_TYPE => Some(Protocol::Msgpack),
            _ => None,
        }
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Protocol::Json => Ok(serde_json::to_vec(value)?),
            // structs as maps with field names rather than positional arrays
            Protocol::Msgpack => Ok(rmp_serde::to_vec_named(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        match self {
            Protocol::Json => Ok(serde_json::from_slice(body)?),
            Protocol::Msgpack => Ok(rmp_serde::from_slice(body)?),
        }
    }

    /// The encoding that describes how a payload is represented in this protocol before any
    ///  channel specific stages (like encryption) are added: JSON has no binary type and needs
    ///  base64, structured values are sent as JSON in both protocols.
    pub fn value_encoding(&self, data: &Data) -> Encoding {
        let stage = match (self, data) {
            (Protocol::Json, Data::Bytes(_)) => Some(EncodingStage::Base64),
            (Protocol::Json, Data::Text(_)) => Some(EncodingStage::Utf8),
            (Protocol::Msgpack, Data::Bytes(_) | Data::Text(_)) => None,
            (_, Data::Structured(_)) => Some(EncodingStage::Json),
        };
        stage.into_iter().collect()
    }
}
