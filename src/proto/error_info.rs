use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::proto::protocol::Protocol;


pub const ERROR_HELP_URL: &str = "https://help.ably.io/error";

/// Error details as sent by the service. All fields are optional on the wire, missing or
///  malformed fields are left at their zero value.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub code: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub href: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server_id: String,
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}
fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

impl ErrorInfo {
    /// lenient conversion from an untyped map: numbers may arrive as strings, fields with an
    ///  unexpected type are skipped
    pub fn from_map(map: &Map<String, Value>) -> ErrorInfo {
        let string_field = |name: &str| map.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default();

        ErrorInfo {
            status_code: map.get("statusCode").map(coerce_int)
                .and_then(|n| u16::try_from(n).ok())
                .unwrap_or_default(),
            code: map.get("code").map(coerce_int)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or_default(),
            href: string_field("href"),
            message: string_field("message"),
            server_id: string_field("serverId"),
        }
    }

    /// Builds the error for a non-success HTTP response. The body may hold the error details
    ///  either directly or wrapped in an `error` field; the HTTP status fills in a missing
    ///  status code.
    pub fn from_response(status: u16, body: &[u8], protocol: Protocol) -> ErrorInfo {
        let mut info = match protocol.decode::<Value>(body) {
            Ok(Value::Object(map)) => match map.get("error") {
                Some(Value::Object(inner)) => ErrorInfo::from_map(inner),
                _ => ErrorInfo::from_map(&map),
            },
            Ok(_) => ErrorInfo::default(),
            Err(e) => {
                debug!("error response body is not a valid {:?} document: {}", protocol, e);
                ErrorInfo::default()
            }
        };

        if info.status_code == 0 {
            info.status_code = status;
        }
        if info.message.is_empty() {
            info.message = format!("unexpected response status {}", status);
        }
        info
    }
}

fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[ErrorInfo")?;
        if !self.message.is_empty() {
            write!(f, ":{}", self.message)?;
        }
        if self.status_code != 0 {
            write!(f, ": statusCode={}", self.status_code)?;
        }
        if self.code != 0 {
            write!(f, ": See {}/{}", ERROR_HELP_URL, self.code)?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for ErrorInfo {}
