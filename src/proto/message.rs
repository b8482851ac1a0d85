use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::error::{AblyError, Result};
use crate::proto::cipher::{parse_algorithm, CipherParams};
use crate::proto::data::Data;
use crate::proto::encoding::{Encoding, EncodingStage};


/// A message as published to or read from a channel.
///
/// `encoding` always describes how `data` is currently represented: [Message::encode_data] and
///  [Message::decode_data] update both together, one stage at a time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    #[serde(default, skip_serializing_if = "Encoding::is_empty")]
    pub encoding: Encoding,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub extras: Option<Map<String, Value>>,
}

impl Message {
    pub fn new(name: impl Into<String>, data: impl Into<Data>) -> Message {
        Message {
            name: name.into(),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// identifies the connected client that sent this message
    pub fn member_key(&self) -> String {
        format!("{}:{}", self.connection_id, self.client_id)
    }

    /// Reverses the message's encoding chain, starting with the stage that was applied last.
    ///  Each stage is removed from the chain once it was applied, so a fully decoded message has
    ///  an empty encoding. If a stage fails, the error is returned and the message is left in
    ///  its last successfully decoded state.
    pub fn decode_data(&mut self, cipher: Option<&CipherParams>) -> Result<()> {
        if self.data.is_none() || self.encoding.is_empty() {
            return Ok(());
        }

        while let Some(stage) = self.encoding.last().cloned() {
            self.decode_stage(&stage, cipher)?;
            self.encoding.pop();
        }
        Ok(())
    }

    fn decode_stage(&mut self, stage: &EncodingStage, cipher: Option<&CipherParams>) -> Result<()> {
        let Some(data) = &self.data else {
            return Ok(());
        };
        trace!(%stage, "decoding");

        match stage {
            EncodingStage::Base64 => {
                let decoded = BASE64_STANDARD.decode(data.as_text_bytes()?)?;
                self.data = Some(Data::Bytes(decoded.into()));
            }
            EncodingStage::Json => {}
            EncodingStage::Utf8 => {
                // the bytes stay the same, only the payload's variant is restored
                if let Data::Bytes(b) = data {
                    let text = std::str::from_utf8(b)?.to_string();
                    self.data = Some(Data::Text(text));
                }
            }
            EncodingStage::Cipher(name) => {
                let params = cipher
                    .ok_or_else(|| AblyError::DecryptionOptionsMissing(name.clone()))?;
                let channel_cipher = params.cipher()?;
                if parse_algorithm(name) != Some(channel_cipher.key_bits()) {
                    warn!("message was encrypted with {:?}, decrypting with {:?}", name, channel_cipher.algorithm());
                }

                let decrypted = channel_cipher.decrypt(data.as_bytes()?)?;
                self.data = Some(Data::Bytes(decrypted.into()));
            }
            EncodingStage::Unknown(name) => {
                return Err(AblyError::UnknownEncoding(name.clone()));
            }
        }
        Ok(())
    }

    /// Replaces the message's encoding and applies the given stages in order. Each stage is
    ///  appended to the message's encoding as soon as it was applied, so after a failure the
    ///  encoding still describes the partially encoded data. Cipher stages use `cipher` and are
    ///  recorded with the concrete algorithm name, e.g. `aes-128-cbc`.
    pub fn encode_data(&mut self, encoding: &Encoding, cipher: Option<&CipherParams>) -> Result<()> {
        if encoding.is_empty() || self.data.is_none() {
            return Ok(());
        }

        self.encoding.clear();
        for stage in encoding.stages() {
            self.encode_stage(stage, cipher)?;
        }
        Ok(())
    }

    fn encode_stage(&mut self, stage: &EncodingStage, cipher: Option<&CipherParams>) -> Result<()> {
        let Some(data) = &self.data else {
            return Ok(());
        };
        trace!(%stage, "encoding");

        match stage {
            EncodingStage::Base64 => {
                let encoded = BASE64_STANDARD.encode(data.as_text_bytes()?);
                self.data = Some(Data::Text(encoded));
                self.encoding.push(EncodingStage::Base64);
            }
            EncodingStage::Json => {
                self.encoding.push(EncodingStage::Json);
            }
            EncodingStage::Utf8 => {
                if let Data::Bytes(b) = data {
                    std::str::from_utf8(b)?;
                }
                self.encoding.push(EncodingStage::Utf8);
            }
            EncodingStage::Cipher(_) => {
                let params = cipher.ok_or(AblyError::EncryptionOptionsMissing)?;
                let channel_cipher = params.cipher()?;

                let encrypted = channel_cipher.encrypt(data.as_text_bytes()?)?;
                self.data = Some(Data::Bytes(encrypted.into()));
                self.encoding.push(EncodingStage::Cipher(channel_cipher.algorithm()));
            }
            EncodingStage::Unknown(name) => {
                return Err(AblyError::UnknownEncoding(name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;
    use serde_json::json;

    use crate::proto::data::DataKind;
    use crate::proto::protocol::Protocol;

    use super::*;

    fn key_128() -> CipherParams {
        CipherParams::new(b"0123456789abcdef".to_vec(), "cipher+aes-128-cbc")
    }

    fn key_256() -> CipherParams {
        CipherParams::new(b"0123456789abcdef0123456789abcdef".to_vec(), "cipher+aes-256-cbc")
    }

    #[test]
    fn test_encrypt_then_base64() {
        let cipher = key_128();
        let mut msg = Message::new("ping", "pong");

        msg.encode_data(&Encoding::parse("cipher+aes-128-cbc/base64"), Some(&cipher)).unwrap();
        assert_eq!(msg.encoding.to_string(), "aes-128-cbc/base64");
        assert_eq!(msg.data.as_ref().unwrap().kind(), DataKind::Text);

        msg.decode_data(Some(&cipher)).unwrap();
        assert_eq!(msg.data.as_ref().unwrap().as_text().unwrap(), "pong");
        assert!(msg.encoding.is_empty());
    }

    #[rstest]
    fn test_round_trip_content(
        #[values(Data::from("pong"), Data::from(b"\x00\x01binary\xff".as_slice()), Data::from(""))]
        data: Data,
        #[values("base64", "json", "base64/base64", "cipher+aes-128-cbc", "cipher+aes-128-cbc/base64",
            "cipher+aes-128-cbc/cipher+aes-128-cbc")]
        chain: &str,
    ) {
        let cipher = if chain.contains("256") { key_256() } else { key_128() };
        let mut msg = Message::new("m", data.clone());

        msg.encode_data(&Encoding::parse(chain), Some(&cipher)).unwrap();
        assert_eq!(msg.encoding.len(), Encoding::parse(chain).len());

        msg.decode_data(Some(&cipher)).unwrap();
        assert!(msg.encoding.is_empty());
        assert_eq!(msg.data.as_ref().unwrap().as_text_bytes().unwrap(), data.as_text_bytes().unwrap());
    }

    /// a utf-8 stage marks the content as text, so text comes back as text rather than bytes
    #[rstest]
    fn test_round_trip_text(
        #[values(Data::from("pong"), Data::from(""), Data::from("grüße ☃"))]
        data: Data,
        #[values("utf-8", "utf-8/base64", "utf-8/cipher+aes-128-cbc", "utf-8/cipher+aes-128-cbc/base64",
            "json/utf-8/cipher+aes-256-cbc/base64", "utf-8/base64/cipher+aes-128-cbc/base64")]
        chain: &str,
    ) {
        let cipher = if chain.contains("256") { key_256() } else { key_128() };
        let mut msg = Message::new("m", data.clone());

        msg.encode_data(&Encoding::parse(chain), Some(&cipher)).unwrap();
        msg.decode_data(Some(&cipher)).unwrap();

        assert!(msg.encoding.is_empty());
        assert_eq!(msg.data, Some(data));
    }

    #[test]
    fn test_decode_utf8_restores_text() {
        let mut msg = Message {
            data: Some(Data::from(b"pong".as_slice())),
            encoding: Encoding::parse("utf-8"),
            ..Default::default()
        };
        msg.decode_data(None).unwrap();
        assert_eq!(msg.data.as_ref().unwrap().kind(), DataKind::Text);
        assert_eq!(msg.data, Some(Data::from("pong")));
    }

    #[test]
    fn test_decode_utf8_invalid_bytes() {
        let mut msg = Message {
            data: Some(Data::from(b"\xff\xfe".as_slice())),
            encoding: Encoding::parse("utf-8"),
            ..Default::default()
        };
        assert!(matches!(msg.decode_data(None), Err(AblyError::Utf8(_))));
        assert_eq!(msg.encoding.to_string(), "utf-8");
        assert_eq!(msg.data, Some(Data::from(b"\xff\xfe".as_slice())));
    }

    #[test]
    fn test_encode_utf8_on_invalid_bytes_fails() {
        let mut msg = Message::new("m", b"\xff".as_slice());
        let result = msg.encode_data(&Encoding::parse("utf-8/base64"), None);
        assert!(matches!(result, Err(AblyError::Utf8(_))));
        assert!(msg.encoding.is_empty());
    }

    #[rstest]
    #[case::json("json")]
    #[case::json_utf8("json/utf-8")]
    fn test_round_trip_structured(#[case] chain: &str) {
        let data = Data::Structured(json!({"a": [1, 2, {"b": null}]}));
        let mut msg = Message::new("m", data.clone());

        msg.encode_data(&Encoding::parse(chain), None).unwrap();
        assert_eq!(msg.encoding.to_string(), chain);
        msg.decode_data(None).unwrap();

        assert_eq!(msg.data, Some(data));
        assert!(msg.encoding.is_empty());
    }

    #[test]
    fn test_pass_through_keeps_text() {
        let mut msg = Message::new("m", "text");
        msg.encode_data(&Encoding::parse("utf-8"), None).unwrap();
        msg.decode_data(None).unwrap();
        assert_eq!(msg.data, Some(Data::from("text")));
    }

    #[test]
    fn test_encode_structured_as_bytes_fails() {
        let mut msg = Message::new("m", Data::Structured(json!([1])));
        msg.encoding = Encoding::parse("utf-8");

        let result = msg.encode_data(&Encoding::parse("json/base64"), None);
        assert!(matches!(result, Err(AblyError::PayloadTypeMismatch { .. })));
        assert_eq!(msg.encoding.to_string(), "json");
        assert_eq!(msg.data, Some(Data::Structured(json!([1]))));
    }

    #[test]
    fn test_encode_without_cipher_leaves_partial_chain() {
        let mut msg = Message::new("m", "secret");

        let result = msg.encode_data(&Encoding::parse("utf-8/cipher+aes-128-cbc/base64"), None);
        assert!(matches!(result, Err(AblyError::EncryptionOptionsMissing)));
        assert_eq!(msg.encoding.to_string(), "utf-8");
        assert_eq!(msg.data, Some(Data::from("secret")));
    }

    #[test]
    fn test_encode_unknown_stage() {
        let mut msg = Message::new("m", "abc");
        let result = msg.encode_data(&Encoding::parse("base64/gzip"), None);
        assert!(matches!(result, Err(AblyError::UnknownEncoding(name)) if name == "gzip"));
        assert_eq!(msg.encoding.to_string(), "base64");
        assert_eq!(msg.data, Some(Data::from("YWJj")));
    }

    #[test]
    fn test_encode_empty_chain_is_noop() {
        let mut msg = Message::new("m", "abc");
        msg.encoding = Encoding::parse("utf-8");
        msg.encode_data(&Encoding::new(), None).unwrap();
        assert_eq!(msg.encoding.to_string(), "utf-8");
    }

    #[test]
    fn test_encode_with_invalid_key() {
        let mut msg = Message::new("m", "abc");
        let cipher = CipherParams::new(vec![0; 10], "cipher+aes-128-cbc");

        let result = msg.encode_data(&Encoding::parse("cipher+aes-128-cbc"), Some(&cipher));
        assert!(matches!(result, Err(AblyError::InvalidKeyLength { expected: 128, actual: 80 })));
        assert!(msg.encoding.is_empty());
    }

    #[test]
    fn test_decode_without_cipher_stops_at_cipher_stage() {
        let cipher = key_128();
        let mut msg = Message::new("m", "pong");
        msg.encode_data(&Encoding::parse("utf-8/cipher+aes-128-cbc/base64"), Some(&cipher)).unwrap();

        let result = msg.decode_data(None);
        assert!(matches!(result, Err(AblyError::DecryptionOptionsMissing(name)) if name == "aes-128-cbc"));
        assert_eq!(msg.encoding.to_string(), "utf-8/aes-128-cbc");
        assert_eq!(msg.data.as_ref().unwrap().kind(), DataKind::Bytes);

        // picking up where it stopped
        msg.decode_data(Some(&cipher)).unwrap();
        assert_eq!(msg.data.as_ref().unwrap().as_text().unwrap(), "pong");
    }

    #[test]
    fn test_decode_unknown_encoding() {
        let mut msg = Message {
            data: Some(Data::from("YWJj")),
            encoding: Encoding::parse("gzip/base64"),
            ..Default::default()
        };

        let result = msg.decode_data(None);
        assert!(matches!(result, Err(AblyError::UnknownEncoding(name)) if name == "gzip"));
        assert_eq!(msg.data, Some(Data::from(b"abc".as_slice())));
        assert_eq!(msg.encoding.to_string(), "gzip");
    }

    #[test]
    fn test_decode_cipher_on_text_fails() {
        let mut msg = Message {
            data: Some(Data::from("not binary")),
            encoding: Encoding::parse("cipher+aes-128-cbc"),
            ..Default::default()
        };
        let result = msg.decode_data(Some(&key_128()));
        assert!(matches!(result, Err(AblyError::PayloadTypeMismatch { expected: DataKind::Bytes, actual: DataKind::Text })));
    }

    #[test]
    fn test_decode_without_data_is_noop() {
        let mut msg = Message { encoding: Encoding::parse("gzip"), ..Default::default() };
        msg.decode_data(None).unwrap();
        assert_eq!(msg.encoding.to_string(), "gzip");
    }

    #[test]
    fn test_json_wire_format() {
        let mut msg = Message::new("ping", "pong");
        msg.client_id = "c".to_string();
        msg.encoding = Encoding::parse("utf-8");

        let json = String::from_utf8(Protocol::Json.encode(&msg).unwrap()).unwrap();
        assert_eq!(json, r#"{"clientId":"c","name":"ping","data":"pong","encoding":"utf-8","timestamp":0,"extras":null}"#);

        let parsed: Message = Protocol::Json.decode(json.as_bytes()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_json_wire_format_binary() {
        let msg = Message::new("ping", b"pong".as_slice());
        let json = String::from_utf8(Protocol::Json.encode(&msg).unwrap()).unwrap();
        assert_eq!(json, r#"{"name":"ping","data":"cG9uZw==","timestamp":0,"extras":null}"#);
    }

    #[test]
    fn test_msgpack_wire_format() {
        let mut msg = Message::new("ping", "pong");
        msg.connection_id = "conn".to_string();
        msg.timestamp = 1234;

        let buf = Protocol::Msgpack.encode(&msg).unwrap();
        let untyped: Value = Protocol::Msgpack.decode(&buf).unwrap();
        assert_eq!(untyped, json!({"connectionId": "conn", "name": "ping", "data": "pong", "timestamp": 1234, "extras": null}));

        let parsed: Message = Protocol::Msgpack.decode(&buf).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_msgpack_binary_data() {
        let msg = Message::new("ping", b"\x00\xff".as_slice());
        let buf = Protocol::Msgpack.encode(&msg).unwrap();
        let parsed: Message = Protocol::Msgpack.decode(&buf).unwrap();
        assert_eq!(parsed.data, Some(Data::from(b"\x00\xff".as_slice())));
    }

    #[test]
    fn test_encrypted_message_over_the_wire() {
        let cipher = key_256();
        let mut msg = Message::new("secret", "pong");
        msg.encode_data(&Encoding::parse("utf-8/cipher+aes-256-cbc/base64"), Some(&cipher)).unwrap();

        let json = Protocol::Json.encode(&msg).unwrap();
        let mut received: Message = Protocol::Json.decode(&json).unwrap();
        assert_eq!(received.encoding.to_string(), "utf-8/aes-256-cbc/base64");

        received.decode_data(Some(&cipher)).unwrap();
        assert_eq!(received.data.unwrap().as_text().unwrap(), "pong");
    }

    #[test]
    fn test_member_key() {
        let msg = Message {
            client_id: "client".to_string(),
            connection_id: "conn".to_string(),
            ..Default::default()
        };
        assert_eq!(msg.member_key(), "conn:client");
    }
}
