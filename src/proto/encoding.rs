use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};


pub const BASE64: &str = "base64";
pub const JSON: &str = "json";
pub const UTF8: &str = "utf-8";
pub const CIPHER_PREFIX: &str = "cipher";

/// One step of an encoding chain. Names are matched case-sensitively.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EncodingStage {
    Base64,
    Json,
    Utf8,
    /// Either a requested `cipher+<algorithm>` stage or the concrete algorithm name that the
    ///  encoder records (e.g. `aes-128-cbc`). The raw name is kept for display.
    Cipher(String),
    /// anything else - kept so that a message with an unknown encoding can still be parsed,
    ///  decoding it fails when this stage is reached
    Unknown(String),
}

impl EncodingStage {
    pub fn parse(name: &str) -> EncodingStage {
        match name {
            BASE64 => EncodingStage::Base64,
            JSON => EncodingStage::Json,
            UTF8 => EncodingStage::Utf8,
            n if n.starts_with(CIPHER_PREFIX) || is_algorithm_name(n) => EncodingStage::Cipher(n.to_string()),
            n => EncodingStage::Unknown(n.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EncodingStage::Base64 => BASE64,
            EncodingStage::Json => JSON,
            EncodingStage::Utf8 => UTF8,
            EncodingStage::Cipher(name) => name.as_str(),
            EncodingStage::Unknown(name) => name.as_str(),
        }
    }
}

/// the encoder records cipher stages as `<family>-<keybits>-<mode>`
fn is_algorithm_name(name: &str) -> bool {
    let mut parts = name.split('-');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("aes"), Some(bits), Some(_), None) if !bits.is_empty() && bits.bytes().all(|b| b.is_ascii_digit())
    )
}

impl Display for EncodingStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}


/// An ordered encoding chain, written on the wire as slash separated stage names
///  (e.g. `utf-8/cipher+aes-128-cbc/base64`). The first stage was applied first, so decoding
///  works from the last stage backwards.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Encoding(Vec<EncodingStage>);

impl Encoding {
    pub fn new() -> Encoding {
        Encoding(Vec::new())
    }

    pub fn parse(s: &str) -> Encoding {
        // splitting an empty string would yield a single empty stage
        if s.is_empty() {
            return Encoding::new();
        }
        Encoding(s.split('/').map(EncodingStage::parse).collect())
    }

    pub fn stages(&self) -> &[EncodingStage] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, stage: EncodingStage) {
        self.0.push(stage);
    }

    pub fn last(&self) -> Option<&EncodingStage> {
        self.0.last()
    }

    pub fn pop(&mut self) -> Option<EncodingStage> {
        self.0.pop()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, stage) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", stage)?;
        }
        Ok(())
    }
}

impl From<&str> for Encoding {
    fn from(value: &str) -> Self {
        Encoding::parse(value)
    }
}

impl FromIterator<EncodingStage> for Encoding {
    fn from_iter<T: IntoIterator<Item=EncodingStage>>(iter: T) -> Self {
        Encoding(iter.into_iter().collect())
    }
}

impl Serialize for Encoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Encoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.map(|s| Encoding::parse(&s)).unwrap_or_default())
    }
}
