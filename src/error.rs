use crate::proto::data::DataKind;
use crate::proto::error_info::ErrorInfo;


pub type Result<T> = std::result::Result<T, AblyError>;

/// All failures that cross the library boundary. Codec errors are returned as soon as they
///  occur, dispatcher errors only after the host sequence is exhausted.
#[derive(Debug, thiserror::Error)]
pub enum AblyError {
    #[error("{0} is not supported for the data field")]
    UnsupportedPayloadType(&'static str),
    #[error("payload is {actual:?}, expected {expected:?}")]
    PayloadTypeMismatch { expected: DataKind, actual: DataKind },

    #[error("unknown encoding {0}")]
    UnknownEncoding(String),
    #[error("decrypting {0} without decryption options")]
    DecryptionOptionsMissing(String),
    #[error("encrypting without encryption options")]
    EncryptionOptionsMissing,

    #[error("invalid cipher algorithm {0:?}")]
    InvalidAlgorithmSpec(String),
    #[error("algorithm requires a {expected}-bit key, key has {actual} bits")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("invalid padding character")]
    InvalidPadding,
    #[error("invalid ciphertext length {0}")]
    InvalidCiphertextLength(usize),

    #[error("request to {host} failed: {reason}")]
    TransportFailure { host: String, status: Option<u16>, reason: String },
    #[error("request was cancelled")]
    Cancelled,
    #[error("{0}")]
    NonRetryableResponse(ErrorInfo),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid client options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    MsgpackEncode(#[from] rmp_serde::encode::Error),
    #[error(transparent)]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}

impl AblyError {
    /// the HTTP status associated with this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AblyError::TransportFailure { status, .. } => *status,
            AblyError::NonRetryableResponse(info) if info.status_code != 0 => Some(info.status_code),
            _ => None,
        }
    }
}
