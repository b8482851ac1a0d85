//! Wire level types: messages, their payloads and the encodings that are applied to payloads.

pub mod cipher;
pub mod data;
pub mod encoding;
pub mod error_info;
pub mod message;
pub mod padding;
pub mod protocol;
