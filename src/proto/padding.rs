//! PKCS#7 padding: every pad byte holds the number of pad bytes, and there is always at least
//!  one pad byte.

use crate::error::{AblyError, Result};


pub fn pkcs7_pad(data: &[u8], block_len: usize) -> Vec<u8> {
    assert!(block_len > 0 && block_len <= u8::MAX as usize, "invalid block length {}", block_len);

    let pad_len = block_len - data.len() % block_len;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

/// Strips PKCS#7 padding. A trailing byte of 0 or a value bigger than the block length is
///  treated as 'no padding present', and the data is returned unchanged.
pub fn pkcs7_unpad(data: &[u8], block_len: usize) -> Result<&[u8]> {
    assert!(block_len > 0, "invalid block length {}", block_len);

    if data.is_empty() || data.len() % block_len != 0 {
        return Err(AblyError::InvalidCiphertextLength(data.len()));
    }

    let pad_len = data[data.len() - 1] as usize;
    if pad_len == 0 || pad_len > block_len {
        return Ok(data);
    }

    let (unpadded, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(AblyError::InvalidPadding);
    }
    Ok(unpadded)
}
