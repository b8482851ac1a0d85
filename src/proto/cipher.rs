use std::fmt::{Debug, Formatter};

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use cbc::{Decryptor, Encryptor};
use rand::RngCore;
use tracing::warn;

use crate::error::{AblyError, Result};
use crate::proto::padding::{pkcs7_pad, pkcs7_unpad};


pub const BLOCK_SIZE: usize = 16;

/// Parses an algorithm string of the form `cipher+aes-<keybits>-cbc` (the `cipher+` prefix is
///  optional) and returns the key length in bits. Unsupported algorithms are logged and
///  reported as `None` rather than as an error.
pub fn parse_algorithm(algorithm: &str) -> Option<usize> {
    let name = algorithm.strip_prefix("cipher+").unwrap_or(algorithm);

    let parts = name.split('-').collect::<Vec<_>>();
    let [family, key_bits, mode] = parts.as_slice() else {
        warn!(algorithm, "malformed cipher algorithm");
        return None;
    };
    if *family != "aes" {
        warn!(algorithm, "unknown encryption algorithm {:?}", family);
        return None;
    }
    if *mode != "cbc" {
        warn!(algorithm, "unknown cipher mode {:?}", mode);
        return None;
    }
    match key_bits.parse() {
        Ok(bits) => Some(bits),
        Err(e) => {
            warn!(algorithm, "unparsable key length: {}", e);
            None
        }
    }
}


/// Cipher configuration for a channel. The key length implied by the algorithm string is
///  checked against the key material when a [ChannelCipher] is created, i.e. at encryption or
///  decryption time.
#[derive(Clone, Eq, PartialEq)]
pub struct CipherParams {
    pub key: Vec<u8>,
    pub algorithm: String,
}

impl Debug for CipherParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CipherParams{{algorithm:{:?}, key:<{} bytes>}}", self.algorithm, self.key.len())
    }
}

impl CipherParams {
    pub fn new(key: impl Into<Vec<u8>>, algorithm: impl Into<String>) -> CipherParams {
        CipherParams {
            key: key.into(),
            algorithm: algorithm.into(),
        }
    }

    /// AES-CBC with the key length taken from the key material
    pub fn aes_cbc(key: impl Into<Vec<u8>>) -> CipherParams {
        let key = key.into();
        let algorithm = format!("aes-{}-cbc", key.len() * 8);
        CipherParams { key, algorithm }
    }

    pub fn cipher(&self) -> Result<ChannelCipher> {
        let key_bits = parse_algorithm(&self.algorithm)
            .ok_or_else(|| AblyError::InvalidAlgorithmSpec(self.algorithm.clone()))?;
        if !matches!(key_bits, 128 | 192 | 256) {
            return Err(AblyError::InvalidAlgorithmSpec(self.algorithm.clone()));
        }
        if self.key.len() * 8 != key_bits {
            return Err(AblyError::InvalidKeyLength { expected: key_bits, actual: self.key.len() * 8 });
        }

        Ok(ChannelCipher {
            key: self.key.clone(),
            key_bits,
        })
    }
}


/// A validated AES-CBC cipher. Encrypted data is the random IV followed by the PKCS#7 padded
///  ciphertext.
pub struct ChannelCipher {
    key: Vec<u8>,
    key_bits: usize,
}

impl Debug for ChannelCipher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChannelCipher{{{}}}", self.algorithm())
    }
}

impl ChannelCipher {
    /// the concrete algorithm name as it is recorded in a message's encoding
    pub fn algorithm(&self) -> String {
        format!("aes-{}-cbc", self.key_bits)
    }

    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        self.encrypt_with_iv(&iv, plaintext)
    }

    pub fn encrypt_with_iv(&self, iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.encrypt_padded(iv, &pkcs7_pad(plaintext, BLOCK_SIZE))
    }

    fn encrypt_padded(&self, iv: &[u8; BLOCK_SIZE], padded: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = match self.key_bits {
            128 => Encryptor::<Aes128>::new_from_slices(&self.key, iv).map(|e| e.encrypt_padded_vec_mut::<NoPadding>(padded)),
            192 => Encryptor::<Aes192>::new_from_slices(&self.key, iv).map(|e| e.encrypt_padded_vec_mut::<NoPadding>(padded)),
            _ => Encryptor::<Aes256>::new_from_slices(&self.key, iv).map(|e| e.encrypt_padded_vec_mut::<NoPadding>(padded)),
        }
            .map_err(|_| self.key_length_error())?;

        let mut result = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        result.extend_from_slice(iv);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        // IV plus at least one block, since padding always adds at least one byte
        if data.len() < 2*BLOCK_SIZE || data.len() % BLOCK_SIZE != 0 {
            return Err(AblyError::InvalidCiphertextLength(data.len()));
        }

        let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
        let padded = match self.key_bits {
            128 => Decryptor::<Aes128>::new_from_slices(&self.key, iv).map(|d| d.decrypt_padded_vec_mut::<NoPadding>(ciphertext)),
            192 => Decryptor::<Aes192>::new_from_slices(&self.key, iv).map(|d| d.decrypt_padded_vec_mut::<NoPadding>(ciphertext)),
            _ => Decryptor::<Aes256>::new_from_slices(&self.key, iv).map(|d| d.decrypt_padded_vec_mut::<NoPadding>(ciphertext)),
        }
            .map_err(|_| self.key_length_error())?
            .map_err(|_| AblyError::InvalidCiphertextLength(data.len()))?;

        Ok(pkcs7_unpad(&padded, BLOCK_SIZE)?.to_vec())
    }

    fn key_length_error(&self) -> AblyError {
        AblyError::InvalidKeyLength { expected: self.key_bits, actual: self.key.len() * 8 }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    const NIST_KEY: [u8; 16] = [0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c];
    const NIST_IV: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
    const NIST_PLAINTEXT: [u8; 16] = [0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17, 0x2a];
    const NIST_CIPHERTEXT: [u8; 16] = [0x76, 0x49, 0xab, 0xac, 0x81, 0x19, 0xb2, 0x46, 0xce, 0xe9, 0x8e, 0x9b, 0x12, 0xe9, 0x19, 0x7d];

    #[rstest]
    #[case::aes_128("cipher+aes-128-cbc", Some(128))]
    #[case::aes_256("cipher+aes-256-cbc", Some(256))]
    #[case::without_prefix("aes-192-cbc", Some(192))]
    #[case::other_family("cipher+des-128-cbc", None)]
    #[case::other_mode("cipher+aes-128-gcm", None)]
    #[case::unparsable_length("cipher+aes-x-cbc", None)]
    #[case::too_few_parts("cipher+aes-128", None)]
    #[case::empty("", None)]
    fn test_parse_algorithm(#[case] algorithm: &str, #[case] expected: Option<usize>) {
        assert_eq!(parse_algorithm(algorithm), expected);
    }

    #[rstest]
    #[case::ok(vec![0; 16], "cipher+aes-128-cbc", true)]
    #[case::ok_256(vec![0; 32], "aes-256-cbc", true)]
    #[case::key_too_short(vec![0; 15], "cipher+aes-128-cbc", false)]
    #[case::key_too_long(vec![0; 32], "cipher+aes-128-cbc", false)]
    #[case::unsupported_length(vec![0; 8], "cipher+aes-64-cbc", false)]
    #[case::wrong_mode(vec![0; 16], "cipher+aes-128-ecb", false)]
    fn test_cipher_validation(#[case] key: Vec<u8>, #[case] algorithm: &str, #[case] valid: bool) {
        assert_eq!(CipherParams::new(key, algorithm).cipher().is_ok(), valid);
    }

    #[test]
    fn test_aes_cbc_params() {
        let params = CipherParams::aes_cbc(vec![1; 24]);
        assert_eq!(params.algorithm, "aes-192-cbc");
        assert_eq!(params.cipher().unwrap().algorithm(), "aes-192-cbc");
    }

    #[test]
    fn test_known_vector() {
        let cipher = CipherParams::aes_cbc(NIST_KEY).cipher().unwrap();
        let encrypted = cipher.encrypt_with_iv(&NIST_IV, &NIST_PLAINTEXT).unwrap();

        // IV, the known block, and a full block of padding
        assert_eq!(encrypted.len(), 3 * BLOCK_SIZE);
        assert_eq!(&encrypted[..16], &NIST_IV);
        assert_eq!(&encrypted[16..32], &NIST_CIPHERTEXT);

        assert_eq!(cipher.decrypt(&encrypted).unwrap(), NIST_PLAINTEXT);
    }

    #[rstest]
    #[case::aes_128(16)]
    #[case::aes_192(24)]
    #[case::aes_256(32)]
    fn test_round_trip(#[case] key_len: usize) {
        let cipher = CipherParams::aes_cbc(vec![7; key_len]).cipher().unwrap();

        for len in [0, 1, 15, 16, 17, 100] {
            let plaintext = vec![b'x'; len];
            let encrypted = cipher.encrypt(&plaintext).unwrap();
            assert_eq!(encrypted.len() % BLOCK_SIZE, 0);
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let cipher = CipherParams::aes_cbc(NIST_KEY).cipher().unwrap();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn test_decrypt_invalid_padding() {
        let cipher = CipherParams::aes_cbc(NIST_KEY).cipher().unwrap();

        let mut block = [0u8; BLOCK_SIZE];
        block[14] = 3;
        block[15] = 2;
        let encrypted = cipher.encrypt_padded(&NIST_IV, &block).unwrap();

        assert!(matches!(cipher.decrypt(&encrypted), Err(AblyError::InvalidPadding)));
    }

    #[rstest]
    #[case::empty(0)]
    #[case::only_iv(16)]
    #[case::not_a_multiple(40)]
    fn test_decrypt_invalid_length(#[case] len: usize) {
        let cipher = CipherParams::aes_cbc(NIST_KEY).cipher().unwrap();
        assert!(matches!(cipher.decrypt(&vec![0; len]), Err(AblyError::InvalidCiphertextLength(n)) if n == len));
    }
}
