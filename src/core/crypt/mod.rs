//! Symmetric encryption for credential blobs inside saved-workflow files.
//!
//! AES in CFB mode with a process-wide IV derived from the configured salt.
//! Identical plaintexts therefore produce identical ciphertexts; the only
//! cleartext handled here is a credential object used at submit time.

use crate::core::error::EngineError;
use crate::core::types::ErrorCategory;
use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use serde_json::Value;
use thiserror::Error;

/// Cipher block size; the salt is adjusted to exactly this many characters.
pub const SALT_LENGTH: usize = 16;
/// Accepted passcode lengths, smallest to largest.
pub const KEY_LENGTHS: [usize; 3] = [16, 24, 32];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptError {
    #[error("encryption error")]
    Encrypt,
    #[error("decryption error")]
    Decrypt,
}

impl From<CryptError> for EngineError {
    fn from(err: CryptError) -> Self {
        EngineError::new(ErrorCategory::CryptError, err.to_string()).with_code("WF-CRYPT-001")
    }
}

/// Adjust the salt to exactly [`SALT_LENGTH`] characters.
///
/// Longer values are truncated; shorter values are right-padded with `-`.
pub fn adjust_salt(salt: &str) -> String {
    let mut adjusted: String = salt.chars().take(SALT_LENGTH).collect();
    while adjusted.chars().count() < SALT_LENGTH {
        adjusted.push('-');
    }
    adjusted
}

/// Adjust the passcode to one of the accepted [`KEY_LENGTHS`].
///
/// A passcode longer than the maximum is truncated to it; otherwise it is
/// right-padded with `.` up to the next accepted length.
pub fn adjust_passcode(passcode: &str) -> String {
    let max = KEY_LENGTHS[KEY_LENGTHS.len() - 1];
    let count = passcode.chars().count();
    if count > max {
        return passcode.chars().take(max).collect();
    }
    let mut adjusted = passcode.to_string();
    let mut count = count;
    while !KEY_LENGTHS.contains(&count) {
        adjusted.push('.');
        count += 1;
    }
    adjusted
}

fn fit_bytes(mut bytes: Vec<u8>, pad: u8, allowed: &[usize]) -> Vec<u8> {
    let max = allowed.iter().copied().max().unwrap_or(0);
    if bytes.len() > max {
        bytes.truncate(max);
        return bytes;
    }
    while !allowed.contains(&bytes.len()) {
        bytes.push(pad);
    }
    bytes
}

/// AES-CFB encryption with a fixed, length-adjusted IV.
#[derive(Debug, Clone)]
pub struct Crypt {
    iv: [u8; SALT_LENGTH],
}

impl Crypt {
    /// Build an instance around the configured salt, adjusting its length.
    pub fn new(salt: &str) -> Self {
        let adjusted = adjust_salt(salt);
        let bytes = fit_bytes(adjusted.into_bytes(), b'-', &[SALT_LENGTH]);
        let mut iv = [0u8; SALT_LENGTH];
        iv.copy_from_slice(&bytes[..SALT_LENGTH]);
        Crypt { iv }
    }

    /// The expected salt length in characters.
    pub fn salt_length() -> usize {
        SALT_LENGTH
    }

    /// Encrypt `plain_text`, returning base64 text of the ciphertext.
    pub fn encrypt(&self, plain_text: &str, passcode: &str) -> Result<String, CryptError> {
        let key = fit_bytes(adjust_passcode(passcode).into_bytes(), b'.', &KEY_LENGTHS);
        let mut buffer = plain_text.as_bytes().to_vec();
        match key.len() {
            16 => Encryptor::<Aes128>::new_from_slices(&key, &self.iv)
                .map_err(|_| CryptError::Encrypt)?
                .encrypt(&mut buffer),
            24 => Encryptor::<Aes192>::new_from_slices(&key, &self.iv)
                .map_err(|_| CryptError::Encrypt)?
                .encrypt(&mut buffer),
            32 => Encryptor::<Aes256>::new_from_slices(&key, &self.iv)
                .map_err(|_| CryptError::Encrypt)?
                .encrypt(&mut buffer),
            _ => return Err(CryptError::Encrypt),
        }
        Ok(BASE64.encode(buffer))
    }

    /// Decrypt base64 `secure_text` produced by [`Crypt::encrypt`].
    pub fn decrypt(&self, secure_text: &str, passcode: &str) -> Result<String, CryptError> {
        let key = fit_bytes(adjust_passcode(passcode).into_bytes(), b'.', &KEY_LENGTHS);
        let mut buffer = BASE64
            .decode(secure_text.as_bytes())
            .map_err(|_| CryptError::Decrypt)?;
        match key.len() {
            16 => Decryptor::<Aes128>::new_from_slices(&key, &self.iv)
                .map_err(|_| CryptError::Decrypt)?
                .decrypt(&mut buffer),
            24 => Decryptor::<Aes192>::new_from_slices(&key, &self.iv)
                .map_err(|_| CryptError::Decrypt)?
                .decrypt(&mut buffer),
            32 => Decryptor::<Aes256>::new_from_slices(&key, &self.iv)
                .map_err(|_| CryptError::Decrypt)?
                .decrypt(&mut buffer),
            _ => return Err(CryptError::Decrypt),
        }
        String::from_utf8(buffer).map_err(|_| CryptError::Decrypt)
    }

    /// Serialise a JSON value and encrypt it.
    pub fn encrypt_value(&self, value: &Value, passcode: &str) -> Result<String, CryptError> {
        let text = serde_json::to_string(value).map_err(|_| CryptError::Encrypt)?;
        self.encrypt(&text, passcode)
    }

    /// Decrypt and parse a JSON value sealed by [`Crypt::encrypt_value`].
    pub fn decrypt_value(&self, secure_text: &str, passcode: &str) -> Result<Value, CryptError> {
        let text = self.decrypt(secure_text, passcode)?;
        serde_json::from_str(&text).map_err(|_| CryptError::Decrypt)
    }
}
