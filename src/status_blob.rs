//! Activation-status blob codec (spec §4.6).
//!
//! Fixed 16-byte big-endian layout encrypted with a zero IV and no padding.
//! This is safe only because each call produces a fresh plaintext whose
//! randomness is not required for secrecy — the magic bytes carry the
//! integrity check. Do not introduce a random IV or PKCS7 padding here; it
//! would break wire compatibility with the reference implementation.

use crate::crypto::primitives::{aes_cbc_decrypt, aes_cbc_encrypt, Padding};
use crate::error::CryptoResult;

/// Magic bytes identifying a well-formed, correctly-decrypted blob.
pub const MAGIC: [u8; 4] = [0xDE, 0xC0, 0xDE, 0xD1];

/// The decoded activation-status blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBlob {
    pub activation_status: u8,
    pub current_version: u8,
    pub upgrade_version: u8,
    pub failed_attempts: u8,
    pub max_failed_attempts: u8,
}

impl StatusBlob {
    /// Serialize to the 16-byte plaintext layout (magic + fields + zeroed
    /// reserved bytes).
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = self.activation_status;
        out[5] = self.current_version;
        out[6] = self.upgrade_version;
        // out[7..13] reserved, left zero
        out[13] = self.failed_attempts;
        out[14] = self.max_failed_attempts;
        // out[15] reserved, left zero
        out
    }

    /// Parse 16 bytes of plaintext into fields, ignoring reserved bytes.
    pub fn from_bytes(bytes: &[u8; 16]) -> StatusBlob {
        StatusBlob {
            activation_status: bytes[4],
            current_version: bytes[5],
            upgrade_version: bytes[6],
            failed_attempts: bytes[13],
            max_failed_attempts: bytes[14],
        }
    }

    /// True iff the leading 4 bytes of `plaintext` equal [`MAGIC`].
    pub fn is_valid(plaintext: &[u8; 16]) -> bool {
        plaintext[0..4] == MAGIC
    }
}

/// Encrypt a status blob: `AES-CBC-Encrypt(blob, IV=0^16, key=SK_TRANSPORT, NoPadding)`.
pub fn encrypt(blob: &StatusBlob, transport_key: &[u8; 16]) -> CryptoResult<[u8; 16]> {
    let plaintext = blob.to_bytes();
    let iv = [0u8; 16];
    let cipher = aes_cbc_encrypt(&plaintext, &iv, transport_key, Padding::NoPadding)?;
    let mut out = [0u8; 16];
    out.copy_from_slice(&cipher);
    Ok(out)
}

/// Decrypt a status blob ciphertext and return the plaintext bytes. Callers
/// should check [`StatusBlob::is_valid`] before trusting the fields.
pub fn decrypt(ciphertext: &[u8; 16], transport_key: &[u8; 16]) -> CryptoResult<[u8; 16]> {
    let iv = [0u8; 16];
    let plain = aes_cbc_decrypt(ciphertext, &iv, transport_key, Padding::NoPadding)?;
    let mut out = [0u8; 16];
    out.copy_from_slice(&plain);
    Ok(out)
}
