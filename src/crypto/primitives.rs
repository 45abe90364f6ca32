//! Named wrappers over the protocol's fixed algorithm set (spec §4.1, §6).
//!
//! Every function here is pure and stateless; the only shared resource is
//! the platform RNG (see [`crate::crypto::random`]). Algorithm choices are
//! not configurable — secp256r1, AES-128-CBC, HMAC-SHA-256, SHA-256,
//! PBKDF2-HMAC-SHA-1 — because interop requires bit-exact behavior on both
//! sides of the wire.

use crate::crypto::random::random_bytes;
use crate::error::{CryptoError, CryptoResult};
use aes::Aes128;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{PublicKey, SecretKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES-CBC padding mode. PKCS#7 for variable-length data, NoPadding for the
/// single-block KDF and the status blob, which are always exactly 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Pkcs7,
    NoPadding,
}

/// Draw `n` cryptographically strong random bytes.
pub fn random(n: usize) -> Vec<u8> {
    random_bytes(n)
}

/// HMAC-SHA-256 over `data` keyed with `key`. `key` may be any length.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> CryptoResult<[u8; 32]> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKey("HMAC key".to_string()))?;
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// AES-128-CBC encrypt. `key` and `iv` are always 16 bytes. With
/// [`Padding::NoPadding`], `plain.len()` must be a multiple of 16.
pub fn aes_cbc_encrypt(
    plain: &[u8],
    iv: &[u8; 16],
    key: &[u8; 16],
    padding: Padding,
) -> CryptoResult<Vec<u8>> {
    let enc = Aes128CbcEnc::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKey("AES-CBC key/IV".to_string()))?;
    match padding {
        Padding::Pkcs7 => Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plain)),
        Padding::NoPadding => {
            if plain.len() % 16 != 0 {
                return Err(CryptoError::InvalidInput(
                    "NoPadding requires a plaintext length that is a multiple of 16".to_string(),
                ));
            }
            Ok(enc.encrypt_padded_vec_mut::<NoPadding>(plain))
        }
    }
}

/// AES-128-CBC decrypt, the inverse of [`aes_cbc_encrypt`].
pub fn aes_cbc_decrypt(
    cipher: &[u8],
    iv: &[u8; 16],
    key: &[u8; 16],
    padding: Padding,
) -> CryptoResult<Vec<u8>> {
    let dec = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKey("AES-CBC key/IV".to_string()))?;
    match padding {
        Padding::Pkcs7 => dec
            .decrypt_padded_vec_mut::<Pkcs7>(cipher)
            .map_err(|_| CryptoError::CryptoFailure),
        Padding::NoPadding => {
            if cipher.len() % 16 != 0 {
                return Err(CryptoError::InvalidInput(
                    "NoPadding requires a ciphertext length that is a multiple of 16".to_string(),
                ));
            }
            dec.decrypt_padded_vec_mut::<NoPadding>(cipher)
                .map_err(|_| CryptoError::CryptoFailure)
        }
    }
}

/// ECDH over secp256r1. Returns the 32-byte x-coordinate of the shared
/// point, as required for interop with the reference implementation (no
/// extra KDF is applied here — callers fold it themselves via
/// [`xor_fold_32_to_16`]).
pub fn ecdh_secp256r1(private_key: &SecretKey, public_key: &PublicKey) -> [u8; 32] {
    let shared = p256::ecdh::diffie_hellman(
        private_key.to_nonzero_scalar(),
        public_key.as_affine(),
    );
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    out
}

/// ECDSA-SHA-256 sign over secp256r1.
pub fn ecdsa_sha256_sign(signing_key: &SigningKey, data: &[u8]) -> CryptoResult<Signature> {
    signing_key
        .try_sign(data)
        .map_err(|_| CryptoError::CryptoFailure)
}

/// ECDSA-SHA-256 verify over secp256r1.
pub fn ecdsa_sha256_verify(verifying_key: &VerifyingKey, data: &[u8], signature: &Signature) -> bool {
    verifying_key.verify(data, signature).is_ok()
}

/// PBKDF2-HMAC-SHA-1 with the protocol's fixed 10,000 iterations and
/// 128-bit output.
pub fn pbkdf2_hmac_sha1(password_utf8: &[u8], salt: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    pbkdf2::pbkdf2_hmac::<Sha1>(password_utf8, salt, 10_000, &mut out);
    out
}

/// `out[i] = b[i] XOR b[i + 16]` for `i` in `0..16`. Fails unless `b` is
/// exactly 32 bytes.
pub fn xor_fold_32_to_16(b: &[u8]) -> CryptoResult<[u8; 16]> {
    if b.len() != 32 {
        return Err(CryptoError::InvalidInput(format!(
            "xor_fold_32_to_16 requires 32 bytes, got {}",
            b.len()
        )));
    }
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = b[i] ^ b[i + 16];
    }
    Ok(out)
}
