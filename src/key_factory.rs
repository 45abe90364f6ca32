//! Derives the named symmetric key hierarchy from a master secret (spec §4.2).
//!
//! Two fixed-index KDFs exist side by side because the wire format demands
//! bit-exact legacy (v2) compatibility that a single modern KDF cannot give:
//! the AES-index KDF for v2/transport/vault keys, the HMAC-index KDF for v3
//! and for the non-personalized channel.

use crate::crypto::primitives::{aes_cbc_encrypt, hmac_sha256, xor_fold_32_to_16, Padding};
use crate::error::{CryptoError, CryptoResult};
use p256::{PublicKey, SecretKey};
use std::fmt;
use zeroize::Zeroize;

/// Fixed named-key indices used by the AES-index KDF (spec §4.2 table).
pub const INDEX_POSSESSION: u64 = 1;
pub const INDEX_KNOWLEDGE: u64 = 2;
pub const INDEX_BIOMETRY: u64 = 3;
pub const INDEX_TRANSPORT: u64 = 1000;
pub const INDEX_VAULT: u64 = 2000;

/// The 16-byte master secret derived once at activation. Never transmitted,
/// never logged; zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct MasterSecret(pub [u8; 16]);

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MasterSecret").field(&"[REDACTED]").finish()
    }
}

/// A single 16-byte symmetric signing/encryption key derived from the
/// master secret. Redacted `Debug`, zeroized on drop, same convention as
/// `MasterSecret`.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SigningKey(pub [u8; 16]);

impl SigningKey {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningKey").field(&"[REDACTED]").finish()
    }
}

/// The full hierarchy of named keys derived from one master secret.
#[derive(Debug, Clone)]
pub struct NamedKeys {
    pub possession: SigningKey,
    pub knowledge: SigningKey,
    pub biometry: SigningKey,
    pub transport: SigningKey,
    pub vault: SigningKey,
}

/// Compute the 16-byte protocol shared secret: `xor_fold_32_to_16(ECDH(priv, pub))`.
pub fn shared_secret(private_key: &SecretKey, public_key: &PublicKey) -> CryptoResult<MasterSecret> {
    let ecdh_output = crate::crypto::primitives::ecdh_secp256r1(private_key, public_key);
    let folded = xor_fold_32_to_16(&ecdh_output)?;
    Ok(MasterSecret(folded))
}

/// AES-index KDF (spec §4.2): `derive(MS, index)` = first 16 bytes of
/// `AES-CBC-Encrypt(0x00*8 || index_be, IV=0^16, key=MS, NoPadding)`,
/// i.e. a single-block AES-ECB-equivalent operation.
pub fn derive(master_secret: &MasterSecret, index: u64) -> CryptoResult<SigningKey> {
    let mut block = [0u8; 16];
    block[8..].copy_from_slice(&index.to_be_bytes());
    let iv = [0u8; 16];
    let cipher = aes_cbc_encrypt(&block, &iv, &master_secret.0, Padding::NoPadding)?;
    if cipher.len() != 16 {
        return Err(CryptoError::CryptoFailure);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&cipher[..16]);
    Ok(SigningKey(out))
}

/// HMAC-index KDF (spec §4.2, used for v3 and the non-personalized channel):
/// `deriveHmac(MS, index_bytes) = xor_fold_32_to_16(HMAC-SHA256(MS, index_bytes))`.
pub fn derive_hmac(master_secret: &MasterSecret, index_bytes: &[u8]) -> CryptoResult<SigningKey> {
    let h = hmac_sha256(&master_secret.0, index_bytes)?;
    let folded = xor_fold_32_to_16(&h)?;
    Ok(SigningKey(folded))
}

/// Derive the full named-key hierarchy from a master secret in one pass.
pub fn derive_named_keys(master_secret: &MasterSecret) -> CryptoResult<NamedKeys> {
    Ok(NamedKeys {
        possession: derive(master_secret, INDEX_POSSESSION)?,
        knowledge: derive(master_secret, INDEX_KNOWLEDGE)?,
        biometry: derive(master_secret, INDEX_BIOMETRY)?,
        transport: derive(master_secret, INDEX_TRANSPORT)?,
        vault: derive(master_secret, INDEX_VAULT)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn master_secret_debug_is_redacted() {
        let ms = MasterSecret([0x42; 16]);
        assert_eq!(format!("{:?}", ms), "MasterSecret(\"[REDACTED]\")");
    }

    #[test]
    fn derive_is_deterministic() {
        let ms = MasterSecret([0x11; 16]);
        let a = derive(&ms, INDEX_POSSESSION).unwrap();
        let b = derive(&ms, INDEX_POSSESSION).unwrap();
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn derive_varies_by_index() {
        let ms = MasterSecret([0x11; 16]);
        let possession = derive(&ms, INDEX_POSSESSION).unwrap();
        let knowledge = derive(&ms, INDEX_KNOWLEDGE).unwrap();
        assert_ne!(possession.0, knowledge.0);
    }

    #[test]
    fn derive_hmac_is_deterministic() {
        let ms = MasterSecret([0x22; 16]);
        let index_bytes = [0u8; 16];
        let a = derive_hmac(&ms, &index_bytes).unwrap();
        let b = derive_hmac(&ms, &index_bytes).unwrap();
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn shared_secret_matches_on_both_sides() {
        let a = SecretKey::random(&mut OsRng);
        let b = SecretKey::random(&mut OsRng);
        let ms_a = shared_secret(&a, &b.public_key()).unwrap();
        let ms_b = shared_secret(&b, &a.public_key()).unwrap();
        assert_eq!(ms_a.0, ms_b.0);
    }

    #[test]
    fn named_keys_are_pairwise_distinct() {
        let ms = MasterSecret([0x33; 16]);
        let keys = derive_named_keys(&ms).unwrap();
        let all = [
            keys.possession.0,
            keys.knowledge.0,
            keys.biometry.0,
            keys.transport.0,
            keys.vault.0,
        ];
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(all[i], all[j]);
            }
        }
    }
}
