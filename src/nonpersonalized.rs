//! Non-personalized end-to-end encryptor (spec §4.8).
//!
//! Encrypt-then-MAC over a session-related secret key, with two
//! independently-derived per-message keys (`adHocIndex` for encryption,
//! `macIndex` for the MAC) that must never collide.

use crate::crypto::constant_time::ConstantTimeMemory;
use crate::crypto::primitives::{aes_cbc_decrypt, aes_cbc_encrypt, hmac_sha256, random, Padding};
use crate::error::{CryptoError, CryptoResult};
use crate::key_factory::derive_hmac;

/// Bounded retry budget for drawing a distinct (adHocIndex, macIndex) pair;
/// defends against a stuck RNG (spec §4.8 step 1).
const MAX_INDEX_ATTEMPTS: u32 = 1000;

/// A complete non-personalized encrypted message, all binary fields raw
/// (Base64 encoding is a wire-layer concern outside this module).
#[derive(Debug, Clone)]
pub struct NonPersonalizedMessage {
    pub application_key: Vec<u8>,
    pub session_index: [u8; 16],
    pub ephemeral_public_key: Vec<u8>,
    pub ad_hoc_index: [u8; 16],
    pub mac_index: [u8; 16],
    pub nonce: [u8; 16],
    pub encrypted_data: Vec<u8>,
    pub mac: [u8; 32],
}

/// Encrypt `original_data` under `session_related_secret_key`, generating
/// fresh per-message indices and nonce.
pub fn encrypt(
    application_key: &[u8],
    session_index: [u8; 16],
    session_related_secret_key: &[u8; 16],
    ephemeral_public_key: &[u8],
    original_data: &[u8],
) -> CryptoResult<NonPersonalizedMessage> {
    let (ad_hoc_index, mac_index) = generate_distinct_indices()?;

    let mut nonce = [0u8; 16];
    nonce.copy_from_slice(&random(16));

    let enc_key = derive_hmac(
        &crate::key_factory::MasterSecret(*session_related_secret_key),
        &ad_hoc_index,
    )?;
    let mac_key = derive_hmac(
        &crate::key_factory::MasterSecret(*session_related_secret_key),
        &mac_index,
    )?;

    let encrypted_data = aes_cbc_encrypt(original_data, &nonce, enc_key.as_bytes(), Padding::Pkcs7)?;
    let mac = hmac_sha256(mac_key.as_bytes(), &encrypted_data)?;

    Ok(NonPersonalizedMessage {
        application_key: application_key.to_vec(),
        session_index,
        ephemeral_public_key: ephemeral_public_key.to_vec(),
        ad_hoc_index,
        mac_index,
        nonce,
        encrypted_data,
        mac,
    })
}

/// Validate and decrypt a received message under `session_related_secret_key`.
pub fn decrypt(
    message: &NonPersonalizedMessage,
    session_related_secret_key: &[u8; 16],
) -> CryptoResult<Vec<u8>> {
    if message.ad_hoc_index == message.mac_index {
        return Err(CryptoError::InvalidInput(
            "adHocIndex must not equal macIndex".to_string(),
        ));
    }

    let mac_key = derive_hmac(
        &crate::key_factory::MasterSecret(*session_related_secret_key),
        &message.mac_index,
    )?;
    let expected_mac = hmac_sha256(mac_key.as_bytes(), &message.encrypted_data)?;
    if !bool::from(ConstantTimeMemory::ct_memcmp(&expected_mac, &message.mac)) {
        return Err(CryptoError::InvalidInput("MAC does not match".to_string()));
    }

    let enc_key = derive_hmac(
        &crate::key_factory::MasterSecret(*session_related_secret_key),
        &message.ad_hoc_index,
    )?;
    aes_cbc_decrypt(&message.encrypted_data, &message.nonce, enc_key.as_bytes(), Padding::Pkcs7)
}

fn generate_distinct_indices() -> CryptoResult<([u8; 16], [u8; 16])> {
    for _ in 0..MAX_INDEX_ATTEMPTS {
        let mut ad_hoc = [0u8; 16];
        ad_hoc.copy_from_slice(&random(16));
        let mut mac = [0u8; 16];
        mac.copy_from_slice(&random(16));
        if ad_hoc != mac {
            return Ok((ad_hoc, mac));
        }
    }
    Err(CryptoError::RngExhaustion(MAX_INDEX_ATTEMPTS))
}
