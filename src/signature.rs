//! Multi-factor request signature engine (spec §4.4).
//!
//! Produces an N-component decimal string (N = number of factors) joined by
//! `-`, each component 8 digits zero-padded. The inner-chaining loop reuses
//! `keys[j+1]` — one-based — while the outer loop is zero-based; this is a
//! wire-contract quirk of the reference implementation, reproduced exactly
//! rather than "fixed" (spec §9).

use crate::counter::Counter;
use crate::crypto::constant_time::ConstantTimeMemory;
use crate::crypto::primitives::hmac_sha256;
use crate::error::SignatureError;
use crate::key_factory::SigningKey;

/// Decimal digits per factor, fixed by the protocol.
const DIGITS_PER_FACTOR: u32 = 8;

/// Compute the multi-factor signature over `data` using 1-3 `keys`, in the
/// fixed possession/knowledge/biometry order, at the given counter value.
pub fn compute(data: &[u8], keys: &[SigningKey], counter: &Counter) -> Result<String, SignatureError> {
    let n = keys.len();
    if n == 0 || n > 3 {
        return Err(SignatureError::InvalidKeyCount(n));
    }
    let ctr_bytes = counter.materialize();

    let mut components = Vec::with_capacity(n);
    for i in 0..n {
        let mut d = hmac_sha256(keys[i].as_bytes(), &ctr_bytes)
            .map_err(|_| SignatureError::InvalidCounter(ctr_bytes.len()))?;
        for j in 0..i {
            let inner = hmac_sha256(keys[j + 1].as_bytes(), &ctr_bytes)
                .map_err(|_| SignatureError::InvalidCounter(ctr_bytes.len()))?;
            d = hmac_sha256(&inner, &d).map_err(|_| SignatureError::InvalidCounter(ctr_bytes.len()))?;
        }
        let mac = hmac_sha256(&d, data).map_err(|_| SignatureError::InvalidCounter(ctr_bytes.len()))?;
        components.push(component_from_mac(&mac));
    }

    Ok(components.join("-"))
}

/// Recompute the signature and compare to `candidate` in constant time.
pub fn verify(
    candidate: &str,
    data: &[u8],
    keys: &[SigningKey],
    counter: &Counter,
) -> Result<bool, SignatureError> {
    let expected = compute(data, keys, counter)?;
    let ok = bool::from(ConstantTimeMemory::ct_memcmp(
        candidate.as_bytes(),
        expected.as_bytes(),
    ));
    if !ok {
        tracing::warn!("request signature did not verify");
    }
    Ok(ok)
}

fn component_from_mac(mac: &[u8; 32]) -> String {
    let idx = mac.len() - 4;
    let raw = u32::from_be_bytes([mac[idx], mac[idx + 1], mac[idx + 2], mac[idx + 3]]);
    let masked = raw & 0x7FFF_FFFF;
    let modulus = 10u32.pow(DIGITS_PER_FACTOR);
    format!("{:0width$}", masked % modulus, width = DIGITS_PER_FACTOR as usize)
}
