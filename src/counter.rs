//! Counter module (spec §4.3): the one piece of long-lived mutable state
//! the core depends on. Materialization is deterministic; advancement is
//! the collaborator's responsibility to serialize per activation.

use crate::crypto::primitives::sha256;
use crate::error::{CryptoError, CryptoResult};

/// Legacy (v2) numeric counter or current (v3) hash-chain counter.
/// A single signature function accepts either, branching only at
/// materialization (spec §9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Deprecated wire family; bit-compatible with legacy deployments but
    /// new activations should reject it unless explicitly enabled.
    V2(u64),
    V3([u8; 16]),
}

impl Counter {
    /// 16-byte counter material fed into the signature engine: `0x00*8 ||
    /// CTR_be` for v2, `CTR_DATA` unchanged for v3.
    pub fn materialize(&self) -> [u8; 16] {
        match self {
            Counter::V2(value) => {
                let mut out = [0u8; 16];
                out[8..].copy_from_slice(&value.to_be_bytes());
                out
            }
            Counter::V3(data) => *data,
        }
    }

    /// Advance by one accepted signature: +1 for v2, one SHA-256 hash step
    /// truncated to 16 bytes for v3.
    pub fn advance(&self) -> Counter {
        match self {
            Counter::V2(value) => Counter::V2(value.wrapping_add(1)),
            Counter::V3(data) => Counter::V3(truncate16(&sha256(data))),
        }
    }

    /// Advance by `n` accepted signatures in one step.
    pub fn advance_by(&self, n: u64) -> Counter {
        let mut current = *self;
        for _ in 0..n {
            current = current.advance();
        }
        current
    }
}

fn truncate16(digest: &[u8; 32]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

/// Parse 16 bytes of v3 counter material, rejecting any other length.
pub fn v3_from_bytes(bytes: &[u8]) -> CryptoResult<Counter> {
    if bytes.len() != 16 {
        return Err(CryptoError::InvalidInput(format!(
            "v3 counter material must be 16 bytes, got {}",
            bytes.len()
        )));
    }
    let mut data = [0u8; 16];
    data.copy_from_slice(bytes);
    Ok(Counter::V3(data))
}
