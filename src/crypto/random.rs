// Cryptographically secure random number generation.
//
// The RNG is the one process-wide shared resource the core depends on; it
// must be the platform's cryptographically strong source and safe to call
// from multiple threads, which `OsRng` already guarantees.

use crate::crypto::CryptoResult;
use rand::rngs::OsRng;
use rand::RngCore;

/// Generate `length` cryptographically strong random bytes.
pub fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Fill an existing buffer with cryptographically strong random bytes.
pub fn fill_random(buffer: &mut [u8]) -> CryptoResult<()> {
    OsRng.fill_bytes(buffer);
    Ok(())
}
