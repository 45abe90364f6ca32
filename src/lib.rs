// Cryptographic core for a multi-factor device-activation and
// request-signing protocol.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! See the README for scope and the fixed algorithm choices this crate
//! implements bit-exact.

/// Activation ceremony state machines and their wire messages.
pub mod activation;
/// Audit logging for the activation lifecycle and verification failures.
pub mod audit;
/// High-level facade tying activation, signing, and key state together.
pub mod client;
/// Counter module: v2 numeric and v3 hash-chain counter materialization.
pub mod counter;
/// Named wrappers over the fixed algorithm set (ECDH, AES-CBC, HMAC, ...).
pub mod crypto;
/// Error taxonomy shared across the crate.
pub mod error;
/// Derivation of the named symmetric key hierarchy from a master secret.
pub mod key_factory;
/// Non-personalized end-to-end encrypt-then-MAC channel.
pub mod nonpersonalized;
/// Commonly used re-exports.
pub mod prelude;
/// Multi-factor request signature engine.
pub mod signature;
/// Activation-status blob codec.
pub mod status_blob;
/// Panic-free system time access.
pub mod time;
/// Short-lived authentication token engine.
pub mod token;

pub use error::{ActivationError, ActivationResult, CryptoError, CryptoResult};

/// Crate version, re-exported for callers that want to log it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
