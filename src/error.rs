//! Error taxonomy for the device-activation cryptographic core.
//!
//! Kept kind-based per the protocol's error design: callers branch on the
//! *kind* of failure, never on a free-form message, and nothing here
//! carries key material.

use thiserror::Error;

/// Errors raised by the primitive provider and key factory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Wrong length, wrong format, or an unknown version was supplied.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Key material was rejected by a primitive (bad curve point, wrong size, ...).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The underlying provider reported a failure. The message is
    /// deliberately generic so callers cannot distinguish "bad padding"
    /// from "bad key" from the error text (padding-oracle resistance).
    #[error("cryptographic operation failed")]
    CryptoFailure,

    /// After the bounded retry budget, the RNG still failed to produce
    /// distinct values where distinctness was required.
    #[error("random source exhausted after {0} attempts")]
    RngExhaustion(u32),
}

/// Result alias used throughout the crypto primitives and key factory.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by the signature engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// `keys.len()` was not in `1..=3`.
    #[error("invalid key count: expected 1-3 keys, got {0}")]
    InvalidKeyCount(usize),

    /// The counter material was not exactly 16 bytes after materialization.
    #[error("invalid counter material: expected 16 bytes, got {0}")]
    InvalidCounter(usize),
}

/// Errors raised by the activation ceremony state machine.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// A cryptographic primitive failed during the ceremony.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A structural/ordering problem in the handshake (wrong magic, message
    /// received out of state, signature that does not verify, ...).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Result alias used by the activation ceremony.
pub type ActivationResult<T> = Result<T, ActivationError>;
