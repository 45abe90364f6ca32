// Cryptographic primitive provider.
//
// Every operation here is a pure function or a thin, stateless wrapper over
// a RustCrypto/ecosystem crate — no protocol state lives in this module.
// The algorithm choices are fixed by the protocol (secp256r1, AES-128-CBC,
// HMAC-SHA-256, SHA-256, PBKDF2-HMAC-SHA-1) and are not configurable.

pub mod constant_time;
pub mod primitives;
pub mod random;

pub use crate::error::{CryptoError, CryptoResult};
