//! Activation ceremony state machines (spec §4.7).
//!
//! `ActivationInitiator` drives the client side (`Idle → Started →
//! KeyExchanged → Active`); `ActivationResponder` drives the server side
//! (`Created → OtpUsed → Active`, with `Blocked`/`Removed` reachable from
//! the collaborator's surrounding session management, not from here).
//! Failure at any step is fatal for the attempt — no partial state survives
//! a failed transition.

use crate::audit::{AuditEntry, AuditEvent, AuditSink};
use crate::counter::Counter;
use crate::crypto::constant_time::ConstantTimeMemory;
use crate::crypto::primitives::{ecdsa_sha256_sign, ecdsa_sha256_verify, random};
pub use crate::error::ActivationError;
use crate::error::ActivationResult;
use crate::key_factory::{self, NamedKeys, SigningKey};
use crate::signature;
use p256::ecdsa::{Signature, SigningKey as EcdsaSigningKey, VerifyingKey as EcdsaVerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;

/// Client-side activation state (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientActivationState {
    Idle,
    Started,
    KeyExchanged,
    Active,
}

/// Server-side activation state (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerActivationState {
    Created,
    OtpUsed,
    Active,
    Blocked,
    Removed,
}

/// Tunables for an activation ceremony.
#[derive(Debug, Clone, Copy)]
pub struct ActivationConfig {
    /// Whether a v2 (numeric-counter) activation may be accepted. New
    /// deployments should leave this `false` (spec §9 "deprecated v2
    /// surface") and only flip it for interop with legacy devices.
    pub allow_v2: bool,
    /// How many signature factors (1-3) the confirmation step requires.
    pub required_factors: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            allow_v2: false,
            required_factors: 1,
        }
    }
}

/// Step 1 of the ceremony: device public key plus the activation OTP.
#[derive(Debug, Clone)]
pub struct ActivationInitMessage {
    pub device_public_bytes: Vec<u8>,
    pub otp: Vec<u8>,
}

/// Step 2: server public key plus an ECDSA signature over
/// `device_public_bytes || server_public_bytes`, and the v3 counter seed if
/// the ceremony is not running in v2-compatibility mode.
#[derive(Debug, Clone)]
pub struct ActivationResponseMessage {
    pub server_public_bytes: Vec<u8>,
    pub signature: Signature,
    pub counter_seed_v3: Option<[u8; 16]>,
}

/// The derived key hierarchy and initial counter state handed back to the
/// collaborator once both sides have completed the ECDH exchange.
#[derive(Debug, Clone)]
pub struct ActivationMaterial {
    pub named_keys: NamedKeys,
    pub initial_counter: Counter,
}

/// Drives the client side of the ceremony.
pub struct ActivationInitiator {
    state: ClientActivationState,
    device_secret: Option<SecretKey>,
    config: ActivationConfig,
}

impl ActivationInitiator {
    pub fn new(config: ActivationConfig) -> Self {
        Self {
            state: ClientActivationState::Idle,
            device_secret: None,
            config,
        }
    }

    pub fn state(&self) -> ClientActivationState {
        self.state
    }

    /// Generate the device key pair and produce the init message.
    #[tracing::instrument(skip(self, otp))]
    pub fn generate_init(&mut self, otp: Vec<u8>) -> ActivationResult<ActivationInitMessage> {
        if self.state != ClientActivationState::Idle {
            return Err(ActivationError::ProtocolViolation(
                "generate_init called outside Idle".to_string(),
            ));
        }
        let device_secret = SecretKey::random(&mut OsRng);
        let device_public_bytes = encode_public_key(&device_secret.public_key());
        self.device_secret = Some(device_secret);
        self.state = ClientActivationState::Started;
        tracing::debug!("activation started");
        Ok(ActivationInitMessage {
            device_public_bytes,
            otp,
        })
    }

    /// Verify the server's signature, derive the master secret and named
    /// keys, and transition to `KeyExchanged`.
    #[tracing::instrument(skip(self, response, server_master_public, audit))]
    pub fn process_response(
        &mut self,
        response: &ActivationResponseMessage,
        server_master_public: &EcdsaVerifyingKey,
        audit: &dyn AuditSink,
    ) -> ActivationResult<ActivationMaterial> {
        if self.state != ClientActivationState::Started {
            return Err(ActivationError::ProtocolViolation(
                "process_response called outside Started".to_string(),
            ));
        }
        let device_secret = self
            .device_secret
            .as_ref()
            .ok_or_else(|| ActivationError::ProtocolViolation("missing device secret".to_string()))?;
        let device_public_bytes = encode_public_key(&device_secret.public_key());

        let mut signed_data = device_public_bytes.clone();
        signed_data.extend_from_slice(&response.server_public_bytes);
        if !ecdsa_sha256_verify(server_master_public, &signed_data, &response.signature) {
            tracing::warn!("activation response signature did not verify");
            audit.log(AuditEntry::new(
                AuditEvent::ActivationFailed {
                    activation_id_hash: crate::audit::hash_for_audit(&device_public_bytes),
                    reason: "server signature did not verify".to_string(),
                },
                None,
            ));
            return Err(ActivationError::ProtocolViolation(
                "server signature did not verify".to_string(),
            ));
        }

        let server_public = decode_public_key(&response.server_public_bytes)?;
        let master_secret = key_factory::shared_secret(device_secret, &server_public)?;
        let named_keys = key_factory::derive_named_keys(&master_secret)?;

        let initial_counter = match (self.config.allow_v2, response.counter_seed_v3) {
            (_, Some(seed)) => Counter::V3(seed),
            (true, None) => Counter::V2(0),
            (false, None) => {
                return Err(ActivationError::ProtocolViolation(
                    "v2 activation rejected by configuration".to_string(),
                ))
            }
        };

        self.state = ClientActivationState::KeyExchanged;
        audit.log(AuditEntry::new(
            AuditEvent::ActivationKeyExchanged {
                activation_id_hash: crate::audit::hash_for_audit(&device_public_bytes),
            },
            None,
        ));
        Ok(ActivationMaterial {
            named_keys,
            initial_counter,
        })
    }

    /// Sign `confirmation_data` under `keys` (possession-first, in the fixed
    /// possession/knowledge/biometry order) and transition to `Active`.
    /// `keys.len()` must equal `config.required_factors`.
    #[tracing::instrument(skip(self, keys, confirmation_data))]
    pub fn finalize(
        &mut self,
        keys: &[SigningKey],
        confirmation_data: &[u8],
        counter: &Counter,
    ) -> ActivationResult<String> {
        if self.state != ClientActivationState::KeyExchanged {
            return Err(ActivationError::ProtocolViolation(
                "finalize called outside KeyExchanged".to_string(),
            ));
        }
        if keys.len() != self.config.required_factors {
            return Err(ActivationError::ProtocolViolation(format!(
                "confirmation requires {} factor(s), got {}",
                self.config.required_factors,
                keys.len()
            )));
        }
        let confirmation = signature::compute(confirmation_data, keys, counter)
            .map_err(|_| ActivationError::ProtocolViolation("confirmation signing failed".to_string()))?;
        self.state = ClientActivationState::Active;
        tracing::debug!("activation active");
        Ok(confirmation)
    }
}

/// Drives the server side of the ceremony.
pub struct ActivationResponder {
    state: ServerActivationState,
    otp: Vec<u8>,
    server_secret: Option<SecretKey>,
    config: ActivationConfig,
}

impl ActivationResponder {
    pub fn new(otp: Vec<u8>, config: ActivationConfig) -> Self {
        Self {
            state: ServerActivationState::Created,
            otp,
            server_secret: None,
            config,
        }
    }

    pub fn state(&self) -> ServerActivationState {
        self.state
    }

    /// Validate the OTP, generate the server key pair, and sign
    /// `device_public_bytes || server_public_bytes` with the server's
    /// long-term master key.
    #[tracing::instrument(skip(self, init, server_master_signing, audit))]
    pub fn process_init(
        &mut self,
        init: &ActivationInitMessage,
        server_master_signing: &EcdsaSigningKey,
        audit: &dyn AuditSink,
    ) -> ActivationResult<ActivationResponseMessage> {
        if self.state != ServerActivationState::Created {
            return Err(ActivationError::ProtocolViolation(
                "process_init called outside Created".to_string(),
            ));
        }
        if !bool::from(ConstantTimeMemory::ct_memcmp(&init.otp, &self.otp)) {
            tracing::warn!("activation OTP did not match");
            audit.log(AuditEntry::new(
                AuditEvent::ActivationFailed {
                    activation_id_hash: crate::audit::hash_for_audit(&init.device_public_bytes),
                    reason: "OTP mismatch".to_string(),
                },
                None,
            ));
            return Err(ActivationError::ProtocolViolation("OTP mismatch".to_string()));
        }

        let server_secret = SecretKey::random(&mut OsRng);
        let server_public_bytes = encode_public_key(&server_secret.public_key());

        let mut signed_data = init.device_public_bytes.clone();
        signed_data.extend_from_slice(&server_public_bytes);
        let signature = ecdsa_sha256_sign(server_master_signing, &signed_data)?;

        let counter_seed_v3 = if self.config.allow_v2 {
            None
        } else {
            let mut seed = [0u8; 16];
            seed.copy_from_slice(&random(16));
            Some(seed)
        };

        self.server_secret = Some(server_secret);
        self.state = ServerActivationState::OtpUsed;
        audit.log(AuditEntry::new(
            AuditEvent::ActivationStarted {
                activation_id_hash: crate::audit::hash_for_audit(&init.device_public_bytes),
            },
            None,
        ));
        Ok(ActivationResponseMessage {
            server_public_bytes,
            signature,
            counter_seed_v3,
        })
    }

    /// Access the server's ECDH key pair after [`process_init`](Self::process_init),
    /// needed by the collaborator to derive the same master secret as the client.
    pub fn server_key_pair(&self) -> Option<(&SecretKey, PublicKey)> {
        self.server_secret
            .as_ref()
            .map(|secret| (secret, secret.public_key()))
    }

    /// Verify the client's confirmation signature and transition to
    /// `Active`. `keys.len()` must equal `config.required_factors`.
    #[tracing::instrument(skip(self, confirmation, confirmation_data, keys, audit))]
    pub fn process_confirmation(
        &mut self,
        confirmation: &str,
        confirmation_data: &[u8],
        keys: &[SigningKey],
        counter: &Counter,
        audit: &dyn AuditSink,
    ) -> ActivationResult<()> {
        if self.state != ServerActivationState::OtpUsed {
            return Err(ActivationError::ProtocolViolation(
                "process_confirmation called outside OtpUsed".to_string(),
            ));
        }
        if keys.len() != self.config.required_factors {
            return Err(ActivationError::ProtocolViolation(format!(
                "confirmation requires {} factor(s), got {}",
                self.config.required_factors,
                keys.len()
            )));
        }
        let ok = signature::verify(confirmation, confirmation_data, keys, counter)
            .map_err(|_| ActivationError::ProtocolViolation("confirmation verification failed".to_string()))?;
        if !ok {
            tracing::warn!("activation confirmation signature did not verify");
            audit.log(AuditEntry::new(
                AuditEvent::ActivationFailed {
                    activation_id_hash: crate::audit::hash_for_audit(confirmation.as_bytes()),
                    reason: "confirmation signature did not verify".to_string(),
                },
                None,
            ));
            return Err(ActivationError::ProtocolViolation(
                "confirmation signature did not verify".to_string(),
            ));
        }
        self.state = ServerActivationState::Active;
        audit.log(AuditEntry::new(
            AuditEvent::ActivationCompleted {
                activation_id_hash: crate::audit::hash_for_audit(confirmation.as_bytes()),
            },
            None,
        ));
        Ok(())
    }
}

fn encode_public_key(public_key: &PublicKey) -> Vec<u8> {
    public_key.to_encoded_point(false).as_bytes().to_vec()
}

fn decode_public_key(bytes: &[u8]) -> ActivationResult<PublicKey> {
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| ActivationError::ProtocolViolation("malformed public key encoding".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NoOpAuditSink;

    #[test]
    fn happy_path_both_sides_agree_on_master_secret() {
        let server_master_signing = EcdsaSigningKey::random(&mut OsRng);
        let server_master_public = EcdsaVerifyingKey::from(&server_master_signing);
        let audit = NoOpAuditSink;

        let mut client = ActivationInitiator::new(ActivationConfig::default());
        let init = client.generate_init(b"123456".to_vec()).unwrap();
        assert_eq!(client.state(), ClientActivationState::Started);

        let mut server = ActivationResponder::new(b"123456".to_vec(), ActivationConfig::default());
        let response = server
            .process_init(&init, &server_master_signing, &audit)
            .unwrap();
        assert_eq!(server.state(), ServerActivationState::OtpUsed);

        let material = client
            .process_response(&response, &server_master_public, &audit)
            .unwrap();
        assert_eq!(client.state(), ClientActivationState::KeyExchanged);

        let confirmation_data = b"confirmation";
        let confirmation = client
            .finalize(
                std::slice::from_ref(&material.named_keys.possession),
                confirmation_data,
                &material.initial_counter,
            )
            .unwrap();
        assert_eq!(client.state(), ClientActivationState::Active);

        server
            .process_confirmation(
                &confirmation,
                confirmation_data,
                std::slice::from_ref(&material.named_keys.possession),
                &material.initial_counter,
                &audit,
            )
            .unwrap();
        assert_eq!(server.state(), ServerActivationState::Active);
    }

    #[test]
    fn finalize_rejects_wrong_factor_count() {
        let server_master_signing = EcdsaSigningKey::random(&mut OsRng);
        let server_master_public = EcdsaVerifyingKey::from(&server_master_signing);
        let audit = NoOpAuditSink;

        let config = ActivationConfig {
            required_factors: 2,
            ..ActivationConfig::default()
        };
        let mut client = ActivationInitiator::new(config);
        let init = client.generate_init(b"123456".to_vec()).unwrap();
        let mut server = ActivationResponder::new(b"123456".to_vec(), config);
        let response = server
            .process_init(&init, &server_master_signing, &audit)
            .unwrap();
        let material = client
            .process_response(&response, &server_master_public, &audit)
            .unwrap();

        let err = client
            .finalize(
                std::slice::from_ref(&material.named_keys.possession),
                b"confirmation",
                &material.initial_counter,
            )
            .unwrap_err();
        assert!(matches!(err, ActivationError::ProtocolViolation(_)));
        assert_eq!(client.state(), ClientActivationState::KeyExchanged);
    }

    #[test]
    fn wrong_otp_is_rejected() {
        let server_master_signing = EcdsaSigningKey::random(&mut OsRng);
        let audit = NoOpAuditSink;
        let mut client = ActivationInitiator::new(ActivationConfig::default());
        let init = client.generate_init(b"123456".to_vec()).unwrap();

        let mut server = ActivationResponder::new(b"654321".to_vec(), ActivationConfig::default());
        let err = server
            .process_init(&init, &server_master_signing, &audit)
            .unwrap_err();
        assert!(matches!(err, ActivationError::ProtocolViolation(_)));
        assert_eq!(server.state(), ServerActivationState::Created);
    }

    #[test]
    fn tampered_server_signature_is_rejected() {
        let server_master_signing = EcdsaSigningKey::random(&mut OsRng);
        let other_signing = EcdsaSigningKey::random(&mut OsRng);
        let other_public = EcdsaVerifyingKey::from(&other_signing);
        let audit = NoOpAuditSink;

        let mut client = ActivationInitiator::new(ActivationConfig::default());
        let init = client.generate_init(b"123456".to_vec()).unwrap();
        let mut server = ActivationResponder::new(b"123456".to_vec(), ActivationConfig::default());
        let response = server
            .process_init(&init, &server_master_signing, &audit)
            .unwrap();

        let err = client
            .process_response(&response, &other_public, &audit)
            .unwrap_err();
        assert!(matches!(err, ActivationError::ProtocolViolation(_)));
        assert_eq!(client.state(), ClientActivationState::Started);
    }

    #[test]
    fn out_of_order_calls_are_protocol_violations() {
        let mut client = ActivationInitiator::new(ActivationConfig::default());
        let server_master_public = EcdsaVerifyingKey::from(&EcdsaSigningKey::random(&mut OsRng));
        let audit = NoOpAuditSink;
        let bogus_response = ActivationResponseMessage {
            server_public_bytes: encode_public_key(&SecretKey::random(&mut OsRng).public_key()),
            signature: ecdsa_sha256_sign(&EcdsaSigningKey::random(&mut OsRng), b"x").unwrap(),
            counter_seed_v3: Some([0u8; 16]),
        };
        let err = client
            .process_response(&bogus_response, &server_master_public, &audit)
            .unwrap_err();
        assert!(matches!(err, ActivationError::ProtocolViolation(_)));
    }
}
