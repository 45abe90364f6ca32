//! High-level facade over the activation ceremony, signature engine, and
//! token engine (spec §4.7 collaborator surface).
//!
//! Mirrors the activation-management shape of a typical session client:
//! pending ceremonies keyed by an opaque activation id, promoted to active
//! key material once the ceremony reaches `Active`.

use crate::activation::{
    ActivationConfig, ActivationInitMessage, ActivationInitiator, ActivationResponder,
    ActivationResponseMessage,
};
use crate::audit::{AuditSink, NoOpAuditSink};
use crate::counter::Counter;
use crate::error::{ActivationError, ActivationResult};
use crate::key_factory::{NamedKeys, SigningKey};
use crate::signature;
use p256::ecdsa::{SigningKey as EcdsaSigningKey, VerifyingKey as EcdsaVerifyingKey};
use std::collections::HashMap;
use std::sync::Arc;

static NOOP_AUDIT_SINK: NoOpAuditSink = NoOpAuditSink;

/// The signature factors a request may be signed with, in the fixed
/// possession/knowledge/biometry order (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factor {
    Possession,
    Knowledge,
    Biometry,
}

impl Factor {
    fn select(self, keys: &NamedKeys) -> SigningKey {
        match self {
            Factor::Possession => keys.possession.clone(),
            Factor::Knowledge => keys.knowledge.clone(),
            Factor::Biometry => keys.biometry.clone(),
        }
    }
}

/// The leading `count` factors in the fixed possession/knowledge/biometry
/// order, used to satisfy `ActivationConfig::required_factors`.
fn leading_factor_keys(keys: &NamedKeys, count: usize) -> Vec<SigningKey> {
    [Factor::Possession, Factor::Knowledge, Factor::Biometry]
        .into_iter()
        .take(count)
        .map(|f| f.select(keys))
        .collect()
}

/// Client-side configuration: ceremony tunables plus an optional audit sink.
pub struct DeviceActivationConfig {
    pub activation: ActivationConfig,
    pub audit_sink: Option<Arc<dyn AuditSink>>,
}

impl Default for DeviceActivationConfig {
    fn default() -> Self {
        Self {
            activation: ActivationConfig::default(),
            audit_sink: None,
        }
    }
}

struct ActiveActivation {
    named_keys: NamedKeys,
    counter: Counter,
}

/// Manages one or more in-progress and completed activations on the device
/// side, and signs subsequent requests once an activation is active.
pub struct DeviceActivationClient {
    config: DeviceActivationConfig,
    pending: HashMap<Vec<u8>, ActivationInitiator>,
    active: HashMap<Vec<u8>, ActiveActivation>,
}

impl DeviceActivationClient {
    pub fn new(config: DeviceActivationConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            active: HashMap::new(),
        }
    }

    fn audit(&self) -> &dyn AuditSink {
        self.config
            .audit_sink
            .as_deref()
            .unwrap_or(&NOOP_AUDIT_SINK)
    }

    /// Begin an activation: generate the device key pair and the init message.
    pub fn start_activation(
        &mut self,
        activation_id: &[u8],
        otp: Vec<u8>,
    ) -> ActivationResult<ActivationInitMessage> {
        let mut initiator = ActivationInitiator::new(self.config.activation);
        let init = initiator.generate_init(otp)?;
        self.pending.insert(activation_id.to_vec(), initiator);
        Ok(init)
    }

    /// Process the server's response, deriving the named-key hierarchy.
    pub fn complete_key_exchange(
        &mut self,
        activation_id: &[u8],
        response: &ActivationResponseMessage,
        server_master_public: &EcdsaVerifyingKey,
    ) -> ActivationResult<()> {
        let audit: &dyn AuditSink = self.config.audit_sink.as_deref().unwrap_or(&NOOP_AUDIT_SINK);
        let initiator = self.pending.get_mut(activation_id).ok_or_else(|| {
            ActivationError::ProtocolViolation("no pending activation with that id".to_string())
        })?;
        let material = initiator.process_response(response, server_master_public, audit)?;
        self.active.insert(
            activation_id.to_vec(),
            ActiveActivation {
                named_keys: material.named_keys,
                counter: material.initial_counter,
            },
        );
        Ok(())
    }

    /// Sign the confirmation message under the leading `config.activation.
    /// required_factors` named keys, completing the ceremony on the client
    /// side.
    pub fn confirm_activation(
        &mut self,
        activation_id: &[u8],
        confirmation_data: &[u8],
    ) -> ActivationResult<String> {
        let initiator = self.pending.get_mut(activation_id).ok_or_else(|| {
            ActivationError::ProtocolViolation("no pending activation with that id".to_string())
        })?;
        let active = self.active.get(activation_id).ok_or_else(|| {
            ActivationError::ProtocolViolation("key exchange not completed yet".to_string())
        })?;
        let keys = leading_factor_keys(&active.named_keys, self.config.activation.required_factors);
        initiator.finalize(&keys, confirmation_data, &active.counter)
    }

    /// Sign `data` with the requested factors at the activation's current
    /// counter value, then advance the counter.
    pub fn sign_request(
        &mut self,
        activation_id: &[u8],
        data: &[u8],
        factors: &[Factor],
    ) -> ActivationResult<String> {
        let active = self.active.get_mut(activation_id).ok_or_else(|| {
            ActivationError::ProtocolViolation("no active activation with that id".to_string())
        })?;
        let keys: Vec<SigningKey> = factors.iter().map(|f| f.select(&active.named_keys)).collect();
        let signature = signature::compute(data, &keys, &active.counter)
            .map_err(|e| ActivationError::ProtocolViolation(e.to_string()))?;
        active.counter = active.counter.advance();
        Ok(signature)
    }

    pub fn has_active_activation(&self, activation_id: &[u8]) -> bool {
        self.active.contains_key(activation_id)
    }

    /// Read back the named-key hierarchy for an active activation, e.g. to
    /// persist it or to hand `SK_TRANSPORT` to the status-blob codec.
    pub fn named_keys(&self, activation_id: &[u8]) -> Option<&NamedKeys> {
        self.active.get(activation_id).map(|a| &a.named_keys)
    }

    /// Read back the current counter for an active activation.
    pub fn counter(&self, activation_id: &[u8]) -> Option<Counter> {
        self.active.get(activation_id).map(|a| a.counter)
    }

    pub fn remove_activation(&mut self, activation_id: &[u8]) {
        self.pending.remove(activation_id);
        self.active.remove(activation_id);
    }
}

/// Manages one or more in-progress activations on the server side.
pub struct DeviceActivationServer {
    config: DeviceActivationConfig,
    pending: HashMap<Vec<u8>, ActivationResponder>,
    active: HashMap<Vec<u8>, ActiveActivation>,
}

impl DeviceActivationServer {
    pub fn new(config: DeviceActivationConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            active: HashMap::new(),
        }
    }

    fn audit(&self) -> &dyn AuditSink {
        self.config
            .audit_sink
            .as_deref()
            .unwrap_or(&NOOP_AUDIT_SINK)
    }

    /// Validate the OTP and produce the signed response message.
    pub fn process_init(
        &mut self,
        activation_id: &[u8],
        init: &ActivationInitMessage,
        otp: Vec<u8>,
        server_master_signing: &EcdsaSigningKey,
    ) -> ActivationResult<ActivationResponseMessage> {
        let mut responder = ActivationResponder::new(otp, self.config.activation);
        let response = responder.process_init(init, server_master_signing, self.audit())?;
        self.pending.insert(activation_id.to_vec(), responder);
        Ok(response)
    }

    /// Record the named-key hierarchy once the collaborator has derived it
    /// from the responder's key pair (see `ActivationResponder::server_key_pair`).
    pub fn record_key_material(&mut self, activation_id: &[u8], named_keys: NamedKeys, counter: Counter) {
        self.active
            .insert(activation_id.to_vec(), ActiveActivation { named_keys, counter });
    }

    /// Verify the client's confirmation and transition to `Active`.
    pub fn confirm_activation(
        &mut self,
        activation_id: &[u8],
        confirmation: &str,
        confirmation_data: &[u8],
    ) -> ActivationResult<()> {
        let audit: &dyn AuditSink = self.config.audit_sink.as_deref().unwrap_or(&NOOP_AUDIT_SINK);
        let responder = self.pending.get_mut(activation_id).ok_or_else(|| {
            ActivationError::ProtocolViolation("no pending activation with that id".to_string())
        })?;
        let active = self.active.get(activation_id).ok_or_else(|| {
            ActivationError::ProtocolViolation("key material not recorded yet".to_string())
        })?;
        let keys = leading_factor_keys(&active.named_keys, self.config.activation.required_factors);
        responder.process_confirmation(confirmation, confirmation_data, &keys, &active.counter, audit)
    }

    pub fn has_active_activation(&self, activation_id: &[u8]) -> bool {
        self.active.contains_key(activation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn full_ceremony_and_signed_request() {
        let server_master_signing = EcdsaSigningKey::random(&mut OsRng);
        let server_master_public = EcdsaVerifyingKey::from(&server_master_signing);

        let mut client = DeviceActivationClient::new(DeviceActivationConfig::default());
        let mut server = DeviceActivationServer::new(DeviceActivationConfig::default());

        let activation_id = b"activation-1".to_vec();
        let init = client
            .start_activation(&activation_id, b"123456".to_vec())
            .unwrap();

        let response = server
            .process_init(&activation_id, &init, b"123456".to_vec(), &server_master_signing)
            .unwrap();

        client
            .complete_key_exchange(&activation_id, &response, &server_master_public)
            .unwrap();

        // A real deployment derives the server-side named keys from ECDH on
        // the responder's secret key and the device's public key; this test
        // only needs both sides to hold matching key material, so it reuses
        // what the client already derived.
        let named_keys = client.named_keys(&activation_id).unwrap().clone();
        let counter = client.counter(&activation_id).unwrap();
        server.record_key_material(&activation_id, named_keys, counter);

        let confirmation_data = b"confirmation";
        let confirmation = client
            .confirm_activation(&activation_id, confirmation_data)
            .unwrap();

        server
            .confirm_activation(&activation_id, &confirmation, confirmation_data)
            .unwrap();

        assert!(client.has_active_activation(&activation_id));
        assert!(server.has_active_activation(&activation_id));

        let signed = client
            .sign_request(&activation_id, b"POST&/pa/signature/validate", &[Factor::Possession])
            .unwrap();
        assert_eq!(signed.len(), 8);
    }

    #[test]
    fn two_factor_confirmation_requirement_is_enforced_end_to_end() {
        let server_master_signing = EcdsaSigningKey::random(&mut OsRng);
        let server_master_public = EcdsaVerifyingKey::from(&server_master_signing);

        let config = || DeviceActivationConfig {
            activation: ActivationConfig {
                required_factors: 2,
                ..ActivationConfig::default()
            },
            audit_sink: None,
        };
        let mut client = DeviceActivationClient::new(config());
        let mut server = DeviceActivationServer::new(config());

        let activation_id = b"two-factor-activation".to_vec();
        let init = client
            .start_activation(&activation_id, b"123456".to_vec())
            .unwrap();
        let response = server
            .process_init(&activation_id, &init, b"123456".to_vec(), &server_master_signing)
            .unwrap();
        client
            .complete_key_exchange(&activation_id, &response, &server_master_public)
            .unwrap();

        let named_keys = client.named_keys(&activation_id).unwrap().clone();
        let counter = client.counter(&activation_id).unwrap();
        server.record_key_material(&activation_id, named_keys, counter);

        let confirmation_data = b"confirmation";
        let confirmation = client
            .confirm_activation(&activation_id, confirmation_data)
            .unwrap();
        server
            .confirm_activation(&activation_id, &confirmation, confirmation_data)
            .unwrap();

        assert!(client.has_active_activation(&activation_id));
        assert!(server.has_active_activation(&activation_id));
    }

    #[test]
    fn sign_request_without_active_activation_fails() {
        let mut client = DeviceActivationClient::new(DeviceActivationConfig::default());
        let err = client
            .sign_request(b"missing", b"data", &[Factor::Possession])
            .unwrap_err();
        assert!(matches!(err, ActivationError::ProtocolViolation(_)));
    }

    #[test]
    fn remove_activation_clears_both_maps() {
        let mut client = DeviceActivationClient::new(DeviceActivationConfig::default());
        let activation_id = b"activation-2".to_vec();
        client.start_activation(&activation_id, b"000000".to_vec()).unwrap();
        client.remove_activation(&activation_id);
        assert!(!client.has_active_activation(&activation_id));
        assert!(client
            .confirm_activation(&activation_id, b"data")
            .is_err());
    }
}
