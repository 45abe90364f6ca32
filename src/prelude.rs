// Convenient re-exports for common usage.

pub use crate::activation::{
    ActivationConfig, ActivationInitMessage, ActivationInitiator, ActivationResponder,
    ActivationResponseMessage, ClientActivationState, ServerActivationState,
};
pub use crate::client::{DeviceActivationClient, DeviceActivationConfig, DeviceActivationServer, Factor};
pub use crate::counter::Counter;
pub use crate::error::{ActivationError, ActivationResult, CryptoError, CryptoResult, SignatureError};
pub use crate::key_factory::{MasterSecret, NamedKeys, SigningKey};
pub use crate::status_blob::StatusBlob;
pub use crate::token::{format_token_header, TokenId, TokenSecret};
pub use crate::VERSION;
