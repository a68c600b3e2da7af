//! Credential lifecycle: direct tokens, device-code OAuth and Copilot token
//! exchange with an expiry-aware cache.

pub mod credential;
pub mod device_client;
pub mod device_code;
pub mod error;
pub mod exchange;
pub mod manager;

pub use credential::{classify_token, Credential, CredentialStore, Provenance};
pub use device_client::DeviceAuthClient;
pub use device_code::{
    poll_until_authorized, AccessTokenSource, DeviceCodePoll, DeviceGrant, PollState, PollStep,
};
pub use error::AuthError;
pub use exchange::CredentialExchanger;
pub use manager::CredentialManager;
