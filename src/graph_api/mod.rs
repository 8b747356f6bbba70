//! Microsoft Graph mail API split into logical submodules
//!
//! - auth: token cache and sign-in state
//! - device_flow: the OAuth2 device-code exchange
//! - client: the authenticated mail client and error mapping
//! - profile: the signed-in user's identity
//! - messages: inbox listing
//! - operations: sending mail

pub mod auth;
pub mod client;
pub mod device_flow;
pub mod messages;
pub mod operations;
pub mod profile;

pub use auth::{AuthClient, AuthState, Credential};
pub use client::{MailApiClient, DEFAULT_GRAPH_BASE_URL};
pub use device_flow::{
    ConsolePrompt, DeviceCodeChallenge, DeviceCodeFlow, DeviceCodePrompt, IssuedToken,
    MicrosoftDeviceFlow,
};
pub use messages::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
