//! Command-line mail client for Microsoft Graph.
//!
//! Signs in with the OAuth2 device-code flow, keeps the bearer token in
//! memory (optionally persisting it), and reads the profile, lists the
//! inbox, and sends mail on the user's behalf.

pub mod app;
pub mod cli;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod graph_api;
pub mod types;

pub use error::{AuthError, Error, Result};
