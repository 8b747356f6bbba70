use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::device_flow::DeviceCodeFlow;
use crate::credential_store::CredentialRecord;
use crate::error::{Error, Result};

/// Where the session stands with the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    PendingDeviceCode,
    Authenticated,
    Expired,
}

/// Client identity plus the token currently held for it.
#[derive(Debug, Clone)]
pub struct Credential {
    pub client_id: String,
    pub tenant_id: String,
    /// Scopes the token below was issued for.
    pub scopes: Vec<String>,
    pub token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
}

impl Credential {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry.is_some_and(|expiry| now >= expiry)
    }

    fn covers_exactly(&self, scopes: &[String]) -> bool {
        scope_set(&self.scopes) == scope_set(scopes)
    }

    fn forget_token(&mut self) {
        self.token = None;
        self.token_expiry = None;
    }
}

fn scope_set(scopes: &[String]) -> BTreeSet<&str> {
    scopes.iter().map(String::as_str).collect()
}

/// Owns the device-code sign-in and the in-memory token cache.
pub struct AuthClient<F: DeviceCodeFlow> {
    credential: Credential,
    state: AuthState,
    flow: F,
}

impl<F: DeviceCodeFlow> AuthClient<F> {
    /// Sets up the client identity. Nothing is sent over the network until a token is needed.
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        scopes: Vec<String>,
        flow: F,
    ) -> Self {
        Self {
            credential: Credential {
                client_id: client_id.into(),
                tenant_id: tenant_id.into(),
                scopes,
                token: None,
                token_expiry: None,
            },
            state: AuthState::Unauthenticated,
            flow,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Current state. A held token past its expiry reports `Expired`.
    pub fn state(&self) -> AuthState {
        match self.state {
            AuthState::Authenticated if self.credential.is_expired(Utc::now()) => {
                AuthState::Expired
            }
            state => state,
        }
    }

    /// Returns the cached token if it was issued for exactly `scopes` and is unexpired.
    pub fn cached_token(&self, scopes: &[String]) -> Option<&str> {
        if self.state != AuthState::Authenticated {
            return None;
        }
        if !self.credential.covers_exactly(scopes) || self.credential.is_expired(Utc::now()) {
            return None;
        }
        self.credential.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns a bearer token for `scopes`, running the device-code flow when
    /// the cached one is missing, expired, or was issued for other scopes.
    pub async fn get_token(&mut self, scopes: &[String]) -> Result<String> {
        if let Some(token) = self.cached_token(scopes) {
            return Ok(token.to_string());
        }

        if self.state == AuthState::Authenticated {
            if self.credential.is_expired(Utc::now()) {
                debug!("cached token expired");
                self.state = AuthState::Expired;
            } else {
                debug!(
                    held = %self.credential.scopes.join(" "),
                    requested = %scopes.join(" "),
                    "cached token was issued for different scopes"
                );
            }
        }

        self.transition(AuthState::PendingDeviceCode);
        match self.flow.authorize(scopes).await {
            Ok(issued) => {
                self.credential.scopes = scopes.to_vec();
                self.credential.token = Some(issued.access_token);
                self.credential.token_expiry = issued.expires_at;
                self.transition(AuthState::Authenticated);
                info!(scopes = %scopes.join(" "), "signed in");
                Ok(self.credential.token.clone().unwrap_or_default())
            }
            Err(e) => {
                warn!(error = %e, "device-code sign-in failed");
                self.credential.forget_token();
                self.transition(AuthState::Unauthenticated);
                Err(Error::Authentication(e))
            }
        }
    }

    /// Seeds the session from a persisted record without signing in.
    ///
    /// A stale record is not checked here; the next `get_token` call notices
    /// the expiry and signs in again.
    pub fn restore_from_store(&mut self, record: CredentialRecord) {
        self.credential.scopes = record.scopes;
        self.credential.token = Some(record.token);
        self.credential.token_expiry = record.expires_at;
        self.transition(AuthState::Authenticated);
    }

    /// Record to persist for the current token, if there is one.
    pub fn snapshot(&self) -> Option<CredentialRecord> {
        if self.state != AuthState::Authenticated {
            return None;
        }
        let token = self.credential.token.clone().filter(|t| !t.is_empty())?;
        Some(CredentialRecord {
            scopes: self.credential.scopes.clone(),
            token,
            expires_at: self.credential.token_expiry,
        })
    }

    pub fn sign_out(&mut self) {
        self.credential.forget_token();
        self.transition(AuthState::Unauthenticated);
    }

    fn transition(&mut self, next: AuthState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "auth state change");
            self.state = next;
        }
    }
}
