//! OAuth2 device authorization grant against the Microsoft identity platform.
//!
//! The flow asks for a device code, shows the user code and verification
//! URL through a [`DeviceCodePrompt`], then polls the token endpoint until
//! the user approves, declines, or the code runs out.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AuthError;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// What the identity provider hands back when a device code is issued.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeChallenge {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds until the device code stops being accepted.
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Ready-made instructions for the user, when the provider sends one.
    pub message: Option<String>,
}

const fn default_interval() -> u64 {
    5
}

/// A bearer token produced by a completed sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Shows the user how to approve the sign-in.
pub trait DeviceCodePrompt: Send + Sync {
    fn show(&self, challenge: &DeviceCodeChallenge);
}

/// Prints the sign-in instructions to stdout.
pub struct ConsolePrompt;

impl DeviceCodePrompt for ConsolePrompt {
    fn show(&self, challenge: &DeviceCodeChallenge) {
        match &challenge.message {
            Some(message) => println!("{message}"),
            None => println!(
                "To sign in, open {} and enter the code {}",
                challenge.verification_uri, challenge.user_code
            ),
        }
    }
}

// Define a trait for the device-code exchange to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceCodeFlow: Send + Sync {
    /// Runs one complete sign-in for `scopes`, suspending until it resolves.
    async fn authorize(&self, scopes: &[String]) -> Result<IssuedToken, AuthError>;
}

/// Device-code flow over HTTP against `{authority}/{tenant}/oauth2/v2.0/...`.
pub struct MicrosoftDeviceFlow {
    http: reqwest::Client,
    authority_host: String,
    client_id: String,
    tenant_id: String,
    max_wait: Duration,
    prompt: Box<dyn DeviceCodePrompt>,
}

impl MicrosoftDeviceFlow {
    pub fn new(
        http: reqwest::Client,
        authority_host: impl Into<String>,
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            max_wait: Duration::from_secs(900),
            prompt: Box::new(ConsolePrompt),
        }
    }

    /// Upper bound on how long to wait for approval, independent of the code's own expiry.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_prompt(mut self, prompt: Box<dyn DeviceCodePrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/{}",
            self.authority_host, self.tenant_id, name
        )
    }

    pub async fn request_device_code(
        &self,
        scopes: &[String],
    ) -> Result<DeviceCodeChallenge, AuthError> {
        let scope = scopes.join(" ");
        let mut params = HashMap::new();
        params.insert("client_id", self.client_id.as_str());
        params.insert("scope", scope.as_str());

        let response = self
            .http
            .post(self.endpoint("devicecode"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(protocol_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn poll_once(&self, device_code: &str) -> Result<PollOutcome, AuthError> {
        let mut params = HashMap::new();
        params.insert("grant_type", DEVICE_CODE_GRANT);
        params.insert("client_id", self.client_id.as_str());
        params.insert("device_code", device_code);

        let response = self
            .http
            .post(self.endpoint("token"))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            let token: TokenResponse = response.json().await?;
            let expires_at = token.expires_in.and_then(expiry_from_now);
            return Ok(PollOutcome::Approved(IssuedToken {
                access_token: token.access_token,
                expires_at,
            }));
        }

        let status = response.status();
        let error: OAuthErrorResponse = match response.json().await {
            Ok(error) => error,
            Err(_) => {
                return Err(AuthError::Protocol {
                    code: status.as_u16().to_string(),
                    description: status.canonical_reason().unwrap_or_default().to_string(),
                });
            }
        };

        match error.error.as_str() {
            "authorization_pending" => Ok(PollOutcome::Pending),
            "slow_down" => Ok(PollOutcome::SlowDown),
            "authorization_declined" | "access_denied" => Err(AuthError::Declined),
            "expired_token" | "code_expired" => Err(AuthError::Expired),
            _ => Err(AuthError::Protocol {
                code: error.error,
                description: error.error_description,
            }),
        }
    }
}

// Lifetimes chrono cannot represent leave the expiry unknown.
fn expiry_from_now(secs: i64) -> Option<DateTime<Utc>> {
    let expires_at = chrono::Duration::try_seconds(secs)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));
    if expires_at.is_none() {
        warn!(expires_in = secs, "token lifetime out of range, expiry unknown");
    }
    expires_at
}

enum PollOutcome {
    Pending,
    SlowDown,
    Approved(IssuedToken),
}

async fn protocol_error(response: reqwest::Response) -> AuthError {
    let status = response.status();
    match response.json::<OAuthErrorResponse>().await {
        Ok(error) => AuthError::Protocol {
            code: error.error,
            description: error.error_description,
        },
        Err(_) => AuthError::Protocol {
            code: status.as_u16().to_string(),
            description: status.canonical_reason().unwrap_or_default().to_string(),
        },
    }
}

#[async_trait]
impl DeviceCodeFlow for MicrosoftDeviceFlow {
    async fn authorize(&self, scopes: &[String]) -> Result<IssuedToken, AuthError> {
        let challenge = self.request_device_code(scopes).await?;
        self.prompt.show(&challenge);
        info!(
            verification_uri = %challenge.verification_uri,
            expires_in = challenge.expires_in,
            "waiting for device-code approval"
        );

        let started = Instant::now();
        let code_lifetime = Duration::from_secs(challenge.expires_in);
        let mut interval = Duration::from_secs(challenge.interval);

        loop {
            let waited = started.elapsed().saturating_add(interval);
            if waited > self.max_wait {
                warn!(max_wait = self.max_wait.as_secs(), "device-code wait bound reached");
                return Err(AuthError::Timeout(self.max_wait.as_secs()));
            }
            if waited > code_lifetime {
                return Err(AuthError::Expired);
            }

            tokio::time::sleep(interval).await;

            match self.poll_once(&challenge.device_code).await? {
                PollOutcome::Approved(token) => {
                    debug!(expires_at = ?token.expires_at, "device-code sign-in approved");
                    return Ok(token);
                }
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => {
                    interval = interval.saturating_add(SLOW_DOWN_STEP);
                    debug!(interval_secs = interval.as_secs(), "identity provider asked to slow down");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_deserialization_defaults_interval() {
        let json = r#"{
            "device_code": "DAQABAAEAAAD",
            "user_code": "FJ6KLMN2Q",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900
        }"#;

        let challenge: DeviceCodeChallenge = serde_json::from_str(json).unwrap();
        assert_eq!(challenge.user_code, "FJ6KLMN2Q");
        assert_eq!(challenge.interval, 5);
        assert!(challenge.message.is_none());
    }

    #[test]
    fn unrepresentable_lifetime_leaves_expiry_unknown() {
        assert!(expiry_from_now(i64::MAX).is_none());
        let expires_at = expiry_from_now(3600).expect("an hour is representable");
        assert!(expires_at > Utc::now() + chrono::Duration::minutes(59));
    }

    #[test]
    fn endpoints_are_tenant_scoped() {
        let flow = MicrosoftDeviceFlow::new(
            reqwest::Client::new(),
            "https://login.microsoftonline.com/",
            "client",
            "consumers",
        );
        assert_eq!(
            flow.endpoint("devicecode"),
            "https://login.microsoftonline.com/consumers/oauth2/v2.0/devicecode"
        );
        assert_eq!(
            flow.endpoint("token"),
            "https://login.microsoftonline.com/consumers/oauth2/v2.0/token"
        );
    }
}
