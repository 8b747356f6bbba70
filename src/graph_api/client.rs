use tracing::debug;

use super::auth::AuthClient;
use super::device_flow::DeviceCodeFlow;
use crate::error::{Error, Result};
use crate::types::GraphErrorEnvelope;

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Authenticated access to the signed-in user's mailbox.
///
/// Every call fetches its own bearer token from the [`AuthClient`], so call
/// sites never handle raw tokens.
pub struct MailApiClient<F: DeviceCodeFlow> {
    pub(crate) http: reqwest::Client,
    base_url: String,
    scopes: Vec<String>,
    auth: AuthClient<F>,
}

impl<F: DeviceCodeFlow> MailApiClient<F> {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        scopes: Vec<String>,
        auth: AuthClient<F>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scopes,
            auth,
        }
    }

    /// Scopes every mailbox call asks the token for.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn auth(&self) -> &AuthClient<F> {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut AuthClient<F> {
        &mut self.auth
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) async fn bearer_token(&mut self) -> Result<String> {
        let scopes = self.scopes.clone();
        self.auth.get_token(&scopes).await
    }
}

/// Passes successful responses through; turns anything else into `Error::Api`.
pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<GraphErrorEnvelope>(&body) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => (
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string()),
            body,
        ),
    };

    debug!(status = status.as_u16(), code = %code, "mail service returned an error");
    Err(Error::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
