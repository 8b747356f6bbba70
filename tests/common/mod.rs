#![allow(dead_code)]

use std::time::Duration;

use graphmail::graph_api::{
    AuthClient, DeviceCodeChallenge, DeviceCodePrompt, MailApiClient, MicrosoftDeviceFlow,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "common";
pub const CLIENT_ID: &str = "11111111-2222-3333-4444-555555555555";
pub const ISSUED_TOKEN: &str = "graph-token";

/// Swallows the sign-in instructions during tests.
pub struct SilentPrompt;

impl DeviceCodePrompt for SilentPrompt {
    fn show(&self, _challenge: &DeviceCodeChallenge) {}
}

pub fn scopes() -> Vec<String> {
    vec!["User.Read".to_string(), "Mail.Read".to_string(), "Mail.Send".to_string()]
}

pub fn device_flow(server: &MockServer) -> MicrosoftDeviceFlow {
    MicrosoftDeviceFlow::new(reqwest::Client::new(), server.uri(), CLIENT_ID, TENANT)
        .with_max_wait(Duration::from_secs(60))
        .with_prompt(Box::new(SilentPrompt))
}

/// Mail client whose identity provider and Graph API are both the mock server.
pub fn mail_client(server: &MockServer) -> MailApiClient<MicrosoftDeviceFlow> {
    let auth = AuthClient::new(CLIENT_ID, TENANT, scopes(), device_flow(server));
    MailApiClient::new(reqwest::Client::new(), server.uri(), scopes(), auth)
}

pub fn device_code_body() -> serde_json::Value {
    json!({
        "device_code": "dev-code-1",
        "user_code": "FJ6KLMN2Q",
        "verification_uri": "https://microsoft.com/devicelogin",
        "expires_in": 900,
        "interval": 0,
        "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code FJ6KLMN2Q to authenticate."
    })
}

pub fn token_body() -> serde_json::Value {
    json!({
        "token_type": "Bearer",
        "scope": "User.Read Mail.Read Mail.Send",
        "expires_in": 3599,
        "access_token": ISSUED_TOKEN
    })
}

pub fn oauth_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": code,
        "error_description": format!("AADSTS: {code}")
    }))
}

/// Mounts a device-code endpoint and a token endpoint that approves at once,
/// each expected to be hit `times` times.
pub async fn mount_sign_in(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/devicecode")))
        .and(body_string_contains(format!("client_id={CLIENT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_code_body()))
        .expect(times)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
        .and(body_string_contains("device_code=dev-code-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(times)
        .mount(server)
        .await;
}
