use super::client::{check_response, MailApiClient};
use super::device_flow::DeviceCodeFlow;
use crate::error::Result;
use crate::types::{GraphUser, UserProfile};

/// Only these properties are requested for the signed-in user.
pub const PROFILE_FIELDS: [&str; 3] = ["displayName", "mail", "userPrincipalName"];

impl<F: DeviceCodeFlow> MailApiClient<F> {
    pub async fn get_profile(&mut self) -> Result<UserProfile> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(self.url("/me"))
            .bearer_auth(&token)
            .query(&[("$select", PROFILE_FIELDS.join(","))])
            .send()
            .await?;

        let user: GraphUser = check_response(response).await?.json().await?;
        Ok(user.into())
    }
}
