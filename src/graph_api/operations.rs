use tracing::info;

use super::client::{check_response, MailApiClient};
use super::device_flow::DeviceCodeFlow;
use crate::error::Result;
use crate::types::OutboundMessage;

impl<F: DeviceCodeFlow> MailApiClient<F> {
    // Send a plain-text message to a single recipient. The address is not
    // validated here; the service rejects bad ones.
    pub async fn send_mail(&mut self, message: OutboundMessage) -> Result<()> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .post(self.url("/me/sendMail"))
            .bearer_auth(&token)
            .json(&message.to_request())
            .send()
            .await?;

        check_response(response).await?;
        info!("mail submitted for delivery");
        Ok(())
    }
}
