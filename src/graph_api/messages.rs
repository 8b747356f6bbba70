use tracing::debug;

use super::client::{check_response, MailApiClient};
use super::device_flow::DeviceCodeFlow;
use crate::error::Result;
use crate::types::{GraphMessageCollection, MessagePage};

/// Default and largest page requested from the inbox.
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 25;

pub const INBOX_FIELDS: [&str; 4] = ["from", "isRead", "receivedDateTime", "subject"];
const INBOX_ORDER: &str = "receivedDateTime DESC";

impl<F: DeviceCodeFlow> MailApiClient<F> {
    /// Fetches the newest inbox messages, one page only.
    ///
    /// `limit` is clamped into `1..=25`. `has_more` on the result reflects
    /// whether the service returned a continuation link.
    pub async fn list_inbox(&mut self, limit: usize) -> Result<MessagePage> {
        let top = limit.clamp(1, MAX_PAGE_SIZE);
        if top != limit {
            debug!(requested = limit, used = top, "inbox page size clamped");
        }

        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(self.url("/me/mailFolders/inbox/messages"))
            .bearer_auth(&token)
            .query(&[
                ("$select", INBOX_FIELDS.join(",")),
                ("$top", top.to_string()),
                ("$orderby", INBOX_ORDER.to_string()),
            ])
            .send()
            .await?;

        let collection: GraphMessageCollection = check_response(response).await?.json().await?;
        let page = MessagePage::from(collection);
        debug!(count = page.items.len(), has_more = page.has_more, "listed inbox");
        Ok(page)
    }
}
