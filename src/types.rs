use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Wire shapes of the Graph responses we read. Fields are optional because
// Graph omits properties that are null or were not selected.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUser {
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GraphMessageCollection {
    #[serde(default)]
    pub value: Vec<GraphMessage>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GraphMessage {
    pub subject: Option<String>,
    pub from: Option<GraphRecipient>,
    pub is_read: Option<bool>,
    /// Always present on stored messages; a message without it fails to decode.
    pub received_date_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecipient {
    pub email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GraphEmailAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorEnvelope {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMailRequest<'a> {
    pub message: OutgoingGraphMessage<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingGraphMessage<'a> {
    pub subject: &'a str,
    pub body: ItemBody<'a>,
    pub to_recipients: Vec<GraphRecipient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody<'a> {
    pub content_type: &'static str,
    pub content: &'a str,
}

/// The signed-in user as returned by the profile call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub display_name: String,
    pub mail: Option<String>,
    pub user_principal_name: String,
}

impl UserProfile {
    /// Work/school accounts carry `mail`; personal accounts only have the principal name.
    pub fn effective_email(&self) -> &str {
        self.mail
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.user_principal_name)
    }
}

impl From<GraphUser> for UserProfile {
    fn from(user: GraphUser) -> Self {
        Self {
            display_name: user.display_name.unwrap_or_default(),
            mail: user.mail,
            user_principal_name: user.user_principal_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub sender_display_name: Option<String>,
    pub is_read: bool,
    pub received_at: DateTime<Utc>,
}

impl From<GraphMessage> for MailMessage {
    fn from(message: GraphMessage) -> Self {
        Self {
            subject: message.subject.unwrap_or_default(),
            sender_display_name: message
                .from
                .and_then(|f| f.email_address)
                .and_then(|a| a.name)
                .filter(|n| !n.is_empty()),
            is_read: message.is_read.unwrap_or(false),
            received_at: message.received_date_time,
        }
    }
}

/// One page of the inbox, newest first.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub items: Vec<MailMessage>,
    pub has_more: bool,
    /// Opaque continuation cursor, only meaningful to a follow-up fetch.
    pub next_link: Option<String>,
}

impl From<GraphMessageCollection> for MessagePage {
    fn from(collection: GraphMessageCollection) -> Self {
        Self {
            items: collection.value.into_iter().map(MailMessage::from).collect(),
            has_more: collection.next_link.is_some(),
            next_link: collection.next_link,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    pub body_text: String,
    pub recipient_address: String,
}

impl OutboundMessage {
    pub fn new(
        subject: impl Into<String>,
        body_text: impl Into<String>,
        recipient_address: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body_text: body_text.into(),
            recipient_address: recipient_address.into(),
        }
    }

    pub(crate) fn to_request(&self) -> SendMailRequest<'_> {
        SendMailRequest {
            message: OutgoingGraphMessage {
                subject: &self.subject,
                body: ItemBody {
                    content_type: "Text",
                    content: &self.body_text,
                },
                to_recipients: vec![GraphRecipient {
                    email_address: Some(GraphEmailAddress {
                        name: None,
                        address: Some(self.recipient_address.clone()),
                    }),
                }],
            },
        }
    }
}
