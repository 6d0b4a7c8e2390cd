//! Slack API models

use serde::{Deserialize, Serialize};

/// A legacy message attachment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fallback: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub callback_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_link: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title_link: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AttachmentAction>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub footer: String,

    /// Unix epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

/// An interactive button on an attachment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentAction {
    pub name: String,
    pub text: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<ConfirmationField>,
}

/// Confirmation dialog shown before an action takes effect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationField {
    pub title: String,
    pub text: String,
    pub ok_text: String,
    pub dismiss_text: String,
}

/// Body of `chat.postMessage`
#[derive(Debug, Clone, Serialize)]
pub struct PostMessageRequest<'a> {
    pub channel: &'a str,
    pub attachments: &'a [Attachment],
    pub as_user: bool,
}

/// Body of `chat.update`
#[derive(Debug, Clone, Serialize)]
pub struct UpdateMessageRequest<'a> {
    pub channel: &'a str,
    pub ts: &'a str,
    pub attachments: &'a [Attachment],
    pub as_user: bool,
}

/// Response envelope shared by `chat.postMessage` and `chat.update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub channel: Option<String>,
    pub ts: Option<String>,
}

/// Payload Slack posts when a user clicks an attachment button
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    pub token: String,
    pub callback_id: String,
    pub actions: Vec<InteractionAction>,
    pub user: InteractionUser,
    pub channel: InteractionChannel,
    pub message_ts: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InteractionAction {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub action_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InteractionUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InteractionChannel {
    pub id: String,
    pub name: String,
}

/// Reply to an interaction, shown only to the clicking user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionReply {
    pub response_type: String,
    pub replace_original: bool,
    pub text: String,
}

impl InteractionReply {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral".to_string(),
            replace_original: false,
            text: text.into(),
        }
    }
}
