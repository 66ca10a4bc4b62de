use serde::{Deserialize, Serialize};

use crate::models::session::CallbackToken;

/// A message the core asks the chat gateway to post or to rewrite in place.
/// The gateway translates this into whatever its platform's rich-message
/// payload looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }
}

/// Interactive block attached to a message: prompt text plus the controls
/// (select menu / buttons) that carry the callback token back to us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
    pub callback_token: Option<CallbackToken>,
    pub actions: Vec<MessageAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStyle {
    Default,
    Primary,
    Danger,
}

/// One control inside an attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageAction {
    Select {
        name: String,
        options: Vec<String>,
    },
    Button {
        name: String,
        label: String,
        style: ActionStyle,
    },
}

/// Gateway-side handle to an already posted message, used for in-place
/// updates during the dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// An interactive control was used: the gateway decodes its platform payload
/// into this before handing it to the flow controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCallback {
    pub token: CallbackToken,
    /// Control name: "select", "start" or "cancel".
    pub action: String,
    /// The chosen option, present for select actions.
    pub value: Option<String>,
    pub message_ref: MessageRef,
    pub user_name: String,
}
