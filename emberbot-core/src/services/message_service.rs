use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use emberbot_common::error::Error;
use emberbot_common::models::message::{
    ActionStyle, Attachment, MessageAction, OutgoingMessage,
};
use emberbot_common::models::{CallbackToken, Session};
use emberbot_common::traits::ChatGateway;

use crate::cache::SessionTable;
use crate::repositories::{HydratedTrigger, TriggerRepository};
use crate::services::flow_service::{ACTION_CANCEL, ACTION_SELECT, ATTACHMENT_COLOR};
use crate::services::DispatchService;

/// Entry point for raw chat events: finds a matching trigger, opens a
/// session, and either dispatches immediately or posts the interactive
/// prompt that hands the dialog over to the flow controller.
pub struct MessageService {
    triggers: Arc<dyn TriggerRepository>,
    sessions: Arc<SessionTable>,
    dispatcher: Arc<DispatchService>,
    gateway: Arc<dyn ChatGateway>,
    channel_names: DashMap<String, String>,
}

impl MessageService {
    pub fn new(
        triggers: Arc<dyn TriggerRepository>,
        sessions: Arc<SessionTable>,
        dispatcher: Arc<DispatchService>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            triggers,
            sessions,
            dispatcher,
            gateway,
            channel_names: DashMap::new(),
        }
    }

    /// Processes one inbound chat message. No matching trigger means the
    /// message is silently ignored.
    pub async fn process_incoming_message(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<(), Error> {
        let channel = self.channel_display_name(channel_id).await?;

        // Triggers come back sorted by id, so a message matching several
        // triggers always picks the same one.
        let triggers = self.triggers.list().await?;
        let Some(entry) = find_matched(&triggers, &channel, text) else {
            debug!(channel = %channel, "no trigger matched");
            return Ok(());
        };

        info!(
            trigger_id = %entry.trigger.trigger_id,
            pattern = %entry.compiled.pattern(),
            channel = %channel,
            "message matched trigger"
        );

        let matched = entry.compiled.captures(text).unwrap_or_default();
        let session = self.sessions.create(matched);
        debug!(session_id = %session.session_id, "created session");

        if entry.trigger.is_interactive() {
            let token = CallbackToken::new(
                entry.trigger.trigger_id.clone(),
                session.session_id.clone(),
            )?;
            self.post_interactive_prompt(channel_id, entry, &session, token)
                .await
        } else {
            self.process_non_interactive(channel_id, entry, &session)
                .await
        }
    }

    /// Non-interactive path: fire the webhook right away and announce the
    /// outcome. Dispatch failures end up in chat, with secrets scrubbed.
    async fn process_non_interactive(
        &self,
        channel_id: &str,
        entry: &HydratedTrigger,
        session: &Session,
    ) -> Result<(), Error> {
        let text = match self.dispatcher.dispatch(entry, session).await {
            Ok(()) => match entry.compiled.render_text(&session.matched) {
                Ok(text) => text,
                Err(e) => {
                    warn!(trigger_id = %entry.trigger.trigger_id, error = %e, "text template failed");
                    format!(":x: {}", entry.trigger.mask_secret_values(&e.to_string()))
                }
            },
            Err(e) if e.is_recoverable() => {
                warn!(trigger_id = %entry.trigger.trigger_id, error = %e, "dispatch failed");
                format!(":x: {}", entry.trigger.mask_secret_values(&e.to_string()))
            }
            Err(e) => return Err(e),
        };
        self.gateway
            .post_message(channel_id, OutgoingMessage::plain(text))
            .await?;
        Ok(())
    }

    async fn post_interactive_prompt(
        &self,
        channel_id: &str,
        entry: &HydratedTrigger,
        session: &Session,
        token: CallbackToken,
    ) -> Result<(), Error> {
        let text = entry.compiled.render_text(&session.matched)?;
        let message = OutgoingMessage {
            text,
            attachment: Some(Attachment {
                text: "Select your choice".to_string(),
                color: ATTACHMENT_COLOR.to_string(),
                callback_token: Some(token),
                actions: vec![
                    MessageAction::Select {
                        name: ACTION_SELECT.to_string(),
                        options: entry.trigger.actions.clone(),
                    },
                    MessageAction::Button {
                        name: ACTION_CANCEL.to_string(),
                        label: "Cancel".to_string(),
                        style: ActionStyle::Danger,
                    },
                ],
            }),
        };
        self.gateway.post_message(channel_id, message).await?;
        debug!(session_id = %session.session_id, "interactive prompt posted");
        Ok(())
    }

    async fn channel_display_name(&self, channel_id: &str) -> Result<String, Error> {
        if let Some(name) = self.channel_names.get(channel_id) {
            return Ok(name.clone());
        }
        let name = self.gateway.channel_name(channel_id).await?;
        self.channel_names
            .insert(channel_id.to_string(), name.clone());
        Ok(name)
    }
}

fn find_matched<'a>(
    triggers: &'a [HydratedTrigger],
    channel: &str,
    text: &str,
) -> Option<&'a HydratedTrigger> {
    triggers.iter().find(|entry| {
        entry.trigger.channels.iter().any(|c| c == channel) && entry.compiled.is_match(text)
    })
}
