//! State machine for interactive dialogs.
//!
//! A dialog advances through: awaiting selection -> (optionally) awaiting
//! confirmation -> dispatching, or is cancelled from either waiting state.
//! The state is not stored separately; it is derived from the session (has a
//! value been selected?) and the trigger (does it require confirmation?).

use std::sync::Arc;

use tracing::{info, warn};

use emberbot_common::error::Error;
use emberbot_common::models::message::{
    ActionCallback, ActionStyle, Attachment, MessageAction, OutgoingMessage,
};
use emberbot_common::models::{CallbackToken, Session};
use emberbot_common::traits::ChatGateway;

use crate::cache::SessionTable;
use crate::repositories::{HydratedTrigger, TriggerRepository};
use crate::services::DispatchService;

pub const ACTION_SELECT: &str = "select";
pub const ACTION_START: &str = "start";
pub const ACTION_CANCEL: &str = "cancel";

pub const ATTACHMENT_COLOR: &str = "#f9a41b";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowState {
    AwaitingSelection,
    AwaitingConfirmation,
}

pub struct FlowService {
    triggers: Arc<dyn TriggerRepository>,
    sessions: Arc<SessionTable>,
    dispatcher: Arc<DispatchService>,
    gateway: Arc<dyn ChatGateway>,
}

impl FlowService {
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
        }
    }

    /// Interprets one inbound chat action against the current session and
    /// trigger. Expired sessions and failed dispatches are answered in chat
    /// and do not abort the caller.
    pub async fn handle_action(&self, callback: ActionCallback) -> Result<(), Error> {
        let entry = self
            .triggers
            .get(&callback.token.trigger_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("trigger {}", callback.token.trigger_id)))?;

        let Some(session) = self.sessions.get(&callback.token) else {
            warn!(session_id = %callback.token.session_id, "action for expired session");
            self.respond(&callback, ":x: Session is expired").await?;
            return Err(Error::SessionExpired(callback.token.session_id.clone()));
        };

        let state = match flow_state(&entry, &session) {
            Some(state) => state,
            None => {
                // Value already selected on a no-confirm trigger: the dialog
                // finished; whatever arrives now is stale.
                return Err(Error::InvalidAction(format!(
                    "dialog already completed for session {}",
                    session.session_id
                )));
            }
        };

        info!(action = %callback.action, session_id = %session.session_id, ?state, "handling dialog action");

        match callback.action.as_str() {
            ACTION_SELECT => self.handle_select(&entry, session, state, &callback).await,
            ACTION_START => self.handle_start(&entry, &session, state, &callback).await,
            ACTION_CANCEL => self.handle_cancel(&callback).await,
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }

    async fn handle_select(
        &self,
        entry: &HydratedTrigger,
        mut session: Session,
        state: FlowState,
        callback: &ActionCallback,
    ) -> Result<(), Error> {
        if state != FlowState::AwaitingSelection {
            return Err(Error::InvalidAction(
                "select is only valid before a value has been chosen".to_string(),
            ));
        }
        let value = callback
            .value
            .clone()
            .ok_or_else(|| Error::MalformedRequest("select action without a value".to_string()))?;
        if !entry.trigger.actions.contains(&value) {
            return Err(Error::MalformedRequest(format!(
                "value {:?} is not one of the configured actions",
                value
            )));
        }

        info!(session_id = %session.session_id, value = %value, "value selected");
        session.value = value.clone();
        self.sessions.update(&callback.token, session.clone());

        if entry.trigger.confirm {
            // Swap the select menu for a yes/no prompt; no dispatch yet.
            let message = confirmation_prompt(&value, callback.token.clone());
            self.gateway
                .update_message(&callback.message_ref, message)
                .await
        } else {
            self.dispatch_and_report(
                entry,
                &session,
                callback,
                format!(":ok: @{} start this, {}", callback.user_name, value),
            )
            .await
        }
    }

    async fn handle_start(
        &self,
        entry: &HydratedTrigger,
        session: &Session,
        state: FlowState,
        callback: &ActionCallback,
    ) -> Result<(), Error> {
        if state != FlowState::AwaitingConfirmation {
            return Err(Error::InvalidAction(
                "start is only valid while awaiting confirmation".to_string(),
            ));
        }
        self.dispatch_and_report(
            entry,
            session,
            callback,
            format!(":ok: @{} confirmed, {}", callback.user_name, session.value),
        )
        .await
    }

    async fn handle_cancel(&self, callback: &ActionCallback) -> Result<(), Error> {
        info!(session_id = %callback.token.session_id, "request canceled");
        self.respond(
            callback,
            &format!(":x: @{} canceled the request", callback.user_name),
        )
        .await
    }

    async fn dispatch_and_report(
        &self,
        entry: &HydratedTrigger,
        session: &Session,
        callback: &ActionCallback,
        success_text: String,
    ) -> Result<(), Error> {
        match self.dispatcher.dispatch(entry, session).await {
            Ok(()) => self.respond(callback, &success_text).await,
            Err(e) if e.is_recoverable() => {
                warn!(session_id = %session.session_id, error = %e, "dispatch failed");
                let masked = entry.trigger.mask_secret_values(&e.to_string());
                self.respond(callback, &format!(":x: {}", masked)).await
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces the interactive message with a plain status line, which also
    /// removes the controls.
    async fn respond(&self, callback: &ActionCallback, text: &str) -> Result<(), Error> {
        self.gateway
            .update_message(&callback.message_ref, OutgoingMessage::plain(text))
            .await
    }
}

fn flow_state(entry: &HydratedTrigger, session: &Session) -> Option<FlowState> {
    if session.value.is_empty() {
        Some(FlowState::AwaitingSelection)
    } else if entry.trigger.confirm {
        Some(FlowState::AwaitingConfirmation)
    } else {
        None
    }
}

fn confirmation_prompt(value: &str, token: CallbackToken) -> OutgoingMessage {
    OutgoingMessage {
        text: String::new(),
        attachment: Some(Attachment {
            text: format!("OK to select {} ?", value),
            color: ATTACHMENT_COLOR.to_string(),
            callback_token: Some(token),
            actions: vec![
                MessageAction::Button {
                    name: ACTION_START.to_string(),
                    label: "Yes".to_string(),
                    style: ActionStyle::Primary,
                },
                MessageAction::Button {
                    name: ACTION_CANCEL.to_string(),
                    label: "No".to_string(),
                    style: ActionStyle::Danger,
                },
            ],
        }),
    }
}
