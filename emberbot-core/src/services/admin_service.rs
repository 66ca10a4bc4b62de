use std::sync::Arc;

use tracing::info;

use emberbot_common::error::Error;
use emberbot_common::models::Trigger;
use emberbot_common::traits::ChatGateway;

use crate::patterns;
use crate::repositories::TriggerRepository;

/// Transport-agnostic admin operations over the trigger set. Every trigger
/// leaving through this service has its secret values masked.
pub struct AdminService {
    triggers: Arc<dyn TriggerRepository>,
    gateway: Arc<dyn ChatGateway>,
}

impl AdminService {
    pub fn new(triggers: Arc<dyn TriggerRepository>, gateway: Arc<dyn ChatGateway>) -> Self {
        Self { triggers, gateway }
    }

    pub async fn get_trigger(&self, trigger_id: &str) -> Result<Trigger, Error> {
        match self.triggers.get(trigger_id).await? {
            Some(entry) => Ok(entry.trigger.masked()),
            None => Err(Error::NotFound(trigger_id.to_string())),
        }
    }

    /// Masked projections, sorted by id.
    pub async fn list_triggers(&self) -> Result<Vec<Trigger>, Error> {
        let entries = self.triggers.list().await?;
        Ok(entries.into_iter().map(|e| e.trigger.masked()).collect())
    }

    /// Validates and stores a trigger. An unknown non-empty id is rejected:
    /// ids are assigned by the store, so a client supplying one must be
    /// referring to a trigger that exists.
    pub async fn set_trigger(&self, trigger: Trigger) -> Result<Trigger, Error> {
        patterns::validate(&trigger)?;

        if !trigger.trigger_id.is_empty() && !self.triggers.exists(&trigger.trigger_id).await? {
            return Err(Error::MalformedRequest(format!(
                "unknown trigger id: {}",
                trigger.trigger_id
            )));
        }

        let stored = self.triggers.set(trigger).await?;
        info!(trigger_id = %stored.trigger_id, title = %stored.title, "trigger stored");
        Ok(stored.masked())
    }

    pub async fn delete_trigger(&self, trigger_id: &str) -> Result<(), Error> {
        self.triggers.delete(trigger_id).await?;
        info!(trigger_id, "trigger deleted");
        Ok(())
    }

    /// Channel names come from the chat gateway; the store knows nothing
    /// about them.
    pub async fn list_channels(&self) -> Result<Vec<String>, Error> {
        self.gateway.list_channels().await
    }
}
