// File: emberbot-core/src/repositories/mod.rs

use std::sync::Arc;

use async_trait::async_trait;

use emberbot_common::error::Error;
use emberbot_common::models::Trigger;

use crate::patterns::CompiledTrigger;

/// A trigger together with its compiled artifacts, ready for matching and
/// rendering. The raw definition and the compiled form travel together so
/// the router never has to recompile per message.
#[derive(Debug, Clone)]
pub struct HydratedTrigger {
    pub trigger: Trigger,
    pub compiled: Arc<CompiledTrigger>,
}

/// Owns the set of triggers. Implementations must never let an observer see
/// in-memory state that failed to persist.
#[async_trait]
pub trait TriggerRepository: Send + Sync {
    /// All triggers, sorted by id for deterministic listing and matching.
    async fn list(&self) -> Result<Vec<HydratedTrigger>, Error>;

    async fn get(&self, trigger_id: &str) -> Result<Option<HydratedTrigger>, Error>;

    async fn exists(&self, trigger_id: &str) -> Result<bool, Error>;

    /// Creates or updates a trigger, assigning an id and default title when
    /// absent, and merging masked secret values against any prior version.
    /// Returns the stored copy.
    async fn set(&self, trigger: Trigger) -> Result<Trigger, Error>;

    async fn delete(&self, trigger_id: &str) -> Result<(), Error>;
}

pub mod persistent;

pub use persistent::{FileByteStore, PersistentTriggerRepository};
