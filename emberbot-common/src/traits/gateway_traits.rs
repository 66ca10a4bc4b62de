use async_trait::async_trait;

use crate::error::Error;
use crate::models::message::{MessageRef, OutgoingMessage};

/// Seam to the chat platform. The core never talks a chat protocol itself;
/// a gateway implementation subscribes to the platform's event stream, feeds
/// messages and action callbacks into the core, and carries outgoing posts
/// and in-place updates back out.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts a new message and returns a handle for later updates.
    async fn post_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<MessageRef, Error>;

    /// Rewrites an existing message in place.
    async fn update_message(
        &self,
        target: &MessageRef,
        message: OutgoingMessage,
    ) -> Result<(), Error>;

    /// Resolves a channel id to its display name.
    async fn channel_name(&self, channel_id: &str) -> Result<String, Error>;

    /// All channel display names the gateway can see.
    async fn list_channels(&self) -> Result<Vec<String>, Error>;
}
