//! Console stand-in for a real chat transport.
//!
//! Implementing an actual chat protocol is out of scope for this crate; this
//! gateway lets the whole pipeline run locally by treating stdin as the
//! event stream and stdout as the channel. Channel ids are their own display
//! names here.

use async_trait::async_trait;
use uuid::Uuid;

use emberbot_common::error::Error;
use emberbot_common::models::message::{MessageAction, MessageRef, OutgoingMessage};
use emberbot_common::traits::ChatGateway;

pub struct ConsoleGateway {
    channels: Vec<String>,
}

impl ConsoleGateway {
    pub fn new(channels: Vec<String>) -> Self {
        Self { channels }
    }

    fn print(&self, prefix: &str, channel: &str, message: &OutgoingMessage) {
        if !message.text.is_empty() {
            println!("{} #{}: {}", prefix, channel, message.text);
        }
        if let Some(attachment) = &message.attachment {
            println!("{} #{}: {}", prefix, channel, attachment.text);
            for action in &attachment.actions {
                match action {
                    MessageAction::Select { name, options } => {
                        println!("    [{}] options: {}", name, options.join(", "));
                    }
                    MessageAction::Button { name, label, .. } => {
                        println!("    [{}] {}", name, label);
                    }
                }
            }
            if let Some(token) = &attachment.callback_token {
                println!("    token: {}", token);
            }
        }
    }
}

#[async_trait]
impl ChatGateway for ConsoleGateway {
    async fn post_message(
        &self,
        channel_id: &str,
        message: OutgoingMessage,
    ) -> Result<MessageRef, Error> {
        self.print("->", channel_id, &message);
        Ok(MessageRef {
            channel_id: channel_id.to_string(),
            message_id: Uuid::new_v4().to_string(),
        })
    }

    async fn update_message(
        &self,
        target: &MessageRef,
        message: OutgoingMessage,
    ) -> Result<(), Error> {
        self.print("~>", &target.channel_id, &message);
        Ok(())
    }

    async fn channel_name(&self, channel_id: &str) -> Result<String, Error> {
        Ok(channel_id.to_string())
    }

    async fn list_channels(&self) -> Result<Vec<String>, Error> {
        Ok(self.channels.clone())
    }
}
