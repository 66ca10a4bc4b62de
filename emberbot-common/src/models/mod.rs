// File: emberbot-common/src/models/mod.rs
pub mod message;
pub mod session;
pub mod trigger;

pub use message::{ActionCallback, Attachment, MessageAction, MessageRef, OutgoingMessage};
pub use session::{CallbackToken, Session};
pub use trigger::{Trigger, SECRET_MASK};
