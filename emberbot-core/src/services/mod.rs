// File: emberbot-core/src/services/mod.rs
pub mod admin_service;
pub mod dispatch_service;
pub mod flow_service;
pub mod message_service;

pub use admin_service::AdminService;
pub use dispatch_service::DispatchService;
pub use flow_service::FlowService;
pub use message_service::MessageService;
