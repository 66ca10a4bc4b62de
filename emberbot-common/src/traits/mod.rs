// File: emberbot-common/src/traits/mod.rs
pub mod gateway_traits;
pub mod repository_traits;

pub use gateway_traits::ChatGateway;
pub use repository_traits::ByteStore;
