// File: emberbot-core/src/cache/mod.rs
pub mod session_table;

pub use session_table::SessionTable;
