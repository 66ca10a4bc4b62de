// File: emberbot-core/src/tasks/mod.rs
pub mod session_sweep;
