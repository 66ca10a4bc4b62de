// File: emberbot-core/src/lib.rs

pub mod cache;
pub mod http;
pub mod patterns;
pub mod repositories;
pub mod services;
pub mod tasks;

pub use emberbot_common::error::Error;
pub use http::{HttpClient, ReqwestHttpClient};
