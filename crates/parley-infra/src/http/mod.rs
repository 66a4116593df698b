//! HTTP adapter for the remote chat service.

pub mod client;
pub mod stream;
pub mod types;

pub use client::HttpChatService;
