//! Shared domain types for Parley.
//!
//! This crate contains the data model of a single chat conversation as seen
//! from the client: messages, attachments, conversation identity, client
//! settings, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
