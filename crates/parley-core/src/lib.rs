//! Conversation session logic and service trait definitions for Parley.
//!
//! This crate defines the "ports" (`ChatService`, `SettingsStore`) that the
//! infrastructure layer implements, plus the message store, stream
//! reconciler, lifecycle controller, and session controller built on them.
//! It depends only on `parley-types` -- never on `parley-infra`.

pub mod chat;
pub mod settings;
