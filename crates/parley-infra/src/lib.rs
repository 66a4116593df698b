//! Infrastructure layer for Parley.
//!
//! Contains implementations of the traits defined in `parley-core`: the
//! HTTP chat service adapter (requests plus the server-sent event feed) and
//! the TOML settings file store.

pub mod http;
pub mod settings;
