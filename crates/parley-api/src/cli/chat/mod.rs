//! Interactive chat screen for one conversation.
//!
//! Wires the session controller to a readline prompt: user input becomes
//! submissions or slash commands, and message store changes (including
//! streamed replies) are printed as they arrive. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod render;
