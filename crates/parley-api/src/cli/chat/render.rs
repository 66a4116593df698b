//! Terminal rendering of message store changes.
//!
//! The screen is line-oriented, so partial assistant snapshots are not
//! redrawn. A streaming reply shows a single "typing" marker and the reply
//! is printed once it completes. Repeated final snapshots for the same slot
//! print nothing, and the user's own submissions are not echoed twice since
//! the prompt already shows them.

use std::collections::VecDeque;
use std::io::{self, Write};

use chrono::Local;
use console::style;

use parley_core::chat::{ChangeKind, StoreChange};
use parley_types::chat::Message;

/// Turns `StoreChange` notifications into printed lines.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    /// Texts the user typed that are already visible at the prompt.
    echoed: VecDeque<String>,
    /// Slot whose streaming marker has been printed.
    streaming_slot: Option<usize>,
    /// Slot and content of the last completed assistant reply printed.
    last_final: Option<(usize, String)>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `text` is about to be appended from local input.
    pub fn expect_echo(&mut self, text: &str) {
        self.echoed.push_back(text.to_string());
    }

    /// Print whatever `change` made visible. `messages` is the current
    /// snapshot; it may already include later mutations.
    pub fn render(
        &mut self,
        change: &StoreChange,
        messages: &[Message],
        out: &mut impl Write,
    ) -> io::Result<()> {
        match change.kind {
            ChangeKind::Reloaded => {
                self.reset();
                let visible = &messages[..change.len.min(messages.len())];
                for message in visible {
                    write_message(out, message)?;
                }
                self.mark_shown(visible);
                Ok(())
            }
            ChangeKind::Appended | ChangeKind::ReplacedLast => {
                let Some(slot) = change.len.checked_sub(1) else {
                    return Ok(());
                };
                match messages.get(slot) {
                    Some(message) => self.render_slot(slot, message, out),
                    None => Ok(()),
                }
            }
        }
    }

    /// Skip ahead after missed notifications: everything currently in the
    /// store counts as shown.
    pub fn resync(&mut self, messages: &[Message], out: &mut impl Write) -> io::Result<()> {
        self.reset();
        self.mark_shown(messages);
        writeln!(out, "  {}", style("(some updates were skipped; /history to reload)").dim())
    }

    fn render_slot(&mut self, slot: usize, message: &Message, out: &mut impl Write) -> io::Result<()> {
        if message.is_user {
            if self.echoed.front() == Some(&message.content) {
                self.echoed.pop_front();
                return Ok(());
            }
            return write_message(out, message);
        }

        if message.is_streaming {
            if self.streaming_slot != Some(slot) {
                self.streaming_slot = Some(slot);
                writeln!(out, "  {}", style("assistant is typing...").dim())?;
            }
            return Ok(());
        }

        let already_shown = self
            .last_final
            .as_ref()
            .is_some_and(|(shown, content)| *shown == slot && *content == message.content);
        if already_shown {
            return Ok(());
        }

        self.streaming_slot = None;
        self.last_final = Some((slot, message.content.clone()));
        write_message(out, message)
    }

    fn reset(&mut self) {
        self.echoed.clear();
        self.streaming_slot = None;
        self.last_final = None;
    }

    fn mark_shown(&mut self, messages: &[Message]) {
        if let Some(last) = messages.last().filter(|m| !m.is_user) {
            let slot = messages.len() - 1;
            if last.is_streaming {
                self.streaming_slot = Some(slot);
            } else {
                self.last_final = Some((slot, last.content.clone()));
            }
        }
    }
}

/// Print one message with its author, time and attachments.
pub fn write_message(out: &mut impl Write, message: &Message) -> io::Result<()> {
    let time = message.timestamp.with_timezone(&Local).format("%H:%M");
    let author = if message.is_user {
        style("You").green().bold()
    } else {
        style("Assistant").cyan().bold()
    };

    writeln!(out, "  {} {} {}", style(time).dim(), author, message.content)?;
    for file in &message.files {
        writeln!(out, "        {} {}", style("+").dim(), style(&file.name).dim())?;
    }
    Ok(())
}
