//! Prompt line for the chat screen.
//!
//! The prompt reflects session state: `...` while a request is in flight and
//! a `[+N]` marker while attachments wait for the next message. Output
//! printed while the prompt is active goes through the `SharedWriter`
//! returned by [`ChatInput::new`].

use console::style;
use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};

/// Events produced by the input handler.
#[derive(Debug)]
pub enum InputEvent {
    /// User submitted a line (trimmed).
    Message(String),
    /// End of file (Ctrl+D).
    Eof,
    /// Interrupt signal (Ctrl+C).
    Interrupted,
}

/// What the prompt currently shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptState {
    pub busy: bool,
    pub pending_files: usize,
}

impl PromptState {
    pub fn render(self) -> String {
        let files = if self.pending_files > 0 {
            format!("{} ", style(format!("[+{}]", self.pending_files)).dim())
        } else {
            String::new()
        };
        let marker = if self.busy {
            style("...").dim()
        } else {
            style("You >").green().bold()
        };
        format!("  {files}{marker} ")
    }
}

pub struct ChatInput {
    rl: Readline,
    state: PromptState,
}

impl ChatInput {
    pub fn new() -> Result<(Self, SharedWriter), ReadlineError> {
        let state = PromptState::default();
        let (rl, out) = Readline::new(state.render())?;
        Ok((Self { rl, state }, out))
    }

    /// Redraw the prompt if `state` differs from what is shown.
    pub fn show(&mut self, state: PromptState) {
        if state != self.state {
            self.state = state;
            let _ = self.rl.update_prompt(&state.render());
        }
    }

    /// Read a line of input. Readline failures are treated as EOF.
    pub async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => {
                let trimmed = line.trim().to_string();
                if !trimmed.is_empty() {
                    self.rl.add_history_entry(trimmed.clone());
                }
                InputEvent::Message(trimmed)
            }
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(e) => {
                tracing::debug!(error = %e, "readline failed");
                InputEvent::Eof
            }
        }
    }

    /// Ask a yes/no question on the prompt line. Anything but `y`/`yes`,
    /// including Ctrl+C, is a no.
    pub async fn confirm(&mut self, question: &str) -> bool {
        let _ = self
            .rl
            .update_prompt(&format!("  {} ", style(format!("{question} [y/N]")).red().bold()));
        let answer = match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => is_affirmative(&line),
            _ => false,
        };
        let _ = self.rl.update_prompt(&self.state.render());
        answer
    }

    /// Clear the terminal screen.
    pub fn clear(&mut self) {
        let _ = self.rl.clear();
    }

    /// Restore the terminal before exit.
    pub fn flush(&mut self) {
        let _ = self.rl.flush();
    }
}

/// Whether a confirmation answer means yes.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
