//! Main chat loop orchestration.
//!
//! Builds the HTTP chat service from stored settings, starts its event
//! listener, and drives a `SessionController` from readline input. Store
//! changes are rendered while requests are in flight, so streamed replies
//! appear before the send itself returns.

use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use rustyline_async::SharedWriter;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_core::chat::{RenameOutcome, SessionController, StoreChange, SubmitOutcome};
use parley_core::settings::SettingsStore;
use parley_infra::http::HttpChatService;
use parley_infra::settings::FileSettingsStore;
use parley_types::chat::{Attachment, ConversationId};
use parley_types::error::SessionError;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent, PromptState};
use super::render::TranscriptPrinter;

type Session = SessionController<HttpChatService>;

/// Everything that prints while the prompt is active.
struct Screen {
    changes: broadcast::Receiver<StoreChange>,
    printer: TranscriptPrinter,
    out: SharedWriter,
}

impl Screen {
    fn apply(&mut self, session: &Session, received: Result<StoreChange, broadcast::error::RecvError>) {
        let result = match received {
            Ok(change) => self.printer.render(&change, &session.snapshot(), &mut self.out),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "screen fell behind the message store");
                self.printer.resync(&session.snapshot(), &mut self.out)
            }
            Err(broadcast::error::RecvError::Closed) => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to write to terminal");
        }
    }

    /// Await `operation` while rendering store changes as they arrive.
    async fn while_rendering<F: Future>(&mut self, session: &Session, operation: F) -> F::Output {
        tokio::pin!(operation);
        loop {
            tokio::select! {
                output = &mut operation => {
                    self.drain(session);
                    return output;
                }
                received = self.changes.recv() => self.apply(session, received),
            }
        }
    }

    /// Render changes that are already queued.
    fn drain(&mut self, session: &Session) {
        loop {
            match self.changes.try_recv() {
                Ok(change) => self.apply(session, Ok(change)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    self.apply(session, Err(broadcast::error::RecvError::Lagged(skipped)))
                }
                Err(_) => break,
            }
        }
    }

    fn notice(&mut self, marker: console::StyledObject<&str>, text: impl std::fmt::Display) {
        let _ = writeln!(self.out, "  {marker} {text}");
    }

    fn report(&mut self, session: &Session, err: &SessionError) {
        if err.is_service() {
            let message = session.last_error().unwrap_or_else(|| err.to_string());
            self.error_notice(message);
        } else {
            self.notice(style("!").yellow().bold(), err);
        }
    }

    fn error_notice(&mut self, message: String) {
        self.notice(style("!").red().bold(), message);
        let _ = writeln!(self.out, "    {}", style("/dismiss to clear").dim());
    }
}

/// The error recorded by a call that otherwise succeeded, if it is new.
fn fresh_error(before: Option<String>, after: Option<String>) -> Option<String> {
    after.filter(|message| before.as_ref() != Some(message))
}

/// Resolve `/attach <path>` into an attachment handle.
async fn resolve_attachment(path: &str) -> anyhow::Result<Attachment> {
    let path = Path::new(path);
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }
    let absolute = tokio::fs::canonicalize(path).await?;
    let name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| absolute.display().to_string());
    Ok(Attachment::new(name, absolute.display().to_string()))
}

/// Run the interactive chat screen.
pub async fn run_chat_loop(
    settings_store: &FileSettingsStore,
    conversation: Option<String>,
    title: Option<String>,
    quiet: bool,
) -> anyhow::Result<()> {
    let settings = settings_store.get_settings().await?;
    let service = Arc::new(HttpChatService::new(&settings).context(
        "chat service is not configured. Set it with: parley config set --base-url <url> --api-key",
    )?);

    let cancel = CancellationToken::new();
    let listener = service.spawn_event_listener(cancel.clone());

    let session = SessionController::new(Arc::clone(&service))
        .with_span(tracing::info_span!("session", server = %settings.normalized_base_url()));
    session.attach_stream();
    let changes = session.subscribe();

    if let Some(id) = conversation {
        session
            .lifecycle()
            .bind_existing(ConversationId::new(id), title)?;
    }
    if !quiet {
        let conversation = session.conversation();
        print_welcome_banner(
            &session.title(),
            conversation.id.as_ref(),
            settings.normalized_base_url(),
        );
    }

    let (mut input, out) = ChatInput::new()
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;
    let mut screen = Screen {
        changes,
        printer: TranscriptPrinter::new(),
        out,
    };

    if session.conversation().id.is_some() {
        match screen.while_rendering(&session, session.load_history()).await {
            Ok(count) => info!(count, "conversation opened"),
            Err(e) => match session.visible_load_error() {
                Some(load_error) => screen.notice(
                    style("!").red().bold(),
                    format!("Could not load history: {load_error}"),
                ),
                None => screen.report(&session, &e),
            },
        }
    }

    let mut pending_files: Vec<Attachment> = Vec::new();

    loop {
        let event = tokio::select! {
            event = input.read_line() => event,
            received = screen.changes.recv() => {
                screen.apply(&session, received);
                continue;
            }
        };

        let text = match event {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                screen.notice(style("i").blue().bold(), style("Press Ctrl+D or /exit to leave.").dim());
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        if let Some(command) = commands::parse(&text) {
            match command {
                ChatCommand::Help => {
                    let _ = commands::print_help(&mut screen.out);
                }
                ChatCommand::Exit => break,
                ChatCommand::Rename(new_title) => {
                    match screen.while_rendering(&session, session.rename(&new_title)).await {
                        Ok(RenameOutcome::Renamed { title }) => {
                            screen.notice(style("*").cyan().bold(), format!("Renamed to {}", style(title).bold()));
                        }
                        Ok(RenameOutcome::Rejected) => {
                            screen.notice(style("i").blue().bold(), "Title unchanged (empty title).");
                        }
                        Err(e) => screen.report(&session, &e),
                    }
                }
                ChatCommand::Delete => {
                    if input.confirm("Delete this conversation?").await {
                        match screen.while_rendering(&session, session.delete()).await {
                            Ok(_) => {
                                screen.notice(style("*").cyan().bold(), "Conversation deleted.");
                            }
                            Err(e) => screen.report(&session, &e),
                        }
                    } else {
                        screen.notice(style("i").blue().bold(), "Delete cancelled.");
                    }
                }
                ChatCommand::History => {
                    if let Err(e) = screen.while_rendering(&session, session.load_history()).await {
                        screen.report(&session, &e);
                    }
                }
                ChatCommand::Clear => {
                    session.clear();
                    input.clear();
                }
                ChatCommand::Attach(path) => match resolve_attachment(&path).await {
                    Ok(file) => {
                        screen.notice(
                            style("+").green().bold(),
                            format!("Attached {} (sent with your next message)", style(&file.name).bold()),
                        );
                        pending_files.push(file);
                    }
                    Err(e) => screen.notice(style("!").yellow().bold(), format!("{e:#}")),
                },
                ChatCommand::Dismiss => {
                    session.dismiss_error();
                }
                ChatCommand::Unknown(name) => {
                    screen.notice(
                        style("?").yellow().bold(),
                        format!("Unknown command: {}. Type /help for available commands.", style(name).dim()),
                    );
                }
            }
        } else {
            let files = std::mem::take(&mut pending_files);
            screen.printer.expect_echo(&text);
            input.show(PromptState {
                busy: true,
                pending_files: 0,
            });
            let error_before = session.last_error();

            match screen.while_rendering(&session, session.submit(&text, files)).await {
                Ok(outcome) => {
                    if let SubmitOutcome::Sent {
                        created: Some(id), ..
                    } = outcome
                    {
                        info!(conversation_id = %id, "conversation created");
                        screen.notice(
                            style("*").cyan().bold(),
                            format!("Saved as {} ({})", style(session.title()).bold(), style(id).dim()),
                        );
                    }
                    // Auto-naming failures do not fail the submit.
                    if let Some(message) = fresh_error(error_before, session.last_error()) {
                        screen.error_notice(message);
                    }
                }
                Err(e) => screen.report(&session, &e),
            }
        }

        if session.should_close() {
            break;
        }
        input.show(PromptState {
            busy: session.is_busy(),
            pending_files: pending_files.len(),
        });
    }

    let _ = writeln!(screen.out, "\n  {}", style("Session ended.").dim());
    session.shutdown().await;
    cancel.cancel();
    if let Err(e) = listener.await {
        warn!(error = %e, "event listener task failed");
    }
    input.flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_error_reports_new_notice() {
        let message = "failed to generate title: transport error: timeout".to_string();
        assert_eq!(fresh_error(None, Some(message.clone())), Some(message));
    }

    #[test]
    fn test_fresh_error_skips_unchanged_or_missing_notice() {
        let old = "failed to send message: transport error: offline".to_string();
        assert_eq!(fresh_error(Some(old.clone()), Some(old.clone())), None);
        assert_eq!(fresh_error(Some(old), None), None);
        assert_eq!(fresh_error(None, None), None);
    }
}
