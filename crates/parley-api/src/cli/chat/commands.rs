//! Slash command parsing for the chat screen.
//!
//! Commands start with `/` and provide in-chat controls for the
//! conversation: renaming, deletion, history reload, attachments and error
//! handling.

use std::io::{self, Write};

use console::style;

/// Available slash commands on the chat screen.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Rename the conversation. An empty title leaves it unchanged.
    Rename(String),
    /// Delete the conversation (asks for confirmation).
    Delete,
    /// Reload the conversation history from the service.
    History,
    /// Clear the visible message list and the screen.
    Clear,
    /// Queue a file for the next message.
    Attach(String),
    /// Dismiss the current error notice.
    Dismiss,
    /// Leave the chat screen.
    Exit,
    /// Unknown command or missing argument.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim().to_string()),
        None => (trimmed.to_lowercase(), String::new()),
    };

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/rename" | "/title" => Some(ChatCommand::Rename(arg)),
        "/delete" | "/rm" => Some(ChatCommand::Delete),
        "/history" | "/reload" => Some(ChatCommand::History),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/attach" | "/a" => {
            if arg.is_empty() {
                Some(ChatCommand::Unknown("/attach requires a file path".to_string()))
            } else {
                Some(ChatCommand::Attach(arg))
            }
        }
        "/dismiss" => Some(ChatCommand::Dismiss),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Print the help text listing all available commands.
pub fn print_help(out: &mut impl Write) -> io::Result<()> {
    let rows = [
        ("/help", "Show this help message"),
        ("/rename <title>", "Rename the conversation"),
        ("/delete", "Delete the conversation"),
        ("/history", "Reload the conversation history"),
        ("/clear", "Clear the screen"),
        ("/attach <path>", "Attach a file to the next message"),
        ("/dismiss", "Dismiss the current error"),
        ("/exit", "Leave the chat"),
    ];

    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (command, description) in rows {
        writeln!(out, "  {}  {description}", style(format!("{command:<15}")).cyan())?;
    }
    writeln!(out)?;
    writeln!(out, "  {}", style("Ctrl+D to exit").dim())?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("/h"), Some(ChatCommand::Help));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("/exit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/quit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/q"), Some(ChatCommand::Exit));
    }

    #[test]
    fn test_parse_rename_keeps_title_text() {
        assert_eq!(
            parse("/rename  Trip to   Lisbon "),
            Some(ChatCommand::Rename("Trip to   Lisbon".to_string()))
        );
    }

    #[test]
    fn test_parse_rename_without_title() {
        assert_eq!(parse("/rename"), Some(ChatCommand::Rename(String::new())));
        assert_eq!(parse("/rename   "), Some(ChatCommand::Rename(String::new())));
    }

    #[test]
    fn test_parse_attach() {
        assert_eq!(
            parse("/attach ./notes/today.md"),
            Some(ChatCommand::Attach("./notes/today.md".to_string()))
        );
        assert_eq!(
            parse("/attach"),
            Some(ChatCommand::Unknown("/attach requires a file path".to_string()))
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse("/DELETE"), Some(ChatCommand::Delete));
        assert_eq!(parse("/History"), Some(ChatCommand::History));
    }

    #[test]
    fn test_parse_not_command() {
        assert_eq!(parse("hello world"), None);
        assert_eq!(parse("a/b"), None);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("/foo"), Some(ChatCommand::Unknown("/foo".to_string())));
    }

    #[test]
    fn test_help_lists_every_command() {
        let mut out = Vec::new();
        print_help(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for command in ["/rename", "/delete", "/history", "/attach", "/dismiss", "/exit"] {
            assert!(text.contains(command), "missing {command}");
        }
    }
}
