//! Welcome banner display for chat screens.

use console::style;

use parley_types::chat::ConversationId;

/// Print the banner at the start of a chat screen: the conversation title,
/// its ID (or that it is new), and the service it talks to.
pub fn print_welcome_banner(title: &str, id: Option<&ConversationId>, server: &str) {
    println!();
    println!("  {} {}", style("*").cyan(), style(title).cyan().bold());
    println!();
    println!(
        "  {}  {}",
        style("Conversation:").bold(),
        match id {
            Some(id) => style(id.to_string()).dim(),
            None => style("new (saved on first message)".to_string()).dim(),
        }
    );
    println!("  {}        {}", style("Server:").bold(), style(server).dim());
    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}
