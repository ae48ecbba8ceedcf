/// Result of processing a slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Display a message to the user.
    Message(String),
    /// Start a fresh conversation.
    NewConversation,
    /// List conversations, most recently updated first.
    ListConversations,
    /// Make the given conversation active.
    SwitchConversation(String),
    /// Delete the given conversation.
    DeleteConversation(String),
    /// Post the support contact details.
    ShowSupport,
    /// Quit the application.
    Quit,
    /// Not a command - send as a question.
    NotACommand,
}

pub fn handle_command(input: &str) -> CommandResult {
    let parts: Vec<&str> = input.trim().splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/help" | "/h" => show_help(),
        "/exit" | "/quit" | "/q" => CommandResult::Quit,
        "/new" => CommandResult::NewConversation,
        "/list" | "/history" => CommandResult::ListConversations,
        "/switch" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /switch <conversation-id>".into())
            } else {
                CommandResult::SwitchConversation(arg.to_string())
            }
        }
        "/delete" => {
            if arg.is_empty() {
                CommandResult::Message("Usage: /delete <conversation-id>".into())
            } else {
                CommandResult::DeleteConversation(arg.to_string())
            }
        }
        "/support" => CommandResult::ShowSupport,
        "/version" => {
            CommandResult::Message(format!("Helpdesk CLI v{}", env!("CARGO_PKG_VERSION")))
        }

        _ => {
            if input.trim_start().starts_with('/') {
                CommandResult::Message(format!("Unknown command: {cmd}. Type /help for commands."))
            } else {
                CommandResult::NotACommand
            }
        }
    }
}

fn show_help() -> CommandResult {
    let help_text = "\
╭─ Helpdesk Commands ────────────────────────────────────────────╮

  CONVERSATIONS
    /new                      Start a fresh conversation
    /list, /history           List conversations
    /switch <id>              Continue an earlier conversation
    /delete <id>              Delete a conversation

  OTHER
    /support                  Show support contact details
    /help, /h                 Show this help message
    /version                  Show version information
    /exit, /quit, /q          Quit the application

  Anything else is sent as a question.

╰────────────────────────────────────────────────────────────────╯";

    CommandResult::Message(help_text.into())
}
