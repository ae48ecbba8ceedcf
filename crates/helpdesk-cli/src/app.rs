use anyhow::{Context, Result};
use helpdesk_core::{
    ConversationStore, FileStorage, HttpAnswerClient, MemoryStorage, SendOutcome,
    SessionController, Settings,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::{self, CommandResult};
use crate::view::{format_summary, TerminalView};

fn controller(settings: &Settings, store: ConversationStore) -> SessionController {
    let client = Arc::new(HttpAnswerClient::from_settings(&settings.api));
    SessionController::new(store, client)
        .with_settings(settings)
        .with_view(Arc::new(TerminalView::stdout()))
}

// ── Single-prompt mode ──────────────────────────────────────────────────

/// Ask one question in a throwaway conversation and print the answer.
pub async fn run_single_prompt(settings: &Settings, prompt: &str) -> Result<()> {
    let store = ConversationStore::open(Box::new(MemoryStorage::new()));
    let controller = controller(settings, store);

    match controller.send(prompt).await {
        SendOutcome::Answered { .. } => Ok(()),
        SendOutcome::Failed { message, .. } => anyhow::bail!("{}", message.text),
        SendOutcome::Empty => anyhow::bail!("Prompt is empty"),
        SendOutcome::Busy => Ok(()),
    }
}

// ── Interactive mode ────────────────────────────────────────────────────

pub async fn run_interactive(settings: Settings) -> Result<()> {
    let data_dir = settings.data_dir();
    let storage = FileStorage::new(&data_dir)
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    let controller = controller(&settings, ConversationStore::open(Box::new(storage)));

    tracing::info!("Answer service: {}", settings.api.stream_url());
    println!("Helpdesk chat. Type /help for commands.\n");
    controller.show_current().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !handle_line(&controller, &line).await {
            break;
        }
    }
    Ok(())
}

/// Process one input line. Returns false when the user asked to quit.
async fn handle_line(controller: &SessionController, line: &str) -> bool {
    match commands::handle_command(line) {
        CommandResult::Quit => return false,
        CommandResult::Message(text) => println!("{text}"),
        CommandResult::NewConversation => {
            controller.new_conversation().await;
        }
        CommandResult::ListConversations => {
            let now = chrono::Utc::now();
            for summary in controller.conversations().await {
                println!("{}", format_summary(&summary, now));
            }
        }
        CommandResult::SwitchConversation(id) => {
            if !controller.switch_to(&id).await {
                println!("No conversation with id {id}.");
            }
        }
        CommandResult::DeleteConversation(id) => {
            if controller.delete(&id).await {
                println!("Deleted {id}.");
            } else {
                println!("No conversation with id {id}.");
            }
        }
        CommandResult::ShowSupport => {
            controller.support_message().await;
        }
        CommandResult::NotACommand => {
            if let SendOutcome::Busy = controller.send(line).await {
                println!("Still waiting for the previous answer.");
            }
        }
    }
    true
}
