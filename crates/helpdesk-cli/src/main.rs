use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod app;
mod commands;
mod view;

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "Helpdesk - chat with the support answer service")]
#[command(version)]
struct Cli {
    /// Ask a single question and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Base URL of the answer service
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory for saved conversations
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = helpdesk_core::Settings::load();

    if let Some(endpoint) = cli.endpoint {
        settings.api.base_url = endpoint;
    }
    if let Some(dir) = cli.data_dir {
        settings.storage.data_dir = Some(dir);
    }

    if let Some(prompt) = cli.prompt {
        app::run_single_prompt(&settings, &prompt).await?;
    } else {
        app::run_interactive(settings).await?;
    }

    Ok(())
}
