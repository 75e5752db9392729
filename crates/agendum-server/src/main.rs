use std::path::PathBuf;
use std::sync::Arc;

use agendum_calendar::{CalendarStore, GoogleCalendar, OAuthConfig, TokenStore};
use agendum_core::{Agent, AgentConfig, ConversationStore, EvictionPolicy};
use agendum_provider::create_provider;
use agendum_telegram::TelegramBot;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use config::{load_config, MainConfig};

#[derive(Parser)]
#[command(name = "agendum", version, about = "Conversational Google Calendar agent for Telegram")]
struct Cli {
    #[arg(long, default_value = "agendum.yaml", help = "Path to the YAML config file")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the Telegram bot")]
    Start,
    #[command(about = "Parse the config and exit")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli.config)?;

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Validate => {
            println!(
                "Config valid. provider model {}, history window {}.",
                config.provider.model, config.agent.history_window
            );
            Ok(())
        }
        Commands::Start => run(config).await,
    }
}

async fn run(config: MainConfig) -> Result<()> {
    let provider = create_provider(&config.provider)?;

    let oauth = OAuthConfig {
        client_id: config.google.client_id.clone(),
        client_secret: config.google.client_secret.clone(),
        callback_port: config.google.callback_port,
    };
    let tokens = TokenStore::new(&config.google.token_file);
    let calendar: Arc<dyn CalendarStore> = Arc::new(GoogleCalendar::new(oauth, tokens));

    let store = Arc::new(ConversationStore::new(EvictionPolicy {
        max_conversations: config.agent.max_conversations,
        max_turns_per_chat: config.agent.max_turns_per_chat,
    }));

    let agent = Agent::new(
        provider,
        calendar,
        store,
        AgentConfig {
            model: config.provider.model.clone(),
            history_window: config.agent.history_window,
        },
    );

    tracing::info!(model = %config.provider.model, "starting agendum");
    TelegramBot::new(config.telegram.token.clone(), Arc::new(agent))
        .run()
        .await
}
