// This is the entry point of the group guard bot.
//
// **Architecture Overview:**
// - `core/` = Filtering rules and the group filter service (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite)
// - `discord/` = Discord-specific adapters (commands, message handling)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::group_filter::GroupFilterService;
use crate::discord::filter_handler;
use crate::discord::{Data, Error};
use crate::infra::group_filter::SqliteGroupStore;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            match filter_handler::handle_message_for_filter(ctx, new_message, data).await {
                Ok(true) => {
                    tracing::debug!(message_id = new_message.id.get(), "Message was filtered");
                }
                Ok(false) => {}
                Err(e) => tracing::error!("Error filtering message: {}", e),
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            // Config stays stored; only the compiled checker is dropped.
            data.group_filter.invalidate(incomplete.id.get());
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Initialize logging; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").context(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    )?;

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let data_dir = std::env::var("GROUP_GUARD_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let command_prefix =
        std::env::var("GROUP_GUARD_COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string());
    let filter_db_path = format!("{}/group_filter.db", data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let group_store = SqliteGroupStore::open(&filter_db_path)
        .await
        .with_context(|| format!("Failed to open group filter database at {}", filter_db_path))?;
    let group_filter = Arc::new(GroupFilterService::new(group_store));

    let data = Data {
        group_filter,
        command_prefix,
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::groupfilter()],
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!(user = %ready.user.name, "🤖 Bot is starting up...");

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                tracing::info!("✅ Commands registered");
                Ok(data)
            })
        })
        .build();

    // Message content is needed for sensitive words and links.
    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILDS;

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
