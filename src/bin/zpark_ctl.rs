//! Zpark operator CLI
//!
//! Inspects the Spark rooms the bot is in and manages the webhook that
//! delivers bot commands back to the Zpark API.
//!
//! Usage:
//!   zpark_ctl show-rooms
//!   zpark_ctl show-webhooks
//!   zpark_ctl create-webhook
//!   zpark_ctl delete-webhook <WEBHOOK_ID>

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use zpark::config::Config;
use zpark::models::AppResult;
use zpark::providers::SparkClient;

const WEBHOOK_NAME: &str = "Zpark webhook";

#[derive(Parser)]
#[command(name = "zpark_ctl")]
#[command(version)]
#[command(about = "Manage Zpark's Spark rooms and webhooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the group rooms the bot has been invited to
    ShowRooms,
    /// List the webhooks registered for the bot
    ShowWebhooks,
    /// Register the message webhook pointing at ZPARK_SERVER_URL
    CreateWebhook,
    /// Delete a webhook by id
    DeleteWebhook {
        /// Webhook id, as shown by show-webhooks
        webhook_id: String,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let spark = SparkClient::new(config.spark_api_url.clone(), &config.spark_access_token)?;

    match cli.command {
        Commands::ShowRooms => show_rooms(&spark).await?,
        Commands::ShowWebhooks => show_webhooks(&spark).await?,
        Commands::CreateWebhook => create_webhook(&spark, &config).await?,
        Commands::DeleteWebhook { webhook_id } => {
            spark.delete_webhook(&webhook_id).await?;
            println!("Deleted webhook {}", webhook_id);
        }
    }

    Ok(())
}

async fn show_rooms(spark: &SparkClient) -> AppResult<()> {
    let rooms = spark.list_group_rooms().await?;
    if rooms.is_empty() {
        println!("The bot is not in any group rooms");
        return Ok(());
    }
    for room in rooms {
        println!("{}  {}", room.id, room.title);
    }
    Ok(())
}

async fn show_webhooks(spark: &SparkClient) -> AppResult<()> {
    let webhooks = spark.list_webhooks().await?;
    if webhooks.is_empty() {
        println!("No webhooks are registered");
        return Ok(());
    }
    for hook in webhooks {
        println!(
            "{}  {}/{}  {}  {}",
            hook.id,
            hook.resource,
            hook.event,
            hook.status.as_deref().unwrap_or("unknown"),
            hook.target_url
        );
    }
    Ok(())
}

/// Registers the messages/created webhook. Idempotent: if a webhook with
/// our target URL already exists, nothing is created.
async fn create_webhook(spark: &SparkClient, config: &Config) -> eyre::Result<()> {
    let Some(target_url) = config.webhook_target_url() else {
        eyre::bail!("ZPARK_SERVER_URL must be set to register a webhook");
    };

    let existing = spark.list_webhooks().await?;
    if let Some(hook) = existing.iter().find(|h| h.target_url == target_url) {
        println!("Webhook already registered: {} -> {}", hook.id, hook.target_url);
        return Ok(());
    }

    if config.spark_webhook_secret.is_none() {
        eprintln!("Warning: SPARK_WEBHOOK_SECRET is not set; callbacks will be unsigned");
    }

    let hook = spark
        .create_webhook(
            WEBHOOK_NAME,
            &target_url,
            config.spark_webhook_secret.as_deref(),
        )
        .await?;
    println!("Created webhook {} -> {}", hook.id, hook.target_url);
    Ok(())
}
