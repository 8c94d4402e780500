//! # Workout Deposit Bot Main Entry Point
//!
//! Initializes logging, loads configuration, sets up the database and the
//! dialogue storage, restores reminder jobs and runs the Telegram bot next
//! to the health server.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{serializer::Json, SqliteStorage, Storage};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workout_deposit_bot::bot::handlers::BotHandler;
use workout_deposit_bot::bot::wizard::WizardStorage;
use workout_deposit_bot::bot::BotContext;
use workout_deposit_bot::config::Config;
use workout_deposit_bot::database::connection::DatabaseManager;
use workout_deposit_bot::services::health::HealthService;
use workout_deposit_bot::services::relay::RelayClient;
use workout_deposit_bot::services::reminder::ReminderService;
use workout_deposit_bot::services::vision::VisionClient;
use workout_deposit_bot::services::workout::WorkoutService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workout_deposit_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Workout Deposit Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Database: {}, HTTP Port: {}, Timezone: {}",
        config.database_url, config.http_port, config.timezone
    );

    if let Some(parent) = Path::new(config.database_path()).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!("Initializing database connection...");
    let db_manager = DatabaseManager::new(&config.database_url).await?;
    info!("Running database migrations...");
    db_manager.run_migrations().await?;
    let db = Arc::new(db_manager);
    info!("Database initialized successfully");

    let storage: Arc<WizardStorage> = SqliteStorage::open(config.database_path(), Json)
        .await?
        .erase();

    let bot = Bot::new(&config.telegram_bot_token);
    let vision = VisionClient::new(&config)?;
    let relay = RelayClient::new(config.clone())?;
    let workouts = Arc::new(WorkoutService::new(bot.clone(), db.clone(), vision.clone(), config.clone()));

    info!("Initializing reminder service...");
    let reminders = ReminderService::new(workouts.clone(), db.clone(), config.timezone, config.end_grace_minutes)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create reminder service: {}", e))?;
    if let Err(e) = reminders.start().await {
        tracing::error!("Failed to start reminder service: {}", e);
    }
    match reminders.reschedule_all().await {
        Ok(count) => info!("Reminders restored for {} users", count),
        Err(e) => tracing::error!("Failed to restore reminders: {}", e),
    }

    let ctx = BotContext {
        db: db.clone(),
        config: config.clone(),
        workouts,
        reminders: reminders.clone(),
        vision,
        relay,
    };
    let handler = BotHandler::new(ctx);

    let health_service = HealthService::new(db.clone(), Some(reminders.clone()));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;

    info!("Health check server starting on port {}", config.http_port);

    let bot_task = tokio::spawn(async move {
        Dispatcher::builder(bot, handler.schema())
            .dependencies(dptree::deps![storage])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_service.router).await {
            tracing::error!("Health server error: {}", e);
        }
    });

    tokio::select! {
        result = bot_task => {
            if let Err(e) = result {
                tracing::error!("Bot task error: {}", e);
            }
        }
        result = health_task => {
            if let Err(e) = result {
                tracing::error!("Health task error: {}", e);
            }
        }
    }

    if let Err(e) = reminders.stop().await {
        tracing::warn!("Error stopping reminder service: {}", e);
    }

    info!("Application stopped");
    Ok(())
}

