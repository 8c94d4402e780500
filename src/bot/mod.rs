pub mod commands;
pub mod handlers;
pub mod wizard;

use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::services::{relay::RelayClient, reminder::ReminderService, vision::VisionClient, workout::WorkoutService};
use std::sync::Arc;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Shared handles every handler needs.
#[derive(Clone)]
pub struct BotContext {
    pub db: Arc<DatabaseManager>,
    pub config: Config,
    pub workouts: Arc<WorkoutService>,
    pub reminders: ReminderService,
    pub vision: VisionClient,
    pub relay: RelayClient,
}
