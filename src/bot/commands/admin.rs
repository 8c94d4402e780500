use crate::bot::{BotContext, HandlerResult};
use crate::utils::feedback::{CommandFeedback, FeedbackType};
use crate::utils::logging::{log_command_error, log_system_event};
use teloxide::prelude::*;

/// `/clear_db`: wipes users and captures. Admin only.
pub async fn handle_clear_db(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);

    if !ctx.config.is_admin(user_id) {
        feedback.error("This command is for the admin only.").await?;
        return Ok(());
    }

    let processing = feedback.send_processing("Clearing the database...").await?;
    if let Err(e) = ctx.reminders.unschedule_all().await {
        tracing::warn!("Failed to remove reminder jobs: {}", e);
    }
    match ctx.db.truncate_all().await {
        Ok(()) => {
            log_system_event("Database cleared", Some(&format!("by admin {user_id}")));
            feedback
                .update_message(
                    processing.id,
                    FeedbackType::Success,
                    "All users and captures deleted.",
                )
                .await?;
        }
        Err(e) => {
            log_command_error("clear_db", user_id, &e.to_string());
            feedback
                .update_message(
                    processing.id,
                    FeedbackType::Error,
                    "Failed to clear the database.",
                )
                .await?;
        }
    }
    Ok(())
}
