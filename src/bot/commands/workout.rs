use crate::bot::{BotContext, HandlerResult};
use crate::services::workout::OpenOutcome;
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::log_command_error;
use chrono::Utc;
use teloxide::prelude::*;

/// `/start_workout`: opens a window now and arms its timeout.
pub async fn handle_start_workout(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);

    match ctx.workouts.open_window(user_id, None).await {
        Ok(OpenOutcome::Opened { date, ends_at }) => {
            let until_end = (ends_at - Utc::now()).to_std().unwrap_or_default();
            let delay = until_end + ctx.reminders.grace();
            if let Err(e) = ctx.reminders.schedule_timeout(user_id, date, delay).await {
                tracing::error!("Failed to arm timeout for user {}: {}", user_id, e);
            }
        }
        Ok(OpenOutcome::NotRegistered) => {
            feedback.info("Send /start to set up your schedule and deposit first.").await?;
        }
        Ok(OpenOutcome::NoActiveDeposit) => {
            feedback.warning("You have no active deposit, so there is nothing to track.").await?;
        }
        Ok(OpenOutcome::DepositExpired) => {}
        Err(e) => {
            log_command_error("start_workout", user_id, &e.to_string());
            feedback.error("Could not start the workout, please try again.").await?;
        }
    }
    Ok(())
}

/// `/end_workout`: settles the open window with what has been sent.
pub async fn handle_end_workout(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);

    match ctx.workouts.end_window(user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            feedback.info("No workout is in progress.").await?;
        }
        Err(e) => {
            log_command_error("end_workout", user_id, &e.to_string());
            feedback.error("Could not finish the workout, please try again.").await?;
        }
    }
    Ok(())
}
