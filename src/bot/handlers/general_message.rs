use teloxide::prelude::*;
use crate::utils::feedback::CommandFeedback;

pub async fn handle_general_message(
    bot: Bot,
    msg: Message,
) -> ResponseResult<()> {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    if let Some(text) = msg.text() {
        let lower = text.to_lowercase();
        if text.starts_with('/') {
            let command = text.split_whitespace().next().unwrap_or(text);
            let error_msg = format!("Unknown command: {command}");
            feedback.validation_error(&error_msg, "/help lists every command").await?;
        } else if lower.contains("photo") || lower.contains("workout") {
            feedback
                .info("Send photos while a workout is in progress. Use /start_workout to begin one now.")
                .await?;
        } else if lower.contains("help") {
            feedback.info("Use /help to see all available commands!").await?;
        } else {
            feedback.info("Use /start to set up your workouts or /profile to see your progress.").await?;
        }
    }

    Ok(())
}
