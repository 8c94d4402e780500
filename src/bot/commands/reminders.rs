use crate::bot::{BotContext, HandlerResult};
use crate::database::models::User;
use crate::domain::{Phase, WeeklySchedule};
use crate::utils::datetime::format_datetime;
use crate::utils::feedback::CommandFeedback;
use teloxide::prelude::*;

pub async fn handle_reminders(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);

    let profile = match User::load_profile(&ctx.db.pool, user_id).await {
        Ok(Some(profile)) if !profile.schedule.is_empty() => profile,
        Ok(_) => {
            feedback.info("You have no workout schedule yet. Send /start to set one up.").await?;
            return Ok(());
        }
        Err(e) => {
            tracing::error!("Failed to load profile for reminders: {}", e);
            feedback.error("Could not load your schedule.").await?;
            return Ok(());
        }
    };

    let mut text = format!("⏰ Reminders ({}):\n\n", ctx.config.timezone);
    text.push_str(&format_triggers(&profile.schedule).join("\n"));
    if !profile.has_active_deposit() {
        text.push_str("\n\nReminders are paused: no active deposit.");
    } else {
        match ctx.reminders.next_runs(user_id).await {
            Ok(runs) => {
                if let Some(next) = runs.first() {
                    text.push_str(&format!("\n\nNext: {}", format_datetime(next, ctx.config.timezone)));
                }
            }
            Err(e) => tracing::warn!("Could not read next reminder for user {}: {}", user_id, e),
        }
    }
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// One line per trigger, e.g. `Mon 19:00 ▶️ start (Mon workout)`.
pub fn format_triggers(schedule: &WeeklySchedule) -> Vec<String> {
    schedule
        .triggers()
        .into_iter()
        .map(|t| {
            let icon = match t.phase {
                Phase::Start => "▶️",
                Phase::Mid => "⏱",
                Phase::End => "⏹",
            };
            format!(
                "{} {} {} {} ({} workout)",
                t.day,
                t.time.format("%H:%M"),
                icon,
                t.phase.label(),
                t.workout_day
            )
        })
        .collect()
}
