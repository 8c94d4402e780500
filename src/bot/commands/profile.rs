use crate::bot::{BotContext, HandlerResult};
use crate::database::models::{Capture, CaptureStats, User};
use crate::domain::{CaptureRules, UserProfile};
use crate::utils::datetime::{format_datetime, parse_stored};
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::log_database_error;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use teloxide::prelude::*;

pub async fn handle_profile(bot: Bot, chat_id: ChatId, user_id: i64, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), chat_id);

    let user = match User::find(&ctx.db.pool, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            feedback.info("No profile yet. Send /start to set one up.").await?;
            return Ok(());
        }
        Err(e) => {
            log_database_error("find", "users", &e.to_string());
            feedback.error("Could not load your profile.").await?;
            return Ok(());
        }
    };

    let stats = Capture::stats_for_user(&ctx.db.pool, user_id).await.unwrap_or_else(|e| {
        log_database_error("stats_for_user", "captures", &e.to_string());
        CaptureStats::default()
    });
    let profile = user.profile();
    let rules = ctx.workouts.rules_for(&profile);
    let registered = parse_stored(&user.registered_at);

    let report = build_profile_report(&profile, registered, stats, &rules, Utc::now(), ctx.config.timezone);
    bot.send_message(chat_id, report).await?;
    Ok(())
}

/// Plain-text profile card.
pub fn build_profile_report(
    profile: &UserProfile,
    registered_at: Option<DateTime<Utc>>,
    stats: CaptureStats,
    rules: &CaptureRules,
    now: DateTime<Utc>,
    tz: Tz,
) -> String {
    let mut lines = vec!["📊 Your profile".to_string(), String::new()];

    if let Some(registered) = registered_at {
        lines.push(format!("Registered: {}", format_datetime(&registered, tz)));
    }

    let answers = &profile.answers;
    if !answers.goal.is_empty() {
        lines.push(format!("🎯 Goal: {}", answers.goal));
    }
    if !answers.experience.is_empty() {
        lines.push(format!("🩺 Level: {}", answers.experience));
    }
    if !answers.self_rate.is_empty() {
        lines.push(format!("📏 Discipline: {}", answers.self_rate));
    }

    lines.push(String::new());
    if profile.schedule.is_empty() {
        lines.push("📅 No schedule yet".to_string());
    } else {
        lines.push("📅 Schedule:".to_string());
        lines.extend(profile.schedule.summary_lines().into_iter().map(|l| format!("• {l}")));
        lines.push(format!("😮‍💨 Rest between photos: {} min", profile.rest_interval_min));
    }

    lines.push(String::new());
    match &profile.deposit {
        Some(deposit) => {
            lines.push(format!("💰 Deposit: {}", deposit.amount));
            lines.push(format!("Status: {}", deposit.status.label()));
            lines.push(format!(
                "Sessions: {}/{} ({} left)",
                deposit.sessions_done,
                deposit.sessions_required,
                deposit.sessions_remaining()
            ));
            if deposit.is_active() {
                lines.push(format!("Days remaining: {}", deposit.days_remaining(now)));
            }
            lines.push(format!("Days fulfilled: {}", deposit.fulfilled_days.len()));
            if let Some(reason) = &deposit.forfeit_reason {
                lines.push(format!("Forfeited: {reason}"));
            }
        }
        None => lines.push("💰 No deposit".to_string()),
    }

    if let Some(window) = &profile.active_window {
        lines.push(String::new());
        lines.push("🏋️ Workout in progress".to_string());
        lines.push(window.progress_line(rules));
    }

    lines.push(String::new());
    lines.push(format!(
        "📸 Photos verified: {}/{} ({:.0}%)",
        stats.verified,
        stats.total,
        stats.percent()
    ));

    lines.join("\n")
}
