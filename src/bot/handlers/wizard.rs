//! Onboarding steps. Buttons and typed answers feed the same step functions.

use crate::bot::wizard::{
    confirm_deposit_keyboard, days_keyboard, deposit_days_keyboard, duration_keyboard, main_keyboard,
    question_text, rest_keyboard, rules_keyboard, rules_text, time_keyboard, toggle_day, Draft, WizardDialogue,
    WizardInput, WizardState,
};
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::User;
use crate::domain::{parse_days, parse_duration, parse_time, Day, Deposit, UserProfile, QUESTIONS};
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::{log_database_error, log_wizard_step};
use crate::utils::validation::{
    validate_answer, validate_deposit_days_input, validate_deposit_input, validate_rest_interval,
};
use chrono::{NaiveTime, Utc};
use teloxide::prelude::*;
use teloxide::types::MessageId;

/// Where a wizard step replies.
pub struct StepTarget {
    pub bot: Bot,
    pub chat_id: ChatId,
    pub user_id: i64,
}

impl StepTarget {
    fn feedback(&self) -> CommandFeedback {
        CommandFeedback::new(self.bot.clone(), self.chat_id)
    }
}

pub async fn handle_wizard_text(
    bot: Bot,
    msg: Message,
    dialogue: WizardDialogue,
    state: WizardState,
    text: &str,
    ctx: &BotContext,
) -> HandlerResult {
    let target = StepTarget {
        bot,
        chat_id: msg.chat.id,
        user_id: msg.from().map(|u| u.id.0 as i64).unwrap_or(0),
    };
    let feedback = target.feedback();

    match state {
        WizardState::Idle => {}
        WizardState::Intro | WizardState::Rules => {
            feedback.info("Press the button above to continue.").await?;
        }
        WizardState::Question { index, mut draft } => match validate_answer(text) {
            Ok(answer) => {
                draft.answers.set(index, answer);
                next_question(&target, &dialogue, index + 1, draft).await?;
            }
            Err(e) => {
                feedback.error(&e.to_string()).await?;
            }
        },
        WizardState::PickDays { draft, .. } => {
            let days = parse_days(text);
            if days.is_empty() {
                feedback
                    .validation_error("I couldn't find any days in that.", "Mon, Wed, Fri or Mon-Fri")
                    .await?;
            } else {
                start_schedule(&target, &dialogue, draft, days).await?;
            }
        }
        WizardState::PickTime { draft } => match parse_time(text) {
            Some(start) => ask_duration(&target, &dialogue, draft, start).await?,
            None => {
                feedback
                    .validation_error("That doesn't look like a time.", "19:30")
                    .await?;
            }
        },
        WizardState::PickDuration { draft, start } => match parse_duration(text) {
            Some(minutes) => apply_duration(&target, &dialogue, draft, start, minutes).await?,
            None => {
                feedback
                    .validation_error("Duration must be between 10 and 240 minutes.", "60")
                    .await?;
            }
        },
        WizardState::PickRest { draft } => match validate_rest_interval(text) {
            Ok(minutes) => apply_rest(&target, &dialogue, draft, minutes).await?,
            Err(e) => {
                feedback.validation_error(&e.to_string(), "10").await?;
            }
        },
        WizardState::PickDepositDays { draft } => match validate_deposit_days_input(text) {
            Ok(days) => apply_deposit_days(&target, &dialogue, draft, days, ctx).await?,
            Err(e) => {
                feedback.validation_error(&e.to_string(), "30").await?;
            }
        },
        WizardState::ConfirmDeposit { draft, .. } | WizardState::EnterDeposit { draft } => {
            match validate_deposit_input(text) {
                Ok(amount) => finish(&target, &dialogue, draft, amount, ctx).await?,
                Err(e) => {
                    feedback.validation_error(&e.to_string(), "5000").await?;
                }
            }
        }
    }
    Ok(())
}

/// Applies a wizard button press. Returns false when the button does not
/// belong to the current step.
pub async fn handle_wizard_input(
    target: &StepTarget,
    dialogue: &WizardDialogue,
    state: WizardState,
    input: WizardInput,
    message_id: Option<MessageId>,
    ctx: &BotContext,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let step = state.step_name();
    match (input, state) {
        (WizardInput::Next, WizardState::Intro) => {
            dialogue.update(WizardState::Rules).await?;
            log_wizard_step(target.user_id, "rules", None);
            let text = rules_text(
                ctx.config.shots_per_window,
                ctx.config.pass_threshold,
                ctx.config.end_grace_minutes,
            );
            target
                .bot
                .send_message(target.chat_id, text)
                .reply_markup(rules_keyboard())
                .await?;
        }
        (WizardInput::Begin, WizardState::Rules) => {
            next_question(target, dialogue, 0, Draft::default()).await?;
        }
        (WizardInput::ToggleDay(day), WizardState::PickDays { draft, mut days }) => {
            toggle_day(&mut days, day);
            let keyboard = days_keyboard(&days);
            dialogue.update(WizardState::PickDays { draft, days }).await?;
            if let Some(message_id) = message_id {
                target
                    .bot
                    .edit_message_reply_markup(target.chat_id, message_id)
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        (WizardInput::DaysDone, WizardState::PickDays { draft, days }) => {
            if days.is_empty() {
                target.feedback().warning("Pick at least one day first.").await?;
            } else {
                start_schedule(target, dialogue, draft, days).await?;
            }
        }
        (WizardInput::Time(start), WizardState::PickTime { draft }) => {
            ask_duration(target, dialogue, draft, start).await?;
        }
        (WizardInput::Duration(minutes), WizardState::PickDuration { draft, start }) => {
            apply_duration(target, dialogue, draft, start, minutes).await?;
        }
        (WizardInput::Rest(minutes), WizardState::PickRest { draft }) => {
            apply_rest(target, dialogue, draft, minutes).await?;
        }
        (WizardInput::DepositDays(days), WizardState::PickDepositDays { draft }) => {
            apply_deposit_days(target, dialogue, draft, days, ctx).await?;
        }
        (WizardInput::AcceptDeposit, WizardState::ConfirmDeposit { draft, advice }) => {
            finish(target, dialogue, draft, advice.amount, ctx).await?;
        }
        (WizardInput::CustomDeposit, WizardState::ConfirmDeposit { draft, .. }) => {
            dialogue.update(WizardState::EnterDeposit { draft }).await?;
            log_wizard_step(target.user_id, "enter_deposit", None);
            target
                .bot
                .send_message(target.chat_id, "✏️ Type the deposit amount, e.g. 5000.")
                .await?;
        }
        _ => {
            tracing::debug!("Button {:?} does not belong to step {}", input, step);
            return Ok(false);
        }
    }
    Ok(true)
}

async fn next_question(target: &StepTarget, dialogue: &WizardDialogue, index: usize, draft: Draft) -> HandlerResult {
    match question_text(index) {
        Some(text) => {
            dialogue.update(WizardState::Question { index, draft }).await?;
            log_wizard_step(target.user_id, "question", Some(&format!("{}/{}", index + 1, QUESTIONS.len())));
            target.bot.send_message(target.chat_id, text).await?;
        }
        None => {
            dialogue
                .update(WizardState::PickDays {
                    draft,
                    days: Vec::new(),
                })
                .await?;
            log_wizard_step(target.user_id, "pick_days", None);
            target
                .bot
                .send_message(
                    target.chat_id,
                    "📅 Which days will you train? Tap the days and press Done, or type them (e.g. Mon, Wed, Fri).",
                )
                .reply_markup(days_keyboard(&[]))
                .await?;
        }
    }
    Ok(())
}

async fn start_schedule(target: &StepTarget, dialogue: &WizardDialogue, mut draft: Draft, days: Vec<Day>) -> HandlerResult {
    draft.begin_schedule(days);
    ask_time(target, dialogue, draft).await
}

async fn ask_time(target: &StepTarget, dialogue: &WizardDialogue, draft: Draft) -> HandlerResult {
    let Some(day) = draft.current_day() else {
        return ask_rest(target, dialogue, draft).await;
    };
    dialogue.update(WizardState::PickTime { draft }).await?;
    log_wizard_step(target.user_id, "pick_time", Some(day.code()));
    target
        .bot
        .send_message(
            target.chat_id,
            format!("⏰ What time do you start on {day}? Tap a button or type it, e.g. 19:30."),
        )
        .reply_markup(time_keyboard())
        .await?;
    Ok(())
}

async fn ask_duration(target: &StepTarget, dialogue: &WizardDialogue, draft: Draft, start: NaiveTime) -> HandlerResult {
    let day = draft.current_day().map(|d| d.to_string()).unwrap_or_default();
    dialogue.update(WizardState::PickDuration { draft, start }).await?;
    log_wizard_step(target.user_id, "pick_duration", Some(&day));
    target
        .bot
        .send_message(
            target.chat_id,
            format!("⏱ How long is your {day} workout? Tap a button or type minutes (10 to 240)."),
        )
        .reply_markup(duration_keyboard())
        .await?;
    Ok(())
}

async fn apply_duration(
    target: &StepTarget,
    dialogue: &WizardDialogue,
    mut draft: Draft,
    start: NaiveTime,
    minutes: u32,
) -> HandlerResult {
    if draft.complete_day(start, minutes) {
        ask_time(target, dialogue, draft).await
    } else {
        ask_rest(target, dialogue, draft).await
    }
}

async fn ask_rest(target: &StepTarget, dialogue: &WizardDialogue, draft: Draft) -> HandlerResult {
    dialogue.update(WizardState::PickRest { draft }).await?;
    log_wizard_step(target.user_id, "pick_rest", None);
    target
        .bot
        .send_message(
            target.chat_id,
            "😮‍💨 How many minutes of rest between photos? Photos sent sooner won't count.",
        )
        .reply_markup(rest_keyboard())
        .await?;
    Ok(())
}

async fn apply_rest(target: &StepTarget, dialogue: &WizardDialogue, mut draft: Draft, minutes: u32) -> HandlerResult {
    draft.rest_interval_min = minutes;
    dialogue.update(WizardState::PickDepositDays { draft }).await?;
    log_wizard_step(target.user_id, "pick_deposit_days", Some(&format!("rest {minutes} min")));
    target
        .bot
        .send_message(target.chat_id, "📆 For how many days do you commit? (7 to 180)")
        .reply_markup(deposit_days_keyboard())
        .await?;
    Ok(())
}

async fn apply_deposit_days(
    target: &StepTarget,
    dialogue: &WizardDialogue,
    mut draft: Draft,
    days: u32,
    ctx: &BotContext,
) -> HandlerResult {
    draft.deposit_days = days;
    let processing = target.feedback().send_processing("Working out a deposit for you...").await?;

    let advice = ctx.vision.recommend_deposit(&draft.answers, &draft.schedule).await;

    let mut text = format!(
        "💰 Suggested deposit: {}\n{}\n\nYour schedule:\n",
        advice.amount, advice.reason
    );
    text.push_str(&draft.schedule.summary_lines().join("\n"));
    text.push_str(&format!("\n\nCommitment: {days} days"));

    let keyboard = confirm_deposit_keyboard(advice.amount);
    dialogue.update(WizardState::ConfirmDeposit { draft, advice }).await?;
    log_wizard_step(target.user_id, "confirm_deposit", None);

    if let Err(e) = target.bot.delete_message(target.chat_id, processing.id).await {
        tracing::debug!("Could not delete processing message: {}", e);
    }
    target
        .bot
        .send_message(target.chat_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Saves the new profile, registers reminders and leaves the wizard.
async fn finish(target: &StepTarget, dialogue: &WizardDialogue, draft: Draft, amount: i64, ctx: &BotContext) -> HandlerResult {
    let user_id = target.user_id;
    let now = Utc::now();
    let deposit = Deposit::new(amount, draft.deposit_days, &draft.schedule, now, ctx.config.timezone);
    let sessions = deposit.sessions_required;

    let profile = UserProfile {
        answers: draft.answers,
        schedule: draft.schedule,
        rest_interval_min: draft.rest_interval_min,
        deposit: Some(deposit),
        active_window: None,
        onboarded_at: Some(now),
    };

    {
        let _guard = ctx.workouts.lock_user(user_id).await;
        let saved = match User::touch(&ctx.db.pool, user_id, None, None).await {
            Ok(_) => User::save_profile(&ctx.db.pool, user_id, &profile).await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            log_database_error("save_profile", "users", &e.to_string());
            target
                .feedback()
                .error("Could not save your profile, please try again.")
                .await?;
            return Ok(());
        }
    }

    if let Err(e) = ctx.reminders.schedule_user(user_id, &profile.schedule).await {
        tracing::error!("Failed to schedule reminders for user {}: {}", user_id, e);
    }
    dialogue.update(WizardState::Idle).await?;
    log_wizard_step(user_id, "finished", Some(&format!("deposit {amount}, {sessions} sessions")));

    let text = format!(
        "🎉 All set!\n\nDeposit: {amount}\nWorkouts to complete: {sessions}\n\n{}\n\nI'll ping you when each workout starts.",
        profile.schedule.summary_lines().join("\n")
    );
    target
        .bot
        .send_message(target.chat_id, text)
        .reply_markup(main_keyboard(ctx.config.webapp_url().as_deref()))
        .await?;
    Ok(())
}
