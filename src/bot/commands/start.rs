use crate::bot::wizard::{intro_keyboard, main_keyboard, WizardDialogue, WizardState, INTRO_TEXT};
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::User;
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::{log_database_error, log_wizard_step};
use crate::utils::validation::validate_telegram_chat_id;
use teloxide::prelude::*;

pub async fn handle_start(bot: Bot, msg: Message, dialogue: WizardDialogue, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);
    if let Err(e) = validate_telegram_chat_id(msg.chat.id.0) {
        feedback.error(&e.to_string()).await?;
        return Ok(());
    }
    let Some(from) = msg.from() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;

    let user = match User::touch(&ctx.db.pool, user_id, from.username.clone(), Some(from.first_name.clone())).await {
        Ok(user) => user,
        Err(e) => {
            log_database_error("touch", "users", &e.to_string());
            feedback.error("Could not load your profile, please try again later.").await?;
            return Ok(());
        }
    };

    let profile = user.profile();
    if profile.is_onboarded() && profile.deposit.as_ref().is_some_and(|d| !d.status.is_final()) {
        dialogue.update(WizardState::Idle).await?;
        let status = profile
            .deposit
            .as_ref()
            .map(|d| format!("Deposit {} · {} · {}/{} sessions", d.amount, d.status.label(), d.sessions_done, d.sessions_required))
            .unwrap_or_default();
        bot.send_message(msg.chat.id, format!("💪 Welcome back!\n{status}"))
            .reply_markup(main_keyboard(ctx.config.webapp_url().as_deref()))
            .await?;
        return Ok(());
    }

    begin_onboarding(bot, msg.chat.id, user_id, dialogue).await
}

/// `/reset`: the new profile replaces the old one when onboarding finishes.
pub async fn handle_reset(bot: Bot, msg: Message, dialogue: WizardDialogue, ctx: &BotContext) -> HandlerResult {
    let Some(from) = msg.from() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;
    if let Err(e) = User::touch(&ctx.db.pool, user_id, from.username.clone(), Some(from.first_name.clone())).await {
        log_database_error("touch", "users", &e.to_string());
    }

    let has_deposit = matches!(
        User::load_profile(&ctx.db.pool, user_id).await,
        Ok(Some(ref p)) if p.has_active_deposit()
    );
    if has_deposit {
        CommandFeedback::new(bot.clone(), msg.chat.id)
            .warning("Your current deposit stays in force until you finish the new onboarding.")
            .await?;
    }

    begin_onboarding(bot, msg.chat.id, user_id, dialogue).await
}

async fn begin_onboarding(bot: Bot, chat_id: ChatId, user_id: i64, dialogue: WizardDialogue) -> HandlerResult {
    dialogue.update(WizardState::Intro).await?;
    log_wizard_step(user_id, "intro", None);
    bot.send_message(chat_id, INTRO_TEXT)
        .reply_markup(intro_keyboard())
        .await?;
    Ok(())
}
