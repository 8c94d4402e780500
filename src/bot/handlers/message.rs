use crate::bot::commands::{admin, profile, reminders, start, workout, Command};
use crate::bot::handlers::{general_message, photo, wizard};
use crate::bot::wizard::{WizardDialogue, WizardState, PROFILE_BUTTON};
use crate::bot::{BotContext, HandlerResult};
use crate::utils::logging::log_command_start;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: WizardDialogue,
    ctx: BotContext,
) -> HandlerResult {
    if let Some(from) = msg.from() {
        let name = from.username.as_deref().unwrap_or(&from.first_name);
        log_command_start(&format!("{cmd:?}"), name, from.id.0 as i64, msg.chat.id.0);
    }

    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Start => start::handle_start(bot, msg, dialogue, &ctx).await?,
        Command::Reset => start::handle_reset(bot, msg, dialogue, &ctx).await?,
        Command::Profile => {
            let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);
            profile::handle_profile(bot, msg.chat.id, user_id, &ctx).await?;
        }
        Command::Reminders => reminders::handle_reminders(bot, msg, &ctx).await?,
        Command::StartWorkout => workout::handle_start_workout(bot, msg, &ctx).await?,
        Command::EndWorkout => workout::handle_end_workout(bot, msg, &ctx).await?,
        Command::ClearDb => admin::handle_clear_db(bot, msg, &ctx).await?,
    }
    Ok(())
}

/// Everything that isn't a command: photos, web-app data, menu buttons and
/// wizard answers.
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: WizardDialogue,
    state: WizardState,
    ctx: BotContext,
) -> HandlerResult {
    if msg.photo().is_some() || msg.document().is_some() {
        return photo::handle_photo(bot, msg, &ctx).await;
    }
    if photo::web_app_data(&msg).is_some() {
        return photo::handle_web_app_data(bot, msg, &ctx).await;
    }

    let Some(text) = msg.text().map(str::to_string) else {
        return Ok(());
    };

    if text.trim() == PROFILE_BUTTON {
        let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);
        return profile::handle_profile(bot, msg.chat.id, user_id, &ctx).await;
    }

    if state.is_active() {
        return wizard::handle_wizard_text(bot, msg, dialogue, state, &text, &ctx).await;
    }

    general_message::handle_general_message(bot, msg).await?;
    Ok(())
}
