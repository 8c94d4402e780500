use crate::bot::handlers::wizard::{handle_wizard_input, StepTarget};
use crate::bot::wizard::{WizardDialogue, WizardInput, WizardState};
use crate::bot::{BotContext, HandlerResult};
use crate::domain::DepositStatus;
use crate::utils::validation::split_callback;
use teloxide::prelude::*;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: WizardDialogue,
    state: WizardState,
    ctx: BotContext,
) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    let username = q.from.username.as_deref().unwrap_or("unknown");
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(q.id).text("Invalid callback data").await?;
        return Ok(());
    };
    tracing::info!("Callback received: '{}' from user {} ({})", data, username, user_id);

    if let (prefix @ ("depwin" | "depforf"), Some(arg)) = split_callback(&data) {
        return handle_deposit_decision(bot, q, prefix == "depwin", arg, &ctx).await;
    }

    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let target = StepTarget {
        bot: bot.clone(),
        chat_id: message.chat.id,
        user_id,
    };
    let message_id = Some(message.id);

    let handled = match WizardInput::parse(&data) {
        Some(input) => handle_wizard_input(&target, &dialogue, state, input, message_id, &ctx).await?,
        None => false,
    };

    if handled {
        bot.answer_callback_query(q.id).await?;
    } else {
        bot.answer_callback_query(q.id).text("This step is over").await?;
    }
    Ok(())
}

/// Admin's return / keep decision on a user's deposit.
async fn handle_deposit_decision(
    bot: Bot,
    q: CallbackQuery,
    returned: bool,
    arg: &str,
    ctx: &BotContext,
) -> HandlerResult {
    let admin_id = q.from.id.0 as i64;
    let Ok(user_id) = arg.parse::<i64>() else {
        bot.answer_callback_query(q.id).text("Invalid user id").await?;
        return Ok(());
    };

    match ctx.workouts.resolve_deposit(admin_id, user_id, returned).await {
        Ok(status) => {
            let label = match status {
                DepositStatus::Returned => "Deposit returned",
                _ => "Deposit kept",
            };
            bot.answer_callback_query(q.id).text(label).await?;
            if let Some(message) = q.message {
                bot.edit_message_reply_markup(message.chat.id, message.id).await?;
                bot.send_message(message.chat.id, format!("✅ {label} for user {user_id}"))
                    .await?;
            }
        }
        Err(e) => {
            tracing::warn!("Deposit decision by {} for {} rejected: {}", admin_id, user_id, e);
            bot.answer_callback_query(q.id).text(e.to_string()).await?;
        }
    }
    Ok(())
}
