pub mod callback;
pub mod general_message;
pub mod message;
pub mod photo;
pub mod wizard;

use crate::bot::commands::Command;
use crate::bot::wizard::{WizardDialogue, WizardState, WizardStorage};
use crate::bot::BotContext;
use teloxide::{
    dispatching::{dialogue, UpdateHandler},
    prelude::*,
};

pub struct BotHandler {
    pub ctx: BotContext,
}

impl BotHandler {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub fn schema(&self) -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
        use teloxide::dispatching::UpdateFilterExt;

        let ctx_command = self.ctx.clone();
        let ctx_message = self.ctx.clone();
        let ctx_callback = self.ctx.clone();

        dialogue::enter::<Update, WizardStorage, WizardState, _>()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command, dialogue: WizardDialogue| {
                        let ctx = ctx_command.clone();
                        async move { message::command_handler(bot, msg, cmd, dialogue, ctx).await }
                    }),
            )
            .branch(Update::filter_message().endpoint(
                move |bot: Bot, msg: Message, dialogue: WizardDialogue, state: WizardState| {
                    let ctx = ctx_message.clone();
                    async move { message::message_handler(bot, msg, dialogue, state, ctx).await }
                },
            ))
            .branch(Update::filter_callback_query().endpoint(
                move |bot: Bot, q: CallbackQuery, dialogue: WizardDialogue, state: WizardState| {
                    let ctx = ctx_callback.clone();
                    async move { callback::callback_handler(bot, q, dialogue, state, ctx).await }
                },
            ))
    }
}
