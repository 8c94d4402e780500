use crate::bot::{BotContext, HandlerResult};
use crate::services::relay::WebAppPayload;
use crate::services::workout::PhotoOutcome;
use crate::utils::feedback::{CommandFeedback, ProgressTracker};
use crate::utils::logging::log_capture_event;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{MessageKind, MessageWebAppData};

/// Photos and image documents sent straight to the chat.
pub async fn handle_photo(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);

    let file = if let Some(photos) = msg.photo() {
        // Telegram lists sizes ascending; the last one is the original
        photos.last().map(|p| p.file.clone())
    } else if let Some(doc) = msg.document() {
        let is_image = doc
            .mime_type
            .as_ref()
            .is_some_and(|m| m.essence_str().starts_with("image/"));
        if !is_image {
            feedback.warning("Please send the workout photo as an image.").await?;
            return Ok(());
        }
        Some(doc.file.clone())
    } else {
        None
    };
    let Some(file) = file else {
        return Ok(());
    };

    if file.size as usize > ctx.config.max_photo_size {
        feedback.error(&too_large_text(ctx.config.max_photo_size)).await?;
        return Ok(());
    }

    let mut progress = ProgressTracker::new(feedback, 2);
    progress.start("Downloading photo").await?;

    let info = bot.get_file(file.id.clone()).await?;
    let mut image = Vec::new();
    if let Err(e) = bot.download_file(&info.path, &mut image).await {
        tracing::error!("Failed to download photo of user {}: {}", user_id, e);
        progress.error("Could not download the photo, please send it again.").await?;
        return Ok(());
    }

    process_capture(progress, user_id, image, ctx).await
}

/// Raw payload of a message sent from the capture web page.
pub fn web_app_data(msg: &Message) -> Option<&str> {
    match &msg.kind {
        MessageKind::WebAppData(MessageWebAppData { web_app_data }) => Some(web_app_data.data.as_str()),
        _ => None,
    }
}

/// Data sent back by the capture web page.
pub async fn handle_web_app_data(bot: Bot, msg: Message, ctx: &BotContext) -> HandlerResult {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);
    let user_id = msg.from().map(|u| u.id.0 as i64).unwrap_or(0);
    let Some(data) = web_app_data(&msg) else {
        return Ok(());
    };

    let Some(token) = WebAppPayload::photo_token(data) else {
        log_capture_event(user_id, "unknown web app payload", Some(data));
        return Ok(());
    };

    let mut progress = ProgressTracker::new(feedback, 2);
    progress.start("Fetching photo").await?;

    let image = match ctx.relay.pull(&token).await {
        Ok(image) => image,
        Err(e) => {
            tracing::error!("Relay pull failed for user {}: {}", user_id, e);
            progress.error("Could not fetch the photo from the camera page, please try again.").await?;
            return Ok(());
        }
    };

    process_capture(progress, user_id, image, ctx).await
}

async fn process_capture(mut progress: ProgressTracker, user_id: i64, image: Vec<u8>, ctx: &BotContext) -> HandlerResult {
    progress.next_step("Checking photo").await?;

    match ctx.workouts.submit_photo(user_id, &image).await {
        Ok(PhotoOutcome::Counted {
            verdict,
            progress: line,
            settlement,
        }) => {
            let head = if verdict.counts() {
                "Photo accepted"
            } else {
                "Photo not verified"
            };
            let reason = if verdict.reason.is_empty() {
                String::new()
            } else {
                format!("\n{}", verdict.reason)
            };
            let text = format!("{head}{reason}\n{line}");
            if verdict.counts() {
                progress.complete(&text).await?;
            } else {
                progress.error(&text).await?;
            }

            if let Some(settlement) = settlement {
                ctx.workouts.announce_photo_settlement(user_id, &settlement).await?;
            }
        }
        Ok(PhotoOutcome::TooSoon { wait_min }) => {
            progress
                .error(&format!("Too soon! Rest a bit more and send the next photo in {wait_min} min."))
                .await?;
        }
        Ok(PhotoOutcome::TooLarge) => {
            progress.error(&too_large_text(ctx.config.max_photo_size)).await?;
        }
        Ok(PhotoOutcome::NoWindow) => {
            progress
                .error("No workout is in progress. Photos are counted only during a scheduled workout or after /start_workout.")
                .await?;
        }
        Err(e) => {
            tracing::error!("Failed to process photo of user {}: {}", user_id, e);
            progress.error("Something went wrong while checking the photo.").await?;
        }
    }
    Ok(())
}

fn too_large_text(limit: usize) -> String {
    format!("Photo is too large (max {} MB).", limit / (1024 * 1024))
}
