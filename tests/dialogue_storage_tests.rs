use anyhow::Result;
use chrono::{NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use teloxide::dispatching::dialogue::{serializer::Json, SqliteStorage, Storage};
use teloxide::prelude::*;
use tempfile::{tempdir, TempDir};
use workout_deposit_bot::bot::handlers::BotHandler;
use workout_deposit_bot::bot::wizard::{Draft, WizardState, WizardStorage};
use workout_deposit_bot::bot::BotContext;
use workout_deposit_bot::config::Config;
use workout_deposit_bot::database::{connection::DatabaseManager, models::User};
use workout_deposit_bot::domain::{Day, DaySlot, Deposit, UserProfile, WeeklySchedule};
use workout_deposit_bot::services::relay::RelayClient;
use workout_deposit_bot::services::reminder::ReminderService;
use workout_deposit_bot::services::vision::VisionClient;
use workout_deposit_bot::services::workout::{OpenOutcome, WorkoutService};

fn boxed(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("{e}")
}

fn test_config(database_url: String) -> Config {
    Config {
        telegram_bot_token: "test".to_string(),
        database_url,
        http_port: 0,
        openai_api_key: "sk-test".to_string(),
        openai_base_url: "http://127.0.0.1:9".to_string(),
        vision_model: "gpt-4o".to_string(),
        text_model: "gpt-4.1".to_string(),
        timezone: chrono_tz::Europe::Moscow,
        admin_id: Some(1),
        webapp_origin: None,
        max_photo_size: 5 * 1024 * 1024,
        shots_per_window: 3,
        pass_threshold: 2,
        end_grace_minutes: 15,
    }
}

async fn setup() -> Result<(BotContext, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let config = test_config(format!("sqlite:{}", db_path.display()));

    let db = DatabaseManager::new(&config.database_url).await?;
    db.run_migrations().await?;
    let db = Arc::new(db);

    let bot = Bot::new(&config.telegram_bot_token);
    let vision = VisionClient::new(&config)?;
    let relay = RelayClient::new(config.clone())?;
    let workouts = Arc::new(WorkoutService::new(bot, db.clone(), vision.clone(), config.clone()));
    let reminders = ReminderService::new(workouts.clone(), db.clone(), config.timezone, config.end_grace_minutes)
        .await
        .map_err(boxed)?;

    let ctx = BotContext {
        db,
        config,
        workouts,
        reminders,
        vision,
        relay,
    };
    Ok((ctx, temp_dir))
}

fn two_day_schedule() -> WeeklySchedule {
    let mut schedule = WeeklySchedule::default();
    for day in [Day::Mon, Day::Thu] {
        schedule.set(
            day,
            DaySlot {
                start: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
                duration_min: 60,
            },
        );
    }
    schedule
}

#[tokio::test]
async fn test_wizard_state_persists_in_sqlite_storage() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("dialogues.db");
    let path = path.to_string_lossy().to_string();
    let chat = ChatId(777);

    let state = WizardState::PickDays {
        draft: Draft {
            rest_interval_min: 10,
            ..Draft::default()
        },
        days: vec![Day::Tue, Day::Sat],
    };

    {
        let storage: Arc<WizardStorage> = SqliteStorage::open(&path, Json).await?.erase();
        storage.clone().update_dialogue(chat, state.clone()).await.map_err(boxed)?;
    }

    // A fresh handle on the same file sees the state from before the restart
    let storage: Arc<WizardStorage> = SqliteStorage::open(&path, Json).await?.erase();
    let restored = storage.clone().get_dialogue(chat).await.map_err(boxed)?;
    assert_eq!(restored, Some(state));

    storage.clone().remove_dialogue(chat).await.map_err(boxed)?;
    assert_eq!(storage.get_dialogue(chat).await.map_err(boxed)?, None);

    Ok(())
}

#[tokio::test]
async fn test_wizard_storage_shares_database_file() -> Result<()> {
    let (ctx, _temp_dir) = setup().await?;

    let storage: Arc<WizardStorage> = SqliteStorage::open(ctx.config.database_path(), Json).await?.erase();
    storage.clone().update_dialogue(ChatId(5), WizardState::Rules).await.map_err(boxed)?;
    assert_eq!(storage.get_dialogue(ChatId(5)).await.map_err(boxed)?, Some(WizardState::Rules));

    // Application tables are untouched by the dialogue table
    User::touch(&ctx.db.pool, 5, None, None).await?;
    assert_eq!(User::all(&ctx.db.pool).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_dispatcher_schema_builds() -> Result<()> {
    let (ctx, _temp_dir) = setup().await?;

    let handler = BotHandler::new(ctx);
    let _schema = handler.schema();

    Ok(())
}

#[tokio::test]
async fn test_reminder_jobs_per_user() -> Result<()> {
    let (ctx, _temp_dir) = setup().await?;
    let reminders = &ctx.reminders;

    let count = reminders
        .schedule_user(42, &two_day_schedule())
        .await
        .map_err(boxed)?;
    assert_eq!(count, 6);
    assert_eq!(reminders.scheduled_users().await, 1);

    // Rescheduling replaces the previous jobs
    reminders
        .schedule_user(42, &two_day_schedule())
        .await
        .map_err(boxed)?;
    assert_eq!(reminders.scheduled_users().await, 1);

    reminders.unschedule_user(42).await.map_err(boxed)?;
    assert_eq!(reminders.scheduled_users().await, 0);
    assert_eq!(reminders.grace().as_secs(), 15 * 60);

    Ok(())
}

#[tokio::test]
async fn test_reschedule_all_skips_users_without_deposit() -> Result<()> {
    let (ctx, _temp_dir) = setup().await?;
    let now = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();

    let mut active = UserProfile {
        schedule: two_day_schedule(),
        rest_interval_min: 5,
        onboarded_at: Some(now),
        ..UserProfile::default()
    };
    active.deposit = Some(Deposit::new(3000, 14, &active.schedule, now, ctx.config.timezone));

    let mut forfeited = active.clone();
    if let Some(deposit) = forfeited.deposit.as_mut() {
        deposit.forfeit("workout skipped");
    }

    for (user_id, profile) in [(1, active), (2, forfeited), (3, UserProfile::default())] {
        User::touch(&ctx.db.pool, user_id, None, None).await?;
        User::save_profile(&ctx.db.pool, user_id, &profile).await?;
    }

    let scheduled = ctx.reminders.reschedule_all().await.map_err(boxed)?;
    assert_eq!(scheduled, 1);

    ctx.reminders.unschedule_all().await.map_err(boxed)?;
    assert_eq!(ctx.reminders.scheduled_users().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_open_window_needs_registration_and_deposit() -> Result<()> {
    let (ctx, _temp_dir) = setup().await?;

    assert_eq!(ctx.workouts.open_window(99, None).await?, OpenOutcome::NotRegistered);

    User::touch(&ctx.db.pool, 99, None, None).await?;
    assert_eq!(ctx.workouts.open_window(99, None).await?, OpenOutcome::NoActiveDeposit);

    Ok(())
}
