//! Capture windows: opening them on schedule, counting photos, settling
//! the result against the deposit and telling the user and admin about it.

use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::database::models::{Capture, User};
use crate::domain::{
    CaptureRules, CaptureWindow, CloseReason, Day, DepositEffect, DepositStatus, Settlement, ShotDecision,
    UserProfile,
};
use crate::services::vision::{Verdict, VisionClient};
use crate::utils::datetime::{format_date, local_date};
use crate::utils::logging::{log_capture_event, log_database_error, log_settlement};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tokio::sync::{Mutex, OwnedMutexGuard};

const FALLBACK_DURATION_MIN: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened { date: NaiveDate, ends_at: DateTime<Utc> },
    NotRegistered,
    NoActiveDeposit,
    /// The deposit period ran out; the deposit was completed instead.
    DepositExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoOutcome {
    Counted {
        verdict: Verdict,
        progress: String,
        settlement: Option<Settlement>,
    },
    TooSoon { wait_min: i64 },
    TooLarge,
    NoWindow,
}

/// State of a user's capture window found at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowRecovery {
    Idle,
    /// The deadline passed while the bot was down.
    Settled(Settlement),
    /// Still accepting photos; the timeout must be armed again.
    Pending { date: NaiveDate, remaining: std::time::Duration },
}

pub struct WorkoutService {
    bot: Bot,
    db: Arc<DatabaseManager>,
    vision: VisionClient,
    config: Config,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl WorkoutService {
    pub fn new(bot: Bot, db: Arc<DatabaseManager>, vision: VisionClient, config: Config) -> Self {
        Self {
            bot,
            db,
            vision,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn rules_for(&self, profile: &UserProfile) -> CaptureRules {
        CaptureRules {
            expected_shots: self.config.shots_per_window,
            pass_threshold: self.config.pass_threshold,
            rest_interval_min: profile.rest_interval_min,
        }
    }

    /// Serialises profile mutations of one user. Locks nobody holds or
    /// waits on are dropped from the map on the way.
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn load(&self, user_id: i64) -> Result<Option<UserProfile>> {
        User::load_profile(&self.db.pool, user_id).await.map_err(|e| {
            log_database_error("load_profile", "users", &e.to_string());
            anyhow!(e)
        })
    }

    async fn save(&self, user_id: i64, profile: &UserProfile) -> Result<()> {
        User::save_profile(&self.db.pool, user_id, profile).await.map_err(|e| {
            log_database_error("save_profile", "users", &e.to_string());
            anyhow!(e)
        })
    }

    /// Opens a capture window for today. `workout_day` picks the slot whose
    /// duration is used; without it today's slot or the weekly average.
    pub async fn open_window(&self, user_id: i64, workout_day: Option<Day>) -> Result<OpenOutcome> {
        let _guard = self.lock_user(user_id).await;
        let Some(mut profile) = self.load(user_id).await? else {
            return Ok(OpenOutcome::NotRegistered);
        };
        let now = Utc::now();

        let Some(deposit) = profile.deposit.as_mut() else {
            return Ok(OpenOutcome::NoActiveDeposit);
        };
        if deposit.expire(now) {
            self.save(user_id, &profile).await?;
            log_capture_event(user_id, "deposit expired", None);
            self.notify(user_id, "🏁 Your deposit period is over. The coach will settle your deposit shortly.")
                .await;
            self.notify_admin(user_id, &profile, "Deposit period finished").await;
            return Ok(OpenOutcome::DepositExpired);
        }
        if !deposit.is_active() {
            return Ok(OpenOutcome::NoActiveDeposit);
        }

        let rules = self.rules_for(&profile);
        if let Some(stale) = profile.settle_window(CloseReason::Timeout, &rules) {
            tracing::warn!("Settling stale capture window of user {} before opening a new one", user_id);
            self.save(user_id, &profile).await?;
            self.announce(user_id, &profile, &stale, &rules).await;
            if !profile.has_active_deposit() {
                return Ok(OpenOutcome::NoActiveDeposit);
            }
        }

        let today = local_date(now, self.config.timezone);
        let day = workout_day.unwrap_or_else(|| Day::from_weekday(today.weekday()));
        let duration = profile
            .schedule
            .slot_for(day)
            .map(|s| s.duration_min)
            .or_else(|| profile.schedule.average_duration())
            .unwrap_or(FALLBACK_DURATION_MIN);

        let goal = Some(profile.answers.goal.as_str()).filter(|g| !g.trim().is_empty());
        let task = self.vision.generate_task(goal).await;
        let window = CaptureWindow::open(today, now, duration, Some(task.clone()));
        let ends_at = window.ends_at;
        profile.active_window = Some(window);
        self.save(user_id, &profile).await?;

        log_capture_event(user_id, "window opened", Some(&format!("{} min", duration)));
        self.notify(
            user_id,
            &format!(
                "🏋️ Workout time! Send {} photos during the workout, at least {} min apart.\n\n📝 Task: {}",
                rules.expected_shots, rules.rest_interval_min, task
            ),
        )
        .await;

        Ok(OpenOutcome::Opened { date: today, ends_at })
    }

    /// Halfway check: no photos yet means the workout never started.
    pub async fn midpoint(&self, user_id: i64) -> Result<()> {
        let _guard = self.lock_user(user_id).await;
        let Some(mut profile) = self.load(user_id).await? else {
            return Ok(());
        };
        if self.settle_if_overdue(user_id, &mut profile, Utc::now()).await?.is_some() {
            return Ok(());
        }
        let rules = self.rules_for(&profile);
        let Some(window) = profile.active_window.as_ref() else {
            return Ok(());
        };

        if window.shots_taken == 0 {
            if let Some(settlement) = profile.settle_window(CloseReason::NonStart, &rules) {
                self.save(user_id, &profile).await?;
                self.announce(user_id, &profile, &settlement, &rules).await;
            }
        } else {
            let progress = window.progress_line(&rules);
            self.notify(user_id, &format!("⏱ Halfway there.\n{progress}")).await;
        }
        Ok(())
    }

    /// End-of-workout prompt. Returns the window date when one is still
    /// open, so the caller can arm the timeout.
    pub async fn final_call(&self, user_id: i64) -> Result<Option<NaiveDate>> {
        let _guard = self.lock_user(user_id).await;
        let Some(mut profile) = self.load(user_id).await? else {
            return Ok(None);
        };
        if self.settle_if_overdue(user_id, &mut profile, Utc::now()).await?.is_some() {
            return Ok(None);
        }
        let rules = self.rules_for(&profile);
        let Some(window) = profile.active_window.as_ref() else {
            return Ok(None);
        };

        self.notify(
            user_id,
            &format!(
                "⌛ Workout time is up. You have {} min to send the remaining photos.\n{}",
                self.config.end_grace_minutes,
                window.progress_line(&rules)
            ),
        )
        .await;
        Ok(Some(window.date))
    }

    /// Settles the window of `date` if it is still open.
    pub async fn timeout_window(&self, user_id: i64, date: NaiveDate) -> Result<Option<Settlement>> {
        let _guard = self.lock_user(user_id).await;
        let Some(mut profile) = self.load(user_id).await? else {
            return Ok(None);
        };
        if profile.active_window.as_ref().map(|w| w.date) != Some(date) {
            return Ok(None);
        }
        self.settle_locked(user_id, &mut profile, CloseReason::Timeout).await
    }

    /// Runs one photo through the rest-interval check and verification.
    pub async fn submit_photo(&self, user_id: i64, image: &[u8]) -> Result<PhotoOutcome> {
        if image.len() > self.config.max_photo_size {
            return Ok(PhotoOutcome::TooLarge);
        }

        let _guard = self.lock_user(user_id).await;
        let Some(mut profile) = self.load(user_id).await? else {
            return Ok(PhotoOutcome::NoWindow);
        };
        let now = Utc::now();
        if self.settle_if_overdue(user_id, &mut profile, now).await?.is_some() {
            log_capture_event(user_id, "shot rejected", Some("window past deadline"));
            return Ok(PhotoOutcome::NoWindow);
        }
        let rules = self.rules_for(&profile);

        let (date, task) = match profile.active_window.as_ref() {
            None => return Ok(PhotoOutcome::NoWindow),
            Some(window) => {
                if let ShotDecision::TooSoon { wait_min } = window.check_shot(now, &rules) {
                    log_capture_event(user_id, "shot rejected", Some("rest interval"));
                    return Ok(PhotoOutcome::TooSoon { wait_min });
                }
                (window.date, window.task.clone())
            }
        };

        let verdict = self.vision.verify_photo(image, task.as_deref()).await;
        if let Err(e) = Capture::create(&self.db.pool, user_id, date, verdict.counts(), verdict.is_home, &verdict.reason).await
        {
            log_database_error("create", "captures", &e.to_string());
        }

        let (complete, progress) = match profile.active_window.as_mut() {
            Some(window) => {
                let complete = window.record_shot(now, verdict.counts(), &rules);
                (complete, window.progress_line(&rules))
            }
            None => return Ok(PhotoOutcome::NoWindow),
        };
        log_capture_event(
            user_id,
            "shot counted",
            Some(&format!("verified={} {}", verdict.counts(), progress)),
        );

        let settlement = if complete {
            profile.settle_window(CloseReason::ShotsReached, &rules)
        } else {
            None
        };
        self.save(user_id, &profile).await?;

        Ok(PhotoOutcome::Counted {
            verdict,
            progress,
            settlement,
        })
    }

    /// Sends the settlement messages once the photo reply has gone out.
    pub async fn announce_photo_settlement(&self, user_id: i64, settlement: &Settlement) -> Result<()> {
        let profile = self.load(user_id).await?.unwrap_or_default();
        let rules = self.rules_for(&profile);
        self.announce(user_id, &profile, settlement, &rules).await;
        Ok(())
    }

    /// `/end_workout`: settle whatever has been sent so far.
    pub async fn end_window(&self, user_id: i64) -> Result<Option<Settlement>> {
        self.settle(user_id, CloseReason::Manual).await
    }

    /// Settles the user's open window with `reason`, if any.
    pub async fn settle(&self, user_id: i64, reason: CloseReason) -> Result<Option<Settlement>> {
        let _guard = self.lock_user(user_id).await;
        let Some(mut profile) = self.load(user_id).await? else {
            return Ok(None);
        };
        self.settle_locked(user_id, &mut profile, reason).await
    }

    /// Startup check of a window left open by a previous run.
    pub async fn recover_window(&self, user_id: i64) -> Result<WindowRecovery> {
        let _guard = self.lock_user(user_id).await;
        let Some(mut profile) = self.load(user_id).await? else {
            return Ok(WindowRecovery::Idle);
        };
        let now = Utc::now();
        if let Some(settlement) = self.settle_if_overdue(user_id, &mut profile, now).await? {
            return Ok(WindowRecovery::Settled(settlement));
        }
        Ok(match profile.active_window.as_ref() {
            Some(window) => WindowRecovery::Pending {
                date: window.date,
                remaining: (window.deadline(self.config.end_grace_minutes) - now)
                    .to_std()
                    .unwrap_or_default(),
            },
            None => WindowRecovery::Idle,
        })
    }

    /// Closes the open window as timed out once its grace period is over.
    async fn settle_if_overdue(
        &self,
        user_id: i64,
        profile: &mut UserProfile,
        now: DateTime<Utc>,
    ) -> Result<Option<Settlement>> {
        let overdue = profile
            .active_window
            .as_ref()
            .is_some_and(|w| w.is_overdue(now, self.config.end_grace_minutes));
        if !overdue {
            return Ok(None);
        }
        tracing::warn!("Capture window of user {} is past its deadline, settling it", user_id);
        self.settle_locked(user_id, profile, CloseReason::Timeout).await
    }

    async fn settle_locked(
        &self,
        user_id: i64,
        profile: &mut UserProfile,
        reason: CloseReason,
    ) -> Result<Option<Settlement>> {
        let rules = self.rules_for(profile);
        let Some(settlement) = profile.settle_window(reason, &rules) else {
            return Ok(None);
        };
        self.save(user_id, profile).await?;
        self.announce(user_id, profile, &settlement, &rules).await;
        Ok(Some(settlement))
    }

    /// Admin decision on a completed or forfeited deposit.
    pub async fn resolve_deposit(&self, admin_id: i64, user_id: i64, returned: bool) -> Result<DepositStatus> {
        if !self.config.is_admin(admin_id) {
            return Err(anyhow!("Only the admin can settle deposits"));
        }
        let _guard = self.lock_user(user_id).await;
        let mut profile = self
            .load(user_id)
            .await?
            .ok_or_else(|| anyhow!("User {} not found", user_id))?;
        let deposit = profile
            .deposit
            .as_mut()
            .ok_or_else(|| anyhow!("User {} has no deposit", user_id))?;
        let status = deposit.resolve(returned)?;
        let amount = deposit.amount;
        self.save(user_id, &profile).await?;

        let text = if returned {
            format!("💸 Your deposit of {amount} has been returned. Well done!")
        } else {
            format!("🔒 Your deposit of {amount} has been kept by the coach.")
        };
        self.notify(user_id, &text).await;
        tracing::info!("Admin {} resolved deposit of user {} as {:?}", admin_id, user_id, status);
        Ok(status)
    }

    async fn announce(&self, user_id: i64, profile: &UserProfile, settlement: &Settlement, rules: &CaptureRules) {
        let outcome = &settlement.outcome;
        log_settlement(
            user_id,
            outcome.passed,
            outcome.verified,
            outcome.shots_taken,
            outcome.reason.describe(),
        );

        let summary = format!(
            "Workout {}: {} ({}/{} photos verified).",
            format_date(&outcome.date),
            outcome.reason.describe(),
            outcome.verified,
            outcome.shots_taken
        );
        let text = match settlement.effect {
            DepositEffect::Counted { remaining } => {
                format!("✅ {summary}\nWorkout counted! Sessions left: {remaining}.")
            }
            DepositEffect::AlreadyCounted => format!("✅ {summary}\nThis day was already counted."),
            DepositEffect::Completed => {
                format!("🏆 {summary}\nAll sessions done! The coach will return your deposit soon.")
            }
            DepositEffect::Forfeited => format!(
                "❌ {summary}\n{}.\nYour deposit is forfeited.",
                outcome.failure_reason(rules)
            ),
            DepositEffect::NoDeposit if outcome.passed => format!("✅ {summary}"),
            DepositEffect::NoDeposit => format!("❌ {summary}"),
        };
        self.notify(user_id, &text).await;

        if settlement.needs_admin() {
            let event = match settlement.effect {
                DepositEffect::Completed => "All sessions completed".to_string(),
                _ => {
                    let mut event = format!("Deposit forfeited: {}", outcome.failure_reason(rules));
                    match Capture::find_by_window(&self.db.pool, user_id, outcome.date).await {
                        Ok(captures) => {
                            for capture in captures {
                                let mark = if capture.verified { "✅" } else { "❌" };
                                event.push_str(&format!("\n{mark} {}", capture.reason));
                            }
                        }
                        Err(e) => log_database_error("find_by_window", "captures", &e.to_string()),
                    }
                    event
                }
            };
            self.notify_admin(user_id, profile, &event).await;
        }
    }

    /// Failures to notify are logged, never propagated.
    async fn notify(&self, user_id: i64, text: &str) {
        if let Err(e) = self.bot.send_message(ChatId(user_id), text).await {
            tracing::error!("Failed to notify user {}: {}", user_id, e);
        }
    }

    async fn notify_admin(&self, user_id: i64, profile: &UserProfile, event: &str) {
        let Some(admin_id) = self.config.admin_id else {
            return;
        };
        let display = match User::find(&self.db.pool, user_id).await {
            Ok(Some(user)) => user.display_name(),
            _ => user_id.to_string(),
        };
        let amount = profile.deposit.as_ref().map(|d| d.amount).unwrap_or_default();
        let text = format!("👤 {display} ({user_id})\n{event}\nDeposit: {amount}");

        if let Err(e) = self
            .bot
            .send_message(ChatId(admin_id), text)
            .reply_markup(admin_keyboard(user_id))
            .await
        {
            tracing::error!("Failed to notify admin about user {}: {}", user_id, e);
        }
    }
}

/// Return / keep buttons shown to the admin.
pub fn admin_keyboard(user_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("💸 Return", format!("depwin_{user_id}")),
        InlineKeyboardButton::callback("🔒 Keep", format!("depforf_{user_id}")),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn service() -> (WorkoutService, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let database_url = format!("sqlite:{}", temp_dir.path().join("test.db").display());
        let config = Config {
            telegram_bot_token: "test".to_string(),
            database_url: database_url.clone(),
            http_port: 0,
            openai_api_key: "sk-test".to_string(),
            openai_base_url: "http://127.0.0.1:9".to_string(),
            vision_model: "gpt-4o".to_string(),
            text_model: "gpt-4.1".to_string(),
            timezone: chrono_tz::UTC,
            admin_id: None,
            webapp_origin: None,
            max_photo_size: 1024,
            shots_per_window: 3,
            pass_threshold: 2,
            end_grace_minutes: 15,
        };
        let db = DatabaseManager::new(&database_url)
            .await
            .expect("Failed to create test database");
        let vision = VisionClient::new(&config).expect("Failed to build vision client");
        let service = WorkoutService::new(Bot::new("test"), Arc::new(db), vision, config);
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_idle_user_locks_are_dropped() {
        let (service, _temp_dir) = service().await;
        {
            let _first = service.lock_user(1).await;
            let _second = service.lock_user(2).await;
            assert_eq!(service.locks.lock().await.len(), 2);
        }

        let _third = service.lock_user(3).await;
        let locks = service.locks.lock().await;
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key(&3));
    }

    #[tokio::test]
    async fn test_same_user_waits_for_lock() {
        let (service, _temp_dir) = service().await;
        let guard = service.lock_user(5).await;

        let service = Arc::new(service);
        let waiter = {
            let service = service.clone();
            tokio::spawn(async move {
                let _guard = service.lock_user(5).await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.expect("waiter panicked");
    }

    #[test]
    fn test_admin_keyboard_buttons() {
        let keyboard = admin_keyboard(42);
        let data: Vec<_> = keyboard.inline_keyboard[0]
            .iter()
            .map(|b| match &b.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(d) => d.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(data, vec!["depwin_42", "depforf_42"]);
    }
}
